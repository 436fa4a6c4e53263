#![deny(missing_docs)]
//! Neutrino oscillation probabilities in vacuum and constant-density matter.
//!
//! A [`Propagator`] holds the mixing matrix, the mass eigenvalues and an
//! optional [`MatterSolver`]; [`Propagator::calculate_probs`] returns the
//! batched `[batch, G, G]` transition probabilities for a set of energies.
//! Every step is recorded on the tensor tape, so probabilities can be
//! differentiated with respect to masses and mixing parameters.

pub mod config;
mod inputs;
pub mod matter;
pub mod pmns;
pub mod propagator;

pub use config::{MatterConfig, MixingAngles, OscillationParams, PropagatorConfig};
pub use matter::{ConstDensitySolver, MatterSolver};
pub use propagator::Propagator;
