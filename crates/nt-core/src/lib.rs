#![deny(missing_docs)]
#![doc = "Core data types shared by the nt oscillation engine: errors, scalar and device descriptors, deterministic RNG and physical constants."]

pub mod constants;
pub mod dtypes;
pub mod errors;
pub mod rng;

pub use dtypes::{DeviceType, ScalarType};
pub use errors::{ErrorInfo, NtError};
pub use rng::{derive_substream_seed, RngHandle};
