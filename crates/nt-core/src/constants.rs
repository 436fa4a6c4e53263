//! Physical constants used by the propagation engine.

/// √2·G_F in the engine's natural units (eV² per GeV per g/cm³ electron density).
///
/// Multiplying by a matter density gives the charged-current potential that
/// enters the constant-density Hamiltonian.
pub const GROOT2: f64 = 1.52588e-4;

/// Tolerance on `|U U† - 1|` above which a mixing matrix is reported as non-unitary.
pub const UNITARITY_TOLERANCE: f64 = 1e-4;
