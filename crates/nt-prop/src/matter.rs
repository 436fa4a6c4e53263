//! Matter effects on the propagation Hamiltonian.

use nt_core::constants::GROOT2;
use nt_core::{ErrorInfo, NtError};
use nt_tensor::{Index, Tensor};

use crate::inputs;

fn state_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::State(ErrorInfo::new(code, message))
}

/// Computes the effective eigensystem of the propagation Hamiltonian in matter.
///
/// Implementations keep their own copy of the mixing matrix and masses; the
/// [`Propagator`](crate::Propagator) forwards both whenever they change.
pub trait MatterSolver {
    /// Number of generations the solver was built for.
    fn generations(&self) -> usize;

    /// Replaces the mixing matrix (`[G, G]` or `[batch, G, G]`).
    fn set_pmns(&mut self, pmns: &Tensor) -> Result<(), NtError>;

    /// Replaces the mass eigenvalues (`[G]` or `[batch, G]`).
    fn set_masses(&mut self, masses: &Tensor) -> Result<(), NtError>;

    /// Returns `(eigenvectors, eigenvalues)` of the Hamiltonian at each energy.
    ///
    /// Eigenvectors are `[batch, G, G]` (one per column), eigenvalues are
    /// `[batch, G]` and sorted ascending.
    fn calculate_eigenvalues(&self, energies: &Tensor) -> Result<(Tensor, Tensor), NtError>;
}

/// Matter of uniform electron density along the whole baseline.
///
/// The Hamiltonian in the mass basis is
/// `H(E) = diag(m_i^2 / 2) / E - GROOT2 * density * (U_e ⊗ conj(U_e))`,
/// where `U_e` is the electron row of the mixing matrix. Each batch element
/// of the mixing matrix and of the masses gets its own Hamiltonian.
///
/// The potential term is `U_e ⊗ conj(U_e)`, the complex conjugate of the
/// mass-basis projector `U^H e e^H U`. The two agree for real mixing
/// matrices; with a CP phase and three generations the probabilities differ
/// from flavour-basis evolution at the 1e-3 level, so fits of `delta_cp` in
/// matter inherit this convention.
pub struct ConstDensitySolver {
    generations: usize,
    density: f64,
    pmns: Option<Tensor>,
    masses: Option<Tensor>,
    diag_mass_sq: Option<Tensor>,
    electron_outer: Option<Tensor>,
}

impl ConstDensitySolver {
    /// Solver for `generations` flavours in matter of electron `density` (g/cm³).
    pub fn new(generations: usize, density: f64) -> Self {
        Self {
            generations,
            density,
            pmns: None,
            masses: None,
            diag_mass_sq: None,
            electron_outer: None,
        }
    }

    /// Electron density in g/cm³.
    pub fn density(&self) -> f64 {
        self.density
    }

    /// Mixing matrix currently held by the solver, in batched form.
    pub fn pmns(&self) -> Option<&Tensor> {
        self.pmns.as_ref()
    }

    /// Masses currently held by the solver, in batched form.
    pub fn masses(&self) -> Option<&Tensor> {
        self.masses.as_ref()
    }

    /// `[batch, G, G]` diagonal matrices of `m_i^2 / 2`.
    pub fn diag_mass_sq(&self) -> Option<&Tensor> {
        self.diag_mass_sq.as_ref()
    }

    /// `[batch, G, G]` matter potential terms built from the electron rows.
    pub fn electron_outer(&self) -> Option<&Tensor> {
        self.electron_outer.as_ref()
    }
}

impl MatterSolver for ConstDensitySolver {
    fn generations(&self) -> usize {
        self.generations
    }

    fn set_pmns(&mut self, pmns: &Tensor) -> Result<(), NtError> {
        let pmns = inputs::pmns(self.generations, pmns)?;
        let electron_rows = pmns.transpose(0, 1).get_values(&[Index::At(0), Index::Ellipsis]);
        let outer = electron_rows
            .unsqueeze(2)
            .mul(&electron_rows.conj().unsqueeze(1))
            .scale(GROOT2 * self.density);
        log::trace!("rebuilt electron outer product for density {}", self.density);
        self.electron_outer = Some(outer);
        self.pmns = Some(pmns);
        Ok(())
    }

    fn set_masses(&mut self, masses: &Tensor) -> Result<(), NtError> {
        let masses = inputs::masses(self.generations, masses)?;
        let diag = masses.mul(&masses).scale(0.5).diag();
        log::trace!("rebuilt diagonal mass matrix for {} generations", self.generations);
        self.diag_mass_sq = Some(diag);
        self.masses = Some(masses);
        Ok(())
    }

    fn calculate_eigenvalues(&self, energies: &Tensor) -> Result<(Tensor, Tensor), NtError> {
        let (Some(diag), Some(outer)) = (&self.diag_mass_sq, &self.electron_outer) else {
            return Err(state_error(
                "solver-incomplete",
                "matter solver needs both masses and a mixing matrix",
            ));
        };
        let energies = inputs::energies(energies)?;
        let batch = energies.batch_size();
        inputs::common_batch(&[
            ("pmns", outer.batch_size()),
            ("masses", diag.batch_size()),
            ("energies", batch),
        ])?;
        let hamiltonian = diag.div(&energies.reshape(&[batch, 1, 1])).sub(outer);
        log::debug!(
            "solving constant-density eigensystem: batch={batch}, generations={}",
            self.generations
        );
        hamiltonian.eig()
    }
}
