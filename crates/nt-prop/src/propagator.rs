//! The oscillation engine.

use nt_core::{ErrorInfo, NtError};
use nt_tensor::{Complex64, Index, Tensor, TensorOptions};

use crate::inputs;
use crate::matter::MatterSolver;

fn state_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::State(ErrorInfo::new(code, message))
}

fn shape_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::Shape(ErrorInfo::new(code, message))
}

/// Computes flavour transition probabilities over a fixed baseline.
///
/// ```
/// use nt_prop::{pmns, Propagator};
/// use nt_tensor::{Tensor, TensorOptions};
///
/// let mut propagator = Propagator::new(2, 0.5);
/// propagator
///     .set_masses(&Tensor::from_values(&[0.1, 0.5], TensorOptions::real()))
///     .unwrap();
/// propagator.set_pmns(&pmns::two_flavour(0.3, TensorOptions::complex())).unwrap();
/// let probs = propagator
///     .calculate_probs(&Tensor::from_values(&[1.0, 2.0], TensorOptions::real()))
///     .unwrap();
/// assert_eq!(probs.shape(), vec![2, 2, 2]);
/// ```
pub struct Propagator {
    generations: usize,
    baseline: f64,
    pmns: Option<Tensor>,
    masses: Option<Tensor>,
    matter_solver: Option<Box<dyn MatterSolver>>,
}

impl Propagator {
    /// Propagator for `generations` flavours over `baseline` km, in vacuum and with nothing set.
    pub fn new(generations: usize, baseline: f64) -> Self {
        Self {
            generations,
            baseline,
            pmns: None,
            masses: None,
            matter_solver: None,
        }
    }

    /// Number of generations.
    pub fn generations(&self) -> usize {
        self.generations
    }

    /// Baseline in km.
    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    /// Current mixing matrix in batched `[batch, G, G]` form.
    pub fn pmns(&self) -> Option<&Tensor> {
        self.pmns.as_ref()
    }

    /// Current masses in batched `[batch, G]` form.
    pub fn masses(&self) -> Option<&Tensor> {
        self.masses.as_ref()
    }

    /// Whether probabilities are computed in matter.
    pub fn has_matter_solver(&self) -> bool {
        self.matter_solver.is_some()
    }

    /// Sets the mass eigenvalues (`[G]` or `[batch, G]`) and forwards them to the solver.
    pub fn set_masses(&mut self, masses: &Tensor) -> Result<(), NtError> {
        let masses = inputs::masses(self.generations, masses)?;
        if let Some(solver) = self.matter_solver.as_mut() {
            solver.set_masses(&masses)?;
        }
        self.masses = Some(masses);
        Ok(())
    }

    /// Sets the mixing matrix (`[G, G]` or `[batch, G, G]`) and forwards it to the solver.
    ///
    /// A matrix that is not unitary is accepted with a logged warning.
    pub fn set_pmns(&mut self, pmns: &Tensor) -> Result<(), NtError> {
        let pmns = inputs::pmns(self.generations, pmns)?;
        inputs::warn_if_not_unitary(&pmns);
        if let Some(solver) = self.matter_solver.as_mut() {
            solver.set_pmns(&pmns)?;
        }
        self.pmns = Some(pmns);
        Ok(())
    }

    /// Overwrites one mixing matrix element in place.
    ///
    /// `position` is `[row, col]` (applied to every batch element) or
    /// `[batch, row, col]`. The matrix must have been set already and must not
    /// be a leaf that requires gradients.
    pub fn set_pmns_value(
        &mut self,
        position: &[usize],
        value: impl Into<Complex64>,
    ) -> Result<(), NtError> {
        let Some(pmns) = self.pmns.as_ref() else {
            return Err(state_error(
                "pmns-unset",
                "set the mixing matrix before editing its elements",
            ));
        };
        if pmns.is_leaf() && pmns.requires_grad() {
            return Err(NtError::State(
                ErrorInfo::new(
                    "pmns-tracked-leaf",
                    "cannot write into a mixing matrix that requires gradients",
                )
                .with_hint("build the matrix with pmns::build_pmns or detach it first"),
            ));
        }
        let shape = pmns.shape();
        let indices = match position {
            [row, col] => vec![Index::Ellipsis, Index::At(*row), Index::At(*col)],
            [batch, row, col] if *batch < shape[0] => {
                vec![Index::At(*batch), Index::At(*row), Index::At(*col)]
            }
            _ => {
                return Err(shape_error(
                    "pmns-position",
                    format!("position {position:?} does not address an element of {shape:?}"),
                ))
            }
        };
        let (row, col) = (position[position.len() - 2], position[position.len() - 1]);
        if row >= self.generations || col >= self.generations {
            return Err(shape_error(
                "pmns-position",
                format!("position {position:?} does not address an element of {shape:?}"),
            ));
        }
        pmns.set_value(&indices, &Tensor::scalar(value, TensorOptions::complex()));
        let updated = pmns.clone();
        if let Some(solver) = self.matter_solver.as_mut() {
            solver.set_pmns(&updated)?;
        }
        Ok(())
    }

    /// Attaches a matter solver, pushing the current masses and mixing matrix into it.
    pub fn set_matter_solver(&mut self, mut solver: Box<dyn MatterSolver>) -> Result<(), NtError> {
        if solver.generations() != self.generations {
            return Err(NtError::Shape(
                ErrorInfo::new("solver-generations", "matter solver generation count differs")
                    .with_context("propagator", self.generations.to_string())
                    .with_context("solver", solver.generations().to_string()),
            ));
        }
        if let Some(pmns) = &self.pmns {
            solver.set_pmns(pmns)?;
        }
        if let Some(masses) = &self.masses {
            solver.set_masses(masses)?;
        }
        self.matter_solver = Some(solver);
        Ok(())
    }

    /// Detaches the matter solver, returning to vacuum propagation.
    pub fn clear_matter_solver(&mut self) -> Option<Box<dyn MatterSolver>> {
        self.matter_solver.take()
    }

    /// Transition probabilities `P[b, alpha, beta]` for each energy.
    ///
    /// Energies may be `[batch]`, `[batch, 1]` or `[batch, 1, 1]` and must be
    /// strictly positive. The batches of energies, masses and mixing matrix
    /// must each be one or a common size. The result is a real
    /// `[batch, G, G]` tensor.
    pub fn calculate_probs(&self, energies: &Tensor) -> Result<Tensor, NtError> {
        let (Some(pmns), Some(masses)) = (&self.pmns, &self.masses) else {
            return Err(NtError::State(
                ErrorInfo::new(
                    "propagator-incomplete",
                    "masses and mixing matrix must be set before computing probabilities",
                )
                .with_context("masses_set", self.masses.is_some().to_string())
                .with_context("pmns_set", self.pmns.is_some().to_string()),
            ));
        };
        let energies = inputs::energies(energies)?;
        inputs::common_batch(&[
            ("pmns", pmns.batch_size()),
            ("masses", masses.batch_size()),
            ("energies", energies.batch_size()),
        ])?;

        match &self.matter_solver {
            Some(solver) => {
                log::debug!(
                    "computing matter probabilities: batch={}, generations={}",
                    energies.batch_size(),
                    self.generations
                );
                let (eigenvectors, eigenvalues) = solver.calculate_eigenvalues(&energies)?;
                let effective_mass_sq = eigenvalues.mul(&energies.scale(2.0));
                let effective_pmns = pmns.matmul(&eigenvectors);
                Ok(self.calculate_probs_with(&energies, &effective_mass_sq, &effective_pmns))
            }
            None => {
                log::debug!(
                    "computing vacuum probabilities: batch={}, generations={}",
                    energies.batch_size(),
                    self.generations
                );
                Ok(self.calculate_probs_with(&energies, &masses.mul(masses), pmns))
            }
        }
    }

    fn calculate_probs_with(&self, energies: &Tensor, mass_sq: &Tensor, pmns: &Tensor) -> Tensor {
        let phases = mass_sq
            .scale(Complex64::new(0.0, -self.baseline))
            .div(&energies.scale(2.0))
            .exp();
        let n = self.generations;
        let weights = Tensor::ones(&[1, n, n], TensorOptions::complex()).mul(&phases.unsqueeze(1));
        let amplitudes = pmns
            .conj()
            .matmul(&pmns.mul(&weights).transpose(1, 2));
        amplitudes.abs_sq()
    }
}
