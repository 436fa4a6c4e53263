//! Shape normalisation and validation of engine inputs.

use nt_core::constants::UNITARITY_TOLERANCE;
use nt_core::{ErrorInfo, NtError};
use nt_tensor::{Tensor, TensorOptions};

fn shape_error(code: &str, message: impl Into<String>, shape: &[usize]) -> NtError {
    NtError::Shape(ErrorInfo::new(code, message).with_shape("shape", shape))
}

/// Accepts `[G, G]` or `[batch, G, G]`; returns the batched form.
pub(crate) fn pmns(generations: usize, pmns: &Tensor) -> Result<Tensor, NtError> {
    let shape = pmns.shape();
    match shape.as_slice() {
        [r, c] if *r == generations && *c == generations => Ok(pmns.add_batch_dim()),
        [_, r, c] if *r == generations && *c == generations => Ok(pmns.clone()),
        _ => Err(shape_error(
            "pmns-shape",
            format!("mixing matrix must be [{generations}, {generations}] or [batch, {generations}, {generations}]"),
            &shape,
        )),
    }
}

/// Accepts `[G]` or `[batch, G]`; returns the batched form.
pub(crate) fn masses(generations: usize, masses: &Tensor) -> Result<Tensor, NtError> {
    let shape = masses.shape();
    match shape.as_slice() {
        [g] if *g == generations => Ok(masses.add_batch_dim()),
        [_, g] if *g == generations => Ok(masses.clone()),
        _ => Err(shape_error(
            "masses-shape",
            format!("masses must be [{generations}] or [batch, {generations}]"),
            &shape,
        )),
    }
}

/// Accepts `[batch]`, `[batch, 1]` or `[batch, 1, 1]` strictly positive energies;
/// returns `[batch, 1]`.
pub(crate) fn energies(energies: &Tensor) -> Result<Tensor, NtError> {
    let shape = energies.shape();
    let normalised = match shape.as_slice() {
        [b] => energies.reshape(&[*b, 1]),
        [_, 1] => energies.clone(),
        [b, 1, 1] => energies.reshape(&[*b, 1]),
        _ => {
            return Err(shape_error(
                "energies-shape",
                "energies must be [batch], [batch, 1] or [batch, 1, 1]",
                &shape,
            ))
        }
    };
    let values = normalised.to_array();
    if let Some(bad) = values.iter().find(|e| !(e.re > 0.0) || e.im != 0.0) {
        return Err(NtError::Domain(
            ErrorInfo::new("non-positive-energy", "energies must be real and strictly positive")
                .with_context("value", bad.to_string())
                .with_hint("remove empty or zero-energy bins before propagating"),
        ));
    }
    Ok(normalised)
}

/// Common batch size of several batched inputs.
///
/// Every size must be 1 (broadcast) or equal to the largest one.
pub(crate) fn common_batch(parts: &[(&str, usize)]) -> Result<usize, NtError> {
    let batch = parts.iter().map(|(_, size)| *size).max().unwrap_or(1);
    if parts.iter().all(|(_, size)| *size == 1 || *size == batch) {
        return Ok(batch);
    }
    let info = parts.iter().fold(
        ErrorInfo::new("batch-mismatch", "batch sizes of the inputs do not broadcast")
            .with_hint("use a batch of one or the same batch size for every input"),
        |info, (name, size)| info.with_context(*name, size.to_string()),
    );
    Err(NtError::Shape(info))
}

/// Largest deviation of `U U^H` from the identity over the batch.
pub(crate) fn unitarity_defect(pmns: &Tensor) -> f64 {
    let generations = pmns.shape()[pmns.ndim() - 1];
    let product = pmns.detach().matmul(&pmns.detach().conj().transpose(1, 2));
    let identity = Tensor::eye(generations, TensorOptions::complex());
    (&product - &identity)
        .abs()
        .to_real_array()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(*v))
}

/// Logs a warning when the mixing matrix is not unitary; the matrix is still used.
pub(crate) fn warn_if_not_unitary(pmns: &Tensor) {
    let defect = unitarity_defect(pmns);
    if defect > UNITARITY_TOLERANCE {
        log::warn!(
            "mixing matrix deviates from unitarity by {defect:.3e} (tolerance {UNITARITY_TOLERANCE:e})"
        );
    }
}
