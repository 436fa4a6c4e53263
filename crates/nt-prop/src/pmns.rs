//! Construction of mixing matrices from angles.

use nt_tensor::{Complex64, Index, Tensor, TensorOptions};

/// Two-generation rotation `[[cos t, sin t], [-sin t, cos t]]` as a `[1, 2, 2]` tensor.
pub fn two_flavour(theta: f64, options: TensorOptions) -> Tensor {
    let (s, c) = theta.sin_cos();
    let values = [c, s, -s, c];
    finish(
        &Tensor::from_values(&values, TensorOptions::real()).reshape(&[1, 2, 2]),
        options,
    )
}

/// Three-generation mixing matrix from scalar angles (radians), as a `[1, 3, 3]` tensor.
pub fn three_flavour(
    theta12: f64,
    theta13: f64,
    theta23: f64,
    delta_cp: f64,
    options: TensorOptions,
) -> Tensor {
    let angle = |value: f64| Tensor::from_values(&[value], TensorOptions::real());
    let pmns = build_pmns(
        &angle(theta12),
        &angle(theta13),
        &angle(theta23),
        &angle(delta_cp),
    );
    finish(&pmns, options)
}

/// Untracked copy carrying the scalar type and gradient flag of `options`.
fn finish(tensor: &Tensor, options: TensorOptions) -> Tensor {
    let copy = tensor.to_scalar_type(options.scalar_type());
    copy.set_requires_grad(options.requires_grad());
    copy
}

fn element(matrix: &Tensor, row: usize, col: usize, value: &Tensor) {
    matrix.set_value(&[Index::Ellipsis, Index::At(row), Index::At(col)], value);
}

/// Standard parametrisation `U = R23 · U13(delta) · R12` for a batch of angles.
///
/// Each angle is a `[batch]` tensor (batches of one broadcast). The result is
/// a complex `[batch, 3, 3]` tensor that stays on the gradient tape, so
/// probabilities can be differentiated with respect to the angles.
pub fn build_pmns(theta12: &Tensor, theta13: &Tensor, theta23: &Tensor, delta_cp: &Tensor) -> Tensor {
    let batch = [theta12, theta13, theta23, delta_cp]
        .iter()
        .map(|t| t.batch_size())
        .max()
        .unwrap_or(1);
    let blank = || Tensor::zeros(&[batch, 3, 3], TensorOptions::complex());
    let one = Tensor::scalar(1.0, TensorOptions::complex());

    let (s23, c23) = (theta23.sin(), theta23.cos());
    let r23 = blank();
    element(&r23, 0, 0, &one);
    element(&r23, 1, 1, &c23);
    element(&r23, 1, 2, &s23);
    element(&r23, 2, 1, &s23.neg());
    element(&r23, 2, 2, &c23);

    let (s13, c13) = (theta13.sin(), theta13.cos());
    let phase = delta_cp.scale(Complex64::new(0.0, 1.0)).exp();
    let u13 = blank();
    element(&u13, 1, 1, &one);
    element(&u13, 0, 0, &c13);
    element(&u13, 0, 2, &s13.mul(&phase.conj()));
    element(&u13, 2, 0, &s13.mul(&phase).neg());
    element(&u13, 2, 2, &c13);

    let (s12, c12) = (theta12.sin(), theta12.cos());
    let r12 = blank();
    element(&r12, 2, 2, &one);
    element(&r12, 0, 0, &c12);
    element(&r12, 0, 1, &s12);
    element(&r12, 1, 0, &s12.neg());
    element(&r12, 1, 1, &c12);

    r23.matmul(&u13).matmul(&r12)
}
