//! Batched linear algebra: products, diagonal embedding and Hermitian eigensystems.

use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Array3, ArrayD, Axis, Ix1, Ix3, IxDyn};
use nt_core::{ErrorInfo, NtError};

use crate::autograd::Op;
use crate::kernels::{self, C, ZERO};
use crate::tensor::Tensor;

const EIG_EPS: f64 = f64::EPSILON;
const EIG_MAX_ITER: usize = 1000;
const HERMITIAN_TOLERANCE: f64 = 1e-9;

fn eig_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::Backend(ErrorInfo::new(code, message))
}

impl Tensor {
    /// Matrix product of 2-D or batched 3-D operands.
    ///
    /// A leading batch of length one, or a 2-D operand, broadcasts against the
    /// other operand's batch.
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let data = kernels::matmul(&self.data(), &other.data());
        let ty = self.scalar_type().promote(other.scalar_type());
        Tensor::from_op(data, ty, Op::MatMul, &[self, other])
    }

    /// Outer product `a_i b_j` of two vectors (no conjugation).
    pub fn outer(&self, other: &Tensor) -> Tensor {
        let data = {
            let a = self.data();
            let b = other.data();
            let (a, b) = match (
                a.view().into_dimensionality::<Ix1>(),
                b.view().into_dimensionality::<Ix1>(),
            ) {
                (Ok(a), Ok(b)) => (a.to_owned(), b.to_owned()),
                _ => panic!(
                    "outer expects two vectors, got shapes {:?} and {:?}",
                    self.shape(),
                    other.shape()
                ),
            };
            let column = a.insert_axis(Axis(1));
            let row = b.insert_axis(Axis(0));
            (&column * &row).into_dyn()
        };
        let ty = self.scalar_type().promote(other.scalar_type());
        Tensor::from_op(data, ty, Op::Outer, &[self, other])
    }

    /// Embeds the last axis as the diagonal of a square matrix: `[.., n] -> [.., n, n]`.
    pub fn diag(&self) -> Tensor {
        let input = self.data_clone();
        assert!(input.ndim() >= 1, "diag expects at least one axis");
        let last = input.ndim() - 1;
        let n = input.shape()[last];
        let mut shape = input.shape().to_vec();
        shape.push(n);
        let mut out = ArrayD::<C>::zeros(IxDyn(&shape));
        for i in 0..n {
            out.index_axis_mut(Axis(last + 1), i)
                .index_axis_mut(Axis(last), i)
                .assign(&input.index_axis(Axis(last), i));
        }
        Tensor::from_op(out, self.scalar_type(), Op::Diag, &[self])
    }

    /// Eigensystem of a Hermitian matrix or a batch of them.
    ///
    /// Returns `(eigenvectors, eigenvalues)`: eigenvalues are real and sorted
    /// ascending per batch element, eigenvectors are the matching columns, each
    /// scaled by a unit phase so its largest-magnitude component is real and
    /// positive. Accepts `[n, n]` or `[batch, n, n]`; outputs keep the batch
    /// layout of the input.
    pub fn eig(&self) -> Result<(Tensor, Tensor), NtError> {
        let input = self.data_clone();
        let shape = input.shape().to_vec();
        let batched = match shape.len() {
            2 => input.insert_axis(Axis(0)),
            3 => input,
            n => panic!("eig expects 2-D or 3-D input, got rank {n}"),
        };
        let batched = batched
            .into_dimensionality::<Ix3>()
            .unwrap_or_else(|_| unreachable!("rank checked above"));
        let (batch, rows, cols) = batched.dim();
        assert_eq!(rows, cols, "eig expects square matrices, got {rows}x{cols}");

        let mut values = Array2::<C>::zeros((batch, rows));
        let mut vectors = Array3::<C>::zeros((batch, rows, rows));
        for (b, matrix) in batched.outer_iter().enumerate() {
            let (vals, vecs) = hermitian_eigensystem(&matrix.to_owned(), b)?;
            values.index_axis_mut(Axis(0), b).assign(&vals);
            vectors.index_axis_mut(Axis(0), b).assign(&vecs);
        }
        log::debug!("eigendecomposition of {batch} {rows}x{rows} matrices");

        let (mut values, mut vectors) = (values.into_dyn(), vectors.into_dyn());
        if shape.len() == 2 {
            values = values.index_axis_move(Axis(0), 0);
            vectors = vectors.index_axis_move(Axis(0), 0);
        }
        let real_ty = self.scalar_type().to_real().to_floating();
        let complex_ty = self.scalar_type().to_complex();
        let vals_t = Tensor::from_op(
            values.clone(),
            real_ty,
            Op::EigValues {
                vecs: vectors.clone(),
            },
            &[self],
        );
        let vecs_t = Tensor::from_op(
            vectors.clone(),
            complex_ty,
            Op::EigVectors {
                vals: values,
                vecs: vectors,
            },
            &[self],
        );
        Ok((vecs_t, vals_t))
    }
}

fn hermitian_eigensystem(
    matrix: &Array2<C>,
    batch_index: usize,
) -> Result<(ndarray::Array1<C>, Array2<C>), NtError> {
    let n = matrix.nrows();
    let scale = matrix.iter().fold(1.0_f64, |acc, z| acc.max(z.norm()));
    let defect = kernels::hermitian_defect(&matrix.clone().into_dyn());
    if defect > HERMITIAN_TOLERANCE * scale {
        return Err(NtError::Backend(
            ErrorInfo::new("eig-not-hermitian", "eigendecomposition input is not Hermitian")
                .with_context("batch_index", batch_index.to_string())
                .with_context("defect", format!("{defect:e}")),
        ));
    }

    let dense = DMatrix::<C>::from_fn(n, n, |i, j| matrix[[i, j]]);
    let eigen = SymmetricEigen::try_new(dense, EIG_EPS, EIG_MAX_ITER).ok_or_else(|| {
        eig_error(
            "eig-no-convergence",
            format!("eigensolver did not converge for batch element {batch_index}"),
        )
    })?;

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|a, b| eigen.eigenvalues[*a].total_cmp(&eigen.eigenvalues[*b]));

    let mut values = ndarray::Array1::<C>::zeros(n);
    let mut vectors = Array2::<C>::zeros((n, n));
    for (slot, source) in order.iter().enumerate() {
        values[slot] = C::new(eigen.eigenvalues[*source], 0.0);
        let column = eigen.eigenvectors.column(*source);
        let mut pivot = ZERO;
        for z in column.iter() {
            if z.norm() > pivot.norm() {
                pivot = *z;
            }
        }
        let phase = if pivot.norm() > 0.0 {
            (pivot / pivot.norm()).conj()
        } else {
            C::new(1.0, 0.0)
        };
        for (row, z) in column.iter().enumerate() {
            vectors[[row, slot]] = z * phase;
        }
    }
    Ok((values, vectors))
}
