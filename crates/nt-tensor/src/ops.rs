//! Elementwise arithmetic, shape manipulation and reductions.

use std::ops::{Add, Div, Mul, Neg, Sub};

use ndarray::{ArrayD, Axis, IxDyn};
use num_complex::Complex64;
use nt_core::ScalarType;

use crate::autograd::Op;
use crate::kernels::{self, C};
use crate::tensor::Tensor;

/// Result type when a tensor of `ty` is combined with the constant `s`.
fn with_constant(ty: ScalarType, s: C) -> ScalarType {
    let ty = if s.im != 0.0 { ty.to_complex() } else { ty };
    if s.re.fract() != 0.0 {
        ty.to_floating()
    } else {
        ty
    }
}

impl Tensor {
    fn binary(&self, other: &Tensor, scalar_type: ScalarType, op: Op, f: fn(C, C) -> C) -> Tensor {
        let data = kernels::zip_with(&self.data(), &other.data(), f);
        Tensor::from_op(data, scalar_type, op, &[self, other])
    }

    fn unary(&self, scalar_type: ScalarType, op: Op, f: impl Fn(C) -> C) -> Tensor {
        let data = self.data().mapv(f);
        Tensor::from_op(data, scalar_type, op, &[self])
    }

    /// Elementwise sum under broadcasting.
    pub fn add(&self, other: &Tensor) -> Tensor {
        let ty = self.scalar_type().promote(other.scalar_type());
        self.binary(other, ty, Op::Add, |a, b| a + b)
    }

    /// Elementwise difference under broadcasting.
    pub fn sub(&self, other: &Tensor) -> Tensor {
        let ty = self.scalar_type().promote(other.scalar_type());
        self.binary(other, ty, Op::Sub, |a, b| a - b)
    }

    /// Elementwise (Hadamard) product under broadcasting.
    pub fn mul(&self, other: &Tensor) -> Tensor {
        let ty = self.scalar_type().promote(other.scalar_type());
        self.binary(other, ty, Op::Mul, |a, b| a * b)
    }

    /// Elementwise quotient under broadcasting. Always floating point.
    pub fn div(&self, other: &Tensor) -> Tensor {
        let ty = self.scalar_type().promote(other.scalar_type()).to_floating();
        self.binary(other, ty, Op::Div, |a, b| a / b)
    }

    /// Elementwise negation.
    pub fn neg(&self) -> Tensor {
        self.unary(self.scalar_type(), Op::Neg, |z| -z)
    }

    /// Multiplies every element by a real or complex constant.
    pub fn scale(&self, factor: impl Into<Complex64>) -> Tensor {
        let s = factor.into();
        self.unary(with_constant(self.scalar_type(), s), Op::Scale(s), |z| z * s)
    }

    /// Raises every element to a real or complex power (principal branch).
    pub fn pow(&self, exponent: impl Into<Complex64>) -> Tensor {
        let s = exponent.into();
        let ty = with_constant(self.scalar_type(), s).to_floating();
        self.unary(ty, Op::Pow(s), |z| z.powc(s))
    }

    /// Elementwise exponential. Always floating point.
    pub fn exp(&self) -> Tensor {
        let out = self.data().mapv(|z| z.exp());
        let ty = self.scalar_type().to_floating();
        let out = kernels::quantize(out, ty);
        Tensor::from_op(out.clone(), ty, Op::Exp { out }, &[self])
    }

    /// Elementwise sine.
    pub fn sin(&self) -> Tensor {
        self.unary(self.scalar_type().to_floating(), Op::Sin, |z| z.sin())
    }

    /// Elementwise cosine.
    pub fn cos(&self) -> Tensor {
        self.unary(self.scalar_type().to_floating(), Op::Cos, |z| z.cos())
    }

    /// Complex conjugate; the identity on real tensors.
    pub fn conj(&self) -> Tensor {
        self.unary(self.scalar_type(), Op::Conj, |z| z.conj())
    }

    /// Real part, as a real tensor.
    pub fn real(&self) -> Tensor {
        self.unary(self.scalar_type().to_real(), Op::Real, |z| C::new(z.re, 0.0))
    }

    /// Imaginary part, as a real tensor.
    pub fn imag(&self) -> Tensor {
        self.unary(self.scalar_type().to_real(), Op::Imag, |z| C::new(z.im, 0.0))
    }

    /// Elementwise magnitude `|z|`.
    pub fn abs(&self) -> Tensor {
        self.unary(self.scalar_type().to_real(), Op::Abs, |z| C::new(z.norm(), 0.0))
    }

    /// Elementwise squared magnitude `|z|^2`.
    pub fn abs_sq(&self) -> Tensor {
        self.unary(self.scalar_type().to_real(), Op::AbsSq, |z| {
            C::new(z.norm_sqr(), 0.0)
        })
    }

    /// Elementwise phase `arg(z)` in `(-pi, pi]`.
    pub fn angle(&self) -> Tensor {
        let ty = self.scalar_type().to_real().to_floating();
        self.unary(ty, Op::Angle, |z| C::new(z.arg(), 0.0))
    }

    /// Same elements laid out in a new shape with the same element count.
    pub fn reshape(&self, shape: &[usize]) -> Tensor {
        let data = self.data();
        let count: usize = shape.iter().product();
        assert_eq!(
            count,
            data.len(),
            "cannot reshape {:?} into {shape:?}",
            data.shape()
        );
        let reshaped = data
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(shape))
            .unwrap_or_else(|_| unreachable!("element count checked above"));
        drop(data);
        Tensor::from_op(reshaped, self.scalar_type(), Op::Reshape, &[self])
    }

    /// Inserts an axis of length one at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Tensor {
        let mut shape = self.shape();
        assert!(dim <= shape.len(), "unsqueeze position {dim} beyond rank {}", shape.len());
        shape.insert(dim, 1);
        self.reshape(&shape)
    }

    /// Removes the axis `dim`, which must have length one.
    pub fn squeeze_dim(&self, dim: usize) -> Tensor {
        let mut shape = self.shape();
        assert!(
            shape.get(dim) == Some(&1),
            "cannot squeeze axis {dim} of shape {shape:?}"
        );
        shape.remove(dim);
        self.reshape(&shape)
    }

    /// Prepends a batch axis of length one.
    pub fn add_batch_dim(&self) -> Tensor {
        self.unsqueeze(0)
    }

    /// Swaps two axes.
    pub fn transpose(&self, d1: usize, d2: usize) -> Tensor {
        let ndim = self.ndim();
        assert!(
            d1 < ndim && d2 < ndim,
            "transpose axes ({d1}, {d2}) out of range for rank {ndim}"
        );
        let data = kernels::transpose_axes(&self.data(), d1, d2);
        Tensor::from_op(data, self.scalar_type(), Op::Transpose(d1, d2), &[self])
    }

    /// Sum of all elements as a rank-0 tensor.
    pub fn sum(&self) -> Tensor {
        let total = self.data().sum();
        let data = ArrayD::from_elem(IxDyn(&[]), total);
        Tensor::from_op(data, self.scalar_type(), Op::Sum, &[self])
    }

    /// Sums over the listed axes, removing them from the shape.
    pub fn sum_dims(&self, dims: &[usize]) -> Tensor {
        let ndim = self.ndim();
        let mut dims = dims.to_vec();
        dims.sort_unstable();
        dims.dedup();
        assert!(
            dims.iter().all(|d| *d < ndim),
            "sum axes {dims:?} out of range for rank {ndim}"
        );
        let mut data = self.data_clone();
        for dim in dims.iter().rev() {
            data = data.sum_axis(Axis(*dim));
        }
        Tensor::from_op(data, self.scalar_type(), Op::SumDims(dims), &[self])
    }

    /// Running sum along `dim`.
    pub fn cumsum(&self, dim: usize) -> Tensor {
        assert!(dim < self.ndim(), "cumsum axis {dim} out of range for rank {}", self.ndim());
        let data = kernels::cumsum(&self.data(), dim, false);
        Tensor::from_op(data, self.scalar_type(), Op::CumSum(dim), &[self])
    }
}

macro_rules! impl_binary_operator {
    ($trait:ident, $method:ident) => {
        impl $trait<&Tensor> for &Tensor {
            type Output = Tensor;

            fn $method(self, rhs: &Tensor) -> Tensor {
                Tensor::$method(self, rhs)
            }
        }

        impl $trait<Tensor> for Tensor {
            type Output = Tensor;

            fn $method(self, rhs: Tensor) -> Tensor {
                Tensor::$method(&self, &rhs)
            }
        }

        impl $trait<&Tensor> for Tensor {
            type Output = Tensor;

            fn $method(self, rhs: &Tensor) -> Tensor {
                Tensor::$method(&self, rhs)
            }
        }
    };
}

impl_binary_operator!(Add, add);
impl_binary_operator!(Sub, sub);
impl_binary_operator!(Mul, mul);
impl_binary_operator!(Div, div);

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::neg(self)
    }
}

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Tensor {
        Tensor::neg(&self)
    }
}
