#![deny(missing_docs)]
//! Batched complex tensor backend for the nt oscillation engine.
//!
//! Values are held in `ndarray` storage of complex doubles; the declared
//! [`ScalarType`](nt_core::ScalarType) acts as a precision policy applied after
//! every operation. Every operation records a node on a reverse-mode tape so
//! gradients can be pulled back to leaf tensors with [`Tensor::backward`].
//!
//! Tensors share their storage through `Rc` and are therefore neither `Send`
//! nor `Sync`.

mod autograd;
mod display;
pub mod index;
mod kernels;
mod linalg;
mod ops;
pub mod options;
mod tensor;

pub use index::Index;
pub use num_complex::Complex64;
pub use options::{Scalar, TensorOptions};
pub use tensor::Tensor;
