//! `Display` rendering of tensors.

use std::fmt;

use crate::tensor::Tensor;

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "tensor(shape={:?}, dtype={}, device={}{})",
            self.shape(),
            self.scalar_type(),
            self.device(),
            if self.requires_grad() { ", requires_grad" } else { "" }
        )?;
        let ty = self.scalar_type();
        if ty.is_complex() {
            write!(f, "{}", self.to_array())
        } else if ty.is_floating() {
            write!(f, "{}", self.to_real_array())
        } else {
            write!(f, "{}", self.to_real_array().mapv(|v| v as i64))
        }
    }
}
