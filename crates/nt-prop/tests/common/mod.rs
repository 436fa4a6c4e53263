#![allow(dead_code)]

use std::f64::consts::PI;

use nt_core::constants::GROOT2;
use nt_tensor::{Tensor, TensorOptions};

pub const RELATIVE_TOLERANCE: f64 = 5e-5;

/// `|a - b|` relative to the larger magnitude, with an absolute floor for values near zero.
pub fn relative_diff(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if diff < 1e-10 {
        0.0
    } else {
        diff / a.abs().max(b.abs())
    }
}

pub fn assert_close(actual: f64, expected: f64, label: &str) {
    assert!(
        relative_diff(actual, expected) <= RELATIVE_TOLERANCE,
        "{label}: computed {actual}, expected {expected}"
    );
}

/// Mixing matrix `[[cos t, -sin t], [sin t, cos t]]` used by the closed-form references.
pub fn rotation_pmns(theta: f64) -> Tensor {
    let (s, c) = theta.sin_cos();
    Tensor::from_values(&[c, -s, s, c], TensorOptions::complex()).reshape(&[1, 2, 2])
}

pub fn masses(values: &[f64]) -> Tensor {
    Tensor::from_values(values, TensorOptions::real()).add_batch_dim()
}

pub fn energies(values: &[f64]) -> Tensor {
    Tensor::from_values(values, TensorOptions::real()).reshape(&[values.len(), 1])
}

/// Closed-form two-generation propagation after Barger et al., Phys. Rev. D 22, 2718 (1980).
///
/// Written with plain floating point arithmetic so it shares no code with the engine.
/// A non-positive density means vacuum.
pub struct TwoFlavourBarger {
    pub m1: f64,
    pub m2: f64,
    pub theta: f64,
    pub baseline: f64,
    pub density: f64,
}

impl TwoFlavourBarger {
    pub fn vacuum(m1: f64, m2: f64, theta: f64, baseline: f64) -> Self {
        Self {
            m1,
            m2,
            theta,
            baseline,
            density: -1.0,
        }
    }

    /// Characteristic vacuum oscillation length.
    pub fn lv(&self, energy: f64) -> f64 {
        4.0 * PI * energy / (self.m1 * self.m1 - self.m2 * self.m2)
    }

    /// Characteristic matter length.
    pub fn lm(&self) -> f64 {
        2.0 * PI / (GROOT2 * self.density)
    }

    pub fn effective_angle(&self, energy: f64) -> f64 {
        if self.density > 0.0 {
            let ratio = self.lv(energy) / self.lm();
            (2.0 * self.theta).sin().atan2((2.0 * self.theta).cos() - ratio) / 2.0
        } else {
            self.theta
        }
    }

    pub fn effective_dm2(&self, energy: f64) -> f64 {
        let dm2 = self.m1 * self.m1 - self.m2 * self.m2;
        if self.density > 0.0 {
            let ratio = self.lv(energy) / self.lm();
            dm2 * (1.0 - 2.0 * ratio * (2.0 * self.theta).cos() + ratio * ratio).sqrt()
        } else {
            dm2
        }
    }

    /// Effective mixing matrix element `[[cos a, -sin a], [sin a, cos a]]`.
    pub fn pmns_element(&self, energy: f64, alpha: usize, beta: usize) -> f64 {
        let gamma = self.effective_angle(energy);
        match (alpha, beta) {
            (0, 0) | (1, 1) => gamma.cos(),
            (0, 1) => -gamma.sin(),
            (1, 0) => gamma.sin(),
            _ => panic!("two-flavour reference only has flavour indices 0 and 1"),
        }
    }

    pub fn probability(&self, energy: f64, alpha: usize, beta: usize) -> f64 {
        let gamma = self.effective_angle(energy);
        let dm2 = self.effective_dm2(energy);
        let sin2gamma = (2.0 * gamma).sin();
        let sin_phi = (dm2 * self.baseline / (4.0 * energy)).sin();
        let off_axis = sin2gamma * sin2gamma * sin_phi * sin_phi;
        if alpha == beta {
            1.0 - off_axis
        } else {
            off_axis
        }
    }
}
