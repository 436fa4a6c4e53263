//! Construction options and typed scalar values.

use num_complex::{Complex32, Complex64};
use nt_core::{DeviceType, ScalarType};

/// Immutable record describing how a tensor is constructed.
///
/// ```
/// use nt_core::ScalarType;
/// use nt_tensor::TensorOptions;
///
/// let opts = TensorOptions::new(ScalarType::Double).with_requires_grad(true);
/// assert!(opts.requires_grad());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TensorOptions {
    scalar_type: ScalarType,
    device: DeviceType,
    requires_grad: bool,
}

impl TensorOptions {
    /// Options for the given scalar type on the CPU, without gradient tracking.
    pub const fn new(scalar_type: ScalarType) -> Self {
        Self {
            scalar_type,
            device: DeviceType::Cpu,
            requires_grad: false,
        }
    }

    /// Double precision real options.
    pub const fn real() -> Self {
        Self::new(ScalarType::Double)
    }

    /// Double precision complex options.
    pub const fn complex() -> Self {
        Self::new(ScalarType::ComplexDouble)
    }

    /// Copy of `self` with a different scalar type.
    pub const fn with_scalar_type(self, scalar_type: ScalarType) -> Self {
        Self {
            scalar_type,
            ..self
        }
    }

    /// Copy of `self` placed on another device.
    pub const fn with_device(self, device: DeviceType) -> Self {
        Self { device, ..self }
    }

    /// Copy of `self` with gradient tracking switched on or off.
    pub const fn with_requires_grad(self, requires_grad: bool) -> Self {
        Self {
            requires_grad,
            ..self
        }
    }

    /// Scalar type of constructed tensors.
    pub fn scalar_type(&self) -> ScalarType {
        self.scalar_type
    }

    /// Device of constructed tensors.
    pub fn device(&self) -> DeviceType {
        self.device
    }

    /// Whether constructed tensors track gradients.
    pub fn requires_grad(&self) -> bool {
        self.requires_grad
    }
}

/// Single tensor element carried in its declared scalar type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// [`ScalarType::Int`] element.
    Int(i32),
    /// [`ScalarType::Float`] element.
    Float(f32),
    /// [`ScalarType::Double`] element.
    Double(f64),
    /// [`ScalarType::ComplexFloat`] element.
    ComplexFloat(Complex32),
    /// [`ScalarType::ComplexDouble`] element.
    ComplexDouble(Complex64),
}

impl Scalar {
    pub(crate) fn from_storage(value: Complex64, scalar_type: ScalarType) -> Self {
        match scalar_type {
            ScalarType::Int => Scalar::Int(value.re as i32),
            ScalarType::Float => Scalar::Float(value.re as f32),
            ScalarType::Double => Scalar::Double(value.re),
            ScalarType::ComplexFloat => {
                Scalar::ComplexFloat(Complex32::new(value.re as f32, value.im as f32))
            }
            ScalarType::ComplexDouble => Scalar::ComplexDouble(value),
        }
    }

    /// Scalar type of the stored value.
    pub fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Int(_) => ScalarType::Int,
            Scalar::Float(_) => ScalarType::Float,
            Scalar::Double(_) => ScalarType::Double,
            Scalar::ComplexFloat(_) => ScalarType::ComplexFloat,
            Scalar::ComplexDouble(_) => ScalarType::ComplexDouble,
        }
    }

    /// Widens the value to a complex double.
    pub fn to_complex(self) -> Complex64 {
        match self {
            Scalar::Int(v) => Complex64::new(f64::from(v), 0.0),
            Scalar::Float(v) => Complex64::new(f64::from(v), 0.0),
            Scalar::Double(v) => Complex64::new(v, 0.0),
            Scalar::ComplexFloat(v) => Complex64::new(f64::from(v.re), f64::from(v.im)),
            Scalar::ComplexDouble(v) => v,
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Double(value)
    }
}

impl From<Complex64> for Scalar {
    fn from(value: Complex64) -> Self {
        Scalar::ComplexDouble(value)
    }
}
