//! Scalar and device descriptors for tensors.
//!
//! Both descriptors have stable lower-case names that are resolved through an
//! immutable table built on first use.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, NtError};

/// Numeric scalar type carried by a tensor.
///
/// The ordering of the real precisions is `Int < Float < Double`; complex
/// variants share the precision of their real counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// 32 bit signed integer.
    Int,
    /// Single precision real.
    Float,
    /// Double precision real.
    Double,
    /// Single precision complex.
    ComplexFloat,
    /// Double precision complex.
    #[default]
    ComplexDouble,
}

/// Device a tensor lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    /// Host memory.
    #[default]
    Cpu,
    /// Accelerator memory. Not provided by the bundled backend.
    Gpu,
}

const SCALAR_TYPES: [ScalarType; 5] = [
    ScalarType::Int,
    ScalarType::Float,
    ScalarType::Double,
    ScalarType::ComplexFloat,
    ScalarType::ComplexDouble,
];

fn scalar_names() -> &'static HashMap<&'static str, ScalarType> {
    static NAMES: OnceLock<HashMap<&'static str, ScalarType>> = OnceLock::new();
    NAMES.get_or_init(|| {
        let mut map: HashMap<&'static str, ScalarType> =
            SCALAR_TYPES.iter().map(|ty| (ty.name(), *ty)).collect();
        map.insert("int32", ScalarType::Int);
        map.insert("float32", ScalarType::Float);
        map.insert("float64", ScalarType::Double);
        map.insert("complex64", ScalarType::ComplexFloat);
        map.insert("complex128", ScalarType::ComplexDouble);
        map
    })
}

fn device_names() -> &'static HashMap<&'static str, DeviceType> {
    static NAMES: OnceLock<HashMap<&'static str, DeviceType>> = OnceLock::new();
    NAMES.get_or_init(|| {
        HashMap::from([
            ("cpu", DeviceType::Cpu),
            ("gpu", DeviceType::Gpu),
            ("cuda", DeviceType::Gpu),
        ])
    })
}

impl ScalarType {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "int",
            ScalarType::Float => "float",
            ScalarType::Double => "double",
            ScalarType::ComplexFloat => "complex_float",
            ScalarType::ComplexDouble => "complex_double",
        }
    }

    /// Returns true for the complex variants.
    pub fn is_complex(self) -> bool {
        matches!(self, ScalarType::ComplexFloat | ScalarType::ComplexDouble)
    }

    /// Returns true for everything except [`ScalarType::Int`].
    pub fn is_floating(self) -> bool {
        !matches!(self, ScalarType::Int)
    }

    fn precision(self) -> u8 {
        match self {
            ScalarType::Int => 0,
            ScalarType::Float | ScalarType::ComplexFloat => 1,
            ScalarType::Double | ScalarType::ComplexDouble => 2,
        }
    }

    fn from_parts(precision: u8, complex: bool) -> Self {
        match (precision, complex) {
            (0, false) => ScalarType::Int,
            (1, false) => ScalarType::Float,
            (_, false) => ScalarType::Double,
            (2, true) => ScalarType::ComplexDouble,
            (_, true) => ScalarType::ComplexFloat,
        }
    }

    /// Result type of a binary operation between `self` and `other`.
    pub fn promote(self, other: ScalarType) -> ScalarType {
        Self::from_parts(
            self.precision().max(other.precision()),
            self.is_complex() || other.is_complex(),
        )
    }

    /// Real type with the same precision (`ComplexFloat -> Float`).
    pub fn to_real(self) -> ScalarType {
        Self::from_parts(self.precision(), false)
    }

    /// Complex type with the same precision; `Int` maps to `ComplexFloat`.
    pub fn to_complex(self) -> ScalarType {
        Self::from_parts(self.precision(), true)
    }

    /// Floating type with at least single precision (`Int -> Float`).
    pub fn to_floating(self) -> ScalarType {
        Self::from_parts(self.precision().max(1), self.is_complex())
    }
}

impl DeviceType {
    /// Canonical lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            DeviceType::Cpu => "cpu",
            DeviceType::Gpu => "gpu",
        }
    }

    /// Whether the bundled backend can allocate tensors on this device.
    pub fn is_available(self) -> bool {
        matches!(self, DeviceType::Cpu)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = NtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        scalar_names().get(key.as_str()).copied().ok_or_else(|| {
            NtError::Config(
                ErrorInfo::new("unknown-scalar-type", format!("unknown scalar type '{s}'"))
                    .with_hint("expected one of int, float, double, complex_float, complex_double"),
            )
        })
    }
}

impl FromStr for DeviceType {
    type Err = NtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        device_names().get(key.as_str()).copied().ok_or_else(|| {
            NtError::Config(
                ErrorInfo::new("unknown-device", format!("unknown device '{s}'"))
                    .with_hint("expected cpu or gpu"),
            )
        })
    }
}
