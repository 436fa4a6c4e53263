//! Serde-driven description of a propagator and its oscillation parameters.

use std::fs;
use std::path::Path;

use nt_core::{ErrorInfo, NtError, ScalarType};
use nt_tensor::{Tensor, TensorOptions};
use serde::{Deserialize, Serialize};

use crate::matter::ConstDensitySolver;
use crate::pmns;
use crate::propagator::Propagator;

fn config_error(code: &str, message: impl Into<String>) -> NtError {
    NtError::Config(ErrorInfo::new(code, message))
}

fn serde_error(code: &str, err: impl ToString) -> NtError {
    NtError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn default_generations() -> usize {
    3
}

fn default_scalar_type() -> ScalarType {
    ScalarType::ComplexDouble
}

/// Uniform-density matter along the baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatterConfig {
    /// Electron density in g/cm³.
    pub density: f64,
}

/// Mixing angles in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MixingAngles {
    /// Single rotation angle between two generations.
    TwoFlavour {
        /// Rotation angle.
        theta: f64,
    },
    /// Standard three-generation parametrisation.
    ThreeFlavour {
        /// Solar angle.
        theta12: f64,
        /// Reactor angle.
        theta13: f64,
        /// Atmospheric angle.
        theta23: f64,
        /// CP-violating phase, zero when omitted.
        #[serde(default)]
        delta_cp: f64,
    },
}

impl MixingAngles {
    /// Number of generations the angles describe.
    pub fn generations(&self) -> usize {
        match self {
            MixingAngles::TwoFlavour { .. } => 2,
            MixingAngles::ThreeFlavour { .. } => 3,
        }
    }
}

/// Masses and mixing angles that fully determine vacuum propagation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OscillationParams {
    /// Mass eigenvalues, one per generation.
    pub masses: Vec<f64>,
    /// Mixing angles; they also fix the generation count.
    pub mixing: MixingAngles,
}

impl OscillationParams {
    /// Number of generations the mixing angles describe.
    pub fn generations(&self) -> usize {
        self.mixing.generations()
    }

    /// Checks that there is one finite mass per generation.
    pub fn validate(&self) -> Result<(), NtError> {
        if self.masses.len() != self.generations() {
            return Err(NtError::Config(
                ErrorInfo::new("masses-generations", "mass count does not match the mixing angles")
                    .with_context("masses", self.masses.len().to_string())
                    .with_context("generations", self.generations().to_string()),
            ));
        }
        if self.masses.iter().any(|m| !m.is_finite()) {
            return Err(config_error("invalid-mass", "masses must be finite"));
        }
        Ok(())
    }

    /// `[1, G]` real mass tensor.
    pub fn masses_tensor(&self, options: TensorOptions) -> Tensor {
        let options = options.with_scalar_type(options.scalar_type().to_real().to_floating());
        Tensor::from_values(&self.masses, options).add_batch_dim()
    }

    /// `[1, G, G]` complex mixing matrix.
    pub fn pmns_tensor(&self, options: TensorOptions) -> Tensor {
        let options = options.with_scalar_type(options.scalar_type().to_complex());
        match self.mixing {
            MixingAngles::TwoFlavour { theta } => pmns::two_flavour(theta, options),
            MixingAngles::ThreeFlavour {
                theta12,
                theta13,
                theta23,
                delta_cp,
            } => pmns::three_flavour(theta12, theta13, theta23, delta_cp, options),
        }
    }

    /// Sets masses and mixing matrix on `propagator`.
    pub fn apply(&self, propagator: &mut Propagator, options: TensorOptions) -> Result<(), NtError> {
        self.validate()?;
        propagator.set_masses(&self.masses_tensor(options))?;
        propagator.set_pmns(&self.pmns_tensor(options))
    }
}

/// Everything needed to build a [`Propagator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagatorConfig {
    /// Number of neutrino generations, 3 when omitted.
    #[serde(default = "default_generations")]
    pub generations: usize,
    /// Baseline in km.
    pub baseline: f64,
    /// Constant-density matter; vacuum when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matter: Option<MatterConfig>,
    /// Scalar type of the tensors built from `oscillation`.
    #[serde(default = "default_scalar_type")]
    pub scalar_type: ScalarType,
    /// Masses and mixing angles; the propagator is left unset when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oscillation: Option<OscillationParams>,
}

impl PropagatorConfig {
    /// Parses a YAML document without validating it.
    pub fn from_yaml_str(input: &str) -> Result<Self, NtError> {
        serde_yaml::from_str(input).map_err(|err| serde_error("yaml-deserialize", err))
    }

    /// Parses a JSON document without validating it.
    pub fn from_json_str(input: &str) -> Result<Self, NtError> {
        serde_json::from_str(input).map_err(|err| serde_error("json-deserialize", err))
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml_string(&self) -> Result<String, NtError> {
        serde_yaml::to_string(self).map_err(|err| serde_error("yaml-serialize", err))
    }

    /// Renders the configuration as pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, NtError> {
        serde_json::to_string_pretty(self).map_err(|err| serde_error("json-serialize", err))
    }

    /// Reads a `.yaml`/`.yml` or `.json` file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NtError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            NtError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let config = match extension.as_deref() {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&text)?,
            Some("json") => Self::from_json_str(&text)?,
            _ => {
                return Err(NtError::Config(
                    ErrorInfo::new("config-extension", "unsupported configuration file type")
                        .with_context("path", path.display().to_string())
                        .with_hint("use a .yaml, .yml or .json file"),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks generation count, baseline, density and oscillation parameters.
    pub fn validate(&self) -> Result<(), NtError> {
        if self.generations == 0 {
            return Err(config_error("invalid-generations", "generations must be at least 1"));
        }
        if !(self.baseline.is_finite() && self.baseline > 0.0) {
            return Err(config_error(
                "invalid-baseline",
                format!("baseline must be finite and positive, got {}", self.baseline),
            ));
        }
        if let Some(matter) = &self.matter {
            if !(matter.density.is_finite() && matter.density >= 0.0) {
                return Err(config_error(
                    "invalid-density",
                    format!("density must be finite and non-negative, got {}", matter.density),
                ));
            }
        }
        if let Some(oscillation) = &self.oscillation {
            oscillation.validate()?;
            if oscillation.generations() != self.generations {
                return Err(NtError::Config(
                    ErrorInfo::new(
                        "oscillation-generations",
                        "oscillation parameters describe a different generation count",
                    )
                    .with_context("config", self.generations.to_string())
                    .with_context("oscillation", oscillation.generations().to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Options used for tensors built from this configuration.
    pub fn tensor_options(&self) -> TensorOptions {
        TensorOptions::new(self.scalar_type)
    }
}

impl Propagator {
    /// Builds a propagator, attaching a matter solver and applying the
    /// oscillation parameters when the configuration provides them.
    pub fn from_config(config: &PropagatorConfig) -> Result<Self, NtError> {
        config.validate()?;
        let mut propagator = Propagator::new(config.generations, config.baseline);
        if let Some(matter) = &config.matter {
            propagator.set_matter_solver(Box::new(ConstDensitySolver::new(
                config.generations,
                matter.density,
            )))?;
        }
        if let Some(oscillation) = &config.oscillation {
            oscillation.apply(&mut propagator, config.tensor_options())?;
        }
        log::debug!(
            "built propagator: generations={}, baseline={}, matter={}",
            config.generations,
            config.baseline,
            config.matter.is_some()
        );
        Ok(propagator)
    }
}
