//! Structured error types shared across nt crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Diagnostic payload carried by every [`NtError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable kebab-case code, e.g. `non-positive-energy`.
    pub code: String,
    /// What went wrong, for humans.
    pub message: String,
    /// Offending values keyed by name (shapes, generation counts, positions).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
    /// Suggested fix, when one is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Payload with no context and no hint.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds one context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Records a tensor shape under `key`, rendered as `[a, b, c]`.
    pub fn with_shape(self, key: impl Into<String>, shape: &[usize]) -> Self {
        self.with_context(key, format!("{shape:?}"))
    }

    /// Attaches a remediation hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the nt engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum NtError {
    /// Generation count or tensor shape mismatches at the engine boundary.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Physically invalid inputs such as non-positive energies.
    #[error("domain error: {0}")]
    Domain(ErrorInfo),
    /// Computations requested before the required state was provided.
    #[error("state error: {0}")]
    State(ErrorInfo),
    /// Numeric backend failures (eigensolver, autodiff graph).
    #[error("backend error: {0}")]
    Backend(ErrorInfo),
    /// Unreadable or invalid configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        let mut entries = self.context.iter();
        if let Some((key, value)) = entries.next() {
            write!(f, " {{{key}={value}")?;
            for (key, value) in entries {
                write!(f, ", {key}={value}")?;
            }
            write!(f, "}}")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

impl NtError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            NtError::Shape(info)
            | NtError::Domain(info)
            | NtError::State(info)
            | NtError::Backend(info)
            | NtError::Config(info)
            | NtError::Serde(info) => info,
        }
    }

    /// Returns the stable family name used in serialized payloads.
    pub fn family(&self) -> &'static str {
        match self {
            NtError::Shape(_) => "Shape",
            NtError::Domain(_) => "Domain",
            NtError::State(_) => "State",
            NtError::Backend(_) => "Backend",
            NtError::Config(_) => "Config",
            NtError::Serde(_) => "Serde",
        }
    }
}
