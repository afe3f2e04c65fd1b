//! Parameter domains and sampled parameter sets.
//!
//! - `ParameterSpec`: one tunable knob with its kind-specific bounds.
//! - `ParameterSet`: name → value mapping for one candidate. Uses `BTreeMap`
//!   so iteration, export columns, and fingerprints are in a fixed order.

pub mod sampler;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use sampler::{round_to, sample_parameters, sample_value};

// ─── Specs ───────────────────────────────────────────────────────────

/// Domain of a single parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamKind {
    /// Integer drawn uniformly from `[min, max]`.
    Integer { min: i64, max: i64 },
    /// Real drawn uniformly from `[min, max]` and rounded to `decimals` places.
    Real { min: f64, max: f64, decimals: u32 },
    /// Two-valued choice (enabled / disabled).
    Toggle,
}

/// Declared domain of one tunable knob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParamKind,
}

/// Malformed parameter declarations. Fatal: a search never starts with these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidSpecError {
    #[error("parameter '{name}': min {min} is greater than max {max}")]
    InvalidBounds { name: String, min: f64, max: f64 },
    #[error("parameter '{name}': bounds must be finite")]
    NonFiniteBound { name: String },
    #[error("parameter '{name}': {decimals} decimal places is not representable")]
    ExcessiveDecimals { name: String, decimals: u32 },
    #[error("parameter '{0}' is declared more than once")]
    DuplicateName(String),
    #[error("parameter declared with an empty name")]
    EmptyName,
}

impl ParameterSpec {
    pub fn integer(name: &str, min: i64, max: i64) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Integer { min, max },
        }
    }

    pub fn real(name: &str, min: f64, max: f64, decimals: u32) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Real { min, max, decimals },
        }
    }

    pub fn toggle(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Toggle,
        }
    }

    /// Check that the declared bounds are internally consistent.
    pub fn validate(&self) -> Result<(), InvalidSpecError> {
        if self.name.trim().is_empty() {
            return Err(InvalidSpecError::EmptyName);
        }
        match self.kind {
            ParamKind::Integer { min, max } => {
                if min > max {
                    return Err(InvalidSpecError::InvalidBounds {
                        name: self.name.clone(),
                        min: min as f64,
                        max: max as f64,
                    });
                }
            }
            ParamKind::Real { min, max, decimals } => {
                if !min.is_finite() || !max.is_finite() {
                    return Err(InvalidSpecError::NonFiniteBound {
                        name: self.name.clone(),
                    });
                }
                if min > max {
                    return Err(InvalidSpecError::InvalidBounds {
                        name: self.name.clone(),
                        min,
                        max,
                    });
                }
                if decimals > sampler::MAX_DECIMALS {
                    return Err(InvalidSpecError::ExcessiveDecimals {
                        name: self.name.clone(),
                        decimals,
                    });
                }
            }
            ParamKind::Toggle => {}
        }
        Ok(())
    }

    /// True if `value` has this spec's kind and lies within its bounds (inclusive).
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (&self.kind, value) {
            (ParamKind::Integer { min, max }, ParamValue::Int(v)) => v >= min && v <= max,
            (ParamKind::Real { min, max, .. }, ParamValue::Real(v)) => v >= min && v <= max,
            (ParamKind::Toggle, ParamValue::Flag(_)) => true,
            _ => false,
        }
    }
}

/// Validate a full declaration list: every spec individually, plus unique names.
pub fn validate_specs(specs: &[ParameterSpec]) -> Result<(), InvalidSpecError> {
    let mut seen = HashSet::new();
    for spec in specs {
        spec.validate()?;
        if !seen.insert(spec.name.as_str()) {
            return Err(InvalidSpecError::DuplicateName(spec.name.clone()));
        }
    }
    Ok(())
}

// ─── Values ──────────────────────────────────────────────────────────

/// A sampled parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Real(f64),
    Flag(bool),
}

impl ParamValue {
    fn kind_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "integer",
            ParamValue::Real(_) => "real",
            ParamValue::Flag(_) => "toggle",
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Flag(true) => f.write_str("y"),
            ParamValue::Flag(false) => f.write_str("n"),
        }
    }
}

/// Typed lookup failure on a `ParameterSet`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamAccessError {
    #[error("parameter '{0}' is missing")]
    Missing(String),
    #[error("parameter '{name}' is {found}, expected {expected}")]
    WrongKind {
        name: String,
        expected: &'static str,
        found: &'static str,
    },
}

// ─── Parameter set ───────────────────────────────────────────────────

/// Name → value mapping for one candidate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        self.values.insert(name.into(), value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    fn lookup(&self, name: &str) -> Result<&ParamValue, ParamAccessError> {
        self.values
            .get(name)
            .ok_or_else(|| ParamAccessError::Missing(name.to_string()))
    }

    pub fn int(&self, name: &str) -> Result<i64, ParamAccessError> {
        match self.lookup(name)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(wrong_kind(name, "integer", other)),
        }
    }

    pub fn real(&self, name: &str) -> Result<f64, ParamAccessError> {
        match self.lookup(name)? {
            ParamValue::Real(v) => Ok(*v),
            other => Err(wrong_kind(name, "real", other)),
        }
    }

    pub fn flag(&self, name: &str) -> Result<bool, ParamAccessError> {
        match self.lookup(name)? {
            ParamValue::Flag(v) => Ok(*v),
            other => Err(wrong_kind(name, "toggle", other)),
        }
    }

    pub fn set_int(&mut self, name: &str, value: i64) {
        self.values.insert(name.to_string(), ParamValue::Int(value));
    }

    pub fn set_real(&mut self, name: &str, value: f64) {
        self.values.insert(name.to_string(), ParamValue::Real(value));
    }

    pub fn set_flag(&mut self, name: &str, value: bool) {
        self.values.insert(name.to_string(), ParamValue::Flag(value));
    }

    /// Deterministic BLAKE3 fingerprint of names and values.
    ///
    /// Two sets with identical contents always share a fingerprint, regardless
    /// of insertion order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (name, value) in &self.values {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.kind_name().as_bytes());
            hasher.update(b":");
            hasher.update(value.to_string().as_bytes());
            hasher.update(b";");
        }
        hasher.finalize().to_hex().to_string()
    }
}

fn wrong_kind(name: &str, expected: &'static str, found: &ParamValue) -> ParamAccessError {
    ParamAccessError::WrongKind {
        name: name.to_string(),
        expected,
        found: found.kind_name(),
    }
}

impl FromIterator<(String, ParamValue)> for ParameterSet {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
