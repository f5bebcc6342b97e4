#![deny(warnings)]

//! Policy file loading: loss thresholds, keg tiers and reconciliation tolerance.

use cellar_ledger::ReconciliationPolicy;
use cellar_loss::LossPolicy;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid policy file: {0}")]
    Parse(String),
    #[error("invalid policy value: {0}")]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e.to_string())
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self {
        ConfigError::Parse(e.to_string())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct LossSection {
    warning_percent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct KegSection {
    good_max_percent: Option<f64>,
    caution_max_percent: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct ReconciliationSection {
    tolerance_gallons: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct PolicyFile {
    loss: LossSection,
    keg: KegSection,
    reconciliation: ReconciliationSection,
}

/// Effective policy after applying a file over the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Policy {
    pub loss: LossPolicy,
    pub reconciliation: ReconciliationPolicy,
}

fn check(value: f64, name: &str) -> Result<f64, ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "{name} must be a non-negative number, got {value}"
        )));
    }
    Ok(value)
}

impl Policy {
    /// Parse a YAML policy document. Missing keys keep their defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let file: PolicyFile = serde_yaml::from_str(text)?;
        let mut policy = Self::default();
        if let Some(v) = file.loss.warning_percent {
            policy.loss.loss_warning_percent = check(v, "loss.warning_percent")?;
        }
        if let Some(v) = file.keg.good_max_percent {
            policy.loss.keg_good_max_percent = check(v, "keg.good_max_percent")?;
        }
        if let Some(v) = file.keg.caution_max_percent {
            policy.loss.keg_caution_max_percent = check(v, "keg.caution_max_percent")?;
        }
        if let Some(v) = file.reconciliation.tolerance_gallons {
            policy.reconciliation.tolerance_gallons =
                check(v, "reconciliation.tolerance_gallons")?;
        }
        if policy.loss.keg_good_max_percent > policy.loss.keg_caution_max_percent {
            return Err(ConfigError::Invalid(
                "keg.good_max_percent must not exceed keg.caution_max_percent".to_string(),
            ));
        }
        Ok(policy)
    }

    /// Load a policy file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let policy = Self::from_yaml_str(&text)?;
        info!(path = %path.display(), ?policy, "policy loaded");
        Ok(policy)
    }

    /// Load from `path` if given, otherwise use defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Policy::from_yaml_str("").unwrap(), Policy::default());
        assert_eq!(Policy::from_yaml_str("{}").unwrap(), Policy::default());
    }

    #[test]
    fn partial_override() {
        let p = Policy::from_yaml_str("loss:\n  warning_percent: 7.5\n").unwrap();
        assert_eq!(p.loss.loss_warning_percent, 7.5);
        assert_eq!(p.loss.keg_good_max_percent, 2.0);
        assert_eq!(p.reconciliation.tolerance_gallons, 0.5);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Policy::from_yaml_str("loss:\n  warning_percent: -1\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Policy::from_yaml_str("keg:\n  good_max_percent: 6\n"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Policy::from_yaml_str("los:\n  warning_percent: 5\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn shipped_policy_loads() {
        let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../assets/policy.yaml");
        let p = Policy::load(&path).unwrap();
        assert_eq!(p.loss.loss_warning_percent, 10.0);
        assert_eq!(p.loss.keg_caution_max_percent, 5.0);
        assert_eq!(p.reconciliation.tolerance_gallons, 0.5);
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            Policy::load("/nonexistent/policy.yaml"),
            Err(ConfigError::Io(_))
        ));
        assert_eq!(
            Policy::load_or_default(None::<&str>).unwrap(),
            Policy::default()
        );
    }
}
