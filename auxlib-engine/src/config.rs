//! Engine configuration.
//!
//! Loaded from JSON when a file is given; every field has a default so a
//! partial file is fine. A missing or malformed file falls back to defaults
//! with a warning rather than failing instance creation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Environment variable naming a JSON config file for the C boundary.
pub const CONFIG_ENV: &str = "AUXLIB_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate used when the host does not ask for one explicitly.
    pub default_sample_rate: u32,
    /// Highest explicit rate accepted at creation.
    pub max_sample_rate: u32,
    /// Longest signal a script may produce, per channel.
    pub max_duration_ms: f64,
    pub limits: ScriptLimits,
    pub paths: DefaultPaths,
}

/// Sandbox limits handed to the script interpreter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_expr_depth: usize,
    pub max_string_size: usize,
}

/// Paths every new instance starts with; the host may override each at creation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultPaths {
    pub wav: String,
    pub aux: String,
    pub data: String,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            max_call_levels: 64,
            max_expr_depth: 128,
            max_string_size: 1 << 20,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_sample_rate: 22_050,
            max_sample_rate: 384_000,
            max_duration_ms: 600_000.0,
            limits: ScriptLimits::default(),
            paths: DefaultPaths::default(),
        }
    }
}

impl EngineConfig {
    /// Load from a JSON file, falling back to defaults on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    tracing::info!(path = %path.display(), "loaded engine configuration");
                    config
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "invalid engine configuration, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "cannot read engine configuration, using defaults");
                Self::default()
            }
        }
    }

    /// Defaults, or the file named by `AUXLIB_CONFIG` when set.
    pub fn from_env() -> Self {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from_file(path),
            None => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "default_sample_rate": 44100, "limits": {{ "max_call_levels": 8 }} }}"#).unwrap();

        let cfg = EngineConfig::load_from_file(file.path());
        assert_eq!(cfg.default_sample_rate, 44_100);
        assert_eq!(cfg.limits.max_call_levels, 8);
        assert_eq!(cfg.limits.max_operations, ScriptLimits::default().max_operations);
        assert_eq!(cfg.max_sample_rate, 384_000);
    }

    #[test]
    fn broken_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert_eq!(EngineConfig::load_from_file(file.path()), EngineConfig::default());
        assert_eq!(EngineConfig::load_from_file("/nonexistent/auxlib.json"), EngineConfig::default());
    }
}
