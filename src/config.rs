//! Runtime configuration
//!
//! Precedence, lowest first: built-in defaults, `TERN_*` environment
//! variables, a TOML file, explicit CLI flags.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Entry binding called after the module body when none is configured
pub const DEFAULT_ENTRY: &str = "main";

/// Knobs of one interpreter run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Function called after the module body; `None` disables the call
    pub entry_point: Option<String>,
    /// Active calls allowed before a `RecursionError`
    pub max_call_depth: usize,
    /// Scopes allocated between collections; 0 disables collection
    pub gc_threshold: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig {
            entry_point: Some(DEFAULT_ENTRY.to_string()),
            max_call_depth: 1000,
            gc_threshold: 4096,
        }
    }
}

impl RuntimeConfig {
    /// Defaults overridden by `TERN_ENTRY`, `TERN_MAX_DEPTH` and `TERN_GC_THRESHOLD`
    ///
    /// Unparseable numbers are ignored, like an unset variable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`RuntimeConfig::from_env`] with an explicit variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(entry) = lookup("TERN_ENTRY") {
            config.entry_point = if entry.is_empty() { None } else { Some(entry) };
        }
        if let Some(depth) = lookup("TERN_MAX_DEPTH").and_then(|s| s.parse().ok()) {
            config.max_call_depth = depth;
        }
        if let Some(threshold) = lookup("TERN_GC_THRESHOLD").and_then(|s| s.parse().ok()) {
            config.gc_threshold = threshold;
        }
        config
    }

    /// Overlay the keys present in a TOML document
    pub fn merge_toml(mut self, source: &str) -> Result<Self> {
        let overrides: ConfigFile = toml::from_str(source).context("Invalid runtime config")?;
        if let Some(entry) = overrides.entry_point {
            self.entry_point = if entry.is_empty() { None } else { Some(entry) };
        }
        if let Some(depth) = overrides.max_call_depth {
            self.max_call_depth = depth;
        }
        if let Some(threshold) = overrides.gc_threshold {
            self.gc_threshold = threshold;
        }
        Ok(self)
    }

    /// Overlay a TOML config file
    pub fn merge_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        self.merge_toml(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }
}

/// On-disk shape: every key optional, an empty entry disables the call
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    entry_point: Option<String>,
    max_call_depth: Option<usize>,
    gc_threshold: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.entry_point.as_deref(), Some("main"));
        assert_eq!(config.max_call_depth, 1000);
        assert_eq!(config.gc_threshold, 4096);
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<&str, &str> = [
            ("TERN_ENTRY", "start"),
            ("TERN_MAX_DEPTH", "64"),
            ("TERN_GC_THRESHOLD", "not-a-number"),
        ]
        .into_iter()
        .collect();
        let config = RuntimeConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(config.entry_point.as_deref(), Some("start"));
        assert_eq!(config.max_call_depth, 64);
        assert_eq!(config.gc_threshold, 4096);

        let config = RuntimeConfig::from_lookup(|key| {
            (key == "TERN_ENTRY").then(String::new)
        });
        assert_eq!(config.entry_point, None);
    }

    #[test]
    fn test_toml_overlay() {
        let config = RuntimeConfig::default()
            .merge_toml("max_call_depth = 200\ngc_threshold = 0\n")
            .unwrap();
        assert_eq!(config.entry_point.as_deref(), Some("main"));
        assert_eq!(config.max_call_depth, 200);
        assert_eq!(config.gc_threshold, 0);

        let config = RuntimeConfig::default().merge_toml("entry_point = \"\"").unwrap();
        assert_eq!(config.entry_point, None);

        assert!(RuntimeConfig::default().merge_toml("depth = 3").is_err());
    }

    #[test]
    fn test_missing_file_has_context() {
        let err = RuntimeConfig::default()
            .merge_file(Path::new("/nonexistent/tern.toml"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
