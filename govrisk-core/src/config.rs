//! Configuration file support for govrisk
//!
//! Loads ranking and presentation defaults from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.govriskrc.json` in the working directory
//! 3. `govrisk.config.json` in the working directory
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::catalog::Catalog;
use crate::goals::DEFAULT_TOP_CONTRIBUTORS;
use crate::ranking::{GoalWeights, DEFAULT_NEAR_TIE_THRESHOLD};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Preset used when neither config nor CLI names one
pub const DEFAULT_PRESET: &str = "balanced";

/// Largest accepted goal weight
const MAX_WEIGHT: f64 = 100.0;

/// govrisk configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GovriskConfig {
    /// Alternative catalog file (relative paths resolve against the config file)
    #[serde(default)]
    pub catalog: Option<PathBuf>,

    /// Weight preset id (default: balanced)
    #[serde(default)]
    pub preset: Option<String>,

    /// Per-goal weight overrides applied on top of the preset
    #[serde(default)]
    pub weights: BTreeMap<String, f64>,

    /// Score gap under which adjacent ranks are flagged (default: 1e-4)
    #[serde(default)]
    pub near_tie_threshold: Option<f64>,

    /// Contributors listed per goal (default: 5)
    #[serde(default)]
    pub top_contributors: Option<usize>,

    /// Maximum number of rows to show
    #[serde(default)]
    pub top: Option<usize>,
}

/// Resolved configuration with defaults filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub catalog: Option<PathBuf>,
    pub preset: String,
    pub weight_overrides: BTreeMap<String, f64>,
    pub near_tie_threshold: f64,
    pub top_contributors: usize,
    pub top_n: Option<usize>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl GovriskConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(ref preset) = self.preset {
            if preset.trim().is_empty() {
                anyhow::bail!("preset must not be empty");
            }
        }

        for (goal, &w) in &self.weights {
            validate_weight(goal, w)?;
        }

        if let Some(t) = self.near_tie_threshold {
            if !(t.is_finite() && t > 0.0) {
                anyhow::bail!("near_tie_threshold must be positive (got {})", t);
            }
        }

        if self.top_contributors == Some(0) {
            anyhow::bail!("top_contributors must be at least 1");
        }

        Ok(())
    }

    /// Resolve config into its effective form
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        Ok(ResolvedConfig {
            catalog: self.catalog.clone(),
            preset: self
                .preset
                .clone()
                .unwrap_or_else(|| DEFAULT_PRESET.to_string()),
            weight_overrides: self.weights.clone(),
            near_tie_threshold: self.near_tie_threshold.unwrap_or(DEFAULT_NEAR_TIE_THRESHOLD),
            top_contributors: self.top_contributors.unwrap_or(DEFAULT_TOP_CONTRIBUTORS),
            top_n: self.top,
            config_path: None,
        })
    }
}

/// Check a single goal weight is within [0, 100]
pub fn validate_weight(goal: &str, weight: f64) -> Result<()> {
    if !weight.is_finite() || weight < 0.0 {
        anyhow::bail!("weights.{} must be non-negative (got {})", goal, weight);
    }
    if weight > MAX_WEIGHT {
        anyhow::bail!("weights.{} must be at most {} (got {})", goal, MAX_WEIGHT, weight);
    }
    Ok(())
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        GovriskConfig::default().resolve()
    }

    /// Load the configured catalog, or the built-in one
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog {
            Some(path) => Catalog::load(path),
            None => Catalog::builtin(),
        }
    }

    /// Effective goal weights: the preset with overrides applied
    ///
    /// Fails on an unknown preset or when every weight is zero.
    pub fn goal_weights(&self, catalog: &Catalog) -> Result<GoalWeights> {
        let preset = catalog.weight_preset(&self.preset).with_context(|| {
            let known: Vec<&str> = catalog.weight_presets().iter().map(|p| p.id.as_str()).collect();
            format!(
                "unknown weight preset '{}' (available: {})",
                self.preset,
                known.join(", ")
            )
        })?;

        let mut weights = preset.weights.clone();
        for (goal, &w) in &self.weight_overrides {
            validate_weight(goal, w)?;
            if catalog.goal(goal).is_none() {
                tracing::warn!(goal = %goal, "ignoring weight for unknown goal");
            }
            weights.insert(goal.clone(), w);
        }

        let any_positive = catalog
            .goals()
            .iter()
            .any(|g| weights.get(&g.id).copied().unwrap_or(0.0) > 0.0);
        if !any_positive {
            anyhow::bail!("all goal weights are zero; at least one goal must carry weight");
        }

        Ok(weights)
    }
}

/// Discover and load a config file from a directory
///
/// Search order:
/// 1. `.govriskrc.json`
/// 2. `govrisk.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(root: &Path) -> Result<Option<(GovriskConfig, PathBuf)>> {
    for name in [".govriskrc.json", "govrisk.config.json"] {
        let path = root.join(name);
        if path.exists() {
            tracing::debug!(path = %path.display(), "config file discovered");
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<GovriskConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: GovriskConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `root`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(root: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(root)? {
            Some((config, path)) => (config, Some(path)),
            None => (GovriskConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let (Some(catalog), Some(source)) = (&resolved.catalog, &source_path) {
        if catalog.is_relative() {
            if let Some(dir) = source.parent() {
                resolved.catalog = Some(dir.join(catalog));
            }
        }
    }
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = GovriskConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.preset, "balanced");
        assert!(resolved.weight_overrides.is_empty());
        assert_eq!(resolved.near_tie_threshold, 1e-4);
        assert_eq!(resolved.top_contributors, 5);
        assert!(resolved.catalog.is_none());
        assert!(resolved.top_n.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: GovriskConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "catalog": "/data/catalog.json",
            "preset": "fiscal",
            "weights": {"G4": 3.0, "G9": 0.0},
            "near_tie_threshold": 0.001,
            "top_contributors": 3,
            "top": 6
        }"#;
        let config: GovriskConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.catalog, Some(PathBuf::from("/data/catalog.json")));
        assert_eq!(resolved.preset, "fiscal");
        assert_eq!(resolved.weight_overrides.get("G4"), Some(&3.0));
        assert_eq!(resolved.near_tie_threshold, 0.001);
        assert_eq!(resolved.top_contributors, 3);
        assert_eq!(resolved.top_n, Some(6));
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<GovriskConfig, _> = serde_json::from_str(r#"{"unknown_field": true}"#);
        assert!(result.is_err(), "unknown fields should be rejected");
    }

    #[test]
    fn test_reject_negative_weight() {
        let config: GovriskConfig = serde_json::from_str(r#"{"weights": {"G1": -1.0}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_weight_over_100() {
        let config: GovriskConfig = serde_json::from_str(r#"{"weights": {"G1": 101.0}}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_non_positive_threshold() {
        let config: GovriskConfig = serde_json::from_str(r#"{"near_tie_threshold": 0.0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_zero_top_contributors() {
        let config: GovriskConfig = serde_json::from_str(r#"{"top_contributors": 0}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_goal_weights_apply_overrides() {
        let catalog = Catalog::builtin().unwrap();
        let mut resolved = ResolvedConfig::defaults().unwrap();
        resolved.weight_overrides.insert("G1".to_string(), 4.0);
        let weights = resolved.goal_weights(&catalog).unwrap();
        assert_eq!(weights.get("G1"), Some(&4.0));
        assert_eq!(weights.get("G2"), Some(&1.0));
    }

    #[test]
    fn test_goal_weights_unknown_preset() {
        let catalog = Catalog::builtin().unwrap();
        let mut resolved = ResolvedConfig::defaults().unwrap();
        resolved.preset = "nope".to_string();
        let err = resolved.goal_weights(&catalog).unwrap_err();
        assert!(format!("{:#}", err).contains("unknown weight preset"));
    }

    #[test]
    fn test_goal_weights_reject_all_zero() {
        let catalog = Catalog::builtin().unwrap();
        let mut resolved = ResolvedConfig::defaults().unwrap();
        for goal in catalog.goal_ids() {
            resolved.weight_overrides.insert(goal.to_string(), 0.0);
        }
        assert!(resolved.goal_weights(&catalog).is_err());
    }

    #[test]
    fn test_discover_govriskrc() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".govriskrc.json"), r#"{"top": 3}"#).unwrap();

        let result = discover_config(dir.path()).unwrap();
        let (config, path) = result.expect("should find .govriskrc.json");
        assert_eq!(config.top, Some(3));
        assert!(path.ends_with(".govriskrc.json"));
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".govriskrc.json"), r#"{"top": 1}"#).unwrap();
        fs::write(dir.path().join("govrisk.config.json"), r#"{"top": 2}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.top, Some(1), ".govriskrc.json should take priority");
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved.preset, "balanced");
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"preset": "speed", "catalog": "cat.json"}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.preset, "speed");
        assert_eq!(resolved.catalog, Some(dir.path().join("cat.json")));
        assert_eq!(resolved.config_path, Some(config_path));
    }

    #[test]
    fn test_invalid_config_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("bad.json");
        fs::write(&config_path, r#"{"weights": {"G1": -2}}"#).unwrap();

        let err = load_config_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }
}
