//! Configuration schema (jinsql.toml)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where the project keeps each kind of SQL file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PathsConfig {
    /// Macro directories
    #[serde(default = "default_macro_paths")]
    pub macros: Vec<String>,

    /// Model directories
    #[serde(default = "default_model_paths")]
    pub models: Vec<String>,

    /// Data test directories
    #[serde(default = "default_test_paths")]
    pub tests: Vec<String>,

    /// Skip files matching these patterns (project-relative, `*` wildcard)
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_macro_paths() -> Vec<String> {
    vec!["macros".to_string()]
}

fn default_model_paths() -> Vec<String> {
    vec!["models".to_string()]
}

fn default_test_paths() -> Vec<String> {
    vec!["tests".to_string()]
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            macros: default_macro_paths(),
            models: default_model_paths(),
            tests: default_test_paths(),
            exclude: Vec::new(),
        }
    }
}

impl PathsConfig {
    /// Check if a project-relative path is excluded
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude.iter().any(|pattern| {
            if pattern.contains('*') {
                glob_match(pattern, path)
            } else {
                pattern == path
            }
        })
    }
}

/// Target the compiled SQL is written for
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TargetConfig {
    /// Target name (dev, prod, etc.)
    #[serde(default = "default_target_name")]
    pub name: String,

    /// Schema models are built into
    #[serde(default = "default_target_schema")]
    pub schema: String,

    /// Optional database/project qualifier
    #[serde(default)]
    pub database: Option<String>,
}

fn default_target_name() -> String {
    "dev".to_string()
}

fn default_target_schema() -> String {
    "public".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            name: default_target_name(),
            schema: default_target_schema(),
            database: None,
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// Project name
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Number of worker threads used to compile files
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// File discovery paths
    #[serde(default)]
    pub paths: PathsConfig,

    /// Compilation target
    #[serde(default)]
    pub target: TargetConfig,

    /// Project variables available through `var()`
    #[serde(default)]
    pub vars: BTreeMap<String, toml::Value>,

    /// Project root path (for resolving relative paths)
    #[serde(skip)]
    pub project_root: PathBuf,
}

fn default_project_name() -> String {
    "jinsql".to_string()
}

fn default_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            threads: default_threads(),
            paths: PathsConfig::default(),
            target: TargetConfig::default(),
            vars: BTreeMap::new(),
            project_root: std::env::current_dir().unwrap_or_default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let mut config = Self::from_toml(&contents)?;

        // Set project root to parent of config file
        if let Some(parent) = path.parent() {
            config.project_root = parent.to_path_buf();
        }

        Ok(config)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        if config.threads == 0 {
            config.threads = default_threads();
        }

        config.project_root = std::env::current_dir().unwrap_or_default();
        Ok(config)
    }
}

/// Simple glob matching (supports a single `*`)
fn glob_match(pattern: &str, text: &str) -> bool {
    if pattern == "*" || pattern == "**" {
        return true;
    }

    if let Some(star_pos) = pattern.find('*') {
        let prefix = &pattern[..star_pos];
        let suffix = &pattern[star_pos + 1..];

        text.len() >= prefix.len() + suffix.len()
            && text.starts_with(prefix)
            && text.ends_with(suffix)
    } else {
        pattern == text
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.paths.models, vec!["models".to_string()]);
        assert_eq!(config.target.schema, "public");
        assert!(config.threads >= 1);
    }

    #[test]
    fn test_parse_full_config() {
        let config = Config::from_toml(
            r#"
            name = "analytics"
            threads = 3

            [paths]
            models = ["models", "marts"]
            exclude = ["models/legacy/*"]

            [target]
            name = "prod"
            schema = "analytics"
            database = "warehouse"

            [vars]
            start_date = "2020-01-01"
            lookback = 7
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "analytics");
        assert_eq!(config.threads, 3);
        assert_eq!(config.paths.models.len(), 2);
        assert_eq!(config.paths.macros, vec!["macros".to_string()]);
        assert_eq!(config.target.database.as_deref(), Some("warehouse"));
        assert_eq!(config.vars.get("lookback"), Some(&toml::Value::Integer(7)));
    }

    #[test]
    fn test_zero_threads_falls_back_to_default() {
        let config = Config::from_toml("threads = 0").unwrap();
        assert!(config.threads >= 1);
    }

    #[test]
    fn test_invalid_toml_is_parse_error() {
        let err = Config::from_toml("threads = [").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_exclude_patterns() {
        let mut paths = PathsConfig::default();
        paths.exclude = vec!["models/legacy/*".to_string(), "models/tmp.sql".to_string()];

        assert!(paths.is_excluded("models/legacy/old.sql"));
        assert!(paths.is_excluded("models/tmp.sql"));
        assert!(!paths.is_excluded("models/users.sql"));
    }

    #[test]
    fn test_glob_matching() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("models/staging/*", "models/staging/users.sql"));
        assert!(glob_match("*.sql", "model.sql"));
        assert!(!glob_match("models/staging/*", "models/marts/users.sql"));
        assert!(!glob_match("ab*ba", "aba"));
    }
}
