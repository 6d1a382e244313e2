//! Registry configuration: presets, TOML/JSON files and `INJECT_*`
//! environment overrides.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "INJECT";
pub const CONFIG_FILE_NAME: &str = "inject.toml";

const DEFAULT_MAX_RESOLUTION_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Longest chain of nested resolutions before `DepthExceeded`
    pub max_resolution_depth: usize,
    /// Log every resolution at debug instead of trace
    pub verbose_logging: bool,
    /// Run `Registry::validate` in `RegistryBuilder::build`
    pub validate_on_build: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_resolution_depth: DEFAULT_MAX_RESOLUTION_DEPTH,
            verbose_logging: false,
            validate_on_build: true,
        }
    }
}

impl RegistryConfig {
    pub fn production() -> Self {
        Self {
            max_resolution_depth: 32,
            verbose_logging: false,
            validate_on_build: true,
        }
    }

    pub fn development() -> Self {
        Self {
            max_resolution_depth: 128,
            verbose_logging: true,
            validate_on_build: true,
        }
    }

    /// No build-time validation, quiet logging; used by tests and benches
    pub fn minimal() -> Self {
        Self {
            max_resolution_depth: 16,
            verbose_logging: false,
            validate_on_build: false,
        }
    }

    /// Preset by name: `production`, `development` or `minimal`
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::production()),
            "development" | "dev" => Ok(Self::development()),
            "minimal" | "test" => Ok(Self::minimal()),
            other => Err(ConfigError::InvalidValue {
                key: "preset".to_string(),
                value: other.to_string(),
            }),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validated()
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content)?;
        config.validated()
    }

    /// Load from a `.toml` or `.json` file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => Self::from_json_str(&content),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }

    /// Write as TOML or JSON depending on the extension
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::to_string_pretty(self)?,
            Some("json") => serde_json::to_string_pretty(self)?,
            other => {
                return Err(ConfigError::UnsupportedFormat(
                    other.unwrap_or("<none>").to_string(),
                ))
            }
        };

        let io_error = |source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        fs::write(path, content).map_err(io_error)
    }

    /// Search `./inject.toml`, then `<config dir>/inject/inject.toml`, fall
    /// back to defaults; environment overrides are applied last.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::search_paths(), env::vars())
    }

    /// Load the first existing file among `paths` (defaults when none
    /// exists), then apply `INJECT_*` overrides from `vars`
    pub fn load_from<P, I, K, V>(paths: P, vars: I) -> Result<Self, ConfigError>
    where
        P: IntoIterator<Item = PathBuf>,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = match paths.into_iter().find(|path| path.is_file()) {
            Some(path) => {
                debug!(path = %path.display(), "loading registry configuration");
                Self::load_from_file(path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides_from(vars)?;
        Ok(config)
    }

    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".").join(CONFIG_FILE_NAME)];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("inject").join(CONFIG_FILE_NAME));
        }
        paths
    }

    /// Apply `INJECT_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(env::vars())
    }

    /// Apply `INJECT_*` overrides from `vars`; unknown keys are ignored
    pub fn apply_env_overrides_from<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let prefix = format!("{}_", ENV_PREFIX);
        for (key, value) in vars {
            let key = key.as_ref();
            let Some(name) = key.strip_prefix(&prefix) else {
                continue;
            };
            let value = value.as_ref().trim();
            match name {
                "MAX_RESOLUTION_DEPTH" => {
                    self.max_resolution_depth = value.parse().map_err(|_| invalid(key, value))?;
                }
                "VERBOSE_LOGGING" => self.verbose_logging = parse_bool(key, value)?,
                "VALIDATE_ON_BUILD" => self.validate_on_build = parse_bool(key, value)?,
                _ => continue,
            }
            debug!(key, value, "applied environment override");
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(invalid("max_resolution_depth", "0"));
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }
}

fn invalid(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = RegistryConfig::from_toml_str("verbose_logging = true").unwrap();
        assert!(config.verbose_logging);
        assert_eq!(config.max_resolution_depth, DEFAULT_MAX_RESOLUTION_DEPTH);
        assert!(config.validate_on_build);
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = RegistryConfig::from_json_str(r#"{"max_resolution_depth": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = RegistryConfig::production();
        config
            .apply_env_overrides_from([
                ("INJECT_MAX_RESOLUTION_DEPTH", "10"),
                ("INJECT_VERBOSE_LOGGING", "yes"),
                ("OTHER_VALUE", "ignored"),
                ("INJECT_UNKNOWN", "ignored"),
            ])
            .unwrap();
        assert_eq!(config.max_resolution_depth, 10);
        assert!(config.verbose_logging);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = RegistryConfig::default();
        let err = config
            .apply_env_overrides_from([("INJECT_VALIDATE_ON_BUILD", "maybe")])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value 'maybe' for INJECT_VALIDATE_ON_BUILD"
        );
    }

    #[test]
    fn test_load_from_takes_first_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let first = dir.path().join("first.toml");
        let second = dir.path().join("second.toml");
        fs::write(&first, "max_resolution_depth = 12").unwrap();
        fs::write(&second, "max_resolution_depth = 99").unwrap();

        let config = RegistryConfig::load_from(
            vec![missing, first, second],
            [("INJECT_VERBOSE_LOGGING", "on")],
        )
        .unwrap();
        assert_eq!(config.max_resolution_depth, 12);
        assert!(config.verbose_logging);
    }

    #[test]
    fn test_load_from_without_files_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = RegistryConfig::load_from(
            vec![dir.path().join(CONFIG_FILE_NAME)],
            Vec::<(String, String)>::new(),
        )
        .unwrap();
        assert_eq!(config, RegistryConfig::default());
    }

    #[test]
    fn test_search_paths_start_in_working_directory() {
        let paths = RegistryConfig::search_paths();
        assert_eq!(paths[0], PathBuf::from(".").join(CONFIG_FILE_NAME));
        assert!(paths.iter().all(|path| path.ends_with(CONFIG_FILE_NAME)));
    }

    #[test]
    fn test_presets_by_name() {
        assert_eq!(RegistryConfig::preset("dev").unwrap(), RegistryConfig::development());
        assert!(RegistryConfig::preset("staging").is_err());
    }
}
