//! Configuration structures for the rwatch tool.
//!
//! - [`WatchConfig`] - recursive watcher settings (channel buffering, walk exclusions)
//! - [`Config`] - root configuration, loadable from a JSON file
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a configuration file only needs the keys it overrides.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Directory names excluded from the initial walk unless configured otherwise.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git"];

/// Configuration for the recursive watcher.
///
/// # Examples
///
/// ```
/// use rw_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert_eq!(config.event_buffer, 0);
/// assert_eq!(config.exclude_dirs, vec![".git"]);
/// assert!(config.include_hidden);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Capacity of the public event channel.
    ///
    /// `0` selects the unbuffered watcher, where every forwarded event waits
    /// for the consumer.
    pub event_buffer: usize,

    /// Directory names skipped (with their whole subtree) by the initial walk.
    ///
    /// Matched against the final path component only. Directories created
    /// after the walk are always watched.
    pub exclude_dirs: Vec<String>,

    /// Whether hidden directories (names starting with `.`) are walked.
    pub include_hidden: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            event_buffer: 0,
            exclude_dirs: DEFAULT_EXCLUDE_DIRS
                .iter()
                .map(|s| (*s).to_owned())
                .collect(),
            include_hidden: true,
        }
    }
}

impl WatchConfig {
    /// Returns `true` if the public event channel is buffered.
    #[inline]
    #[must_use]
    pub const fn is_buffered(&self) -> bool {
        self.event_buffer > 0
    }

    /// Checks that every option holds a usable value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if an exclusion entry is empty
    /// or contains a path separator.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for name in &self.exclude_dirs {
            if name.is_empty() {
                return Err(ConfigError::invalid_option(
                    "exclude_dirs",
                    "entries must not be empty",
                ));
            }
            if name.contains(['/', '\\']) {
                return Err(ConfigError::invalid_option(
                    "exclude_dirs",
                    format!("'{name}' must be a directory name, not a path"),
                ));
            }
        }
        Ok(())
    }
}

/// Root configuration for the rwatch tool.
///
/// # Examples
///
/// ```
/// use rw_core::Config;
///
/// let config: Config = serde_json::from_str(r#"{"watch": {"event_buffer": 64}}"#).unwrap();
/// assert_eq!(config.watch.event_buffer, 64);
/// assert_eq!(config.watch.exclude_dirs, vec![".git"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recursive watcher configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Loads and validates a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist,
    /// [`ConfigError::Io`] or [`ConfigError::Parse`] if it cannot be read or
    /// parsed, and [`ConfigError::InvalidOption`] if validation fails.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_owned()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.watch.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.event_buffer, 0);
        assert!(!config.is_buffered());
        assert_eq!(config.exclude_dirs, vec![".git"]);
        assert!(config.include_hidden);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_default_snapshot() {
        insta::assert_json_snapshot!(Config::default(), @r#"
        {
          "watch": {
            "event_buffer": 0,
            "exclude_dirs": [
              ".git"
            ],
            "include_hidden": true
          }
        }
        "#);
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"watch": {"event_buffer": 100}}"#;
        let config: Config = serde_json::from_str(json).expect("Failed to parse JSON");
        assert_eq!(config.watch.event_buffer, 100);
        assert!(config.watch.is_buffered());
        assert_eq!(config.watch.exclude_dirs, vec![".git"]);
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let config = WatchConfig {
            exclude_dirs: vec![String::new()],
            ..WatchConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_paths() {
        let config = WatchConfig {
            exclude_dirs: vec!["target/debug".to_owned()],
            ..WatchConfig::default()
        };
        let err = config.validate().expect_err("validate should fail");
        assert!(err.to_string().contains("target/debug"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("rwatch.json"))
            .expect("Invalid UTF-8 path");
        std::fs::write(
            &path,
            r#"{"watch": {"exclude_dirs": ["node_modules", "target"], "include_hidden": false}}"#,
        )
        .expect("Failed to write file");

        let config = Config::load(&path).expect("Failed to load config");
        assert_eq!(config.watch.exclude_dirs, vec!["node_modules", "target"]);
        assert!(!config.watch.include_hidden);
        assert_eq!(config.watch.event_buffer, 0);
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load(Utf8Path::new("/nonexistent/rwatch.json"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("rwatch.json"))
            .expect("Invalid UTF-8 path");
        std::fs::write(&path, "{ watch: ").expect("Failed to write file");

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
