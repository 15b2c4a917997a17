//! Project configuration
//!
//! Read from `.octp.yml` at the repository root. The file is optional; when
//! it is absent every setting takes its default. Command-line flags override
//! whatever the file says.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::checks::{Profile, RunnerKind, DEFAULT_MAX_WORKERS, DEFAULT_PROFILE};
use crate::error::{OctpError, Result};

pub const CONFIG_FILE_NAME: &str = ".octp.yml";

/// Environment variable that overrides the key directory
pub const KEYS_DIR_ENV: &str = "OCTP_KEYS_DIR";

/// Default envelope path, relative to the repository root
pub const DEFAULT_OUTPUT: &str = "octp-envelope.json";

fn default_profile() -> String {
    DEFAULT_PROFILE.to_string()
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_output() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT)
}

fn default_enabled() -> bool {
    true
}

/// Per-runner overrides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_seconds: None,
        }
    }
}

/// Contents of `.octp.yml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OctpConfig {
    #[serde(default = "default_profile")]
    pub profile: String,

    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    #[serde(default)]
    pub keys_dir: Option<PathBuf>,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Keyed by runner identity (`test`, `lint`, ...)
    #[serde(default)]
    pub runners: BTreeMap<String, RunnerSettings>,
}

impl Default for OctpConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            max_workers: default_max_workers(),
            keys_dir: None,
            output: default_output(),
            runners: BTreeMap::new(),
        }
    }
}

impl OctpConfig {
    /// Load `.octp.yml` from `repo_root`, falling back to defaults when the
    /// file does not exist
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            debug!("No {} at {}, using defaults", CONFIG_FILE_NAME, repo_root.display());
            return Ok(Self::default());
        }

        info!("Loading configuration from {}", path.display());
        Self::load_from(&path)
    }

    /// Load and validate a specific config file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| OctpError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    fn from_yaml(content: &str, path: &Path) -> Result<Self> {
        // An empty file is a valid, all-default config
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: OctpConfig =
            serde_yaml_ng::from_str(content).map_err(|source| OctpError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject unknown profile and runner names and a zero worker count
    pub fn validate(&self) -> Result<()> {
        self.profile.parse::<Profile>()?;

        if self.max_workers == 0 {
            return Err(OctpError::Configuration(
                "max_workers must be at least 1".to_string(),
            ));
        }

        for (name, settings) in &self.runners {
            name.parse::<RunnerKind>()?;
            if settings.timeout_seconds == Some(0) {
                return Err(OctpError::Configuration(format!(
                    "runner '{name}' has a zero timeout"
                )));
            }
        }

        Ok(())
    }

    pub fn runner_settings(&self, kind: RunnerKind) -> Option<&RunnerSettings> {
        self.runners.get(kind.as_str())
    }

    /// Key directory by precedence: explicit path, `OCTP_KEYS_DIR`, the
    /// config file, then `~/.octp/keys`
    pub fn resolve_keys_dir(&self, explicit: Option<PathBuf>) -> PathBuf {
        if let Some(dir) = explicit {
            return dir;
        }
        if let Some(dir) = std::env::var_os(KEYS_DIR_ENV).filter(|v| !v.is_empty()) {
            return PathBuf::from(dir);
        }
        if let Some(dir) = &self.keys_dir {
            return dir.clone();
        }
        default_keys_dir()
    }
}

/// `~/.octp/keys`
pub fn default_keys_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || {
            let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_owned());
            PathBuf::from(home).join(".octp").join("keys")
        },
        |dirs| dirs.home_dir().join(".octp").join("keys"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    #[test]
    fn test_missing_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = OctpConfig::load(tmp.path()).unwrap();
        assert_eq!(config, OctpConfig::default());
        assert_eq!(config.profile, "full");
        assert_eq!(config.max_workers, 4);
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
profile: ci
max_workers: 2
keys_dir: /tmp/octp-keys
output: build/envelope.json
runners:
  test:
    timeout_seconds: 300
  security-scan-deep:
    enabled: false
"#;
        let config = OctpConfig::from_yaml(yaml, Path::new(CONFIG_FILE_NAME)).unwrap();

        assert_eq!(config.profile, "ci");
        assert_eq!(config.max_workers, 2);
        assert_eq!(config.keys_dir, Some(PathBuf::from("/tmp/octp-keys")));
        assert_eq!(config.output, PathBuf::from("build/envelope.json"));

        let test = config.runner_settings(RunnerKind::Test).unwrap();
        assert!(test.enabled);
        assert_eq!(test.timeout_seconds, Some(300));

        let deep = config.runner_settings(RunnerKind::SecurityScanDeep).unwrap();
        assert!(!deep.enabled);
    }

    #[test]
    fn test_unknown_runner_rejected() {
        let yaml = "runners:\n  flake8:\n    enabled: false\n";
        let result = OctpConfig::from_yaml(yaml, Path::new(CONFIG_FILE_NAME));
        assert!(matches!(result, Err(OctpError::UnknownRunner { .. })));
    }

    #[test]
    fn test_unknown_profile_rejected() {
        let result = OctpConfig::from_yaml("profile: paranoid\n", Path::new(CONFIG_FILE_NAME));
        assert!(matches!(result, Err(OctpError::UnknownProfile { .. })));
    }

    #[test]
    fn test_malformed_yaml_is_parse_error() {
        let result = OctpConfig::from_yaml("max_workers: [oops", Path::new(CONFIG_FILE_NAME));
        assert!(matches!(result, Err(OctpError::ConfigParse { .. })));
    }

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = OctpConfig::from_yaml("\n", Path::new(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, OctpConfig::default());
    }

    #[test]
    #[serial]
    fn test_keys_dir_precedence() {
        let config = OctpConfig {
            keys_dir: Some(PathBuf::from("/from/config")),
            ..OctpConfig::default()
        };

        std::env::set_var(KEYS_DIR_ENV, "/from/env");
        assert_eq!(
            config.resolve_keys_dir(Some(PathBuf::from("/explicit"))),
            PathBuf::from("/explicit")
        );
        assert_eq!(config.resolve_keys_dir(None), PathBuf::from("/from/env"));

        std::env::remove_var(KEYS_DIR_ENV);
        assert_eq!(config.resolve_keys_dir(None), PathBuf::from("/from/config"));

        let bare = OctpConfig::default();
        assert!(bare.resolve_keys_dir(None).ends_with(".octp/keys"));
    }
}
