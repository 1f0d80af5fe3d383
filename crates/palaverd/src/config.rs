//! Configuration loading for palaverd.
//!
//! Load order (later wins):
//! 1. Compiled defaults
//! 2. `./palaver.toml`, or the file given with `--config`
//! 3. Environment variables (`PALAVER_*`)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid {key}: {message}")]
    Invalid { key: String, message: String },
}

/// Socket addresses the gateway binds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindConfig {
    pub http_addr: SocketAddr,
    pub rpc_addr: Option<SocketAddr>,
}

impl Default for BindConfig {
    fn default() -> Self {
        Self {
            http_addr: ([127, 0, 0, 1], 8080).into(),
            rpc_addr: None,
        }
    }
}

/// Protocol version settings handed to the negotiator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub supported_versions: Vec<String>,
    pub default_version: Option<String>,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            supported_versions: vec!["1.0.0".to_string()],
            default_version: None,
        }
    }
}

/// Which transports the server runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportsConfig {
    pub http: bool,
    pub stdio: bool,
    pub rpc: bool,
}

impl Default for TransportsConfig {
    fn default() -> Self {
        Self {
            http: true,
            stdio: false,
            rpc: false,
        }
    }
}

/// Base values for one extra sampling profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub temperature: f64,
    pub top_p: f64,
}

/// Complete palaverd configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PalaverConfig {
    pub bind: BindConfig,
    pub protocol: ProtocolConfig,
    pub transports: TransportsConfig,

    /// Extra sampling profiles registered at startup, keyed by name.
    pub sampling: std::collections::BTreeMap<String, ProfileConfig>,
}

impl PalaverConfig {
    /// Load from the default locations plus environment overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::load_file(path)?,
            None => {
                let local = Path::new("palaver.toml");
                if local.exists() {
                    Self::load_file(local)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(std::env::vars())?;
        Ok(config)
    }

    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Apply `PALAVER_*` overrides from an explicit variable list.
    pub fn apply_env(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        for (key, value) in vars {
            match key.as_str() {
                "PALAVER_HTTP_ADDR" => {
                    self.bind.http_addr =
                        value.parse().map_err(|e| ConfigError::Invalid {
                            key,
                            message: format!("{}", e),
                        })?;
                }
                "PALAVER_RPC_ADDR" => {
                    self.bind.rpc_addr =
                        Some(value.parse().map_err(|e| ConfigError::Invalid {
                            key,
                            message: format!("{}", e),
                        })?);
                }
                "PALAVER_SUPPORTED_VERSIONS" => {
                    self.protocol.supported_versions = value
                        .split(',')
                        .map(str::trim)
                        .filter(|v| !v.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                "PALAVER_DEFAULT_VERSION" => {
                    self.protocol.default_version = Some(value);
                }
                "PALAVER_STDIO" => {
                    self.transports.stdio = parse_bool(&key, &value)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => Err(ConfigError::Invalid {
            key: key.to_string(),
            message: format!("expected a boolean, got {:?}", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PalaverConfig::default();
        assert_eq!(config.bind.http_addr.port(), 8080);
        assert_eq!(config.protocol.supported_versions, vec!["1.0.0"]);
        assert!(config.transports.http);
        assert!(!config.transports.stdio);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [bind]
            http_addr = "0.0.0.0:9000"

            [protocol]
            supported_versions = ["0.9.0", "1.0.0"]
            default_version = "0.9.0"

            [transports]
            stdio = true

            [sampling.narration]
            temperature = 0.6
            top_p = 0.85
            "#
        )
        .unwrap();

        let config = PalaverConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind.http_addr.port(), 9000);
        assert_eq!(config.protocol.default_version.as_deref(), Some("0.9.0"));
        assert!(config.transports.stdio);
        // Untouched sections keep their defaults.
        assert!(config.transports.http);

        let narration = &config.sampling["narration"];
        assert_eq!(narration.temperature, 0.6);
        assert_eq!(narration.top_p, 0.85);
    }

    #[test]
    fn test_env_overrides_win() {
        let mut config = PalaverConfig::default();
        config
            .apply_env([
                ("PALAVER_HTTP_ADDR".to_string(), "127.0.0.1:7000".to_string()),
                (
                    "PALAVER_SUPPORTED_VERSIONS".to_string(),
                    "1.0.0, 1.1.0".to_string(),
                ),
                ("PALAVER_STDIO".to_string(), "true".to_string()),
                ("UNRELATED".to_string(), "ignored".to_string()),
            ])
            .unwrap();

        assert_eq!(config.bind.http_addr.port(), 7000);
        assert_eq!(config.protocol.supported_versions, vec!["1.0.0", "1.1.0"]);
        assert!(config.transports.stdio);
    }

    #[test]
    fn test_bad_env_value_is_an_error() {
        let mut config = PalaverConfig::default();
        let err = config
            .apply_env([("PALAVER_HTTP_ADDR".to_string(), "not-an-addr".to_string())])
            .unwrap_err();
        assert!(err.to_string().contains("PALAVER_HTTP_ADDR"));
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "this is not toml [").unwrap();

        let err = PalaverConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
