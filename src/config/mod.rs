// Configuration module
//
// YAML server configuration with ${VAR} environment substitution. The rule
// file is separate (see `rules`); this file says where it is.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cache::CacheConfig;
use crate::constants::{DEFAULT_ADDRESS, DEFAULT_MAX_BODY_SIZE, DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT_SECS};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_body_size() -> usize {
    DEFAULT_MAX_BODY_SIZE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds allowed for one request, including reading the body
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// Largest request body accepted, in bytes
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            max_body_size: default_max_body_size(),
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

/// Where resources are served from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Document root directory
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// URL prefix the site is mounted under, e.g. `/static`; empty for `/`
    #[serde(default)]
    pub context_path: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            context_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Rule file; the bundled rules are used when unset
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Fall back to the bundled rules when the file cannot be loaded
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl Config {
    pub fn from_yaml_with_env(yaml: &str) -> Result<Self, String> {
        // Replace ${VAR_NAME} with environment variable values
        let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").map_err(|e| e.to_string())?;

        for caps in re.captures_iter(yaml) {
            let var_name = &caps[1];
            std::env::var(var_name).map_err(|_| {
                format!(
                    "Environment variable '{}' is referenced but not set",
                    var_name
                )
            })?;
        }

        let substituted = re.replace_all(yaml, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_default()
        });

        serde_yaml::from_str(&substituted).map_err(|e| e.to_string())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::from_yaml_with_env(&yaml)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.server.address.is_empty() {
            return Err("server.address cannot be empty".to_string());
        }
        if self.server.request_timeout == 0 {
            return Err("server.request_timeout must be greater than 0".to_string());
        }

        let context = &self.site.context_path;
        if !context.is_empty() && !context.starts_with('/') {
            return Err(format!(
                "site.context_path '{}' must be empty or start with /",
                context
            ));
        }
        if context.contains(',') {
            return Err(format!("site.context_path '{}' cannot contain ','", context));
        }

        if !self.site.root.is_dir() {
            return Err(format!(
                "site.root '{}' is not a directory",
                self.site.root.display()
            ));
        }

        if let Some(path) = &self.rules.path {
            if !self.rules.optional && !path.is_file() {
                return Err(format!("rules.path '{}' does not exist", path.display()));
            }
        }

        self.cache.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err("logging.level cannot be empty".to_string());
        }

        Ok(())
    }

    /// Context path without a trailing slash
    pub fn context_path(&self) -> &str {
        self.site.context_path.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_yaml_with_env("{}").unwrap();
        assert_eq!(config.server.address, DEFAULT_ADDRESS);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.site.root, PathBuf::from("."));
        assert!(config.rules.path.is_none());
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_document() {
        let dir = TempDir::new().unwrap();
        let yaml = format!(
            r#"
server:
  address: "0.0.0.0"
  port: 9000
site:
  root: "{}"
  context_path: "/static/"
rules:
  path: "/etc/webmerge/rules.conf"
  optional: true
cache:
  max_entries: 50
  never_cache_mime: ["image/*"]
logging:
  level: debug
  format: pretty
"#,
            dir.path().display()
        );
        let config = Config::from_yaml_with_env(&yaml).unwrap();
        assert_eq!(config.server.listen_address(), "0.0.0.0:9000");
        assert_eq!(config.context_path(), "/static");
        assert!(config.rules.optional);
        assert_eq!(config.cache.max_entries, 50);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_substitution() {
        std::env::set_var("WEBMERGE_TEST_PORT", "8181");
        let config = Config::from_yaml_with_env("server:\n  port: ${WEBMERGE_TEST_PORT}\n").unwrap();
        assert_eq!(config.server.port, 8181);

        let err = Config::from_yaml_with_env("server:\n  address: ${WEBMERGE_TEST_UNSET_VAR}\n")
            .unwrap_err();
        assert!(err.contains("WEBMERGE_TEST_UNSET_VAR"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.site.context_path = "static".into();
        assert!(config.validate().unwrap_err().contains("context_path"));

        let mut config = Config::default();
        config.site.root = PathBuf::from("/definitely/not/a/dir");
        assert!(config.validate().unwrap_err().contains("site.root"));

        let mut config = Config::default();
        config.rules.path = Some(PathBuf::from("/definitely/not/rules.conf"));
        assert!(config.validate().is_err());
        config.rules.optional = true;
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.cache.max_entries = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file_missing() {
        let err = Config::from_file("/definitely/not/config.yaml").unwrap_err();
        assert!(err.starts_with("Failed to read config file"));
    }
}
