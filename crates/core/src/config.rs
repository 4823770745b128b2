//! TOML-based configuration for ldap-template.
//!
//! The bind password is never stored in the file. [`DirectoryConfig::password_env`]
//! names an environment variable that is resolved at startup via
//! [`AppConfig::resolve_env_vars`]. Once built, the configuration is shared
//! read-only between requests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory server settings.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// HTTP listener settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Template storage settings.
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Process-level settings.
    #[serde(default)]
    pub daemon: DaemonConfig,
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Directory server connection and search settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Server URL (e.g. `ldap://localhost:389`).
    #[serde(default)]
    pub url: String,

    /// Service account used for the bind
    /// (e.g. `cn=ldapsearch,cn=Users,dc=example,dc=com`).
    #[serde(default)]
    pub bind_dn: String,

    /// Environment variable holding the bind password.
    #[serde(default)]
    pub password_env: Option<String>,

    /// Base DN of the person search (e.g. `cn=Users,dc=example,dc=com`).
    #[serde(default)]
    pub search_base_dn: String,

    /// Resolved bind password (populated by `resolve_env_vars` or a flag).
    #[serde(skip)]
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Web
// ---------------------------------------------------------------------------

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address. `:8000` is shorthand for all interfaces.
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:8000".into()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl WebConfig {
    /// Parse the listen address, expanding a bare `:PORT`.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let listen = if self.listen.starts_with(':') {
            format!("0.0.0.0{}", self.listen)
        } else {
            self.listen.clone()
        };
        listen.parse().map_err(|e| ConfigError::InvalidValue {
            field: "web.listen".into(),
            detail: format!("'{}' is not a socket address: {}", self.listen, e),
        })
    }
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// Where template files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory holding `<name>.<format>.tmpl` files.
    #[serde(default = "default_template_dir")]
    pub dir: PathBuf,
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("templates/")
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Daemon
// ---------------------------------------------------------------------------

/// Process-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve `directory.password_env` into `directory.password`.
    ///
    /// A password that was already set (e.g. from a command-line flag) is
    /// left alone. A referenced but unset variable logs a warning and leaves
    /// the password empty, which the directory treats as an anonymous bind.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if self.directory.password.is_some() {
            return Ok(());
        }
        if let Some(ref env_name) = self.directory.password_env {
            self.directory.password = resolve_optional_env(env_name, "directory.password_env");
        }
        Ok(())
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory.url.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "directory.url".into(),
                detail: "directory URL must not be empty".into(),
            });
        }
        if self.directory.search_base_dn.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "directory.search_base_dn".into(),
                detail: "person search base DN must not be empty".into(),
            });
        }
        self.web.socket_addr()?;
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[directory]
url = "ldaps://dc1.example.com:636"
bind_dn = "cn=ldapsearch,cn=Users,dc=example,dc=com"
password_env = "LDAP_TEMPLATE_TEST_PW"
search_base_dn = "cn=Users,dc=example,dc=com"

[web]
listen = "127.0.0.1:9000"

[templates]
dir = "/srv/templates"

[daemon]
log_level = "debug"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.directory.url, "ldaps://dc1.example.com:636");
        assert_eq!(config.directory.search_base_dn, "cn=Users,dc=example,dc=com");
        assert_eq!(config.web.listen, "127.0.0.1:9000");
        assert_eq!(config.templates.dir, PathBuf::from("/srv/templates"));
        assert_eq!(config.daemon.log_level, "debug");
        assert!(config.directory.password.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.daemon.log_level, "debug");
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/config.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[directory\nurl = ").unwrap();

        let result = AppConfig::load_from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.web.listen, "0.0.0.0:8000");
        assert_eq!(config.templates.dir, PathBuf::from("templates/"));
        assert_eq!(config.daemon.log_level, "info");
        assert!(config.directory.url.is_empty());
    }

    #[test]
    fn test_validate_rejects_empty_url() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.directory.url = String::new();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "directory.url"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_search_base() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.directory.search_base_dn = String::new();
        let result = config.validate();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "directory.search_base_dn"
        ));
    }

    #[test]
    fn test_listen_shorthand() {
        let web = WebConfig {
            listen: ":8000".into(),
        };
        assert_eq!(web.socket_addr().unwrap(), "0.0.0.0:8000".parse().unwrap());

        let web = WebConfig {
            listen: "not-an-address".into(),
        };
        assert!(matches!(
            web.socket_addr(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "web.listen"
        ));
    }

    #[test]
    fn test_resolve_env_vars() {
        std::env::set_var("LDAP_TEMPLATE_TEST_PW", "s3cret");

        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.directory.password.as_deref(), Some("s3cret"));

        std::env::remove_var("LDAP_TEMPLATE_TEST_PW");
    }

    #[test]
    fn test_load_and_resolve() {
        std::env::set_var("LDAP_TEMPLATE_LOAD_TEST_PW", "from-env");
        let toml = sample_toml().replace("LDAP_TEMPLATE_TEST_PW", "LDAP_TEMPLATE_LOAD_TEST_PW");
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile.write_all(toml.as_bytes()).unwrap();

        let config = AppConfig::load_and_resolve(tmpfile.path()).unwrap();
        assert_eq!(config.directory.password.as_deref(), Some("from-env"));
        assert_eq!(config.directory.url, "ldaps://dc1.example.com:636");

        std::env::remove_var("LDAP_TEMPLATE_LOAD_TEST_PW");
    }

    #[test]
    fn test_load_and_resolve_rejects_invalid_file() {
        let mut tmpfile = tempfile::NamedTempFile::new().unwrap();
        tmpfile
            .write_all(b"[directory]\nsearch_base_dn = \"dc=example,dc=com\"\n")
            .unwrap();

        let err = AppConfig::load_and_resolve(tmpfile.path()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "directory.url"));
    }

    #[test]
    fn test_resolve_keeps_explicit_password() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.directory.password_env = Some("LDAP_TEMPLATE_TEST_UNSET_PW".into());
        config.directory.password = Some("from-flag".into());
        config.resolve_env_vars().unwrap();
        assert_eq!(config.directory.password.as_deref(), Some("from-flag"));
    }
}
