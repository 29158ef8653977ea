//! Launcher configuration from environment variables
//!
//! | Variable | Description |
//! |----------|-------------|
//! | `OPENVPN_USER` | Username injected into the client |
//! | `OPENVPN_PASSWORD` | Password injected into the client |
//! | `OPENVPN_PATH` | Client binary (default `openvpn`) |
//! | `OPENVPN_PWD_FILE` | Two-line credential file |
//!
//! Direct variables always win over the credential file.

use crate::credentials::{read_credential_file, Credentials, CredentialsError};
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

pub const USER_VAR: &str = "OPENVPN_USER";
pub const PASSWORD_VAR: &str = "OPENVPN_PASSWORD";
pub const PATH_VAR: &str = "OPENVPN_PATH";
pub const PASSWORD_FILE_VAR: &str = "OPENVPN_PWD_FILE";

pub const DEFAULT_BINARY: &str = "openvpn";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Credential file error: {0}")]
    Credentials(#[from] CredentialsError),
    #[error("{0} is not valid UTF-8")]
    NotUnicode(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<String>,
    pub binary_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            binary_path: PathBuf::from(DEFAULT_BINARY),
        }
    }
}

impl Config {
    /// Parse the current process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(env::vars_os())
    }

    /// Parse an arbitrary set of key/value pairs (for testing)
    ///
    /// Paths are kept as raw OS strings. Credentials must be UTF-8 since
    /// they are written to the client as text.
    ///
    /// The credential file, if any, is read once all direct variables are
    /// known so it can only fill in what they left empty.
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<OsStr>,
        V: Into<OsString>,
    {
        let mut config = Self::default();
        let mut password_file = None;

        for (key, value) in vars {
            let Some(key) = key.as_ref().to_str() else {
                continue;
            };
            let value: OsString = value.into();
            match key {
                USER_VAR => config.username = non_empty(unicode(USER_VAR, value)?),
                PASSWORD_VAR => config.password = non_empty(unicode(PASSWORD_VAR, value)?),
                PATH_VAR => config.binary_path = PathBuf::from(value),
                PASSWORD_FILE_VAR => password_file = Some(PathBuf::from(value)),
                _ => {}
            }
        }

        if let Some(path) = password_file {
            debug!("Reading credentials from {}", path.display());
            let creds = read_credential_file(&path)?;
            config.apply_credentials(creds);
        }

        Ok(config)
    }

    /// Fill in fields that are still unset from a credential file
    pub fn apply_credentials(&mut self, creds: Credentials) {
        if self.username.is_none() {
            self.username = non_empty(creds.username);
        }
        if self.password.is_none() {
            self.password = non_empty(creds.password);
        }
    }

    /// Warnings for credentials that will be sent as empty lines
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut warnings = Vec::new();
        if self.username.is_none() {
            warnings.push("No username set");
        }
        if self.password.is_none() {
            warnings.push("No password set");
        }
        warnings
    }
}

fn unicode(var: &'static str, value: OsString) -> Result<String, ConfigError> {
    value
        .into_string()
        .map_err(|_| ConfigError::NotUnicode(var))
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_credentials(dir: &Path, content: &str) -> String {
        let path = dir.join("creds");
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.binary_path, Path::new("openvpn"));
    }

    #[test]
    fn test_direct_variables() {
        let config = Config::from_vars([
            ("OPENVPN_USER", "alice"),
            ("OPENVPN_PASSWORD", "secret"),
            ("HOME", "/home/alice"),
        ])
        .unwrap();

        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_binary_path_override() {
        let config = Config::from_vars([("OPENVPN_PATH", "/usr/sbin/openvpn")]).unwrap();
        assert_eq!(config.binary_path, Path::new("/usr/sbin/openvpn"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let config =
            Config::from_vars([("OPENVPN_USER", "first"), ("OPENVPN_USER", "second")]).unwrap();
        assert_eq!(config.username.as_deref(), Some("second"));
    }

    #[test]
    fn test_credential_file_only() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_credentials(temp_dir.path(), "bob\nhunter2\n");

        let config = Config::from_vars([("OPENVPN_PWD_FILE", path)]).unwrap();

        assert_eq!(config.username.as_deref(), Some("bob"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_direct_variable_beats_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_credentials(temp_dir.path(), "bob\nhunter2\n");

        // File listed first still must not override the direct username
        let config = Config::from_vars([
            ("OPENVPN_PWD_FILE", path.as_str()),
            ("OPENVPN_USER", "alice"),
        ])
        .unwrap();

        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_file_empty_line_leaves_field_unset() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_credentials(temp_dir.path(), "\nhunter2\n");

        let config = Config::from_vars([("OPENVPN_PWD_FILE", path)]).unwrap();

        assert!(config.username.is_none());
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_empty_file_path_is_error() {
        let result = Config::from_vars([("OPENVPN_PWD_FILE", "")]);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Credentials(CredentialsError::NoPath)
        ));
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("missing");

        let result = Config::from_vars([
            ("OPENVPN_USER", "alice".to_string()),
            ("OPENVPN_PWD_FILE", path.to_string_lossy().into_owned()),
        ]);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Credentials(CredentialsError::Read { .. })
        ));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_credentials(temp_dir.path(), "bob");

        let result = Config::from_vars([("OPENVPN_PWD_FILE", path)]);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::Credentials(CredentialsError::Malformed(_))
        ));
    }

    #[test]
    fn test_apply_credentials_keeps_existing() {
        let mut config = Config {
            username: Some("alice".to_string()),
            ..Config::default()
        };
        config.apply_credentials(Credentials {
            username: "bob".to_string(),
            password: "hunter2".to_string(),
        });

        assert_eq!(config.username.as_deref(), Some("alice"));
        assert_eq!(config.password.as_deref(), Some("hunter2"));
    }

    #[test]
    fn test_missing_credentials_warnings() {
        let config = Config::from_vars(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(
            config.missing_credentials(),
            vec!["No username set", "No password set"]
        );

        let config = Config::from_vars([("OPENVPN_USER", "alice")]).unwrap();
        assert_eq!(config.missing_credentials(), vec!["No password set"]);

        let config =
            Config::from_vars([("OPENVPN_USER", "alice"), ("OPENVPN_PASSWORD", "secret")])
                .unwrap();
        assert!(config.missing_credentials().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_binary_path_keeps_raw_bytes() {
        use std::os::unix::ffi::{OsStrExt, OsStringExt};

        let raw = OsString::from_vec(b"/opt/vpn\xff/openvpn".to_vec());
        let config = Config::from_vars([(OsString::from("OPENVPN_PATH"), raw)]).unwrap();

        assert_eq!(
            config.binary_path.as_os_str().as_bytes(),
            b"/opt/vpn\xff/openvpn"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_non_unicode_password_is_error() {
        use std::os::unix::ffi::OsStringExt;

        let raw = OsString::from_vec(b"sec\x80ret".to_vec());
        let result = Config::from_vars([(OsString::from("OPENVPN_PASSWORD"), raw)]);

        assert!(matches!(
            result.unwrap_err(),
            ConfigError::NotUnicode("OPENVPN_PASSWORD")
        ));
    }
}
