//! OpenVPN credential file parsing
//!
//! The file uses the same layout OpenVPN accepts for `--auth-user-pass`:
//!
//! ```text
//! $ cat /path/to/credentials
//! username
//! password
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialsError {
    #[error("No password file set")]
    NoPath,
    #[error("Failed to read credential file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Malformed credential file {0}: expected a username line and a password line")]
    Malformed(PathBuf),
}

/// Username and password as read from a credential file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Parse credential file contents.
    ///
    /// Returns `None` when there are fewer than two lines. A single trailing
    /// newline counts as a second (empty) line.
    pub fn parse(content: &str) -> Option<Self> {
        let mut lines = content.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l));
        let username = lines.next()?;
        let password = lines.next()?;

        Some(Self {
            username: username.to_string(),
            password: password.to_string(),
        })
    }
}

/// Read a credential file from disk
pub fn read_credential_file(path: impl AsRef<Path>) -> Result<Credentials, CredentialsError> {
    let path = path.as_ref();
    if path.as_os_str().is_empty() {
        return Err(CredentialsError::NoPath);
    }

    let content = fs::read_to_string(path).map_err(|source| CredentialsError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    Credentials::parse(&content).ok_or_else(|| CredentialsError::Malformed(path.to_path_buf()))
}
