//! openvpn-wrapper - credential-feeding launcher for OpenVPN
//!
//! Runs the OpenVPN client as a child process, answers its
//! `--auth-user-pass` prompts with credentials taken from the environment
//! or a credential file, and relays signals so the client can shut down
//! cleanly.
//!
//! # Architecture
//!
//! - `config`: Environment variable parsing
//! - `credentials`: Two-line credential file reader
//! - `supervisor`: Child spawning, stdin injection, exit handling
//! - `relay`: Signal forwarding to the child (Unix)
//!
//! # Usage
//!
//! ```bash
//! OPENVPN_PWD_FILE=/etc/openvpn/creds openvpn-wrapper --config client.ovpn \
//!   --auth-user-pass
//! ```

pub mod config;
pub mod credentials;
#[cfg(unix)]
pub mod relay;
#[cfg(unix)]
pub mod supervisor;

pub use config::{Config, ConfigError};
pub use credentials::{read_credential_file, Credentials, CredentialsError};
#[cfg(unix)]
pub use supervisor::{client_args, Outcome, Supervisor, SupervisorError};
