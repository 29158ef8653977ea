//! VPN client process supervision
//!
//! # Lifecycle
//!
//! 1. Subscribe to signals so none are missed while the child starts
//! 2. Spawn the client with our arguments, stdout/stderr passed through
//! 3. Write `username\npassword\n` to its stdin
//! 4. Keep copying our own stdin into the child's (cancellable)
//! 5. Wait for the child to exit, or for the relay to end the run

use crate::config::Config;
use crate::relay::{self, Relay, Terminated, TERMINATE_ATTEMPTS, TERMINATE_INTERVAL};
use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Failed to start {}: {}", .binary.display(), .source)]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to wait for child process: {0}")]
    Wait(#[from] io::Error),
    #[error("Child process failed: {0}")]
    ChildFailed(ExitStatus),
    #[error("Failed to subscribe to signals: {0}")]
    Signals(#[source] io::Error),
}

/// How a supervised run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The child exited successfully on its own
    Exited(ExitStatus),
    /// An interrupt/terminate signal ended the run
    Terminated { child_stopped: bool },
}

pub struct Supervisor {
    config: Config,
    args: Vec<OsString>,
    attempts: u32,
    interval: Duration,
}

impl Supervisor {
    pub fn new(config: Config, args: Vec<OsString>) -> Self {
        Self {
            config,
            args,
            attempts: TERMINATE_ATTEMPTS,
            interval: TERMINATE_INTERVAL,
        }
    }

    /// Override the relay's terminate retry policy
    pub fn with_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts;
        self.interval = interval;
        self
    }

    /// Run the client to completion.
    ///
    /// `input` is copied into the child's stdin after the credentials; the
    /// launcher passes its own stdin here.
    pub async fn run<R>(self, input: R) -> Result<Outcome, SupervisorError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let signals = relay::listen().map_err(SupervisorError::Signals)?;

        let mut child = self.spawn()?;
        let cancel = CancellationToken::new();

        match child.stdin.take() {
            Some(mut stdin) => {
                if let Err(e) = inject_credentials(&mut stdin, &self.config).await {
                    warn!("Failed to write credentials to child: {}", e);
                }
                spawn_input_copy(input, stdin, cancel.clone());
            }
            None => warn!("Child stdin unavailable, credentials not sent"),
        }

        let pid = child
            .id()
            .ok_or_else(|| io::Error::other("child exited before it could be supervised"))?;
        let (waiter, exit) = watch_exit(child);
        let relay = Relay::new(pid, exit).with_retry(self.attempts, self.interval);

        // Relay first: once terminating, the child dying from the forwarded
        // signal must not be reported as a failed run.
        let result = tokio::select! {
            biased;
            Terminated { child_stopped } = relay.run(signals) => {
                Ok(Outcome::Terminated { child_stopped })
            }
            status = waiter => match status {
                Ok(Ok(status)) => check_status(status),
                Ok(Err(e)) => Err(SupervisorError::Wait(e)),
                Err(e) => Err(SupervisorError::Wait(io::Error::other(e))),
            },
        };

        cancel.cancel();
        result
    }

    fn spawn(&self) -> Result<Child, SupervisorError> {
        info!("Starting {}", self.config.binary_path.display());
        debug!("Client arguments: {:?}", self.args);

        Command::new(&self.config.binary_path)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| SupervisorError::Spawn {
                binary: self.config.binary_path.clone(),
                source,
            })
    }
}

/// Client arguments from our own argv.
///
/// Everything after the program name is forwarded untouched, `--` included.
pub fn client_args<I>(argv: I) -> Vec<OsString>
where
    I: IntoIterator,
    I::Item: Into<OsString>,
{
    argv.into_iter().skip(1).map(Into::into).collect()
}

/// Bytes written to the child before any user input.
///
/// Unset fields become empty lines so the client's prompts stay in sync.
pub fn credential_payload(config: &Config) -> String {
    format!(
        "{}\n{}\n",
        config.username.as_deref().unwrap_or_default(),
        config.password.as_deref().unwrap_or_default()
    )
}

async fn inject_credentials(stdin: &mut ChildStdin, config: &Config) -> io::Result<()> {
    stdin.write_all(credential_payload(config).as_bytes()).await?;
    stdin.flush().await
}

/// Copy `input` into the child's stdin until EOF or cancellation.
///
/// The pipe is closed when this task ends so the child sees EOF.
fn spawn_input_copy<R>(mut input: R, mut stdin: ChildStdin, cancel: CancellationToken)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => debug!("Input copy cancelled"),
            result = tokio::io::copy(&mut input, &mut stdin) => match result {
                Ok(n) => debug!("Input closed after {} bytes", n),
                Err(e) => debug!("Input copy stopped: {}", e),
            },
        }
    });
}

/// Wait for `child` on a separate task and publish its exit status.
///
/// The receiver lets other tasks observe the exit without owning the child.
pub fn watch_exit(
    mut child: Child,
) -> (
    JoinHandle<io::Result<ExitStatus>>,
    watch::Receiver<Option<ExitStatus>>,
) {
    let (tx, rx) = watch::channel(None);
    let waiter = tokio::spawn(async move {
        let status = child.wait().await?;
        debug!("Child exited: {}", status);
        tx.send_replace(Some(status));
        Ok(status)
    });
    (waiter, rx)
}

fn check_status(status: ExitStatus) -> Result<Outcome, SupervisorError> {
    if status.success() {
        Ok(Outcome::Exited(status))
    } else {
        Err(SupervisorError::ChildFailed(status))
    }
}
