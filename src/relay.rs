//! Signal relay to the VPN client
//!
//! Every catchable signal delivered to the launcher is passed on to the
//! child. Interrupt and terminate get special treatment: they are re-sent
//! until the child exits (or we give up), after which the launcher itself
//! exits.
//!
//! ```text
//! Relaying --SIGINT/SIGTERM--> Terminating (final)
//!    ^  |
//!    +--+ other signals: forward once
//! ```

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::io;
use std::process::ExitStatus;
use std::time::Duration;
use tokio::signal::unix::{signal as subscribe, SignalKind};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Signals the launcher subscribes to and relays.
///
/// SIGKILL and SIGSTOP cannot be caught. SIGCHLD is left out since the
/// child raises it itself when it exits.
pub const RELAYED_SIGNALS: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTERM,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGWINCH,
    Signal::SIGALRM,
];

/// How many times a terminating signal is sent before giving up
pub const TERMINATE_ATTEMPTS: u32 = 10;

/// Pause between terminating signal attempts
pub const TERMINATE_INTERVAL: Duration = Duration::from_secs(1);

const SIGNAL_QUEUE: usize = 10;

/// What the relay does with a received signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Forward repeatedly until the child exits, then exit ourselves
    Terminate(Signal),
    /// Forward once
    Forward(Signal),
}

impl SignalAction {
    pub fn classify(sig: Signal) -> Self {
        match sig {
            Signal::SIGINT | Signal::SIGTERM => SignalAction::Terminate(sig),
            _ => SignalAction::Forward(sig),
        }
    }
}

/// Result of the terminating state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Terminated {
    /// Whether the child exited before we ran out of attempts
    pub child_stopped: bool,
}

/// Subscribe to [`RELAYED_SIGNALS`] and funnel them into one channel.
///
/// Registration happens before this returns, so no signal delivered
/// afterwards is lost.
pub fn listen() -> io::Result<mpsc::Receiver<Signal>> {
    let (tx, rx) = mpsc::channel(SIGNAL_QUEUE);

    for &sig in RELAYED_SIGNALS {
        let mut stream = subscribe(SignalKind::from_raw(sig as i32))?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if tx.send(sig).await.is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

pub struct Relay {
    pid: Pid,
    exit: watch::Receiver<Option<ExitStatus>>,
    attempts: u32,
    interval: Duration,
}

impl Relay {
    /// Create a relay for the child `pid`.
    ///
    /// `exit` must be updated with the child's status once it has exited.
    pub fn new(pid: u32, exit: watch::Receiver<Option<ExitStatus>>) -> Self {
        Self {
            pid: Pid::from_raw(pid as i32),
            exit,
            attempts: TERMINATE_ATTEMPTS,
            interval: TERMINATE_INTERVAL,
        }
    }

    /// Override the terminate retry policy
    pub fn with_retry(mut self, attempts: u32, interval: Duration) -> Self {
        self.attempts = attempts;
        self.interval = interval;
        self
    }

    /// Relay signals until a terminating one arrives.
    ///
    /// Never resolves if the signal channel closes first; the child's exit
    /// decides the outcome in that case.
    pub async fn run(mut self, mut signals: mpsc::Receiver<Signal>) -> Terminated {
        while let Some(sig) = signals.recv().await {
            match SignalAction::classify(sig) {
                SignalAction::Forward(sig) => {
                    debug!("Forwarding {} to pid {}", sig, self.pid);
                    if let Err(e) = self.send(sig) {
                        warn!("Failed to forward {} to pid {}: {}", sig, self.pid, e);
                    }
                }
                SignalAction::Terminate(sig) => return self.terminate(sig).await,
            }
        }

        std::future::pending().await
    }

    /// Send `sig` until the child exits or the attempts run out
    pub async fn terminate(&mut self, sig: Signal) -> Terminated {
        info!("Received {}, stopping pid {}", sig, self.pid);

        for attempt in 1..=self.attempts {
            if self.child_exited() {
                break;
            }

            debug!("Sending {} (attempt {}/{})", sig, attempt, self.attempts);
            if let Err(e) = self.send(sig) {
                warn!("Failed to send {} to pid {}: {}", sig, self.pid, e);
            }

            // Wakes early when the child exits
            let waited = tokio::time::timeout(self.interval, self.exit.changed()).await;
            if let Ok(Err(_)) = waited {
                // Exit watcher is gone, fall back to a plain pause
                tokio::time::sleep(self.interval).await;
            }
        }

        let child_stopped = self.child_exited();
        if !child_stopped {
            error!("Unable to stop child process (pid {})", self.pid);
        }

        Terminated { child_stopped }
    }

    fn child_exited(&self) -> bool {
        self.exit.borrow().is_some()
    }

    fn send(&self, sig: Signal) -> nix::Result<()> {
        signal::kill(self.pid, sig)
    }
}
