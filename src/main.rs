//! Launch OpenVPN with credentials from the environment.
//!
//! Credentials come from `OPENVPN_USER` / `OPENVPN_PASSWORD` or the two-line
//! file named by `OPENVPN_PWD_FILE`. `OPENVPN_PATH` overrides the client
//! binary. The launcher has no flags of its own: every argument goes to the
//! client as typed.

use openvpn_wrapper::Config;
use std::ffi::OsString;
use tracing::{error, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logs go to stderr so the client's stdout passes through untouched
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Error processing environment: {}", e);
            std::process::exit(1);
        }
    };

    for warning in config.missing_credentials() {
        warn!("{}", warning);
    }

    let code = run(config, std::env::args_os()).await;

    // The stdin reader may still be parked in a blocking read, which would
    // stall runtime shutdown.
    std::process::exit(code);
}

#[cfg(unix)]
async fn run(config: Config, argv: impl Iterator<Item = OsString>) -> i32 {
    use openvpn_wrapper::{client_args, Outcome, Supervisor};
    use tracing::info;

    match Supervisor::new(config, client_args(argv)).run(tokio::io::stdin()).await {
        Ok(Outcome::Exited(status)) => {
            info!("Client finished: {}", status);
            0
        }
        Ok(Outcome::Terminated { child_stopped }) => {
            if child_stopped {
                info!("Client stopped");
            }
            0
        }
        Err(e) => {
            error!("{}", e);
            1
        }
    }
}

#[cfg(not(unix))]
async fn run(_config: Config, _argv: impl Iterator<Item = OsString>) -> i32 {
    error!("Signal relaying is only supported on Unix platforms");
    1
}
