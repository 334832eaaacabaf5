//! Binary entry point for the simulation control daemon.

use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{error, info};

use simbridge_config::Config;
use simbridged::{Server, telemetry};

const SIGNAL_POLL: Duration = Duration::from_millis(100);

#[expect(clippy::print_stderr, reason = "telemetry is not installed yet")]
fn report_startup_failure(error: &dyn std::error::Error) {
    eprintln!("simbridged: {error}");
}

fn main() -> ExitCode {
    let config = Config::load();
    if let Err(error) = telemetry::initialise(&config) {
        report_startup_failure(&error);
        return ExitCode::FAILURE;
    }

    let server = Server::new(config);
    if let Err(error) = server.start() {
        error!(error = %error, "failed to start server");
        return ExitCode::FAILURE;
    }

    let mut signals = match Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP]) {
        Ok(signals) => signals,
        Err(error) => {
            error!(error = %error, "failed to install signal handlers");
            server.destroy();
            return ExitCode::FAILURE;
        }
    };

    // Exit on the first termination signal or a client-issued quit.
    loop {
        if let Some(signal) = signals.pending().next() {
            info!(signal, "shutdown signal received");
            break;
        }
        if server.shutdown_requested() {
            info!("shutdown requested over the wire");
            break;
        }
        thread::sleep(SIGNAL_POLL);
    }

    server.destroy();
    ExitCode::SUCCESS
}
