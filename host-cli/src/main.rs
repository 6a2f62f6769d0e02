use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use shared::error::ProvisionError;

use crate::commands::PortSettings;
use crate::constants::{DEFAULT_READ_TIMEOUT_MS, SERIAL_BAUD_RATE};
use crate::provision::SessionConfig;

mod application;
mod commands;
mod constants;
mod provision;
mod transport;

#[cfg(test)]
mod tests_session;

#[derive(Parser, Debug)]
#[command(author, version, about = "Upload device secrets over a serial console")]
pub(crate) struct Cli {
    /// Optional path to the serial device. Falls back to auto-detection when omitted.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Skip USB bridge filtering and accept the first USB serial device.
    #[arg(long, global = true)]
    any_port: bool,

    /// Serial baud rate.
    #[arg(long, default_value_t = SERIAL_BAUD_RATE, global = true)]
    baud: u32,

    /// Per-line read timeout in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = DEFAULT_READ_TIMEOUT_MS, global = true)]
    read_timeout_ms: u64,

    /// Give up entering or leaving secrets mode after this many seconds (default: wait forever).
    #[arg(long, value_name = "SECS", global = true)]
    mode_wait_secs: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    pub(crate) fn session_config(&self) -> SessionConfig {
        SessionConfig {
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            mode_wait: self.mode_wait_secs.map(Duration::from_secs),
        }
    }

    pub(crate) fn port_settings(&self) -> PortSettings {
        PortSettings {
            baud_rate: self.baud,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
        }
    }
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Write every secret in the file to consecutive device slots and verify them.
    Upload(SecretsArgs),
    /// Show the secrets currently stored on the device.
    List,
    /// Validate a secrets file and print its checksums without opening a port.
    Check(SecretsArgs),
}

#[derive(Args, Debug, Clone)]
pub(crate) struct SecretsArgs {
    /// JSON secrets file with a `devices` list.
    #[arg(value_name = "SECRETS_FILE")]
    secrets: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = application::execute(cli, &application::SerialTransportProvider) {
        report_failure(&err);
        return Err(anyhow::Error::from(err));
    }

    Ok(())
}

fn report_failure(err: &ProvisionError) {
    if err.is_validation() {
        eprintln!("Secrets rejected before contacting the device: {err}");
        return;
    }

    match err {
        ProvisionError::Transport(_) => eprintln!("Transport failure: {err}"),
        ProvisionError::SecretsFile(_) => eprintln!("Could not load secrets: {err}"),
        ProvisionError::ModeChangeTimedOut { .. } => {
            eprintln!("Device did not change secrets mode: {err}")
        }
        _ => {
            eprintln!("Provisioning failed: {err}");
            if let Some(line) = err.received_line() {
                eprintln!("  last device line: {line:?}");
            }
        }
    }
}
