//! Host side of the device's secrets console: one request in flight at a time.

use std::time::Duration;

use shared::error::ProvisionError;
use shared::provision::ProvisionCommand;

use crate::transport::LineTransport;

mod field;
mod session;
mod slot;

pub use field::{encode_payload, write_field};
pub use session::{ListingPhase, ProvisioningSession, SessionConfig, SessionReport, SessionState};
pub use slot::upload;

pub(crate) fn send_command<T>(transport: &mut T, command: ProvisionCommand) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    log::trace!("sending {command:?}");
    transport.write_bytes(&command.to_bytes())
}

/// Read one response line and echo it to the operator log.
pub(crate) fn receive_line<T>(transport: &mut T, timeout: Duration) -> Result<Vec<u8>, ProvisionError>
where
    T: LineTransport + ?Sized,
{
    let line = transport.read_line(timeout)?;
    echo_line(&line);
    Ok(line)
}

pub(crate) fn echo_line(line: &[u8]) {
    log::info!(target: "device", "> {}", String::from_utf8_lossy(line));
}

pub(crate) fn lossy(line: &[u8]) -> String {
    String::from_utf8_lossy(line).into_owned()
}
