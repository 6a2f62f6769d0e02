use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64;
use shared::error::ProvisionError;
use shared::provision::{self, ProvisionCommand, line_contains};
use shared::secrets::FieldKind;

use super::{lossy, receive_line, send_command};
use crate::transport::LineTransport;

/// Payload line for a field value: raw text for the name, base64 otherwise.
///
/// Lengths are checked first so nothing is ever truncated or padded.
pub fn encode_payload(kind: FieldKind, value: &[u8]) -> Result<String, ProvisionError> {
    kind.check_length(value.len())?;

    if kind.is_binary() {
        return Ok(Base64.encode(value));
    }

    let text = std::str::from_utf8(value).map_err(|_| ProvisionError::InvalidName {
        name: lossy(value),
        reason: "name is not valid UTF-8",
    })?;
    if text.contains(['\r', '\n']) {
        return Err(ProvisionError::InvalidName {
            name: text.into(),
            reason: "line breaks would split the payload line",
        });
    }
    Ok(text.to_owned())
}

/// Set one field of the selected slot and wait for the device to accept it.
///
/// Sends at most one command byte and one payload line and never retries;
/// a value that fails validation is rejected before anything is written.
pub fn write_field<T>(
    transport: &mut T,
    kind: FieldKind,
    value: &[u8],
    timeout: Duration,
) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    let payload = encode_payload(kind, value)?;

    send_command(transport, ProvisionCommand::SetField(kind))?;
    let prompt = receive_line(transport, timeout)?;
    let expected = provision::field_prompt(kind);
    if !line_contains(&prompt, &expected) {
        return Err(ProvisionError::UnexpectedResponse {
            field: kind,
            expected,
            line: lossy(&prompt),
        });
    }

    let mut frame = Vec::with_capacity(payload.len() + 1);
    frame.extend_from_slice(payload.as_bytes());
    frame.push(b'\n');
    transport.write_bytes(&frame)?;

    let reply = receive_line(transport, timeout)?;
    if !line_contains(&reply, &provision::field_accepted(kind)) {
        log::error!("device rejected {kind}; sent({}): {payload}", payload.len());
        return Err(ProvisionError::FieldRejected {
            field: kind,
            value_len: value.len(),
            payload,
            line: lossy(&reply),
        });
    }

    log::debug!("{kind} accepted");
    Ok(())
}
