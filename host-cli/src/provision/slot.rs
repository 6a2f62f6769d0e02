use std::time::Duration;

use shared::error::ProvisionError;
use shared::provision::{self, ChecksumStage, ProvisionCommand, line_contains};
use shared::secrets::{FieldKind, SecretRecord};

use super::{field::write_field, lossy, receive_line, send_command};
use crate::transport::LineTransport;

/// Write one record into `slot`, commit it, and verify both checksum readbacks.
///
/// Every step depends on the previous one; the first failure stops the slot
/// and is returned with the slot index attached.
pub fn upload<T>(
    transport: &mut T,
    slot: usize,
    record: &SecretRecord,
    timeout: Duration,
) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    upload_steps(transport, slot, record, timeout).map_err(|err| err.in_slot(slot))
}

fn upload_steps<T>(
    transport: &mut T,
    slot: usize,
    record: &SecretRecord,
    timeout: Duration,
) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    select_slot(transport, slot, timeout)?;

    for kind in FieldKind::UPLOAD_ORDER {
        write_field(transport, kind, record.field(kind), timeout)?;
    }

    let crc = record.checksum();
    send_command(transport, ProvisionCommand::ReportBufferedChecksum)?;
    expect_checksum(
        transport,
        ChecksumStage::Buffered,
        &provision::buffered_checksum(crc),
        crc,
        timeout,
    )?;

    commit(transport, timeout)?;
    log::info!("writing {} to slot {slot} OK", record.name());

    send_command(transport, ProvisionCommand::ReportStoredChecksum)?;
    expect_checksum(
        transport,
        ChecksumStage::Stored,
        &provision::stored_checksum(slot, crc),
        crc,
        timeout,
    )?;
    log::info!("slot {slot} readback OK (crc {crc:08x})");

    Ok(())
}

fn select_slot<T>(transport: &mut T, slot: usize, timeout: Duration) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    send_command(transport, ProvisionCommand::SelectSlot(slot))?;
    let line = receive_line(transport, timeout)?;
    if line_contains(&line, &provision::slot_selected(slot)) {
        Ok(())
    } else {
        Err(ProvisionError::SlotSelectFailed {
            slot,
            line: lossy(&line),
        })
    }
}

fn expect_checksum<T>(
    transport: &mut T,
    stage: ChecksumStage,
    marker: &str,
    expected: u32,
    timeout: Duration,
) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    let line = receive_line(transport, timeout)?;
    if line_contains(&line, marker) {
        Ok(())
    } else {
        Err(ProvisionError::ChecksumMismatch {
            stage,
            expected,
            line: lossy(&line),
        })
    }
}

fn commit<T>(transport: &mut T, timeout: Duration) -> Result<(), ProvisionError>
where
    T: LineTransport + ?Sized,
{
    send_command(transport, ProvisionCommand::Commit)?;
    for expected in [provision::COMMIT_ACCEPTED, provision::COMMIT_WRITTEN] {
        let line = receive_line(transport, timeout)?;
        if !line_contains(&line, expected) {
            return Err(ProvisionError::CommitFailed {
                expected,
                line: lossy(&line),
            });
        }
    }
    Ok(())
}
