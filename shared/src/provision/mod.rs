//! Wire vocabulary of the device's secrets console.
//!
//! Commands are single ASCII bytes (slot selection sends the slot number as
//! decimal text). The device answers with text lines; a step succeeds when
//! the line contains the expected marker.

use core::fmt;

use crate::checksum::format_crc;
use crate::secrets::FieldKind;

/// Line the device prints once it has entered provisioning mode.
pub const ENTER_MODE_SENTINEL: &[u8] = b"!";
/// Line the device prints once it has left provisioning mode.
pub const EXIT_MODE_SENTINEL: &[u8] = b"X";

/// First confirmation line after a commit.
pub const COMMIT_ACCEPTED: &str = "[OK]";
/// Second confirmation line after a commit: one slot written to storage.
pub const COMMIT_WRITTEN: &str = "write=1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionCommand {
    EnterMode,
    List,
    SelectSlot(usize),
    SetField(FieldKind),
    ReportBufferedChecksum,
    Commit,
    ReportStoredChecksum,
    LeaveMode,
}

impl ProvisionCommand {
    pub fn to_bytes(self) -> Vec<u8> {
        match self {
            ProvisionCommand::EnterMode => vec![b'X'],
            ProvisionCommand::List => vec![b'l'],
            ProvisionCommand::SelectSlot(slot) => slot.to_string().into_bytes(),
            ProvisionCommand::SetField(kind) => vec![kind.code()],
            ProvisionCommand::ReportBufferedChecksum => vec![b's'],
            ProvisionCommand::Commit => vec![b'W'],
            ProvisionCommand::ReportStoredChecksum => vec![b'S'],
            ProvisionCommand::LeaveMode => vec![b'q'],
        }
    }
}

/// Which copy of the slot a checksum readback describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStage {
    /// Uncommitted working values.
    Buffered,
    /// Values read back from non-volatile storage after a commit.
    Stored,
}

impl fmt::Display for ChecksumStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChecksumStage::Buffered => f.write_str("buffered"),
            ChecksumStage::Stored => f.write_str("persisted"),
        }
    }
}

pub fn slot_selected(slot: usize) -> String {
    format!("slot={slot}")
}

pub fn field_prompt(kind: FieldKind) -> String {
    format!("set={}", char::from(kind.code()))
}

pub fn field_accepted(kind: FieldKind) -> String {
    format!("{}=[OK]", char::from(kind.code()))
}

pub fn buffered_checksum(crc: u32) -> String {
    format!("slot=tmp crc={}", format_crc(crc))
}

pub fn stored_checksum(slot: usize, crc: u32) -> String {
    format!("slot={slot} crc={}", format_crc(crc))
}

/// Substring match on a raw response line.
pub fn line_contains(line: &[u8], marker: &str) -> bool {
    let marker = marker.as_bytes();
    marker.is_empty() || line.windows(marker.len()).any(|window| window == marker)
}
