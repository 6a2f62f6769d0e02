use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::provision::ChecksumStage;
use crate::secrets::{FieldKind, FieldLength};

/// Failures raised while validating secrets or driving the provisioning protocol.
///
/// Protocol variants keep the raw line received from the device so a failed
/// run can be compared against the device console by hand.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{field} must be {expected}, got {actual} bytes")]
    Validation {
        field: FieldKind,
        expected: FieldLength,
        actual: usize,
    },
    #[error("invalid name {name:?}: {reason}")]
    InvalidName { name: String, reason: &'static str },
    #[error("secrets entry #{index} ({name}) rejected: {source}")]
    InvalidEntry {
        index: usize,
        name: String,
        #[source]
        source: Box<ProvisionError>,
    },
    #[error("{count} secrets exceed the {max} device slots")]
    TooManyRecords { count: usize, max: usize },
    #[error("unexpected response while setting {field}: expected '{expected}', received {line:?}")]
    UnexpectedResponse {
        field: FieldKind,
        expected: String,
        line: String,
    },
    #[error("device rejected {field} ({value_len} bytes, sent {payload:?}): received {line:?}")]
    FieldRejected {
        field: FieldKind,
        value_len: usize,
        payload: String,
        line: String,
    },
    #[error("{stage} checksum mismatch: expected {expected:08x}, received {line:?}")]
    ChecksumMismatch {
        stage: ChecksumStage,
        expected: u32,
        line: String,
    },
    #[error("commit not confirmed: expected '{expected}', received {line:?}")]
    CommitFailed { expected: &'static str, line: String },
    #[error("selecting slot {slot} failed: received {line:?}")]
    SlotSelectFailed { slot: usize, line: String },
    #[error("no {sentinel:?} from device after {waited:?}")]
    ModeChangeTimedOut { sentinel: char, waited: Duration },
    #[error("slot {slot}: {source}")]
    Slot {
        slot: usize,
        #[source]
        source: Box<ProvisionError>,
    },
    #[error("provisioning session already finished")]
    SessionClosed,
    #[error("secrets file error: {0}")]
    SecretsFile(String),
    #[error("transport error: {0}")]
    Transport(String),
}

impl ProvisionError {
    /// Attach the slot index the failure occurred in.
    pub fn in_slot(self, slot: usize) -> Self {
        match self {
            already @ ProvisionError::Slot { .. } => already,
            other => ProvisionError::Slot {
                slot,
                source: Box::new(other),
            },
        }
    }

    pub fn slot(&self) -> Option<usize> {
        match self {
            ProvisionError::Slot { slot, .. } | ProvisionError::SlotSelectFailed { slot, .. } => {
                Some(*slot)
            }
            _ => None,
        }
    }

    /// The innermost error, with slot and entry context removed.
    pub fn root(&self) -> &ProvisionError {
        match self {
            ProvisionError::Slot { source, .. } | ProvisionError::InvalidEntry { source, .. } => {
                source.root()
            }
            other => other,
        }
    }

    /// The raw device line behind a protocol failure, if any.
    pub fn received_line(&self) -> Option<&str> {
        match self.root() {
            ProvisionError::UnexpectedResponse { line, .. }
            | ProvisionError::FieldRejected { line, .. }
            | ProvisionError::ChecksumMismatch { line, .. }
            | ProvisionError::CommitFailed { line, .. }
            | ProvisionError::SlotSelectFailed { line, .. } => Some(line),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(
            self.root(),
            ProvisionError::Validation { .. }
                | ProvisionError::InvalidName { .. }
                | ProvisionError::TooManyRecords { .. }
        )
    }
}

impl From<io::Error> for ProvisionError {
    fn from(value: io::Error) -> Self {
        ProvisionError::Transport(value.to_string())
    }
}
