use core::fmt;

use crate::checksum::secrets_crc32;
use crate::error::ProvisionError;

mod document;

pub use document::{SecretEntry, SecretsDocument};

/// Longest device name the firmware stores (its buffer keeps a trailing NUL).
pub const NAME_MAX_LEN: usize = 15;
pub const MAC_LEN: usize = 6;
pub const KEY_LEN: usize = 16;
pub const BLOB_LEN: usize = 256;

/// Number of secret slots the device exposes (`0..=9`).
pub const MAX_SLOTS: usize = 10;

/// Length rule a field value has to satisfy before it is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLength {
    AtMost(usize),
    Exactly(usize),
}

impl FieldLength {
    pub const fn accepts(self, len: usize) -> bool {
        match self {
            FieldLength::AtMost(max) => len <= max,
            FieldLength::Exactly(expected) => len == expected,
        }
    }
}

impl fmt::Display for FieldLength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldLength::AtMost(max) => write!(f, "at most {max} bytes"),
            FieldLength::Exactly(expected) => write!(f, "exactly {expected} bytes"),
        }
    }
}

/// The four values stored per slot, in upload order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Name,
    Mac,
    Key,
    Blob,
}

impl FieldKind {
    pub const UPLOAD_ORDER: [FieldKind; 4] =
        [FieldKind::Name, FieldKind::Mac, FieldKind::Key, FieldKind::Blob];

    /// Single-byte command selecting this field on the device.
    pub const fn code(self) -> u8 {
        match self {
            FieldKind::Name => b'N',
            FieldKind::Mac => b'M',
            FieldKind::Key => b'K',
            FieldKind::Blob => b'B',
        }
    }

    pub const fn length(self) -> FieldLength {
        match self {
            FieldKind::Name => FieldLength::AtMost(NAME_MAX_LEN),
            FieldKind::Mac => FieldLength::Exactly(MAC_LEN),
            FieldKind::Key => FieldLength::Exactly(KEY_LEN),
            FieldKind::Blob => FieldLength::Exactly(BLOB_LEN),
        }
    }

    /// Binary fields travel base64 encoded; the name is sent as raw text.
    pub const fn is_binary(self) -> bool {
        !matches!(self, FieldKind::Name)
    }

    pub fn check_length(self, len: usize) -> Result<(), ProvisionError> {
        let expected = self.length();
        if expected.accepts(len) {
            Ok(())
        } else {
            Err(ProvisionError::Validation {
                field: self,
                expected,
                actual: len,
            })
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            FieldKind::Name => "name",
            FieldKind::Mac => "mac",
            FieldKind::Key => "key",
            FieldKind::Blob => "blob",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Validated secrets for one device slot.
///
/// Construction is the only place lengths are checked; an invalid value is
/// rejected rather than truncated or padded.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretRecord {
    name: String,
    mac: [u8; MAC_LEN],
    key: [u8; KEY_LEN],
    blob: [u8; BLOB_LEN],
}

impl SecretRecord {
    pub fn new(
        name: impl Into<String>,
        mac: &[u8],
        key: &[u8],
        blob: &[u8],
    ) -> Result<Self, ProvisionError> {
        let name = name.into();
        validate_name(&name)?;

        Ok(Self {
            name,
            mac: fixed_field(FieldKind::Mac, mac)?,
            key: fixed_field(FieldKind::Key, key)?,
            blob: fixed_field(FieldKind::Blob, blob)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> &[u8; MAC_LEN] {
        &self.mac
    }

    pub fn key(&self) -> &[u8; KEY_LEN] {
        &self.key
    }

    pub fn blob(&self) -> &[u8; BLOB_LEN] {
        &self.blob
    }

    /// Raw bytes of the given field as they are validated and framed for upload.
    pub fn field(&self, kind: FieldKind) -> &[u8] {
        match kind {
            FieldKind::Name => self.name.as_bytes(),
            FieldKind::Mac => &self.mac,
            FieldKind::Key => &self.key,
            FieldKind::Blob => &self.blob,
        }
    }

    pub fn checksum(&self) -> u32 {
        secrets_crc32(&self.mac, &self.key, &self.blob)
    }

    /// MAC address in the usual colon-separated form.
    pub fn mac_string(&self) -> String {
        self.mac
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<Vec<_>>()
            .join(":")
    }
}

impl fmt::Debug for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretRecord")
            .field("name", &self.name)
            .field("mac", &self.mac_string())
            .field("checksum", &format_args!("{:08x}", self.checksum()))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SecretRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceSecrets({})", self.name)
    }
}

fn validate_name(name: &str) -> Result<(), ProvisionError> {
    if name.contains(['\r', '\n']) {
        return Err(ProvisionError::InvalidName {
            name: name.into(),
            reason: "line breaks would split the payload line",
        });
    }
    FieldKind::Name.check_length(name.len())
}

fn fixed_field<const N: usize>(kind: FieldKind, value: &[u8]) -> Result<[u8; N], ProvisionError> {
    kind.check_length(value.len())?;
    value.try_into().map_err(|_| ProvisionError::Validation {
        field: kind,
        expected: FieldLength::Exactly(N),
        actual: value.len(),
    })
}
