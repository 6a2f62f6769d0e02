use serde::Deserialize;

use crate::error::ProvisionError;
use crate::secrets::{MAX_SLOTS, SecretRecord};

/// Secrets file contents: an ordered device list, one entry per slot.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsDocument {
    #[serde(default)]
    pub devices: Vec<SecretEntry>,
}

/// Unvalidated entry as it appears in the secrets file.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretEntry {
    pub name: String,
    pub mac: Vec<u8>,
    pub key: Vec<u8>,
    pub blob: Vec<u8>,
}

impl SecretEntry {
    pub fn to_record(&self) -> Result<SecretRecord, ProvisionError> {
        SecretRecord::new(self.name.clone(), &self.mac, &self.key, &self.blob)
    }
}

impl SecretsDocument {
    /// Validate every entry; the first invalid one rejects the whole document
    /// because slot numbers follow list positions.
    pub fn into_records(self) -> Result<Vec<SecretRecord>, ProvisionError> {
        if self.devices.len() > MAX_SLOTS {
            return Err(ProvisionError::TooManyRecords {
                count: self.devices.len(),
                max: MAX_SLOTS,
            });
        }

        self.devices
            .iter()
            .enumerate()
            .map(|(index, entry)| {
                entry
                    .to_record()
                    .map_err(|source| ProvisionError::InvalidEntry {
                        index,
                        name: entry.name.clone(),
                        source: Box::new(source),
                    })
            })
            .collect()
    }
}
