use std::path::Path;

use shared::error::ProvisionError;
use shared::secrets::SecretRecord;

use crate::commands::secrets_file::load_records;

/// Validate a secrets file without touching any device.
pub fn run(path: &Path) -> Result<Vec<SecretRecord>, ProvisionError> {
    let records = load_records(path)?;
    if records.is_empty() {
        println!("No secrets present in '{}'.", path.display());
    }

    for (slot, record) in records.iter().enumerate() {
        println!(
            "- slot {slot}: {name} mac={mac} crc={crc:08x}",
            name = record.name(),
            mac = record.mac_string(),
            crc = record.checksum(),
        );
    }
    Ok(records)
}
