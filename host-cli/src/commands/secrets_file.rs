use std::fs;
use std::path::Path;

use shared::error::ProvisionError;
use shared::secrets::{SecretRecord, SecretsDocument};

/// Load and validate the secrets file; any invalid entry rejects the whole file.
pub fn load_records(path: &Path) -> Result<Vec<SecretRecord>, ProvisionError> {
    let raw = fs::read_to_string(path).map_err(|err| {
        ProvisionError::SecretsFile(format!(
            "failed to read secrets from '{}': {err}",
            path.display()
        ))
    })?;
    let records = parse_records(&raw)?;
    log::info!(
        "read {} secret(s) from '{}'",
        records.len(),
        path.display()
    );
    Ok(records)
}

pub fn parse_records(raw: &str) -> Result<Vec<SecretRecord>, ProvisionError> {
    let document: SecretsDocument = serde_json::from_str(raw)
        .map_err(|err| ProvisionError::SecretsFile(format!("invalid secrets file: {err}")))?;
    document.into_records()
}
