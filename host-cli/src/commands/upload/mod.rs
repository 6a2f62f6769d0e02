use shared::error::ProvisionError;
use shared::secrets::SecretRecord;

use crate::commands::LineTransport;
use crate::provision::{ProvisioningSession, SessionConfig, SessionReport};

pub fn run<T>(
    transport: &mut T,
    records: &[SecretRecord],
    config: SessionConfig,
) -> Result<SessionReport, ProvisionError>
where
    T: LineTransport + ?Sized,
{
    let mut session = ProvisioningSession::new(transport, config);
    let report = session.run(records)?;

    if report.slots_written > 0 {
        println!(
            "Uploaded {count} secret slot(s); stored checksums verified.",
            count = report.slots_written
        );
    }
    Ok(report)
}
