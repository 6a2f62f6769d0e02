use shared::error::ProvisionError;

use crate::commands::LineTransport;
use crate::provision::{ProvisioningSession, SessionConfig};

pub fn run<T>(transport: &mut T, config: SessionConfig) -> Result<Vec<String>, ProvisionError>
where
    T: LineTransport + ?Sized,
{
    let mut session = ProvisioningSession::new(transport, config);
    let listing = session.inspect()?;

    if listing.is_empty() {
        println!("Device printed no slot listing.");
    } else {
        for line in &listing {
            println!("{line}");
        }
    }
    Ok(listing)
}
