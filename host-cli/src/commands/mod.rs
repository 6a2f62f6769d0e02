use std::time::Duration;

use shared::error::ProvisionError;

pub use crate::transport::LineTransport;

pub mod check;
pub mod list;
pub mod secrets_file;
pub mod upload;

/// Serial link parameters used when opening the device port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSettings {
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

pub trait TransportProvider {
    type Transport: LineTransport + ?Sized;

    fn connect(
        &self,
        port_path: &str,
        settings: &PortSettings,
    ) -> Result<Box<Self::Transport>, ProvisionError>;
}
