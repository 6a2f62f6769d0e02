use shared::error::ProvisionError;

use crate::commands::{self, PortSettings, TransportProvider};
use crate::transport::{LineTransport, PortLineTransport, detect_first_serial_port, open_serial_port};
use crate::{Cli, Command};

pub struct SerialTransportProvider;

impl TransportProvider for SerialTransportProvider {
    type Transport = dyn LineTransport;

    fn connect(
        &self,
        port_path: &str,
        settings: &PortSettings,
    ) -> Result<Box<Self::Transport>, ProvisionError> {
        let port = open_serial_port(port_path, settings.baud_rate, settings.read_timeout)?;
        Ok(Box::new(PortLineTransport::new(port)))
    }
}

pub fn select_port(cli: &Cli) -> Result<String, ProvisionError> {
    match &cli.port {
        Some(port) => Ok(port.clone()),
        None => detect_first_serial_port(cli.any_port),
    }
}

pub fn connect_transport<P>(
    cli: &Cli,
    transport_provider: &P,
) -> Result<Box<P::Transport>, ProvisionError>
where
    P: TransportProvider,
{
    let port_path = select_port(cli)?;
    log::info!("connecting to device on {port_path}");
    transport_provider.connect(&port_path, &cli.port_settings())
}

pub fn execute<P>(cli: Cli, transport_provider: &P) -> Result<(), ProvisionError>
where
    P: TransportProvider,
{
    match &cli.command {
        Command::Check(args) => commands::check::run(&args.secrets).map(drop),
        Command::Upload(args) => {
            let records = commands::secrets_file::load_records(&args.secrets)?;
            if records.is_empty() {
                log::info!("no secrets present, not contacting the device");
                return Ok(());
            }
            let mut transport = connect_transport(&cli, transport_provider)?;
            commands::upload::run(&mut *transport, &records, cli.session_config()).map(drop)
        }
        Command::List => {
            let mut transport = connect_transport(&cli, transport_provider)?;
            commands::list::run(&mut *transport, cli.session_config()).map(drop)
        }
    }
}
