use std::io::{self, BufRead, BufReader, Read, Write};
use std::time::Duration;

use serialport::{SerialPort, SerialPortInfo, SerialPortType, UsbPortInfo};
use shared::error::ProvisionError;

use crate::constants::{DEVICE_IDENTITY_KEYWORDS, KNOWN_USB_BRIDGES};


/// Line-oriented duplex channel to the device console.
pub trait LineTransport {
    /// Send raw bytes; no framing is added.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProvisionError>;

    /// Wait up to `timeout` for one line. `None` means nothing arrived in time.
    /// Returned lines have surrounding whitespace, including the terminator, removed.
    fn poll_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ProvisionError>;

    /// Read one line; a timeout yields an empty line.
    fn read_line(&mut self, timeout: Duration) -> Result<Vec<u8>, ProvisionError> {
        Ok(self.poll_line(timeout)?.unwrap_or_default())
    }

    /// Collect lines until the device stays silent for `timeout`.
    fn drain_available_lines(&mut self, timeout: Duration) -> Result<Vec<Vec<u8>>, ProvisionError> {
        let mut lines = Vec::new();
        while let Some(line) = self.poll_line(timeout)? {
            lines.push(line);
        }
        Ok(lines)
    }
}

impl<T> LineTransport for &mut T
where
    T: LineTransport + ?Sized,
{
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProvisionError> {
        (**self).write_bytes(bytes)
    }

    fn poll_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ProvisionError> {
        (**self).poll_line(timeout)
    }

    fn drain_available_lines(&mut self, timeout: Duration) -> Result<Vec<Vec<u8>>, ProvisionError> {
        (**self).drain_available_lines(timeout)
    }
}

impl<T> LineTransport for Box<T>
where
    T: LineTransport + ?Sized,
{
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProvisionError> {
        (**self).write_bytes(bytes)
    }

    fn poll_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ProvisionError> {
        (**self).poll_line(timeout)
    }

    fn drain_available_lines(&mut self, timeout: Duration) -> Result<Vec<Vec<u8>>, ProvisionError> {
        (**self).drain_available_lines(timeout)
    }
}

/// Byte port whose read timeout can be changed between reads.
pub trait TimeoutPort: Read + Write {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), ProvisionError>;
}

impl TimeoutPort for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), ProvisionError> {
        self.set_timeout(timeout)
            .map_err(|err| ProvisionError::Transport(format!("failed to configure timeout: {err}")))
    }
}

/// [`LineTransport`] over a byte port such as a serial device.
pub struct PortLineTransport<P>
where
    P: TimeoutPort,
{
    reader: BufReader<P>,
    timeout: Option<Duration>,
}

impl<P> PortLineTransport<P>
where
    P: TimeoutPort,
{
    pub fn new(port: P) -> Self {
        Self {
            reader: BufReader::new(port),
            timeout: None,
        }
    }

    pub fn into_inner(self) -> P {
        self.reader.into_inner()
    }

    fn apply_timeout(&mut self, timeout: Duration) -> Result<(), ProvisionError> {
        if self.timeout != Some(timeout) {
            self.reader.get_mut().set_read_timeout(timeout)?;
            self.timeout = Some(timeout);
        }
        Ok(())
    }
}

impl<P> LineTransport for PortLineTransport<P>
where
    P: TimeoutPort,
{
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), ProvisionError> {
        let port = self.reader.get_mut();
        port.write_all(bytes).map_err(map_io_error("write command"))?;
        port.flush().map_err(map_io_error("flush command"))
    }

    fn poll_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, ProvisionError> {
        self.apply_timeout(timeout)?;

        let mut line = Vec::new();
        match self.reader.read_until(b'\n', &mut line) {
            Ok(0) => Err(ProvisionError::Transport(
                "device closed the connection".into(),
            )),
            Ok(_) => Ok(Some(line.trim_ascii().to_vec())),
            Err(err) if is_timeout(&err) => {
                if !line.is_empty() {
                    log::debug!(
                        "discarding partial line after timeout: {:?}",
                        String::from_utf8_lossy(&line)
                    );
                }
                Ok(None)
            }
            Err(err) => Err(map_io_error("read line")(err)),
        }
    }
}

fn is_timeout(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

pub fn open_serial_port(
    path: &str,
    baud_rate: u32,
    timeout: Duration,
) -> Result<Box<dyn SerialPort>, ProvisionError> {
    serialport::new(path, baud_rate)
        .timeout(timeout)
        .open()
        .map_err(|err| ProvisionError::Transport(format!("failed to open serial port {path}: {err}")))
}

/// How closely a port resembles an ESP32 board's USB bridge; lower ranks are preferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PortRank {
    /// Known bridge VID/PID whose descriptors also name an ESP32-style chip.
    NamedBridge,
    /// Known bridge VID/PID with generic descriptors.
    Bridge,
    /// Some other USB serial device; only used with `--any-port`.
    OtherUsb,
}

/// `None` for ports that are not USB serial devices at all.
pub fn rank_port(info: &SerialPortInfo) -> Option<PortRank> {
    let SerialPortType::UsbPort(usb) = &info.port_type else {
        return None;
    };

    let rank = if !is_known_bridge(usb) {
        PortRank::OtherUsb
    } else if describes_esp32(usb) {
        PortRank::NamedBridge
    } else {
        PortRank::Bridge
    };
    Some(rank)
}

pub fn detect_first_serial_port(allow_any_port: bool) -> Result<String, ProvisionError> {
    let ports = serialport::available_ports().map_err(|err| {
        ProvisionError::Transport(format!("failed to enumerate serial ports: {err}"))
    })?;

    select_serial_port(&ports, allow_any_port)
        .map(|info| info.port_name.clone())
        .ok_or_else(|| no_port_found(allow_any_port))
}

/// Best-ranked bridge in enumeration order, or with `allow_any_port` the first USB device.
pub fn select_serial_port(
    ports: &[SerialPortInfo],
    allow_any_port: bool,
) -> Option<&SerialPortInfo> {
    let mut ranked = ports
        .iter()
        .filter_map(|info| rank_port(info).map(|rank| (rank, info)));

    let chosen = if allow_any_port {
        ranked.next()
    } else {
        ranked
            .filter(|(rank, _)| *rank != PortRank::OtherUsb)
            .min_by_key(|(rank, _)| *rank)
    };
    chosen.map(|(_, info)| info)
}

fn is_known_bridge(usb: &UsbPortInfo) -> bool {
    KNOWN_USB_BRIDGES.contains(&(usb.vid, usb.pid))
}

fn describes_esp32(usb: &UsbPortInfo) -> bool {
    [usb.product.as_deref(), usb.manufacturer.as_deref()]
        .into_iter()
        .flatten()
        .map(str::to_ascii_lowercase)
        .any(|label| {
            DEVICE_IDENTITY_KEYWORDS
                .iter()
                .any(|keyword| label.contains(keyword))
        })
}

fn no_port_found(allow_any_port: bool) -> ProvisionError {
    let message = if allow_any_port {
        "no USB serial device is connected"
    } else {
        "no known ESP32 USB bridge is connected; name one with --port or accept any USB serial device with --any-port"
    };
    ProvisionError::Transport(message.into())
}

fn map_io_error(context: &'static str) -> impl Fn(io::Error) -> ProvisionError {
    move |err| {
        let mut message = format!("{context} failed: {err}");
        if err.kind() == io::ErrorKind::TimedOut {
            message.push_str(" (operation timed out)");
        }
        ProvisionError::Transport(message)
    }
}
