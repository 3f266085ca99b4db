//! `serialport`-backed device channel.

use super::{ChannelError, ChannelOpener, DeviceChannel, Sample};
use crate::config::SerialSettings;
use crate::error::{PowerMeterError, Result};
use log::{debug, info};
use serialport::{DataBits, SerialPort, SerialPortType, StopBits};
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Fixed read size per query; the instrument's replies fit well inside it
/// and the port timeout bounds the wait for short reads.
const RESPONSE_LEN: usize = 64;

/// Opens [`SerialChannel`]s from the configured connection settings.
pub struct SerialLink {
    settings: SerialSettings,
}

impl SerialLink {
    pub fn new(settings: SerialSettings) -> Self {
        Self { settings }
    }
}

impl ChannelOpener for SerialLink {
    type Channel = SerialChannel;

    fn open(&self) -> Result<SerialChannel> {
        let data_bits = match self.settings.bytesize {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            other => {
                return Err(PowerMeterError::Configuration(format!(
                    "unsupported byte size {other}"
                )))
            }
        };
        let stop_bits = match self.settings.stopbits {
            1 => StopBits::One,
            2 => StopBits::Two,
            other => {
                return Err(PowerMeterError::Configuration(format!(
                    "unsupported stop bits {other}"
                )))
            }
        };

        let port = serialport::new(&self.settings.port, self.settings.baudrate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .timeout(Duration::from_secs_f64(self.settings.timeout))
            .open()
            .map_err(|e| {
                PowerMeterError::Connection(format!(
                    "failed to open serial port '{}': {e}",
                    self.settings.port
                ))
            })?;

        info!(
            "opened serial port '{}' at {} baud",
            self.settings.port, self.settings.baudrate
        );
        Ok(SerialChannel { port })
    }
}

/// One open serial session with the instrument.
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
}

impl DeviceChannel for SerialChannel {
    fn query(&mut self, command: &[u8]) -> std::result::Result<Sample, ChannelError> {
        self.port.write_all(command).map_err(|e| match e.kind() {
            ErrorKind::TimedOut => ChannelError::Communication(format!("write timed out: {e}")),
            _ => ChannelError::Disconnected(format!("write failed: {e}")),
        })?;

        let mut buf = vec![0u8; RESPONSE_LEN];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                let sample = Sample::from_raw(buf);
                debug!("query response: {}", sample.hex);
                Ok(sample)
            }
            Err(e) if e.kind() == ErrorKind::TimedOut => {
                Err(ChannelError::Communication("read timed out".into()))
            }
            Err(e) => Err(ChannelError::Disconnected(format!("read failed: {e}"))),
        }
    }

    fn close(self) {
        info!("closing serial port");
        drop(self.port);
    }
}

/// Enumerate serial ports visible to the host, with a short description
/// where the transport provides one.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| PowerMeterError::Connection(format!("port enumeration failed: {e}")))?;
    Ok(ports
        .into_iter()
        .map(|p| match p.port_type {
            SerialPortType::UsbPort(info) => format!(
                "{}: {}",
                p.port_name,
                info.product.unwrap_or_else(|| "USB serial device".into())
            ),
            SerialPortType::BluetoothPort => format!("{}: Bluetooth serial", p.port_name),
            SerialPortType::PciPort => format!("{}: PCI serial", p.port_name),
            SerialPortType::Unknown => p.port_name,
        })
        .collect())
}
