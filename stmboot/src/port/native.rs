//! Serial port backed by the `serialport` crate.
//!
//! The link is always opened 8N1 without flow control; the bootloader
//! firmware configures its UART that way and offers no negotiation.

use {
    crate::{
        error::{Error, Result},
        port::{Port, PortEnumerator, PortInfo, SerialConfig},
    },
    log::{debug, trace},
    serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType, StopBits},
    std::{
        io::{self, Read, Write},
        time::Duration,
    },
};

/// Bootloader UART opened on the host.
pub struct NativePort {
    /// `None` once closed.
    inner: Option<Box<dyn SerialPort>>,
    name: String,
    timeout: Duration,
}

/// Missing devices and OS-level open failures mean there is nothing to talk to.
fn open_error(port_name: &str, err: serialport::Error) -> Error {
    match err.kind() {
        serialport::ErrorKind::NoDevice | serialport::ErrorKind::Io(_) => {
            Error::TransportUnavailable(format!("{port_name}: {err}"))
        },
        _ => Error::Serial(err),
    }
}

impl NativePort {
    /// Open the port described by `config`.
    ///
    /// A port that does not exist or cannot be opened is reported as
    /// [`Error::TransportUnavailable`].
    pub fn open(config: &SerialConfig) -> Result<Self> {
        let inner = serialport::new(&config.port_name, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.timeout)
            .open()
            .map_err(|e| open_error(&config.port_name, e))?;

        debug!(
            "Opened {} at {} baud (8N1, line timeout {:?})",
            config.port_name, config.baud_rate, config.timeout
        );

        Ok(Self {
            inner: Some(inner),
            name: config
                .port_name
                .clone(),
            timeout: config.timeout,
        })
    }

    /// Open `port_name` at `baud_rate` with the default line timeout.
    pub fn open_simple(port_name: &str, baud_rate: u32) -> Result<Self> {
        Self::open(&SerialConfig::new(port_name, baud_rate))
    }

    fn inner(&mut self) -> io::Result<&mut Box<dyn SerialPort>> {
        self.inner
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "port closed"))
    }
}

impl Port for NativePort {
    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(&mut self) -> Result<()> {
        if self
            .inner
            .take()
            .is_some()
        {
            trace!("Closed {}", self.name);
        }
        Ok(())
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner()?
            .read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner()?
            .write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner()?
            .flush()
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let mut port = Self {
            name: info.port_name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        };
        if let SerialPortType::UsbPort(usb) = info.port_type {
            port.vid = Some(usb.vid);
            port.pid = Some(usb.pid);
            port.manufacturer = usb.manufacturer;
            port.product = usb.product;
        }
        port
    }
}

/// Lists the serial ports the operating system reports.
pub struct NativePortEnumerator;

impl PortEnumerator for NativePortEnumerator {
    fn list_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(PortInfo::from)
            .collect())
    }
}
