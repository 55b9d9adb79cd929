//! Serial port user interface.
//!
//! [`Serial`] is a component whose parameters describe the port; the device
//! is opened in `post_init` and closed in `post_uninit`. Parameter changes
//! made while the port is open are applied to the live device, and a
//! setting the device refuses is rejected without changing the parameter.
//!
//! Reads and writes go through one mutex, so the port can be shared between
//! a reader thread and any number of writers.
//!
//! ```
//! use armature::prelude::*;
//! use armature::serial::mock::MockDevice;
//! use armature::serial::{LineStyle, Serial};
//!
//! struct App {
//!     core: ComponentCore,
//! }
//!
//! impl Component for App {
//!     fn core(&self) -> &ComponentCore {
//!         &self.core
//!     }
//! }
//!
//! let mock = MockDevice::new("/dev/ttyS0");
//! let app = Root::new("app", |core| Ok(App { core })).unwrap();
//! let serial = app
//!     .add_sub_component("serial", |core| {
//!         Serial::with_opener(core, InterfaceType::Hard, mock.opener())
//!     })
//!     .unwrap();
//!
//! app.set_param_val("serial:devname", String::from("/dev/ttyS0")).unwrap();
//! app.set_param_val("serial:linestyle", LineStyle::Crlf).unwrap();
//! app.init().unwrap();
//!
//! mock.feed(b"ping\r\n");
//! assert_eq!(serial.read_some().unwrap().as_deref(), Some("ping"));
//! serial.write_string("pong").unwrap();
//! assert_eq!(mock.take_output(), b"pong\r\n");
//! ```

pub mod device;
pub mod line;
pub mod mock;

use std::fmt;
use std::io;
use std::str::FromStr;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::component::{Component, ComponentCore};
use crate::parameter::{Parameter, ParameterDef};
use crate::user_interface::{InterfaceType, UserInterface};
use crate::{Error, Result};

use device::{DeviceOpener, SerialDevice, tty_opener};
use line::LineDiscipline;

pub const PARAM_CATEGORY: &str = "Serial Port Options";

/// Baud rates accepted by the `baudrate` parameter.
pub const BAUDRATES: [u32; 23] = [
    110, 300, 600, 1200, 2400, 4800, 9600, 14400, 19200, 38400, 57600, 115200, 230400, 460800,
    921600, 1000000, 1152000, 1500000, 2000000, 2500000, 3000000, 3500000, 4000000,
];

const READ_CHUNK: usize = 1024;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(1);
const WRITE_STALL_LIMIT: usize = 100;
const OVERFLOW_LOG_EVERY: u64 = 100;

/// End-of-line convention.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::VariantNames,
)]
pub enum LineStyle {
    /// `\n`
    #[strum(to_string = "LF")]
    Lf,
    /// `\r`
    #[strum(to_string = "CR")]
    Cr,
    /// `\r\n`
    #[strum(to_string = "CRLF")]
    Crlf,
    /// `\0`
    Zero,
    /// Accepts CR, LF, CRLF, 0xd0 and `\0` on input, sends CRLF.
    Sloppy,
}

crate::param_enum!(LineStyle);

impl LineStyle {
    pub const ALL: [LineStyle; 5] = [
        LineStyle::Lf,
        LineStyle::Cr,
        LineStyle::Crlf,
        LineStyle::Zero,
        LineStyle::Sloppy,
    ];

    /// Bytes appended to outgoing lines.
    pub fn terminator(self) -> &'static [u8] {
        match self {
            LineStyle::Lf => b"\n",
            LineStyle::Cr => b"\r",
            LineStyle::Crlf | LineStyle::Sloppy => b"\r\n",
            LineStyle::Zero => b"\0",
        }
    }
}

/// Input terminal emulation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::VariantNames,
)]
pub enum TerminalMode {
    Plain,
    #[strum(to_string = "VT100")]
    Vt100,
}

crate::param_enum!(TerminalMode);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parity {
    None,
    Even,
    Odd,
}

/// Character framing, written `8N1` style: data bits (5-8), parity
/// (`N`, `E`, `O`), stop bits (1-2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: u8,
}

impl Default for FrameFormat {
    fn default() -> Self {
        Self {
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
        }
    }
}

impl FromStr for FrameFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::validation("format", format!("[{s}] is not a frame format like 8N1"));
        let &[data, parity, stop] = s.as_bytes() else {
            return Err(invalid());
        };
        let data_bits = match data {
            b'5'..=b'8' => data - b'0',
            _ => return Err(invalid()),
        };
        let parity = match parity {
            b'N' => Parity::None,
            b'E' => Parity::Even,
            b'O' => Parity::Odd,
            _ => return Err(invalid()),
        };
        let stop_bits = match stop {
            b'1' | b'2' => stop - b'0',
            _ => return Err(invalid()),
        };
        Ok(Self {
            data_bits,
            parity,
            stop_bits,
        })
    }
}

impl fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Even => 'E',
            Parity::Odd => 'O',
        };
        write!(f, "{}{}{}", self.data_bits, parity, self.stop_bits)
    }
}

/// Line settings applied to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    pub baudrate: u32,
    pub format: FrameFormat,
    /// XON/XOFF
    pub flowsoft: bool,
    /// RTS/CTS
    pub flowhard: bool,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baudrate: 115200,
            format: FrameFormat::default(),
            flowsoft: false,
            flowhard: false,
        }
    }
}

/// Handles to the parameters of a [`Serial`].
pub struct SerialParams {
    pub devname: Arc<Parameter<String>>,
    pub baudrate: Arc<Parameter<u32>>,
    pub format: Arc<Parameter<String>>,
    pub flowsoft: Arc<Parameter<bool>>,
    pub flowhard: Arc<Parameter<bool>>,
    pub linestyle: Arc<Parameter<LineStyle>>,
    pub mode: Arc<Parameter<TerminalMode>>,
}

// Everything the read and write paths touch, behind the port mutex. The
// parameter callbacks keep it in sync with the parameter values.
struct Port {
    /// Between `post_init` and `post_uninit`: a named device must be open.
    running: bool,
    devname: String,
    settings: SerialSettings,
    blocking: (bool, Duration),
    line: LineDiscipline,
    device: Option<Box<dyn SerialDevice>>,
    write_overflows: u64,
}

impl Port {
    fn device(&mut self) -> Result<&mut Box<dyn SerialDevice>> {
        let devname = &self.devname;
        self.device.as_mut().ok_or_else(|| {
            Error::Io(io::Error::new(
                io::ErrorKind::NotConnected,
                format!("serial port [{devname}] is not open"),
            ))
        })
    }

    fn open_device(&self, opener: &DeviceOpener, name: &str) -> Result<Box<dyn SerialDevice>> {
        let mut device = opener(name)?;
        device.configure(&self.settings)?;
        device.set_blocking(self.blocking.0, self.blocking.1)?;
        device.flush_input()?;
        Ok(device)
    }

    fn open(&mut self, opener: &DeviceOpener) -> Result<()> {
        let device = self.open_device(opener, &self.devname)?;
        self.device = Some(device);
        self.line.clear();
        Ok(())
    }

    /// Dropping the device restores its saved terminal state.
    fn close(&mut self) -> bool {
        self.line.clear();
        self.device.take().is_some()
    }

    fn switch_device(&mut self, name: &str, opener: &DeviceOpener) -> Result<()> {
        if name.is_empty() {
            if self.close() {
                info!(device = %self.devname, "Device name cleared, serial port closed");
            }
        } else if self.running {
            // The new device must be up before the old one goes away
            let device = self.open_device(opener, name)?;
            self.line.clear();
            if self.device.replace(device).is_some() {
                info!(from = %self.devname, to = name, "Switched serial device");
            } else {
                info!(device = name, "Serial port open");
            }
        }
        self.devname = name.to_string();
        Ok(())
    }

    fn update(&mut self, change: impl FnOnce(&mut SerialSettings)) -> Result<()> {
        let mut settings = self.settings.clone();
        change(&mut settings);
        if let Some(device) = self.device.as_mut() {
            device.configure(&settings)?;
        }
        self.settings = settings;
        Ok(())
    }

    fn read_some(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.line.next_line() {
            return Ok(Some(line));
        }

        let mut buf = [0u8; READ_CHUNK];
        loop {
            let n = match self.device()?.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.line.push(&buf[..n]);
            if let Some(line) = self.line.next_line() {
                return Ok(Some(line));
            }
        }
    }

    fn read_string(&mut self) -> Result<String> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.line.next_line() {
                return Ok(line);
            }
            let n = match self.device()?.read(&mut buf) {
                Ok(0) => return Err(Error::Timeout),
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Err(Error::Timeout),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.line.push(&buf[..n]);
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut written = 0;
        let mut stalls = 0;
        while written < bytes.len() {
            match self.device()?.write(&bytes[written..]) {
                Ok(0) => stalls += 1,
                Ok(n) => {
                    written += n;
                    stalls = 0;
                    continue;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => stalls += 1,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }

            if stalls > WRITE_STALL_LIMIT {
                return Err(self.overflow(bytes.len() - written));
            }
            thread::sleep(WRITE_RETRY_DELAY);
        }
        Ok(())
    }

    fn overflow(&mut self, dropped: usize) -> Error {
        self.write_overflows += 1;
        if self.write_overflows % OVERFLOW_LOG_EVERY == 1 {
            error!(
                device = %self.devname,
                dropped,
                overflows = self.write_overflows,
                "Serial write overflow, output dropped"
            );
        }
        Error::WriteOverflow(self.devname.clone())
    }
}

/// A serial port, as a component and a [`UserInterface`].
pub struct Serial {
    core: ComponentCore,
    kind: InterfaceType,
    params: SerialParams,
    port: Arc<Mutex<Port>>,
    opener: DeviceOpener,
}

impl Serial {
    /// Serial port on a real terminal device.
    pub fn new(core: ComponentCore, kind: InterfaceType) -> Result<Self> {
        Self::with_opener(core, kind, tty_opener())
    }

    /// Serial port whose devices are opened through `opener`.
    pub fn with_opener(core: ComponentCore, kind: InterfaceType, opener: DeviceOpener) -> Result<Self> {
        let params = SerialParams {
            devname: core.declare(ParameterDef::new(
                "devname",
                "Device file name",
                String::new(),
                PARAM_CATEGORY,
            ))?,
            baudrate: core.declare(
                ParameterDef::new("baudrate", "Baudrate", 115200u32, PARAM_CATEGORY)
                    .with_valid_values(BAUDRATES),
            )?,
            format: core.declare(
                ParameterDef::new("format", "Data format", String::from("8N1"), PARAM_CATEGORY)
                    .with_regex("^[5-8][NEO][12]$"),
            )?,
            flowsoft: core.declare(ParameterDef::new(
                "flowsoft",
                "Use soft (XON/XOFF) flow control",
                false,
                PARAM_CATEGORY,
            ))?,
            flowhard: core.declare(ParameterDef::new(
                "flowhard",
                "Use hard (RTS/CTS) flow control",
                false,
                PARAM_CATEGORY,
            ))?,
            linestyle: core.declare(
                ParameterDef::new(
                    "linestyle",
                    "End of line style: LF is for 0x0a [\\n]; CR is for 0x0d [\\r]; CRLF is for \
                     0x0d 0x0a [\\r\\n]; Zero is for 0x00 [\\0]; Sloppy accepts any of CR, LF, \
                     CRLF, 0xd0 (issued by some keyboards instead of Return), and Zero as input \
                     and issues CRLF in outputs.",
                    LineStyle::Sloppy,
                    PARAM_CATEGORY,
                )
                .with_valid_values(LineStyle::ALL),
            )?,
            mode: core.declare(
                ParameterDef::new(
                    "mode",
                    "Terminal emulation mode for input",
                    TerminalMode::Plain,
                    PARAM_CATEGORY,
                )
                .with_valid_values([TerminalMode::Plain, TerminalMode::Vt100]),
            )?,
        };

        let port = Arc::new(Mutex::new(Port {
            running: false,
            devname: params.devname.get(),
            settings: SerialSettings::default(),
            blocking: (false, Duration::ZERO),
            line: LineDiscipline::new(params.linestyle.get(), params.mode.get()),
            device: None,
            write_overflows: 0,
        }));

        let (p, open) = (port.clone(), opener.clone());
        params
            .devname
            .set_callback(move |name| p.lock().switch_device(name, &open));

        let p = port.clone();
        params
            .baudrate
            .set_callback(move |rate| p.lock().update(|s| s.baudrate = *rate));

        let p = port.clone();
        params.format.set_callback(move |format| {
            let format: FrameFormat = format.parse()?;
            p.lock().update(|s| s.format = format)
        });

        let p = port.clone();
        params
            .flowsoft
            .set_callback(move |on| p.lock().update(|s| s.flowsoft = *on));

        let p = port.clone();
        params
            .flowhard
            .set_callback(move |on| p.lock().update(|s| s.flowhard = *on));

        let p = port.clone();
        params.linestyle.set_callback(move |style| {
            p.lock().line.set_style(*style);
            Ok(())
        });

        let p = port.clone();
        params.mode.set_callback(move |mode| {
            p.lock().line.set_mode(*mode);
            Ok(())
        });

        Ok(Self {
            core,
            kind,
            params,
            port,
            opener,
        })
    }

    pub fn params(&self) -> &SerialParams {
        &self.params
    }

    pub fn is_open(&self) -> bool {
        self.port.lock().device.is_some()
    }

    /// Settings currently applied, or to be applied on open.
    pub fn settings(&self) -> SerialSettings {
        self.port.lock().settings.clone()
    }

    /// Number of writes dropped because the device stopped accepting data.
    pub fn write_overflows(&self) -> u64 {
        self.port.lock().write_overflows
    }

    /// Switch between non-blocking reads (the default) and blocking reads
    /// with a timeout rounded to tenths of a second. A zero timeout blocks
    /// until at least one byte arrives.
    pub fn set_blocking(&self, blocking: bool, timeout: Duration) -> Result<()> {
        let mut port = self.port.lock();
        if let Some(device) = port.device.as_mut() {
            device.set_blocking(blocking, timeout)?;
        }
        port.blocking = (blocking, timeout);
        Ok(())
    }

    /// Drop DTR for `duration`, then raise it again.
    pub fn toggle_dtr(&self, duration: Duration) -> Result<()> {
        let mut port = self.port.lock();
        let device = port.device()?;
        device.set_dtr(false)?;
        thread::sleep(duration);
        device.set_dtr(true)
    }

    pub fn send_break(&self) -> Result<()> {
        self.port.lock().device()?.send_break()
    }

    /// Read raw bytes. Returns 0 when nothing is available or a blocking
    /// read timed out. Line assembly state is not touched.
    pub fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut port = self.port.lock();
        loop {
            return match port.device()?.read(buf) {
                Ok(n) => Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => Err(e.into()),
            };
        }
    }

    /// Write raw bytes and wait until they have been transmitted.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut port = self.port.lock();
        port.write_all(bytes)?;
        port.device()?.drain()
    }

    /// Write raw bytes without waiting for them to be transmitted.
    pub fn write_no_check(&self, bytes: &[u8]) -> Result<()> {
        self.port.lock().write_all(bytes)
    }

    /// Discard pending input, including any partially assembled line.
    pub fn flush(&self) -> Result<()> {
        let mut port = self.port.lock();
        port.line.clear();
        port.device()?.flush_input()
    }

    /// Read one line, for ports in blocking mode. Fails with
    /// [`Error::Timeout`] when the device runs out of data first.
    pub fn read_string(&self) -> Result<String> {
        self.port.lock().read_string()
    }
}

impl Component for Serial {
    fn core(&self) -> &ComponentCore {
        &self.core
    }

    fn post_init(&self) -> Result<()> {
        let mut port = self.port.lock();
        if port.devname.is_empty() {
            info!(serial = %self.core.instance_name(), "No device name set, serial port stays closed");
            port.running = true;
            return Ok(());
        }
        port.open(&self.opener)?;
        port.running = true;
        info!(
            serial = %self.core.instance_name(),
            device = %port.devname,
            baudrate = port.settings.baudrate,
            format = %port.settings.format,
            "Serial port open"
        );
        Ok(())
    }

    fn post_uninit(&self) -> Result<()> {
        let mut port = self.port.lock();
        port.running = false;
        if port.close() {
            debug!(serial = %self.core.instance_name(), device = %port.devname, "Serial port closed");
        }
        Ok(())
    }
}

impl UserInterface for Serial {
    fn read_some(&self) -> Result<Option<String>> {
        self.port.lock().read_some()
    }

    fn write_string(&self, s: &str) -> Result<()> {
        let mut port = self.port.lock();
        let terminator = port.line.style().terminator();
        let mut bytes = Vec::with_capacity(s.len() + terminator.len());
        bytes.extend_from_slice(s.as_bytes());
        bytes.extend_from_slice(terminator);
        port.write_all(&bytes)
    }

    fn interface_type(&self) -> InterfaceType {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::from_string;

    #[test]
    fn test_line_style_strings() {
        assert_eq!(LineStyle::Crlf.to_string(), "CRLF");
        assert_eq!(from_string::<LineStyle>("LF").unwrap(), LineStyle::Lf);
        assert_eq!(from_string::<LineStyle>("Sloppy").unwrap(), LineStyle::Sloppy);
        assert!(from_string::<LineStyle>("crlf").is_err());
        assert_eq!(from_string::<TerminalMode>("VT100").unwrap(), TerminalMode::Vt100);
    }

    #[test]
    fn test_terminators() {
        assert_eq!(LineStyle::Lf.terminator(), b"\n");
        assert_eq!(LineStyle::Cr.terminator(), b"\r");
        assert_eq!(LineStyle::Crlf.terminator(), b"\r\n");
        assert_eq!(LineStyle::Zero.terminator(), b"\0");
        assert_eq!(LineStyle::Sloppy.terminator(), b"\r\n");
    }

    #[test]
    fn test_frame_format() {
        let f: FrameFormat = "7E2".parse().unwrap();
        assert_eq!(
            f,
            FrameFormat {
                data_bits: 7,
                parity: Parity::Even,
                stop_bits: 2
            }
        );
        assert_eq!(f.to_string(), "7E2");
        assert_eq!(FrameFormat::default().to_string(), "8N1");
        for bad in ["", "8N", "9N1", "8X1", "8N3", "8N1 "] {
            assert!(bad.parse::<FrameFormat>().is_err(), "{bad}");
        }
    }

    #[test]
    fn test_baudrate_list_matches_param() {
        let core = ComponentCore::new("serial", "Serial");
        let serial = Serial::with_opener(core, InterfaceType::Hard, mock::MockDevice::new("m").opener())
            .unwrap();
        assert!(serial.params().baudrate.set(14400).is_ok());
        assert!(serial.params().baudrate.set(14401).is_err());
        assert_eq!(serial.settings().baudrate, 14400);
    }
}
