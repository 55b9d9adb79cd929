//! Access to the serial device behind a [`Serial`](super::Serial) port.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::sync::Arc;
use std::time::Duration;

use nix::fcntl::{FcntlArg, OFlag, fcntl};
use nix::libc;
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices, Termios,
};
use tracing::{debug, warn};

use super::{FrameFormat, Parity, SerialSettings};
use crate::{Error, Result};

/// Operations a serial port needs from its device.
///
/// `read` and `write` follow `std::io` conventions: in non-blocking mode
/// they fail with [`io::ErrorKind::WouldBlock`] when nothing can be
/// transferred, and `read` returns `Ok(0)` when a blocking read timed out.
pub trait SerialDevice: Send {
    fn name(&self) -> &str;

    /// Apply line settings. On error the previous settings stay in effect.
    /// The blocking mode set by `set_blocking` is kept.
    fn configure(&mut self, settings: &SerialSettings) -> Result<()>;

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Wait until all written bytes have been transmitted.
    fn drain(&mut self) -> Result<()>;

    /// Discard received bytes not read yet.
    fn flush_input(&mut self) -> Result<()>;

    /// Blocking reads wait up to `timeout`, rounded to tenths of a second,
    /// or forever for at least one byte when `timeout` is zero.
    fn set_blocking(&mut self, blocking: bool, timeout: Duration) -> Result<()>;

    fn set_dtr(&mut self, active: bool) -> Result<()>;

    fn send_break(&mut self) -> Result<()>;
}

/// Opens the device named by the `devname` parameter.
pub type DeviceOpener = Arc<dyn Fn(&str) -> Result<Box<dyn SerialDevice>> + Send + Sync>;

/// Opener for real terminal devices.
pub fn tty_opener() -> DeviceOpener {
    Arc::new(|name| Ok(Box::new(TtyDevice::open(name)?) as Box<dyn SerialDevice>))
}

nix::ioctl_read_bad!(tiocmget, libc::TIOCMGET, libc::c_int);
nix::ioctl_write_ptr_bad!(tiocmset, libc::TIOCMSET, libc::c_int);

/// A POSIX terminal device driven through termios.
///
/// The terminal state found at open time is restored on drop.
pub struct TtyDevice {
    name: String,
    file: File,
    saved: Termios,
}

impl TtyDevice {
    /// Open `path` in raw, non-blocking mode, without making it the
    /// controlling terminal.
    pub fn open(path: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| Error::device_config(path, e))?;

        let saved = termios::tcgetattr(&file).map_err(|e| Error::device_config(path, e))?;
        debug!(device = path, "Opened terminal device");

        Ok(Self {
            name: path.to_string(),
            file,
            saved,
        })
    }

    fn fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    fn err(&self, e: impl std::fmt::Display) -> Error {
        Error::device_config(&self.name, e)
    }

    fn modem_bits(&self) -> Result<libc::c_int> {
        let mut bits: libc::c_int = 0;
        // SAFETY: the fd is open for the lifetime of self and `bits` outlives the call
        unsafe { tiocmget(self.fd(), &mut bits) }.map_err(|e| self.err(e))?;
        Ok(bits)
    }

    fn set_modem_bits(&self, bits: libc::c_int) -> Result<()> {
        // SAFETY: as above
        unsafe { tiocmset(self.fd(), &bits) }.map_err(|e| self.err(e))?;
        Ok(())
    }
}

/// termios speed constant for a baud rate.
pub fn baud_rate(rate: u32) -> Option<BaudRate> {
    Some(match rate {
        110 => BaudRate::B110,
        300 => BaudRate::B300,
        600 => BaudRate::B600,
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        460800 => BaudRate::B460800,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        921600 => BaudRate::B921600,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1000000 => BaudRate::B1000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1152000 => BaudRate::B1152000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        1500000 => BaudRate::B1500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        2000000 => BaudRate::B2000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        2500000 => BaudRate::B2500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        3000000 => BaudRate::B3000000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        3500000 => BaudRate::B3500000,
        #[cfg(any(target_os = "linux", target_os = "android"))]
        4000000 => BaudRate::B4000000,
        // 14400 is in the historical rate list but has no termios constant
        _ => return None,
    })
}

fn apply_format(t: &mut Termios, format: &FrameFormat) {
    let cflags = &mut t.control_flags;
    cflags.remove(ControlFlags::CSIZE);
    cflags.insert(match format.data_bits {
        5 => ControlFlags::CS5,
        6 => ControlFlags::CS6,
        7 => ControlFlags::CS7,
        _ => ControlFlags::CS8,
    });

    match format.parity {
        Parity::None => cflags.remove(ControlFlags::PARENB | ControlFlags::PARODD),
        Parity::Even => {
            cflags.insert(ControlFlags::PARENB);
            cflags.remove(ControlFlags::PARODD);
        }
        Parity::Odd => cflags.insert(ControlFlags::PARENB | ControlFlags::PARODD),
    }

    cflags.set(ControlFlags::CSTOPB, format.stop_bits == 2);
}

impl SerialDevice for TtyDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, settings: &SerialSettings) -> Result<()> {
        let speed = baud_rate(settings.baudrate)
            .ok_or_else(|| self.err(format!("unsupported baud rate {}", settings.baudrate)))?;

        let mut t = termios::tcgetattr(&self.file).map_err(|e| self.err(e))?;
        // cfmakeraw resets VMIN and VTIME, which belong to set_blocking
        let (vmin, vtime) = (
            t.control_chars[SpecialCharacterIndices::VMIN as usize],
            t.control_chars[SpecialCharacterIndices::VTIME as usize],
        );
        termios::cfmakeraw(&mut t);
        t.control_chars[SpecialCharacterIndices::VMIN as usize] = vmin;
        t.control_chars[SpecialCharacterIndices::VTIME as usize] = vtime;
        termios::cfsetspeed(&mut t, speed).map_err(|e| self.err(e))?;
        apply_format(&mut t, &settings.format);

        t.control_flags.insert(ControlFlags::CREAD | ControlFlags::CLOCAL);
        t.control_flags.set(ControlFlags::CRTSCTS, settings.flowhard);
        t.input_flags.set(InputFlags::IXON | InputFlags::IXOFF, settings.flowsoft);
        t.input_flags.remove(InputFlags::IXANY);

        termios::tcsetattr(&self.file, SetArg::TCSANOW, &t).map_err(|e| self.err(e))?;
        debug!(device = %self.name, ?settings, "Configured terminal");
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn drain(&mut self) -> Result<()> {
        termios::tcdrain(&self.file).map_err(|e| self.err(e))
    }

    fn flush_input(&mut self) -> Result<()> {
        termios::tcflush(&self.file, FlushArg::TCIFLUSH).map_err(|e| self.err(e))
    }

    fn set_blocking(&mut self, blocking: bool, timeout: Duration) -> Result<()> {
        let flags = fcntl(self.fd(), FcntlArg::F_GETFL).map_err(|e| self.err(e))?;
        let mut flags = OFlag::from_bits_truncate(flags);
        flags.set(OFlag::O_NONBLOCK, !blocking);
        fcntl(self.fd(), FcntlArg::F_SETFL(flags)).map_err(|e| self.err(e))?;

        let mut t = termios::tcgetattr(&self.file).map_err(|e| self.err(e))?;
        let tenths = (timeout.as_millis() / 100).min(255) as libc::cc_t;
        let (vmin, vtime) = match (blocking, tenths) {
            (false, _) => (0, 0),
            (true, 0) => (1, 0),
            (true, tenths) => (0, tenths),
        };
        t.control_chars[SpecialCharacterIndices::VMIN as usize] = vmin;
        t.control_chars[SpecialCharacterIndices::VTIME as usize] = vtime;
        termios::tcsetattr(&self.file, SetArg::TCSANOW, &t).map_err(|e| self.err(e))
    }

    fn set_dtr(&mut self, active: bool) -> Result<()> {
        let mut bits = self.modem_bits()?;
        if active {
            bits |= libc::TIOCM_DTR;
        } else {
            bits &= !libc::TIOCM_DTR;
        }
        self.set_modem_bits(bits)
    }

    fn send_break(&mut self) -> Result<()> {
        termios::tcsendbreak(&self.file, 0).map_err(|e| self.err(e))
    }
}

impl Drop for TtyDevice {
    fn drop(&mut self) {
        if let Err(e) = termios::tcsetattr(&self.file, SetArg::TCSANOW, &self.saved) {
            warn!(device = %self.name, error = %e, "Failed to restore terminal state");
        } else {
            debug!(device = %self.name, "Restored terminal state");
        }
    }
}
