//! In-memory serial device.
//!
//! A [`MockDevice`] is a cheap handle: clones share the same state, so a
//! test keeps one clone to feed input and inspect output while the port
//! owns another.
//!
//! ```
//! use armature::serial::mock::MockDevice;
//! use armature::serial::device::SerialDevice;
//!
//! let mock = MockDevice::new("/dev/mock0");
//! let mut device = mock.clone();
//! mock.feed(b"ping\n");
//!
//! let mut buf = [0u8; 16];
//! let n = SerialDevice::read(&mut device, &mut buf).unwrap();
//! assert_eq!(&buf[..n], b"ping\n");
//! ```

use std::collections::{HashSet, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::SerialSettings;
use super::device::{DeviceOpener, SerialDevice};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct MockState {
    input: VecDeque<u8>,
    output: Vec<u8>,
    settings: Option<SerialSettings>,
    rejected_rates: HashSet<u32>,
    // Bytes accepted before writes start failing with WouldBlock
    write_budget: Option<usize>,
    blocking: Option<(bool, Duration)>,
    dtr_changes: Vec<bool>,
    breaks: usize,
    drains: usize,
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    name: Arc<str>,
    state: Arc<Mutex<MockState>>,
}

impl MockDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            state: Arc::default(),
        }
    }

    /// Opener handing out clones of this device, whatever the name asked for.
    pub fn opener(&self) -> DeviceOpener {
        let device = self.clone();
        Arc::new(move |_| Ok(Box::new(device.clone()) as Box<dyn SerialDevice>))
    }

    /// Make bytes available to `read`.
    pub fn feed(&self, bytes: &[u8]) {
        self.state.lock().input.extend(bytes);
    }

    /// Everything written so far, clearing the record.
    pub fn take_output(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.lock().output)
    }

    pub fn pending_input(&self) -> usize {
        self.state.lock().input.len()
    }

    /// Settings from the last successful `configure`.
    pub fn settings(&self) -> Option<SerialSettings> {
        self.state.lock().settings.clone()
    }

    /// Make `configure` fail for this baud rate.
    pub fn reject_baudrate(&self, rate: u32) {
        self.state.lock().rejected_rates.insert(rate);
    }

    /// Accept at most `budget` more bytes, then stall. `None` lifts the limit.
    pub fn set_write_budget(&self, budget: Option<usize>) {
        self.state.lock().write_budget = budget;
    }

    pub fn blocking(&self) -> Option<(bool, Duration)> {
        self.state.lock().blocking
    }

    pub fn dtr_changes(&self) -> Vec<bool> {
        self.state.lock().dtr_changes.clone()
    }

    pub fn breaks(&self) -> usize {
        self.state.lock().breaks
    }

    pub fn drains(&self) -> usize {
        self.state.lock().drains
    }
}

impl SerialDevice for MockDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&mut self, settings: &SerialSettings) -> Result<()> {
        let mut state = self.state.lock();
        if state.rejected_rates.contains(&settings.baudrate) {
            return Err(Error::device_config(
                &*self.name,
                format!("unsupported baud rate {}", settings.baudrate),
            ));
        }
        state.settings = Some(settings.clone());
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if state.input.is_empty() {
            return match state.blocking {
                // A blocking read with a timeout expires with no data
                Some((true, _)) => Ok(0),
                _ => Err(io::ErrorKind::WouldBlock.into()),
            };
        }
        let n = buf.len().min(state.input.len());
        for (dst, src) in buf.iter_mut().zip(state.input.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        let n = match state.write_budget {
            Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
            Some(budget) => budget.min(buf.len()),
            None => buf.len(),
        };
        if let Some(budget) = state.write_budget.as_mut() {
            *budget -= n;
        }
        state.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn drain(&mut self) -> Result<()> {
        self.state.lock().drains += 1;
        Ok(())
    }

    fn flush_input(&mut self) -> Result<()> {
        self.state.lock().input.clear();
        Ok(())
    }

    fn set_blocking(&mut self, blocking: bool, timeout: Duration) -> Result<()> {
        self.state.lock().blocking = Some((blocking, timeout));
        Ok(())
    }

    fn set_dtr(&mut self, active: bool) -> Result<()> {
        self.state.lock().dtr_changes.push(active);
        Ok(())
    }

    fn send_break(&mut self) -> Result<()> {
        self.state.lock().breaks += 1;
        Ok(())
    }
}
