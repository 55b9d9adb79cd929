//! Line-oriented command channels.

use std::io::{BufRead, Write};
use std::thread;

use flume::{Receiver, TryRecvError};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::Result;

/// Kind of channel a [`UserInterface`] talks over.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::VariantNames,
)]
pub enum InterfaceType {
    /// Hardware serial port.
    Hard,
    /// Serial-over-USB gadget port.
    Usb,
    /// Process standard input and output.
    Stdio,
}

/// A channel that receives command lines and sends responses.
pub trait UserInterface: Send + Sync {
    /// Consume whatever input is available. Returns a line, without its
    /// terminator, once one is complete.
    fn read_some(&self) -> Result<Option<String>>;

    /// Send `s` followed by the channel's line terminator.
    fn write_string(&self, s: &str) -> Result<()>;

    fn interface_type(&self) -> InterfaceType;
}

/// [`UserInterface`] over a pair of blocking streams.
///
/// Lines are read by a background thread so that `read_some` never blocks.
/// Output lines are terminated with `\n`.
pub struct StreamInterface<W> {
    lines: Receiver<String>,
    output: Mutex<W>,
    kind: InterfaceType,
}

impl<W: Write + Send> StreamInterface<W> {
    pub fn new<R>(input: R, output: W, kind: InterfaceType) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = flume::unbounded();
        thread::spawn(move || {
            for line in input.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Input stream failed, no more lines");
                        break;
                    }
                }
            }
            debug!("Input stream closed");
        });

        Self {
            lines: rx,
            output: Mutex::new(output),
            kind,
        }
    }
}

impl StreamInterface<std::io::Stdout> {
    /// Interface over the process's standard input and output.
    pub fn stdio() -> Self {
        Self::new(
            std::io::BufReader::new(std::io::stdin()),
            std::io::stdout(),
            InterfaceType::Stdio,
        )
    }
}

impl<W: Write + Send> UserInterface for StreamInterface<W> {
    fn read_some(&self) -> Result<Option<String>> {
        match self.lines.try_recv() {
            // Tolerate CRLF input
            Ok(line) => Ok(Some(line.strip_suffix('\r').unwrap_or(&line).to_string())),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => Ok(None),
        }
    }

    fn write_string(&self, s: &str) -> Result<()> {
        let mut out = self.output.lock();
        out.write_all(s.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }

    fn interface_type(&self) -> InterfaceType {
        self.kind
    }
}
