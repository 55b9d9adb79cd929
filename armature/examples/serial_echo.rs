//! Bridge a serial port and the terminal: lines typed on stdin go out on the
//! port, lines received on the port are printed.
//!
//! ```shell
//! cargo run --example serial_echo -- --device /dev/ttyUSB0 --baudrate 9600 \
//!     --set serial:linestyle=CRLF
//! ```

use std::thread;
use std::time::Duration;

use armature::prelude::*;
use armature::serial::Serial;
use armature::user_interface::StreamInterface;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
struct Args {
    #[arg(short, long, help = "Serial device, e.g. /dev/ttyUSB0")]
    device: String,
    #[arg(short, long, default_value = "115200", help = "Baud rate")]
    baudrate: u32,
    #[arg(long = "set", value_name = "DESC=VALUE", help = "Extra parameter value, repeatable")]
    overrides: Vec<String>,
    #[arg(long, help = "Print every parameter of the tree and exit")]
    list: bool,
}

struct Bridge {
    core: ComponentCore,
}

impl Component for Bridge {
    fn core(&self) -> &ComponentCore {
        &self.core
    }
}

fn bridge(core: ComponentCore) -> Result<Bridge> {
    let bridge = Bridge { core };
    bridge.add_sub_component("serial", |core| Serial::new(core, InterfaceType::Hard))?;
    Ok(bridge)
}

fn init_log_from_env_or(default: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    init_log_from_env_or("info");
    let args = Args::parse();

    let mut builder = RootBuilder::new("bridge", bridge)
        .with_param("serial:devname", args.device.clone())
        .with_param("serial:baudrate", args.baudrate);
    for item in &args.overrides {
        let (desc, value) = item.split_once('=').ok_or_else(|| {
            Error::Snapshot(format!("--set expects DESC=VALUE, got [{item}]"))
        })?;
        builder = builder.with_override(desc, value);
    }

    if args.list {
        let root = builder.build()?;
        for p in root.param_summaries() {
            println!(
                "{} = {} ({}, {}) -- {}",
                p.descriptor, p.value, p.value_type, p.valid_values, p.description
            );
        }
        return Ok(());
    }

    let root = builder.with_init().build()?;
    let serial: std::sync::Arc<Serial> = root.get_sub_component("serial")?;
    let console = StreamInterface::stdio();
    info!(device = %args.device, "Bridging serial port to stdio, type 'quit' to exit");

    loop {
        let mut idle = true;

        if let Some(line) = console.read_some()? {
            idle = false;
            if line == "quit" {
                break;
            }
            serial.write_string(&line)?;
        }

        if let Some(line) = serial.read_some()? {
            idle = false;
            console.write_string(&line)?;
        }

        if idle {
            thread::sleep(Duration::from_millis(5));
        }
    }
    Ok(())
}
