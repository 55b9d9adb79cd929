//! Serial port component over in-memory devices.

mod common;

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use armature::prelude::*;
use armature::serial::device::{DeviceOpener, SerialDevice};
use armature::serial::mock::MockDevice;
use armature::serial::{FrameFormat, LineStyle, Parity, Serial, SerialSettings, TerminalMode};
use common::{App, app};

const DEV: &str = "/dev/ttyMOCK0";

/// `app` with a `serial` child whose device is `mock`. The device name is
/// set but the tree is not initialized yet.
fn serial_tree(mock: &MockDevice) -> Result<(Root<App>, Arc<Serial>)> {
    let root = Root::new("app", app)?;
    let opener = mock.opener();
    let serial = root.add_sub_component("serial", |core| {
        Serial::with_opener(core, InterfaceType::Hard, opener)
    })?;
    root.set_param_val("serial:devname", DEV.to_string())?;
    Ok((root, serial))
}

fn open_serial(mock: &MockDevice) -> Result<(Root<App>, Arc<Serial>)> {
    let (root, serial) = serial_tree(mock)?;
    root.init()?;
    Ok((root, serial))
}

/// Opener resolving names against a fixed set of mock devices.
fn map_opener(devices: &[&MockDevice]) -> DeviceOpener {
    let devices: HashMap<String, MockDevice> = devices
        .iter()
        .map(|d| (d.name().to_string(), (*d).clone()))
        .collect();
    Arc::new(move |name| {
        devices
            .get(name)
            .map(|d| Box::new(d.clone()) as Box<dyn SerialDevice>)
            .ok_or_else(|| {
                Error::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no such device {name}"),
                ))
            })
    })
}

#[test]
fn test_sloppy_reassembles_split_lines() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;
    assert_eq!(serial.params().linestyle.get(), LineStyle::Sloppy);

    mock.feed(b"hel");
    assert_eq!(serial.read_some()?, None);
    mock.feed(b"lo\r");
    assert_eq!(serial.read_some()?.as_deref(), Some("hello"));
    mock.feed(b"world\n");
    assert_eq!(serial.read_some()?.as_deref(), Some("world"));
    assert_eq!(serial.read_some()?, None);
    Ok(())
}

#[test]
fn test_sloppy_collapses_crlf() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;

    mock.feed(b"one\r\ntwo\r\n\r\nthree\0");
    assert_eq!(serial.read_some()?.as_deref(), Some("one"));
    assert_eq!(serial.read_some()?.as_deref(), Some("two"));
    assert_eq!(serial.read_some()?.as_deref(), Some("three"));
    assert_eq!(serial.read_some()?, None);
    Ok(())
}

#[test]
fn test_crlf_write_and_read() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;
    root.set_param_val("serial:linestyle", LineStyle::Crlf)?;

    serial.write_string("ok")?;
    assert_eq!(mock.take_output(), b"ok\r\n");

    // A lone CR is part of the line
    mock.feed(b"a\rb\r\n");
    assert_eq!(serial.read_some()?.as_deref(), Some("a\rb"));
    Ok(())
}

#[test]
fn test_linestyle_by_string() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;

    for (style, expected) in [
        ("LF", &b"x\n"[..]),
        ("CR", &b"x\r"[..]),
        ("Zero", &b"x\0"[..]),
    ] {
        root.set_param_string_unique("serial:linestyle", style)?;
        serial.write_string("x")?;
        assert_eq!(mock.take_output(), expected, "{style}");
    }
    assert!(root.set_param_string("serial:linestyle", "crlf").is_err());
    assert_eq!(serial.params().linestyle.get(), LineStyle::Zero);
    Ok(())
}

#[test]
fn test_empty_devname_stays_closed() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let root = Root::new("app", app)?;
    let opener = mock.opener();
    let serial = root.add_sub_component("serial", |core| {
        Serial::with_opener(core, InterfaceType::Usb, opener)
    })?;

    root.init()?;
    assert!(serial.is_initialized());
    assert!(!serial.is_open());
    assert_eq!(serial.interface_type(), InterfaceType::Usb);
    assert!(mock.settings().is_none());

    let err = serial.read_some().unwrap_err();
    assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::NotConnected));
    assert!(serial.write_string("lost").is_err());
    Ok(())
}

#[test]
fn test_devname_set_after_init_opens_port() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let root = Root::new("app", app)?;
    let opener = mock.opener();
    let serial = root.add_sub_component("serial", |core| {
        Serial::with_opener(core, InterfaceType::Hard, opener)
    })?;
    root.init()?;
    assert!(!serial.is_open());

    root.set_param_val("serial:devname", DEV.to_string())?;
    assert!(serial.is_open());
    assert_eq!(mock.settings(), Some(SerialSettings::default()));
    mock.feed(b"up\r");
    assert_eq!(serial.read_some()?.as_deref(), Some("up"));

    // Once uninitialized, a new name is only stored
    root.uninit();
    root.set_param_val("serial:devname", String::new())?;
    root.set_param_val("serial:devname", DEV.to_string())?;
    assert!(!serial.is_open());
    Ok(())
}

#[test]
fn test_settings_applied_on_open() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = serial_tree(&mock)?;
    root.set_param_val("serial:baudrate", 9600u32)?;
    root.set_param_string("serial:format", "7E2")?;
    root.set_param_val("serial:flowhard", true)?;
    mock.feed(b"stale");

    root.init()?;
    assert!(serial.is_open());
    assert_eq!(
        mock.settings(),
        Some(SerialSettings {
            baudrate: 9600,
            format: FrameFormat {
                data_bits: 7,
                parity: Parity::Even,
                stop_bits: 2,
            },
            flowsoft: false,
            flowhard: true,
        })
    );
    assert_eq!(mock.blocking(), Some((false, Duration::ZERO)));
    assert_eq!(mock.pending_input(), 0);
    Ok(())
}

#[test]
fn test_live_reconfigure() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;

    root.set_param_val("serial:baudrate", 57600u32)?;
    root.set_param_val("serial:flowsoft", true)?;
    let live = mock.settings().expect("configured on open");
    assert_eq!(live.baudrate, 57600);
    assert!(live.flowsoft);
    assert_eq!(serial.settings(), live);
    Ok(())
}

#[test]
fn test_rejected_setting_keeps_configuration() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;
    mock.reject_baudrate(230400);

    let err = root.set_param_val("serial:baudrate", 230400u32).unwrap_err();
    assert!(matches!(err, Error::DeviceConfig { .. }));
    assert_eq!(serial.params().baudrate.get(), 115200);
    assert_eq!(serial.settings().baudrate, 115200);
    assert_eq!(mock.settings().map(|s| s.baudrate), Some(115200));

    assert!(matches!(
        root.set_param_val("serial:baudrate", 12345u32),
        Err(Error::Validation { .. })
    ));
    assert!(matches!(
        root.set_param_string("serial:format", "9N1"),
        Err(Error::Validation { .. })
    ));
    assert_eq!(serial.params().format.get(), "8N1");
    Ok(())
}

#[test]
fn test_rejected_baudrate_fails_open() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = serial_tree(&mock)?;
    root.set_param_val("serial:baudrate", 460800u32)?;
    mock.reject_baudrate(460800);

    assert!(matches!(root.init(), Err(Error::DeviceConfig { .. })));
    assert!(!root.is_initialized());
    assert!(!serial.is_open());
    Ok(())
}

#[test]
fn test_devname_switch_while_open() -> Result<()> {
    let first = MockDevice::new("/dev/ttyA");
    let second = MockDevice::new("/dev/ttyB");
    let opener = map_opener(&[&first, &second]);

    let root = Root::new("app", app)?;
    let serial = root.add_sub_component("serial", |core| {
        Serial::with_opener(core, InterfaceType::Hard, opener)
    })?;
    root.set_param_val("serial:devname", "/dev/ttyA".to_string())?;
    root.init()?;

    serial.write_string("a")?;
    root.set_param_val("serial:devname", "/dev/ttyB".to_string())?;
    serial.write_string("b")?;
    assert_eq!(first.take_output(), b"a\r\n");
    assert_eq!(second.take_output(), b"b\r\n");

    // An unknown device leaves the current one in place
    assert!(root.set_param_val("serial:devname", "/dev/ttyC".to_string()).is_err());
    assert_eq!(serial.params().devname.get(), "/dev/ttyB");
    serial.write_string("c")?;
    assert_eq!(second.take_output(), b"c\r\n");

    root.set_param_val("serial:devname", String::new())?;
    assert!(!serial.is_open());
    Ok(())
}

#[test]
fn test_write_overflow() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;
    mock.set_write_budget(Some(3));

    let err = serial.write_string("hello").unwrap_err();
    assert!(matches!(err, Error::WriteOverflow(ref d) if d == DEV));
    assert_eq!(mock.take_output(), b"hel");
    assert_eq!(serial.write_overflows(), 1);

    mock.set_write_budget(None);
    serial.write_string("again")?;
    assert_eq!(mock.take_output(), b"again\r\n");
    assert_eq!(serial.write_overflows(), 1);
    Ok(())
}

#[test]
fn test_read_string_blocking() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = serial_tree(&mock)?;
    serial.set_blocking(true, Duration::from_millis(500))?;
    root.init()?;
    assert_eq!(mock.blocking(), Some((true, Duration::from_millis(500))));

    mock.feed(b"abc");
    assert!(matches!(serial.read_string(), Err(Error::Timeout)));
    mock.feed(b"def\r");
    assert_eq!(serial.read_string()?, "abcdef");

    serial.set_blocking(false, Duration::ZERO)?;
    assert_eq!(mock.blocking(), Some((false, Duration::ZERO)));
    assert!(matches!(serial.read_string(), Err(Error::Timeout)));
    Ok(())
}

#[test]
fn test_raw_io() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;

    serial.write(b"raw")?;
    assert_eq!(mock.drains(), 1);
    serial.write_no_check(b"\x01\x02")?;
    assert_eq!(mock.drains(), 1);
    assert_eq!(mock.take_output(), b"raw\x01\x02");

    let mut buf = [0u8; 8];
    assert_eq!(serial.read(&mut buf)?, 0);
    mock.feed(b"xyz\n");
    assert_eq!(serial.read(&mut buf)?, 4);
    assert_eq!(&buf[..4], b"xyz\n");
    Ok(())
}

#[test]
fn test_flush_discards_partial_line() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;

    mock.feed(b"garb");
    assert_eq!(serial.read_some()?, None);
    mock.feed(b"age");
    serial.flush()?;
    assert_eq!(mock.pending_input(), 0);

    mock.feed(b"cmd\n");
    assert_eq!(serial.read_some()?.as_deref(), Some("cmd"));
    Ok(())
}

#[test]
fn test_modem_control() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (_root, serial) = open_serial(&mock)?;

    serial.toggle_dtr(Duration::from_millis(1))?;
    serial.send_break()?;
    assert_eq!(mock.dtr_changes(), vec![false, true]);
    assert_eq!(mock.breaks(), 1);
    Ok(())
}

#[test]
fn test_vt100_history_recall() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;
    root.set_param_val("serial:mode", TerminalMode::Vt100)?;

    mock.feed(b"statux\x7fs\r");
    assert_eq!(serial.read_some()?.as_deref(), Some("status"));
    mock.feed(b"\x1b[A\r");
    assert_eq!(serial.read_some()?.as_deref(), Some("status"));
    Ok(())
}

#[test]
fn test_uninit_closes_port() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;
    assert!(serial.is_open());

    root.uninit();
    assert!(!serial.is_open());
    assert!(serial.write_string("late").is_err());

    // Settings changed while closed apply on the next open
    root.set_param_val("serial:baudrate", 38400u32)?;
    root.init()?;
    assert_eq!(mock.settings().map(|s| s.baudrate), Some(38400));
    Ok(())
}

#[test]
fn test_concurrent_writers_keep_lines_whole() -> Result<()> {
    let mock = MockDevice::new(DEV);
    let (root, serial) = open_serial(&mock)?;
    root.set_param_val("serial:linestyle", LineStyle::Lf)?;

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let serial = serial.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    serial.write_string(&format!("writer{t}-line{i}"))?;
                }
                Ok::<_, Error>(())
            })
        })
        .collect();
    for writer in writers {
        writer.join().expect("writer panicked")?;
    }

    let output = String::from_utf8(mock.take_output()).expect("ascii output");
    let lines: Vec<_> = output.lines().collect();
    assert_eq!(lines.len(), 200);
    assert!(lines.iter().all(|l| l.starts_with("writer") && l.contains("-line")));
    Ok(())
}
