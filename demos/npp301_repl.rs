//! Interactive bus master for NPP-301 characterization boards.
//!
//! Usage: `npp301_repl [PORT] [NODE]`, defaults `/dev/ttyUSB0` and `N`.

use anyhow::{Context, Result};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{self, Read, Write};
use std::iter::Peekable;
use std::str::{FromStr, SplitWhitespace};
use std::sync::mpsc;

use npp301_proto::master::{AdcReadings, Master, Transport};
use npp301_proto::NodeId;

/// Reference resistors below each half of the bridge on the test fixture.
const R_REF: f64 = 1000.0;

struct Port(Box<dyn SerialPort>);

impl Read for Port {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Write for Port {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Transport for Port {
    fn clear_input(&mut self) -> io::Result<()> {
        Ok(self.0.clear(ClearBuffer::Input)?)
    }
}

fn print_readings(readings: &AdcReadings) {
    println!(
        "pin8={} pin2={} pin4={} pin5={} pin6={}",
        readings.pin8, readings.pin2, readings.pin4, readings.pin5, readings.pin6
    );
    match readings.bridge_resistances(R_REF) {
        Some(r) => println!(
            "R1={:.1} R2={:.1} R3={:.1} R4={:.1} ohm",
            r.r1, r.r2, r.r3, r.r4
        ),
        None => println!("No bridge current, is the reference enabled?"),
    }
}

fn cmd_led<IO: Transport>(
    args: &mut CmdScanner,
    master: &mut Master<IO>,
    node: NodeId,
) -> Result<()> {
    let on = args.parse_next::<u8>()? != 0;
    master.set_led(node, on)?;
    Ok(())
}

fn cmd_vref<IO: Transport>(
    args: &mut CmdScanner,
    master: &mut Master<IO>,
    node: NodeId,
) -> Result<()> {
    match args.next()? {
        "off" => master.set_reference_off(node)?,
        level => master.set_reference_on(node, level.parse().context("Parse error")?)?,
    }
    Ok(())
}

fn cmd_poll<IO: Transport>(
    args: &mut CmdScanner,
    master: &mut Master<IO>,
    node: NodeId,
) -> Result<()> {
    let delay = std::time::Duration::from_secs_f32(args.parse_next()?);

    println!("Press enter to stop polling.");
    print_readings(&master.read_adc(node)?);
    let (io_tx, io_rx) = mpsc::channel::<()>();
    std::thread::spawn(move || {
        let _ch = io_tx;
        let mut buf = String::new();
        let _ = std::io::stdin().read_line(&mut buf);
    });
    loop {
        if io_rx.recv_timeout(delay) == Err(mpsc::RecvTimeoutError::Disconnected) {
            break;
        }
        print_readings(&master.read_adc(node)?);
    }
    Ok(())
}

fn cmd_raw<IO: Transport>(
    args: &mut CmdScanner,
    master: &mut Master<IO>,
    node: NodeId,
) -> Result<()> {
    let text = args.rest();
    println!("{}", master.command(node, &text)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    let mut node = match args.next() {
        Some(id) => NodeId::new(id.chars().next().context("Empty node id")?)?,
        None => NodeId::default(),
    };

    let serial = serialport::new(&port, 115_200)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(std::time::Duration::from_millis(500))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;

    let mut stdout = std::io::stdout();
    let mut master = Master::new(Port(serial));
    loop {
        print!("{}> ", node);
        stdout.flush()?;
        let mut cmd = String::new();
        if std::io::stdin().read_line(&mut cmd)? == 0 {
            return Ok(());
        }
        let mut scan = CmdScanner::new(&cmd);
        if let Err(err) = match scan.next() {
            Err(_) => continue,
            Ok("quit") | Ok("q") => return Ok(()),
            Ok("node") => scan
                .next()
                .and_then(|id| {
                    let id = id.chars().next().context("Empty node id")?;
                    Ok(NodeId::new(id)?)
                })
                .map(|id| node = id),
            Ok("version") | Ok("v") => master
                .version(node)
                .map(|v| println!("{}", v))
                .map_err(anyhow::Error::from),
            Ok("led") => cmd_led(&mut scan, &mut master, node),
            Ok("vref") => cmd_vref(&mut scan, &mut master, node),
            Ok("adc") | Ok("a") => master
                .read_adc(node)
                .map(|r| print_readings(&r))
                .map_err(anyhow::Error::from),
            Ok("poll") => cmd_poll(&mut scan, &mut master, node),
            Ok("raw") => cmd_raw(&mut scan, &mut master, node),
            Ok(cmd) => {
                println!("Unknown command {}", cmd);
                continue;
            }
        } {
            println!("{:?}", err)
        }
    }
}

struct CmdScanner<'a> {
    splt: Peekable<SplitWhitespace<'a>>,
}

impl<'a> CmdScanner<'a> {
    fn new(line: &'a str) -> Self {
        let splt = line.split_whitespace().peekable();
        Self { splt }
    }
    fn next(&mut self) -> Result<&'a str> {
        self.splt.next().context("End of stream")
    }
    fn parse_next<T: FromStr>(&mut self) -> Result<T> {
        self.next()?.parse::<T>().ok().context("Parse error")
    }
    fn rest(&mut self) -> String {
        self.splt.by_ref().collect::<Vec<_>>().join(" ")
    }
}
