//! A simulated NPP-301 characterization node speaking the bus protocol on
//! stdin/stdout. Pass the node identity as the first argument (default `N`).
//!
//! ```text
//! $ printf '/Nv!\n/Nw 255!\n/Na!\n' | cargo run --example node_sim
//! ```

use std::cell::RefCell;
use std::error::Error;
use std::io::{self, Read, Write};
use std::rc::Rc;

use npp301_proto::dispatch::{Actuator, Sensor};
use npp301_proto::node::io::Node;
use npp301_proto::{Channel, NodeConfig};

#[derive(Default)]
struct Output {
    level: u8,
    enabled: bool,
}

/// Bridge excited by the reference output, with a 1k reference resistor
/// below each half.
#[derive(Clone, Default)]
struct SimulatedBoard(Rc<RefCell<Output>>);

impl SimulatedBoard {
    // fraction of the excitation seen at each pin
    fn fraction(channel: Channel) -> f64 {
        match channel {
            Channel::Anc2 => 1.0,
            Channel::Anc7 => 0.62,
            Channel::Anb7 => 0.21,
            Channel::Anb6 => 0.19,
            Channel::Anb5 => 0.58,
        }
    }
}

impl Sensor for SimulatedBoard {
    fn sample(&mut self, channel: Channel) -> u16 {
        let output = self.0.borrow();
        if !output.enabled {
            return 0;
        }
        // 12 bit conversion against the same 4.096 V reference as the output
        let counts = f64::from(output.level) * 16.0 * Self::fraction(channel);
        counts.round() as u16
    }
}

impl Actuator for SimulatedBoard {
    fn set_led(&mut self, on: bool) {
        log::trace!("LED {}", if on { "on" } else { "off" });
    }

    fn set_reference(&mut self, level: u8, enabled: bool) {
        log::info!("VREF level={} enabled={}", level, enabled);
        *self.0.borrow_mut() = Output { level, enabled };
    }
}

struct Stdio {
    stdin: io::Stdin,
    stdout: io::Stdout,
}

impl Read for Stdio {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.read(buf)
    }
}

impl Write for Stdio {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stdout.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let id = std::env::args()
        .nth(1)
        .and_then(|arg| arg.chars().next())
        .unwrap_or('N');
    let config = NodeConfig::new(id)?;

    let io = Stdio {
        stdin: io::stdin(),
        stdout: io::stdout(),
    };
    let board = SimulatedBoard::default();
    let mut node = Node::new(io, config, board.clone(), board);
    node.run()?;
    Ok(())
}
