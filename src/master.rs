//! Bus master (controller) part of the protocol.
//!
//! The master sends one command at a time and waits for the reply of the
//! addressed node. Use [`Master`] with any [`Transport`], for instance a
//! serial port configured for 115200 baud, 8N1.

use std::io::{self, ErrorKind, Read, Write};

use snafu::{ensure, OptionExt, ResultExt, Snafu};

use crate::frame::encode_command;
use crate::nom_parser::master::{parse_response, ResponseToken};
use crate::types::NodeId;
use crate::{LINE_END, OUTBOUND_CAPACITY};

/// Error type for the bus master
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// Reading from or writing to the transport failed, or no reply arrived in time.
    #[snafu(display("IO error: {}", source))]
    Io { source: std::io::Error },
    /// The command text was empty.
    #[snafu(display("Empty command"))]
    EmptyCommand,
    /// The reply doesn't start with the master's address.
    #[snafu(display("Invalid response: {:?}", response))]
    InvalidResponse { response: String },
    /// The reply is missing its end marker.
    #[snafu(display("Incomplete response: {:?}", response))]
    IncompleteResponse { response: String },
    /// The reply answers some other command.
    #[snafu(display("Unexpected response to {:?}: {:?}", expected, response))]
    UnexpectedCommand { expected: char, response: String },
    /// The node answered, but reported that the command failed.
    #[snafu(display("Node error for command {:?}: {}", command, message))]
    NodeError { command: String, message: String },
    /// The reply text could not be interpreted.
    #[snafu(display("Invalid data in response: {:?}", body))]
    InvalidData { body: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A byte stream to the bus that can drop data received but not yet read.
///
/// Serial ports usually have this as a driver call, e.g. clearing the input
/// buffer. Replies that arrive after a timeout, and traffic between other
/// devices, must not be taken for the reply to the next command.
pub trait Transport: Read + Write {
    /// Discard all received data that hasn't been read yet.
    fn clear_input(&mut self) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn clear_input(&mut self) -> io::Result<()> {
        (**self).clear_input()
    }
}

/// Readings of the five analog inputs, named after the NPP-301 pins.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AdcReadings {
    pub pin8: u16,
    pub pin2: u16,
    pub pin4: u16,
    pub pin5: u16,
    pub pin6: u16,
}

/// The four resistances of the NPP-301 bridge, in ohms.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BridgeResistances {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub r4: f64,
}

impl AdcReadings {
    /// Parse the body of an `a` reply, five readings separated by spaces.
    pub fn from_body(body: &str) -> Option<Self> {
        let mut values = body.split_whitespace().map(|v| v.parse::<u16>());
        let mut next = || values.next()?.ok();
        let readings = Self {
            pin8: next()?,
            pin2: next()?,
            pin4: next()?,
            pin5: next()?,
            pin6: next()?,
        };
        match values.next() {
            None => Some(readings),
            Some(_) => None,
        }
    }

    /// Compute the bridge resistances, given the reference resistors
    /// between pin 4 and ground and between pin 5 and ground.
    ///
    /// Returns `None` if the current through either half of the bridge
    /// reads as zero.
    pub fn bridge_resistances(&self, r_ref: f64) -> Option<BridgeResistances> {
        if self.pin4 == 0 || self.pin5 == 0 {
            return None;
        }
        let [a8, a2, a4, a5, a6] = [self.pin8, self.pin2, self.pin4, self.pin5, self.pin6]
            .map(f64::from);
        Some(BridgeResistances {
            r1: (a8 - a2) / a4 * r_ref,
            r2: (a2 - a4) / a4 * r_ref,
            r3: (a8 - a6) / a5 * r_ref,
            r4: (a6 - a5) / a5 * r_ref,
        })
    }
}

/// Bus master bound to a transport.
///
/// # Example
/// ```no_run
/// use npp301_proto::master::{Master, Transport};
/// use npp301_proto::NodeId;
/// # struct Port;
/// # impl std::io::Read for Port {
/// #     fn read(&mut self, _: &mut [u8]) -> std::io::Result<usize> { Ok(0) }
/// # }
/// # impl std::io::Write for Port {
/// #     fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { Ok(buf.len()) }
/// #     fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
/// # }
/// # impl Transport for Port {
/// #     fn clear_input(&mut self) -> std::io::Result<()> { Ok(()) }
/// # }
/// # fn open_serial_port() -> Port { Port }
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut master = Master::new(open_serial_port());
/// let node = NodeId::new('N')?;
/// println!("{}", master.version(node)?);
/// master.set_reference_on(node, 255)?;
/// let readings = master.read_adc(node)?;
/// println!("{:?}", readings.bridge_resistances(1000.0));
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct Master<IO> {
    io: IO,
}

impl<IO: Transport> Master<IO> {
    pub fn new(io: IO) -> Self {
        Self { io }
    }

    pub fn into_inner(self) -> IO {
        self.io
    }

    /// Send `text` to `node` and return the body of its reply, with the
    /// command character and surrounding whitespace removed. Anything
    /// received before the command is sent is discarded.
    /// # Errors
    /// Fails on transport errors, malformed replies, and replies reporting
    /// an error.
    pub fn command(&mut self, node: NodeId, text: &str) -> Result<String> {
        let command = text.chars().next().context(EmptyCommandSnafu)?;

        log::debug!("Sending {:?} to node {}", text, node);
        self.io.clear_input().context(IoSnafu)?;
        self.io
            .write_all(&encode_command(node, text.as_bytes()))
            .and_then(|_| self.io.flush())
            .context(IoSnafu)?;

        let line = self.read_line()?;
        let response = String::from_utf8_lossy(&line).trim().to_string();
        log::trace!("Received {:?}", response);

        let body = match parse_response(response.as_bytes()) {
            ResponseToken::Reply {
                command: reply_cmd,
                body,
            } => {
                ensure!(
                    u32::from(reply_cmd) == u32::from(command),
                    UnexpectedCommandSnafu {
                        expected: command,
                        response: response.as_str(),
                    }
                );
                String::from_utf8_lossy(body).trim().to_string()
            }
            ResponseToken::Incomplete => return IncompleteResponseSnafu { response }.fail(),
            ResponseToken::Invalid => return InvalidResponseSnafu { response }.fail(),
        };

        if body.contains("error") {
            log::warn!("Node {} failed command {:?}: {}", node, text, body);
            return NodeSnafu {
                command: text,
                message: body,
            }
            .fail();
        }
        Ok(body)
    }

    fn read_line(&mut self) -> Result<Vec<u8>> {
        let mut line = Vec::with_capacity(OUTBOUND_CAPACITY);
        let mut buf = [0; 1];
        while line.len() < OUTBOUND_CAPACITY {
            match self.io.read(&mut buf) {
                Ok(0) if line.is_empty() => {
                    return Err(std::io::Error::from(ErrorKind::UnexpectedEof)).context(IoSnafu)
                }
                Ok(0) => break,
                Ok(_) if buf[0] == LINE_END => break,
                Ok(_) => line.push(buf[0]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context(IoSnafu),
            }
        }
        Ok(line)
    }

    /// The version text of the node firmware.
    pub fn version(&mut self, node: NodeId) -> Result<String> {
        self.command(node, "v")
    }

    pub fn set_led(&mut self, node: NodeId, on: bool) -> Result<()> {
        self.command(node, if on { "L1" } else { "L0" })?;
        Ok(())
    }

    /// Enable the reference voltage output at `level`/256 of 4.096 V.
    /// `level` is clamped to 0..=255.
    pub fn set_reference_on(&mut self, node: NodeId, level: i32) -> Result<()> {
        let level = level.max(0).min(255);
        self.command(node, &format!("w {} 1", level))?;
        Ok(())
    }

    pub fn set_reference_off(&mut self, node: NodeId) -> Result<()> {
        self.command(node, "w 0 0")?;
        Ok(())
    }

    /// Sample the five analog inputs of the node.
    pub fn read_adc(&mut self, node: NodeId) -> Result<AdcReadings> {
        let body = self.command(node, "a")?;
        AdcReadings::from_body(&body).context(InvalidDataSnafu { body: body.as_str() })
    }
}
