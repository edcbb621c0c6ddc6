//! Sans-io implementation of the addressed command protocol spoken by the
//! NPP-301 characterization node on a shared RS485 bus.
//!
//! Every device on the bus has a single character identity. The bus master
//! (usually a PC) is `0`, nodes use one of `1-9A-Za-z`. The master sends
//!
//! ```text
//! /<target id><command char>[args]!\n
//! ```
//!
//! and the addressed node, and only that node, replies with
//!
//! ```text
//! /0<command char> <body>#\n
//! ```
//!
//! A reply reporting a failure always contains the word `error`.
//!
//! The node side is the [`NodeState`] state machine, which never performs
//! any IO by itself. [`node::io::Node`] drives it over any `Read + Write`
//! stream, and [`master::Master`] is the matching bus master client.
//!
//! # Example
//!
//! ```
//! use npp301_proto::dispatch::{Actuator, Dispatcher, Sensor};
//! use npp301_proto::{Channel, NodeConfig, NodeState};
//!
//! struct Board;
//! impl Sensor for Board {
//!     fn sample(&mut self, _channel: Channel) -> u16 {
//!         512
//!     }
//! }
//! impl Actuator for Board {
//!     fn set_led(&mut self, _on: bool) {}
//!     fn set_reference(&mut self, _level: u8, _enabled: bool) {}
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dispatcher = Dispatcher::new(NodeConfig::new('N')?, Board, Board);
//! let node = NodeState::new(NodeConfig::new('N')?);
//!
//! let node = match node {
//!     NodeState::ReceiveData(recv) => recv.receive_data(b"/Na!\n"),
//!     _ => unreachable!(),
//! };
//! let node = match node {
//!     NodeState::Execute(cmd) => cmd.execute(&mut dispatcher),
//!     _ => unreachable!(),
//! };
//! if let NodeState::SendData(send) = node {
//!     assert_eq!(send.get_data(), b"/0a 512 512 512 512 512#\n");
//! }
//! # Ok(()) }
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

mod buffer;
pub mod dispatch;
pub mod frame;
#[cfg(feature = "std")]
pub mod master;
pub mod node;
mod nom_parser;
pub mod reply;
pub mod types;

pub use buffer::LineBuffer;
pub use node::{NodeConfig, NodeState};
pub use types::{Channel, Error, NodeId, MASTER_ID};

/// Start of frame marker.
pub const START: u8 = b'/';
/// End of an inbound (master to node) frame.
pub const END: u8 = b'!';
/// End of an outbound (node to master) frame.
pub const REPLY_END: u8 = b'#';
/// Line terminator, following both inbound and outbound frames.
pub const LINE_END: u8 = b'\n';

/// Capacity of the inbound line buffer.
pub const INBOUND_CAPACITY: usize = 80;
/// Capacity of the outbound reply buffer, including all frame markers.
pub const OUTBOUND_CAPACITY: usize = 268;

/// Bytes separating command arguments.
pub const ARG_SEPARATORS: &[u8] = b", ";
