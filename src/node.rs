//! See [`NodeState`] for more details.

use arrayvec::ArrayVec;

use crate::buffer::LineBuffer;
use crate::dispatch::{Actuator, Dispatcher, Sensor};
use crate::frame::extract_payload;
use crate::reply::{OutgoingFrame, Reply};
use crate::types::{Error as TypeError, IntoNodeId, NodeId};
use crate::INBOUND_CAPACITY;

#[cfg(feature = "std")]
pub mod io;

/// Version text reported by the `v` command unless configured otherwise.
pub const DEFAULT_VERSION: &str = "0.1 PIC18F16Q41 NPP-301 Characterizer";

/// Identity and fixed properties of a node.
///
/// ```
/// use npp301_proto::NodeConfig;
/// let config = NodeConfig::new('B').unwrap().with_version("bench unit 2");
/// assert_eq!(config.id().as_char(), 'B');
/// assert!(NodeConfig::new('0').is_err());
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct NodeConfig {
    id: NodeId,
    version: &'static str,
}

impl NodeConfig {
    /// Configuration for a node answering to `id`.
    /// # Errors
    /// Returns [`TypeError::InvalidNodeId`] unless `id` is one of `1-9A-Za-z`.
    pub fn new(id: impl IntoNodeId) -> Result<Self, TypeError> {
        Ok(Self {
            id: id.into_node_id()?,
            version: DEFAULT_VERSION,
        })
    }

    /// Replace the version text reported by the `v` command.
    pub const fn with_version(mut self, version: &'static str) -> Self {
        self.version = version;
        self
    }

    pub const fn id(&self) -> NodeId {
        self.id
    }

    pub const fn version(&self) -> &'static str {
        self.version
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: NodeId::default(),
            version: DEFAULT_VERSION,
        }
    }
}

/// Bus node (listener) part of the protocol.
///
/// This enum represents the different states of the protocol. One request
/// moves from `ReceiveData` through `Execute` to `SendData`, and back to
/// `ReceiveData` once the reply has been transmitted. Lines without a frame,
/// and frames addressed to other nodes, never leave `ReceiveData`.
///
/// Create a new protocol instance with `NodeState::new(config)`.
///
/// # Example
///
/// ```
/// use npp301_proto::dispatch::{Actuator, Dispatcher, Sensor};
/// use npp301_proto::{Channel, NodeConfig, NodeState};
/// # use std::io::{Read, Write, Cursor};
/// # fn connect_serial_interface() -> Result<Cursor<Vec<u8>>,  &'static str>
/// # { Ok(Cursor::new(Vec::new())) }
/// # struct Board;
/// # impl Sensor for Board { fn sample(&mut self, _: Channel) -> u16 { 0 } }
/// # impl Actuator for Board {
/// #     fn set_led(&mut self, _: bool) {}
/// #     fn set_reference(&mut self, _: u8, _: bool) {}
/// # }
/// #
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = NodeConfig::new('N')?;
/// let mut node = NodeState::new(config);
/// let mut dispatcher = Dispatcher::new(config, Board, Board);
/// let mut serial = connect_serial_interface()?;
///
/// 'main: loop {
///        # break // this snippet is only for show
///        node = match node {
///            NodeState::ReceiveData(recv) => {
///                let mut buf = [0; 1];
///                if let Ok(len) = serial.read(&mut buf) {
///                    if len == 0 {
///                        break 'main;
///                    }
///                    recv.receive_data(&buf[..len])
///                } else {
///                    break 'main;
///                }
///            }
///
///            NodeState::Execute(command) => command.execute(&mut dispatcher),
///
///            NodeState::SendData(send) => {
///                serial.write_all(send.get_data())?;
///                send.data_sent()
///            }
///        };
/// }
/// # Ok(()) }
///  ```
#[derive(Debug)]
pub enum NodeState {
    /// More data needs to be received from the bus. Use receive_data() on the inner struct.
    ReceiveData(ReceiveData),
    /// A command addressed to this node has been received.
    Execute(Execute),
    /// A reply is waiting to be transmitted.
    SendData(SendData),
}

impl NodeState {
    /// Create a new protocol instance, accepting commands for the configured identity.
    pub fn new(config: NodeConfig) -> Self {
        ReceiveData::new(config).into()
    }

    /// Do not send any reply to the master. Transition to the idle `ReceiveData` state instead.
    /// You really shouldn't do this, since this will leave the master waiting until it times out.
    pub fn no_reply(self) -> Self {
        ReceiveData::from_state(self.config())
    }

    pub fn config(&self) -> NodeConfig {
        match self {
            Self::ReceiveData(ReceiveData { config, .. })
            | Self::Execute(Execute { config, .. })
            | Self::SendData(SendData { config, .. }) => *config,
        }
    }
}

impl From<ReceiveData> for NodeState {
    fn from(x: ReceiveData) -> Self {
        Self::ReceiveData(x)
    }
}

impl From<Execute> for NodeState {
    fn from(x: Execute) -> Self {
        Self::Execute(x)
    }
}

impl From<SendData> for NodeState {
    fn from(x: SendData) -> Self {
        Self::SendData(x)
    }
}

/// Struct with methods for the "receive data from bus" state.
#[derive(Debug)]
pub struct ReceiveData {
    config: NodeConfig,
    line: LineBuffer,
}

impl ReceiveData {
    /// Create a new bus node instance in the "receive" state without the `NodeState` wrapper.
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            line: LineBuffer::new(),
        }
    }

    fn from_state(config: NodeConfig) -> NodeState {
        Self::new(config).into()
    }

    /// Feed data into the line buffer, and look for a command whenever a
    /// line is complete.
    ///
    /// A state transition occurs when a line holds a non-empty command
    /// addressed to this node. Any bytes following that line in `data` are
    /// discarded, since the master waits for the reply before sending again.
    pub fn receive_data(mut self, data: &[u8]) -> NodeState {
        let mut data = data;
        while !data.is_empty() {
            let consumed = self.line.push(data);
            data = &data[consumed..];
            if !self.line.is_complete() {
                continue;
            }
            match extract_payload(self.line.as_ref(), self.config.id()) {
                Some(payload) if !payload.is_empty() => {
                    if !data.is_empty() {
                        log::trace!("Discarding {} bytes after command", data.len());
                    }
                    return Execute::from_state(self.config, payload);
                }
                _ => (),
            }
        }
        self.into()
    }
}

// A payload is never longer than the line it was taken from
type CommandStore = ArrayVec<u8, INBOUND_CAPACITY>;

/// Struct representing the "command received" state.
///
/// Run the command with [`execute()`](Self::execute()), or answer it with
/// [`send_reply()`](Self::send_reply()).
#[derive(Debug)]
pub struct Execute {
    config: NodeConfig,
    command: u8,
    payload: CommandStore,
}

impl Execute {
    fn from_state(config: NodeConfig, payload: &[u8]) -> NodeState {
        let mut store = CommandStore::new();
        let _ = store.try_extend_from_slice(payload);
        Self {
            config,
            command: payload[0],
            payload: store,
        }
        .into()
    }

    /// The command character, the first byte of the payload.
    pub const fn command(&self) -> u8 {
        self.command
    }

    /// The payload of the frame, command character included.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_ref()
    }

    /// Run the command through `dispatcher` and prepare its reply.
    pub fn execute<S: Sensor, A: Actuator>(self, dispatcher: &mut Dispatcher<S, A>) -> NodeState {
        match dispatcher.dispatch(&self.payload) {
            Some(reply) => self.send_reply(&reply),
            None => ReceiveData::from_state(self.config),
        }
    }

    /// Answer the command with a reply produced elsewhere.
    pub fn send_reply(self, reply: &Reply) -> NodeState {
        if reply.is_error() {
            log::warn!("Command {:?} failed: {}", self.command as char, reply.body());
        }
        SendData::from_state(self.config, reply.to_frame())
    }

    /// Do not send any reply to the master. Transition to the idle `ReceiveData` state instead.
    /// You really shouldn't do this, since this will leave the master waiting until it times out.
    pub fn no_reply(self) -> NodeState {
        ReceiveData::from_state(self.config)
    }
}

/// Struct with methods for the "transmit data on bus" state.
///
/// Call [`get_data()`](Self::get_data()) to get a reference to the data to be transmitted,
/// and then call [`data_sent()`](Self::data_sent()) when the data has been handed to the bus.
#[derive(Debug)]
pub struct SendData {
    config: NodeConfig,
    data: OutgoingFrame,
}

impl SendData {
    fn from_state(config: NodeConfig, data: OutgoingFrame) -> NodeState {
        Self { config, data }.into()
    }

    /// Returns the data to be sent on the bus.
    pub fn get_data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Signals that the data was sent, and it's time to go back to the
    /// `ReceiveData` state.
    pub fn data_sent(self) -> NodeState {
        ReceiveData::from_state(self.config)
    }
}
