//! This module defines range-checked types for bus identities and analog
//! channels, meant to simplify correct usage of the API.

use core::convert::{TryFrom, TryInto};
use core::fmt;
use core::ops::Deref;

use snafu::{ensure, OptionExt, Snafu};

/// Error type for this module
#[derive(Debug, Snafu, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The value isn't a valid node identity.
    #[snafu(display("Invalid node id, expected one of 1-9A-Za-z"))]
    InvalidNodeId,
    /// The value isn't one of the analog channels of the node.
    #[snafu(display("Invalid analog channel"))]
    InvalidChannel,
}

const fn invalid_node_id() -> InvalidNodeIdSnafu {
    InvalidNodeIdSnafu
}

/// Identity of the bus master. Nodes always reply to this identity.
pub const MASTER_ID: u8 = b'0';

/// `NodeId` is the single character identity of a node on the bus,
/// range checked to `1-9A-Za-z`.
///
/// ## Example
/// ```
/// use npp301_proto::NodeId;
/// let id = NodeId::new('N').unwrap();
/// assert_eq!(*id, b'N');
/// assert!(NodeId::new('0').is_err()); // reserved for the master
/// ```
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
#[repr(transparent)]
pub struct NodeId(u8);

/// Create a new [`NodeId`], panics if it is out of range.
pub const fn node_id(c: u8) -> NodeId {
    if is_node_id(c) {
        return NodeId(c);
    }
    panic!("Invalid node id.")
}

const fn is_node_id(c: u8) -> bool {
    matches!(c, b'1'..=b'9' | b'A'..=b'Z' | b'a'..=b'z')
}

impl NodeId {
    /// Create a new node id, checking that it is one of `1-9A-Za-z`.
    /// # Errors
    /// Returns [`Error::InvalidNodeId`] if `id` is out of range.
    pub fn new(id: impl TryInto<u8>) -> Result<Self, Error> {
        let id = id.try_into().ok().with_context(invalid_node_id)?;
        ensure!(is_node_id(id), invalid_node_id());
        Ok(Self(id))
    }

    /// The identity as a `char`.
    pub const fn as_char(self) -> char {
        self.0 as char
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self(b'N')
    }
}

impl Deref for NodeId {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq<u8> for NodeId {
    fn eq(&self, other: &u8) -> bool {
        self.0 == *other
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({:?})", self.as_char())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Trait to convert `T: TryInto<u8>` into a [`NodeId`].
pub trait IntoNodeId {
    /// Convert self to a `NodeId`.
    /// # Errors
    /// Returns `Error::InvalidNodeId` if self isn't a valid identity.
    fn into_node_id(self) -> Result<NodeId, Error>;
}

impl IntoNodeId for NodeId {
    fn into_node_id(self) -> Result<NodeId, Error> {
        Ok(self)
    }
}

impl IntoNodeId for char {
    fn into_node_id(self) -> Result<NodeId, Error> {
        NodeId::new(u32::from(self))
    }
}

impl IntoNodeId for u8 {
    fn into_node_id(self) -> Result<NodeId, Error> {
        NodeId::new(self)
    }
}

impl TryFrom<char> for NodeId {
    type Error = Error;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        value.into_node_id()
    }
}


/// The analog inputs of the node, in the order they are reported by the
/// `a` command.
///
/// The names follow the microcontroller pins; the docs name the NPP-301
/// package pin each one is wired to.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Hash)]
pub enum Channel {
    /// RC2, NPP-301 pin 8 (bridge excitation).
    Anc2,
    /// RC7, NPP-301 pin 2.
    Anc7,
    /// RB7, NPP-301 pin 4.
    Anb7,
    /// RB6, NPP-301 pin 5.
    Anb6,
    /// RB5, NPP-301 pin 6.
    Anb5,
}

impl Channel {
    /// All channels in reply order.
    pub const ALL: [Channel; 5] = [
        Channel::Anc2,
        Channel::Anc7,
        Channel::Anb7,
        Channel::Anb6,
        Channel::Anb5,
    ];

    /// The ADC positive channel selection value for this input.
    pub const fn adc_select(self) -> u8 {
        match self {
            Channel::Anc2 => 0b0001_0010,
            Channel::Anc7 => 0b0001_0111,
            Channel::Anb5 => 0b0000_1101,
            Channel::Anb6 => 0b0000_1110,
            Channel::Anb7 => 0b0000_1111,
        }
    }

    /// The NPP-301 package pin wired to this input.
    pub const fn sensor_pin(self) -> u8 {
        match self {
            Channel::Anc2 => 8,
            Channel::Anc7 => 2,
            Channel::Anb7 => 4,
            Channel::Anb6 => 5,
            Channel::Anb5 => 6,
        }
    }
}

impl TryFrom<u8> for Channel {
    type Error = Error;

    /// Look up a channel by its ADC selection value.
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Channel::ALL
            .iter()
            .copied()
            .find(|c| c.adc_select() == value)
            .context(InvalidChannelSnafu)
    }
}
