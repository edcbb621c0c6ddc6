//! Extraction of addressed frames from a received line.
//!
//! An inbound frame has the form `/<target id><payload>!`. Anything before
//! the start marker or after the end marker is ignored, and a NUL byte ends
//! the line early. Frames addressed to another node are valid traffic on
//! the shared bus, but must never be answered.

use crate::nom_parser::node::parse_frame;
use crate::types::NodeId;

/// A delimited frame, viewed as a window into the line it was found in.
///
/// `line[start]` is the start marker, `line[end]` is the end marker and the
/// payload is everything strictly between the target id and `end`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    start: usize,
    end: usize,
    target: u8,
    payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Find the first frame in `line`, without checking who it is addressed to.
    pub fn parse(line: &'a [u8]) -> Option<Self> {
        let token = parse_frame(line)?;
        Some(Self {
            start: token.start,
            end: token.end,
            target: token.target,
            payload: token.payload,
        })
    }

    /// Index of the start marker.
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Index of the end marker.
    pub const fn end(&self) -> usize {
        self.end
    }

    /// The identity this frame is addressed to.
    pub const fn target(&self) -> u8 {
        self.target
    }

    /// The command and its arguments. May be empty.
    pub const fn payload(&self) -> &'a [u8] {
        self.payload
    }

    pub fn is_for(&self, id: NodeId) -> bool {
        id == self.target
    }
}

/// Return the payload of the frame in `line` if it is addressed to `id`.
///
/// `None` is returned for lines without a complete frame and for frames
/// addressed to other nodes. An empty payload means there is nothing to
/// dispatch.
pub fn extract_payload(line: &[u8], id: NodeId) -> Option<&[u8]> {
    match Frame::parse(line) {
        Some(frame) if frame.is_for(id) => Some(frame.payload()),
        Some(frame) => {
            log::trace!("Ignoring frame for node {:?}", frame.target() as char);
            None
        }
        None => {
            log::trace!("No frame in line of {} bytes", line.len());
            None
        }
    }
}

/// Encode a command for node `target`, as sent by the bus master.
#[cfg(feature = "std")]
pub fn encode_command(target: NodeId, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 4);
    data.push(crate::START);
    data.push(*target);
    data.extend_from_slice(payload);
    data.push(crate::END);
    data.push(crate::LINE_END);
    data
}
