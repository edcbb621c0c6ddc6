use arrayvec::ArrayVec;

use crate::{INBOUND_CAPACITY, LINE_END};

const BS: u8 = 0x08;
const DEL: u8 = 0x7f;

/// Bounded buffer holding one line received from the bus.
///
/// Bytes are collected until a line terminator arrives. Backspace and DEL
/// erase the previous byte, and bytes beyond the capacity are dropped until
/// the end of the line. All other bytes are stored as received.
#[derive(Debug, Default)]
pub struct LineBuffer {
    data: ArrayVec<u8, INBOUND_CAPACITY>,
    complete: bool,
    overflow: bool,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of valid bytes in the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True once a line terminator has been received.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed bytes into the buffer until a line is complete.
    ///
    /// Returns the number of bytes consumed from `bytes`. The terminator is
    /// consumed but not stored.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        if self.complete {
            self.clear();
        }
        for (pos, &byte) in bytes.iter().enumerate() {
            match byte {
                LINE_END => {
                    if self.overflow {
                        log::trace!("Dropped overlong line");
                    }
                    self.complete = true;
                    return pos + 1;
                }
                BS | DEL => {
                    self.data.pop();
                }
                byte => {
                    if self.data.try_push(byte).is_err() {
                        self.overflow = true;
                    }
                }
            }
        }
        bytes.len()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.complete = false;
        self.overflow = false;
    }
}

impl AsRef<[u8]> for LineBuffer {
    fn as_ref(&self) -> &[u8] {
        self.data.as_ref()
    }
}
