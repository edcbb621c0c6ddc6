//! Reply text and the outbound frame wrapped around it.
//!
//! Every reply on the bus has the form `/0<command> <body>#\n`. The frame is
//! built in a fixed [`OUTBOUND_CAPACITY`] buffer; a body too long to fit is
//! cut short so the closing `#\n` is always present.

use core::fmt::{self, Write};

use arrayvec::{ArrayString, ArrayVec};

use crate::{LINE_END, MASTER_ID, OUTBOUND_CAPACITY, REPLY_END, START};

// "/0" <command> " " ... "#\n"
const FRAME_OVERHEAD: usize = 6;

/// Longest body that fits in one outbound frame.
pub const MAX_BODY_LEN: usize = OUTBOUND_CAPACITY - FRAME_OVERHEAD;

/// Bounded reply text. Writes past the capacity are silently dropped.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplyBody(ArrayString<OUTBOUND_CAPACITY>);

impl ReplyBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Write for ReplyBody {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let room = self.0.remaining_capacity();
        let s = if s.len() > room {
            &s[..floor_char_boundary(s, room)]
        } else {
            s
        };
        self.0.push_str(s);
        Ok(())
    }
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

/// The outcome of one command, ready to be framed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    command: u8,
    body: ReplyBody,
}

impl Reply {
    /// Create a reply to `command` with formatted body text.
    pub fn new(command: u8, args: fmt::Arguments<'_>) -> Self {
        let mut body = ReplyBody::new();
        // ReplyBody truncates instead of failing
        let _ = body.write_fmt(args);
        Self { command, body }
    }

    /// Create an error reply. The body always starts with `error: `.
    pub fn error(command: u8, reason: &str) -> Self {
        Self::new(command, format_args!("error: {}", reason))
    }

    /// The command character this is a reply to.
    pub const fn command(&self) -> u8 {
        self.command
    }

    pub fn body(&self) -> &str {
        self.body.as_str()
    }

    /// Masters detect failed commands by looking for `error` in the body.
    pub fn is_error(&self) -> bool {
        self.body().contains("error")
    }

    pub fn to_frame(&self) -> OutgoingFrame {
        OutgoingFrame::new(self.command, self.body())
    }
}

/// A framed reply, `/0<command> <body>#\n`, at most [`OUTBOUND_CAPACITY`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame(ArrayVec<u8, OUTBOUND_CAPACITY>);

impl OutgoingFrame {
    /// Frame `body` as a reply to `command` from this node to the master.
    pub fn new(command: u8, body: &str) -> Self {
        let body = if body.len() > MAX_BODY_LEN {
            log::trace!("Truncating reply body of {} bytes", body.len());
            &body[..floor_char_boundary(body, MAX_BODY_LEN)]
        } else {
            body
        };

        let mut data = ArrayVec::new();
        data.push(START);
        data.push(MASTER_ID);
        data.push(command);
        data.push(b' ');
        // the length check above keeps this within capacity
        let _ = data.try_extend_from_slice(body.as_bytes());
        data.push(REPLY_END);
        data.push(LINE_END);
        Self(data)
    }
}

impl AsRef<[u8]> for OutgoingFrame {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_reply() {
        let reply = Reply::new(b'L', format_args!("{}", 1));
        assert_eq!(reply.to_frame().as_ref(), b"/0L 1#\n");
        assert!(!reply.is_error());

        let reply = Reply::error(b'z', "Unknown command");
        assert_eq!(reply.to_frame().as_ref(), b"/0z error: Unknown command#\n");
        assert!(reply.is_error());
    }

    #[test]
    fn test_body_exactly_fits() {
        let body = "x".repeat(MAX_BODY_LEN);
        let frame = OutgoingFrame::new(b'v', &body);
        assert_eq!(frame.as_ref().len(), OUTBOUND_CAPACITY);
        assert!(frame.as_ref().ends_with(b"x#\n"));
    }

    #[test]
    fn test_truncation_keeps_terminator() {
        let body = "y".repeat(OUTBOUND_CAPACITY * 2);
        let reply = Reply::new(b'v', format_args!("{}", body));
        assert_eq!(reply.body().len(), OUTBOUND_CAPACITY);

        let frame = reply.to_frame();
        let data = frame.as_ref();
        assert_eq!(data.len(), OUTBOUND_CAPACITY);
        assert!(data.starts_with(b"/0v y"));
        assert!(data.ends_with(b"y#\n"));
        assert_eq!(data.iter().filter(|&&b| b == b'#').count(), 1);
    }

    #[test]
    fn test_truncation_on_char_boundary() {
        // the last two byte character does not fit after the leading 'a'
        let body = format!("a{}", "é".repeat(OUTBOUND_CAPACITY));
        let frame = OutgoingFrame::new(b'v', &body);
        let data = frame.as_ref();
        assert_eq!(data.len(), OUTBOUND_CAPACITY - 1);
        assert!(core::str::from_utf8(data).is_ok());
        assert!(data.ends_with(b"#\n"));

        let mut text = ReplyBody::new();
        write!(text, "{}", "é".repeat(OUTBOUND_CAPACITY)).unwrap();
        assert_eq!(text.as_str().len(), OUTBOUND_CAPACITY);
    }
}
