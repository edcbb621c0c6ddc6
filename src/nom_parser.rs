use nom::bytes::complete::{take_till, take_till1, take_while};
use nom::character::complete::{digit0, one_of};
use nom::combinator::{opt, verify};
use nom::number::complete::u8;
use nom::sequence::{pair, preceded};
use nom::IResult;

use crate::{ARG_SEPARATORS, END, START};

type Char = u8;
type Buf = [u8];

const NUL: Char = 0;

pub(crate) mod node {
    use super::*;

    /// A delimited frame found in a line, not yet checked for addressing.
    #[derive(PartialEq, Debug, Copy, Clone)]
    pub(crate) struct FrameToken<'a> {
        pub(crate) start: usize,
        pub(crate) end: usize,
        pub(crate) target: Char,
        pub(crate) payload: &'a Buf,
    }

    /// Find the first frame in `buf`. Scanning stops at the first NUL byte.
    pub(crate) fn parse_frame(buf: &Buf) -> Option<FrameToken<'_>> {
        match frame(buf) {
            Ok((rest, (start, target, payload))) => Some(FrameToken {
                start,
                end: buf.len() - rest.len() - 1,
                target,
                payload,
            }),
            Err(_) => None,
        }
    }

    fn frame(buf: &Buf) -> IResult<&Buf, (usize, Char, &Buf)> {
        let (buf, skipped) = take_till(|c: Char| c == START || c == NUL)(buf)?;
        let (buf, _) = ascii_char(START)(buf)?;
        let (buf, target) = verify(u8, |c: &Char| *c != NUL && *c != END)(buf)?;
        let (buf, payload) = take_till(|c: Char| c == END || c == NUL)(buf)?;
        let (buf, _) = ascii_char(END)(buf)?;
        Ok((buf, (skipped.len(), target, payload)))
    }

    /// Split the next argument off `buf`, skipping leading separators.
    /// Returns the token and the remaining input.
    pub(crate) fn next_token(buf: &Buf) -> Option<(&Buf, &Buf)> {
        let parsed: IResult<&Buf, &Buf> =
            preceded(take_while(is_separator), take_till1(is_separator))(buf);
        match parsed {
            Ok((rest, token)) => Some((token, rest)),
            Err(_) => None,
        }
    }

    fn is_separator(c: Char) -> bool {
        ARG_SEPARATORS.contains(&c)
    }

    /// Best-effort integer conversion. Leading whitespace and a sign are
    /// accepted, conversion stops at the first non-digit, and input without
    /// leading digits gives 0. Saturates instead of overflowing.
    pub(crate) fn atoi(buf: &Buf) -> i32 {
        let parsed: IResult<&Buf, (Option<char>, &Buf)> = preceded(
            take_while(|c: Char| c == b' ' || (0x09..=0x0d).contains(&c)),
            pair(opt(one_of("+-")), digit0),
        )(buf);
        match parsed {
            Ok((_, (sign, digits))) => {
                let negative = sign == Some('-');
                digits.iter().fold(0i32, |acc, d| {
                    let d = i32::from(d - b'0');
                    if negative {
                        acc.saturating_mul(10).saturating_sub(d)
                    } else {
                        acc.saturating_mul(10).saturating_add(d)
                    }
                })
            }
            Err(_) => 0,
        }
    }

}

#[cfg(feature = "std")]
pub(crate) mod master {
    use super::*;
    use crate::{MASTER_ID, REPLY_END};
    use nom::bytes::complete::tag;

    #[derive(PartialEq, Copy, Clone, Debug)]
    pub(crate) enum ResponseToken<'a> {
        Reply { command: Char, body: &'a Buf },
        Incomplete,
        Invalid,
    }

    /// Parse one reply line, `/0<command><body>#`. Surrounding whitespace
    /// must already be trimmed.
    pub(crate) fn parse_response(buf: &Buf) -> ResponseToken<'_> {
        match reply(buf) {
            Ok((_, (command, body))) => ResponseToken::Reply { command, body },
            Err(_) if buf.starts_with(&[START, MASTER_ID]) => ResponseToken::Incomplete,
            Err(_) => ResponseToken::Invalid,
        }
    }

    fn reply(buf: &Buf) -> IResult<&Buf, (Char, &Buf)> {
        let (buf, _) = tag(&[START, MASTER_ID][..])(buf)?;
        let (buf, command) = verify(u8, |c: &Char| *c != REPLY_END)(buf)?;
        let (buf, body) = take_till(|c: Char| c == REPLY_END)(buf)?;
        let (buf, _) = ascii_char(REPLY_END)(buf)?;
        Ok((buf, (command, body)))
    }

}

fn ascii_char<'a>(ascii_char: u8) -> impl Fn(&'a Buf) -> IResult<&'a Buf, char> {
    nom::character::complete::char(ascii_char as char)
}
