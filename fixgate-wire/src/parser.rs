//! Splits a byte stream into raw, still-encoded FIX frames. Field-level
//! decoding happens afterwards in [`crate::codec`]; this stage only needs
//! to know where one message ends and the next begins.

pub use nom::Err;
use nom::{
    bytes::streaming::{tag, take_until},
    character::streaming::u16,
    combinator::{map, verify},
    error::{context, ContextError, ParseError},
    multi::length_data,
    sequence::{delimited, tuple},
    IResult,
};

use fixgate_core::FixStr;

fn verify_fix_str(bytes: &[u8]) -> bool {
    FixStr::from_ascii(bytes).is_ok()
}

fn begin_string<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], &'a [u8], E> {
    context(
        "begin_string",
        delimited(tag("8="), verify(take_until("\x01"), verify_fix_str), tag("\x01")),
    )(i)
}

fn body_length<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], u16, E> {
    delimited(tag("9="), u16, tag("\x01"))(i)
}

fn checksum<'a, E: ParseError<&'a [u8]> + ContextError<&'a [u8]>>(
    i: &'a [u8],
) -> IResult<&'a [u8], &'a [u8], E> {
    context("checksum", delimited(tag("10="), take_until("\x01"), tag("\x01")))(i)
}

/// A complete, unparsed FIX frame: `begin_string` is already validated
/// ASCII, `body` is everything between `BodyLength<9>` and `CheckSum<10>`
/// (inclusive of the trailing SOH of each field), and `checksum_field` is
/// the raw three-digit text of tag 10, not yet verified against `body`.
#[derive(Debug)]
pub struct RawMessage<'a> {
    pub begin_string: &'a FixStr,
    pub body: &'a [u8],
    pub checksum_field: &'a [u8],
}

pub fn raw_message(i: &[u8]) -> IResult<&[u8], RawMessage<'_>> {
    map(
        tuple((begin_string, length_data(body_length), checksum)),
        |(begin_string, body, checksum_field)| RawMessage {
            // SAFETY: `begin_string` parser verifies printable ASCII.
            begin_string: unsafe { FixStr::from_ascii_unchecked(begin_string) },
            body,
            checksum_field,
        },
    )(i)
}

#[cfg(test)]
mod tests {
    use nom::Err::Incomplete;

    use super::raw_message;

    #[test]
    fn parse_complete_ok() {
        let input = b"8=FIX.4.4\x019=19\x01<lots of tags here>\x0110=015\x01";
        assert!(raw_message(input).is_ok());
    }

    #[test]
    fn parse_from_chunks_ok() {
        let chunks: &[&[u8]] = &[b"8=FIX.4.", b"4\x019=5\x01AB", b"CDE\x0110=015\x01leftover"];
        let mut buf = Vec::new();
        let mut iter = chunks.iter();
        buf.extend_from_slice(iter.next().unwrap());
        assert!(matches!(raw_message(&buf), Err(Incomplete(_))));
        buf.extend_from_slice(iter.next().unwrap());
        assert!(matches!(raw_message(&buf), Err(Incomplete(_))));
        buf.extend_from_slice(iter.next().unwrap());
        assert!(matches!(raw_message(&buf), Ok((b"leftover", _))));
    }
}
