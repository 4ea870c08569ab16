//! Parser for DX cluster spot lines.
//!
//! This module uses the `nom` parsing library to pick spot announcements out
//! of a cluster's telnet feed. Cluster feeds interleave spots with banners,
//! announcements and command echoes, so anything that does not look like a
//! spot is rejected quietly.
//!
//! # Spot Format
//!
//! ```text
//! DX de SPOTTER:  FREQ  CALLSIGN  COMMENT  HHMMZ
//! ```
//!
//! Example:
//! ```text
//! DX de W1AW:     14074.0  K1ABC     FT8 signal                    1234Z
//! ```
//!
//! The match is a search: the `DX de` prefix may appear anywhere in the line
//! and anything after the time token is ignored.

use nom::{
    IResult, Parser,
    bytes::complete::{tag, take_till1, take_while_m_n, take_while1},
    character::complete::{char, digit0, digit1},
    combinator::{opt, recognize, verify},
    sequence::terminated,
};
use thiserror::Error;

use crate::spot::DxSpot;

/// Literal that introduces every spot.
const DX_DE: &str = "DX de";

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid spot format: {0}")]
    InvalidFormat(String),

    #[error("Invalid frequency: {0}")]
    InvalidFrequency(String),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Fields of a spot line as they appear in the input.
#[derive(Debug)]
struct RawSpot<'a> {
    spotter: &'a str,
    frequency: &'a str,
    callsign: &'a str,
    comment: &'a str,
    time: &'a str,
}

/// One or more whitespace characters (Unicode aware).
fn whitespace1(input: &str) -> IResult<&str, &str> {
    take_while1(char::is_whitespace).parse(input)
}

/// A run of non-whitespace characters.
fn token(input: &str) -> IResult<&str, &str> {
    take_till1(char::is_whitespace).parse(input)
}

/// Parse the "DX de" prefix and the whitespace after it.
fn parse_dx_de_prefix(input: &str) -> IResult<&str, &str> {
    terminated(tag(DX_DE), whitespace1).parse(input)
}

/// Parse the spotter callsign, which is terminated by a colon.
fn parse_spotter(input: &str) -> IResult<&str, &str> {
    let (input, spotter) = verify(token, |t: &str| t.len() > 1 && t.ends_with(':')).parse(input)?;
    let (input, _) = whitespace1(input)?;
    Ok((input, &spotter[..spotter.len() - 1]))
}

/// Recognize a decimal frequency like `14074`, `14074.` or `14074.0`.
fn parse_frequency(input: &str) -> IResult<&str, &str> {
    terminated(recognize((digit1, opt(char('.')), digit0)), whitespace1).parse(input)
}

/// Parse the DX callsign. Whitespace after it is left for the comment.
fn parse_callsign(input: &str) -> IResult<&str, &str> {
    token(input)
}

/// Parse a four digit UTC time followed by `Z`, like "2259Z".
fn parse_time(input: &str) -> IResult<&str, &str> {
    recognize((take_while_m_n(4, 4, |c: char| c.is_ascii_digit()), char('Z'))).parse(input)
}

/// Whitespace followed by the time token.
fn parse_time_suffix(input: &str) -> IResult<&str, &str> {
    let (input, _) = whitespace1(input)?;
    parse_time(input)
}

/// Split what follows the DX callsign into the comment and the time token.
///
/// The comment is the shortest non-empty run of characters (not crossing a
/// newline) that is followed by whitespace and a time token.
fn split_comment_and_time(input: &str) -> Option<(&str, &str)> {
    let ws_end = input
        .find(|c: char| !c.is_whitespace())
        .unwrap_or(input.len());
    if ws_end == 0 {
        return None;
    }

    let body = &input[ws_end..];
    for (i, c) in body.char_indices() {
        if i > 0
            && let Ok((_, time)) = parse_time_suffix(&body[i..])
        {
            return Some((body[..i].trim(), time));
        }
        if c == '\n' {
            break;
        }
    }

    // The comment may also be a lone whitespace character taken from the
    // separator, which needs at least three separator characters in total.
    let separator = &input[..ws_end];
    if separator.chars().count() >= 3
        && let Ok((_, time)) = parse_time(body)
    {
        return Some(("", time));
    }

    None
}

/// Match the full spot pattern at the start of `input`.
fn parse_fields(input: &str) -> Option<RawSpot<'_>> {
    let (input, _) = parse_dx_de_prefix(input).ok()?;
    let (input, spotter) = parse_spotter(input).ok()?;
    let (input, frequency) = parse_frequency(input).ok()?;
    let (input, callsign) = parse_callsign(input).ok()?;
    let (comment, time) = split_comment_and_time(input)?;

    Some(RawSpot {
        spotter,
        frequency,
        callsign,
        comment,
        time,
    })
}

/// Search `input` for the first position where a spot matches.
fn find_spot(input: &str) -> Option<RawSpot<'_>> {
    let mut rest = input;
    while let Some(pos) = rest.find(DX_DE) {
        let candidate = &rest[pos..];
        if let Some(raw) = parse_fields(candidate) {
            return Some(raw);
        }
        rest = &candidate[1..];
    }
    None
}

/// Parse a DX cluster spot line, reporting why a line was rejected.
///
/// # Example
///
/// ```
/// use dx_cluster_client::parser::parse_spot;
///
/// let line = "DX de W1AW:     14074.0  K1ABC     FT8 signal                    1234Z";
/// let spot = parse_spot(line).unwrap();
/// assert_eq!(spot.spotter, "W1AW");
/// assert_eq!(spot.callsign, "K1ABC");
/// assert_eq!(spot.comment, "FT8 signal");
/// ```
pub fn parse_spot(input: &str) -> ParseResult<DxSpot> {
    let raw = find_spot(input).ok_or_else(|| ParseError::InvalidFormat(input.to_string()))?;

    let frequency = raw
        .frequency
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite() && *f > 0.0)
        .ok_or_else(|| ParseError::InvalidFrequency(raw.frequency.to_string()))?;

    Ok(DxSpot {
        callsign: raw.callsign.to_string(),
        frequency,
        spotter: raw.spotter.to_string(),
        time: raw.time.to_string(),
        comment: raw.comment.to_string(),
    })
}

/// Parse a line into a spot, or `None` for anything that is not a valid spot.
///
/// Never fails: banners, announcements and malformed spots all yield `None`.
pub fn parse(line: &str) -> Option<DxSpot> {
    parse_spot(line).ok()
}

/// Check if a line could contain a spot (quick pre-filter).
#[inline]
pub fn looks_like_spot(line: &str) -> bool {
    line.contains(DX_DE)
}
