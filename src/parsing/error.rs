//! Error taxonomy for the input parser.
//!
//! Nothing in here is ever returned as an `Err` to the caller of
//! [`InputParser::parse`](super::InputParser::parse). Failures travel inside the
//! [`ParsedInputSequence`](super::ParsedInputSequence) so a malformed chat line
//! can never abort the host.

use thiserror::Error;

/// Rule violations that turn a command into an `Invalid` sequence.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Input is missing")]
    MissingInput,

    #[error("Contains both a hold and a release")]
    HoldAndRelease,

    #[error("Port number is invalid")]
    InvalidPort,

    #[error("Port number {port} is greater than the max port {max}")]
    PortAboveMax { port: i64, max: u32 },

    #[error("Percentage is invalid")]
    InvalidPercent,

    #[error("Percentage {0} is less than 0 or greater than 100")]
    PercentOutOfRange(f64),

    #[error("Contains both 'ms' and 's' for duration")]
    BothDurations,

    #[error("Second duration is more precise than a millisecond")]
    SubMillisecondDuration,

    /// Integer overflow while converting or summing durations.
    #[error("Duration overflowed while {0}")]
    DurationOverflow(&'static str),

    #[error("\"start\" cannot be pressed for {duration_ms}ms, it must be shorter than {limit_ms}ms")]
    StartDurationExceeded { duration_ms: i64, limit_ms: i64 },

    #[error("Input sequence of {total_ms}ms exceeds max input duration of {max_ms}ms")]
    MaxDurationExceeded { total_ms: i64, max_ms: i64 },

    #[error("Simultaneous specified with no input at end")]
    TrailingSimultaneous,
}

/// A [`ParseError`] pinned to the spot in the preparsed text where it happened.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Parser error: {kind} at character {offset} (\"{token}\")")]
pub struct ParseFailure {
    pub kind: ParseError,
    /// Character (not byte) offset into the preparsed message.
    pub offset: usize,
    pub token: String,
}

impl ParseFailure {
    pub fn new(kind: ParseError, text: &str, byte_offset: usize, token: &str) -> Self {
        let offset = text
            .get(..byte_offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(byte_offset);

        Self {
            kind,
            offset,
            token: token.to_string(),
        }
    }
}
