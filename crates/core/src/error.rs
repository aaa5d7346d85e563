//! Error types for the framing library.

use std::fmt;

/// Errors that can occur while framing codec payloads.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Audio**: [`PayloadTooShort`](Self::PayloadTooShort),
///   [`MalformedToc`](Self::MalformedToc) — aggregate payload is dropped.
/// - **Video**: [`BufferCapacity`](Self::BufferCapacity) — the access unit
///   being reconstructed is aborted.
/// - **Session setup**: [`Sprop`](Self::Sprop) — out-of-band parameter sets
///   could not be decoded.
/// - **Hardware**: [`Codec`](Self::Codec) — the black-box encode/decode call
///   failed.
///
/// A truncated frame or a reserved mode index is not an error: see
/// [`DemuxStatus`](crate::media::toc::DemuxStatus).
#[derive(Debug, thiserror::Error)]
pub enum FramingError {
    /// Aggregate payload cannot hold a header byte and one TOC entry.
    #[error("payload too short: {0} bytes")]
    PayloadTooShort(usize),

    /// The TOC "more entries follow" chain ran past the end of the payload.
    #[error("malformed TOC list: no terminating entry within {available} bytes")]
    MalformedToc { available: usize },

    /// Writing the next byte would overrun the escaped bitstream buffer.
    #[error("bitstream buffer capacity exceeded: capacity {capacity}, needed {needed}")]
    BufferCapacity { capacity: usize, needed: usize },

    /// `sprop-parameter-sets` could not be turned into SPS/PPS bytes.
    #[error("invalid sprop-parameter-sets: {0}")]
    Sprop(SpropErrorKind),

    /// The hardware adapter reported a failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Specific kind of `sprop-parameter-sets` failure.
#[derive(Debug)]
pub enum SpropErrorKind {
    /// Value did not contain the `sps,pps` comma separator.
    MissingSeparator,
    /// One of the two values was not valid base64.
    Base64(base64::DecodeError),
    /// A decoded value was empty.
    Empty,
}

impl fmt::Display for SpropErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator => write!(f, "missing ',' between SPS and PPS"),
            Self::Base64(e) => write!(f, "base64: {e}"),
            Self::Empty => write!(f, "empty parameter set"),
        }
    }
}

impl From<base64::DecodeError> for FramingError {
    fn from(e: base64::DecodeError) -> Self {
        Self::Sprop(SpropErrorKind::Base64(e))
    }
}

/// Failures reported by the hardware encode/decode adapters.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The engine returned a negative status code.
    #[error("engine call failed with status {code}")]
    Failed { code: i32 },

    /// The engine completed but produced no bytes.
    #[error("engine produced an empty output buffer")]
    EmptyOutput,

    /// The engine produced a block of the wrong size.
    #[error("unexpected output length: expected {expected}, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

/// Convenience alias for `Result<T, FramingError>`.
pub type Result<T> = std::result::Result<T, FramingError>;
