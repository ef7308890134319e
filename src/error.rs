//! Error types for RTL encoding and decoding.

/// Errors that can occur while encoding or decoding RTL values.
#[derive(Debug, thiserror::Error)]
pub enum RtlError {
    /// The lead byte matched none of the fourteen tag patterns.
    #[error("unsupported header byte 0x{0:02X}")]
    UnsupportedHeader(u8),

    /// The incoming header kind is not accepted by the destination kind.
    #[error("type mismatch: cannot decode {found} header into {expected}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// A numeric payload does not fit the destination width.
    #[error("numeric overflow decoding into {0}")]
    NumericOverflow(&'static str),

    /// A negative numeric payload was decoded into an unsigned destination.
    #[error("negative value decoded into {0}")]
    SignMismatch(&'static str),

    /// A multi-header count exceeds `i32::MAX` or the reader's remaining bound.
    #[error("length overflow: {0}")]
    LengthOverflow(String),

    /// Encoding or decoding descended deeper than `MAX_NESTED` levels.
    #[error("value nesting too deep")]
    NestingOverflow,

    /// A caller-supplied buffer is too small for a numeric serialization.
    #[error("buffer too small for numeric value")]
    InsufficientLength,

    /// Expected bytes were unavailable; sticky on the reader.
    #[error("unexpected end of input")]
    Eof,

    /// Record decoding found a data index past the next expected field order.
    #[error("illegal field order: data index {data_index} passed order {order}")]
    IllegalOrder { data_index: usize, order: usize },

    /// An array source decoded into a map must have an even element count.
    #[error("map source length {0} is odd")]
    OddMapLength(usize),

    /// An internal destination slot was unusable.
    #[error("invalid decode slot: {0}")]
    InvalidValue(&'static str),

    /// A string payload was not valid UTF-8.
    #[error("invalid UTF-8 in string payload")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Unsupported value or conversion.
    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RtlError>;

impl RtlError {
    pub(crate) fn mismatch(expected: &'static str, found: &'static str) -> Self {
        Self::TypeMismatch { expected, found }
    }
}
