//! Error types shared by the streaming and buffer-oriented primitives.

use thiserror::Error;

/// Errors surfaced while encoding MessagePack.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A user-supplied shim conversion failed.
    #[error("shim conversion failed: {0}")]
    Shim(String),
}

/// Errors surfaced while decoding MessagePack.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The input buffer ended before a complete object was read.
    #[error("unexpected end of input")]
    ShortBytes,

    /// The next object on the wire is not of the requested kind.
    #[error("type mismatch: expected {expected}, found marker 0x{found:02x}")]
    TypeMismatch { expected: &'static str, found: u8 },

    /// A fixed-length array header did not match the declared length.
    #[error("array length mismatch: wanted {wanted}, got {got}")]
    ArrayLen { wanted: u32, got: u32 },

    /// An integer on the wire does not fit the destination width.
    #[error("value {value} overflows a {bits}-bit integer")]
    IntOverflow { value: i128, bits: u8 },

    /// An extension object carried an unexpected type discriminator.
    #[error("extension type mismatch: wanted {wanted}, got {got}")]
    ExtType { wanted: i8, got: i8 },

    /// A string object carried invalid UTF-8.
    #[error("invalid utf-8 in string: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A user-supplied shim conversion failed.
    #[error("shim conversion failed: {0}")]
    Shim(String),
}

impl DecodeError {
    /// Shorthand used by generated array-length checks.
    pub fn array_len(wanted: u32, got: u32) -> Self {
        DecodeError::ArrayLen { wanted, got }
    }

    pub(crate) fn overflow(value: i128, bits: u8) -> Self {
        DecodeError::IntOverflow { value, bits }
    }

    pub(crate) fn mismatch(expected: &'static str, found: u8) -> Self {
        DecodeError::TypeMismatch { expected, found }
    }
}
