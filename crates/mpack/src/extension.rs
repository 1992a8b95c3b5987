//! MessagePack extension objects.
//!
//! Extension discriminators 3, 4 and 5 are reserved by this library for
//! complex32, complex64 and time values respectively.

use crate::{DecodeError, EncodeError};

/// Reserved extension discriminator for `Complex32`.
pub const COMPLEX32_EXT: i8 = 3;
/// Reserved extension discriminator for `Complex64`.
pub const COMPLEX64_EXT: i8 = 4;
/// Reserved extension discriminator for `SystemTime`.
pub const TIME_EXT: i8 = 5;

/// An out-of-band MessagePack object: a signed 8-bit discriminator plus an
/// opaque binary body.
pub trait Extension {
    /// The extension discriminator written to the wire.
    fn ext_type(&self) -> i8;

    /// The exact payload length in bytes.
    fn ext_len(&self) -> usize;

    /// Serializes the payload into `dst`, which is exactly `ext_len()` long.
    fn marshal_binary_to(&self, dst: &mut [u8]) -> Result<(), EncodeError>;

    /// Rebuilds the value from a wire discriminator and payload.
    fn unmarshal_binary(&mut self, ext_type: i8, data: &[u8]) -> Result<(), DecodeError>;
}

/// A raw extension carrier: holds any discriminator/payload pair verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawExt {
    pub kind: i8,
    pub data: Vec<u8>,
}

impl Extension for RawExt {
    fn ext_type(&self) -> i8 {
        self.kind
    }

    fn ext_len(&self) -> usize {
        self.data.len()
    }

    fn marshal_binary_to(&self, dst: &mut [u8]) -> Result<(), EncodeError> {
        dst.copy_from_slice(&self.data);
        Ok(())
    }

    fn unmarshal_binary(&mut self, ext_type: i8, data: &[u8]) -> Result<(), DecodeError> {
        self.kind = ext_type;
        self.data.clear();
        self.data.extend_from_slice(data);
        Ok(())
    }
}

impl RawExt {
    pub fn new(kind: i8, data: Vec<u8>) -> Self {
        RawExt { kind, data }
    }

    pub fn msg_size(&self) -> usize {
        crate::size::EXT_PREFIX + self.data.len()
    }
}
