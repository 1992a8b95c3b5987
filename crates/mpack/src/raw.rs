//! Verbatim passthrough built-in.

use std::io;

use crate::{size, DecodeError, EncodeError, Reader, Writer};

/// One complete, already-encoded MessagePack object kept verbatim.
///
/// Decoding copies the raw bytes of the next object without interpreting
/// them; encoding replays them. An empty `Raw` encodes as nil.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Raw(pub Vec<u8>);

impl Raw {
    pub fn encode_msg<W: io::Write>(&self, en: &mut Writer<W>) -> Result<(), EncodeError> {
        if self.0.is_empty() {
            en.write_nil()
        } else {
            en.append(&self.0)
        }
    }

    pub fn decode_msg<R: io::Read>(&mut self, dc: &mut Reader<R>) -> Result<(), DecodeError> {
        dc.read_raw_into(&mut self.0)
    }

    pub fn marshal_msg(&self, mut b: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        if self.0.is_empty() {
            b.push(0xc0);
        } else {
            b.extend_from_slice(&self.0);
        }
        Ok(b)
    }

    pub fn unmarshal_msg<'a>(&mut self, bts: &'a [u8]) -> Result<&'a [u8], DecodeError> {
        let rest = crate::skip_bytes(bts)?;
        let consumed = bts.len() - rest.len();
        self.0.clear();
        self.0.extend_from_slice(&bts[..consumed]);
        Ok(rest)
    }

    pub fn msg_size(&self) -> usize {
        if self.0.is_empty() {
            size::NIL
        } else {
            self.0.len()
        }
    }
}
