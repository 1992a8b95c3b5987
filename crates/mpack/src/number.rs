//! Width-preserving numeric built-in.

use std::io;

use crate::marker;
use crate::{size, DecodeError, EncodeError, Reader, Writer};

/// A number that remembers how it appeared on the wire, so re-encoding a
/// decoded document does not change numeric representations.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
}

impl Default for Number {
    fn default() -> Self {
        Number::Int(0)
    }
}

/// Equality is numeric: a non-negative `Int` equals the same-valued `Uint`,
/// since the wire cannot distinguish them.
impl PartialEq for Number {
    fn eq(&self, other: &Number) -> bool {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::Uint(a), Number::Uint(b)) => a == b,
            (Number::F32(a), Number::F32(b)) => a == b,
            (Number::F64(a), Number::F64(b)) => a == b,
            (Number::Int(a), Number::Uint(b)) | (Number::Uint(b), Number::Int(a)) => {
                a >= 0 && a as u64 == b
            }
            _ => false,
        }
    }
}

impl Number {
    pub fn encode_msg<W: io::Write>(&self, en: &mut Writer<W>) -> Result<(), EncodeError> {
        match *self {
            Number::Int(i) => en.write_i64(i),
            Number::Uint(u) => en.write_u64(u),
            Number::F32(f) => en.write_f32(f),
            Number::F64(f) => en.write_f64(f),
        }
    }

    pub fn decode_msg<R: io::Read>(&mut self, dc: &mut Reader<R>) -> Result<(), DecodeError> {
        match dc.peek_marker()? {
            0x00..=0x7f | marker::U8 | marker::U16 | marker::U32 | marker::U64 => {
                *self = Number::Uint(dc.read_u64()?);
            }
            0xe0..=0xff | marker::I8 | marker::I16 | marker::I32 | marker::I64 => {
                *self = Number::Int(dc.read_i64()?);
            }
            marker::F32 => *self = Number::F32(dc.read_f32()?),
            marker::F64 => *self = Number::F64(dc.read_f64()?),
            m => return Err(DecodeError::TypeMismatch { expected: "number", found: m }),
        }
        Ok(())
    }

    pub fn marshal_msg(&self, b: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        Ok(match *self {
            Number::Int(i) => crate::append_i64(b, i),
            Number::Uint(u) => crate::append_u64(b, u),
            Number::F32(f) => crate::append_f32(b, f),
            Number::F64(f) => crate::append_f64(b, f),
        })
    }

    pub fn unmarshal_msg<'a>(&mut self, bts: &'a [u8]) -> Result<&'a [u8], DecodeError> {
        let m = match bts.first() {
            Some(&m) => m,
            None => return Err(DecodeError::ShortBytes),
        };
        match m {
            0x00..=0x7f | marker::U8 | marker::U16 | marker::U32 | marker::U64 => {
                let (u, rest) = crate::read_u64_bytes(bts)?;
                *self = Number::Uint(u);
                Ok(rest)
            }
            0xe0..=0xff | marker::I8 | marker::I16 | marker::I32 | marker::I64 => {
                let (i, rest) = crate::read_i64_bytes(bts)?;
                *self = Number::Int(i);
                Ok(rest)
            }
            marker::F32 => {
                let (f, rest) = crate::read_f32_bytes(bts)?;
                *self = Number::F32(f);
                Ok(rest)
            }
            marker::F64 => {
                let (f, rest) = crate::read_f64_bytes(bts)?;
                *self = Number::F64(f);
                Ok(rest)
            }
            _ => Err(DecodeError::TypeMismatch { expected: "number", found: m }),
        }
    }

    pub fn msg_size(&self) -> usize {
        match self {
            Number::Int(_) => size::I64,
            Number::Uint(_) => size::U64,
            Number::F32(_) => size::F32,
            Number::F64(_) => size::F64,
        }
    }
}
