//! A dynamically-typed MessagePack object.

use std::io;
use std::time::SystemTime;

use crate::extension::RawExt;
use crate::{size, DecodeError, EncodeError, Reader, Writer};

/// Any single MessagePack object, used for fields declared with the
/// any-value sentinel type.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Uint(u64),
    F32(f32),
    F64(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(Vec<(String, Value)>),
    Ext(RawExt),
    Time(SystemTime),
}

impl Value {
    pub fn encode_msg<W: io::Write>(&self, en: &mut Writer<W>) -> Result<(), EncodeError> {
        en.write_value(self)
    }

    pub fn decode_msg<R: io::Read>(&mut self, dc: &mut Reader<R>) -> Result<(), DecodeError> {
        *self = dc.read_value()?;
        Ok(())
    }

    pub fn marshal_msg(&self, b: Vec<u8>) -> Result<Vec<u8>, EncodeError> {
        Ok(crate::append_value(b, self))
    }

    pub fn unmarshal_msg<'a>(&mut self, bts: &'a [u8]) -> Result<&'a [u8], DecodeError> {
        let (v, rest) = crate::read_value_bytes(bts)?;
        *self = v;
        Ok(rest)
    }

    /// Upper bound on the encoded size.
    pub fn msg_size(&self) -> usize {
        match self {
            Value::Nil => size::NIL,
            Value::Bool(_) => size::BOOL,
            Value::Int(_) => size::I64,
            Value::Uint(_) => size::U64,
            Value::F32(_) => size::F32,
            Value::F64(_) => size::F64,
            Value::Str(s) => size::STR_PREFIX + s.len(),
            Value::Bytes(b) => size::BYTES_PREFIX + b.len(),
            Value::Array(els) => {
                size::ARRAY_HEADER + els.iter().map(Value::msg_size).sum::<usize>()
            }
            Value::Map(pairs) => {
                size::MAP_HEADER
                    + pairs
                        .iter()
                        .map(|(k, v)| size::STR_PREFIX + k.len() + v.msg_size())
                        .sum::<usize>()
            }
            Value::Ext(e) => e.msg_size(),
            Value::Time(_) => size::TIME,
        }
    }
}
