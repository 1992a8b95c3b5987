//! Buffer-oriented MessagePack appenders.
//!
//! Each function takes ownership of the buffer, extends it, and returns it,
//! so generated marshal bodies chain `o = mpack::append_u32(o, v);` calls.

use std::time::SystemTime;

use num_complex::{Complex32, Complex64};

use crate::extension::Extension;
use crate::marker;
use crate::time_to_unix;
use crate::value::Value;

/// Ensures at least `n` additional bytes of capacity.
pub fn require(mut buf: Vec<u8>, n: usize) -> Vec<u8> {
    buf.reserve(n);
    buf
}

pub fn append_nil(mut buf: Vec<u8>) -> Vec<u8> {
    buf.push(marker::NIL);
    buf
}

pub fn append_bool(mut buf: Vec<u8>, b: bool) -> Vec<u8> {
    buf.push(if b { marker::TRUE } else { marker::FALSE });
    buf
}

pub fn append_i64(mut buf: Vec<u8>, i: i64) -> Vec<u8> {
    match i {
        0..=0x7f => buf.push(i as u8),
        -32..=-1 => buf.push(i as u8),
        _ if i8::try_from(i).is_ok() => {
            buf.push(marker::I8);
            buf.push(i as u8);
        }
        _ if i16::try_from(i).is_ok() => {
            buf.push(marker::I16);
            buf.extend_from_slice(&(i as i16).to_be_bytes());
        }
        _ if i32::try_from(i).is_ok() => {
            buf.push(marker::I32);
            buf.extend_from_slice(&(i as i32).to_be_bytes());
        }
        _ => {
            buf.push(marker::I64);
            buf.extend_from_slice(&i.to_be_bytes());
        }
    }
    buf
}

pub fn append_i32(buf: Vec<u8>, i: i32) -> Vec<u8> {
    append_i64(buf, i as i64)
}

pub fn append_i16(buf: Vec<u8>, i: i16) -> Vec<u8> {
    append_i64(buf, i as i64)
}

pub fn append_i8(buf: Vec<u8>, i: i8) -> Vec<u8> {
    append_i64(buf, i as i64)
}

pub fn append_isize(buf: Vec<u8>, i: isize) -> Vec<u8> {
    append_i64(buf, i as i64)
}

pub fn append_u64(mut buf: Vec<u8>, u: u64) -> Vec<u8> {
    match u {
        0..=0x7f => buf.push(u as u8),
        _ if u8::try_from(u).is_ok() => {
            buf.push(marker::U8);
            buf.push(u as u8);
        }
        _ if u16::try_from(u).is_ok() => {
            buf.push(marker::U16);
            buf.extend_from_slice(&(u as u16).to_be_bytes());
        }
        _ if u32::try_from(u).is_ok() => {
            buf.push(marker::U32);
            buf.extend_from_slice(&(u as u32).to_be_bytes());
        }
        _ => {
            buf.push(marker::U64);
            buf.extend_from_slice(&u.to_be_bytes());
        }
    }
    buf
}

pub fn append_u32(buf: Vec<u8>, u: u32) -> Vec<u8> {
    append_u64(buf, u as u64)
}

pub fn append_u16(buf: Vec<u8>, u: u16) -> Vec<u8> {
    append_u64(buf, u as u64)
}

pub fn append_u8(buf: Vec<u8>, u: u8) -> Vec<u8> {
    append_u64(buf, u as u64)
}

pub fn append_byte(buf: Vec<u8>, u: u8) -> Vec<u8> {
    append_u64(buf, u as u64)
}

pub fn append_usize(buf: Vec<u8>, u: usize) -> Vec<u8> {
    append_u64(buf, u as u64)
}

pub fn append_f32(mut buf: Vec<u8>, f: f32) -> Vec<u8> {
    buf.push(marker::F32);
    buf.extend_from_slice(&f.to_be_bytes());
    buf
}

pub fn append_f64(mut buf: Vec<u8>, f: f64) -> Vec<u8> {
    buf.push(marker::F64);
    buf.extend_from_slice(&f.to_be_bytes());
    buf
}

pub fn append_str(mut buf: Vec<u8>, s: &str) -> Vec<u8> {
    let len = s.len() as u32;
    match len {
        0..=31 => buf.push(marker::fixstr(len as u8)),
        32..=0xff => {
            buf.push(marker::STR8);
            buf.push(len as u8);
        }
        0x100..=0xffff => {
            buf.push(marker::STR16);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            buf.push(marker::STR32);
            buf.extend_from_slice(&len.to_be_bytes());
        }
    }
    buf.extend_from_slice(s.as_bytes());
    buf
}

pub fn append_bytes(mut buf: Vec<u8>, bts: &[u8]) -> Vec<u8> {
    let len = bts.len() as u32;
    match len {
        0..=0xff => {
            buf.push(marker::BIN8);
            buf.push(len as u8);
        }
        0x100..=0xffff => {
            buf.push(marker::BIN16);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
        }
        _ => {
            buf.push(marker::BIN32);
            buf.extend_from_slice(&len.to_be_bytes());
        }
    }
    buf.extend_from_slice(bts);
    buf
}

pub fn append_map_header(mut buf: Vec<u8>, sz: u32) -> Vec<u8> {
    match sz {
        0..=15 => buf.push(marker::fixmap(sz as u8)),
        16..=0xffff => {
            buf.push(marker::MAP16);
            buf.extend_from_slice(&(sz as u16).to_be_bytes());
        }
        _ => {
            buf.push(marker::MAP32);
            buf.extend_from_slice(&sz.to_be_bytes());
        }
    }
    buf
}

pub fn append_array_header(mut buf: Vec<u8>, sz: u32) -> Vec<u8> {
    match sz {
        0..=15 => buf.push(marker::fixarray(sz as u8)),
        16..=0xffff => {
            buf.push(marker::ARRAY16);
            buf.extend_from_slice(&(sz as u16).to_be_bytes());
        }
        _ => {
            buf.push(marker::ARRAY32);
            buf.extend_from_slice(&sz.to_be_bytes());
        }
    }
    buf
}

pub fn append_complex32(mut buf: Vec<u8>, c: Complex32) -> Vec<u8> {
    buf.push(marker::FIXEXT8);
    buf.push(crate::COMPLEX32_EXT as u8);
    buf.extend_from_slice(&c.re.to_be_bytes());
    buf.extend_from_slice(&c.im.to_be_bytes());
    buf
}

pub fn append_complex64(mut buf: Vec<u8>, c: Complex64) -> Vec<u8> {
    buf.push(marker::FIXEXT16);
    buf.push(crate::COMPLEX64_EXT as u8);
    buf.extend_from_slice(&c.re.to_be_bytes());
    buf.extend_from_slice(&c.im.to_be_bytes());
    buf
}

pub fn append_time(mut buf: Vec<u8>, t: SystemTime) -> Vec<u8> {
    let (sec, nsec) = time_to_unix(t);
    buf.push(marker::EXT8);
    buf.push(12);
    buf.push(crate::TIME_EXT as u8);
    buf.extend_from_slice(&sec.to_be_bytes());
    buf.extend_from_slice(&nsec.to_be_bytes());
    buf
}

pub fn append_extension<E: Extension + ?Sized>(mut buf: Vec<u8>, e: &E) -> Vec<u8> {
    let len = e.ext_len();
    let typ = e.ext_type() as u8;
    match len {
        1 => buf.extend_from_slice(&[marker::FIXEXT1, typ]),
        2 => buf.extend_from_slice(&[marker::FIXEXT2, typ]),
        4 => buf.extend_from_slice(&[marker::FIXEXT4, typ]),
        8 => buf.extend_from_slice(&[marker::FIXEXT8, typ]),
        16 => buf.extend_from_slice(&[marker::FIXEXT16, typ]),
        0..=0xff => buf.extend_from_slice(&[marker::EXT8, len as u8, typ]),
        0x100..=0xffff => {
            buf.push(marker::EXT16);
            buf.extend_from_slice(&(len as u16).to_be_bytes());
            buf.push(typ);
        }
        _ => {
            buf.push(marker::EXT32);
            buf.extend_from_slice(&(len as u32).to_be_bytes());
            buf.push(typ);
        }
    }
    let start = buf.len();
    buf.resize(start + len, 0);
    // A failed payload serialization leaves zero padding of the declared length.
    let _ = e.marshal_binary_to(&mut buf[start..]);
    buf
}

pub fn append_value(mut buf: Vec<u8>, v: &Value) -> Vec<u8> {
    match v {
        Value::Nil => append_nil(buf),
        Value::Bool(b) => append_bool(buf, *b),
        Value::Int(i) => append_i64(buf, *i),
        Value::Uint(u) => append_u64(buf, *u),
        Value::F32(f) => append_f32(buf, *f),
        Value::F64(f) => append_f64(buf, *f),
        Value::Str(s) => append_str(buf, s),
        Value::Bytes(b) => append_bytes(buf, b),
        Value::Array(els) => {
            buf = append_array_header(buf, els.len() as u32);
            for el in els {
                buf = append_value(buf, el);
            }
            buf
        }
        Value::Map(pairs) => {
            buf = append_map_header(buf, pairs.len() as u32);
            for (k, el) in pairs {
                buf = append_str(buf, k);
                buf = append_value(buf, el);
            }
            buf
        }
        Value::Ext(e) => append_extension(buf, e),
        Value::Time(t) => append_time(buf, *t),
    }
}
