//! Buffer-oriented MessagePack readers.
//!
//! Each function consumes the front of a byte slice and returns the decoded
//! value together with the residual slice, so generated unmarshal bodies
//! thread `bts` through every call.

use std::time::SystemTime;

use num_complex::{Complex32, Complex64};

use crate::extension::Extension;
use crate::marker;
use crate::value::Value;
use crate::{unix_to_time, DecodeError};

fn take(bts: &[u8], n: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if bts.len() < n {
        return Err(DecodeError::ShortBytes);
    }
    Ok(bts.split_at(n))
}

fn take1(bts: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    match bts.split_first() {
        Some((b, rest)) => Ok((*b, rest)),
        None => Err(DecodeError::ShortBytes),
    }
}

fn take_be16(bts: &[u8]) -> Result<(u16, &[u8]), DecodeError> {
    let (head, rest) = take(bts, 2)?;
    Ok((u16::from_be_bytes([head[0], head[1]]), rest))
}

fn take_be32(bts: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    let (head, rest) = take(bts, 4)?;
    Ok((u32::from_be_bytes([head[0], head[1], head[2], head[3]]), rest))
}

fn take_be64(bts: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    let (head, rest) = take(bts, 8)?;
    let mut b = [0u8; 8];
    b.copy_from_slice(head);
    Ok((u64::from_be_bytes(b), rest))
}

/// Reports whether the next object in `bts` is nil.
pub fn is_nil_bytes(bts: &[u8]) -> bool {
    bts.first() == Some(&marker::NIL)
}

pub fn read_nil_bytes(bts: &[u8]) -> Result<&[u8], DecodeError> {
    let (m, rest) = take1(bts)?;
    if m != marker::NIL {
        return Err(DecodeError::mismatch("nil", m));
    }
    Ok(rest)
}

pub fn read_bool_bytes(bts: &[u8]) -> Result<(bool, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        marker::TRUE => Ok((true, rest)),
        marker::FALSE => Ok((false, rest)),
        _ => Err(DecodeError::mismatch("bool", m)),
    }
}

pub fn read_i64_bytes(bts: &[u8]) -> Result<(i64, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        0x00..=0x7f => Ok((m as i64, rest)),
        0xe0..=0xff => Ok((m as i8 as i64, rest)),
        marker::I8 => {
            let (b, rest) = take1(rest)?;
            Ok((b as i8 as i64, rest))
        }
        marker::I16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as i16 as i64, rest))
        }
        marker::I32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((u as i32 as i64, rest))
        }
        marker::I64 => {
            let (u, rest) = take_be64(rest)?;
            Ok((u as i64, rest))
        }
        marker::U8 => {
            let (b, rest) = take1(rest)?;
            Ok((b as i64, rest))
        }
        marker::U16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as i64, rest))
        }
        marker::U32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((u as i64, rest))
        }
        marker::U64 => {
            let (u, rest) = take_be64(rest)?;
            let i = i64::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 64))?;
            Ok((i, rest))
        }
        _ => Err(DecodeError::mismatch("int", m)),
    }
}

pub fn read_i32_bytes(bts: &[u8]) -> Result<(i32, &[u8]), DecodeError> {
    let (i, rest) = read_i64_bytes(bts)?;
    let v = i32::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 32))?;
    Ok((v, rest))
}

pub fn read_i16_bytes(bts: &[u8]) -> Result<(i16, &[u8]), DecodeError> {
    let (i, rest) = read_i64_bytes(bts)?;
    let v = i16::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 16))?;
    Ok((v, rest))
}

pub fn read_i8_bytes(bts: &[u8]) -> Result<(i8, &[u8]), DecodeError> {
    let (i, rest) = read_i64_bytes(bts)?;
    let v = i8::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 8))?;
    Ok((v, rest))
}

pub fn read_isize_bytes(bts: &[u8]) -> Result<(isize, &[u8]), DecodeError> {
    let (i, rest) = read_i64_bytes(bts)?;
    let v = isize::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 64))?;
    Ok((v, rest))
}

pub fn read_u64_bytes(bts: &[u8]) -> Result<(u64, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        0x00..=0x7f => Ok((m as u64, rest)),
        marker::U8 => {
            let (b, rest) = take1(rest)?;
            Ok((b as u64, rest))
        }
        marker::U16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as u64, rest))
        }
        marker::U32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((u as u64, rest))
        }
        marker::U64 => take_be64(rest),
        marker::I8 | marker::I16 | marker::I32 | marker::I64 | 0xe0..=0xff => {
            let (i, rest) = read_i64_bytes(bts)?;
            let u = u64::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 64))?;
            Ok((u, rest))
        }
        _ => Err(DecodeError::mismatch("uint", m)),
    }
}

pub fn read_u32_bytes(bts: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    let (u, rest) = read_u64_bytes(bts)?;
    let v = u32::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 32))?;
    Ok((v, rest))
}

pub fn read_u16_bytes(bts: &[u8]) -> Result<(u16, &[u8]), DecodeError> {
    let (u, rest) = read_u64_bytes(bts)?;
    let v = u16::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 16))?;
    Ok((v, rest))
}

pub fn read_u8_bytes(bts: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    let (u, rest) = read_u64_bytes(bts)?;
    let v = u8::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 8))?;
    Ok((v, rest))
}

pub fn read_byte_bytes(bts: &[u8]) -> Result<(u8, &[u8]), DecodeError> {
    read_u8_bytes(bts)
}

pub fn read_usize_bytes(bts: &[u8]) -> Result<(usize, &[u8]), DecodeError> {
    let (u, rest) = read_u64_bytes(bts)?;
    let v = usize::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 64))?;
    Ok((v, rest))
}

pub fn read_f32_bytes(bts: &[u8]) -> Result<(f32, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    if m != marker::F32 {
        return Err(DecodeError::mismatch("f32", m));
    }
    let (u, rest) = take_be32(rest)?;
    Ok((f32::from_be_bytes(u.to_be_bytes()), rest))
}

pub fn read_f64_bytes(bts: &[u8]) -> Result<(f64, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        marker::F64 => {
            let (u, rest) = take_be64(rest)?;
            Ok((f64::from_be_bytes(u.to_be_bytes()), rest))
        }
        marker::F32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((f32::from_be_bytes(u.to_be_bytes()) as f64, rest))
        }
        _ => Err(DecodeError::mismatch("f64", m)),
    }
}

fn read_str_len_bytes(bts: &[u8]) -> Result<(usize, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        _ if marker::is_fixstr(m) => Ok(((m & 0x1f) as usize, rest)),
        marker::STR8 => {
            let (b, rest) = take1(rest)?;
            Ok((b as usize, rest))
        }
        marker::STR16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as usize, rest))
        }
        marker::STR32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((u as usize, rest))
        }
        _ => Err(DecodeError::mismatch("str", m)),
    }
}

fn read_bin_len_bytes(bts: &[u8]) -> Result<(usize, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        marker::BIN8 => {
            let (b, rest) = take1(rest)?;
            Ok((b as usize, rest))
        }
        marker::BIN16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as usize, rest))
        }
        marker::BIN32 => {
            let (u, rest) = take_be32(rest)?;
            Ok((u as usize, rest))
        }
        _ => Err(DecodeError::mismatch("bin", m)),
    }
}

pub fn read_str_bytes(bts: &[u8]) -> Result<(String, &[u8]), DecodeError> {
    let (len, rest) = read_str_len_bytes(bts)?;
    let (head, rest) = take(rest, len)?;
    Ok((String::from_utf8(head.to_vec())?, rest))
}

/// Reads a map key (str or bin) without copying.
pub fn read_map_key_bytes(bts: &[u8]) -> Result<(&[u8], &[u8]), DecodeError> {
    let (len, rest) = match bts.first() {
        Some(&m) if m == marker::BIN8 || m == marker::BIN16 || m == marker::BIN32 => {
            read_bin_len_bytes(bts)?
        }
        _ => read_str_len_bytes(bts)?,
    };
    take(rest, len)
}

pub fn read_bytes_bytes(bts: &[u8]) -> Result<(Vec<u8>, &[u8]), DecodeError> {
    let (len, rest) = match bts.first() {
        Some(&m) if m == marker::BIN8 || m == marker::BIN16 || m == marker::BIN32 => {
            read_bin_len_bytes(bts)?
        }
        _ => read_str_len_bytes(bts)?,
    };
    let (head, rest) = take(rest, len)?;
    Ok((head.to_vec(), rest))
}

/// Reads a byte blob whose length must equal `dst.len()` exactly.
pub fn read_exact_bytes<'a>(bts: &'a [u8], dst: &mut [u8]) -> Result<&'a [u8], DecodeError> {
    let (len, rest) = read_bin_len_bytes(bts)?;
    if len != dst.len() {
        return Err(DecodeError::array_len(dst.len() as u32, len as u32));
    }
    let (head, rest) = take(rest, len)?;
    dst.copy_from_slice(head);
    Ok(rest)
}

pub fn read_map_header_bytes(bts: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        _ if marker::is_fixmap(m) => Ok(((m & 0x0f) as u32, rest)),
        marker::MAP16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as u32, rest))
        }
        marker::MAP32 => take_be32(rest),
        _ => Err(DecodeError::mismatch("map", m)),
    }
}

pub fn read_array_header_bytes(bts: &[u8]) -> Result<(u32, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        _ if marker::is_fixarray(m) => Ok(((m & 0x0f) as u32, rest)),
        marker::ARRAY16 => {
            let (u, rest) = take_be16(rest)?;
            Ok((u as u32, rest))
        }
        marker::ARRAY32 => take_be32(rest),
        _ => Err(DecodeError::mismatch("array", m)),
    }
}

fn read_ext_header_bytes(bts: &[u8]) -> Result<(i8, usize, &[u8]), DecodeError> {
    let (m, rest) = take1(bts)?;
    let (len, rest) = match m {
        marker::FIXEXT1 => (1, rest),
        marker::FIXEXT2 => (2, rest),
        marker::FIXEXT4 => (4, rest),
        marker::FIXEXT8 => (8, rest),
        marker::FIXEXT16 => (16, rest),
        marker::EXT8 => {
            let (b, rest) = take1(rest)?;
            (b as usize, rest)
        }
        marker::EXT16 => {
            let (u, rest) = take_be16(rest)?;
            (u as usize, rest)
        }
        marker::EXT32 => {
            let (u, rest) = take_be32(rest)?;
            (u as usize, rest)
        }
        _ => return Err(DecodeError::mismatch("ext", m)),
    };
    let (typ, rest) = take1(rest)?;
    Ok((typ as i8, len, rest))
}

pub fn read_complex32_bytes(bts: &[u8]) -> Result<(Complex32, &[u8]), DecodeError> {
    let (typ, len, rest) = read_ext_header_bytes(bts)?;
    if typ != crate::COMPLEX32_EXT || len != 8 {
        return Err(DecodeError::ExtType {
            wanted: crate::COMPLEX32_EXT,
            got: typ,
        });
    }
    let (head, rest) = take(rest, 8)?;
    let re = f32::from_be_bytes([head[0], head[1], head[2], head[3]]);
    let im = f32::from_be_bytes([head[4], head[5], head[6], head[7]]);
    Ok((Complex32::new(re, im), rest))
}

pub fn read_complex64_bytes(bts: &[u8]) -> Result<(Complex64, &[u8]), DecodeError> {
    let (typ, len, rest) = read_ext_header_bytes(bts)?;
    if typ != crate::COMPLEX64_EXT || len != 16 {
        return Err(DecodeError::ExtType {
            wanted: crate::COMPLEX64_EXT,
            got: typ,
        });
    }
    let (head, rest) = take(rest, 16)?;
    let mut re = [0u8; 8];
    let mut im = [0u8; 8];
    re.copy_from_slice(&head[..8]);
    im.copy_from_slice(&head[8..]);
    Ok((
        Complex64::new(f64::from_be_bytes(re), f64::from_be_bytes(im)),
        rest,
    ))
}

pub fn read_time_bytes(bts: &[u8]) -> Result<(SystemTime, &[u8]), DecodeError> {
    let (typ, len, rest) = read_ext_header_bytes(bts)?;
    if typ != crate::TIME_EXT || len != 12 {
        return Err(DecodeError::ExtType {
            wanted: crate::TIME_EXT,
            got: typ,
        });
    }
    let (head, rest) = take(rest, 12)?;
    let mut sec = [0u8; 8];
    let mut nsec = [0u8; 4];
    sec.copy_from_slice(&head[..8]);
    nsec.copy_from_slice(&head[8..]);
    Ok((
        unix_to_time(i64::from_be_bytes(sec), u32::from_be_bytes(nsec)),
        rest,
    ))
}

pub fn read_extension_bytes<'a, E: Extension + ?Sized>(
    bts: &'a [u8],
    e: &mut E,
) -> Result<&'a [u8], DecodeError> {
    let (typ, len, rest) = read_ext_header_bytes(bts)?;
    let (head, rest) = take(rest, len)?;
    e.unmarshal_binary(typ, head)?;
    Ok(rest)
}

pub fn read_value_bytes(bts: &[u8]) -> Result<(Value, &[u8]), DecodeError> {
    let m = match bts.first() {
        Some(&m) => m,
        None => return Err(DecodeError::ShortBytes),
    };
    match m {
        marker::NIL => {
            let rest = read_nil_bytes(bts)?;
            Ok((Value::Nil, rest))
        }
        marker::TRUE | marker::FALSE => {
            let (b, rest) = read_bool_bytes(bts)?;
            Ok((Value::Bool(b), rest))
        }
        0x00..=0x7f | marker::U8 | marker::U16 | marker::U32 | marker::U64 => {
            let (u, rest) = read_u64_bytes(bts)?;
            Ok((Value::Uint(u), rest))
        }
        0xe0..=0xff | marker::I8 | marker::I16 | marker::I32 | marker::I64 => {
            let (i, rest) = read_i64_bytes(bts)?;
            Ok((Value::Int(i), rest))
        }
        marker::F32 => {
            let (f, rest) = read_f32_bytes(bts)?;
            Ok((Value::F32(f), rest))
        }
        marker::F64 => {
            let (f, rest) = read_f64_bytes(bts)?;
            Ok((Value::F64(f), rest))
        }
        marker::BIN8 | marker::BIN16 | marker::BIN32 => {
            let (b, rest) = read_bytes_bytes(bts)?;
            Ok((Value::Bytes(b), rest))
        }
        _ if marker::is_fixstr(m) => {
            let (s, rest) = read_str_bytes(bts)?;
            Ok((Value::Str(s), rest))
        }
        marker::STR8 | marker::STR16 | marker::STR32 => {
            let (s, rest) = read_str_bytes(bts)?;
            Ok((Value::Str(s), rest))
        }
        _ if marker::is_fixarray(m) || m == marker::ARRAY16 || m == marker::ARRAY32 => {
            let (n, mut rest) = read_array_header_bytes(bts)?;
            let mut els = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                let (el, r) = read_value_bytes(rest)?;
                els.push(el);
                rest = r;
            }
            Ok((Value::Array(els), rest))
        }
        _ if marker::is_fixmap(m) || m == marker::MAP16 || m == marker::MAP32 => {
            let (n, mut rest) = read_map_header_bytes(bts)?;
            let mut pairs = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                let (k, r) = read_str_bytes(rest)?;
                let (v, r) = read_value_bytes(r)?;
                pairs.push((k, v));
                rest = r;
            }
            Ok((Value::Map(pairs), rest))
        }
        marker::FIXEXT1 | marker::FIXEXT2 | marker::FIXEXT4 | marker::FIXEXT8
        | marker::FIXEXT16 | marker::EXT8 | marker::EXT16 | marker::EXT32 => {
            let (typ, len, rest) = read_ext_header_bytes(bts)?;
            if typ == crate::TIME_EXT && len == 12 {
                return read_time_bytes(bts).map(|(t, r)| (Value::Time(t), r));
            }
            let (head, rest) = take(rest, len)?;
            Ok((
                Value::Ext(crate::RawExt {
                    kind: typ,
                    data: head.to_vec(),
                }),
                rest,
            ))
        }
        _ => Err(DecodeError::mismatch("value", m)),
    }
}

/// Skips exactly one object, returning the residual slice.
pub fn skip_bytes(bts: &[u8]) -> Result<&[u8], DecodeError> {
    let (m, rest) = take1(bts)?;
    match m {
        marker::NIL | marker::TRUE | marker::FALSE | 0x00..=0x7f | 0xe0..=0xff => Ok(rest),
        marker::I8 | marker::U8 => take(rest, 1).map(|(_, r)| r),
        marker::I16 | marker::U16 => take(rest, 2).map(|(_, r)| r),
        marker::I32 | marker::U32 | marker::F32 => take(rest, 4).map(|(_, r)| r),
        marker::I64 | marker::U64 | marker::F64 => take(rest, 8).map(|(_, r)| r),
        _ if marker::is_fixstr(m) => take(rest, (m & 0x1f) as usize).map(|(_, r)| r),
        marker::STR8 | marker::BIN8 => {
            let (n, rest) = take1(rest)?;
            take(rest, n as usize).map(|(_, r)| r)
        }
        marker::STR16 | marker::BIN16 => {
            let (n, rest) = take_be16(rest)?;
            take(rest, n as usize).map(|(_, r)| r)
        }
        marker::STR32 | marker::BIN32 => {
            let (n, rest) = take_be32(rest)?;
            take(rest, n as usize).map(|(_, r)| r)
        }
        marker::FIXEXT1 => take(rest, 2).map(|(_, r)| r),
        marker::FIXEXT2 => take(rest, 3).map(|(_, r)| r),
        marker::FIXEXT4 => take(rest, 5).map(|(_, r)| r),
        marker::FIXEXT8 => take(rest, 9).map(|(_, r)| r),
        marker::FIXEXT16 => take(rest, 17).map(|(_, r)| r),
        marker::EXT8 => {
            let (n, rest) = take1(rest)?;
            take(rest, n as usize + 1).map(|(_, r)| r)
        }
        marker::EXT16 => {
            let (n, rest) = take_be16(rest)?;
            take(rest, n as usize + 1).map(|(_, r)| r)
        }
        marker::EXT32 => {
            let (n, rest) = take_be32(rest)?;
            take(rest, n as usize + 1).map(|(_, r)| r)
        }
        _ if marker::is_fixarray(m) => skip_n(rest, (m & 0x0f) as u32),
        marker::ARRAY16 => {
            let (n, rest) = take_be16(rest)?;
            skip_n(rest, n as u32)
        }
        marker::ARRAY32 => {
            let (n, rest) = take_be32(rest)?;
            skip_n(rest, n)
        }
        _ if marker::is_fixmap(m) => skip_n(rest, 2 * (m & 0x0f) as u32),
        marker::MAP16 => {
            let (n, rest) = take_be16(rest)?;
            skip_n(rest, 2 * n as u32)
        }
        marker::MAP32 => {
            let (n, rest) = take_be32(rest)?;
            skip_n(rest, 2 * n)
        }
        _ => Err(DecodeError::mismatch("any", m)),
    }
}

fn skip_n(mut bts: &[u8], n: u32) -> Result<&[u8], DecodeError> {
    for _ in 0..n {
        bts = skip_bytes(bts)?;
    }
    Ok(bts)
}
