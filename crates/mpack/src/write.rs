//! Streaming MessagePack writer.

use std::io;
use std::time::SystemTime;

use num_complex::{Complex32, Complex64};

use crate::extension::Extension;
use crate::marker;
use crate::value::Value;
use crate::{time_to_unix, EncodeError};

const DEFAULT_BUF: usize = 2048;

/// A buffered MessagePack writer over any [`io::Write`].
///
/// Data accumulates in an internal buffer; call [`Writer::flush`] once the
/// object is complete to push everything to the underlying sink.
pub struct Writer<W: io::Write> {
    w: W,
    buf: Vec<u8>,
    limit: usize,
}

impl<W: io::Write> Writer<W> {
    pub fn new(w: W) -> Self {
        Writer {
            w,
            buf: Vec::with_capacity(DEFAULT_BUF),
            limit: DEFAULT_BUF,
        }
    }

    /// Creates a writer whose buffer flushes after roughly `sz` bytes.
    pub fn with_capacity(w: W, sz: usize) -> Self {
        // 18 contiguous bytes are needed for the largest fixed object.
        let sz = sz.max(18);
        Writer {
            w,
            buf: Vec::with_capacity(sz),
            limit: sz,
        }
    }

    /// Flushes all buffered data to the underlying writer.
    pub fn flush(&mut self) -> Result<(), EncodeError> {
        if !self.buf.is_empty() {
            self.w.write_all(&self.buf)?;
            self.buf.clear();
        }
        Ok(())
    }

    /// Consumes the writer, flushing any remaining data.
    pub fn into_inner(mut self) -> Result<W, EncodeError> {
        self.flush()?;
        Ok(self.w)
    }

    fn reserve(&mut self, n: usize) -> Result<(), EncodeError> {
        if self.buf.len() + n > self.limit {
            self.flush()?;
        }
        Ok(())
    }

    fn push(&mut self, b: u8) -> Result<(), EncodeError> {
        self.reserve(1)?;
        self.buf.push(b);
        Ok(())
    }

    /// Appends pre-encoded MessagePack verbatim.
    pub fn append(&mut self, bts: &[u8]) -> Result<(), EncodeError> {
        if bts.len() > self.limit {
            self.flush()?;
            self.w.write_all(bts)?;
            return Ok(());
        }
        self.reserve(bts.len())?;
        self.buf.extend_from_slice(bts);
        Ok(())
    }

    pub fn write_nil(&mut self) -> Result<(), EncodeError> {
        self.push(marker::NIL)
    }

    pub fn write_bool(&mut self, b: bool) -> Result<(), EncodeError> {
        self.push(if b { marker::TRUE } else { marker::FALSE })
    }

    pub fn write_i64(&mut self, i: i64) -> Result<(), EncodeError> {
        match i {
            0..=0x7f => self.push(i as u8),
            -32..=-1 => self.push(i as u8),
            _ if i8::try_from(i).is_ok() => self.append_local(&[marker::I8, i as u8]),
            _ if i16::try_from(i).is_ok() => {
                let mut b = [0u8; 3];
                b[0] = marker::I16;
                b[1..].copy_from_slice(&(i as i16).to_be_bytes());
                self.append_local(&b)
            }
            _ if i32::try_from(i).is_ok() => {
                let mut b = [0u8; 5];
                b[0] = marker::I32;
                b[1..].copy_from_slice(&(i as i32).to_be_bytes());
                self.append_local(&b)
            }
            _ => {
                let mut b = [0u8; 9];
                b[0] = marker::I64;
                b[1..].copy_from_slice(&i.to_be_bytes());
                self.append_local(&b)
            }
        }
    }

    pub fn write_i32(&mut self, i: i32) -> Result<(), EncodeError> {
        self.write_i64(i as i64)
    }

    pub fn write_i16(&mut self, i: i16) -> Result<(), EncodeError> {
        self.write_i64(i as i64)
    }

    pub fn write_i8(&mut self, i: i8) -> Result<(), EncodeError> {
        self.write_i64(i as i64)
    }

    pub fn write_isize(&mut self, i: isize) -> Result<(), EncodeError> {
        self.write_i64(i as i64)
    }

    pub fn write_u64(&mut self, u: u64) -> Result<(), EncodeError> {
        match u {
            0..=0x7f => self.push(u as u8),
            _ if u8::try_from(u).is_ok() => self.append_local(&[marker::U8, u as u8]),
            _ if u16::try_from(u).is_ok() => {
                let mut b = [0u8; 3];
                b[0] = marker::U16;
                b[1..].copy_from_slice(&(u as u16).to_be_bytes());
                self.append_local(&b)
            }
            _ if u32::try_from(u).is_ok() => {
                let mut b = [0u8; 5];
                b[0] = marker::U32;
                b[1..].copy_from_slice(&(u as u32).to_be_bytes());
                self.append_local(&b)
            }
            _ => {
                let mut b = [0u8; 9];
                b[0] = marker::U64;
                b[1..].copy_from_slice(&u.to_be_bytes());
                self.append_local(&b)
            }
        }
    }

    pub fn write_u32(&mut self, u: u32) -> Result<(), EncodeError> {
        self.write_u64(u as u64)
    }

    pub fn write_u16(&mut self, u: u16) -> Result<(), EncodeError> {
        self.write_u64(u as u64)
    }

    pub fn write_u8(&mut self, u: u8) -> Result<(), EncodeError> {
        self.write_u64(u as u64)
    }

    pub fn write_byte(&mut self, u: u8) -> Result<(), EncodeError> {
        self.write_u64(u as u64)
    }

    pub fn write_usize(&mut self, u: usize) -> Result<(), EncodeError> {
        self.write_u64(u as u64)
    }

    pub fn write_f32(&mut self, f: f32) -> Result<(), EncodeError> {
        let mut b = [0u8; 5];
        b[0] = marker::F32;
        b[1..].copy_from_slice(&f.to_be_bytes());
        self.append_local(&b)
    }

    pub fn write_f64(&mut self, f: f64) -> Result<(), EncodeError> {
        let mut b = [0u8; 9];
        b[0] = marker::F64;
        b[1..].copy_from_slice(&f.to_be_bytes());
        self.append_local(&b)
    }

    pub fn write_str(&mut self, s: &str) -> Result<(), EncodeError> {
        self.write_str_header(s.len() as u32)?;
        self.append(s.as_bytes())
    }

    fn write_str_header(&mut self, len: u32) -> Result<(), EncodeError> {
        match len {
            0..=31 => self.push(marker::fixstr(len as u8)),
            32..=0xff => self.append_local(&[marker::STR8, len as u8]),
            0x100..=0xffff => {
                let mut b = [0u8; 3];
                b[0] = marker::STR16;
                b[1..].copy_from_slice(&(len as u16).to_be_bytes());
                self.append_local(&b)
            }
            _ => {
                let mut b = [0u8; 5];
                b[0] = marker::STR32;
                b[1..].copy_from_slice(&len.to_be_bytes());
                self.append_local(&b)
            }
        }
    }

    pub fn write_bytes(&mut self, bts: &[u8]) -> Result<(), EncodeError> {
        let len = bts.len() as u32;
        match len {
            0..=0xff => self.append_local(&[marker::BIN8, len as u8])?,
            0x100..=0xffff => {
                let mut b = [0u8; 3];
                b[0] = marker::BIN16;
                b[1..].copy_from_slice(&(len as u16).to_be_bytes());
                self.append_local(&b)?;
            }
            _ => {
                let mut b = [0u8; 5];
                b[0] = marker::BIN32;
                b[1..].copy_from_slice(&len.to_be_bytes());
                self.append_local(&b)?;
            }
        }
        self.append(bts)
    }

    pub fn write_map_header(&mut self, sz: u32) -> Result<(), EncodeError> {
        match sz {
            0..=15 => self.push(marker::fixmap(sz as u8)),
            16..=0xffff => {
                let mut b = [0u8; 3];
                b[0] = marker::MAP16;
                b[1..].copy_from_slice(&(sz as u16).to_be_bytes());
                self.append_local(&b)
            }
            _ => {
                let mut b = [0u8; 5];
                b[0] = marker::MAP32;
                b[1..].copy_from_slice(&sz.to_be_bytes());
                self.append_local(&b)
            }
        }
    }

    pub fn write_array_header(&mut self, sz: u32) -> Result<(), EncodeError> {
        match sz {
            0..=15 => self.push(marker::fixarray(sz as u8)),
            16..=0xffff => {
                let mut b = [0u8; 3];
                b[0] = marker::ARRAY16;
                b[1..].copy_from_slice(&(sz as u16).to_be_bytes());
                self.append_local(&b)
            }
            _ => {
                let mut b = [0u8; 5];
                b[0] = marker::ARRAY32;
                b[1..].copy_from_slice(&sz.to_be_bytes());
                self.append_local(&b)
            }
        }
    }

    pub fn write_complex32(&mut self, c: Complex32) -> Result<(), EncodeError> {
        let mut b = [0u8; 10];
        b[0] = marker::FIXEXT8;
        b[1] = crate::COMPLEX32_EXT as u8;
        b[2..6].copy_from_slice(&c.re.to_be_bytes());
        b[6..10].copy_from_slice(&c.im.to_be_bytes());
        self.append_local(&b)
    }

    pub fn write_complex64(&mut self, c: Complex64) -> Result<(), EncodeError> {
        let mut b = [0u8; 18];
        b[0] = marker::FIXEXT16;
        b[1] = crate::COMPLEX64_EXT as u8;
        b[2..10].copy_from_slice(&c.re.to_be_bytes());
        b[10..18].copy_from_slice(&c.im.to_be_bytes());
        self.append_local(&b)
    }

    pub fn write_time(&mut self, t: SystemTime) -> Result<(), EncodeError> {
        let (sec, nsec) = time_to_unix(t);
        let mut b = [0u8; 15];
        b[0] = marker::EXT8;
        b[1] = 12;
        b[2] = crate::TIME_EXT as u8;
        b[3..11].copy_from_slice(&sec.to_be_bytes());
        b[11..15].copy_from_slice(&nsec.to_be_bytes());
        self.append_local(&b)
    }

    pub fn write_extension<E: Extension + ?Sized>(&mut self, e: &E) -> Result<(), EncodeError> {
        let len = e.ext_len();
        let typ = e.ext_type() as u8;
        match len {
            1 => self.append_local(&[marker::FIXEXT1, typ])?,
            2 => self.append_local(&[marker::FIXEXT2, typ])?,
            4 => self.append_local(&[marker::FIXEXT4, typ])?,
            8 => self.append_local(&[marker::FIXEXT8, typ])?,
            16 => self.append_local(&[marker::FIXEXT16, typ])?,
            0..=0xff => self.append_local(&[marker::EXT8, len as u8, typ])?,
            0x100..=0xffff => {
                let mut b = [0u8; 4];
                b[0] = marker::EXT16;
                b[1..3].copy_from_slice(&(len as u16).to_be_bytes());
                b[3] = typ;
                self.append_local(&b)?;
            }
            _ => {
                let mut b = [0u8; 6];
                b[0] = marker::EXT32;
                b[1..5].copy_from_slice(&(len as u32).to_be_bytes());
                b[5] = typ;
                self.append_local(&b)?;
            }
        }
        let mut payload = vec![0u8; len];
        e.marshal_binary_to(&mut payload)?;
        self.append(&payload)
    }

    pub fn write_value(&mut self, v: &Value) -> Result<(), EncodeError> {
        match v {
            Value::Nil => self.write_nil(),
            Value::Bool(b) => self.write_bool(*b),
            Value::Int(i) => self.write_i64(*i),
            Value::Uint(u) => self.write_u64(*u),
            Value::F32(f) => self.write_f32(*f),
            Value::F64(f) => self.write_f64(*f),
            Value::Str(s) => self.write_str(s),
            Value::Bytes(b) => self.write_bytes(b),
            Value::Array(els) => {
                self.write_array_header(els.len() as u32)?;
                for el in els {
                    self.write_value(el)?;
                }
                Ok(())
            }
            Value::Map(pairs) => {
                self.write_map_header(pairs.len() as u32)?;
                for (k, el) in pairs {
                    self.write_str(k)?;
                    self.write_value(el)?;
                }
                Ok(())
            }
            Value::Ext(e) => self.write_extension(e),
            Value::Time(t) => self.write_time(*t),
        }
    }

    // Small fixed-size chunks always fit the buffer contract.
    fn append_local(&mut self, bts: &[u8]) -> Result<(), EncodeError> {
        self.reserve(bts.len())?;
        self.buf.extend_from_slice(bts);
        Ok(())
    }
}
