//! Streaming MessagePack reader.

use std::io;
use std::time::SystemTime;

use num_complex::{Complex32, Complex64};

use crate::extension::Extension;
use crate::marker;
use crate::value::Value;
use crate::{unix_to_time, DecodeError};

/// A MessagePack reader over any [`io::Read`], with single-byte lookahead
/// so that nil objects can be detected without consuming them.
pub struct Reader<R: io::Read> {
    r: R,
    peeked: Option<u8>,
}

impl<R: io::Read> Reader<R> {
    pub fn new(r: R) -> Self {
        Reader { r, peeked: None }
    }

    fn next_byte(&mut self) -> Result<u8, DecodeError> {
        if let Some(b) = self.peeked.take() {
            return Ok(b);
        }
        let mut b = [0u8; 1];
        self.r.read_exact(&mut b)?;
        Ok(b[0])
    }

    fn peek_byte(&mut self) -> Result<u8, DecodeError> {
        if let Some(b) = self.peeked {
            return Ok(b);
        }
        let mut b = [0u8; 1];
        self.r.read_exact(&mut b)?;
        self.peeked = Some(b[0]);
        Ok(b[0])
    }

    fn fill(&mut self, dst: &mut [u8]) -> Result<(), DecodeError> {
        if dst.is_empty() {
            return Ok(());
        }
        let mut start = 0;
        if let Some(b) = self.peeked.take() {
            dst[0] = b;
            start = 1;
        }
        self.r.read_exact(&mut dst[start..])?;
        Ok(())
    }

    fn fill_vec(&mut self, len: usize, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        dst.clear();
        dst.resize(len, 0);
        self.fill(&mut dst[..])
    }

    fn be16(&mut self) -> Result<u16, DecodeError> {
        let mut b = [0u8; 2];
        self.fill(&mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn be32(&mut self) -> Result<u32, DecodeError> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn be64(&mut self) -> Result<u64, DecodeError> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    /// Returns the next marker byte without consuming it.
    pub fn peek_marker(&mut self) -> Result<u8, DecodeError> {
        self.peek_byte()
    }

    /// Reports whether the next object is nil, without consuming it.
    pub fn is_nil(&mut self) -> Result<bool, DecodeError> {
        Ok(self.peek_byte()? == marker::NIL)
    }

    pub fn read_nil(&mut self) -> Result<(), DecodeError> {
        let m = self.next_byte()?;
        if m != marker::NIL {
            return Err(DecodeError::mismatch("nil", m));
        }
        Ok(())
    }

    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        let m = self.next_byte()?;
        match m {
            marker::TRUE => Ok(true),
            marker::FALSE => Ok(false),
            _ => Err(DecodeError::mismatch("bool", m)),
        }
    }

    pub fn read_i64(&mut self) -> Result<i64, DecodeError> {
        let m = self.next_byte()?;
        match m {
            0x00..=0x7f => Ok(m as i64),
            0xe0..=0xff => Ok(m as i8 as i64),
            marker::I8 => Ok(self.next_byte()? as i8 as i64),
            marker::I16 => Ok(self.be16()? as i16 as i64),
            marker::I32 => Ok(self.be32()? as i32 as i64),
            marker::I64 => Ok(self.be64()? as i64),
            marker::U8 => Ok(self.next_byte()? as i64),
            marker::U16 => Ok(self.be16()? as i64),
            marker::U32 => Ok(self.be32()? as i64),
            marker::U64 => {
                let u = self.be64()?;
                i64::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 64))
            }
            _ => Err(DecodeError::mismatch("int", m)),
        }
    }

    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let i = self.read_i64()?;
        i32::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 32))
    }

    pub fn read_i16(&mut self) -> Result<i16, DecodeError> {
        let i = self.read_i64()?;
        i16::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 16))
    }

    pub fn read_i8(&mut self) -> Result<i8, DecodeError> {
        let i = self.read_i64()?;
        i8::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 8))
    }

    pub fn read_isize(&mut self) -> Result<isize, DecodeError> {
        let i = self.read_i64()?;
        isize::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 64))
    }

    pub fn read_u64(&mut self) -> Result<u64, DecodeError> {
        let m = self.next_byte()?;
        match m {
            0x00..=0x7f => Ok(m as u64),
            marker::U8 => Ok(self.next_byte()? as u64),
            marker::U16 => Ok(self.be16()? as u64),
            marker::U32 => Ok(self.be32()? as u64),
            marker::U64 => Ok(self.be64()?),
            marker::I8 | marker::I16 | marker::I32 | marker::I64 | 0xe0..=0xff => {
                // Signed on the wire; negative values cannot become unsigned.
                let i = match m {
                    marker::I8 => self.next_byte()? as i8 as i64,
                    marker::I16 => self.be16()? as i16 as i64,
                    marker::I32 => self.be32()? as i32 as i64,
                    marker::I64 => self.be64()? as i64,
                    _ => m as i8 as i64,
                };
                u64::try_from(i).map_err(|_| DecodeError::overflow(i as i128, 64))
            }
            _ => Err(DecodeError::mismatch("uint", m)),
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let u = self.read_u64()?;
        u32::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 32))
    }

    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let u = self.read_u64()?;
        u16::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 16))
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let u = self.read_u64()?;
        u8::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 8))
    }

    pub fn read_byte(&mut self) -> Result<u8, DecodeError> {
        self.read_u8()
    }

    pub fn read_usize(&mut self) -> Result<usize, DecodeError> {
        let u = self.read_u64()?;
        usize::try_from(u).map_err(|_| DecodeError::overflow(u as i128, 64))
    }

    pub fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let m = self.next_byte()?;
        if m != marker::F32 {
            return Err(DecodeError::mismatch("f32", m));
        }
        Ok(f32::from_be_bytes(self.be32()?.to_be_bytes()))
    }

    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let m = self.next_byte()?;
        match m {
            marker::F64 => Ok(f64::from_be_bytes(self.be64()?.to_be_bytes())),
            // A float32 widens losslessly.
            marker::F32 => Ok(f32::from_be_bytes(self.be32()?.to_be_bytes()) as f64),
            _ => Err(DecodeError::mismatch("f64", m)),
        }
    }

    fn read_str_len(&mut self) -> Result<usize, DecodeError> {
        let m = self.next_byte()?;
        match m {
            _ if marker::is_fixstr(m) => Ok((m & 0x1f) as usize),
            marker::STR8 => Ok(self.next_byte()? as usize),
            marker::STR16 => Ok(self.be16()? as usize),
            marker::STR32 => Ok(self.be32()? as usize),
            _ => Err(DecodeError::mismatch("str", m)),
        }
    }

    pub fn read_str(&mut self) -> Result<String, DecodeError> {
        let len = self.read_str_len()?;
        let mut buf = Vec::new();
        self.fill_vec(len, &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Reads a map key (str or bin on the wire) into a reusable scratch
    /// buffer.
    pub fn read_map_key(&mut self, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        let m = self.peek_byte()?;
        let len = match m {
            marker::BIN8 | marker::BIN16 | marker::BIN32 => self.read_bin_len()?,
            _ => self.read_str_len()?,
        };
        self.fill_vec(len, dst)
    }

    fn read_bin_len(&mut self) -> Result<usize, DecodeError> {
        let m = self.next_byte()?;
        match m {
            marker::BIN8 => Ok(self.next_byte()? as usize),
            marker::BIN16 => Ok(self.be16()? as usize),
            marker::BIN32 => Ok(self.be32()? as usize),
            _ => Err(DecodeError::mismatch("bin", m)),
        }
    }

    /// Reads a byte blob (bin or str on the wire) into `dst`, reusing its
    /// capacity.
    pub fn read_bytes_into(&mut self, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        let m = self.peek_byte()?;
        let len = match m {
            marker::BIN8 | marker::BIN16 | marker::BIN32 => self.read_bin_len()?,
            _ => self.read_str_len()?,
        };
        self.fill_vec(len, dst)
    }

    /// Reads a byte blob whose length must equal `dst.len()` exactly.
    pub fn read_exact_bytes(&mut self, dst: &mut [u8]) -> Result<(), DecodeError> {
        let len = self.read_bin_len()?;
        if len != dst.len() {
            return Err(DecodeError::array_len(dst.len() as u32, len as u32));
        }
        self.fill(dst)
    }

    pub fn read_map_header(&mut self) -> Result<u32, DecodeError> {
        let m = self.next_byte()?;
        match m {
            _ if marker::is_fixmap(m) => Ok((m & 0x0f) as u32),
            marker::MAP16 => Ok(self.be16()? as u32),
            marker::MAP32 => Ok(self.be32()?),
            _ => Err(DecodeError::mismatch("map", m)),
        }
    }

    pub fn read_array_header(&mut self) -> Result<u32, DecodeError> {
        let m = self.next_byte()?;
        match m {
            _ if marker::is_fixarray(m) => Ok((m & 0x0f) as u32),
            marker::ARRAY16 => Ok(self.be16()? as u32),
            marker::ARRAY32 => Ok(self.be32()?),
            _ => Err(DecodeError::mismatch("array", m)),
        }
    }

    fn read_ext_header(&mut self) -> Result<(i8, usize), DecodeError> {
        let m = self.next_byte()?;
        let len = match m {
            marker::FIXEXT1 => 1,
            marker::FIXEXT2 => 2,
            marker::FIXEXT4 => 4,
            marker::FIXEXT8 => 8,
            marker::FIXEXT16 => 16,
            marker::EXT8 => self.next_byte()? as usize,
            marker::EXT16 => self.be16()? as usize,
            marker::EXT32 => self.be32()? as usize,
            _ => return Err(DecodeError::mismatch("ext", m)),
        };
        let typ = self.next_byte()? as i8;
        Ok((typ, len))
    }

    pub fn read_complex32(&mut self) -> Result<Complex32, DecodeError> {
        let (typ, len) = self.read_ext_header()?;
        if typ != crate::COMPLEX32_EXT || len != 8 {
            return Err(DecodeError::ExtType {
                wanted: crate::COMPLEX32_EXT,
                got: typ,
            });
        }
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        let re = f32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        let im = f32::from_be_bytes([b[4], b[5], b[6], b[7]]);
        Ok(Complex32::new(re, im))
    }

    pub fn read_complex64(&mut self) -> Result<Complex64, DecodeError> {
        let (typ, len) = self.read_ext_header()?;
        if typ != crate::COMPLEX64_EXT || len != 16 {
            return Err(DecodeError::ExtType {
                wanted: crate::COMPLEX64_EXT,
                got: typ,
            });
        }
        let mut b = [0u8; 16];
        self.fill(&mut b)?;
        let mut re = [0u8; 8];
        let mut im = [0u8; 8];
        re.copy_from_slice(&b[..8]);
        im.copy_from_slice(&b[8..]);
        Ok(Complex64::new(f64::from_be_bytes(re), f64::from_be_bytes(im)))
    }

    pub fn read_time(&mut self) -> Result<SystemTime, DecodeError> {
        let (typ, len) = self.read_ext_header()?;
        if typ != crate::TIME_EXT || len != 12 {
            return Err(DecodeError::ExtType {
                wanted: crate::TIME_EXT,
                got: typ,
            });
        }
        let mut b = [0u8; 12];
        self.fill(&mut b)?;
        let mut sec = [0u8; 8];
        let mut nsec = [0u8; 4];
        sec.copy_from_slice(&b[..8]);
        nsec.copy_from_slice(&b[8..]);
        Ok(unix_to_time(i64::from_be_bytes(sec), u32::from_be_bytes(nsec)))
    }

    pub fn read_extension<E: Extension + ?Sized>(&mut self, e: &mut E) -> Result<(), DecodeError> {
        let (typ, len) = self.read_ext_header()?;
        let mut payload = Vec::new();
        self.fill_vec(len, &mut payload)?;
        e.unmarshal_binary(typ, &payload)
    }

    pub fn read_value(&mut self) -> Result<Value, DecodeError> {
        let m = self.peek_byte()?;
        match m {
            marker::NIL => {
                self.read_nil()?;
                Ok(Value::Nil)
            }
            marker::TRUE | marker::FALSE => Ok(Value::Bool(self.read_bool()?)),
            0x00..=0x7f | marker::U8 | marker::U16 | marker::U32 | marker::U64 => {
                Ok(Value::Uint(self.read_u64()?))
            }
            0xe0..=0xff | marker::I8 | marker::I16 | marker::I32 | marker::I64 => {
                Ok(Value::Int(self.read_i64()?))
            }
            marker::F32 => Ok(Value::F32(self.read_f32()?)),
            marker::F64 => Ok(Value::F64(self.read_f64()?)),
            marker::BIN8 | marker::BIN16 | marker::BIN32 => {
                let mut b = Vec::new();
                self.read_bytes_into(&mut b)?;
                Ok(Value::Bytes(b))
            }
            _ if marker::is_fixstr(m) => Ok(Value::Str(self.read_str()?)),
            marker::STR8 | marker::STR16 | marker::STR32 => Ok(Value::Str(self.read_str()?)),
            _ if marker::is_fixarray(m) => self.read_value_array(),
            marker::ARRAY16 | marker::ARRAY32 => self.read_value_array(),
            _ if marker::is_fixmap(m) => self.read_value_map(),
            marker::MAP16 | marker::MAP32 => self.read_value_map(),
            marker::FIXEXT1 | marker::FIXEXT2 | marker::FIXEXT4 | marker::FIXEXT8
            | marker::FIXEXT16 | marker::EXT8 | marker::EXT16 | marker::EXT32 => {
                let (typ, len) = self.read_ext_header()?;
                if typ == crate::TIME_EXT && len == 12 {
                    let mut b = [0u8; 12];
                    self.fill(&mut b)?;
                    let mut sec = [0u8; 8];
                    let mut nsec = [0u8; 4];
                    sec.copy_from_slice(&b[..8]);
                    nsec.copy_from_slice(&b[8..]);
                    return Ok(Value::Time(unix_to_time(
                        i64::from_be_bytes(sec),
                        u32::from_be_bytes(nsec),
                    )));
                }
                let mut data = Vec::new();
                self.fill_vec(len, &mut data)?;
                Ok(Value::Ext(crate::RawExt { kind: typ, data }))
            }
            _ => Err(DecodeError::mismatch("value", m)),
        }
    }

    fn read_value_array(&mut self) -> Result<Value, DecodeError> {
        let n = self.read_array_header()?;
        let mut els = Vec::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            els.push(self.read_value()?);
        }
        Ok(Value::Array(els))
    }

    fn read_value_map(&mut self) -> Result<Value, DecodeError> {
        let n = self.read_map_header()?;
        let mut pairs = Vec::with_capacity(n.min(1024) as usize);
        for _ in 0..n {
            let k = self.read_str()?;
            let v = self.read_value()?;
            pairs.push((k, v));
        }
        Ok(Value::Map(pairs))
    }

    /// Skips exactly one object, recursing through containers.
    pub fn skip(&mut self) -> Result<(), DecodeError> {
        let m = self.next_byte()?;
        match m {
            marker::NIL | marker::TRUE | marker::FALSE | 0x00..=0x7f | 0xe0..=0xff => Ok(()),
            marker::I8 | marker::U8 => self.discard(1),
            marker::I16 | marker::U16 => self.discard(2),
            marker::I32 | marker::U32 | marker::F32 => self.discard(4),
            marker::I64 | marker::U64 | marker::F64 => self.discard(8),
            _ if marker::is_fixstr(m) => self.discard((m & 0x1f) as usize),
            marker::STR8 | marker::BIN8 => {
                let n = self.next_byte()? as usize;
                self.discard(n)
            }
            marker::STR16 | marker::BIN16 => {
                let n = self.be16()? as usize;
                self.discard(n)
            }
            marker::STR32 | marker::BIN32 => {
                let n = self.be32()? as usize;
                self.discard(n)
            }
            marker::FIXEXT1 => self.discard(2),
            marker::FIXEXT2 => self.discard(3),
            marker::FIXEXT4 => self.discard(5),
            marker::FIXEXT8 => self.discard(9),
            marker::FIXEXT16 => self.discard(17),
            marker::EXT8 => {
                let n = self.next_byte()? as usize;
                self.discard(n + 1)
            }
            marker::EXT16 => {
                let n = self.be16()? as usize;
                self.discard(n + 1)
            }
            marker::EXT32 => {
                let n = self.be32()? as usize;
                self.discard(n + 1)
            }
            _ if marker::is_fixarray(m) => self.skip_n((m & 0x0f) as u32),
            marker::ARRAY16 => {
                let n = self.be16()? as u32;
                self.skip_n(n)
            }
            marker::ARRAY32 => {
                let n = self.be32()?;
                self.skip_n(n)
            }
            _ if marker::is_fixmap(m) => self.skip_n(2 * (m & 0x0f) as u32),
            marker::MAP16 => {
                let n = self.be16()? as u32;
                self.skip_n(2 * n)
            }
            marker::MAP32 => {
                let n = self.be32()?;
                self.skip_n(2 * n)
            }
            _ => Err(DecodeError::mismatch("any", m)),
        }
    }

    fn skip_n(&mut self, n: u32) -> Result<(), DecodeError> {
        for _ in 0..n {
            self.skip()?;
        }
        Ok(())
    }

    fn discard(&mut self, n: usize) -> Result<(), DecodeError> {
        let mut remaining = n;
        let mut chunk = [0u8; 64];
        if remaining > 0 && self.peeked.take().is_some() {
            remaining -= 1;
        }
        while remaining > 0 {
            let take = remaining.min(chunk.len());
            self.r.read_exact(&mut chunk[..take])?;
            remaining -= take;
        }
        Ok(())
    }

    /// Reads one complete object verbatim into `dst` (used by [`crate::Raw`]).
    pub fn read_raw_into(&mut self, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        dst.clear();
        self.copy_one(dst)
    }

    fn copy_one(&mut self, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        let m = self.next_byte()?;
        dst.push(m);
        match m {
            marker::NIL | marker::TRUE | marker::FALSE | 0x00..=0x7f | 0xe0..=0xff => Ok(()),
            marker::I8 | marker::U8 => self.copy_n(1, dst),
            marker::I16 | marker::U16 => self.copy_n(2, dst),
            marker::I32 | marker::U32 | marker::F32 => self.copy_n(4, dst),
            marker::I64 | marker::U64 | marker::F64 => self.copy_n(8, dst),
            _ if marker::is_fixstr(m) => self.copy_n((m & 0x1f) as usize, dst),
            marker::STR8 | marker::BIN8 | marker::EXT8 => {
                let n = self.next_byte()?;
                dst.push(n);
                let extra = if m == marker::EXT8 { 1 } else { 0 };
                self.copy_n(n as usize + extra, dst)
            }
            marker::STR16 | marker::BIN16 | marker::EXT16 => {
                let n = self.be16()?;
                dst.extend_from_slice(&n.to_be_bytes());
                let extra = if m == marker::EXT16 { 1 } else { 0 };
                self.copy_n(n as usize + extra, dst)
            }
            marker::STR32 | marker::BIN32 | marker::EXT32 => {
                let n = self.be32()?;
                dst.extend_from_slice(&n.to_be_bytes());
                let extra = if m == marker::EXT32 { 1 } else { 0 };
                self.copy_n(n as usize + extra, dst)
            }
            marker::FIXEXT1 => self.copy_n(2, dst),
            marker::FIXEXT2 => self.copy_n(3, dst),
            marker::FIXEXT4 => self.copy_n(5, dst),
            marker::FIXEXT8 => self.copy_n(9, dst),
            marker::FIXEXT16 => self.copy_n(17, dst),
            _ if marker::is_fixarray(m) => self.copy_objects((m & 0x0f) as u32, dst),
            marker::ARRAY16 => {
                let n = self.be16()?;
                dst.extend_from_slice(&n.to_be_bytes());
                self.copy_objects(n as u32, dst)
            }
            marker::ARRAY32 => {
                let n = self.be32()?;
                dst.extend_from_slice(&n.to_be_bytes());
                self.copy_objects(n, dst)
            }
            _ if marker::is_fixmap(m) => self.copy_objects(2 * (m & 0x0f) as u32, dst),
            marker::MAP16 => {
                let n = self.be16()?;
                dst.extend_from_slice(&n.to_be_bytes());
                self.copy_objects(2 * n as u32, dst)
            }
            marker::MAP32 => {
                let n = self.be32()?;
                dst.extend_from_slice(&n.to_be_bytes());
                self.copy_objects(2 * n, dst)
            }
            _ => Err(DecodeError::mismatch("any", m)),
        }
    }

    fn copy_n(&mut self, n: usize, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        let start = dst.len();
        dst.resize(start + n, 0);
        self.fill(&mut dst[start..])
    }

    fn copy_objects(&mut self, n: u32, dst: &mut Vec<u8>) -> Result<(), DecodeError> {
        for _ in 0..n {
            self.copy_one(dst)?;
        }
        Ok(())
    }
}
