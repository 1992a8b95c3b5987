//! Worst-case encoded sizes, including the type-information prefix.
//!
//! For variable-length kinds (strings, byte blobs, extensions) the constant
//! covers the largest possible prefix; the payload length is added by the
//! generated `msg_size` expression.

pub const I8: usize = 2;
pub const I16: usize = 3;
pub const I32: usize = 5;
pub const I64: usize = 9;
pub const ISIZE: usize = I64;

pub const U8: usize = 2;
pub const U16: usize = 3;
pub const U32: usize = 5;
pub const U64: usize = 9;
pub const USIZE: usize = U64;
pub const BYTE: usize = 2;

pub const F32: usize = 5;
pub const F64: usize = 9;
pub const COMPLEX32: usize = 10;
pub const COMPLEX64: usize = 18;

pub const BOOL: usize = 1;
pub const NIL: usize = 1;
pub const TIME: usize = 15;

pub const MAP_HEADER: usize = 5;
pub const ARRAY_HEADER: usize = 5;

pub const BYTES_PREFIX: usize = 5;
pub const STR_PREFIX: usize = 5;
pub const EXT_PREFIX: usize = 6;
