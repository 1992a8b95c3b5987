//! # mpack
//!
//! MessagePack wire-format runtime for code produced by `mpack-gen`.
//!
//! The crate exposes two symmetric families of primitives:
//!
//! - a streaming [`Writer`]/[`Reader`] pair with one method per wire kind
//!   (`write_u32`, `read_str`, map/array headers, extensions, ...), and
//! - buffer-oriented free functions: `append_*` extend a `Vec<u8>`, while
//!   `read_*_bytes` consume from a `&[u8]` and return the decoded value
//!   together with the residual slice.
//!
//! Generated code calls these primitives directly; nothing in this crate
//! inspects Rust types at runtime. The [`Raw`], [`Number`] and [`Value`]
//! types are the library built-ins that generated code may reference by
//! name, each carrying hand-written implementations of the five routine
//! families (`encode_msg`, `decode_msg`, `marshal_msg`, `unmarshal_msg`,
//! `msg_size`).
//!
//! ## Modules
//!
//! - `size`: worst-case encoded-size constants used by generated `msg_size`
//! - `extension`: the [`Extension`] trait and the [`RawExt`] carrier

mod error;
mod marker;
mod number;
mod raw;
mod read;
mod read_bytes;
mod value;
mod write;
mod write_bytes;

pub mod extension;
pub mod size;

pub use error::{DecodeError, EncodeError};
pub use extension::{Extension, RawExt, COMPLEX32_EXT, COMPLEX64_EXT, TIME_EXT};
pub use number::Number;
pub use raw::Raw;
pub use read::Reader;
pub use read_bytes::{
    is_nil_bytes, read_array_header_bytes, read_bool_bytes, read_byte_bytes, read_bytes_bytes,
    read_complex32_bytes, read_complex64_bytes, read_exact_bytes, read_extension_bytes,
    read_f32_bytes, read_f64_bytes, read_i16_bytes, read_i32_bytes, read_i64_bytes, read_i8_bytes,
    read_isize_bytes, read_map_header_bytes, read_map_key_bytes, read_nil_bytes,
    read_str_bytes, read_time_bytes, read_u16_bytes, read_u32_bytes, read_u64_bytes,
    read_u8_bytes, read_usize_bytes, read_value_bytes, skip_bytes,
};
pub use value::Value;
pub use write::Writer;
pub use write_bytes::{
    append_array_header, append_bool, append_byte, append_bytes, append_complex32,
    append_complex64, append_extension, append_f32, append_f64, append_i16, append_i32,
    append_i64, append_i8, append_isize, append_map_header, append_nil, append_str,
    append_time, append_u16, append_u32, append_u64, append_u8, append_usize, append_value,
    require,
};

pub use num_complex::{Complex32, Complex64};

/// Splits a UNIX timestamp out of a `SystemTime`, allowing pre-epoch values.
pub(crate) fn time_to_unix(t: std::time::SystemTime) -> (i64, u32) {
    match t.duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => (d.as_secs() as i64, d.subsec_nanos()),
        Err(e) => {
            let d = e.duration();
            let mut sec = -(d.as_secs() as i64);
            let mut nsec = d.subsec_nanos();
            if nsec > 0 {
                sec -= 1;
                nsec = 1_000_000_000 - nsec;
            }
            (sec, nsec)
        }
    }
}

/// Rebuilds a `SystemTime` from seconds and nanoseconds since the UNIX epoch.
pub(crate) fn unix_to_time(sec: i64, nsec: u32) -> std::time::SystemTime {
    use std::time::{Duration, UNIX_EPOCH};
    if sec >= 0 {
        UNIX_EPOCH + Duration::new(sec as u64, nsec)
    } else {
        // sec is the floor; nsec counts forward from it.
        UNIX_EPOCH - Duration::new((-sec) as u64, 0) + Duration::new(0, nsec)
    }
}
