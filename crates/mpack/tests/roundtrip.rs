//! Round-trip tests for the streaming and buffer-oriented primitives.

use std::time::{Duration, UNIX_EPOCH};

use mpack::{
    Complex32, Complex64, DecodeError, Number, Raw, RawExt, Reader, Value, Writer,
};

fn encode_with<F>(f: F) -> Vec<u8>
where
    F: FnOnce(&mut Writer<&mut Vec<u8>>),
{
    let mut buf = Vec::new();
    {
        let mut en = Writer::new(&mut buf);
        f(&mut en);
        en.flush().expect("flush");
    }
    buf
}

#[test]
fn test_int_widths_round_trip() {
    let cases: &[i64] = &[
        0, 1, 127, 128, -1, -32, -33, -128, -129, 255, 256, 65535, 65536, -32768, -32769,
        i64::from(i32::MAX), i64::from(i32::MIN), i64::MAX, i64::MIN,
    ];
    for &i in cases {
        let buf = encode_with(|en| en.write_i64(i).unwrap());
        let mut dc = Reader::new(buf.as_slice());
        assert_eq!(dc.read_i64().unwrap(), i, "streaming i64 {}", i);

        let buf2 = mpack::append_i64(Vec::new(), i);
        assert_eq!(buf, buf2, "stream and append encodings agree for {}", i);
        let (got, rest) = mpack::read_i64_bytes(&buf2).unwrap();
        assert_eq!(got, i);
        assert!(rest.is_empty());
    }
}

#[test]
fn test_uint_widths_round_trip() {
    let cases: &[u64] = &[0, 127, 128, 255, 256, 65535, 65536, u64::from(u32::MAX), u64::MAX];
    for &u in cases {
        let buf = encode_with(|en| en.write_u64(u).unwrap());
        let mut dc = Reader::new(buf.as_slice());
        assert_eq!(dc.read_u64().unwrap(), u);

        let encoded = mpack::append_u64(Vec::new(), u);
        let (got, rest) = mpack::read_u64_bytes(&encoded).unwrap();
        assert_eq!(got, u);
        assert!(rest.is_empty());
    }
}

#[test]
fn test_smallest_encoding_is_used() {
    assert_eq!(mpack::append_u64(Vec::new(), 5), vec![0x05]);
    assert_eq!(mpack::append_i64(Vec::new(), -1), vec![0xff]);
    assert_eq!(mpack::append_u64(Vec::new(), 200), vec![0xcc, 200]);
    assert_eq!(mpack::append_i64(Vec::new(), -100), vec![0xd0, 0x9c]);
}

#[test]
fn test_narrowing_reads_check_overflow() {
    // 200 fits u8 but not i8.
    let buf = mpack::append_u64(Vec::new(), 200);
    let mut dc = Reader::new(buf.as_slice());
    match dc.read_i8() {
        Err(DecodeError::IntOverflow { value, bits }) => {
            assert_eq!(value, 200);
            assert_eq!(bits, 8);
        }
        other => panic!("expected overflow, got {:?}", other),
    }

    // 100 fits both.
    let buf = mpack::append_u64(Vec::new(), 100);
    let (v, _) = mpack::read_i8_bytes(&buf).unwrap();
    assert_eq!(v, 100);

    // Negative values never become unsigned.
    let buf = mpack::append_i64(Vec::new(), -5);
    assert!(mpack::read_u32_bytes(&buf).is_err());
}

#[test]
fn test_bool_nil_round_trip() {
    let buf = encode_with(|en| {
        en.write_bool(true).unwrap();
        en.write_bool(false).unwrap();
        en.write_nil().unwrap();
    });
    let mut dc = Reader::new(buf.as_slice());
    assert!(dc.read_bool().unwrap());
    assert!(!dc.read_bool().unwrap());
    assert!(dc.is_nil().unwrap());
    dc.read_nil().unwrap();
}

#[test]
fn test_float_round_trip() {
    let buf = encode_with(|en| {
        en.write_f32(1.5).unwrap();
        en.write_f64(-2.25).unwrap();
    });
    let mut dc = Reader::new(buf.as_slice());
    assert_eq!(dc.read_f32().unwrap(), 1.5);
    assert_eq!(dc.read_f64().unwrap(), -2.25);

    // f32 widens into an f64 read.
    let buf = mpack::append_f32(Vec::new(), 0.5);
    let (f, _) = mpack::read_f64_bytes(&buf).unwrap();
    assert_eq!(f, 0.5);
}

#[test]
fn test_str_length_families() {
    for len in [0usize, 1, 31, 32, 255, 256, 70000] {
        let s: String = "x".repeat(len);
        let buf = encode_with(|en| en.write_str(&s).unwrap());
        let mut dc = Reader::new(buf.as_slice());
        assert_eq!(dc.read_str().unwrap(), s, "len {}", len);

        let buf2 = mpack::append_str(Vec::new(), &s);
        assert_eq!(buf, buf2);
        let (got, rest) = mpack::read_str_bytes(&buf2).unwrap();
        assert_eq!(got, s);
        assert!(rest.is_empty());
    }
}

#[test]
fn test_bytes_round_trip() {
    for len in [0usize, 1, 255, 256, 70000] {
        let b: Vec<u8> = (0..len).map(|i| i as u8).collect();
        let buf = encode_with(|en| en.write_bytes(&b).unwrap());
        let mut dc = Reader::new(buf.as_slice());
        let mut out = Vec::new();
        dc.read_bytes_into(&mut out).unwrap();
        assert_eq!(out, b);

        let encoded = mpack::append_bytes(Vec::new(), &b);
        let (got, rest) = mpack::read_bytes_bytes(&encoded).unwrap();
        assert_eq!(got, b);
        assert!(rest.is_empty());
    }
}

#[test]
fn test_exact_bytes() {
    let src = [1u8, 2, 3, 4];
    let buf = mpack::append_bytes(Vec::new(), &src);
    let mut dst = [0u8; 4];
    let rest = mpack::read_exact_bytes(&buf, &mut dst).unwrap();
    assert!(rest.is_empty());
    assert_eq!(dst, src);

    // Length mismatch surfaces the array error.
    let mut wrong = [0u8; 3];
    match mpack::read_exact_bytes(&buf, &mut wrong) {
        Err(DecodeError::ArrayLen { wanted: 3, got: 4 }) => {}
        other => panic!("expected ArrayLen, got {:?}", other),
    }
}

#[test]
fn test_header_families() {
    for sz in [0u32, 15, 16, 65535, 65536] {
        let buf = encode_with(|en| {
            en.write_map_header(sz).unwrap();
            en.write_array_header(sz).unwrap();
        });
        let mut dc = Reader::new(buf.as_slice());
        assert_eq!(dc.read_map_header().unwrap(), sz);
        assert_eq!(dc.read_array_header().unwrap(), sz);
    }
}

#[test]
fn test_complex_round_trip() {
    let c32 = Complex32::new(1.5, -0.25);
    let c64 = Complex64::new(-3.5, 42.0);
    let buf = encode_with(|en| {
        en.write_complex32(c32).unwrap();
        en.write_complex64(c64).unwrap();
    });
    assert_eq!(buf.len(), 10 + 18);
    let mut dc = Reader::new(buf.as_slice());
    assert_eq!(dc.read_complex32().unwrap(), c32);
    assert_eq!(dc.read_complex64().unwrap(), c64);

    let b = mpack::append_complex32(Vec::new(), c32);
    let (got, _) = mpack::read_complex32_bytes(&b).unwrap();
    assert_eq!(got, c32);
}

#[test]
fn test_time_round_trip() {
    let times = [
        UNIX_EPOCH,
        UNIX_EPOCH + Duration::new(1_600_000_000, 123_456_789),
        UNIX_EPOCH - Duration::from_nanos(1_500_000_000),
    ];
    for t in times {
        let buf = encode_with(|en| en.write_time(t).unwrap());
        assert_eq!(buf.len(), 15);
        let mut dc = Reader::new(buf.as_slice());
        assert_eq!(dc.read_time().unwrap(), t);

        let (got, _) = mpack::read_time_bytes(&mpack::append_time(Vec::new(), t)).unwrap();
        assert_eq!(got, t);
    }
}

#[test]
fn test_extension_round_trip() {
    let ext = RawExt::new(42, vec![9, 8, 7]);
    let buf = encode_with(|en| en.write_extension(&ext).unwrap());
    let mut dc = Reader::new(buf.as_slice());
    let mut got = RawExt::default();
    dc.read_extension(&mut got).unwrap();
    assert_eq!(got, ext);

    // Fixed-size payloads take the fixext encoding.
    let ext8 = RawExt::new(7, vec![0; 8]);
    let b = mpack::append_extension(Vec::new(), &ext8);
    assert_eq!(b[0], 0xd7);
    let mut got = RawExt::default();
    let rest = mpack::read_extension_bytes(&b, &mut got).unwrap();
    assert!(rest.is_empty());
    assert_eq!(got, ext8);
}

#[test]
fn test_skip_compound_objects() {
    // map { "a": [1, 2, "three"], "b": nil } followed by the sentinel 7
    let mut b = mpack::append_map_header(Vec::new(), 2);
    b = mpack::append_str(b, "a");
    b = mpack::append_array_header(b, 3);
    b = mpack::append_u64(b, 1);
    b = mpack::append_u64(b, 2);
    b = mpack::append_str(b, "three");
    b = mpack::append_str(b, "b");
    b = mpack::append_nil(b);
    b = mpack::append_u64(b, 7);

    let rest = mpack::skip_bytes(&b).unwrap();
    let (sentinel, rest) = mpack::read_u64_bytes(rest).unwrap();
    assert_eq!(sentinel, 7);
    assert!(rest.is_empty());

    let mut dc = Reader::new(b.as_slice());
    dc.skip().unwrap();
    assert_eq!(dc.read_u64().unwrap(), 7);
}

#[test]
fn test_value_round_trip() {
    let v = Value::Map(vec![
        ("num".into(), Value::Uint(9)),
        ("neg".into(), Value::Int(-4)),
        ("s".into(), Value::Str("hello".into())),
        ("arr".into(), Value::Array(vec![Value::Bool(true), Value::Nil])),
        ("bin".into(), Value::Bytes(vec![1, 2, 3])),
        ("ext".into(), Value::Ext(RawExt::new(9, vec![1]))),
        (
            "t".into(),
            Value::Time(UNIX_EPOCH + Duration::from_secs(10)),
        ),
    ]);

    let buf = encode_with(|en| en.write_value(&v).unwrap());
    assert!(buf.len() <= v.msg_size());
    let mut dc = Reader::new(buf.as_slice());
    assert_eq!(dc.read_value().unwrap(), v);

    let b = v.marshal_msg(Vec::new()).unwrap();
    let mut got = Value::default();
    let rest = got.unmarshal_msg(&b).unwrap();
    assert!(rest.is_empty());
    assert_eq!(got, v);
}

#[test]
fn test_raw_passthrough() {
    let mut inner = mpack::append_array_header(Vec::new(), 2);
    inner = mpack::append_str(inner, "x");
    inner = mpack::append_u64(inner, 3);

    let mut raw = Raw::default();
    let rest = raw.unmarshal_msg(&inner).unwrap();
    assert!(rest.is_empty());
    assert_eq!(raw.0, inner);

    let out = raw.marshal_msg(Vec::new()).unwrap();
    assert_eq!(out, inner);

    let mut dc = Reader::new(inner.as_slice());
    let mut raw2 = Raw::default();
    raw2.decode_msg(&mut dc).unwrap();
    assert_eq!(raw2.0, inner);

    // Empty Raw encodes as nil.
    assert_eq!(Raw::default().marshal_msg(Vec::new()).unwrap(), vec![0xc0]);
}

#[test]
fn test_number_equality_is_numeric() {
    // The wire cannot distinguish a non-negative Int from a Uint.
    assert_eq!(Number::Int(5), Number::Uint(5));
    assert_eq!(Number::default(), Number::Uint(0));
    assert_ne!(Number::Int(-1), Number::Uint(u64::MAX));
    assert_ne!(Number::F32(1.0), Number::F64(1.0));
}

#[test]
fn test_number_preserves_width() {
    let cases = [
        Number::Int(-9),
        Number::Uint(u64::MAX),
        Number::F32(1.5),
        Number::F64(-0.5),
    ];
    for n in cases {
        let b = n.marshal_msg(Vec::new()).unwrap();
        let mut got = Number::default();
        let rest = got.unmarshal_msg(&b).unwrap();
        assert!(rest.is_empty());
        assert_eq!(got, n);

        let buf = encode_with(|en| n.encode_msg(en).unwrap());
        let mut dc = Reader::new(buf.as_slice());
        let mut got = Number::default();
        got.decode_msg(&mut dc).unwrap();
        assert_eq!(got, n);
    }
}

#[test]
fn test_writer_flush_boundaries() {
    // Push well past the internal buffer size in small pieces.
    let piece = "0123456789abcdef";
    let buf = encode_with(|en| {
        en.write_array_header(600).unwrap();
        for _ in 0..600 {
            en.write_str(piece).unwrap();
        }
    });
    let mut dc = Reader::new(buf.as_slice());
    assert_eq!(dc.read_array_header().unwrap(), 600);
    for _ in 0..600 {
        assert_eq!(dc.read_str().unwrap(), piece);
    }
}

#[test]
fn test_map_key_reads() {
    let mut b = mpack::append_str(Vec::new(), "key");
    b = mpack::append_u64(b, 1);

    let (key, rest) = mpack::read_map_key_bytes(&b).unwrap();
    assert_eq!(key, b"key");
    let (v, _) = mpack::read_u64_bytes(rest).unwrap();
    assert_eq!(v, 1);

    let mut dc = Reader::new(b.as_slice());
    let mut scratch = Vec::new();
    dc.read_map_key(&mut scratch).unwrap();
    assert_eq!(scratch, b"key");
}
