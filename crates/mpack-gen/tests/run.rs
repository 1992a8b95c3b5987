//! Run-level tests over the sample schema in `testdata/`.

use std::path::{Path, PathBuf};

use mpack_gen::run::RunError;
use mpack_gen::{run_data, Method};

fn sample_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata/defs.rs")
}

fn full_mode() -> Method {
    Method::DECODE
        | Method::ENCODE
        | Method::MARSHAL
        | Method::UNMARSHAL
        | Method::SIZE
        | Method::TEST
}

#[test]
fn sample_schema_generates_all_methods() {
    let out = run_data(&sample_path(), full_mode(), false).expect("run_data");
    let main = String::from_utf8(out.main).expect("utf8");
    let tests = String::from_utf8(out.tests.expect("tests requested")).expect("utf8");

    if let Err(e) = syn::parse_file(&main) {
        panic!("generated module is not valid Rust: {}\n{}", e, main);
    }
    if let Err(e) = syn::parse_file(&tests) {
        panic!("generated tests are not valid Rust: {}\n{}", e, tests);
    }

    // Header: provenance comment plus forwarded imports.
    assert!(main.starts_with("// Code generated by mpack-gen"));
    assert!(main.contains("use super::*;"));
    assert!(main.contains("use std::collections::HashMap;"));
    assert!(main.contains("use std::time::SystemTime;"));

    // The ignore directive removed the type entirely.
    assert!(!main.contains("impl Hidden"));

    // The tuple directive emits a positional header (3 fields).
    assert!(main.contains("en.append(&[0x93])?;"), "output:\n{}", main);

    // The shim rewrites the field through its conversion functions.
    assert!(main.contains("id_to_string(self.id)"));
    assert!(main.contains("string_to_id("));

    // The alias chain bottoms out at i64.
    let intc = main.find("impl IntC {\npub fn msg_size").expect("IntC sized");
    assert!(main[intc..].contains("mpack::size::I64"));

    // The recursive type survives with its reference behind a method call.
    assert!(main.contains("impl Node"));
    assert!(main.contains(".encode_msg(en)?;"));

    // Inlined small types: Block's byte array flattens into Child.
    assert!(main.contains("en.write_bytes(&(self.more.0)[..])?;"), "output:\n{}", main);

    // Extensions, time, any-values, and built-ins all dispatch.
    assert!(main.contains("write_extension"));
    assert!(main.contains("write_time(self.time)"));
    assert!(main.contains("write_value(&self.any)"));
    assert!(main.contains("self.appended.encode_msg(en)?;"));
    assert!(main.contains("self.num.encode_msg(en)?;"));

    // Round-trip tests exist for kept types but not for the test-ignored
    // ones (EmptyStruct by pattern, TestType because it cannot derive
    // Default).
    assert!(tests.contains("fn test_encode_decode_fixed()"));
    assert!(tests.contains("fn test_marshal_unmarshal_object()"));
    assert!(!tests.contains("empty_struct"));
    assert!(!tests.contains("test_type"));
}

#[test]
fn test_only_mode_is_rejected() {
    match run_data(&sample_path(), Method::TEST, false) {
        Err(RunError::NoMethods) => {}
        other => panic!("expected NoMethods, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn fully_ignored_schema_reports_no_types() {
    let path = std::env::temp_dir().join(format!("mpack_gen_empty_{}.rs", std::process::id()));
    std::fs::write(&path, "//mpack:ignore Only\npub struct Only { pub a: u32 }\n")
        .expect("write temp schema");
    let res = run_data(&path, full_mode(), false);
    let _ = std::fs::remove_file(&path);
    match res {
        Err(RunError::NoTypes) => {}
        other => panic!("expected NoTypes, got {:?}", other.map(|_| ())),
    }
}
