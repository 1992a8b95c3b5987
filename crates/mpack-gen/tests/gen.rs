//! End-to-end tests for the generator: schema text in, generated code out.
//!
//! Every emitted buffer is additionally fed back through `syn::parse_file`,
//! so a test failure distinguishes "wrong shape" from "not even Rust".

use std::io::Write;

use mpack_gen::parser::{parse_str, ParsedSource};
use mpack_gen::{GeneratorSet, Method, Source};

fn full_mode() -> Method {
    Method::DECODE
        | Method::ENCODE
        | Method::MARSHAL
        | Method::UNMARSHAL
        | Method::SIZE
        | Method::TEST
}

/// Runs the whole pipeline over schema text, returning (main, tests) output.
fn generate(src: &str, mode: Method) -> (String, String) {
    let mut parsed = ParsedSource::default();
    parse_str(src, "test.rs", &mut parsed, false).expect("parse schema");
    let source = Source::from_parsed(parsed);
    assert!(
        !source.identities.is_empty(),
        "schema should produce identities"
    );

    let mut main: Vec<u8> = Vec::new();
    let mut tests: Vec<u8> = Vec::new();
    let mut gs = GeneratorSet::new(mode);
    source.apply_dirs(&mut gs);
    source
        .print_to(&mut gs, &mut main, Some(&mut tests as &mut dyn Write))
        .expect("emit");

    (
        String::from_utf8(main).expect("utf8"),
        String::from_utf8(tests).expect("utf8"),
    )
}

fn assert_parses(output: &str) {
    if let Err(e) = syn::parse_file(output) {
        panic!("generated code is not valid Rust: {}\n---\n{}", e, output);
    }
}

// S1: empty struct in map mode.
#[test]
fn empty_struct_emits_header_only() {
    let (main, tests) = generate("pub struct E {}", full_mode());
    assert_parses(&main);
    assert_parses(&tests);

    // encode: one bulk append holding the fixmap(0) header, nothing else
    assert!(main.contains("en.append(&[0x80])?;"), "output:\n{}", main);
    // decode: no scratch key buffer is declared
    assert!(!main.contains("let mut field"), "output:\n{}", main);
    // decode still drains unknown entries
    assert!(main.contains("dc.skip()?;"));
}

// S2: editing one type leaves a sibling type's generated code untouched.
#[test]
fn sibling_edit_does_not_perturb_output() {
    let a = r#"
use std::collections::HashMap;
pub struct SmallStruct {
    pub foo: String,
    pub bar: String,
    pub qux: String,
}
pub struct OtherStruct {
    pub str_field: String,
    pub num: u32,
    pub map: HashMap<String, String>,
}
"#;
    let b = r#"
use std::collections::HashMap;
pub struct SmallStruct {
    pub foo: String,
    pub bar: String,
    pub qux: String,
    pub added: u64,
}
pub struct OtherStruct {
    pub str_field: String,
    pub num: u32,
    pub map: HashMap<String, String>,
}
"#;
    let (out_a, _) = generate(a, full_mode());
    let (out_b, _) = generate(b, full_mode());
    assert_parses(&out_a);
    assert_parses(&out_b);

    // Types emit in ascending name order, so everything before the first
    // SmallStruct impl is OtherStruct's code (plus the shared header).
    let cut_a = out_a.find("impl SmallStruct").expect("SmallStruct emitted");
    let cut_b = out_b.find("impl SmallStruct").expect("SmallStruct emitted");
    assert_eq!(
        &out_a[..cut_a],
        &out_b[..cut_b],
        "OtherStruct's code must be byte-identical"
    );
}

// S3: alias chains collapse to a single level.
#[test]
fn alias_chain_collapses_to_base_size() {
    let src = r#"
pub struct A(pub u64);
pub struct B(pub A);
pub struct C(pub B);
pub struct D(pub C);
"#;
    let (main, _) = generate(src, Method::SIZE);
    assert_parses(&main);

    // Every link of the chain sizes as a u64.
    let d_impl = main.find("impl D").expect("D emitted");
    let d_block = &main[d_impl..];
    assert!(
        d_block.starts_with("impl D {\npub fn msg_size")
            || d_block.contains("pub fn msg_size"),
        "block:\n{}",
        d_block
    );
    assert!(d_block.contains("mpack::size::U64"));
}

// S4: shim in cast mode.
#[test]
fn cast_shim_rewrites_both_directions() {
    let src = r#"
//mpack:shim SpecialId as:Vec<u8> using:to_bytes/from_bytes mode:cast
pub struct T {
    pub id: SpecialId,
}
"#;
    let (main, _) = generate(src, full_mode());
    assert_parses(&main);

    // encode: the to-function feeds the bytes writer directly
    assert!(
        main.contains("en.write_bytes(&to_bytes(self.id))?;"),
        "output:\n{}",
        main
    );
    // decode: read into a temporary, assign through the from-function with
    // no error check
    let re = regex::Regex::new(r"self\.id = from_bytes\(z[a-h]\d{4}\);").unwrap();
    assert!(re.is_match(&main), "output:\n{}", main);
    let fallible = regex::Regex::new(r"from_bytes\(z[a-h]\d{4}\)\?").unwrap();
    assert!(!fallible.is_match(&main), "cast mode never checks an error");
}

// Convert-mode shims may target any recognized primitive spelling,
// including the dynamic and extension kinds; msg_size must not call
// length methods on the fallible conversion's Result.
#[test]
fn convert_shim_to_dynamic_kinds_sizes_through_the_result() {
    let src = r#"
//mpack:shim Wrapped as:Value using:to_value/from_value mode:convert
//mpack:shim Sealed as:RawExt using:to_ext/from_ext mode:convert
pub struct T {
    pub w: Wrapped,
    pub s: Sealed,
}
"#;
    let (main, _) = generate(src, full_mode());
    assert_parses(&main);

    // size: measure through the Result, bounding failures by the prefix
    assert!(
        main.contains("to_value(self.w).map(|v| v.msg_size()).unwrap_or(0)"),
        "output:\n{}",
        main
    );
    assert!(
        main.contains(
            "mpack::size::EXT_PREFIX + to_ext(self.s).map(|v| v.ext_len()).unwrap_or(0)"
        ),
        "output:\n{}",
        main
    );
    let broken = regex::Regex::new(r"unwrap_or\(0\)\.(msg_size|ext_len|len)\(\)").unwrap();
    assert!(!broken.is_match(&main), "output:\n{}", main);

    // the fallible pairs are threaded through typed temporaries elsewhere
    assert!(main.contains("= to_value(self.w)?;"));
    assert!(main.contains("= from_value(zb"));
    assert!(main.contains("dc.read_extension(&mut zb"));
}

// S5: fixed byte arrays take the blob shortcut.
#[test]
fn byte_array_shortcut_avoids_loops() {
    let src = "pub struct K { pub data: [u8; 32] }";
    let (main, _) = generate(src, Method::ENCODE | Method::DECODE | Method::SIZE);
    assert_parses(&main);

    assert!(
        main.contains("en.write_bytes(&(self.data)[..])?;"),
        "output:\n{}",
        main
    );
    assert!(main.contains("dc.read_exact_bytes(&mut (self.data)[..])?;"));
    assert!(!main.contains("write_array_header"), "no element loop header");
    assert!(!main.contains("for "), "no per-element loop:\n{}", main);
}

// S6: narrowing integer fields go through the overflow-checking readers.
#[test]
fn narrow_int_fields_use_checked_reads() {
    let src = "pub struct N { pub v: i8 }";
    let (main, _) = generate(src, Method::UNMARSHAL | Method::DECODE);
    assert_parses(&main);
    assert!(main.contains("mpack::read_i8_bytes(bts)?"), "output:\n{}", main);
    assert!(main.contains("dc.read_i8()?"));
}

// Property 7: tuple mode emits a fixed array header and declaration order.
#[test]
fn tuple_mode_emits_positional_array() {
    let src = r#"
//mpack:tuple Pair
pub struct Pair {
    pub first: u32,
    pub second: String,
}
"#;
    let (main, _) = generate(src, Method::ENCODE | Method::DECODE);
    assert_parses(&main);

    // fixarray(2) header, fused
    assert!(main.contains("en.append(&[0x92])?;"), "output:\n{}", main);
    // no field tags on the wire
    assert!(!main.contains("\"first\""));
    // decode asserts the declared arity
    assert!(main.contains("mpack::DecodeError::array_len(2,"));
    // field order: first's write precedes second's
    let first = main.find("write_u32(self.first)").expect("first field");
    let second = main.find("write_str(&self.second)").expect("second field");
    assert!(first < second);
}

// Properties 1 and 2: identifier disjointness between passes, uniqueness
// within a pass.
#[test]
fn minted_identifiers_never_collide() {
    let src = r#"
use std::collections::HashMap;
pub struct Rich {
    pub items: Vec<Vec<String>>,
    pub table: HashMap<String, Vec<u32>>,
    pub maybe: Option<HashMap<String, String>>,
    pub grid: [[u8; 4]; 4],
}
"#;
    let (main, _) = generate(src, full_mode());
    assert_parses(&main);

    let ident_re = regex::Regex::new(r"z[a-h]\d{4}").unwrap();
    let decl_re = regex::Regex::new(r"(?:let (?:mut )?|for |Some\(ref )(z[a-h]\d{4})").unwrap();

    // Split the output into one section per generated method.
    let mut sections: Vec<&str> = Vec::new();
    let mut starts: Vec<usize> = main.match_indices("\nimpl Rich {").map(|(i, _)| i).collect();
    starts.push(main.len());
    for w in starts.windows(2) {
        sections.push(&main[w[0]..w[1]]);
    }
    assert!(sections.len() >= 5, "expected one section per pass");

    let expected_prefixes = ["zb", "zc", "zd", "ze", "zf"];
    for (section, pass_prefix) in sections.iter().zip(expected_prefixes) {
        // Within a section, only the naming-walk prefix (za) and this
        // pass's own prefix may appear.
        for m in ident_re.find_iter(section) {
            let p = &m.as_str()[..2];
            assert!(
                p == "za" || p == pass_prefix,
                "section for {} contains foreign identifier {}:\n{}",
                pass_prefix,
                m.as_str(),
                section
            );
        }
        // No two declared identifiers in one section are equal.
        let mut declared: Vec<&str> = decl_re
            .captures_iter(section)
            .map(|c| c.get(1).map(|g| g.as_str()).unwrap_or_default())
            .collect();
        let total = declared.len();
        declared.sort_unstable();
        declared.dedup();
        assert_eq!(total, declared.len(), "duplicate declaration in:\n{}", section);
    }
}

// Per-pass ignore directives remove a type from that pass only.
#[test]
fn pass_scoped_ignore_skips_one_method() {
    let src = r#"
//mpack:encode ignore Skipped
pub struct Skipped {
    pub a: u32,
}
"#;
    let (main, _) = generate(src, Method::ENCODE | Method::DECODE);
    assert_parses(&main);
    assert!(!main.contains("encode_msg"), "output:\n{}", main);
    assert!(main.contains("decode_msg"));
}

// Struct-as-map encoding fuses the header and field tags into bulk appends.
#[test]
fn constant_bytes_are_fused() {
    let src = r#"
pub struct P {
    pub a: u32,
    pub b: String,
}
"#;
    let (main, _) = generate(src, Method::ENCODE);
    assert_parses(&main);
    // fixmap(2) + fixstr(1) "a" in one append
    assert!(
        main.contains("en.append(&[0x82, 0xa1, 0x61])?;"),
        "output:\n{}",
        main
    );
    // the second tag flushes separately, after field a's write
    assert!(main.contains("en.append(&[0xa1, 0x62])?;"));
}

// Nested containers compose: map values holding slices of options.
#[test]
fn nested_containers_generate_parseable_code() {
    let src = r#"
use std::collections::HashMap;
pub struct Deep {
    pub m: HashMap<String, Vec<Option<u64>>>,
    pub t: Option<SystemTime>,
    pub v: Value,
    pub c: Complex64,
    pub raw: mpack::Raw,
    pub num: mpack::Number,
}
"#;
    let (main, tests) = generate(src, full_mode());
    assert_parses(&main);
    assert_parses(&tests);

    assert!(main.contains("or_insert_with(Default::default)"));
    assert!(main.contains("write_time"));
    assert!(main.contains("write_value"));
    assert!(main.contains("write_complex64"));
    // library built-ins dispatch through their own methods
    assert!(main.contains(".encode_msg(en)?;"));
}

// The generated test file exercises both round-trip pairs.
#[test]
fn test_pass_emits_round_trips() {
    let src = "pub struct RoundTrip { pub a: u32 }";
    let (_, tests) = generate(src, full_mode());
    assert_parses(&tests);
    assert!(tests.contains("fn test_encode_decode_round_trip()"));
    assert!(tests.contains("fn test_marshal_unmarshal_round_trip()"));
    assert!(tests.contains("assert_eq!(decoded, v);"));
    assert!(tests.contains("RoundTrip::default()"));
}

// Receiver selection: small fixed structs go by value, mutating passes
// always borrow exclusively, arrays always borrow.
#[test]
fn receiver_selection_follows_the_heuristic() {
    let src = r#"
pub struct SmallFixed {
    pub a: u32,
    pub b: bool,
}
pub struct WithString {
    pub s: String,
}
"#;
    let (main, _) = generate(src, Method::ENCODE | Method::DECODE);
    assert_parses(&main);

    let small = section_of(&main, "SmallFixed");
    assert!(
        small.contains("pub fn encode_msg<W: std::io::Write>(self,"),
        "small fixed structs encode by value:\n{}",
        small
    );
    assert!(small.contains("pub fn decode_msg<R: std::io::Read>(&mut self,"));

    let with_string = section_of(&main, "WithString");
    assert!(
        with_string.contains("pub fn encode_msg<W: std::io::Write>(&self,"),
        "string fields force a borrowed receiver:\n{}",
        with_string
    );
}

fn section_of<'a>(main: &'a str, name: &str) -> &'a str {
    let marker = format!("impl {} {{", name);
    let start = main.find(&marker).expect("type emitted");
    let rest = &main[start..];
    rest
}
