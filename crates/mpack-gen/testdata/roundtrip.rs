// Schema for the compile-level smoke test. This file is both generator
// input and real Rust: the test builds a scratch crate from it plus the
// generated output, so every type derives Default, Debug, and PartialEq
// (and Copy where the by-value receiver applies) and no inert `#[mpack]`
// attributes appear.

//mpack:tuple Pair

use std::collections::HashMap;

#[derive(Debug, Default, PartialEq)]
pub struct Scalars {
    pub a: u8,
    pub b: i32,
    pub c: u64,
    pub d: bool,
    pub e: f64,
}

#[derive(Debug, Default, PartialEq)]
pub struct Holder {
    pub name: String,
    pub data: Vec<u8>,
    pub items: Vec<u32>,
    pub table: HashMap<String, String>,
    pub maybe: Option<String>,
    pub fixed: [u8; 4],
    pub id: Ident64,
    pub any: mpack::Value,
    pub ext: mpack::RawExt,
    pub num: mpack::Number,
}

#[derive(Debug, Default, PartialEq)]
pub struct Ident64(pub u64);

#[derive(Debug, Default, PartialEq)]
pub struct Pair {
    pub first: u32,
    pub second: String,
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct Tiny {
    pub x: u16,
    pub y: bool,
}
