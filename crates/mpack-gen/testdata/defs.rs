// All of the type definitions in this file are fed to the code generator by
// the run-level tests. A simple way to exercise a declaration is to add it
// here. Generated round-trip tests construct `Type::default()` and compare
// with `assert_eq!`, so every tested type derives Default, Debug, and
// PartialEq; TestType cannot (SystemTime has no Default) and is excluded
// from the test pass below.

//mpack:tuple Object
//mpack:ignore Hidden
//mpack:shim SpecialId as:String using:id_to_string/string_to_id mode:cast
//mpack:test ignore reg=^Empty TestType

use std::collections::HashMap;
use std::time::SystemTime;

#[derive(Debug, Default, PartialEq)]
pub struct Block(pub [u8; 32]);

#[derive(Debug, Default, PartialEq)]
pub struct Fixed {
    pub a: f64,
    pub b: bool,
}

#[derive(Debug, PartialEq)]
pub struct TestType {
    #[mpack(tag = "float")]
    pub f: Option<f64>,
    #[mpack(tag = "elements")]
    pub els: HashMap<String, String>,
    pub child: Option<Child>,
    pub time: SystemTime,
    pub any: Value,
    pub appended: mpack::Raw,
    pub num: mpack::Number,
    pub slice1: Vec<String>,
    pub data: Vec<u8>,
    pub id: SpecialId,
}

#[derive(Debug, Default, PartialEq)]
pub struct Child {
    pub values: [u8; 32],
    pub more: Block,
    pub matrix: Vec<Vec<i32>>,
    pub many_fixed: Vec<Fixed>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Object {
    #[mpack(tag = "objno")]
    pub object_no: String,
    pub slice1: Vec<String>,
    pub map_map: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Default, PartialEq)]
pub struct Things {
    #[mpack(tag = "complex")]
    pub cmplx: Complex32,
    #[mpack(tag = "values")]
    pub vals: Vec<i32>,
    pub arr2: [f64; 4],
    #[mpack(tag = "ext", extension)]
    pub ext: Option<RawExt>,
    #[mpack(tag = "oext", extension)]
    pub oext: RawExt,
}

// A recursive type; the reference must stay behind a method call.
#[derive(Debug, Default, PartialEq)]
pub struct Node {
    pub children: Vec<Node>,
    pub other: String,
}

// Dependency resolution across a chain.
#[derive(Debug, Default, PartialEq)]
pub struct IntA(pub i64);
#[derive(Debug, Default, PartialEq)]
pub struct IntB(pub IntA);
#[derive(Debug, Default, PartialEq)]
pub struct IntC(pub IntB);

// Removed entirely by the ignore directive.
#[derive(Debug, Default, PartialEq)]
pub struct Hidden {
    pub a: String,
}

#[derive(Debug, Default, PartialEq)]
pub struct EmptyStruct {}
