//! # mpack-gen
//!
//! A code generator that reads Rust type declarations and emits hand-rolled
//! MessagePack serialization code against the `mpack` runtime.
//!
//! For every recognized named type the generator can produce five routine
//! families plus round-trip tests:
//!
//! - `decode_msg` / `encode_msg`: streaming, over `mpack::Reader`/`Writer`
//! - `unmarshal_msg` / `marshal_msg`: buffer-oriented, over byte slices
//! - `msg_size`: an upper-bound size estimate
//!
//! ## Pipeline
//!
//! 1. `parser`: scan directives, collect `use` items, and gather raw type
//!    declarations with `syn`.
//! 2. `source`: build the type-model IR, resolve alias chains to a fixpoint,
//!    apply directives, and inline small referenced types.
//! 3. `emit` + the six pass modules: walk the IR once per requested method
//!    and print the routines.
//!
//! ## Modules
//!
//! - `ir`: the type-model intermediate representation
//! - `parser`: syn-based collection of raw declarations and directives
//! - `source`: IR builder, alias resolver, directive application
//! - `directives`: the `//mpack:` directive handlers and name patterns
//! - `inline`: shim substitution and small-type inlining
//! - `emit`: method mask, generator set, shared printing scaffolding
//! - `decode`, `encode`, `marshal`, `unmarshal`, `sizes`, `testgen`: passes
//! - `run`: file-level entry points

pub mod decode;
pub mod diag;
pub mod directives;
pub mod emit;
pub mod encode;
pub mod inline;
pub mod ir;
pub mod logger;
pub mod marshal;
pub mod parser;
pub mod run;
pub mod sizes;
pub mod source;
pub mod testgen;
pub mod unmarshal;

pub use emit::{GeneratorSet, Method, TransformPass};
pub use ir::{BaseElem, Elem, GenCtx, Kind, ShimMode};
pub use run::{run, run_data};
pub use source::Source;
