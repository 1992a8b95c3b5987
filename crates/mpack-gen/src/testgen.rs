//! Round-trip test generation: one pass for the streaming pair and one for
//! the buffer pair. Each generated test seeds a default value, encodes it,
//! decodes into a fresh value, and asserts structural equality.
//!
//! Generated tests construct `{Type}::default()` and compare with
//! `assert_eq!`, so every tested schema type must derive (or implement)
//! `Default`, `Debug`, and `PartialEq`. Types that cannot (a field with no
//! `Default`, say) are excluded with a `//mpack:test ignore` directive.

use std::io::{self, Write};

use crate::emit::{apply_all, snake_case, Generator, Method, Printer, TransformPass};
use crate::ir::{Elem, GenCtx};

pub(crate) struct EncodeTestGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl EncodeTestGen {
    pub fn new() -> Self {
        EncodeTestGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for EncodeTestGen {
    fn method(&self) -> Method {
        Method::ENCODE_TEST
    }

    fn prefix(&self) -> &'static str {
        "zh"
    }

    fn add(&mut self, t: TransformPass) {
        self.transforms.push(t);
    }

    fn execute(&mut self, el: &Elem, w: &mut dyn Write, _ctx: &mut GenCtx) -> io::Result<()> {
        if self.dead {
            return Ok(());
        }
        let Some(el) = apply_all(&self.transforms, el.clone()) else {
            return Ok(());
        };
        if !el.is_printable() {
            return Ok(());
        }

        let name = el.type_name();
        let mut p = Printer::new(w);
        p.print(&format!(
            "\n#[test]\nfn test_encode_decode_{}() {{",
            snake_case(&name)
        ));
        p.print(&format!("\nlet v = {}::default();", name));
        p.print("\nlet mut buf = Vec::new();");
        p.print("\n{");
        p.print("\nlet mut en = mpack::Writer::new(&mut buf);");
        p.print("\nv.encode_msg(&mut en).expect(\"encode\");");
        p.print("\nen.flush().expect(\"flush\");");
        p.print("\n}");
        p.print(&format!("\nlet mut decoded = {}::default();", name));
        p.print("\nlet mut dc = mpack::Reader::new(buf.as_slice());");
        p.print("\ndecoded.decode_msg(&mut dc).expect(\"decode\");");
        p.print("\nassert_eq!(decoded, v);");
        p.print("\n}\n");
        if let Some(e) = p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}

pub(crate) struct MarshalTestGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl MarshalTestGen {
    pub fn new() -> Self {
        MarshalTestGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for MarshalTestGen {
    fn method(&self) -> Method {
        Method::MARSHAL_TEST
    }

    fn prefix(&self) -> &'static str {
        "zg"
    }

    fn add(&mut self, t: TransformPass) {
        self.transforms.push(t);
    }

    fn execute(&mut self, el: &Elem, w: &mut dyn Write, _ctx: &mut GenCtx) -> io::Result<()> {
        if self.dead {
            return Ok(());
        }
        let Some(el) = apply_all(&self.transforms, el.clone()) else {
            return Ok(());
        };
        if !el.is_printable() {
            return Ok(());
        }

        let name = el.type_name();
        let mut p = Printer::new(w);
        p.print(&format!(
            "\n#[test]\nfn test_marshal_unmarshal_{}() {{",
            snake_case(&name)
        ));
        p.print(&format!("\nlet v = {}::default();", name));
        p.print("\nlet bts = v.marshal_msg(Vec::new()).expect(\"marshal\");");
        p.print("\nassert!(bts.len() <= v.msg_size());");
        p.print(&format!("\nlet mut decoded = {}::default();", name));
        p.print("\nlet rest = decoded.unmarshal_msg(&bts).expect(\"unmarshal\");");
        p.print("\nassert!(rest.is_empty());");
        p.print("\nassert_eq!(decoded, v);");
        p.print("\n}\n");
        if let Some(e) = p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}
