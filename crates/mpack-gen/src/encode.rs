//! The streaming-encoder pass.

use std::io::{self, Write};

use crate::emit::{apply_all, imut_receiver, next, Generator, Method, Printer, Traversal, TransformPass};
use crate::ir::{coerce_array_size, Array, BaseElem, Elem, GenCtx, Kind, Map, Ptr, ShimMode, Slice, Struct};

pub(crate) struct EncodeGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl EncodeGen {
    pub fn new() -> Self {
        EncodeGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for EncodeGen {
    fn method(&self) -> Method {
        Method::ENCODE
    }

    fn prefix(&self) -> &'static str {
        "zc"
    }

    fn add(&mut self, t: TransformPass) {
        self.transforms.push(t);
    }

    fn execute(&mut self, el: &Elem, w: &mut dyn Write, ctx: &mut GenCtx) -> io::Result<()> {
        if self.dead {
            return Ok(());
        }
        let Some(mut el) = apply_all(&self.transforms, el.clone()) else {
            return Ok(());
        };
        if !el.is_printable() {
            return Ok(());
        }

        let recv = imut_receiver(&mut el, ctx);
        let mut st = EncodeState {
            p: Printer::new(w),
            ctx,
            fuse: Vec::new(),
        };
        st.p.comment("encode_msg writes the value to a streaming MessagePack writer");
        st.p.print(&format!("\nimpl {} {{", el.type_name()));
        st.p.print(&format!(
            "\npub fn encode_msg<W: std::io::Write>({}, en: &mut mpack::Writer<W>) -> Result<(), mpack::EncodeError> {{",
            recv
        ));
        next(&mut st, &el);
        st.fuse_hook();
        st.p.print("\nOk(())\n}\n}\n");
        if let Some(e) = st.p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}

struct EncodeState<'w, 'c> {
    p: Printer<'w>,
    ctx: &'c mut GenCtx,
    fuse: Vec<u8>,
}

impl EncodeState<'_, '_> {
    /// Buffers constant header/tag bytes; adjacent constants flush as one
    /// bulk append.
    fn fuse(&mut self, bts: &[u8]) {
        self.fuse.extend_from_slice(bts);
    }

    fn fuse_hook(&mut self) {
        if !self.fuse.is_empty() {
            let bts = std::mem::take(&mut self.fuse);
            self.append_raw(&bts);
        }
    }

    fn append_raw(&mut self, bts: &[u8]) {
        let mut lit = String::new();
        for (i, b) in bts.iter().enumerate() {
            if i > 0 {
                lit.push_str(", ");
            }
            lit.push_str(&format!("0x{:02x}", b));
        }
        self.p.print(&format!("\nen.append(&[{}])?;", lit));
    }

    fn write_call(&mut self, suffix: &str, arg: &str) {
        self.p.print(&format!("\nen.write_{}({})?;", suffix, arg));
    }

    fn struct_as_tuple(&mut self, s: &Struct) {
        let nfields = s.fields.len();
        let data = mpack::append_array_header(Vec::new(), nfields as u32);
        self.p.comment(&format!("array header, size {}", nfields));
        self.fuse(&data);
        if s.fields.is_empty() {
            self.fuse_hook();
        }
        for f in &s.fields {
            if !self.p.ok() {
                return;
            }
            next(self, &f.field_elem);
        }
    }

    fn struct_as_map(&mut self, s: &Struct) {
        let nfields = s.fields.len();
        let data = mpack::append_map_header(Vec::new(), nfields as u32);
        self.p.comment(&format!("map header, size {}", nfields));
        self.fuse(&data);
        if s.fields.is_empty() {
            self.fuse_hook();
        }
        for f in &s.fields {
            if !self.p.ok() {
                return;
            }
            let data = mpack::append_str(Vec::new(), &f.field_tag);
            self.p.comment(&format!("write {:?}", f.field_tag));
            self.fuse(&data);
            next(self, &f.field_elem);
        }
    }
}

impl Traversal for EncodeState<'_, '_> {
    fn g_struct(&mut self, s: &Struct) {
        if !self.p.ok() {
            return;
        }
        if s.as_tuple {
            self.struct_as_tuple(s);
        } else {
            self.struct_as_map(s);
        }
    }

    fn g_map(&mut self, m: &Map) {
        if !self.p.ok() {
            return;
        }
        self.fuse_hook();
        let vn = m.varname();
        self.write_call("map_header", &format!("{}.len() as u32", vn));
        self.p.print(&format!(
            "\nfor ({}, {}) in {}.iter() {{",
            m.key_idx, m.val_idx, vn
        ));
        self.write_call("str", &m.key_idx);
        next(self, &m.value);
        self.p.close_block();
    }

    fn g_ptr(&mut self, p: &Ptr) {
        if !self.p.ok() {
            return;
        }
        self.fuse_hook();
        self.p.print(&format!("\nmatch {} {{", p.varname()));
        self.p.print("\nNone => {\nen.write_nil()?;\n}");
        if p.needs_init() {
            self.p.print(&format!("\nSome(ref {}) => {{", p.bind));
        } else {
            self.p.print("\nSome(_) => {");
        }
        next(self, &p.value);
        self.p.close_block();
        self.p.close_block();
    }

    fn g_slice(&mut self, s: &Slice) {
        if !self.p.ok() {
            return;
        }
        self.fuse_hook();
        let vn = s.varname();
        self.write_call("array_header", &format!("{}.len() as u32", vn));
        self.p.print(&format!("\nfor {} in 0..{}.len() {{", s.index, vn));
        next(self, &s.els);
        self.p.close_block();
    }

    fn g_array(&mut self, a: &Array) {
        if !self.p.ok() {
            return;
        }
        self.fuse_hook();
        // shortcut for byte arrays; converted elements still need the loop
        if let Elem::Base(b) = a.els.as_ref() {
            if matches!(b.kind, Kind::Byte | Kind::U8) && !b.convert {
                self.p
                    .print(&format!("\nen.write_bytes(&({})[..])?;", a.varname()));
                return;
            }
        }
        self.write_call("array_header", &coerce_array_size(&a.size));
        self.p
            .print(&format!("\nfor {} in 0..{}.len() {{", a.index, a.varname()));
        next(self, &a.els);
        self.p.close_block();
    }

    fn g_base(&mut self, b: &BaseElem) {
        if !self.p.ok() {
            return;
        }
        self.fuse_hook();
        let mut arg = b.varname().to_string();
        if b.convert {
            match b.shim_mode {
                ShimMode::Cast => arg = b.to_base_expr(),
                ShimMode::Convert => {
                    let tmp = self.ctx.next_ident();
                    self.p.print(&format!(
                        "\nlet {}: {} = {}?;",
                        tmp,
                        b.base_type(),
                        b.to_base_expr()
                    ));
                    arg = tmp;
                }
            }
        }

        match b.kind {
            Kind::Ident => {
                self.p.print(&format!("\n{}.encode_msg(en)?;", arg));
            }
            Kind::Ext => {
                // A converted value is an owned temporary, never a binding.
                let arg = if b.varname_is_ref() && !b.convert {
                    arg
                } else {
                    format!("&{}", arg)
                };
                self.p.print(&format!("\nen.write_extension({})?;", arg));
            }
            k if k.written_by_ref() => self.write_call(k.suffix(), &format!("&{}", arg)),
            k => self.write_call(k.suffix(), &arg),
        }
    }
}
