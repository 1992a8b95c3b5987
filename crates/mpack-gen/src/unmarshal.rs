//! The buffer-oriented unmarshal pass. Mirrors the streaming decoder; reads
//! from a byte slice and returns the remainder.

use std::io::{self, Write};

use crate::emit::{
    apply_all, assign_place, mut_receiver, next, Generator, Method, Printer, Traversal,
    TransformPass,
};
use crate::ir::{coerce_array_size, Array, BaseElem, Elem, GenCtx, Kind, Map, Ptr, ShimMode, Slice, Struct};

pub(crate) struct UnmarshalGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl UnmarshalGen {
    pub fn new() -> Self {
        UnmarshalGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for UnmarshalGen {
    fn method(&self) -> Method {
        Method::UNMARSHAL
    }

    fn prefix(&self) -> &'static str {
        "ze"
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

        let recv = mut_receiver(&mut el, ctx);
        let mut st = UnmarshalState {
            p: Printer::new(w),
            ctx,
            has_field: false,
        };
        st.p
            .comment("unmarshal_msg reads the value from a byte slice, returning the remainder");
        st.p.print(&format!("\nimpl {} {{", el.type_name()));
        st.p.print(&format!(
            "\npub fn unmarshal_msg<'a>({}, bts: &'a [u8]) -> Result<&'a [u8], mpack::DecodeError> {{",
            recv
        ));
        st.p.print("\nlet mut bts = bts;");
        next(&mut st, &el);
        st.p.print("\nOk(bts)\n}\n}\n");
        if let Some(e) = st.p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}

struct UnmarshalState<'w, 'c> {
    p: Printer<'w>,
    ctx: &'c mut GenCtx,
    has_field: bool,
}

impl UnmarshalState<'_, '_> {
    /// Reads a header or key into a fresh binding, threading `bts`.
    fn read_fresh(&mut self, name: &str, mutable: bool, suffix: &str) {
        let rest = self.ctx.next_ident();
        let m = if mutable { "mut " } else { "" };
        self.p.print(&format!(
            "\nlet ({}{}, {}) = mpack::read_{}_bytes(bts)?;\nbts = {};",
            m, name, rest, suffix, rest
        ));
    }

    /// Reads into an existing place via destructuring assignment.
    fn assign_read(&mut self, place: &str, suffix: &str) {
        self.p.print(&format!(
            "\n({}, bts) = mpack::read_{}_bytes(bts)?;",
            assign_place(place),
            suffix
        ));
    }

    fn struct_as_tuple(&mut self, s: &Struct) {
        let sz = self.ctx.next_ident();
        self.read_fresh(&sz, false, "array_header");
        self.p.array_check(&s.fields.len().to_string(), &sz);
        for f in &s.fields {
            if !self.p.ok() {
                return;
            }
            next(self, &f.field_elem);
        }
    }

    fn struct_as_map(&mut self, s: &Struct) {
        if !self.has_field && !s.fields.is_empty() {
            self.p.print("\nlet mut field: &[u8] = &[];");
            self.has_field = true;
        }

        let sz = self.ctx.next_ident();
        self.read_fresh(&sz, true, "map_header");
        self.p.print(&format!("\nwhile {} > 0 {{", sz));
        self.p.print(&format!("\n{} -= 1;", sz));
        if s.fields.is_empty() {
            // No keys to compare; skip the key and the value.
            self.p.print("\nbts = mpack::skip_bytes(bts)?;");
            self.p.print("\nbts = mpack::skip_bytes(bts)?;");
            self.p.close_block();
            return;
        }
        self.p
            .print("\n(field, bts) = mpack::read_map_key_bytes(bts)?;");
        self.p.print("\nmatch field {");
        for f in &s.fields {
            if !self.p.ok() {
                return;
            }
            self.p.print(&format!("\nb{:?} => {{", f.field_tag));
            next(self, &f.field_elem);
            self.p.close_block();
        }
        self.p.print("\n_ => {\nbts = mpack::skip_bytes(bts)?;\n}");
        self.p.close_block(); // match
        self.p.close_block(); // while
    }
}

impl Traversal for UnmarshalState<'_, '_> {
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

    fn g_base(&mut self, b: &BaseElem) {
        if !self.p.ok() {
            return;
        }
        let vn = b.varname().to_string();

        if b.convert {
            self.p.print("\n{");
            let tmp = self.ctx.next_ident();
            match b.kind {
                Kind::Bytes => {
                    self.p.declare(&tmp, "Vec<u8>");
                    self.assign_read(&tmp, "bytes");
                }
                Kind::Ext => {
                    self.p.declare(&tmp, &b.base_type());
                    self.p.print(&format!(
                        "\nbts = mpack::read_extension_bytes(bts, &mut {})?;",
                        tmp
                    ));
                }
                Kind::Ident => {
                    self.p.declare(&tmp, &b.base_type());
                    self.p.print(&format!("\nbts = {}.unmarshal_msg(bts)?;", tmp));
                }
                k => {
                    self.p.declare(&tmp, &b.base_type());
                    self.assign_read(&tmp, k.suffix());
                }
            }
            match b.shim_mode {
                ShimMode::Cast => {
                    self.p
                        .print(&format!("\n{} = {};", vn, b.from_base_expr(&tmp)));
                }
                ShimMode::Convert => {
                    self.p
                        .print(&format!("\n{} = {}?;", vn, b.from_base_expr(&tmp)));
                }
            }
            self.p.print("\n}");
            return;
        }

        match b.kind {
            Kind::Ident => {
                self.p.print(&format!("\nbts = {}.unmarshal_msg(bts)?;", vn));
            }
            Kind::Ext => {
                let arg = if b.varname_is_ref() {
                    vn
                } else {
                    format!("&mut {}", vn)
                };
                self.p
                    .print(&format!("\nbts = mpack::read_extension_bytes(bts, {})?;", arg));
            }
            k => self.assign_read(&vn, k.suffix()),
        }
    }

    fn g_map(&mut self, m: &Map) {
        if !self.p.ok() {
            return;
        }
        let vn = m.varname();
        let sz = self.ctx.next_ident();
        self.read_fresh(&sz, true, "map_header");
        self.p.clear_map(vn);
        self.p.print(&format!("\nwhile {} > 0 {{", sz));
        self.p.print(&format!("\n{} -= 1;", sz));
        self.read_fresh(&m.key_idx, false, "str");
        self.p.print(&format!(
            "\nlet {} = {}.entry({}).or_insert_with(Default::default);",
            m.val_idx, vn, m.key_idx
        ));
        next(self, &m.value);
        self.p.close_block();
    }

    fn g_slice(&mut self, s: &Slice) {
        if !self.p.ok() {
            return;
        }
        let vn = s.varname();
        let sz = self.ctx.next_ident();
        self.read_fresh(&sz, false, "array_header");
        self.p.resize_slice(vn, &sz);
        self.p.print(&format!("\nfor {} in 0..{}.len() {{", s.index, vn));
        next(self, &s.els);
        self.p.close_block();
    }

    fn g_array(&mut self, a: &Array) {
        if !self.p.ok() {
            return;
        }
        // shortcut for byte arrays; converted elements still need the loop
        if let Elem::Base(b) = a.els.as_ref() {
            if matches!(b.kind, Kind::Byte | Kind::U8) && !b.convert {
                self.p.print(&format!(
                    "\nbts = mpack::read_exact_bytes(bts, &mut ({})[..])?;",
                    a.varname()
                ));
                return;
            }
        }
        let sz = self.ctx.next_ident();
        self.read_fresh(&sz, false, "array_header");
        self.p.array_check(&coerce_array_size(&a.size), &sz);
        self.p
            .print(&format!("\nfor {} in 0..{}.len() {{", a.index, a.varname()));
        next(self, &a.els);
        self.p.close_block();
    }

    fn g_ptr(&mut self, p: &Ptr) {
        if !self.p.ok() {
            return;
        }
        let vn = p.varname();
        self.p.print("\nif mpack::is_nil_bytes(bts) {");
        self.p.print("\nbts = mpack::read_nil_bytes(bts)?;");
        self.p.print(&format!("\n{} = None;", vn));
        self.p.print("\n} else {");
        if p.needs_init() {
            self.p.print(&format!(
                "\nlet {} = {}.get_or_insert_with(Default::default);",
                p.bind, vn
            ));
        }
        next(self, &p.value);
        self.p.close_block();
    }
}
