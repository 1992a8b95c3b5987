//! The streaming-decoder pass.

use std::io::{self, Write};

use crate::emit::{apply_all, mut_receiver, next, Generator, Method, Printer, Traversal, TransformPass};
use crate::ir::{coerce_array_size, Array, BaseElem, Elem, GenCtx, Kind, Map, Ptr, ShimMode, Slice, Struct};

pub(crate) struct DecodeGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl DecodeGen {
    pub fn new() -> Self {
        DecodeGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for DecodeGen {
    fn method(&self) -> Method {
        Method::DECODE
    }

    fn prefix(&self) -> &'static str {
        "zb"
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
        let mut st = DecodeState {
            p: Printer::new(w),
            ctx,
            has_field: false,
        };
        st.p.comment("decode_msg reads the value from a streaming MessagePack reader");
        st.p.print(&format!("\nimpl {} {{", el.type_name()));
        st.p.print(&format!(
            "\npub fn decode_msg<R: std::io::Read>({}, dc: &mut mpack::Reader<R>) -> Result<(), mpack::DecodeError> {{",
            recv
        ));
        next(&mut st, &el);
        st.p.print("\nOk(())\n}\n}\n");
        if let Some(e) = st.p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}

struct DecodeState<'w, 'c> {
    p: Printer<'w>,
    ctx: &'c mut GenCtx,
    has_field: bool,
}

impl DecodeState<'_, '_> {
    fn struct_as_tuple(&mut self, s: &Struct) {
        let nfields = s.fields.len();
        let sz = self.ctx.next_ident();
        self.p
            .print(&format!("\nlet {} = dc.read_array_header()?;", sz));
        self.p.array_check(&nfields.to_string(), &sz);
        for f in &s.fields {
            if !self.p.ok() {
                return;
            }
            next(self, &f.field_elem);
        }
    }

    fn struct_as_map(&mut self, s: &Struct) {
        if !self.has_field && !s.fields.is_empty() {
            self.p.declare("field", "Vec<u8>");
            self.has_field = true;
        }

        let sz = self.ctx.next_ident();
        self.p
            .print(&format!("\nlet mut {} = dc.read_map_header()?;", sz));
        self.p.print(&format!("\nwhile {} > 0 {{", sz));
        self.p.print(&format!("\n{} -= 1;", sz));
        if s.fields.is_empty() {
            // No keys to compare; skip the key and the value.
            self.p.print("\ndc.skip()?;");
            self.p.print("\ndc.skip()?;");
            self.p.close_block();
            return;
        }
        self.p.print("\ndc.read_map_key(&mut field)?;");
        self.p.print("\nmatch field.as_slice() {");
        for f in &s.fields {
            self.p.print(&format!("\nb{:?} => {{", f.field_tag));
            next(self, &f.field_elem);
            if !self.p.ok() {
                return;
            }
            self.p.close_block();
        }
        self.p.print("\n_ => {\ndc.skip()?;\n}");
        self.p.close_block(); // match
        self.p.close_block(); // while
    }
}

impl Traversal for DecodeState<'_, '_> {
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
                    self.p
                        .print(&format!("\ndc.read_bytes_into(&mut {})?;", tmp));
                }
                Kind::Ext => {
                    self.p.declare(&tmp, &b.base_type());
                    self.p
                        .print(&format!("\ndc.read_extension(&mut {})?;", tmp));
                }
                Kind::Ident => {
                    self.p.declare(&tmp, &b.base_type());
                    self.p.print(&format!("\n{}.decode_msg(dc)?;", tmp));
                }
                k => {
                    self.p.print(&format!(
                        "\nlet {}: {} = dc.read_{}()?;",
                        tmp,
                        b.base_type(),
                        k.suffix()
                    ));
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
            Kind::Bytes => {
                self.p
                    .print(&format!("\ndc.read_bytes_into(&mut {})?;", vn));
            }
            Kind::Ident => {
                self.p.print(&format!("\n{}.decode_msg(dc)?;", vn));
            }
            Kind::Ext => {
                let arg = if b.varname_is_ref() {
                    vn
                } else {
                    format!("&mut {}", vn)
                };
                self.p.print(&format!("\ndc.read_extension({})?;", arg));
            }
            k => {
                self.p
                    .print(&format!("\n{} = dc.read_{}()?;", vn, k.suffix()));
            }
        }
    }

    fn g_map(&mut self, m: &Map) {
        if !self.p.ok() {
            return;
        }
        let vn = m.varname();
        let sz = self.ctx.next_ident();
        self.p
            .print(&format!("\nlet mut {} = dc.read_map_header()?;", sz));
        self.p.clear_map(vn);
        self.p.print(&format!("\nwhile {} > 0 {{", sz));
        self.p.print(&format!("\n{} -= 1;", sz));
        self.p
            .print(&format!("\nlet {} = dc.read_str()?;", m.key_idx));
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
        self.p
            .print(&format!("\nlet {} = dc.read_array_header()?;", sz));
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
                    "\ndc.read_exact_bytes(&mut ({})[..])?;",
                    a.varname()
                ));
                return;
            }
        }
        let sz = self.ctx.next_ident();
        self.p
            .print(&format!("\nlet {} = dc.read_array_header()?;", sz));
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
        self.p.print("\nif dc.is_nil()? {");
        self.p.print("\ndc.read_nil()?;");
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
