//! The size-estimation pass. Emits `msg_size`, an upper bound on the
//! encoded size. Adjacent constant contributions are merged into a single
//! `s += ...` statement, and fixed-size containers collapse to a product
//! instead of a loop.

use std::io::{self, Write};

use crate::emit::{apply_all, imut_receiver, next, Generator, Method, Printer, Traversal, TransformPass};
use crate::ir::{Array, BaseElem, Elem, GenCtx, Kind, Map, Ptr, ShimMode, Slice, Struct};

pub(crate) struct SizesGen {
    transforms: Vec<TransformPass>,
    dead: bool,
}

impl SizesGen {
    pub fn new() -> Self {
        SizesGen {
            transforms: Vec::new(),
            dead: false,
        }
    }
}

impl Generator for SizesGen {
    fn method(&self) -> Method {
        Method::SIZE
    }

    fn prefix(&self) -> &'static str {
        "zf"
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
        let mut st = SizesState {
            p: Printer::new(w),
            pending: Vec::new(),
        };
        st.p
            .comment("msg_size returns an upper bound on the encoded size");
        st.p.print(&format!("\nimpl {} {{", el.type_name()));
        st.p
            .print(&format!("\npub fn msg_size({}) -> usize {{", recv));
        st.p.print("\nlet mut s: usize = 0;");
        next(&mut st, &el);
        st.flush();
        st.p.print("\ns\n}\n}\n");
        if let Some(e) = st.p.take_err() {
            self.dead = true;
            return Err(e);
        }
        Ok(())
    }
}

/// Returns a constant expression for the encoded size of `e`, if every part
/// of it has a fixed size.
fn fixed_size_expr(e: &Elem) -> Option<String> {
    match e {
        Elem::Base(b) => b.kind.fixed_size().map(str::to_string),
        Elem::Array(a) => {
            let inner = fixed_size_expr(&a.els)?;
            Some(format!(
                "mpack::size::ARRAY_HEADER + ({} as usize) * ({})",
                a.size, inner
            ))
        }
        _ => None,
    }
}

struct SizesState<'w> {
    p: Printer<'w>,
    pending: Vec<String>,
}

impl SizesState<'_> {
    /// Queues a size contribution; adjacent contributions merge into one
    /// statement.
    fn add(&mut self, expr: &str) {
        self.pending.push(expr.to_string());
    }

    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let joined = std::mem::take(&mut self.pending).join(" + ");
        self.p.print(&format!("\ns += {};", joined));
    }
}

impl Traversal for SizesState<'_> {
    fn g_struct(&mut self, s: &Struct) {
        if !self.p.ok() {
            return;
        }
        if s.as_tuple {
            self.add("mpack::size::ARRAY_HEADER");
            for f in &s.fields {
                next(self, &f.field_elem);
            }
        } else {
            self.add("mpack::size::MAP_HEADER");
            for f in &s.fields {
                self.add(&format!(
                    "mpack::size::STR_PREFIX + {}",
                    f.field_tag.len()
                ));
                next(self, &f.field_elem);
            }
        }
    }

    fn g_base(&mut self, b: &BaseElem) {
        if !self.p.ok() {
            return;
        }
        let mut vn = b.varname().to_string();
        if b.convert {
            vn = b.to_base_expr();
            if b.shim_mode == ShimMode::Convert && b.kind.fixed_size().is_none() {
                // Fallible conversions cannot run here; measure through the
                // Result and bound a failed conversion by the prefix alone.
                let measured = match b.kind {
                    Kind::Bytes => format!(
                        "mpack::size::BYTES_PREFIX + {}.map(|v| v.len()).unwrap_or(0)",
                        vn
                    ),
                    Kind::Str => format!(
                        "mpack::size::STR_PREFIX + {}.map(|v| v.len()).unwrap_or(0)",
                        vn
                    ),
                    Kind::Ext => format!(
                        "mpack::size::EXT_PREFIX + {}.map(|v| v.ext_len()).unwrap_or(0)",
                        vn
                    ),
                    _ => format!("{}.map(|v| v.msg_size()).unwrap_or(0)", vn),
                };
                self.add(&measured);
                return;
            }
        }

        match b.kind {
            Kind::Ext => {
                self.add(&format!("mpack::size::EXT_PREFIX + {}.ext_len()", vn));
            }
            Kind::Any => self.add(&format!("{}.msg_size()", vn)),
            Kind::Ident => self.add(&format!("{}.msg_size()", vn)),
            Kind::Bytes => self.add(&format!("mpack::size::BYTES_PREFIX + {}.len()", vn)),
            Kind::Str => self.add(&format!("mpack::size::STR_PREFIX + {}.len()", vn)),
            k => match k.fixed_size() {
                Some(c) => self.add(c),
                None => self.add(&format!("{}.msg_size()", vn)),
            },
        }
    }

    fn g_map(&mut self, m: &Map) {
        if !self.p.ok() {
            return;
        }
        self.add("mpack::size::MAP_HEADER");
        self.flush();
        let vn = m.varname();
        self.p.print(&format!(
            "\nfor ({}, {}) in {}.iter() {{",
            m.key_idx, m.val_idx, vn
        ));
        self.p.print(&format!("\nlet _ = {};", m.val_idx));
        self.add(&format!("mpack::size::STR_PREFIX + {}.len()", m.key_idx));
        next(self, &m.value);
        self.flush();
        self.p.close_block();
    }

    fn g_slice(&mut self, s: &Slice) {
        if !self.p.ok() {
            return;
        }
        self.add("mpack::size::ARRAY_HEADER");
        let vn = s.varname();
        if let Some(inner) = fixed_size_expr(&s.els) {
            self.add(&format!("{}.len() * ({})", vn, inner));
            return;
        }
        self.flush();
        self.p.print(&format!("\nfor {} in 0..{}.len() {{", s.index, vn));
        next(self, &s.els);
        self.flush();
        self.p.close_block();
    }

    fn g_array(&mut self, a: &Array) {
        if !self.p.ok() {
            return;
        }
        // byte arrays encode as one binary blob; converted elements still need the loop
        if let Elem::Base(b) = a.els.as_ref() {
            if matches!(b.kind, Kind::Byte | Kind::U8) && !b.convert {
                self.add(&format!(
                    "mpack::size::BYTES_PREFIX + ({} as usize)",
                    a.size
                ));
                return;
            }
        }
        self.add("mpack::size::ARRAY_HEADER");
        if let Some(inner) = fixed_size_expr(&a.els) {
            self.add(&format!("({} as usize) * ({})", a.size, inner));
            return;
        }
        self.flush();
        self.p
            .print(&format!("\nfor {} in 0..{}.len() {{", a.index, a.varname()));
        next(self, &a.els);
        self.flush();
        self.p.close_block();
    }

    fn g_ptr(&mut self, p: &Ptr) {
        if !self.p.ok() {
            return;
        }
        self.flush();
        self.p.print(&format!("\nmatch {} {{", p.varname()));
        self.p.print("\nNone => {\ns += mpack::size::NIL;\n}");
        if p.needs_init() {
            self.p.print(&format!("\nSome(ref {}) => {{", p.bind));
        } else {
            self.p.print("\nSome(_) => {");
        }
        next(self, &p.value);
        self.flush();
        self.p.close_block();
        self.p.close_block();
    }
}
