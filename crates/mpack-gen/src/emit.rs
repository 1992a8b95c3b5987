//! Shared emission scaffolding: the method mask, the generator set, and the
//! printing helpers every pass builds on.

use std::fmt;
use std::io::{self, Write};
use std::rc::Rc;

use crate::decode::DecodeGen;
use crate::directives::TypePattern;
use crate::encode::EncodeGen;
use crate::ir::{Elem, GenCtx};
use crate::marshal::MarshalGen;
use crate::sizes::SizesGen;
use crate::testgen::{EncodeTestGen, MarshalTestGen};
use crate::unmarshal::UnmarshalGen;

/// A bitfield naming the routine families the generator knows how to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method(u8);

impl Method {
    pub const NONE: Method = Method(0);
    pub const DECODE: Method = Method(1);
    pub const ENCODE: Method = Method(1 << 1);
    pub const MARSHAL: Method = Method(1 << 2);
    pub const UNMARSHAL: Method = Method(1 << 3);
    pub const SIZE: Method = Method(1 << 4);
    pub const TEST: Method = Method(1 << 5);

    /// Round-trip tests for the streaming pair.
    pub const ENCODE_TEST: Method =
        Method(Self::ENCODE.0 | Self::DECODE.0 | Self::TEST.0);
    /// Round-trip tests for the buffer pair.
    pub const MARSHAL_TEST: Method =
        Method(Self::MARSHAL.0 | Self::UNMARSHAL.0 | Self::TEST.0);

    /// Whether all bits of `f` are set in `self`.
    pub fn is_set(self, f: Method) -> bool {
        self.0 & f.0 == f.0
    }

    pub fn without_test(self) -> Method {
        Method(self.0 & !Self::TEST.0)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Resolves a pass name as used in per-pass directives.
    pub fn from_pass_name(s: &str) -> Option<Method> {
        match s {
            "decode" => Some(Self::DECODE),
            "encode" => Some(Self::ENCODE),
            "marshal" => Some(Self::MARSHAL),
            "unmarshal" => Some(Self::UNMARSHAL),
            "size" => Some(Self::SIZE),
            "test" => Some(Self::TEST),
            _ => None,
        }
    }
}

impl std::ops::BitOr for Method {
    type Output = Method;
    fn bitor(self, rhs: Method) -> Method {
        Method(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for Method {
    fn bitor_assign(&mut self, rhs: Method) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(Method, &str); 6] = [
            (Method::DECODE, "decode"),
            (Method::ENCODE, "encode"),
            (Method::MARSHAL, "marshal"),
            (Method::UNMARSHAL, "unmarshal"),
            (Method::SIZE, "size"),
            (Method::TEST, "test"),
        ];
        let mut any = false;
        for (m, name) in NAMES {
            if self.is_set(m) {
                if any {
                    write!(f, "+{}", name)?;
                } else {
                    write!(f, "{}", name)?;
                    any = true;
                }
            }
        }
        if !any {
            write!(f, "<invalid method>")?;
        }
        Ok(())
    }
}

/// A pass-scoped transform over a named type's tree; returning `None`
/// removes the type from that pass only.
pub type TransformPass = Rc<dyn Fn(Elem) -> Option<Elem>>;

pub(crate) fn apply_all(passes: &[TransformPass], mut e: Elem) -> Option<Elem> {
    for t in passes {
        e = t(e)?;
    }
    Some(e)
}

/// A transform that skips types whose canonical name matches `pat`.
pub fn ignore_typename(pat: TypePattern) -> TransformPass {
    Rc::new(move |e: Elem| {
        if pat.matches(&e.type_name()) {
            None
        } else {
            Some(e)
        }
    })
}

/// The shared printing utility. I/O errors stick: once a write fails, the
/// rest of the routine is dropped and the error is surfaced at the end of
/// the pass.
pub(crate) struct Printer<'w> {
    w: &'w mut dyn Write,
    err: Option<io::Error>,
}

impl<'w> Printer<'w> {
    pub fn new(w: &'w mut dyn Write) -> Self {
        Printer { w, err: None }
    }

    pub fn ok(&self) -> bool {
        self.err.is_none()
    }

    pub fn print(&mut self, s: &str) {
        if self.ok() {
            if let Err(e) = self.w.write_all(s.as_bytes()) {
                self.err = Some(e);
            }
        }
    }

    pub fn comment(&mut self, s: &str) {
        self.print(&format!("\n// {}", s));
    }

    /// Writes `let mut name: typ = Default::default();`.
    pub fn declare(&mut self, name: &str, typ: &str) {
        self.print(&format!("\nlet mut {}: {} = Default::default();", name, typ));
    }

    /// Resizes a vector to a decoded header count, reusing capacity.
    pub fn resize_slice(&mut self, vn: &str, size: &str) {
        self.print(&format!(
            "\n{}.resize_with({} as usize, Default::default);",
            vn, size
        ));
    }

    pub fn clear_map(&mut self, vn: &str) {
        self.print(&format!("\n{}.clear();", vn));
    }

    /// Emits the fixed-length array header assertion.
    pub fn array_check(&mut self, want: &str, got: &str) {
        self.print(&format!(
            "\nif {got} != {want} {{ return Err(mpack::DecodeError::array_len({want}, {got})); }}",
            want = want,
            got = got
        ));
    }

    pub fn close_block(&mut self) {
        self.print("\n}");
    }

    pub fn take_err(&mut self) -> Option<io::Error> {
        self.err.take()
    }
}

/// Per-variant dispatch shared by every pass.
pub(crate) trait Traversal {
    fn g_map(&mut self, m: &crate::ir::Map);
    fn g_slice(&mut self, s: &crate::ir::Slice);
    fn g_array(&mut self, a: &crate::ir::Array);
    fn g_ptr(&mut self, p: &crate::ir::Ptr);
    fn g_base(&mut self, b: &crate::ir::BaseElem);
    fn g_struct(&mut self, s: &crate::ir::Struct);
}

/// Calls the method corresponding to the variant of `e`.
pub(crate) fn next(t: &mut dyn Traversal, e: &Elem) {
    match e {
        Elem::Map(m) => t.g_map(m),
        Elem::Struct(s) => t.g_struct(s),
        Elem::Slice(s) => t.g_slice(s),
        Elem::Array(a) => t.g_array(a),
        Elem::Ptr(p) => t.g_ptr(p),
        Elem::Base(b) => t.g_base(b),
    }
}

/// Picks the receiver for the read-only passes. Small structs made only of
/// fixed-width resolved primitives go by value; everything else borrows.
/// Non-struct, non-array roots are re-rooted at `(*self)`.
pub(crate) fn imut_receiver(e: &mut Elem, g: &mut GenCtx) -> &'static str {
    match e {
        Elem::Struct(s) => {
            if s.fields.len() <= 3 && s.all_fields_fixed_primitive() {
                "self"
            } else {
                "&self"
            }
        }
        Elem::Array(_) => "&self",
        _ => {
            e.set_varname("(*self)", g);
            "&self"
        }
    }
}

/// Picks the receiver for the mutating passes; always an exclusive borrow.
pub(crate) fn mut_receiver(e: &mut Elem, g: &mut GenCtx) -> &'static str {
    if !matches!(e, Elem::Struct(_) | Elem::Array(_)) {
        e.set_varname("(*self)", g);
    }
    "&mut self"
}

/// Rewrites a pure deref wrapper `(*x)` into the bare place `*x` for use in
/// destructuring-assignment position.
pub(crate) fn assign_place(vn: &str) -> String {
    if let Some(inner) = vn.strip_prefix("(*").and_then(|s| s.strip_suffix(')')) {
        if inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return format!("*{}", inner);
        }
    }
    vn.to_string()
}

/// Lower-snake form of a type name, for generated test function names.
pub(crate) fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c.is_alphanumeric() || c == '_' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// One routine-emitter; each pass implements this.
pub(crate) trait Generator {
    fn method(&self) -> Method;
    /// The identifier prefix reserved for this pass.
    fn prefix(&self) -> &'static str;
    fn add(&mut self, t: TransformPass);
    fn execute(&mut self, el: &Elem, w: &mut dyn Write, ctx: &mut GenCtx) -> io::Result<()>;
}

/// The ordered collection of passes for one run.
pub struct GeneratorSet {
    gens: Vec<Box<dyn Generator>>,
    ctx: GenCtx,
}

impl GeneratorSet {
    /// Builds the passes selected by `m`, in the fixed emission order.
    pub fn new(m: Method) -> GeneratorSet {
        let mut gens: Vec<Box<dyn Generator>> = Vec::new();
        if m.is_set(Method::DECODE) {
            gens.push(Box::new(DecodeGen::new()));
        }
        if m.is_set(Method::ENCODE) {
            gens.push(Box::new(EncodeGen::new()));
        }
        if m.is_set(Method::MARSHAL) {
            gens.push(Box::new(MarshalGen::new()));
        }
        if m.is_set(Method::UNMARSHAL) {
            gens.push(Box::new(UnmarshalGen::new()));
        }
        if m.is_set(Method::SIZE) {
            gens.push(Box::new(SizesGen::new()));
        }
        if m.is_set(Method::MARSHAL_TEST) {
            gens.push(Box::new(MarshalTestGen::new()));
        }
        if m.is_set(Method::ENCODE_TEST) {
            gens.push(Box::new(EncodeTestGen::new()));
        }
        GeneratorSet {
            gens,
            ctx: GenCtx::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.gens.is_empty()
    }

    /// Adds a transform to every pass whose method includes `pass`.
    pub fn apply_directive(&mut self, pass: Method, t: TransformPass) {
        for g in &mut self.gens {
            if g.method().is_set(pass) {
                g.add(t.clone());
            }
        }
    }

    /// Runs every pass against one named type. Identifiers minted while
    /// naming the tree use the `za` prefix; each pass then swaps in its own
    /// prefix with a fresh counter, so no two passes (and no pass and the
    /// naming walk) can mint the same identifier.
    pub fn print(
        &mut self,
        el: &mut Elem,
        out: &mut dyn Write,
        mut tests: Option<&mut dyn Write>,
    ) -> io::Result<()> {
        self.ctx.reset("za");
        el.set_varname("self", &mut self.ctx);
        let mut first_err: Option<io::Error> = None;
        for g in &mut self.gens {
            self.ctx.reset(g.prefix());
            let res = if g.method().is_set(Method::TEST) {
                match tests.as_deref_mut() {
                    Some(t) => g.execute(el, t, &mut self.ctx),
                    None => continue,
                }
            } else {
                g.execute(el, &mut *out, &mut self.ctx)
            };
            if let Err(e) = res {
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_display_joins_names() {
        assert_eq!(Method::DECODE.to_string(), "decode");
        assert_eq!(
            (Method::ENCODE | Method::SIZE).to_string(),
            "encode+size"
        );
        assert_eq!(Method::NONE.to_string(), "<invalid method>");
    }

    #[test]
    fn pass_names_resolve() {
        assert_eq!(Method::from_pass_name("unmarshal"), Some(Method::UNMARSHAL));
        assert_eq!(Method::from_pass_name("bogus"), None);
    }

    #[test]
    fn snake_case_type_names() {
        assert_eq!(snake_case("OtherStruct"), "other_struct");
        assert_eq!(snake_case("ID"), "i_d");
        assert_eq!(snake_case("already_snake"), "already_snake");
    }

    #[test]
    fn assign_place_strips_pure_wrappers() {
        assert_eq!(assign_place("(*za0001)"), "*za0001");
        assert_eq!(assign_place("(*self).0"), "(*self).0");
        assert_eq!(assign_place("self.foo"), "self.foo");
    }
}
