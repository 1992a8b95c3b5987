//! The type-model intermediate representation.
//!
//! Every declared or inferred type is one [`Elem`]:
//!
//! ```text
//! struct Marshaler { thing1: Option<f64>, body: Vec<u8> }
//! ```
//!
//! parses into
//!
//! ```text
//! Elem::Struct(Struct {
//!     fields: [
//!         StructField { field_tag: "thing1", field_elem: Ptr(Base(F64)) },
//!         StructField { field_tag: "body",   field_elem: Base(Bytes) },
//!     ],
//!     ..
//! })
//! ```
//!
//! Each node carries two mutable-during-emission attributes: `varname`, the
//! textual expression by which the node's value is referred to in the routine
//! currently being emitted (`self.thing1`, `(*za0002)`, ...), and `alias`,
//! the canonical declared type name.

/// Identifier generator: a short prefix plus a monotonic counter, yielding
/// `za0001`, `za0002`, ... The prefix is swapped per pass so identifiers
/// minted while naming the tree can never collide with identifiers minted
/// while printing a routine.
#[derive(Debug)]
pub struct GenCtx {
    prefix: &'static str,
    next: u32,
}

impl GenCtx {
    pub fn new() -> Self {
        GenCtx { prefix: "za", next: 0 }
    }

    /// Swaps the prefix and restarts the counter.
    pub fn reset(&mut self, prefix: &'static str) {
        self.prefix = prefix;
        self.next = 0;
    }

    /// Mints a fresh identifier.
    pub fn next_ident(&mut self) -> String {
        self.next += 1;
        format!("{}{:04}", self.prefix, self.next)
    }
}

impl Default for GenCtx {
    fn default() -> Self {
        Self::new()
    }
}

/// The closed set of primitive kinds. `Ident` is an as-yet-unresolved named
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bytes,
    Str,
    F32,
    F64,
    Complex32,
    Complex64,
    Usize,
    U8,
    U16,
    U32,
    U64,
    Byte,
    Isize,
    I8,
    I16,
    I32,
    I64,
    Bool,
    Any,
    Time,
    Ext,
    Ident,
}

impl Kind {
    /// The method-name suffix on the runtime primitives
    /// (`write_{suffix}`, `read_{suffix}`, `append_{suffix}`, ...).
    pub fn suffix(self) -> &'static str {
        match self {
            Kind::Bytes => "bytes",
            Kind::Str => "str",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::Complex32 => "complex32",
            Kind::Complex64 => "complex64",
            Kind::Usize => "usize",
            Kind::U8 => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::Byte => "byte",
            Kind::Isize => "isize",
            Kind::I8 => "i8",
            Kind::I16 => "i16",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::Bool => "bool",
            Kind::Any => "value",
            Kind::Time => "time",
            Kind::Ext => "extension",
            Kind::Ident => "ident",
        }
    }

    /// The Rust type the kind maps to in generated declarations.
    pub fn base_type(self) -> &'static str {
        match self {
            Kind::Bytes => "Vec<u8>",
            Kind::Str => "String",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::Complex32 => "mpack::Complex32",
            Kind::Complex64 => "mpack::Complex64",
            Kind::Usize => "usize",
            Kind::U8 | Kind::Byte => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::Isize => "isize",
            Kind::I8 => "i8",
            Kind::I16 => "i16",
            Kind::I32 => "i32",
            Kind::I64 => "i64",
            Kind::Bool => "bool",
            Kind::Any => "mpack::Value",
            Kind::Time => "std::time::SystemTime",
            Kind::Ext => "mpack::RawExt",
            Kind::Ident => "ident",
        }
    }

    /// The `mpack::size` constant for kinds with a fixed encoded size.
    pub fn fixed_size(self) -> Option<&'static str> {
        match self {
            Kind::F32 => Some("mpack::size::F32"),
            Kind::F64 => Some("mpack::size::F64"),
            Kind::Complex32 => Some("mpack::size::COMPLEX32"),
            Kind::Complex64 => Some("mpack::size::COMPLEX64"),
            Kind::Usize => Some("mpack::size::USIZE"),
            Kind::U8 => Some("mpack::size::U8"),
            Kind::U16 => Some("mpack::size::U16"),
            Kind::U32 => Some("mpack::size::U32"),
            Kind::U64 => Some("mpack::size::U64"),
            Kind::Byte => Some("mpack::size::BYTE"),
            Kind::Isize => Some("mpack::size::ISIZE"),
            Kind::I8 => Some("mpack::size::I8"),
            Kind::I16 => Some("mpack::size::I16"),
            Kind::I32 => Some("mpack::size::I32"),
            Kind::I64 => Some("mpack::size::I64"),
            Kind::Bool => Some("mpack::size::BOOL"),
            Kind::Time => Some("mpack::size::TIME"),
            _ => None,
        }
    }

    /// Whether values of this kind are passed to the writers by reference.
    pub fn written_by_ref(self) -> bool {
        matches!(self, Kind::Bytes | Kind::Str | Kind::Any)
    }
}

/// Maps a schema type spelling to its primitive kind.
///
/// `byte` and `rune` are accepted for schemas written against the original
/// input language; `byte` keeps its own kind with `u8` wire behavior.
pub fn primitive_kind(name: &str) -> Option<Kind> {
    match name {
        "bool" => Some(Kind::Bool),
        "u8" => Some(Kind::U8),
        "u16" => Some(Kind::U16),
        "u32" => Some(Kind::U32),
        "u64" => Some(Kind::U64),
        "usize" => Some(Kind::Usize),
        "byte" => Some(Kind::Byte),
        "i8" => Some(Kind::I8),
        "i16" => Some(Kind::I16),
        "i32" => Some(Kind::I32),
        "i64" => Some(Kind::I64),
        "isize" => Some(Kind::Isize),
        "rune" => Some(Kind::I32),
        "f32" => Some(Kind::F32),
        "f64" => Some(Kind::F64),
        "String" => Some(Kind::Str),
        "Vec<u8>" => Some(Kind::Bytes),
        "Complex32" | "num_complex::Complex32" => Some(Kind::Complex32),
        "Complex64" | "num_complex::Complex64" => Some(Kind::Complex64),
        "Value" | "mpack::Value" => Some(Kind::Any),
        "SystemTime" | "time::SystemTime" | "std::time::SystemTime" => Some(Kind::Time),
        "RawExt" | "mpack::RawExt" => Some(Kind::Ext),
        _ => None,
    }
}

/// Runtime-library types that satisfy every routine family without a local
/// declaration.
pub fn is_builtin(name: &str) -> bool {
    matches!(name, "mpack::Raw" | "mpack::Number")
}

/// How a shim converts between the declared type and its base type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShimMode {
    /// Infallible conversion functions.
    #[default]
    Cast,
    /// Fallible conversion functions returning `Result`.
    Convert,
}

/// Fields shared by every IR variant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Common {
    vname: String,
    alias: Option<String>,
    /// Newtype constructors wrapped around this node, outermost first.
    /// Each wrap adds one `.0` of access depth.
    wraps: Vec<String>,
}

impl Common {
    fn set_varname(&mut self, s: &str) {
        self.vname = s.to_string();
    }

    fn wrapped(&self, s: &str) -> String {
        let mut out = s.to_string();
        for _ in &self.wraps {
            out.push_str(".0");
        }
        out
    }
}

/// A node of the type-model IR.
#[derive(Debug, Clone, PartialEq)]
pub enum Elem {
    Base(BaseElem),
    Ptr(Ptr),
    Slice(Slice),
    Array(Array),
    Map(Map),
    Struct(Struct),
}

/// A fixed-length ordered sequence. `size` is the textual size expression
/// as it appeared in source (a literal, a named const, or a qualified path).
#[derive(Debug, Clone, PartialEq)]
pub struct Array {
    pub common: Common,
    pub index: String,
    pub size: String,
    pub els: Box<Elem>,
}

/// A string-keyed mapping; the IR models no other key kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Map {
    pub common: Common,
    pub key_idx: String,
    pub val_idx: String,
    pub value: Box<Elem>,
}

/// A variable-length ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    pub common: Common,
    pub index: String,
    pub els: Box<Elem>,
}

/// Nullable single-value indirection (`Option<T>` in the schema).
#[derive(Debug, Clone, PartialEq)]
pub struct Ptr {
    pub common: Common,
    /// Binding name minted for the pointee in emitted match/insert forms.
    pub bind: String,
    pub value: Box<Elem>,
}

/// An ordered list of named fields, encoded as a map by default or as a
/// positional array in tuple mode.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Struct {
    pub common: Common,
    pub fields: Vec<StructField>,
    pub as_tuple: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    /// The wire-level tag (defaults to the field name).
    pub field_tag: String,
    /// The raw attribute text, kept for diagnostics.
    pub raw_tag: String,
    pub field_name: String,
    pub field_elem: Elem,
}

/// A primitive, an unresolved identifier, or an extension.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseElem {
    pub common: Common,
    pub kind: Kind,
    pub shim_mode: ShimMode,
    /// Function converting the declared type to the base type, if shimmed.
    pub shim_to: Option<String>,
    /// Function converting the base type back, if shimmed.
    pub shim_from: Option<String>,
    /// Whether an explicit conversion separates the declared type from the
    /// wire primitive (newtype wrapping or a shim).
    pub convert: bool,
    /// The shim functions take the value by reference.
    pub needs_ref: bool,
    must_inline: bool,
    /// Set during varname propagation when the expression is already a
    /// reference binding rather than a place.
    varname_is_ref: bool,
}

impl BaseElem {
    pub fn new(kind: Kind) -> Self {
        BaseElem {
            common: Common::default(),
            kind,
            shim_mode: ShimMode::Cast,
            shim_to: None,
            shim_from: None,
            convert: false,
            needs_ref: false,
            must_inline: false,
            varname_is_ref: false,
        }
    }

    pub fn printable(&self) -> bool {
        !self.must_inline
    }

    pub fn varname_is_ref(&self) -> bool {
        self.varname_is_ref
    }

    pub fn set_needs_ref(&mut self, b: bool) {
        self.needs_ref = b;
    }

    /// Whether the element resolves to a primitive or a library built-in.
    pub fn resolved(&self) -> bool {
        if self.kind == Kind::Ident {
            return is_builtin(&self.type_name());
        }
        true
    }

    pub fn base_type(&self) -> String {
        if self.kind == Kind::Ident {
            return self
                .common
                .alias
                .clone()
                .unwrap_or_else(|| "ident".to_string());
        }
        self.kind.base_type().to_string()
    }

    pub fn type_name(&self) -> String {
        match &self.common.alias {
            Some(a) => a.clone(),
            None => self.base_type(),
        }
    }

    pub(crate) fn set_alias(&mut self, name: &str) {
        self.common.alias = Some(name.to_string());
        if name.contains("::") {
            self.must_inline = true;
        }
    }

    /// Adds a newtype constructor around the node and forces conversion.
    pub fn push_wrap(&mut self, name: &str) {
        self.common.wraps.insert(0, name.to_string());
        self.convert = true;
    }

    pub(crate) fn set_varname_base(&mut self, a: &str) {
        // Extension values and by-reference shims reference the binding
        // directly when the expression is a pure deref wrapper.
        if self.kind == Kind::Ext || self.needs_ref {
            if let Some(inner) = a.strip_prefix("(*").and_then(|s| s.strip_suffix(')')) {
                if inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                    self.common.set_varname(inner);
                    self.varname_is_ref = true;
                    return;
                }
            }
            self.common.set_varname(a);
            self.varname_is_ref = false;
            return;
        }
        self.common.set_varname(a);
    }

    /// The expression converting `varname` to the base type:
    /// `to_fn(v)` for shims, dotted newtype access otherwise.
    pub fn to_base_expr(&self) -> String {
        if let Some(to) = &self.shim_to {
            if self.needs_ref {
                return format!("{}(&{})", to, self.varname());
            }
            return format!("{}({})", to, self.varname());
        }
        self.common.wrapped(&self.common.vname)
    }

    /// The expression converting `tmp` (of the base type) back to the
    /// declared type: `from_fn(tmp)` for shims, nested newtype
    /// constructors otherwise.
    pub fn from_base_expr(&self, tmp: &str) -> String {
        if let Some(from) = &self.shim_from {
            return format!("{}({})", from, tmp);
        }
        let mut out = tmp.to_string();
        for w in self.common.wraps.iter().rev() {
            out = format!("{}({})", w, out);
        }
        out
    }

    pub fn varname(&self) -> &str {
        &self.common.vname
    }
}

/// Returns the `Elem` corresponding to a schema identifier: a primitive
/// from the spelling table, or an unresolved `Ident` reference.
pub fn ident(name: &str) -> BaseElem {
    if let Some(k) = primitive_kind(name) {
        return BaseElem::new(k);
    }
    let mut be = BaseElem::new(Kind::Ident);
    be.set_alias(name);
    be
}

/// Coerces a textual array size for comparison with a wire header.
pub fn coerce_array_size(size: &str) -> String {
    format!("({}) as u32", size)
}

impl Elem {
    /// Sets this node's variable name and recursively names its children,
    /// minting index/binding identifiers from `g`. Call only on the root of
    /// a named type's tree (or when re-rooting it at a receiver).
    pub fn set_varname(&mut self, s: &str, g: &mut GenCtx) {
        match self {
            Elem::Base(b) => b.set_varname_base(s),

            Elem::Struct(st) => {
                let a = st.common.wrapped(s);
                st.common.set_varname(&a);
                for f in &mut st.fields {
                    let expr = format!("{}.{}", a, f.field_name);
                    f.field_elem.set_varname(&expr, g);
                }
            }

            Elem::Slice(sl) => {
                let a = sl.common.wrapped(s);
                sl.common.set_varname(&a);
                sl.index = g.next_ident();
                let mut base = a.clone();
                if base.starts_with('*') {
                    base = format!("({})", base);
                }
                let expr = format!("{}[{}]", base, sl.index);
                sl.els.set_varname(&expr, g);
            }

            Elem::Array(ar) => {
                let a = ar.common.wrapped(s);
                ar.common.set_varname(&a);
                // Avoid reusing an index that already appears in an
                // ancestor expression.
                loop {
                    ar.index = g.next_ident();
                    if !ar.common.vname.contains(&ar.index) {
                        break;
                    }
                }
                let expr = format!("{}[{}]", a, ar.index);
                ar.els.set_varname(&expr, g);
            }

            Elem::Map(m) => {
                let a = m.common.wrapped(s);
                m.common.set_varname(&a);
                loop {
                    m.key_idx = g.next_ident();
                    m.val_idx = g.next_ident();
                    if m.key_idx != m.val_idx {
                        break;
                    }
                }
                let expr = format!("(*{})", m.val_idx);
                m.value.set_varname(&expr, g);
            }

            Elem::Ptr(p) => {
                let a = p.common.wrapped(s);
                p.common.set_varname(&a);
                p.bind = g.next_ident();
                let bind = p.bind.clone();
                // Struct pointees and method receivers are referenced bare
                // through the binding; by-ref shims keep the option place
                // itself.
                let expr = match p.value.as_ref() {
                    Elem::Struct(_) => bind,
                    Elem::Base(b) if b.kind == Kind::Ident => bind,
                    Elem::Base(b) if b.needs_ref => a,
                    _ => format!("(*{})", bind),
                };
                p.value.set_varname(&expr, g);
            }
        }
    }

    pub fn varname(&self) -> &str {
        &self.common().vname
    }

    /// The canonical type name: the alias if one is set, the structural
    /// spelling otherwise.
    pub fn type_name(&self) -> String {
        if let Some(a) = &self.common().alias {
            return a.clone();
        }
        match self {
            Elem::Base(b) => b.base_type(),
            Elem::Ptr(p) => format!("Option<{}>", p.value.type_name()),
            Elem::Slice(s) => format!("Vec<{}>", s.els.type_name()),
            Elem::Array(a) => format!("[{}; {}]", a.els.type_name(), a.size),
            Elem::Map(m) => format!("HashMap<String, {}>", m.value.type_name()),
            Elem::Struct(s) => {
                let mut out = String::from("struct { ");
                for f in &s.fields {
                    out.push_str(&f.field_name);
                    out.push_str(": ");
                    out.push_str(&f.field_elem.type_name());
                    out.push_str(", ");
                }
                out.push('}');
                out
            }
        }
    }

    pub fn set_alias(&mut self, name: &str) {
        match self {
            Elem::Base(b) => b.set_alias(name),
            _ => self.common_mut().alias = Some(name.to_string()),
        }
    }

    /// Adds one level of newtype wrapping around the node.
    pub fn push_wrap(&mut self, name: &str) {
        match self {
            Elem::Base(b) => b.push_wrap(name),
            _ => self.common_mut().wraps.insert(0, name.to_string()),
        }
    }

    /// A recursive measure of tree weight, always at least 1.
    pub fn complexity(&self) -> usize {
        match self {
            Elem::Base(b) => {
                if b.convert && b.printable() {
                    2
                } else {
                    1
                }
            }
            Elem::Ptr(p) => 1 + p.value.complexity(),
            Elem::Slice(s) => 1 + s.els.complexity(),
            Elem::Array(a) => 1 + a.els.complexity(),
            Elem::Map(m) => 2 + m.value.complexity(),
            Elem::Struct(s) => {
                1 + s
                    .fields
                    .iter()
                    .map(|f| f.field_elem.complexity())
                    .sum::<usize>()
            }
        }
    }

    /// False only for identifiers that must be inlined before printing.
    pub fn is_printable(&self) -> bool {
        match self {
            Elem::Base(b) => b.printable(),
            _ => true,
        }
    }

    fn common(&self) -> &Common {
        match self {
            Elem::Base(b) => &b.common,
            Elem::Ptr(p) => &p.common,
            Elem::Slice(s) => &s.common,
            Elem::Array(a) => &a.common,
            Elem::Map(m) => &m.common,
            Elem::Struct(s) => &s.common,
        }
    }

    fn common_mut(&mut self) -> &mut Common {
        match self {
            Elem::Base(b) => &mut b.common,
            Elem::Ptr(p) => &mut p.common,
            Elem::Slice(s) => &mut s.common,
            Elem::Array(a) => &mut a.common,
            Elem::Map(m) => &mut m.common,
            Elem::Struct(s) => &mut s.common,
        }
    }
}

impl Ptr {
    /// Whether the decode passes must allocate the pointee before
    /// recursing. By-reference shims manage the option place themselves.
    pub fn needs_init(&self) -> bool {
        !matches!(self.value.as_ref(), Elem::Base(b) if b.needs_ref)
    }

    pub fn varname(&self) -> &str {
        &self.common.vname
    }
}

impl Slice {
    pub fn varname(&self) -> &str {
        &self.common.vname
    }
}

impl Array {
    pub fn varname(&self) -> &str {
        &self.common.vname
    }
}

impl Map {
    pub fn varname(&self) -> &str {
        &self.common.vname
    }
}

impl Struct {
    /// Whether every field is a fixed-width resolved primitive, making the
    /// struct eligible for a by-value receiver.
    pub fn all_fields_fixed_primitive(&self) -> bool {
        self.fields.iter().all(|f| match &f.field_elem {
            Elem::Base(b) => b.kind.fixed_size().is_some() && !b.convert,
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named_struct(fields: Vec<(&str, Elem)>) -> Elem {
        Elem::Struct(Struct {
            common: Common::default(),
            fields: fields
                .into_iter()
                .map(|(n, e)| StructField {
                    field_tag: n.to_string(),
                    raw_tag: String::new(),
                    field_name: n.to_string(),
                    field_elem: e,
                })
                .collect(),
            as_tuple: false,
        })
    }

    #[test]
    fn complexity_matches_recurrence() {
        let base = Elem::Base(BaseElem::new(Kind::U32));
        assert_eq!(base.complexity(), 1);

        let ptr = Elem::Ptr(Ptr {
            common: Common::default(),
            bind: String::new(),
            value: Box::new(base.clone()),
        });
        assert_eq!(ptr.complexity(), 2);

        let map = Elem::Map(Map {
            common: Common::default(),
            key_idx: String::new(),
            val_idx: String::new(),
            value: Box::new(base.clone()),
        });
        assert_eq!(map.complexity(), 3);

        let st = named_struct(vec![("a", base.clone()), ("b", ptr.clone())]);
        assert_eq!(st.complexity(), 1 + 1 + 2);

        let mut shimmed = BaseElem::new(Kind::U64);
        shimmed.convert = true;
        assert_eq!(Elem::Base(shimmed).complexity(), 2);
    }

    #[test]
    fn varname_propagation_names_fields_and_indices() {
        let inner = named_struct(vec![("num", Elem::Base(BaseElem::new(Kind::U32)))]);
        let mut root = named_struct(vec![
            ("items", Elem::Slice(Slice {
                common: Common::default(),
                index: String::new(),
                els: Box::new(inner),
            })),
        ]);
        let mut g = GenCtx::new();
        root.set_varname("self", &mut g);

        let Elem::Struct(st) = &root else { panic!() };
        let Elem::Slice(sl) = &st.fields[0].field_elem else { panic!() };
        assert_eq!(sl.common.vname, "self.items");
        assert_eq!(sl.index, "za0001");
        let Elem::Struct(inner) = sl.els.as_ref() else { panic!() };
        assert_eq!(inner.fields[0].field_elem.varname(), "self.items[za0001].num");
    }

    #[test]
    fn map_value_binding_is_deref_of_minted_name() {
        let mut m = Elem::Map(Map {
            common: Common::default(),
            key_idx: String::new(),
            val_idx: String::new(),
            value: Box::new(Elem::Base(BaseElem::new(Kind::Str))),
        });
        let mut g = GenCtx::new();
        m.set_varname("self.table", &mut g);
        let Elem::Map(m) = &m else { panic!() };
        assert_eq!(m.key_idx, "za0001");
        assert_eq!(m.val_idx, "za0002");
        assert_eq!(m.value.varname(), "(*za0002)");
    }

    #[test]
    fn ext_under_ptr_strips_deref_wrapper() {
        let mut p = Elem::Ptr(Ptr {
            common: Common::default(),
            bind: String::new(),
            value: Box::new(Elem::Base(BaseElem::new(Kind::Ext))),
        });
        let mut g = GenCtx::new();
        p.set_varname("self.ext", &mut g);
        let Elem::Ptr(p) = &p else { panic!() };
        let Elem::Base(b) = p.value.as_ref() else { panic!() };
        assert_eq!(b.varname(), p.bind);
        assert!(b.varname_is_ref());
    }

    #[test]
    fn newtype_wraps_compose() {
        let mut b = BaseElem::new(Kind::U64);
        b.push_wrap("A");
        b.push_wrap("B");
        b.set_varname_base("(*self)");
        assert_eq!(b.to_base_expr(), "(*self).0.0");
        assert_eq!(b.from_base_expr("tmp"), "B(A(tmp))");
        assert!(b.convert);
    }

    #[test]
    fn qualified_identifiers_must_inline() {
        let b = ident("other::Thing");
        assert!(!b.printable());
        assert!(!b.resolved());
        let raw = ident("mpack::Raw");
        assert!(raw.resolved());
    }
}
