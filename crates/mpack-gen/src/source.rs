//! The IR builder and alias resolver.
//!
//! A [`Source`] holds the raw declarations collected by the parser and
//! translates each one into the type-model IR by structural recursion.
//! Named references that cannot be translated immediately go into a pending
//! linkset; the resolver then iterates to a fixpoint, so chains like
//!
//! ```text
//! struct A(pub u64);
//! struct B(pub A);
//! struct C(pub B);
//! struct D(pub C);
//! ```
//!
//! distill into a single level of indirection (D is a `u64` at the wire
//! level, wrapped in three constructors).

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use crate::diag;
use crate::directives;
use crate::emit::{GeneratorSet, Method};
use crate::inline;
use crate::ir::{self, Array, BaseElem, Common, Elem, Kind, Map, Ptr, Slice, Struct, StructField};
use crate::parser::{ParsedSource, RawDecl};

/// The in-memory representation of a parsed schema: raw declarations on the
/// way in, resolved identities on the way out.
pub struct Source {
    /// Identifier naming the emitted output group.
    pub package: String,
    /// Raw declarations; cleared once the IR is built.
    specs: BTreeMap<String, RawDecl>,
    /// Fully processed identities, keyed by canonical name. Iteration order
    /// is the emission order.
    pub identities: BTreeMap<String, Elem>,
    /// Names of transparent aliases: they resolve references but are never
    /// emitted (their methods would duplicate the target's).
    transparent: BTreeSet<String>,
    /// Directives not claimed by a file-level handler; applied per pass.
    pub directives: Vec<String>,
    /// Verbatim `use` items forwarded into the output header.
    pub imports: Vec<String>,
}

impl Source {
    /// Builds the IR from a parsed schema: translate, resolve, apply
    /// directives, then inline small referenced types.
    pub fn from_parsed(p: ParsedSource) -> Source {
        let mut s = Source {
            package: p.package,
            specs: p.decls,
            identities: BTreeMap::new(),
            transparent: BTreeSet::new(),
            directives: p.directives,
            imports: p.imports,
        };
        s.process();
        s.apply_directives();
        inline::prop_inline(&mut s);
        // The raw declaration store is not needed past IR construction.
        s.specs.clear();
        s
    }

    /// Translates every raw declaration, deferring unresolved references.
    fn process(&mut self) {
        // (pending base, arose-from-newtype)
        let mut deferred: BTreeMap<String, (BaseElem, bool)> = BTreeMap::new();

        let names: Vec<String> = self.specs.keys().cloned().collect();
        for name in names {
            let _g = diag::scope(&name);
            let Some(decl) = self.specs.get(&name).cloned() else {
                continue;
            };
            match decl {
                RawDecl::Struct(item) => {
                    let fields = self.parse_field_list(&item.fields);
                    let mut el = Elem::Struct(Struct {
                        common: Common::default(),
                        fields,
                        as_tuple: false,
                    });
                    el.set_alias(&name);
                    self.identities.insert(name, el);
                }
                RawDecl::Newtype(ty) => match self.parse_expr(&ty) {
                    None => diag::warn("failed to parse"),
                    Some(Elem::Base(b)) if b.kind == Kind::Ident => {
                        deferred.insert(name, (b, true));
                    }
                    Some(mut el) => {
                        el.push_wrap(&name);
                        el.set_alias(&name);
                        self.identities.insert(name, el);
                    }
                },
                RawDecl::Alias(ty) => match self.parse_expr(&ty) {
                    None => diag::warn("failed to parse"),
                    Some(Elem::Base(b)) if b.kind == Kind::Ident => {
                        deferred.insert(name, (b, false));
                    }
                    Some(mut el) => {
                        el.set_alias(&name);
                        self.transparent.insert(name.clone());
                        self.identities.insert(name, el);
                    }
                },
            }
        }

        if !deferred.is_empty() {
            self.resolve(deferred);
        }
    }

    /// Iteratively substitutes pending references against the processed
    /// identities until no further progress is made.
    fn resolve(&mut self, mut ls: BTreeMap<String, (BaseElem, bool)>) {
        let mut progress = true;
        while progress && !ls.is_empty() {
            progress = false;
            let names: Vec<String> = ls.keys().cloned().collect();
            for name in names {
                let target = match ls.get(&name) {
                    Some((be, _)) => be.type_name(),
                    None => continue,
                };
                let mut nt = match self.identities.get(&target) {
                    Some(n) => n.clone(),
                    None => continue,
                };
                let (_, newtype) = match ls.remove(&name) {
                    Some(entry) => entry,
                    None => continue,
                };
                if newtype {
                    nt.push_wrap(&name);
                } else {
                    self.transparent.insert(name.clone());
                }
                nt.set_alias(&name);
                self.identities.insert(name, nt);
                progress = true;
            }
        }

        // What's left can't be resolved.
        for (name, (be, _)) in ls {
            diag::warn(&format!(
                "couldn't resolve type {} ({})",
                name,
                be.type_name()
            ));
        }
    }

    fn parse_field_list(&self, fields: &syn::Fields) -> Vec<StructField> {
        let mut out = Vec::new();
        let syn::Fields::Named(named) = fields else {
            return out;
        };
        for f in &named.named {
            let fname = f
                .ident
                .as_ref()
                .map(|i| i.to_string())
                .unwrap_or_default();
            let _g = diag::scope(&fname);
            match self.get_field(f, &fname) {
                Some(sf) => out.push(sf),
                None => diag::warn("ignored."),
            }
        }
        out
    }

    /// Translates one struct field, honoring the `#[mpack(...)]` attribute.
    fn get_field(&self, f: &syn::Field, fname: &str) -> Option<StructField> {
        let meta = FieldMeta::parse(f);
        if meta.skip {
            return None;
        }

        let mut elem = self.parse_expr(&f.ty)?;

        if meta.extension {
            match &mut elem {
                Elem::Ptr(p) => match p.value.as_mut() {
                    Elem::Base(b) => b.kind = Kind::Ext,
                    _ => {
                        diag::warn("cannot be marked extension");
                        return None;
                    }
                },
                Elem::Base(b) => b.kind = Kind::Ext,
                _ => {
                    diag::warn("cannot be marked extension");
                    return None;
                }
            }
        }

        let field_tag = meta.tag.unwrap_or_else(|| fname.to_string());
        Some(StructField {
            field_tag,
            raw_tag: meta.raw,
            field_name: fname.to_string(),
            field_elem: elem,
        })
    }

    /// Recursively translates a syn type into an IR node. `None` means the
    /// form is not supported.
    pub(crate) fn parse_expr(&self, ty: &syn::Type) -> Option<Elem> {
        match ty {
            syn::Type::Paren(p) => self.parse_expr(&p.elem),

            syn::Type::Path(tp) if tp.qself.is_none() => self.parse_path_type(&tp.path),

            syn::Type::Array(arr) => {
                let els = self.parse_expr(&arr.elem)?;
                let size = array_len_text(&arr.len)?;
                Some(Elem::Array(Array {
                    common: Common::default(),
                    index: String::new(),
                    size,
                    els: Box::new(els),
                }))
            }

            // function pointers, references, trait objects, tuples, ...
            _ => None,
        }
    }

    fn parse_path_type(&self, path: &syn::Path) -> Option<Elem> {
        let last = path.segments.last()?;
        let last_name = last.ident.to_string();

        if let syn::PathArguments::AngleBracketed(args) = &last.arguments {
            let tys: Vec<&syn::Type> = args
                .args
                .iter()
                .filter_map(|a| match a {
                    syn::GenericArgument::Type(t) => Some(t),
                    _ => None,
                })
                .collect();
            return match (last_name.as_str(), tys.len()) {
                ("Option", 1) => {
                    let value = self.parse_expr(tys[0])?;
                    Some(Elem::Ptr(Ptr {
                        common: Common::default(),
                        bind: String::new(),
                        value: Box::new(value),
                    }))
                }
                ("Vec", 1) => {
                    // special case for byte vectors
                    if type_is_ident(tys[0], "u8") || type_is_ident(tys[0], "byte") {
                        return Some(Elem::Base(BaseElem::new(Kind::Bytes)));
                    }
                    let els = self.parse_expr(tys[0])?;
                    Some(Elem::Slice(Slice {
                        common: Common::default(),
                        index: String::new(),
                        els: Box::new(els),
                    }))
                }
                ("HashMap", 2) => {
                    if !type_is_ident(tys[0], "String") {
                        diag::warn("map keys must be String");
                        return None;
                    }
                    let value = self.parse_expr(tys[1])?;
                    Some(Elem::Map(Map {
                        common: Common::default(),
                        key_idx: String::new(),
                        val_idx: String::new(),
                        value: Box::new(value),
                    }))
                }
                _ => None,
            };
        }

        let name = path_text(path);
        let b = ir::ident(&name);
        if b.kind == Kind::Ident
            && path.segments.len() == 1
            && !self.specs.contains_key(&name)
        {
            diag::warn(&format!("non-local identifier: {}", name));
        }
        Some(Elem::Base(b))
    }

    /// Applies the file-level directives; per-pass directives stay behind
    /// for `apply_dirs`.
    fn apply_directives(&mut self) {
        let dirs = std::mem::take(&mut self.directives);
        let mut remaining = Vec::new();
        for d in dirs {
            let handled = {
                let chunks: Vec<&str> = d.split_whitespace().collect();
                match chunks.first().copied().and_then(directives::handler) {
                    Some(h) => {
                        let _g = diag::scope(chunks[0]);
                        if let Err(e) = h(&chunks, self) {
                            diag::warn(&e);
                        }
                        true
                    }
                    None => false,
                }
            };
            if !handled {
                remaining.push(d);
            }
        }
        self.directives = remaining;
    }

    /// Applies directives of the form `//mpack:<pass> ignore <Pat>...`.
    pub fn apply_dirs(&self, gs: &mut GeneratorSet) {
        for d in &self.directives {
            let chunks: Vec<&str> = d.split_whitespace().collect();
            if chunks.len() > 1 {
                let Some(m) = Method::from_pass_name(chunks[0]) else {
                    diag::warn(&format!("unknown pass name: {:?}", chunks[0]));
                    continue;
                };
                match chunks[1] {
                    "ignore" => {
                        let _g = diag::scope(chunks[1]);
                        if let Err(e) = directives::pass_ignore(m, &chunks[2..], gs) {
                            diag::warn(&format!("error applying directive: {}", e));
                        }
                    }
                    other => diag::warn(&format!("unrecognized directive {:?}", other)),
                }
            } else {
                diag::warn(&format!("empty directive: {:?}", d));
            }
        }
    }

    /// Emits every identity, in ascending order by canonical name.
    pub fn print_to(
        &self,
        gs: &mut GeneratorSet,
        out: &mut dyn Write,
        mut tests: Option<&mut dyn Write>,
    ) -> io::Result<()> {
        let mut first_err: Option<io::Error> = None;
        for (name, el) in &self.identities {
            if self.transparent.contains(name) {
                continue;
            }
            let mut el = el.clone();
            let _g = diag::scope(&el.type_name());
            let tests_reborrow = match tests {
                Some(ref mut t) => Some(&mut **t as &mut dyn Write),
                None => None,
            };
            if let Err(e) = gs.print(&mut el, &mut *out, tests_reborrow) {
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

    /// Whether `name` is a transparent alias (resolution-only).
    pub fn is_transparent(&self, name: &str) -> bool {
        self.transparent.contains(name)
    }
}

#[derive(Default)]
struct FieldMeta {
    tag: Option<String>,
    skip: bool,
    extension: bool,
    raw: String,
}

impl FieldMeta {
    fn parse(f: &syn::Field) -> FieldMeta {
        use quote::ToTokens;

        let mut meta = FieldMeta::default();
        for attr in &f.attrs {
            if !attr.path().is_ident("mpack") {
                continue;
            }
            meta.raw = attr.to_token_stream().to_string();
            let res = attr.parse_nested_meta(|nested| {
                if nested.path.is_ident("tag") {
                    let lit: syn::LitStr = nested.value()?.parse()?;
                    meta.tag = Some(lit.value());
                    Ok(())
                } else if nested.path.is_ident("skip") {
                    meta.skip = true;
                    Ok(())
                } else if nested.path.is_ident("extension") {
                    meta.extension = true;
                    Ok(())
                } else {
                    Err(nested.error("unrecognized mpack attribute"))
                }
            });
            if let Err(e) = res {
                diag::warn(&format!("bad mpack attribute: {}", e));
            }
        }
        // The "-" sentinel also omits the field.
        if meta.tag.as_deref() == Some("-") {
            meta.skip = true;
        }
        meta
    }
}

fn type_is_ident(ty: &syn::Type, name: &str) -> bool {
    match ty {
        syn::Type::Path(tp) => tp.qself.is_none() && tp.path.is_ident(name),
        _ => false,
    }
}

fn path_text(path: &syn::Path) -> String {
    path.segments
        .iter()
        .map(|s| s.ident.to_string())
        .collect::<Vec<_>>()
        .join("::")
}

/// The textual size of a fixed array: a literal, a named const, or a
/// qualified path.
fn array_len_text(e: &syn::Expr) -> Option<String> {
    match e {
        syn::Expr::Lit(l) => match &l.lit {
            syn::Lit::Int(i) => Some(i.base10_digits().to_string()),
            _ => None,
        },
        syn::Expr::Path(p) if p.qself.is_none() => Some(path_text(&p.path)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_str, ParsedSource};

    fn build(src: &str) -> Source {
        let mut parsed = ParsedSource::default();
        parse_str(src, "test.rs", &mut parsed, false).unwrap();
        Source::from_parsed(parsed)
    }

    #[test]
    fn alias_chains_collapse_to_one_level() {
        let s = build(
            r#"
pub struct A(pub u64);
pub struct B(pub A);
pub struct C(pub B);
pub struct D(pub C);
"#,
        );
        let Some(Elem::Base(b)) = s.identities.get("D") else {
            panic!("D should resolve to a base element");
        };
        assert_eq!(b.kind, Kind::U64);
        assert_eq!(b.type_name(), "D");
        assert!(b.convert);
    }

    #[test]
    fn unresolved_references_are_dropped() {
        let s = build("pub struct A(pub Missing);");
        assert!(!s.identities.contains_key("A"));
    }

    #[test]
    fn byte_vectors_become_the_bytes_primitive() {
        let s = build("pub struct T { pub body: Vec<u8>, pub items: Vec<u16> }");
        let Some(Elem::Struct(st)) = s.identities.get("T") else {
            panic!()
        };
        assert!(matches!(
            &st.fields[0].field_elem,
            Elem::Base(b) if b.kind == Kind::Bytes
        ));
        assert!(matches!(&st.fields[1].field_elem, Elem::Slice(_)));
    }

    #[test]
    fn non_string_map_keys_drop_the_field() {
        let s = build(
            "use std::collections::HashMap;\npub struct T { pub m: HashMap<u32, String>, pub ok: u8 }",
        );
        let Some(Elem::Struct(st)) = s.identities.get("T") else {
            panic!()
        };
        assert_eq!(st.fields.len(), 1);
        assert_eq!(st.fields[0].field_name, "ok");
    }

    #[test]
    fn field_attributes_control_tag_skip_and_extension() {
        let s = build(
            r#"
pub struct T {
    #[mpack(tag = "wire_name")]
    pub renamed: u32,
    #[mpack(skip)]
    pub hidden: u32,
    #[mpack(tag = "-")]
    pub hidden2: u32,
    #[mpack(extension)]
    pub ext: SomeExt,
}
pub struct SomeExt(pub u64);
"#,
        );
        let Some(Elem::Struct(st)) = s.identities.get("T") else {
            panic!()
        };
        assert_eq!(st.fields.len(), 2);
        assert_eq!(st.fields[0].field_tag, "wire_name");
        assert_eq!(st.fields[0].field_name, "renamed");
        assert!(matches!(
            &st.fields[1].field_elem,
            Elem::Base(b) if b.kind == Kind::Ext
        ));
    }

    #[test]
    fn small_types_inline_into_parents() {
        let s = build(
            r#"
pub struct Inner(pub [i32; 4]);
pub struct Outer {
    pub inner: Inner,
}
"#,
        );
        let Some(Elem::Struct(st)) = s.identities.get("Outer") else {
            panic!()
        };
        // Inner has complexity 2, below the threshold, so the reference is
        // replaced by the array itself.
        assert!(matches!(&st.fields[0].field_elem, Elem::Array(_)));
    }

    #[test]
    fn complex_types_stay_behind_a_method_call() {
        let s = build(
            r#"
use std::collections::HashMap;
pub struct Heavy {
    pub a: HashMap<String, Vec<String>>,
    pub b: Option<String>,
    pub c: u8,
}
pub struct Outer {
    pub h: Heavy,
}
"#,
        );
        let Some(Elem::Struct(st)) = s.identities.get("Outer") else {
            panic!()
        };
        assert!(matches!(
            &st.fields[0].field_elem,
            Elem::Base(b) if b.kind == Kind::Ident
        ));
    }

    #[test]
    fn transparent_aliases_resolve_but_do_not_emit() {
        let s = build(
            r#"
pub type Id = u64;
pub struct T {
    pub id: Id,
}
"#,
        );
        assert!(s.is_transparent("Id"));
        let Some(Elem::Struct(st)) = s.identities.get("T") else {
            panic!()
        };
        // The alias inlines as a plain primitive with no conversion.
        assert!(matches!(
            &st.fields[0].field_elem,
            Elem::Base(b) if b.kind == Kind::U64 && !b.convert
        ));
    }

    #[test]
    fn tuple_directive_flips_struct_mode() {
        let s = build(
            r#"
//mpack:tuple Pair
pub struct Pair {
    pub a: u32,
    pub b: u32,
}
"#,
        );
        let Some(Elem::Struct(st)) = s.identities.get("Pair") else {
            panic!()
        };
        assert!(st.as_tuple);
    }

    #[test]
    fn ignore_directive_removes_types() {
        let s = build(
            r#"
//mpack:ignore reg=^Temp
pub struct TempA {
    pub a: u32,
}
pub struct Kept {
    pub a: u32,
}
"#,
        );
        assert!(!s.identities.contains_key("TempA"));
        assert!(s.identities.contains_key("Kept"));
    }

    #[test]
    fn shim_directive_replaces_references() {
        let s = build(
            r#"
//mpack:shim SpecialId as:Vec<u8> using:to_bytes/from_bytes mode:cast
pub struct T {
    pub id: SpecialId,
}
"#,
        );
        let Some(Elem::Struct(st)) = s.identities.get("T") else {
            panic!()
        };
        let Elem::Base(b) = &st.fields[0].field_elem else {
            panic!("shimmed field should be a base element");
        };
        assert_eq!(b.kind, Kind::Bytes);
        assert!(b.convert);
        assert_eq!(b.shim_to.as_deref(), Some("to_bytes"));
        assert_eq!(b.shim_from.as_deref(), Some("from_bytes"));
    }
}
