//! Type-information propagation between declarations.
//!
//! After the build pass, every non-primitive reference is serialized through
//! a method call on the referenced type. Here small referenced types are
//! pushed into the caller's tree instead, so types like
//!
//! ```text
//! struct A(pub [i32; 4]);
//! ```
//!
//! serialize inline in their parents, while heavier types keep the call.
//! Shim substitution reuses the same structural traversal.

use std::collections::BTreeMap;

use crate::diag;
use crate::ir::{BaseElem, Elem, Kind};
use crate::source::Source;

/// The inlining threshold: trees at least this complex stay behind a method
/// call.
const MAX_COMPLEX: usize = 5;

/// Replaces every reachable reference to `id` with a copy of the shim base
/// `be`, and installs the shim as the identity for `id` itself.
pub(crate) fn find_shim(s: &mut Source, id: &str, be: &BaseElem) {
    let names: Vec<String> = s.identities.keys().cloned().collect();
    for name in names {
        let _g = diag::scope(&name);
        if let Some(el) = s.identities.get_mut(&name) {
            match el {
                Elem::Struct(st) => {
                    for f in &mut st.fields {
                        next_shim(&mut f.field_elem, id, be);
                    }
                }
                Elem::Array(a) => next_shim(&mut a.els, id, be),
                Elem::Slice(sl) => next_shim(&mut sl.els, id, be),
                Elem::Map(m) => next_shim(&mut m.value, id, be),
                Elem::Ptr(p) => next_shim(&mut p.value, id, be),
                Elem::Base(_) => {}
            }
        }
    }
    // The shim applies at the top level as well.
    s.identities.insert(id.to_string(), Elem::Base(be.clone()));
}

fn next_shim(r: &mut Elem, id: &str, be: &BaseElem) {
    if r.type_name() == id {
        let vn = r.varname().to_string();
        *r = Elem::Base(be.clone());
        if let Elem::Base(b) = r {
            b.set_varname_base(&vn);
        }
        return;
    }
    match r {
        Elem::Struct(st) => {
            for f in &mut st.fields {
                next_shim(&mut f.field_elem, id, be);
            }
        }
        Elem::Array(a) => next_shim(&mut a.els, id, be),
        Elem::Slice(sl) => next_shim(&mut sl.els, id, be),
        Elem::Map(m) => next_shim(&mut m.value, id, be),
        Elem::Ptr(p) => next_shim(&mut p.value, id, be),
        Elem::Base(_) => {}
    }
}

/// Identifies and inlines candidates across all identities.
pub(crate) fn prop_inline(s: &mut Source) {
    let names: Vec<String> = s.identities.keys().cloned().collect();
    for name in names {
        // The entry is detached while its subtree is rewritten; lookups of
        // other identities read the rest of the map.
        if let Some(mut el) = s.identities.remove(&name) {
            let _g = diag::scope(&name);
            match &mut el {
                Elem::Struct(st) => {
                    for f in &mut st.fields {
                        next_inline(&mut f.field_elem, &s.identities, &name);
                    }
                }
                Elem::Array(a) => next_inline(&mut a.els, &s.identities, &name),
                Elem::Slice(sl) => next_inline(&mut sl.els, &s.identities, &name),
                Elem::Map(m) => next_inline(&mut m.value, &s.identities, &name),
                Elem::Ptr(p) => next_inline(&mut p.value, &s.identities, &name),
                Elem::Base(_) => {}
            }
            s.identities.insert(name, el);
        }
    }
}

fn next_inline(r: &mut Elem, identities: &BTreeMap<String, Elem>, root: &str) {
    match r {
        Elem::Base(b) => {
            let typ = b.type_name();
            // Never inline a type into itself.
            if b.kind == Kind::Ident && typ != root {
                match identities.get(&typ) {
                    Some(node) if node.complexity() < MAX_COMPLEX => {
                        diag::info(&format!("inlining {}", typ));
                        let node_root = node.type_name();
                        *r = node.clone();
                        next_inline(r, identities, &node_root);
                    }
                    Some(_) => {}
                    None => {
                        if !b.resolved() {
                            // Neither a primitive, a library built-in, nor a
                            // processed type.
                            diag::warn(&format!("unresolved identifier: {}", typ));
                        }
                    }
                }
            }
        }
        Elem::Struct(st) => {
            for f in &mut st.fields {
                next_inline(&mut f.field_elem, identities, root);
            }
        }
        Elem::Array(a) => next_inline(&mut a.els, identities, root),
        Elem::Slice(sl) => next_inline(&mut sl.els, identities, root),
        Elem::Map(m) => next_inline(&mut m.value, identities, root),
        Elem::Ptr(p) => next_inline(&mut p.value, identities, root),
    }
}
