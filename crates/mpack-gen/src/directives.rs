//! Directive handlers.
//!
//! Directives are comment lines of the form `//mpack:<name> <arg>...`.
//! File-level directives (`shim`, `ignore`, `tuple`) mutate the source's
//! identities; per-pass directives (`//mpack:<pass> ignore <Pat>...`) add
//! transforms to individual passes.

use regex::Regex;

use crate::diag;
use crate::emit::{ignore_typename, GeneratorSet, Method};
use crate::inline;
use crate::ir::{self, Elem, ShimMode};
use crate::source::Source;

/// A file-level directive handler.
pub(crate) type Directive = fn(&[&str], &mut Source) -> Result<(), String>;

/// Looks up the handler for a directive name.
pub(crate) fn handler(name: &str) -> Option<Directive> {
    match name {
        "shim" => Some(apply_shim),
        "ignore" => Some(ignore),
        "tuple" => Some(astuple),
        _ => None,
    }
}

/// A compiled type-name pattern: a literal name, a regex (`reg=`), or a
/// negated regex (`reg!=`).
#[derive(Debug, Clone)]
pub enum TypePattern {
    Literal(String),
    Matching(Regex),
    NotMatching(Regex),
}

impl TypePattern {
    pub fn compile(pattern: &str) -> Result<TypePattern, regex::Error> {
        if let Some(re) = pattern.strip_prefix("reg!=") {
            return Ok(TypePattern::NotMatching(Regex::new(re)?));
        }
        if let Some(re) = pattern.strip_prefix("reg=") {
            return Ok(TypePattern::Matching(Regex::new(re)?));
        }
        Ok(TypePattern::Literal(pattern.to_string()))
    }

    /// Whether `type_name` satisfies the pattern. Regex matches (including
    /// negated ones) report an informational diagnostic.
    pub fn matches(&self, type_name: &str) -> bool {
        match self {
            TypePattern::Literal(l) => l == type_name,
            TypePattern::Matching(re) => {
                if re.is_match(type_name) {
                    diag::info(&format!(
                        "matched regexp {:?} to type {:?}",
                        re.as_str(),
                        type_name
                    ));
                    return true;
                }
                false
            }
            TypePattern::NotMatching(re) => {
                if !re.is_match(type_name) {
                    diag::info(&format!(
                        "matched negated regexp {:?} to type {:?}",
                        re.as_str(),
                        type_name
                    ));
                    return true;
                }
                false
            }
        }
    }
}

/// `//mpack:shim {Type} as:{Base} using:{to_fn/from_fn} mode:{cast|convert}`
fn apply_shim(text: &[&str], s: &mut Source) -> Result<(), String> {
    if text.len() < 4 || text.len() > 5 {
        return Err(format!(
            "shim directive should have 3 or 4 arguments; found {}",
            text.len() - 1
        ));
    }

    let mut name = text[1].trim();
    let as_part = text[2].trim();
    let as_part = as_part.strip_prefix("as:").unwrap_or(as_part);
    let mut be = ir::ident(as_part);
    if let Some(stripped) = name.strip_prefix('*') {
        name = stripped;
        be.set_needs_ref(true);
    }
    be.set_alias(name);

    let use_part = text[3].trim();
    let use_part = use_part.strip_prefix("using:").unwrap_or(use_part);
    let methods: Vec<&str> = use_part.split('/').collect();
    if methods.len() != 2 {
        return Err(format!(
            "expected 2 using:{{}} methods; found {} ({:?})",
            methods.len(),
            text[3]
        ));
    }
    be.shim_to = Some(methods[0].to_string());
    be.shim_from = Some(methods[1].to_string());
    be.convert = true;

    if text.len() == 5 {
        let mode_part = text[4].trim();
        let mode_part = mode_part.strip_prefix("mode:").unwrap_or(mode_part);
        be.shim_mode = match mode_part {
            "cast" => ShimMode::Cast,
            "convert" => ShimMode::Convert,
            other => {
                return Err(format!(
                    "invalid shim mode; found {}, expected 'cast' or 'convert'",
                    other
                ))
            }
        };
    }

    diag::info(&format!("{} -> {}", name, be.kind.suffix()));
    inline::find_shim(s, name, &be);
    Ok(())
}

/// `//mpack:ignore {TypeA} {TypeB}...`. Patterns may be literals or
/// regexes.
fn ignore(text: &[&str], s: &mut Source) -> Result<(), String> {
    for pattern in &text[1..] {
        let pat = TypePattern::compile(pattern.trim()).map_err(|e| e.to_string())?;
        let matched: Vec<String> = s
            .identities
            .iter()
            .filter(|(_, el)| pat.matches(&el.type_name()))
            .map(|(name, _)| name.clone())
            .collect();
        for name in matched {
            diag::info(&format!("ignoring {}", name));
            s.identities.remove(&name);
        }
    }
    Ok(())
}

/// `//mpack:tuple {TypeA} {TypeB}...`
fn astuple(text: &[&str], s: &mut Source) -> Result<(), String> {
    for item in &text[1..] {
        let name = item.trim();
        if let Some(el) = s.identities.get_mut(name) {
            if let Elem::Struct(st) = el {
                st.as_tuple = true;
                diag::info(name);
            } else {
                diag::warn(&format!("{}: only structs can be tuples", name));
            }
        }
    }
    Ok(())
}

/// The per-pass `ignore` directive: removes matching types from one pass.
pub(crate) fn pass_ignore(
    m: Method,
    patterns: &[&str],
    gs: &mut GeneratorSet,
) -> Result<(), String> {
    let _g = diag::scope(&m.to_string());
    for pattern in patterns {
        let pat = TypePattern::compile(pattern.trim()).map_err(|e| e.to_string())?;
        gs.apply_directive(m, ignore_typename(pat));
        diag::info(&format!("ignoring {}", pattern));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patterns_compile_and_match() {
        let lit = TypePattern::compile("Foo").unwrap();
        assert!(lit.matches("Foo"));
        assert!(!lit.matches("FooBar"));

        let re = TypePattern::compile("reg=^Foo.*$").unwrap();
        assert!(re.matches("FooBar"));
        assert!(!re.matches("Bar"));

        let neg = TypePattern::compile("reg!=^Foo").unwrap();
        assert!(neg.matches("Bar"));
        assert!(!neg.matches("FooBar"));
    }
}
