//! Raw declaration collection.
//!
//! Scans schema files for `//mpack:` directive comments, collects `use`
//! items verbatim, and gathers the raw type declarations with `syn`. No IR
//! is built here; translation happens in `source`.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use quote::ToTokens;
use thiserror::Error;

use crate::diag;

/// The magic comment prefix introducing a directive line.
pub const DIRECTIVE_PREFIX: &str = "//mpack:";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path}: {source}")]
    Syn {
        path: String,
        #[source]
        source: syn::Error,
    },
    #[error("no definitions in {0}")]
    Empty(String),
}

/// One raw type declaration, before IR translation.
#[derive(Debug, Clone)]
pub enum RawDecl {
    /// `struct Name { ... }` with named fields.
    Struct(syn::ItemStruct),
    /// `struct Name(pub Inner);`, a named wrapper over a single type.
    Newtype(syn::Type),
    /// `type Name = T;`, a transparent alias used for resolution only.
    Alias(syn::Type),
}

/// Everything collected from one schema file or directory.
#[derive(Debug, Default)]
pub struct ParsedSource {
    /// Identifier naming the emitted output group (from the file stem).
    pub package: String,
    pub decls: BTreeMap<String, RawDecl>,
    /// Directive lines, stripped of the comment prefix, in file order.
    pub directives: Vec<String>,
    /// `use` items rendered back to text, forwarded into the output header.
    pub imports: Vec<String>,
}

/// Parses the file at `path`, or every `.rs` file in it if it is a
/// directory. When `unexported` is false only `pub` declarations are
/// collected.
pub fn parse_path(path: &Path, unexported: bool) -> Result<ParsedSource, ParseError> {
    let display = path.display().to_string();
    let _g = diag::scope(&display);
    let mut out = ParsedSource::default();

    let meta = fs::metadata(path).map_err(|e| ParseError::Io {
        path: display.clone(),
        source: e,
    })?;

    if meta.is_dir() {
        out.package = sanitize_ident(
            &path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "generated".to_string()),
        );
        let mut files: Vec<_> = fs::read_dir(path)
            .map_err(|e| ParseError::Io {
                path: display.clone(),
                source: e,
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|x| x == "rs").unwrap_or(false))
            .collect();
        files.sort();
        for f in files {
            let fd = f.display().to_string();
            let _g = diag::scope(&fd);
            let src = fs::read_to_string(&f).map_err(|e| ParseError::Io {
                path: fd.clone(),
                source: e,
            })?;
            parse_str(&src, &fd, &mut out, unexported)?;
        }
    } else {
        out.package = sanitize_ident(
            &path
                .file_stem()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "generated".to_string()),
        );
        let src = fs::read_to_string(path).map_err(|e| ParseError::Io {
            path: display.clone(),
            source: e,
        })?;
        parse_str(&src, &display, &mut out, unexported)?;
    }

    if out.decls.is_empty() {
        return Err(ParseError::Empty(display));
    }
    Ok(out)
}

/// Parses one schema source string into `out`.
pub fn parse_str(
    src: &str,
    path: &str,
    out: &mut ParsedSource,
    unexported: bool,
) -> Result<(), ParseError> {
    out.directives.extend(yield_directives(src));

    let file = syn::parse_file(src).map_err(|e| ParseError::Syn {
        path: path.to_string(),
        source: e,
    })?;

    for item in &file.items {
        match item {
            syn::Item::Use(u) => out.imports.push(render_item(u)),
            syn::Item::Struct(s) => {
                if !unexported && !is_public(&s.vis) {
                    continue;
                }
                let name = s.ident.to_string();
                let _g = diag::scope(&name);
                match &s.fields {
                    syn::Fields::Named(_) => {
                        out.decls.insert(name, RawDecl::Struct(s.clone()));
                    }
                    syn::Fields::Unnamed(u) if u.unnamed.len() == 1 => {
                        out.decls
                            .insert(name, RawDecl::Newtype(u.unnamed[0].ty.clone()));
                    }
                    syn::Fields::Unnamed(_) => {
                        diag::warn("tuple structs with more than one field are not supported");
                    }
                    syn::Fields::Unit => {
                        diag::warn("unit structs are not supported");
                    }
                }
            }
            syn::Item::Type(t) => {
                if !unexported && !is_public(&t.vis) {
                    continue;
                }
                out.decls
                    .insert(t.ident.to_string(), RawDecl::Alias((*t.ty).clone()));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Finds all comment lines that begin with the directive prefix.
fn yield_directives(src: &str) -> Vec<String> {
    src.lines()
        .filter_map(|line| line.trim_start().strip_prefix(DIRECTIVE_PREFIX))
        .map(|rest| rest.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

fn is_public(vis: &syn::Visibility) -> bool {
    matches!(vis, syn::Visibility::Public(_))
}

fn sanitize_ident(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Renders a collected item back to compact source text.
fn render_item<T: ToTokens>(item: &T) -> String {
    let mut s = item.to_token_stream().to_string();
    for (from, to) in [
        (" :: ", "::"),
        ("{ ", "{"),
        (" }", "}"),
        (" ,", ","),
        (" ;", ";"),
    ] {
        s = s.replace(from, to);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_and_decls_are_collected() {
        let src = r#"
//mpack:tuple Pair
//mpack:ignore Hidden

use std::collections::HashMap;

pub struct Pair {
    pub a: u32,
    pub b: u32,
}

pub struct Wrapper(pub u64);

pub type Alias = u64;

struct Private {
    x: u8,
}
"#;
        let mut out = ParsedSource::default();
        parse_str(src, "test.rs", &mut out, false).unwrap();

        assert_eq!(out.directives, vec!["tuple Pair", "ignore Hidden"]);
        assert!(matches!(out.decls.get("Pair"), Some(RawDecl::Struct(_))));
        assert!(matches!(out.decls.get("Wrapper"), Some(RawDecl::Newtype(_))));
        assert!(matches!(out.decls.get("Alias"), Some(RawDecl::Alias(_))));
        assert!(!out.decls.contains_key("Private"), "private types are skipped");
        assert_eq!(out.imports.len(), 1);
        assert!(out.imports[0].contains("std::collections::HashMap"));
    }

    #[test]
    fn unexported_flag_includes_private_types() {
        let src = "struct Private { x: u8 }";
        let mut out = ParsedSource::default();
        parse_str(src, "test.rs", &mut out, true).unwrap();
        assert!(out.decls.contains_key("Private"));
    }
}
