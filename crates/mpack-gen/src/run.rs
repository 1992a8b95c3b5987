//! File-level entry points: parse a schema, run the pipeline, and write the
//! generated module (plus its test module) next to the input.

use std::io::Write;
use std::path::{Path, PathBuf};

use colored::Colorize;
use thiserror::Error;

use crate::emit::{GeneratorSet, Method};
use crate::parser::{self, ParseError};
use crate::source::Source;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("no methods to generate; --io=false and --marshal=false")]
    NoMethods,
    #[error("no types requiring code generation were found")]
    NoTypes,
    #[error("writing output: {0}")]
    Write(#[source] std::io::Error),
    #[error("emitting code: {0}")]
    Emit(#[source] std::io::Error),
}

/// The buffers produced by one run.
pub struct RunOutput {
    pub main: Vec<u8>,
    pub tests: Option<Vec<u8>>,
}

/// Generates the selected methods for every type in `src_path` and writes
/// the result next to the input (or to `output_path` when given). Test code
/// goes to a sibling `_test` module.
pub fn run(
    src_path: &Path,
    output_path: Option<&Path>,
    mode: Method,
    unexported: bool,
) -> Result<(), RunError> {
    let out = run_data(src_path, mode, unexported)?;

    let main_path = match output_path {
        Some(p) => p.to_path_buf(),
        None => default_output_path(src_path),
    };
    println!("{}", format!("   Writing file: {}", main_path.display()).magenta());
    std::fs::write(&main_path, &out.main).map_err(RunError::Write)?;

    if let Some(tests) = &out.tests {
        let test_path = test_file_path(&main_path);
        println!("{}", format!("   Writing file: {}", test_path.display()).magenta());
        std::fs::write(&test_path, tests).map_err(RunError::Write)?;
    }
    Ok(())
}

/// Like [`run`], but returns the generated buffers instead of writing files.
pub fn run_data(src_path: &Path, mode: Method, unexported: bool) -> Result<RunOutput, RunError> {
    if mode.without_test().is_none() {
        return Err(RunError::NoMethods);
    }

    let parsed = parser::parse_path(src_path, unexported)?;
    let source = Source::from_parsed(parsed);
    if source.identities.is_empty() {
        return Err(RunError::NoTypes);
    }

    println!(
        "{}",
        "======= MessagePack Code Generating =======".magenta()
    );
    println!("{}", format!("   Input: {}", src_path.display()).magenta());

    let mut main_buf = Vec::new();
    write_header(&mut main_buf, &source.package, &source.imports).map_err(RunError::Emit)?;

    let mut tests_buf = if mode.is_set(Method::TEST) {
        let mut buf = Vec::new();
        write_header(&mut buf, &source.package, &[]).map_err(RunError::Emit)?;
        writeln!(
            buf,
            "// The tested types must derive Default, Debug, and PartialEq."
        )
        .map_err(RunError::Emit)?;
        Some(buf)
    } else {
        None
    };

    let mut gs = GeneratorSet::new(mode);
    source.apply_dirs(&mut gs);
    source
        .print_to(
            &mut gs,
            &mut main_buf,
            tests_buf.as_mut().map(|b| b as &mut dyn Write),
        )
        .map_err(RunError::Emit)?;

    Ok(RunOutput {
        main: main_buf,
        tests: tests_buf,
    })
}

/// `<input>_gen.rs` for a file, `mpack_gen.rs` inside a directory.
fn default_output_path(src_path: &Path) -> PathBuf {
    if src_path.is_dir() {
        return src_path.join("mpack_gen.rs");
    }
    let stem = src_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mpack".to_string());
    src_path.with_file_name(format!("{}_gen.rs", stem))
}

/// `foo_gen.rs` -> `foo_gen_test.rs`
fn test_file_path(main_path: &Path) -> PathBuf {
    let stem = main_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "mpack_gen".to_string());
    main_path.with_file_name(format!("{}_test.rs", stem))
}

/// The module header: a provenance comment, the sibling-module import, and
/// the schema's own `use` items forwarded verbatim (de-duplicated).
fn write_header(buf: &mut Vec<u8>, package: &str, imports: &[String]) -> std::io::Result<()> {
    writeln!(
        buf,
        "// Code generated by mpack-gen for module {}. DO NOT EDIT.",
        package
    )?;
    writeln!(buf)?;
    writeln!(buf, "#[allow(unused_imports)]\nuse super::*;")?;
    writeln!(buf, "#[allow(unused_imports)]\nuse mpack::Extension as _;")?;

    let mut seen = Vec::new();
    for imp in imports {
        if seen.contains(imp) {
            continue;
        }
        seen.push(imp.clone());
        writeln!(buf, "#[allow(unused_imports)]\n{}", imp)?;
    }
    writeln!(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_paths_follow_the_input_name() {
        assert_eq!(
            default_output_path(Path::new("src/defs.rs")),
            PathBuf::from("src/defs_gen.rs")
        );
        assert_eq!(
            test_file_path(Path::new("src/defs_gen.rs")),
            PathBuf::from("src/defs_gen_test.rs")
        );
    }
}
