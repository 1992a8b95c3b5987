//! Compile-level smoke test: builds a scratch crate around the generated
//! output and runs its generated round-trip tests, proving the emitted code
//! type-checks and the encode/decode pairs agree (not just that the text
//! parses).

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use mpack_gen::{run_data, Method};

fn full_mode() -> Method {
    Method::DECODE
        | Method::ENCODE
        | Method::MARSHAL
        | Method::UNMARSHAL
        | Method::SIZE
        | Method::TEST
}

/// Runs `cargo test` in `dir`, preferring the warm local cache.
fn cargo_test(dir: &Path) -> Result<(), String> {
    let mut last = String::new();
    for offline in [true, false] {
        let mut cmd = Command::new("cargo");
        cmd.arg("test").current_dir(dir);
        if offline {
            cmd.arg("--offline");
        }
        let output = cmd.output().map_err(|e| format!("spawning cargo: {}", e))?;
        if output.status.success() {
            return Ok(());
        }
        last = format!(
            "cargo test{} failed:\n--- stdout ---\n{}\n--- stderr ---\n{}",
            if offline { " --offline" } else { "" },
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        );
    }
    Err(last)
}

#[test]
fn generated_output_compiles_and_round_trips() {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let schema_path = manifest_dir.join("testdata/roundtrip.rs");
    let out = run_data(&schema_path, full_mode(), false).expect("run_data");

    let mpack_path = manifest_dir
        .join("../mpack")
        .canonicalize()
        .expect("locate the mpack crate");

    // Assemble a detached scratch crate: schema types at the root, the
    // generated module beside them, the generated tests under cfg(test).
    let scratch: PathBuf =
        std::env::temp_dir().join(format!("mpack-gen-smoke-{}", std::process::id()));
    let src = scratch.join("src");
    fs::create_dir_all(&src).expect("create scratch crate");

    fs::write(
        scratch.join("Cargo.toml"),
        format!(
            "[package]\nname = \"mpack-gen-smoke\"\nversion = \"0.0.0\"\nedition = \"2021\"\n\n\
             [dependencies]\nmpack = {{ path = {:?} }}\n\n[workspace]\n",
            mpack_path
        ),
    )
    .expect("write scratch manifest");

    let schema = fs::read_to_string(&schema_path).expect("read schema");
    let lib = format!(
        "{}\nmod gen;\n#[cfg(test)]\nmod gen_test;\n",
        schema
    );
    fs::write(src.join("lib.rs"), lib).expect("write lib.rs");
    fs::write(src.join("gen.rs"), &out.main).expect("write gen.rs");
    fs::write(src.join("gen_test.rs"), out.tests.as_deref().expect("tests requested"))
        .expect("write gen_test.rs");

    let result = cargo_test(&scratch);
    let _ = fs::remove_dir_all(&scratch);
    if let Err(e) = result {
        panic!("{}", e);
    }
}
