//! Command-line front end for the generator.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use mpack_gen::{run, Method};

/// Generate MessagePack serialization code for Rust type declarations.
#[derive(Debug, Parser)]
#[command(name = "mpack-gen", version)]
struct Args {
    /// Input file or directory (falls back to $MPACK_FILE)
    #[arg(long = "file", short = 'f')]
    file: Option<PathBuf>,

    /// Output file name (default: <input>_gen.rs)
    #[arg(long = "out", short = 'o')]
    out: Option<PathBuf>,

    /// Create streaming encode_msg/decode_msg methods
    #[arg(long = "io", default_value_t = true, action = clap::ArgAction::Set)]
    io: bool,

    /// Create marshal_msg/unmarshal_msg methods
    #[arg(long = "marshal", default_value_t = true, action = clap::ArgAction::Set)]
    marshal: bool,

    /// Create round-trip tests
    #[arg(long = "tests", default_value_t = true, action = clap::ArgAction::Set)]
    tests: bool,

    /// Also process non-pub types
    #[arg(long = "unexported", default_value_t = false)]
    unexported: bool,
}

fn main() -> ExitCode {
    mpack_gen::logger::init(log::LevelFilter::Info);

    let args = Args::parse();

    let file = match args.file.or_else(|| std::env::var_os("MPACK_FILE").map(PathBuf::from)) {
        Some(f) => f,
        None => {
            eprintln!("{}", "No file to parse.".red());
            return ExitCode::FAILURE;
        }
    };

    let mut mode = Method::NONE;
    if args.io {
        mode |= Method::ENCODE | Method::DECODE | Method::SIZE;
    }
    if args.marshal {
        mode |= Method::MARSHAL | Method::UNMARSHAL | Method::SIZE;
    }
    if args.tests {
        mode |= Method::TEST;
    }

    if mode.without_test().is_none() {
        eprintln!(
            "{}",
            "No methods to generate; --io=false && --marshal=false".red()
        );
        return ExitCode::FAILURE;
    }

    if let Err(e) = run(&file, args.out.as_deref(), mode, args.unexported) {
        eprintln!("{}", e.to_string().red());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
