//! Binary entry point: parse arguments, set up structured logging, run the
//! build, and translate the result into a process exit code.
//!
//! Grounded in the teacher's `main.rs` (`tracing_subscriber::fmt` plus an
//! `EnvFilter` installed once, a `Bash`/`BashOptions` pair run from inside
//! `main`) and `original_source/jjmake/main.cpp`'s argument-parse-then-run
//! shape.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use jjmake::{Arguments, JjmakeContext};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let arguments = Arguments::parse();

    let pwd = match std::env::current_dir() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("jjmake: unable to determine current directory: {e}");
            std::process::exit(1);
        }
    };

    let context = JjmakeContext::new(pwd as PathBuf);
    match context.run(&arguments) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("jjmake: {e}");
            std::process::exit(1);
        }
    }
}
