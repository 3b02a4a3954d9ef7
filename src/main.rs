// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Cinder - compiler and stack virtual machine
//!
//! This is the main entry point for the cinder CLI/REPL.
//!
//! ## Features
//!
//! - Run source files or inline snippets
//! - Dump and run textual bytecode listings
//! - Interactive REPL with history

mod repl;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cinder_engine::{AsyncEngine, Engine, EngineConfig, Error};
use clap::Parser;
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cinder",
    about = "Compiler and stack virtual machine for the Cinder language",
    version,
    author = "Pegasus Heavy Industries"
)]
struct Cli {
    /// Source file to run (or listing, with --listing)
    file: Option<PathBuf>,

    /// Compile and run a snippet
    #[arg(short = 'e', long = "eval", conflicts_with = "file")]
    eval: Option<String>,

    /// Print the bytecode listing instead of running
    #[arg(long, conflicts_with = "listing")]
    emit: bool,

    /// Treat FILE as a textual bytecode listing
    #[arg(long, requires = "file")]
    listing: bool,

    /// Load configuration from a TOML file
    #[arg(short = 'c', long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Main entry point - uses tokio runtime for async operations.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => match EngineConfig::load(path) {
            Ok(config) => config,
            Err(e) => return fail(&e),
        },
        None => EngineConfig::default(),
    };
    debug!(
        unit = %config.unit,
        stack_words = config.vm.stack_words,
        "configuration loaded"
    );

    let result = match (&cli.file, &cli.eval) {
        (Some(path), _) if cli.listing => run_listing(path, config),
        (Some(path), _) if cli.emit => emit_file(path).await,
        (Some(path), _) => run_file(path, config).await,
        (None, Some(code)) if cli.emit => emit(code, &config.unit),
        (None, Some(code)) => AsyncEngine::with_config(config)
            .eval(code)
            .await
            .map(|_| ()),
        (None, None) => return run_repl(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "cinder=debug,cinder_engine=debug"
    } else {
        "cinder=warn,cinder_engine=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Start the interactive REPL
fn run_repl(config: EngineConfig) -> ExitCode {
    match repl::Repl::new(config) {
        Ok(mut repl) => {
            if let Err(e) = repl.run() {
                eprintln!("{}: {:?}", "REPL Error".red().bold(), e);
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(
                "{}: Failed to initialize REPL: {:?}",
                "Error".red().bold(),
                e
            );
            ExitCode::FAILURE
        }
    }
}

/// Compile and run a source file asynchronously.
async fn run_file(path: &Path, config: EngineConfig) -> Result<(), Error> {
    AsyncEngine::with_config(config)
        .eval_file(path)
        .await
        .map(|_| ())
}

/// Print the listing of a source file.
async fn emit_file(path: &Path) -> Result<(), Error> {
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    emit(&source, &path.display().to_string())
}

fn emit(source: &str, unit: &str) -> Result<(), Error> {
    let bytecode = cinder_engine::compile(source, unit)?;
    print!("{}", bytecode);
    Ok(())
}

/// Run a textual bytecode listing.
fn run_listing(path: &Path, config: EngineConfig) -> Result<(), Error> {
    let listing = std::fs::read_to_string(path)
        .map_err(|e| Error::Io(format!("Failed to read {}: {}", path.display(), e)))?;
    Engine::with_config(config)
        .run_listing(&listing)
        .map(|_| ())
}

fn fail(error: &Error) -> ExitCode {
    eprintln!("{}: {}", "error".red().bold(), error);
    ExitCode::FAILURE
}
