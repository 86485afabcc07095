//! patchbridge: apply a patch to a disc image through a patching module.
//!
//! # Usage
//!
//! ```bash
//! # Apply a patch, writing <name>.iso into the current directory
//! patchbridge --module romhack.wasm --patch hack.patch --iso game.iso
//!
//! # Write to an explicit path instead
//! patchbridge --module romhack.wasm --patch hack.patch --iso game.iso -o out.iso
//! ```

use clap::Parser;
use env_logger::Env;
use log::{debug, error, info};
use patchbridge_core::{HostConfig, TerminalSurface, Utf8Strategy};
use patchbridge_engine::{
    ArtifactExporter, DirectoryExporter, FileExporter, RunInputs, RunOutcome, WasmRunner,
};
use std::path::PathBuf;
use std::process;

/// Apply a patch to a disc image by running a patching module.
#[derive(Parser, Debug)]
#[command(name = "patchbridge")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the patching module (.wasm or .wat)
    #[arg(short, long, value_name = "MODULE")]
    module: PathBuf,

    /// Patch file to apply
    #[arg(short, long, value_name = "PATCH")]
    patch: Option<PathBuf>,

    /// Original disc image
    #[arg(short, long, value_name = "ISO")]
    iso: Option<PathBuf>,

    /// Write the artifact to this file instead of <name>.iso
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    output: Option<PathBuf>,

    /// Directory the artifact is written into (default: current directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Host configuration file (TOML)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Decode guest strings with the lenient byte-pattern decoder
    #[arg(long)]
    manual_utf8: bool,

    /// Do not yield to the runtime after each diagnostic line
    #[arg(long)]
    no_yield: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let mut config = match &args.config {
        Some(path) => match HostConfig::load(path) {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to load config {}: {}", path.display(), e);
                process::exit(1);
            }
        },
        None => HostConfig::default(),
    };
    if args.manual_utf8 {
        config = config.with_decoder(Utf8Strategy::Manual);
    }
    if args.no_yield {
        config = config.with_yield_after_diagnostic(false);
    }

    let surface = TerminalSurface::new(config.key_width, config.color);

    let runner = match WasmRunner::with_config(config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to start WASM engine: {}", e);
            process::exit(1);
        }
    };

    debug!("Compiling module: {}", args.module.display());
    let module = match runner.compile_file(&args.module) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to compile module: {}", e);
            process::exit(1);
        }
    };

    let exporter: Box<dyn ArtifactExporter> = match (args.output, args.output_dir) {
        (Some(path), _) => Box::new(FileExporter::new(path)),
        (None, Some(dir)) => Box::new(DirectoryExporter::new(dir)),
        (None, None) => Box::new(DirectoryExporter::new(".")),
    };

    let inputs = RunInputs {
        patch: args.patch,
        image: args.iso,
    };

    match runner.run(&module, &inputs, surface, exporter.as_ref()).await {
        Ok(RunOutcome::Exported { path, len, .. }) => {
            info!("Wrote {} ({} bytes)", path.display(), len);
        }
        Ok(RunOutcome::GuestFailed { .. }) => process::exit(1),
        Ok(RunOutcome::MissingInput(slot)) => {
            debug!("No {} selected", slot);
            process::exit(2);
        }
        Err(e) => {
            error!("Run failed: {}", e);
            process::exit(1);
        }
    }
}
