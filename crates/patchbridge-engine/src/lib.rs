//! # patchbridge-engine
//!
//! Host runtime for a sandboxed patching module, built on
//! [wasmtime](https://wasmtime.dev/).
//!
//! The guest does not know its output size up front. It walks the patch
//! twice through the host imports: a counting pass that only reports write
//! extents, then, after `restart`, a writing pass into a buffer of exactly
//! the discovered size. Diagnostics flow back through `key_val_print` and
//! `error`, and the finished buffer is handed to an [`ArtifactExporter`].
//!
//! ## Example
//!
//! ```ignore
//! use patchbridge_engine::{DirectoryExporter, RunInputs, RunOutcome, WasmRunner};
//! use patchbridge_core::TerminalSurface;
//!
//! let runner = WasmRunner::new()?;
//! let module = runner.compile_file("romhack.wasm")?;
//! let surface = TerminalSurface::new(12, Default::default());
//! let outcome = runner
//!     .run(&module, &RunInputs::new("hack.patch", "game.iso"), surface, &DirectoryExporter::new("."))
//!     .await?;
//!
//! if let RunOutcome::Exported { path, .. } = outcome {
//!     println!("Wrote {}", path.display());
//! }
//! ```

pub mod error;
pub mod export;
pub mod host;
pub mod ingest;
pub mod runner;

pub use error::{Error, Result};
pub use export::{ArtifactExporter, DirectoryExporter, FileExporter};
pub use host::{HostFunctions, HostState};
pub use ingest::{FileIngestion, GuestSlice, InputSlot};
pub use runner::{GuestModule, RunInputs, WasmRunner, STATUS_SUCCESS};

use std::path::PathBuf;

/// How a run ended, when no host fault occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// An input was not selected; the guest was never invoked.
    MissingInput(InputSlot),
    /// The guest returned a non-success status after reporting its errors.
    GuestFailed {
        /// Status code returned by the entry point.
        status: i32,
        /// Number of errors the guest reported.
        error_count: u32,
    },
    /// The artifact was exported.
    Exported {
        /// Where the exporter stored it.
        path: PathBuf,
        /// Guest-chosen name plus extension.
        file_name: String,
        /// Artifact size in bytes.
        len: usize,
    },
}

impl RunOutcome {
    /// Whether an artifact was produced.
    pub fn is_exported(&self) -> bool {
        matches!(self, RunOutcome::Exported { .. })
    }
}
