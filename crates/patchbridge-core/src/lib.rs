//! # patchbridge-core
//!
//! Engine-independent host state for running a sandboxed patching module.
//!
//! This crate provides:
//! - The two-pass output buffer (size discovery, then materialize and write)
//! - Guest string decoding with a process-wide strategy
//! - The severity-tagged diagnostic channel and its log surfaces
//! - Host configuration loaded from TOML
//!
//! ## Example
//!
//! ```
//! use patchbridge_core::{OutputBuffer, SeekMode};
//!
//! let mut output = OutputBuffer::new();
//!
//! // Counting pass
//! output.count_write(4);
//! output.seek(SeekMode::Absolute, 100);
//! output.count_write(4);
//! assert_eq!(output.discovered_length(), 104);
//!
//! // Writing pass
//! output.restart();
//! output.write(b"HEAD").unwrap();
//! output.seek(SeekMode::Absolute, 100);
//! output.write(b"TAIL").unwrap();
//! assert_eq!(output.bytes().unwrap().len(), 104);
//! ```

mod buffer;
mod codec;
mod config;
mod diagnostics;
mod error;
mod session;

pub use buffer::{OutputBuffer, SeekMode};
pub use codec::Utf8Strategy;
pub use config::HostConfig;
pub use diagnostics::{
    ColorMode, DiagnosticChannel, LineKind, LogSurface, MemorySurface, NullSurface, RenderedLine,
    Severity, TerminalSurface,
};
pub use error::{Error, Result};
pub use session::{Artifact, SessionContext};
