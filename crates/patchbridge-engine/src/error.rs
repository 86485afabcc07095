use thiserror::Error;

/// Errors from the WASM host.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// WASM compilation, instantiation, or trap.
    #[error("WASM error: {0}")]
    Wasm(String),

    /// Error from the patchbridge-core crate.
    #[error("Host state error: {0}")]
    Core(#[from] patchbridge_core::Error),

    /// The guest does not export something the host needs.
    #[error("Missing guest export: {0}")]
    MissingExport(String),

    /// Invalid input parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for patchbridge-engine operations.
pub type Result<T> = std::result::Result<T, Error>;
