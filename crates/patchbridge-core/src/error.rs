use thiserror::Error;

/// Errors raised by the host side of the output buffer protocol.
#[derive(Debug, Error)]
pub enum Error {
    /// A writing-pass write landed outside the materialized buffer.
    #[error("write of {len} bytes at offset {cursor} exceeds output buffer of {capacity} bytes")]
    WriteOutOfBounds {
        /// Cursor at the time of the write.
        cursor: i64,
        /// Number of bytes the guest tried to write.
        len: usize,
        /// Size of the materialized buffer.
        capacity: usize,
    },

    /// The guest wrote bytes before calling `restart`.
    #[error("output buffer written before restart")]
    NotMaterialized,

    /// Error parsing or validating the host configuration.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for patchbridge-core operations.
pub type Result<T> = std::result::Result<T, Error>;
