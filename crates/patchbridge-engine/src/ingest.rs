use crate::host::HostState;
use crate::{Error, Result};
use std::fmt;
use std::path::Path;
use wasmtime::{Instance, Store};

/// Which input a file was selected for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSlot {
    /// The patch archive.
    Patch,
    /// The original disc image.
    Image,
}

impl fmt::Display for InputSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputSlot::Patch => f.write_str("Patch"),
            InputSlot::Image => f.write_str("ISO"),
        }
    }
}

/// A region of guest memory holding an ingested file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuestSlice {
    /// Guest pointer returned by the allocator.
    pub ptr: u32,
    /// Length in bytes.
    pub len: u32,
}

/// Copies selected files into guest memory through the guest's allocator.
#[derive(Debug, Clone)]
pub struct FileIngestion {
    allocator: String,
    memory_export: String,
}

impl FileIngestion {
    /// Create an adapter using the given allocator and memory exports.
    pub fn new(allocator: impl Into<String>, memory_export: impl Into<String>) -> Self {
        Self {
            allocator: allocator.into(),
            memory_export: memory_export.into(),
        }
    }

    /// Read `selected` fully and place it in guest memory.
    ///
    /// Returns `Ok(None)` when nothing is selected; the caller aborts the
    /// run without invoking the guest.
    pub async fn ingest(
        &self,
        store: &mut Store<HostState>,
        instance: &Instance,
        selected: Option<&Path>,
    ) -> Result<Option<GuestSlice>> {
        let Some(path) = selected else {
            return Ok(None);
        };

        let contents = tokio::fs::read(path).await?;
        let len = u32::try_from(contents.len()).map_err(|_| {
            Error::InvalidInput(format!(
                "{} is too large for guest memory ({} bytes)",
                path.display(),
                contents.len()
            ))
        })?;

        let alloc = instance
            .get_typed_func::<i32, i32>(&mut *store, &self.allocator)
            .map_err(|_| Error::MissingExport(self.allocator.clone()))?;
        let ptr = alloc
            .call_async(&mut *store, len as i32)
            .await
            .map_err(|e| Error::Wasm(e.to_string()))? as u32;

        // The allocator may have grown memory, so look it up afterwards.
        let memory = instance
            .get_memory(&mut *store, &self.memory_export)
            .ok_or_else(|| Error::MissingExport(self.memory_export.clone()))?;
        memory
            .write(&mut *store, ptr as usize, &contents)
            .map_err(|e| Error::Wasm(e.to_string()))?;

        tracing::debug!(path = %path.display(), ptr, len, "file ingested");
        Ok(Some(GuestSlice { ptr, len }))
    }
}
