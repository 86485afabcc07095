use crate::{Error, Result};
use patchbridge_core::{SeekMode, SessionContext, Severity, Utf8Strategy};
use std::ops::Range;
use wasmtime::{Caller, Linker, Memory};

/// State shared between host and WASM guest for one run.
pub struct HostState {
    /// Output buffer, artifact name and diagnostics of the run.
    pub session: SessionContext,
    /// Name of the guest's linear memory export.
    pub memory_export: String,
    /// Decoder for strings passed by the guest.
    pub strategy: Utf8Strategy,
    /// Yield to the async runtime after each guest diagnostic line.
    pub yield_after_diagnostic: bool,
}

impl HostState {
    /// Create a new `HostState`.
    pub fn new(session: SessionContext, memory_export: impl Into<String>) -> Self {
        Self {
            session,
            memory_export: memory_export.into(),
            strategy: Utf8Strategy::default(),
            yield_after_diagnostic: true,
        }
    }

    /// Set the string decoder.
    pub fn with_strategy(mut self, strategy: Utf8Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable the per-line yield.
    pub fn with_yield_after_diagnostic(mut self, enabled: bool) -> Self {
        self.yield_after_diagnostic = enabled;
        self
    }
}

/// Host functions exposed to WASM guests.
pub struct HostFunctions;

impl HostFunctions {
    /// Register all host functions with the linker under `module`.
    pub fn register(linker: &mut Linker<HostState>, module: &str) -> Result<()> {
        // Counting pass
        linker
            .func_wrap(
                module,
                "count_write",
                |mut caller: Caller<'_, HostState>, len: i32| {
                    Self::count_write(&mut caller, len);
                },
            )
            .map_err(|e| Error::Wasm(e.to_string()))?;

        // Seeking is identical in both passes
        for name in ["count_seek", "seek"] {
            linker
                .func_wrap(
                    module,
                    name,
                    |mut caller: Caller<'_, HostState>, kind: i32, offset: i32| -> i32 {
                        Self::seek(&mut caller, kind, offset)
                    },
                )
                .map_err(|e| Error::Wasm(e.to_string()))?;
        }

        // Switch to the writing pass
        linker
            .func_wrap(module, "restart", |mut caller: Caller<'_, HostState>| {
                Self::restart(&mut caller);
            })
            .map_err(|e| Error::Wasm(e.to_string()))?;

        // Writing pass
        linker
            .func_wrap(
                module,
                "write",
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<()> {
                    Self::write(&mut caller, ptr, len)
                },
            )
            .map_err(|e| Error::Wasm(e.to_string()))?;

        // Diagnostic line, followed by one scheduling turn
        linker
            .func_wrap_async(
                module,
                "key_val_print",
                |mut caller: Caller<'_, HostState>,
                 (kind, key_ptr, key_len, val_ptr, val_len): (i32, i32, i32, i32, i32)| {
                    Box::new(async move {
                        Self::key_val_print(&mut caller, kind, key_ptr, key_len, val_ptr, val_len)?;
                        if caller.data().yield_after_diagnostic {
                            tokio::task::yield_now().await;
                        }
                        Ok::<(), anyhow::Error>(())
                    })
                },
            )
            .map_err(|e| Error::Wasm(e.to_string()))?;

        // Artifact name
        linker
            .func_wrap(
                module,
                "set_name",
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<()> {
                    Self::set_name(&mut caller, ptr, len)
                },
            )
            .map_err(|e| Error::Wasm(e.to_string()))?;

        // Error chain
        linker
            .func_wrap(
                module,
                "error",
                |mut caller: Caller<'_, HostState>, ptr: i32, len: i32| -> anyhow::Result<()> {
                    Self::error(&mut caller, ptr, len)
                },
            )
            .map_err(|e| Error::Wasm(e.to_string()))?;

        Ok(())
    }

    fn count_write(caller: &mut Caller<'_, HostState>, len: i32) {
        let output = caller.data_mut().session.output_mut();
        output.count_write(u64::from(len as u32));
        tracing::trace!(
            cursor = output.cursor(),
            len = output.discovered_length(),
            "count_write"
        );
    }

    // The guest sees the cursor truncated to its pointer width.
    fn seek(caller: &mut Caller<'_, HostState>, kind: i32, offset: i32) -> i32 {
        let mode = SeekMode::from_raw(kind);
        let cursor = caller
            .data_mut()
            .session
            .output_mut()
            .seek(mode, i64::from(offset));
        tracing::trace!(?mode, offset, cursor, "seek");
        cursor as i32
    }

    fn restart(caller: &mut Caller<'_, HostState>) {
        let output = caller.data_mut().session.output_mut();
        output.restart();
        tracing::debug!(len = output.discovered_length(), "output buffer materialized");
    }

    fn write(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> anyhow::Result<()> {
        let memory = Self::get_memory(caller)?;
        let (data, state) = memory.data_and_store_mut(&mut *caller);
        let bytes = data
            .get(guest_range(ptr, len))
            .ok_or_else(|| out_of_memory(ptr, len))?;
        state.session.output_mut().write(bytes)?;
        Ok(())
    }

    fn key_val_print(
        caller: &mut Caller<'_, HostState>,
        kind: i32,
        key_ptr: i32,
        key_len: i32,
        val_ptr: i32,
        val_len: i32,
    ) -> anyhow::Result<()> {
        let key = Self::read_string_from_memory(caller, key_ptr, key_len)?;
        let value = Self::read_string_from_memory(caller, val_ptr, val_len)?;
        caller
            .data_mut()
            .session
            .diagnostics_mut()
            .report_key_value(Severity::from_raw(kind), &key, &value);
        Ok(())
    }

    fn set_name(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> anyhow::Result<()> {
        let name = Self::read_string_from_memory(caller, ptr, len)?;
        tracing::debug!(%name, "output name set");
        caller.data_mut().session.set_output_name(name);
        Ok(())
    }

    fn error(caller: &mut Caller<'_, HostState>, ptr: i32, len: i32) -> anyhow::Result<()> {
        let message = Self::read_string_from_memory(caller, ptr, len)?;
        caller
            .data_mut()
            .session
            .diagnostics_mut()
            .report_error(&message);
        Ok(())
    }

    /// Helper: Decode a string from WASM memory.
    fn read_string_from_memory(
        caller: &mut Caller<'_, HostState>,
        ptr: i32,
        len: i32,
    ) -> Result<String> {
        let memory = Self::get_memory(caller)?;
        let bytes = memory
            .data(&*caller)
            .get(guest_range(ptr, len))
            .ok_or_else(|| out_of_memory(ptr, len))?;
        Ok(caller.data().strategy.decode(bytes))
    }

    /// Helper: Get memory export from WASM instance.
    ///
    /// Looked up on every call; the guest may grow its memory between calls.
    fn get_memory(caller: &mut Caller<'_, HostState>) -> Result<Memory> {
        let name = caller.data().memory_export.clone();
        caller
            .get_export(&name)
            .and_then(|ext| ext.into_memory())
            .ok_or(Error::MissingExport(name))
    }
}

/// Guest pointers and lengths are unsigned 32-bit values.
fn guest_range(ptr: i32, len: i32) -> Range<usize> {
    let start = ptr as u32 as usize;
    start..start + len as u32 as usize
}

fn out_of_memory(ptr: i32, len: i32) -> Error {
    Error::InvalidInput(format!(
        "guest range {}+{} is outside linear memory",
        ptr as u32, len as u32
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_range_is_unsigned() {
        assert_eq!(guest_range(16, 4), 16..20);
        assert_eq!(guest_range(-1, 1), 0xFFFF_FFFF..0x1_0000_0000);
    }
}
