use crate::export::ArtifactExporter;
use crate::host::{HostFunctions, HostState};
use crate::ingest::{FileIngestion, InputSlot};
use crate::{Error, Result, RunOutcome};
use patchbridge_core::{
    DiagnosticChannel, HostConfig, LogSurface, SessionContext, Severity, Utf8Strategy,
};
use std::path::{Path, PathBuf};
use wasmtime::{Engine, Linker, Module, Store};

/// Status code the entry point returns on success.
pub const STATUS_SUCCESS: i32 = 1;

/// Files selected for a run. `None` means nothing was selected.
#[derive(Debug, Clone, Default)]
pub struct RunInputs {
    /// Patch archive.
    pub patch: Option<PathBuf>,
    /// Original disc image.
    pub image: Option<PathBuf>,
}

impl RunInputs {
    /// Inputs with both files selected.
    pub fn new(patch: impl Into<PathBuf>, image: impl Into<PathBuf>) -> Self {
        Self {
            patch: Some(patch.into()),
            image: Some(image.into()),
        }
    }
}

/// A compiled guest module, reusable across runs.
#[derive(Clone)]
pub struct GuestModule {
    module: Module,
}

/// WASM runtime runner using wasmtime.
pub struct WasmRunner {
    engine: Engine,
    config: HostConfig,
    strategy: Utf8Strategy,
}

impl WasmRunner {
    /// Create a new `WasmRunner` with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(HostConfig::default())
    }

    /// Create a runner for `config`. The string decoder is fixed here for
    /// every run made by this runner.
    pub fn with_config(config: HostConfig) -> Result<Self> {
        let mut wasm_config = wasmtime::Config::new();
        wasm_config.async_support(true);
        let engine = Engine::new(&wasm_config).map_err(|e| Error::Wasm(e.to_string()))?;

        Ok(Self {
            engine,
            strategy: config.decoder,
            config,
        })
    }

    /// Compile a guest module from binary or text format.
    pub fn compile(&self, bytes: impl AsRef<[u8]>) -> Result<GuestModule> {
        let module = Module::new(&self.engine, bytes).map_err(|e| Error::Wasm(e.to_string()))?;
        Ok(GuestModule { module })
    }

    /// Compile a guest module from a file.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<GuestModule> {
        let module =
            Module::from_file(&self.engine, path).map_err(|e| Error::Wasm(e.to_string()))?;
        Ok(GuestModule { module })
    }

    /// Drive one complete run.
    ///
    /// Missing inputs and guest-reported failures are outcomes, not errors.
    /// Errors are host faults: I/O, missing exports, or guest traps.
    pub async fn run(
        &self,
        module: &GuestModule,
        inputs: &RunInputs,
        surface: impl LogSurface + Send + 'static,
        exporter: &dyn ArtifactExporter,
    ) -> Result<RunOutcome> {
        let session = SessionContext::new(
            self.config.output_name.clone(),
            DiagnosticChannel::new(Box::new(surface)),
        );
        let state = HostState::new(session, self.config.memory_export.clone())
            .with_strategy(self.strategy)
            .with_yield_after_diagnostic(self.config.yield_after_diagnostic);

        let mut store = Store::new(&self.engine, state);
        let mut linker = Linker::new(&self.engine);
        HostFunctions::register(&mut linker, &self.config.import_module)?;

        let instance = linker
            .instantiate_async(&mut store, &module.module)
            .await
            .map_err(|e| Error::Wasm(e.to_string()))?;

        store.data_mut().session.diagnostics_mut().clear();

        let ingestion = FileIngestion::new(&self.config.allocator, &self.config.memory_export);

        status(&mut store, "Opening", &InputSlot::Patch.to_string());
        let Some(patch) = ingestion
            .ingest(&mut store, &instance, inputs.patch.as_deref())
            .await?
        else {
            tracing::debug!("no patch selected, aborting run");
            return Ok(RunOutcome::MissingInput(InputSlot::Patch));
        };

        status(&mut store, "Opening", &InputSlot::Image.to_string());
        let Some(image) = ingestion
            .ingest(&mut store, &instance, inputs.image.as_deref())
            .await?
        else {
            tracing::debug!("no image selected, aborting run");
            return Ok(RunOutcome::MissingInput(InputSlot::Image));
        };

        let entry = instance
            .get_typed_func::<(i32, i32, i32, i32), i32>(&mut store, &self.config.entry_point)
            .map_err(|_| Error::MissingExport(self.config.entry_point.clone()))?;

        tracing::info!(entry_point = %self.config.entry_point, "invoking guest");
        let status_code = entry
            .call_async(
                &mut store,
                (
                    patch.ptr as i32,
                    patch.len as i32,
                    image.ptr as i32,
                    image.len as i32,
                ),
            )
            .await
            .map_err(|e| Error::Wasm(format!("{:#}", e)))?;

        if status_code != STATUS_SUCCESS {
            let error_count = store.data().session.error_count();
            tracing::info!(status = status_code, error_count, "guest reported failure");
            return Ok(RunOutcome::GuestFailed {
                status: status_code,
                error_count,
            });
        }

        status(&mut store, "Downloading", "Rom Hack");

        // Dropping the store discards the session and the guest instance.
        let HostState { session, .. } = store.into_data();
        let (artifact, mut diagnostics) = session.finish();

        let file_name = self.config.artifact_file_name(&artifact.name);
        let path = exporter.export(&file_name, &artifact.bytes)?;
        let len = artifact.bytes.len();
        drop(artifact);
        tracing::info!(path = %path.display(), len, "artifact exported");

        diagnostics.render_line("Finished", "", Severity::Normal);

        Ok(RunOutcome::Exported {
            path,
            file_name,
            len,
        })
    }
}

fn status(store: &mut Store<HostState>, key: &str, value: &str) {
    store
        .data_mut()
        .session
        .diagnostics_mut()
        .render_line(key, value, Severity::Normal);
}
