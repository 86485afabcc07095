use crate::buffer::OutputBuffer;
use crate::diagnostics::DiagnosticChannel;

/// The finished output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Name chosen by the guest, without extension.
    pub name: String,
    /// Materialized output bytes.
    pub bytes: Vec<u8>,
}

/// Per-run state mutated by guest callbacks.
#[derive(Debug)]
pub struct SessionContext {
    output: OutputBuffer,
    output_name: String,
    diagnostics: DiagnosticChannel,
}

impl SessionContext {
    /// Start a run with the default output name.
    pub fn new(output_name: impl Into<String>, diagnostics: DiagnosticChannel) -> Self {
        Self {
            output: OutputBuffer::new(),
            output_name: output_name.into(),
            diagnostics,
        }
    }

    /// Mutable access to the output buffer.
    pub fn output_mut(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    /// Mutable access to the diagnostic channel.
    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticChannel {
        &mut self.diagnostics
    }

    /// Name the artifact will be exported under.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// Replace the artifact name.
    pub fn set_output_name(&mut self, name: impl Into<String>) {
        self.output_name = name.into();
    }

    /// Errors reported by the guest in this run.
    pub fn error_count(&self) -> u32 {
        self.diagnostics.error_count()
    }

    /// End the run, handing back the artifact and the channel for the
    /// remaining host status lines. A run that never restarted yields an
    /// empty artifact.
    pub fn finish(self) -> (Artifact, DiagnosticChannel) {
        let artifact = Artifact {
            name: self.output_name,
            bytes: self.output.into_bytes().unwrap_or_default(),
        };
        (artifact, self.diagnostics)
    }
}
