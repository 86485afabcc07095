use crate::Result;
use std::path::PathBuf;

/// Destination for the finished artifact.
pub trait ArtifactExporter: Send + Sync {
    /// Store `bytes` under `file_name` and return where they went.
    fn export(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf>;
}

/// Writes artifacts into a directory under the guest-chosen name.
#[derive(Debug, Clone)]
pub struct DirectoryExporter {
    dir: PathBuf,
}

impl DirectoryExporter {
    /// Create an exporter for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactExporter for DirectoryExporter {
    fn export(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(sanitize_file_name(file_name));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Writes the artifact to a fixed path, ignoring the guest-chosen name.
#[derive(Debug, Clone)]
pub struct FileExporter {
    path: PathBuf,
}

impl FileExporter {
    /// Create an exporter for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ArtifactExporter for FileExporter {
    fn export(&self, _file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
        std::fs::write(&self.path, bytes)?;
        Ok(self.path.clone())
    }
}

// The name comes from the guest and must stay inside the target directory.
fn sanitize_file_name(file_name: &str) -> String {
    let name: String = file_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    match name.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => name,
    }
}
