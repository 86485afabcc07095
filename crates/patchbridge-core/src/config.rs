use crate::codec::Utf8Strategy;
use crate::diagnostics::ColorMode;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Host-side configuration for a patch run.
///
/// Every field has a default, so a TOML file only needs to name the values
/// it changes:
///
/// ```toml
/// output_name = "MyHack"
/// decoder = "manual"
/// yield_after_diagnostic = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Artifact name used until the guest calls `set_name`.
    pub output_name: String,
    /// Extension appended to the artifact name.
    pub artifact_extension: String,
    /// Import module the guest's host functions live in.
    pub import_module: String,
    /// Guest entry point export.
    pub entry_point: String,
    /// Guest allocator export.
    pub allocator: String,
    /// Guest linear memory export.
    pub memory_export: String,
    /// String decoding strategy.
    pub decoder: Utf8Strategy,
    /// Yield to the async runtime after every guest diagnostic line.
    pub yield_after_diagnostic: bool,
    /// Width the key column is right-aligned to.
    pub key_width: usize,
    /// Terminal colour mode.
    pub color: ColorMode,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            output_name: "RomHack".to_string(),
            artifact_extension: "iso".to_string(),
            import_module: "env".to_string(),
            entry_point: "create_romhack".to_string(),
            allocator: "alloc".to_string(),
            memory_export: "memory".to_string(),
            decoder: Utf8Strategy::Native,
            yield_after_diagnostic: true,
            key_width: 12,
            color: ColorMode::Auto,
        }
    }
}

impl HostConfig {
    /// Parse a configuration from TOML.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Set the decoding strategy.
    pub fn with_decoder(mut self, decoder: Utf8Strategy) -> Self {
        self.decoder = decoder;
        self
    }

    /// Enable or disable the per-line yield.
    pub fn with_yield_after_diagnostic(mut self, enabled: bool) -> Self {
        self.yield_after_diagnostic = enabled;
        self
    }

    /// Set the default artifact name.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }

    /// File name for an artifact called `name`.
    pub fn artifact_file_name(&self, name: &str) -> String {
        let ext = self.artifact_extension.trim().trim_start_matches('.');
        if ext.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", name, ext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = HostConfig::from_toml_str(
            r#"
output_name = "MyHack"
decoder = "manual"
color = "never"
"#,
        )
        .unwrap();

        assert_eq!(config.output_name, "MyHack");
        assert_eq!(config.decoder, Utf8Strategy::Manual);
        assert_eq!(config.color, ColorMode::Never);
        assert_eq!(config.entry_point, "create_romhack");
        assert!(config.yield_after_diagnostic);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = HostConfig::from_toml_str("key_width = \"wide\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_artifact_file_name() {
        let config = HostConfig::default();
        assert_eq!(config.artifact_file_name("RomHack"), "RomHack.iso");

        let bare = HostConfig {
            artifact_extension: String::new(),
            ..HostConfig::default()
        };
        assert_eq!(bare.artifact_file_name("RomHack"), "RomHack");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("patchbridge.toml");
        std::fs::write(&path, "yield_after_diagnostic = false\n").unwrap();

        let config = HostConfig::load(&path).unwrap();
        assert!(!config.yield_after_diagnostic);
    }
}
