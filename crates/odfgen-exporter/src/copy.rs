//! Copy exporter.

use async_trait::async_trait;
use odfgen_core::exporter::{ExportOutput, Exporter};
use odfgen_core::{Error, Parameters, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::target::ExportTarget;

/// Exporter that copies the file into an output directory, optionally
/// under a different extension.
pub struct CopyExporter {
    name: String,
    output_dir: Option<PathBuf>,
    format: Option<String>,
}

impl CopyExporter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            output_dir: None,
            format: None,
        }
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

#[async_trait]
impl Exporter for CopyExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, file: &Path, parameters: &Parameters) -> Result<ExportOutput> {
        let target = ExportTarget::resolve(
            file,
            parameters,
            self.format.as_deref(),
            self.output_dir.as_deref(),
        );
        tokio::fs::create_dir_all(&target.output_dir)
            .await
            .map_err(|e| Error::io(&target.output_dir, e))?;

        info!(exporter = %self.name, input = %file.display(), output = %target.output.display(), "Copying file");
        tokio::fs::copy(file, &target.output)
            .await
            .map_err(|e| Error::io(file, e))?;

        if target.overwrite && target.output != file {
            tokio::fs::remove_file(file)
                .await
                .map_err(|e| Error::io(file, e))?;
        }

        Ok(target.into_output(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copies_into_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Report.odt");
        std::fs::write(&input, b"odt").unwrap();

        let exporter = CopyExporter::new("archive").with_output_dir(dir.path().join("archive"));
        let output = exporter.process(&input, &Parameters::new()).await.unwrap();

        let copied = dir.path().join("archive/Report.odt");
        assert_eq!(std::fs::read(&copied).unwrap(), b"odt");
        assert_eq!(
            output.parameters.get_str(&["transformed"]),
            copied.to_str()
        );
        assert!(input.exists());
    }

    #[tokio::test]
    async fn test_overwrite_removes_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("Report.odt");
        std::fs::write(&input, b"odt").unwrap();

        let params = Parameters::new()
            .with("outputDir", dir.path().join("moved").to_string_lossy().to_string())
            .with("overwrite", true);
        CopyExporter::new("move").process(&input, &params).await.unwrap();

        assert!(!input.exists());
        assert!(dir.path().join("moved/Report.odt").exists());
    }

    #[tokio::test]
    async fn test_missing_input_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = CopyExporter::new("archive")
            .process(&dir.path().join("nope.odt"), &Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
