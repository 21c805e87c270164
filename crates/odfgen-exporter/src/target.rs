//! Output location of an export.

use odfgen_core::{ExportOutput, Parameters};
use std::path::{Path, PathBuf};

/// Where an export writes, derived from the input file and parameters.
///
/// Recognised parameters: `format` (alias `fileFormat`), `output-dir`
/// (aliases `outputDir`, `output_dir`) and `overwrite`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTarget {
    pub format: String,
    pub output_dir: PathBuf,
    pub output: PathBuf,
    /// Remove the input file once the export succeeded.
    pub overwrite: bool,
}

impl ExportTarget {
    pub fn resolve(
        file: &Path,
        parameters: &Parameters,
        default_format: Option<&str>,
        default_output_dir: Option<&Path>,
    ) -> Self {
        let format = parameters
            .get_str(&["format", "fileFormat"])
            .map(str::to_string)
            .or_else(|| default_format.map(str::to_string))
            .or_else(|| {
                file.extension()
                    .map(|e| e.to_string_lossy().to_string())
            })
            .unwrap_or_default();

        let output_dir = parameters
            .get_str(&["output-dir", "outputDir", "output_dir"])
            .map(PathBuf::from)
            .or_else(|| default_output_dir.map(Path::to_path_buf))
            .or_else(|| file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let stem = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let output = if format.is_empty() {
            output_dir.join(stem)
        } else {
            output_dir.join(format!("{}.{}", stem, format))
        };

        Self {
            format,
            output_dir,
            output,
            overwrite: parameters.get_bool(&["overwrite"]).unwrap_or(false),
        }
    }

    /// Output handed to the next action: the input file plus the path it
    /// was transformed into.
    pub fn into_output(self, file: &Path) -> ExportOutput {
        ExportOutput {
            file: file.to_path_buf(),
            parameters: Parameters::new()
                .with("transformed", self.output.to_string_lossy().to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_input_file() {
        let target = ExportTarget::resolve(
            Path::new("/out/Report_1.odt"),
            &Parameters::new(),
            Some("pdf"),
            None,
        );
        assert_eq!(target.format, "pdf");
        assert_eq!(target.output, PathBuf::from("/out/Report_1.pdf"));
        assert!(!target.overwrite);
    }

    #[test]
    fn test_parameters_override_defaults() {
        let params = Parameters::new()
            .with("fileFormat", "docx")
            .with("outputDir", "/saves/stream")
            .with("overwrite", true);
        let target = ExportTarget::resolve(
            Path::new("/out/Report_1.odt"),
            &params,
            Some("pdf"),
            Some(Path::new("/saves")),
        );
        assert_eq!(target.output, PathBuf::from("/saves/stream/Report_1.docx"));
        assert!(target.overwrite);

        let output = target.into_output(Path::new("/out/Report_1.odt"));
        assert_eq!(output.file, PathBuf::from("/out/Report_1.odt"));
        assert_eq!(
            output.parameters.get_str(&["transformed"]),
            Some("/saves/stream/Report_1.docx")
        );
    }

    #[test]
    fn test_format_falls_back_to_input_extension() {
        let target =
            ExportTarget::resolve(Path::new("/out/a.odt"), &Parameters::new(), None, None);
        assert_eq!(target.format, "odt");
    }
}
