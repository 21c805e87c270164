//! External conversion program exporter.

use async_trait::async_trait;
use odfgen_core::exporter::{ExportOutput, Exporter};
use odfgen_core::{Error, Parameters, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::target::ExportTarget;

/// Arguments appended when the configured ones never mention `{input}`.
const DEFAULT_ARGS: [&str; 5] = ["--convert-to", "{format}", "--outdir", "{outdir}", "{input}"];

/// Exporter that runs a conversion program once per file.
///
/// Arguments may contain `{input}`, `{output}`, `{outdir}` and `{format}`.
pub struct CommandExporter {
    name: String,
    program: String,
    args: Vec<String>,
    format: String,
    output_dir: Option<PathBuf>,
}

impl CommandExporter {
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            format: "pdf".to_string(),
            output_dir: None,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(output_dir.into());
        self
    }

    fn command_args(&self, input: &Path, target: &ExportTarget) -> Vec<String> {
        let mut args = self.args.clone();
        if !args.iter().any(|a| a.contains("{input}")) {
            args.extend(DEFAULT_ARGS.iter().map(|a| a.to_string()));
        }
        args.iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &target.output.to_string_lossy())
                    .replace("{outdir}", &target.output_dir.to_string_lossy())
                    .replace("{format}", &target.format)
            })
            .collect()
    }
}

#[async_trait]
impl Exporter for CommandExporter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, file: &Path, parameters: &Parameters) -> Result<ExportOutput> {
        let target = ExportTarget::resolve(
            file,
            parameters,
            Some(&self.format),
            self.output_dir.as_deref(),
        );
        tokio::fs::create_dir_all(&target.output_dir)
            .await
            .map_err(|e| Error::io(&target.output_dir, e))?;

        let args = self.command_args(file, &target);
        info!(
            exporter = %self.name,
            input = %file.display(),
            output = %target.output.display(),
            "Exporting file"
        );
        debug!(program = %self.program, ?args, "Running conversion program");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Remote(format!("failed to start {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Remote(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        if target.overwrite {
            tokio::fs::remove_file(file)
                .await
                .map_err(|e| Error::io(file, e))?;
        }

        Ok(target.into_output(file))
    }
}
