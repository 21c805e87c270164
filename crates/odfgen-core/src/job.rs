//! Job definitions.
//!
//! A job is one document-generation request: a template archive rendered
//! with data, re-archived, then handed through an ordered chain of export
//! actions.

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::Parameters;
use crate::exporter::ExportOutput;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[display("pending")]
    Pending,
    #[display("running")]
    Running,
    #[display("succeeded")]
    Succeeded,
    #[display("failed")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Stages a job moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[display("extracting")]
    Extracting,
    #[display("loading")]
    Loading,
    #[display("rendering")]
    Rendering,
    #[display("saving")]
    Saving,
    #[display("compressing")]
    Compressing,
    #[display("cleaning_up")]
    CleaningUp,
    #[display("resolving")]
    Resolving,
}

/// One entry of a job's results list.
///
/// The compressed document is a plain path; every export action contributes
/// a file plus a parameter fragment for the next action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobOutput {
    File(PathBuf),
    Exported(ExportOutput),
}

impl JobOutput {
    pub fn file(&self) -> &PathBuf {
        match self {
            JobOutput::File(path) => path,
            JobOutput::Exported(output) => &output.file,
        }
    }
}

/// A document-generation request and its outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Unique within a batch.
    pub id: String,
    /// Template archive to extract.
    pub template_path: PathBuf,
    /// Job-scoped scratch directory; removed after compression.
    pub working_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Output file name without extension.
    pub output_name: String,
    /// Payload handed to the template engine untouched.
    pub data: serde_json::Value,
    /// Resolver names, run in order after the document is produced.
    pub actions: Vec<String>,
    pub parameters: Parameters,
    pub results: Vec<JobOutput>,
    pub status: JobStatus,
    /// Actions that had no registered resolver.
    #[serde(default)]
    pub skipped_actions: Vec<String>,
    /// Stage that failed, if any.
    pub failed_stage: Option<PipelineStage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(
        id: impl Into<String>,
        template_path: impl Into<PathBuf>,
        working_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        output_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            template_path: template_path.into(),
            working_dir: working_dir.into(),
            output_dir: output_dir.into(),
            output_name: output_name.into(),
            data: serde_json::Value::Null,
            actions: Vec::new(),
            parameters: Parameters::new(),
            results: Vec::new(),
            status: JobStatus::Pending,
            skipped_actions: Vec::new(),
            failed_stage: None,
            created_at: Utc::now(),
            updated_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.push(action.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Succeeded
    }

    pub fn mark_running(&mut self) {
        self.status = JobStatus::Running;
        self.touch();
    }

    pub fn mark_succeeded(&mut self) {
        let now = Utc::now();
        self.status = JobStatus::Succeeded;
        self.error_message = None;
        self.failed_stage = None;
        self.updated_at = Some(now);
        self.completed_at = Some(now);
    }

    /// Record a failure. `completed_at` stays unset on failed jobs.
    pub fn mark_failed(&mut self, stage: PipelineStage, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failed_stage = Some(stage);
        self.error_message = Some(message.into());
        self.completed_at = None;
        self.touch();
    }

    /// Record a failure that happened outside any pipeline stage.
    pub fn mark_aborted(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.failed_stage = None;
        self.error_message = Some(message.into());
        self.completed_at = None;
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
