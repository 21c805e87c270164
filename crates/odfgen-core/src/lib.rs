//! Core domain types and collaborator traits for odfgen.
//!
//! This crate contains:
//! - Job definitions, statuses and pipeline outputs
//! - Per-action parameter maps and their merge rules
//! - The document part model shared by containers and template engines
//! - Collaborator traits (`Container`, `TemplateEngine`, `Exporter`)
//! - The error taxonomy used across the workspace

pub mod document;
pub mod error;
pub mod exporter;
pub mod id;
pub mod job;
pub mod params;

pub use document::{Container, Document, Part, PartKind, TemplateEngine};
pub use error::{Error, Result};
pub use exporter::{ExportOutput, Exporter};
pub use id::ResourceId;
pub use job::{Job, JobOutput, JobStatus, PipelineStage};
pub use params::Parameters;
