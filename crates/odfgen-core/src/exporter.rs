//! Exporter trait.
//!
//! Exporters (resolvers) perform one named post-processing action on a
//! produced file, typically a format conversion.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::{Parameters, Result};

/// What an export action hands to the next action in the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportOutput {
    pub file: PathBuf,
    /// Merged over the next action's parameters.
    pub parameters: Parameters,
}

/// Trait for export actions.
#[async_trait]
pub trait Exporter: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Process `file` with the effective parameters for this action.
    async fn process(&self, file: &Path, parameters: &Parameters) -> Result<ExportOutput>;
}
