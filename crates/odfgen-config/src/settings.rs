//! Engine settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the job engine. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Yield to sibling jobs after this many extracted archive entries.
    pub extract_yield_every: usize,
    /// Files larger than this many bytes are streamed into the archive.
    pub stream_threshold: u64,
    /// Extension of the produced document.
    pub output_extension: String,
    /// Remove the staging directory of a job that failed.
    pub cleanup_on_failure: bool,
    /// Pause after each deleted file during cleanup.
    pub delete_chunk_delay: Duration,
    /// Concurrent removals allowed by the fan-out delete policy.
    pub fan_out_width: usize,
    /// Fail rendering on placeholders missing from the job data instead of
    /// leaving them in place.
    pub strict_placeholders: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            extract_yield_every: 10,
            stream_threshold: 5 * 1024 * 1024,
            output_extension: "odt".to_string(),
            cleanup_on_failure: true,
            delete_chunk_delay: Duration::from_millis(1),
            fan_out_width: 5,
            strict_placeholders: false,
        }
    }
}
