//! CLI command implementations.

pub mod clean;
pub mod run;

use anyhow::{Context, Result};
use odfgen_config::load_batch;
use std::path::Path;

pub fn validate(path: &Path) -> Result<()> {
    let batch = load_batch(path)
        .with_context(|| format!("Failed to load batch file: {}", path.display()))?;

    println!(
        "Configuration is valid: {} jobs, {} resolvers",
        batch.jobs.len(),
        batch.resolvers.len()
    );
    for (job_id, action) in batch.unresolved_actions() {
        println!(
            "warning: job '{}' uses action '{}' with no resolver; it will be skipped",
            job_id, action
        );
    }
    Ok(())
}
