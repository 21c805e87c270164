//! Batch execution command.

use anyhow::{Context, Result};
use odfgen_config::{EngineSettings, ResolverConfig, ResolverKind, load_batch};
use odfgen_core::{Exporter, Job, JobOutput};
use odfgen_document::{FsContainer, PlaceholderEngine};
use odfgen_engine::DocumentProcessor;
use odfgen_exporter::{CommandExporter, CopyExporter};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Process every job of a batch file and report the outcome of each.
pub async fn run_batch(path: &Path, json: bool) -> Result<()> {
    let batch = load_batch(path)
        .with_context(|| format!("Failed to load batch file: {}", path.display()))?;

    for (job_id, action) in batch.unresolved_actions() {
        warn!(job_id = %job_id, action = %action, "Action has no resolver and will be skipped");
    }

    let engine = placeholder_engine(&batch.settings);
    let mut processor = DocumentProcessor::new(Arc::new(FsContainer::new()), Arc::new(engine))
        .with_settings(batch.settings);
    for resolver in &batch.resolvers {
        processor.add_resolver(resolver.name.clone(), build_exporter(resolver));
    }
    for job in batch.jobs {
        processor.add_job(job);
    }

    let mut sink = processor.process_concurrent();
    info!(jobs = sink.expected(), "Batch started");

    let mut jobs = Vec::with_capacity(sink.expected());
    while let Some(job) = sink.pop().await {
        if !json {
            println!("{}", summary_line(&job));
        }
        jobs.push(job);
    }

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&jobs).context("Failed to serialize jobs")?
        );
    }

    let failed = jobs.iter().filter(|j| !j.is_success()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} jobs failed", failed, jobs.len());
    }
    Ok(())
}

fn placeholder_engine(settings: &EngineSettings) -> PlaceholderEngine {
    if settings.strict_placeholders {
        PlaceholderEngine::strict()
    } else {
        PlaceholderEngine::new()
    }
}

pub fn build_exporter(config: &ResolverConfig) -> Arc<dyn Exporter> {
    match &config.kind {
        ResolverKind::Command { program, args } => {
            let mut exporter =
                CommandExporter::new(config.name.clone(), program.clone()).with_args(args.clone());
            if let Some(format) = &config.format {
                exporter = exporter.with_format(format.clone());
            }
            if let Some(dir) = &config.output_dir {
                exporter = exporter.with_output_dir(dir.clone());
            }
            Arc::new(exporter)
        }
        ResolverKind::Copy => {
            let mut exporter = CopyExporter::new(config.name.clone());
            if let Some(format) = &config.format {
                exporter = exporter.with_format(format.clone());
            }
            if let Some(dir) = &config.output_dir {
                exporter = exporter.with_output_dir(dir.clone());
            }
            Arc::new(exporter)
        }
    }
}

fn summary_line(job: &Job) -> String {
    if job.is_success() {
        let outputs: Vec<String> = job.results.iter().map(describe_output).collect();
        format!("{} succeeded: {}", job.id, outputs.join(", "))
    } else {
        format!(
            "{} failed: {}",
            job.id,
            job.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}

fn describe_output(output: &JobOutput) -> String {
    match output {
        JobOutput::File(path) => path.display().to_string(),
        JobOutput::Exported(exported) => exported
            .parameters
            .get_str(&["transformed"])
            .map(str::to_string)
            .unwrap_or_else(|| exported.file.display().to_string()),
    }
}
