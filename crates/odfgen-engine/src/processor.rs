//! Document processor - schedules a batch of jobs onto concurrent tasks.

use futures::FutureExt;
use odfgen_config::EngineSettings;
use odfgen_core::{Container, Exporter, Job, TemplateEngine};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::pipeline::{JobPipeline, PipelineContext};
use crate::resolver::ResolverRegistry;
use crate::sink::CompletionSink;

/// Owns the job pool and resolver registry for one batch.
pub struct DocumentProcessor {
    jobs: VecDeque<Job>,
    resolvers: ResolverRegistry,
    container: Arc<dyn Container>,
    engine: Arc<dyn TemplateEngine>,
    settings: EngineSettings,
}

impl DocumentProcessor {
    pub fn new(container: Arc<dyn Container>, engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            jobs: VecDeque::new(),
            resolvers: ResolverRegistry::new(),
            container,
            engine,
            settings: EngineSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Queue a job; jobs are launched in the order they were added.
    pub fn add_job(&mut self, job: Job) -> &mut Self {
        self.jobs.push_back(job);
        self
    }

    pub fn add_resolver(&mut self, name: impl Into<String>, exporter: Arc<dyn Exporter>) -> &mut Self {
        self.resolvers.register(name, exporter);
        self
    }

    /// Pending jobs, in launch order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }

    pub fn resolvers(&self) -> &ResolverRegistry {
        &self.resolvers
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Launch one task per pending job and return the sink they report to.
    ///
    /// Drains the job pool. Must be called from within a tokio runtime; the
    /// tasks make progress while the caller awaits the sink.
    pub fn process_concurrent(&mut self) -> CompletionSink {
        let (sender, sink) = CompletionSink::channel(self.jobs.len());
        let context = Arc::new(PipelineContext::new(
            self.container.clone(),
            self.engine.clone(),
            Arc::new(self.resolvers.clone()),
            self.settings.clone(),
        ));
        let pipeline = JobPipeline::new(context);

        info!(jobs = sink.expected(), resolvers = self.resolvers.len(), "Processing batch");
        while let Some(job) = self.jobs.pop_front() {
            let pipeline = pipeline.clone();
            let sender = sender.clone();
            let fallback = job.clone();

            tokio::spawn(async move {
                let finished = match AssertUnwindSafe(pipeline.run(job)).catch_unwind().await {
                    Ok(job) => job,
                    Err(panic) => {
                        let message = panic_message(panic.as_ref());
                        error!(job_id = %fallback.id, panic = %message, "Job task panicked");
                        let mut job = fallback;
                        job.mark_aborted(format!("job task panicked: {}", message));
                        job
                    }
                };
                let job_id = finished.id.clone();
                if sender.send(finished).await.is_err() {
                    warn!(job_id = %job_id, "Completion sink dropped before job finished");
                }
            });
        }

        sink
    }

    /// Process every pending job and collect them in completion order.
    pub async fn run(&mut self) -> Vec<Job> {
        self.process_concurrent().drain().await
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use odfgen_core::{Document, ExportOutput, JobStatus, Parameters, Result};
    use odfgen_document::{FsContainer, PlaceholderEngine};
    use serde_json::Value;
    use std::path::Path;

    struct NoopExporter;

    #[async_trait]
    impl Exporter for NoopExporter {
        fn name(&self) -> &str {
            "noop"
        }

        async fn process(&self, file: &Path, parameters: &Parameters) -> Result<ExportOutput> {
            Ok(ExportOutput {
                file: file.to_path_buf(),
                parameters: parameters.clone(),
            })
        }
    }

    struct PanickingEngine;

    #[async_trait]
    impl TemplateEngine for PanickingEngine {
        async fn render(&self, _document: &mut Document, _data: &Value, _working_dir: &Path) -> Result<()> {
            panic!("template engine exploded");
        }
    }

    fn processor(engine: Arc<dyn TemplateEngine>) -> DocumentProcessor {
        DocumentProcessor::new(Arc::new(FsContainer::new()), engine)
    }

    #[test]
    fn test_add_job_and_resolver() {
        let mut processor = processor(Arc::new(PlaceholderEngine::new()));
        processor
            .add_job(Job::new("a", "a.odt", "/w/a", "/out", "a"))
            .add_job(Job::new("b", "b.odt", "/w/b", "/out", "b"));
        processor.add_resolver("copy", Arc::new(NoopExporter));

        let ids: Vec<&str> = processor.jobs().map(|j| j.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(processor.resolvers().contains("copy"));
    }

    #[tokio::test]
    async fn test_empty_pool_drains_immediately() {
        let mut processor = processor(Arc::new(PlaceholderEngine::new()));
        assert!(processor.run().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_jobs_still_reach_the_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut processor = processor(Arc::new(PlaceholderEngine::new()));
        for id in ["x", "y"] {
            processor.add_job(Job::new(
                id,
                dir.path().join(format!("{}.odt", id)),
                dir.path().join(id),
                dir.path().join("out"),
                id,
            ));
        }

        let mut sink = processor.process_concurrent();
        assert_eq!(sink.expected(), 2);
        assert_eq!(processor.jobs().count(), 0);

        let mut seen = Vec::new();
        while let Some(job) = sink.pop().await {
            assert_eq!(job.status, JobStatus::Failed);
            seen.push(job.id);
        }
        seen.sort();
        assert_eq!(seen, vec!["x", "y"]);
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_panicking_job_becomes_failed() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("src");
        std::fs::create_dir_all(source.join("META-INF")).unwrap();
        std::fs::write(source.join("content.xml"), "<c/>").unwrap();
        std::fs::write(source.join("styles.xml"), "<s/>").unwrap();
        std::fs::write(source.join("META-INF/manifest.xml"), "<m/>").unwrap();
        let template = dir.path().join("t.odt");
        crate::archive::ArchiveStager::default()
            .compress(&source, &template)
            .await
            .unwrap();

        let mut processor = processor(Arc::new(PanickingEngine));
        processor.add_job(Job::new("p", &template, dir.path().join("w"), dir.path().join("out"), "p"));

        let jobs = processor.run().await;
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert!(
            jobs[0]
                .error_message
                .as_deref()
                .unwrap()
                .contains("template engine exploded")
        );
        assert!(jobs[0].completed_at.is_none());
    }
}
