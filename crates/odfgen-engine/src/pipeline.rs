//! Job pipeline - runs one job through every stage in order.

use odfgen_config::EngineSettings;
use odfgen_core::{Container, Job, JobOutput, PipelineStage, ResourceId, Result, TemplateEngine};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::archive::ArchiveStager;
use crate::deleter::{DeletePolicy, RecursiveDeleter};
use crate::resolver::{ResolverChain, ResolverRegistry};

/// Collaborators shared by every job of a run.
pub struct PipelineContext {
    pub container: Arc<dyn Container>,
    pub engine: Arc<dyn TemplateEngine>,
    pub resolvers: Arc<ResolverRegistry>,
    pub stager: ArchiveStager,
    pub settings: EngineSettings,
}

impl PipelineContext {
    pub fn new(
        container: Arc<dyn Container>,
        engine: Arc<dyn TemplateEngine>,
        resolvers: Arc<ResolverRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            container,
            engine,
            resolvers,
            stager: ArchiveStager::from_settings(&settings),
            settings,
        }
    }

    fn cleanup_deleter(&self) -> RecursiveDeleter {
        RecursiveDeleter::new(DeletePolicy::sequential(self.settings.delete_chunk_delay))
    }
}

/// Drives a single job from extraction to its last action.
#[derive(Clone)]
pub struct JobPipeline {
    context: Arc<PipelineContext>,
}

impl JobPipeline {
    pub fn new(context: Arc<PipelineContext>) -> Self {
        Self { context }
    }

    /// Run `job` to a terminal status and hand it back.
    ///
    /// Stage errors never escape: they end the job as `failed` with the
    /// failing stage and message recorded.
    pub async fn run(&self, mut job: Job) -> Job {
        info!(job_id = %job.id, template = %job.template_path.display(), "Starting job");
        job.mark_running();

        // Jobs may share a working directory; each one only owns its staging subdirectory.
        let staging = job.working_dir.join(ResourceId::new().simple());
        let mut stage = PipelineStage::Extracting;
        match self.execute(&mut job, &staging, &mut stage).await {
            Ok(()) => {
                job.mark_succeeded();
                info!(job_id = %job.id, results = job.results.len(), "Job succeeded");
            }
            Err(e) => {
                error!(job_id = %job.id, stage = %stage, error = %e, "Job failed");
                job.mark_failed(stage, e.to_string());
                if self.context.settings.cleanup_on_failure {
                    self.cleanup_after_failure(&job, &staging).await;
                }
            }
        }

        job
    }

    async fn execute(&self, job: &mut Job, staging: &Path, stage: &mut PipelineStage) -> Result<()> {
        let ctx = &self.context;

        *stage = PipelineStage::Extracting;
        let staging = ctx.stager.extract(&job.template_path, staging).await?;
        self.advance(job, *stage);

        *stage = PipelineStage::Loading;
        let mut document = ctx.container.load_file(&staging).await?;
        self.advance(job, *stage);

        *stage = PipelineStage::Rendering;
        ctx.engine
            .render(&mut document, &job.data, &job.working_dir)
            .await?;
        self.advance(job, *stage);

        *stage = PipelineStage::Saving;
        ctx.container.save_file(&document).await?;
        self.advance(job, *stage);

        *stage = PipelineStage::Compressing;
        let output = output_path(job, &ctx.settings.output_extension);
        let output = ctx.stager.compress(&staging, &output).await?;
        job.results.push(JobOutput::File(output));
        self.advance(job, *stage);

        *stage = PipelineStage::CleaningUp;
        // A leftover staging directory does not invalidate the produced document.
        if let Err(e) = ctx.cleanup_deleter().delete(&staging).await {
            warn!(job_id = %job.id, path = %staging.display(), error = %e, "Failed to clean up staging directory");
        }
        remove_if_empty(&job.working_dir).await;
        self.advance(job, *stage);

        *stage = PipelineStage::Resolving;
        ResolverChain::new(&ctx.resolvers).run(job).await?;
        self.advance(job, *stage);

        Ok(())
    }

    fn advance(&self, job: &mut Job, stage: PipelineStage) {
        job.touch();
        debug!(job_id = %job.id, stage = %stage, "Stage completed");
    }

    /// Best-effort removal of a failed job's staging directory. Leaves the
    /// recorded failure untouched.
    async fn cleanup_after_failure(&self, job: &Job, staging: &Path) {
        match self.context.cleanup_deleter().delete(staging).await {
            Ok(stats) => debug!(
                job_id = %job.id,
                files = stats.files,
                directories = stats.directories,
                "Removed staging directory of failed job"
            ),
            Err(e) => warn!(
                job_id = %job.id,
                path = %staging.display(),
                error = %e,
                "Failed to clean up after failed job"
            ),
        }
        remove_if_empty(&job.working_dir).await;
    }
}

/// Remove `dir` when nothing is left in it. Returns whether it was removed.
///
/// Anything still inside (a sibling's staging tree, caller resources) keeps
/// the directory in place.
async fn remove_if_empty(dir: &Path) -> bool {
    match tokio::fs::remove_dir(dir).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            debug!(path = %dir.display(), error = %e, "Working directory kept");
            false
        }
    }
}

/// `<output_dir>/<output_name>.<extension>`
pub fn output_path(job: &Job, extension: &str) -> PathBuf {
    let file_name = format!("{}.{}", job.output_name, extension.trim_start_matches('.'));
    job.output_dir.join(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use odfgen_core::{Document, Error, JobStatus};
    use odfgen_document::{FsContainer, PlaceholderEngine};
    use serde_json::{Value, json};
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    struct BrokenEngine;

    #[async_trait]
    impl TemplateEngine for BrokenEngine {
        async fn render(&self, _document: &mut Document, _data: &Value, _working_dir: &Path) -> Result<()> {
            Err(Error::Render("unbalanced placeholder".to_string()))
        }
    }

    fn settings(cleanup_on_failure: bool) -> EngineSettings {
        EngineSettings {
            cleanup_on_failure,
            delete_chunk_delay: Duration::ZERO,
            ..EngineSettings::default()
        }
    }

    fn pipeline(engine: Arc<dyn TemplateEngine>, cleanup_on_failure: bool) -> JobPipeline {
        JobPipeline::new(Arc::new(PipelineContext::new(
            Arc::new(FsContainer::new()),
            engine,
            Arc::new(ResolverRegistry::new()),
            settings(cleanup_on_failure),
        )))
    }

    async fn write_template(dir: &Path) -> PathBuf {
        let source = dir.join("template-src");
        fs::create_dir_all(source.join("META-INF")).unwrap();
        fs::write(source.join("mimetype"), "application/vnd.oasis.opendocument.text").unwrap();
        fs::write(source.join("content.xml"), "<office:text>${title}</office:text>").unwrap();
        fs::write(source.join("styles.xml"), "<office:styles/>").unwrap();
        fs::write(source.join("META-INF/manifest.xml"), "<manifest:manifest/>").unwrap();

        let template = dir.join("Report.odt");
        ArchiveStager::default()
            .compress(&source, &template)
            .await
            .unwrap();
        template
    }

    #[tokio::test]
    async fn test_successful_job() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path()).await;
        let job = Job::new(
            "ok",
            &template,
            dir.path().join("work"),
            dir.path().join("out"),
            "Report_1",
        )
        .with_data(json!({ "title": "Q3" }));

        let job = pipeline(Arc::new(PlaceholderEngine::new()), true).run(job).await;

        assert_eq!(job.status, JobStatus::Succeeded, "{:?}", job.error_message);
        assert!(job.completed_at.is_some());
        assert_eq!(
            job.results,
            vec![JobOutput::File(dir.path().join("out/Report_1.odt"))]
        );
        assert!(!dir.path().join("work").exists());

        let check = dir.path().join("check");
        ArchiveStager::default()
            .extract(&dir.path().join("out/Report_1.odt"), &check)
            .await
            .unwrap();
        assert_eq!(
            fs::read_to_string(check.join("content.xml")).unwrap(),
            "<office:text>Q3</office:text>"
        );
    }

    #[tokio::test]
    async fn test_missing_template_fails_extracting() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(
            "missing",
            dir.path().join("nope.odt"),
            dir.path().join("work"),
            dir.path().join("out"),
            "x",
        );

        let job = pipeline(Arc::new(PlaceholderEngine::new()), true).run(job).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.failed_stage, Some(PipelineStage::Extracting));
        assert!(job.error_message.is_some());
        assert!(job.completed_at.is_none());
        assert!(job.results.is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_cleans_up_when_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path()).await;
        let work = dir.path().join("work");
        let job = Job::new("bad", &template, &work, dir.path().join("out"), "x");

        let job = pipeline(Arc::new(BrokenEngine), true).run(job).await;

        assert_eq!(job.failed_stage, Some(PipelineStage::Rendering));
        assert!(job.error_message.as_deref().unwrap().contains("unbalanced"));
        assert!(!work.exists());
    }

    #[tokio::test]
    async fn test_render_failure_keeps_working_dir_when_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path()).await;
        let work = dir.path().join("work");
        let job = Job::new("bad", &template, &work, dir.path().join("out"), "x");

        let job = pipeline(Arc::new(BrokenEngine), false).run(job).await;

        assert_eq!(job.status, JobStatus::Failed);
        assert!(work.exists());
        assert_eq!(fs::read_dir(&work).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_other_content_of_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let template = write_template(dir.path()).await;
        let work = dir.path().join("work");
        let sibling = work.join("other-job");
        fs::create_dir_all(&sibling).unwrap();
        fs::write(sibling.join("content.xml"), "<in-progress/>").unwrap();
        fs::write(work.join("logo.png"), "png").unwrap();

        let ok = Job::new("ok", &template, &work, dir.path().join("out"), "a");
        let ok = pipeline(Arc::new(PlaceholderEngine::new()), true).run(ok).await;
        assert_eq!(ok.status, JobStatus::Succeeded, "{:?}", ok.error_message);

        let bad = Job::new("bad", &template, &work, dir.path().join("out"), "b");
        let bad = pipeline(Arc::new(BrokenEngine), true).run(bad).await;
        assert_eq!(bad.status, JobStatus::Failed);

        let mut left: Vec<String> = fs::read_dir(&work)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        left.sort();
        assert_eq!(left, vec!["logo.png", "other-job"]);
        assert_eq!(
            fs::read_to_string(sibling.join("content.xml")).unwrap(),
            "<in-progress/>"
        );
    }

    #[tokio::test]
    async fn test_remove_if_empty() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&full).unwrap();
        fs::write(full.join("keep.txt"), "x").unwrap();

        assert!(remove_if_empty(&empty).await);
        assert!(!remove_if_empty(&full).await);
        assert!(!remove_if_empty(&dir.path().join("missing")).await);
        assert!(!empty.exists());
        assert!(full.join("keep.txt").exists());
    }

    #[test]
    fn test_output_path() {
        let job = Job::new("j", "t.odt", "/w", "/out", "Report_1");
        assert_eq!(output_path(&job, "odt"), PathBuf::from("/out/Report_1.odt"));
        assert_eq!(output_path(&job, ".ott"), PathBuf::from("/out/Report_1.ott"));
    }
}
