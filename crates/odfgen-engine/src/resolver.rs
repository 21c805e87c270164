//! Resolver registry and the per-job action chain.

use odfgen_core::{Error, Exporter, Job, JobOutput, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Action name to exporter mapping. Filled before a run, read-only during it.
#[derive(Clone, Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn Exporter>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `exporter` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, exporter: Arc<dyn Exporter>) {
        self.resolvers.insert(name.into(), exporter);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Exporter>> {
        self.resolvers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolvers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.resolvers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}

impl fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("resolvers", &self.names())
            .finish()
    }
}

/// Runs a job's actions in order, each consuming the next unconsumed result.
pub struct ResolverChain<'a> {
    registry: &'a ResolverRegistry,
}

impl<'a> ResolverChain<'a> {
    pub fn new(registry: &'a ResolverRegistry) -> Self {
        Self { registry }
    }

    /// Run every action of `job`, appending each output to `job.results`.
    ///
    /// Actions without a registered resolver are skipped without consuming
    /// a result and recorded in `job.skipped_actions`. The first failing
    /// action stops the chain; outputs produced before it stay on the job.
    pub async fn run(&self, job: &mut Job) -> Result<()> {
        let mut index = 0;
        let actions = job.actions.clone();

        for action in &actions {
            let Some(exporter) = self.registry.get(action) else {
                warn!(job_id = %job.id, action = %action, "No resolver registered, skipping action");
                job.skipped_actions.push(action.clone());
                continue;
            };

            let effective = job.parameters.for_action(action);
            let (file, parameters) = match job.results.get(index) {
                Some(JobOutput::File(file)) => (file.clone(), effective),
                Some(JobOutput::Exported(output)) => (
                    output.file.clone(),
                    effective.merged_with(&output.parameters),
                ),
                None => {
                    return Err(Error::Internal(format!(
                        "action {} has no input: {} results for index {}",
                        action,
                        job.results.len(),
                        index
                    )));
                }
            };

            debug!(job_id = %job.id, action = %action, exporter = exporter.name(), file = %file.display(), "Running action");
            let output = exporter.process(&file, &parameters).await?;
            job.results.push(JobOutput::Exported(output));
            job.touch();
            index += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use odfgen_core::{ExportOutput, Parameters};
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    /// Records every call and returns `<input>.<suffix>` as the transformed file.
    struct RecordingExporter {
        suffix: &'static str,
        calls: Mutex<Vec<(PathBuf, Parameters)>>,
    }

    impl RecordingExporter {
        fn new(suffix: &'static str) -> Arc<Self> {
            Arc::new(Self {
                suffix,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Exporter for RecordingExporter {
        fn name(&self) -> &str {
            "recording"
        }

        async fn process(&self, file: &Path, parameters: &Parameters) -> Result<ExportOutput> {
            self.calls
                .lock()
                .unwrap()
                .push((file.to_path_buf(), parameters.clone()));
            let transformed = format!("{}.{}", file.display(), self.suffix);
            Ok(ExportOutput {
                file: PathBuf::from(&transformed),
                parameters: Parameters::new().with("transformed", transformed),
            })
        }
    }

    struct FailingExporter;

    #[async_trait]
    impl Exporter for FailingExporter {
        fn name(&self) -> &str {
            "failing"
        }

        async fn process(&self, _file: &Path, _parameters: &Parameters) -> Result<ExportOutput> {
            Err(Error::Remote("conversion service unavailable".to_string()))
        }
    }

    fn job_with_results(actions: &[&str]) -> Job {
        let mut job = Job::new("j1", "t.odt", "/tmp/w", "/tmp/out", "doc");
        for action in actions {
            job = job.with_action(*action);
        }
        job.results.push(JobOutput::File(PathBuf::from("/tmp/out/doc.odt")));
        job
    }

    #[tokio::test]
    async fn test_missing_resolver_is_skipped_without_advancing() {
        let b = RecordingExporter::new("pdf");
        let mut registry = ResolverRegistry::new();
        registry.register("b", b.clone());

        let mut job = job_with_results(&["a", "b"]);
        ResolverChain::new(&registry).run(&mut job).await.unwrap();

        assert_eq!(job.skipped_actions, vec!["a"]);
        let calls = b.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, PathBuf::from("/tmp/out/doc.odt"));
        assert_eq!(job.results.len(), 2);
    }

    #[tokio::test]
    async fn test_dedicated_parameters_and_fragment_merge() {
        let first = RecordingExporter::new("pdf");
        let second = RecordingExporter::new("zip");
        let mut registry = ResolverRegistry::new();
        registry.register("pdf", first.clone());
        registry.register("zip", second.clone());

        let parameters: Parameters = serde_json::from_value(json!({
            "pdf": { "format": "pdf" },
            "transformed": "shared-default",
            "level": 9,
        }))
        .unwrap();
        let mut job = job_with_results(&["pdf", "zip"]).with_parameters(parameters);

        ResolverChain::new(&registry).run(&mut job).await.unwrap();

        let first_calls = first.calls.lock().unwrap();
        assert_eq!(first_calls[0].1.get("format"), Some(&Value::from("pdf")));
        assert!(!first_calls[0].1.contains_key("level"));

        // No dedicated entry: whole mapping, with the upstream fragment winning.
        let second_calls = second.calls.lock().unwrap();
        assert_eq!(second_calls[0].0, PathBuf::from("/tmp/out/doc.odt.pdf"));
        assert_eq!(
            second_calls[0].1.get("transformed"),
            Some(&Value::from("/tmp/out/doc.odt.pdf"))
        );
        assert_eq!(second_calls[0].1.get("level"), Some(&Value::from(9)));

        assert_eq!(job.results.len(), 3);
        assert_eq!(
            job.results[2].file(),
            &PathBuf::from("/tmp/out/doc.odt.pdf.zip")
        );
    }

    #[tokio::test]
    async fn test_failure_stops_chain_and_keeps_partial_results() {
        let first = RecordingExporter::new("pdf");
        let last = RecordingExporter::new("zip");
        let mut registry = ResolverRegistry::new();
        registry.register("pdf", first.clone());
        registry.register("broken", Arc::new(FailingExporter));
        registry.register("zip", last.clone());

        let mut job = job_with_results(&["pdf", "broken", "zip"]);
        let err = ResolverChain::new(&registry).run(&mut job).await.unwrap_err();

        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(job.results.len(), 2);
        assert!(last.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_registry_names_sorted() {
        let mut registry = ResolverRegistry::new();
        registry.register("zip", RecordingExporter::new("zip"));
        registry.register("pdf", RecordingExporter::new("pdf"));
        assert_eq!(registry.names(), vec!["pdf", "zip"]);
        assert!(registry.contains("pdf"));
        assert_eq!(registry.len(), 2);
        assert!(format!("{:?}", registry).contains("pdf"));
    }
}
