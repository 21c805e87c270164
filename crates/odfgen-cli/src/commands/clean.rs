//! Recursive delete command.

use anyhow::{Context, Result};
use clap::ValueEnum;
use odfgen_config::{EngineSettings, load_batch};
use odfgen_engine::{DeletePolicy, RecursiveDeleter};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Strategy {
    /// Depth-first, one file at a time
    Sequential,
    /// One task per child, bounded removals
    FanOut,
    /// Sequential with a progress line per removed item
    Progress,
}

impl Strategy {
    pub fn policy(self, settings: &EngineSettings, width: usize) -> DeletePolicy {
        match self {
            Strategy::Sequential => DeletePolicy::sequential(settings.delete_chunk_delay),
            Strategy::FanOut => DeletePolicy::fan_out(width),
            Strategy::Progress => DeletePolicy::with_progress(|progress| {
                println!(
                    "[{:>5.1}%] {}/{} {}",
                    progress.percentage,
                    progress.processed,
                    progress.total,
                    progress.current.display()
                );
            }),
        }
    }
}

/// Settings of `batch` when given, the defaults otherwise.
fn clean_settings(batch: Option<&Path>) -> Result<EngineSettings> {
    match batch {
        Some(batch) => Ok(load_batch(batch)
            .with_context(|| format!("Failed to load batch file: {}", batch.display()))?
            .settings),
        None => Ok(EngineSettings::default()),
    }
}

/// Delete `path`. An explicit `width` wins over the `fan-out-width` setting.
pub async fn clean(
    path: &Path,
    strategy: Strategy,
    width: Option<usize>,
    batch: Option<&Path>,
) -> Result<()> {
    let settings = clean_settings(batch)?;
    let width = width.unwrap_or(settings.fan_out_width);
    let deleter = RecursiveDeleter::new(strategy.policy(&settings, width));
    let stats = deleter
        .delete(path)
        .await
        .with_context(|| format!("Failed to delete {}", path.display()))?;

    println!(
        "Removed {} files and {} directories from {}",
        stats.files,
        stats.directories,
        path.display()
    );
    if stats.tasks > 0 {
        println!("Launched {} delete tasks", stats.tasks);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_each_strategy() {
        for strategy in [Strategy::Sequential, Strategy::FanOut, Strategy::Progress] {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("tree");
            std::fs::create_dir_all(root.join("nested")).unwrap();
            std::fs::write(root.join("nested/file.txt"), "x").unwrap();

            clean(&root, strategy, Some(2), None).await.unwrap();
            assert!(!root.exists(), "{:?} left the tree behind", strategy);
        }
    }

    #[test]
    fn test_fan_out_width_is_at_least_one() {
        match Strategy::FanOut.policy(&EngineSettings::default(), 0) {
            DeletePolicy::FanOut { width } => assert_eq!(width, 1),
            other => panic!("unexpected policy {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_width_defaults_to_batch_setting() {
        let dir = tempfile::tempdir().unwrap();
        let batch = dir.path().join("batch.kdl");
        std::fs::write(
            &batch,
            r#"
settings {
    fan-out-width 3
    delete-chunk-delay-ms 0
}
"#,
        )
        .unwrap();

        let settings = clean_settings(Some(&batch)).unwrap();
        assert_eq!(settings.fan_out_width, 3);
        assert_eq!(
            clean_settings(None).unwrap().fan_out_width,
            EngineSettings::default().fan_out_width
        );

        let root = dir.path().join("tree");
        std::fs::create_dir_all(root.join("a/b")).unwrap();
        std::fs::write(root.join("a/b/file.txt"), "x").unwrap();
        clean(&root, Strategy::FanOut, None, Some(&batch)).await.unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn test_missing_batch_is_an_error() {
        let err = clean_settings(Some(Path::new("/nonexistent/batch.kdl"))).unwrap_err();
        assert!(err.to_string().contains("Failed to load batch file"));
    }
}
