//! Recursive deletion of files and directory trees.
//!
//! One deleter, three policies:
//! - `Sequential`: depth-first, pausing after every removed file; stops at
//!   the first failure without touching later siblings.
//! - `FanOut`: one task per child of every directory, results collected
//!   through a per-directory channel; the directory is removed only if every
//!   child succeeded. Failed children never cancel their siblings.
//! - `Progress`: lists the whole tree up front (children before parents),
//!   then removes items one by one and reports after each.
//!
//! Removing a path that does not exist succeeds. Nothing is restored when a
//! deletion fails halfway.

use async_recursion::async_recursion;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use odfgen_core::{Error, Result};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tracing::{debug, warn};

use crate::driver::{cooperate, pause};

/// What a tree entry is. Symlinks count as files and are never followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Filesystem operations the deleter needs.
#[async_trait]
pub trait TreeFs: Send + Sync {
    /// `None` if nothing exists at `path`.
    async fn kind(&self, path: &Path) -> Result<Option<EntryKind>>;

    /// Immediate children of `dir`, sorted by name.
    async fn children(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    async fn remove(&self, path: &Path, kind: EntryKind) -> Result<()>;
}

/// The local filesystem through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl TreeFs for LocalFs {
    async fn kind(&self, path: &Path) -> Result<Option<EntryKind>> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    async fn children(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| Error::io(dir, e))?;
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
            children.push(entry.path());
        }
        children.sort();
        Ok(children)
    }

    async fn remove(&self, path: &Path, kind: EntryKind) -> Result<()> {
        let result = match kind {
            EntryKind::File => tokio::fs::remove_file(path).await,
            EntryKind::Directory => tokio::fs::remove_dir(path).await,
        };
        result.map_err(|e| Error::io(path, e))
    }
}

/// Progress report emitted by the `Progress` policy after each removal.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteProgress {
    pub current: PathBuf,
    pub processed: usize,
    pub total: usize,
    pub percentage: f64,
}

pub type ProgressCallback = Arc<dyn Fn(&DeleteProgress) + Send + Sync>;

/// How a tree is removed.
#[derive(Clone)]
pub enum DeletePolicy {
    Sequential { chunk_delay: Duration },
    FanOut { width: usize },
    Progress { callback: ProgressCallback },
}

impl DeletePolicy {
    pub fn sequential(chunk_delay: Duration) -> Self {
        Self::Sequential { chunk_delay }
    }

    /// `width` bounds how many file removals run at once; it is at least 1.
    pub fn fan_out(width: usize) -> Self {
        Self::FanOut {
            width: width.max(1),
        }
    }

    pub fn with_progress(callback: impl Fn(&DeleteProgress) + Send + Sync + 'static) -> Self {
        Self::Progress {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for DeletePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential { chunk_delay } => f
                .debug_struct("Sequential")
                .field("chunk_delay", chunk_delay)
                .finish(),
            Self::FanOut { width } => f.debug_struct("FanOut").field("width", width).finish(),
            Self::Progress { .. } => f.debug_struct("Progress").finish_non_exhaustive(),
        }
    }
}

/// Counts of what a deletion removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteStats {
    pub files: usize,
    pub directories: usize,
    /// Child tasks launched (fan-out only).
    pub tasks: usize,
}

impl DeleteStats {
    fn record(&mut self, kind: EntryKind) {
        match kind {
            EntryKind::File => self.files += 1,
            EntryKind::Directory => self.directories += 1,
        }
    }

    fn absorb(&mut self, other: DeleteStats) {
        self.files += other.files;
        self.directories += other.directories;
        self.tasks += other.tasks;
    }
}

/// Removes files and directory trees according to a policy.
#[derive(Clone)]
pub struct RecursiveDeleter {
    policy: DeletePolicy,
    fs: Arc<dyn TreeFs>,
}

impl RecursiveDeleter {
    pub fn new(policy: DeletePolicy) -> Self {
        Self::with_fs(policy, Arc::new(LocalFs))
    }

    pub fn with_fs(policy: DeletePolicy, fs: Arc<dyn TreeFs>) -> Self {
        Self { policy, fs }
    }

    pub fn policy(&self) -> &DeletePolicy {
        &self.policy
    }

    /// Delete a file, or a directory and everything below it.
    pub async fn delete(&self, path: &Path) -> Result<DeleteStats> {
        debug!(path = %path.display(), policy = ?self.policy, "Deleting");
        match &self.policy {
            DeletePolicy::Sequential { chunk_delay } => {
                delete_sequential(self.fs.as_ref(), path, *chunk_delay).await
            }
            DeletePolicy::FanOut { width } => {
                let permits = Arc::new(Semaphore::new(*width));
                let tasks = Arc::new(AtomicUsize::new(0));
                let mut stats =
                    delete_fan_out(self.fs.clone(), path.to_path_buf(), permits, tasks.clone())
                        .await?;
                stats.tasks = tasks.load(Ordering::SeqCst);
                Ok(stats)
            }
            DeletePolicy::Progress { callback } => {
                delete_with_progress(self.fs.as_ref(), path, callback).await
            }
        }
    }
}

#[async_recursion]
async fn delete_sequential(fs: &dyn TreeFs, path: &Path, chunk_delay: Duration) -> Result<DeleteStats> {
    cooperate().await;
    let mut stats = DeleteStats::default();
    let Some(kind) = fs.kind(path).await? else {
        return Ok(stats);
    };

    if kind == EntryKind::Directory {
        for child in fs.children(path).await? {
            stats.absorb(delete_sequential(fs, &child, chunk_delay).await?);
        }
    }

    fs.remove(path, kind).await?;
    stats.record(kind);
    if kind == EntryKind::File {
        pause(chunk_delay).await;
    }
    Ok(stats)
}

fn delete_fan_out(
    fs: Arc<dyn TreeFs>,
    path: PathBuf,
    permits: Arc<Semaphore>,
    tasks: Arc<AtomicUsize>,
) -> BoxFuture<'static, Result<DeleteStats>> {
    async move {
        let mut stats = DeleteStats::default();
        let Some(kind) = fs.kind(&path).await? else {
            return Ok(stats);
        };

        if kind == EntryKind::File {
            // Only leaf removals take a permit, so a parent waiting on its
            // children never holds one.
            let _permit = permits
                .acquire()
                .await
                .map_err(|e| Error::Internal(format!("delete permits closed: {}", e)))?;
            fs.remove(&path, kind).await?;
            stats.record(kind);
            return Ok(stats);
        }

        let children = fs.children(&path).await?;
        let (tx, mut rx) = mpsc::channel(children.len().max(1));
        for child in &children {
            let tx = tx.clone();
            let child = child.clone();
            let task = delete_fan_out(fs.clone(), child.clone(), permits.clone(), tasks.clone());
            tasks.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let result = task.await;
                let _ = tx.send((child, result)).await;
            });
        }
        drop(tx);

        let mut failure: Option<Error> = None;
        for _ in 0..children.len() {
            match rx.recv().await {
                Some((_, Ok(child_stats))) => stats.absorb(child_stats),
                Some((child, Err(e))) => {
                    warn!(path = %child.display(), error = %e, "Failed to delete child");
                    if failure.is_none() {
                        failure = Some(e);
                    }
                }
                None => {
                    if failure.is_none() {
                        failure = Some(Error::Internal(format!(
                            "delete task under {} ended without a result",
                            path.display()
                        )));
                    }
                    break;
                }
            }
            cooperate().await;
        }

        if let Some(e) = failure {
            return Err(e);
        }

        fs.remove(&path, kind).await?;
        stats.record(kind);
        Ok(stats)
    }
    .boxed()
}

async fn delete_with_progress(
    fs: &dyn TreeFs,
    path: &Path,
    callback: &ProgressCallback,
) -> Result<DeleteStats> {
    let mut stats = DeleteStats::default();
    let Some(kind) = fs.kind(path).await? else {
        return Ok(stats);
    };

    let mut items = Vec::new();
    if kind == EntryKind::Directory {
        collect_tree(fs, path, &mut items).await?;
    }
    items.push((path.to_path_buf(), kind));

    let total = items.len();
    for (index, (item, item_kind)) in items.into_iter().enumerate() {
        fs.remove(&item, item_kind).await?;
        stats.record(item_kind);

        let processed = index + 1;
        callback(&DeleteProgress {
            current: item,
            processed,
            total,
            percentage: processed as f64 / total as f64 * 100.0,
        });
        cooperate().await;
    }

    Ok(stats)
}

/// Depth-first listing with children before their parent; `dir` itself is
/// not included.
#[async_recursion]
async fn collect_tree(
    fs: &dyn TreeFs,
    dir: &Path,
    items: &mut Vec<(PathBuf, EntryKind)>,
) -> Result<()> {
    for child in fs.children(dir).await? {
        match fs.kind(&child).await? {
            Some(EntryKind::Directory) => {
                collect_tree(fs, &child, items).await?;
                items.push((child, EntryKind::Directory));
            }
            Some(EntryKind::File) => items.push((child, EntryKind::File)),
            None => {}
        }
    }
    Ok(())
}
