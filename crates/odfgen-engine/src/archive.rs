//! Cooperative archive staging.
//!
//! Extraction yields every `yield_every` entries; compression yields after
//! every file. Those are the only suspension points: all file system work is
//! synchronous, and zip entry handles are confined to synchronous helpers so
//! none is alive across a yield point.

use odfgen_config::EngineSettings;
use odfgen_core::{Error, Result};
use std::fs::File;
use std::io::{self, Read, Seek, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::driver::cooperate;

/// Entry stored first and uncompressed in ODF packages.
pub const MIMETYPE_ENTRY: &str = "mimetype";

/// Extracts template archives and compresses staged documents.
#[derive(Debug, Clone)]
pub struct ArchiveStager {
    yield_every: usize,
    stream_threshold: u64,
}

impl Default for ArchiveStager {
    fn default() -> Self {
        Self::from_settings(&EngineSettings::default())
    }
}

impl ArchiveStager {
    pub fn new(yield_every: usize, stream_threshold: u64) -> Self {
        Self {
            yield_every: yield_every.max(1),
            stream_threshold,
        }
    }

    pub fn from_settings(settings: &EngineSettings) -> Self {
        Self::new(settings.extract_yield_every, settings.stream_threshold)
    }

    /// Extract `archive` into `dest`, creating it if needed. Returns `dest`.
    pub async fn extract(&self, archive: &Path, dest: &Path) -> Result<PathBuf> {
        let file = File::open(archive)
            .map_err(|e| Error::Archive(format!("cannot open {}: {}", archive.display(), e)))?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| Error::Archive(format!("cannot read {}: {}", archive.display(), e)))?;
        std::fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;

        let entries = zip.len();
        for index in 0..entries {
            extract_entry(&mut zip, index, dest, archive)?;
            if (index + 1) % self.yield_every == 0 {
                cooperate().await;
            }
        }

        debug!(archive = %archive.display(), dest = %dest.display(), entries, "Extracted archive");
        Ok(dest.to_path_buf())
    }

    /// Compress the tree under `source` into `archive`. Returns `archive`.
    pub async fn compress(&self, source: &Path, archive: &Path) -> Result<PathBuf> {
        let mut entries = Vec::new();
        collect_entries(source, source, &mut entries)?;
        // mimetype must be the first entry of the package.
        if let Some(pos) = entries.iter().position(|e| e.name == MIMETYPE_ENTRY) {
            let mimetype = entries.remove(pos);
            entries.insert(0, mimetype);
        }

        if let Some(parent) = archive.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let file = File::create(archive)
            .map_err(|e| Error::Archive(format!("cannot create {}: {}", archive.display(), e)))?;
        let mut writer = ZipWriter::new(file);

        let mut files = 0usize;
        for entry in &entries {
            match &entry.source {
                Some(path) => {
                    self.write_entry(&mut writer, &entry.name, path)?;
                    files += 1;
                    cooperate().await;
                }
                None => {
                    writer
                        .add_directory(entry.name.as_str(), SimpleFileOptions::default())
                        .map_err(|e| Error::Archive(format!("cannot add {}: {}", entry.name, e)))?;
                }
            }
        }

        writer
            .finish()
            .map_err(|e| Error::Archive(format!("cannot finish {}: {}", archive.display(), e)))?;
        debug!(source = %source.display(), archive = %archive.display(), files, "Compressed archive");
        Ok(archive.to_path_buf())
    }

    fn write_entry<W: Write + Seek>(
        &self,
        writer: &mut ZipWriter<W>,
        name: &str,
        path: &Path,
    ) -> Result<()> {
        let method = if name == MIMETYPE_ENTRY {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflated
        };
        let options = SimpleFileOptions::default().compression_method(method);
        writer
            .start_file(name, options)
            .map_err(|e| Error::Archive(format!("cannot add {}: {}", name, e)))?;

        let size = std::fs::metadata(path)
            .map_err(|e| Error::io(path, e))?
            .len();
        if size > self.stream_threshold {
            let mut input = File::open(path).map_err(|e| Error::io(path, e))?;
            io::copy(&mut input, writer).map_err(|e| Error::io(path, e))?;
        } else {
            let bytes = std::fs::read(path).map_err(|e| Error::io(path, e))?;
            writer.write_all(&bytes).map_err(|e| Error::io(path, e))?;
        }
        Ok(())
    }
}

fn extract_entry<R: Read + Seek>(
    zip: &mut ZipArchive<R>,
    index: usize,
    dest: &Path,
    archive: &Path,
) -> Result<()> {
    let mut entry = zip
        .by_index(index)
        .map_err(|e| Error::Archive(format!("{}: entry {}: {}", archive.display(), index, e)))?;
    let Some(relative) = entry.enclosed_name() else {
        return Err(Error::Archive(format!(
            "{}: entry {} has an unsafe path",
            archive.display(),
            entry.name()
        )));
    };
    let target = dest.join(relative);

    if entry.is_dir() {
        return std::fs::create_dir_all(&target).map_err(|e| Error::io(&target, e));
    }
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let mut output = File::create(&target).map_err(|e| Error::io(&target, e))?;
    io::copy(&mut entry, &mut output).map_err(|e| Error::io(&target, e))?;
    Ok(())
}

/// One archive member: a file with its source path, or a directory.
#[derive(Debug)]
struct StagedEntry {
    name: String,
    source: Option<PathBuf>,
}

/// Depth-first, name-ordered listing of the tree under `dir`.
///
/// Names are `/`-separated, directories end with `/`. Symbolic links are
/// never followed, so a link cycle cannot recurse forever.
fn collect_entries(root: &Path, dir: &Path, entries: &mut Vec<StagedEntry>) -> Result<()> {
    let mut paths = std::fs::read_dir(dir)
        .map_err(|e| Error::io(dir, e))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| Error::io(dir, e))?;
    paths.sort();

    for path in paths {
        let file_type = std::fs::symlink_metadata(&path)
            .map_err(|e| Error::io(&path, e))?
            .file_type();
        let name = entry_name(root, &path)?;

        if file_type.is_symlink() {
            warn!(path = %path.display(), "Skipping symbolic link");
        } else if file_type.is_dir() {
            entries.push(StagedEntry {
                name: format!("{}/", name),
                source: None,
            });
            collect_entries(root, &path, entries)?;
        } else {
            entries.push(StagedEntry {
                name,
                source: Some(path),
            });
        }
    }
    Ok(())
}

fn entry_name(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .map_err(|e| Error::Internal(format!("{}: {}", path.display(), e)))?;
    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
