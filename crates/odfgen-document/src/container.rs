//! Filesystem document container.

use async_trait::async_trait;
use odfgen_core::document::{Container, Document, Part, PartKind, PICTURES_DIR};
use odfgen_core::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const MANIFEST_CLOSE: &str = "</manifest:manifest>";

/// Container reading parts straight from an extracted package directory.
#[derive(Debug, Clone, Default)]
pub struct FsContainer;

impl FsContainer {
    pub fn new() -> Self {
        Self
    }

    /// Copy an image into `Pictures/` and register it in the manifest.
    ///
    /// Returns the image path relative to the package root, which is what
    /// content markup refers to.
    pub async fn add_image(
        &self,
        document: &mut Document,
        image: &Path,
        name: Option<&str>,
    ) -> Result<String> {
        let file_name = match name {
            Some(name) => name.to_string(),
            None => image
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .ok_or_else(|| {
                    Error::Format(format!("image path has no file name: {}", image.display()))
                })?,
        };

        let pictures = document.pictures_dir();
        tokio::fs::create_dir_all(&pictures)
            .await
            .map_err(|e| Error::io(&pictures, e))?;
        let target = pictures.join(&file_name);
        tokio::fs::copy(image, &target)
            .await
            .map_err(|e| Error::io(image, e))?;

        let member = format!("{}/{}", PICTURES_DIR, file_name);
        let manifest = document.get_part_mut(PartKind::Manifest).ok_or_else(|| {
            Error::Format("manifest part not loaded".to_string())
        })?;
        let Some(close) = manifest.markup.rfind(MANIFEST_CLOSE) else {
            return Err(Error::Format(
                "manifest has no closing manifest:manifest element".to_string(),
            ));
        };
        let entry = format!(
            " <manifest:file-entry manifest:full-path=\"{}\" manifest:media-type=\"{}\"/>\n",
            member,
            media_type(&file_name)
        );
        manifest.markup.insert_str(close, &entry);

        debug!(image = %image.display(), member = %member, "Added image to document");
        Ok(member)
    }

    async fn load_part(document: &Document, kind: PartKind) -> Result<Option<Part>> {
        let path = document.part_path(kind);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound && !kind.is_required() => {
                debug!(part = kind.member_path(), "Optional part not present");
                return Ok(None);
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(Error::Format(format!(
                    "missing required part {} in {}",
                    kind.member_path(),
                    document.root().display()
                )));
            }
            Err(e) => return Err(Error::io(&path, e)),
        };

        let markup = String::from_utf8(bytes).map_err(|_| {
            Error::Format(format!("part {} is not valid UTF-8", kind.member_path()))
        })?;
        if !markup.trim_start().starts_with('<') {
            return Err(Error::Format(format!(
                "part {} does not contain XML markup",
                kind.member_path()
            )));
        }

        Ok(Some(Part::new(kind, markup)))
    }
}

#[async_trait]
impl Container for FsContainer {
    async fn load_file(&self, path: &Path) -> Result<Document> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        if !metadata.is_dir() {
            return Err(Error::Format(format!(
                "{} is not an extracted package directory",
                path.display()
            )));
        }

        let mut document = Document::new(path);
        for kind in PartKind::ALL {
            if let Some(part) = Self::load_part(&document, kind).await? {
                document.insert_part(part);
            }
            tokio::task::yield_now().await;
        }

        debug!(path = %path.display(), parts = document.parts().count(), "Loaded document parts");
        Ok(document)
    }

    async fn save_file(&self, document: &Document) -> Result<()> {
        for part in document.parts() {
            let path: PathBuf = document.part_path(part.kind);
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(parent, e))?;
            }
            tokio::fs::write(&path, part.markup.as_bytes())
                .await
                .map_err(|e| Error::io(&path, e))?;
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

fn media_type(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
