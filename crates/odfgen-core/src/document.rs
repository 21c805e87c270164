//! Document part model and the container/template traits.
//!
//! A document is an extracted OpenDocument package: a directory holding XML
//! parts plus a `Pictures/` folder. Containers move parts between disk and
//! memory; template engines rewrite part markup in place.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::Result;

/// Folder inside the package that holds embedded images.
pub const PICTURES_DIR: &str = "Pictures";

/// XML parts a document package is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Content,
    Styles,
    Meta,
    Settings,
    Manifest,
}

impl PartKind {
    pub const ALL: [PartKind; 5] = [
        PartKind::Content,
        PartKind::Styles,
        PartKind::Meta,
        PartKind::Settings,
        PartKind::Manifest,
    ];

    /// Path of the part relative to the package root.
    pub fn member_path(&self) -> &'static str {
        match self {
            PartKind::Content => "content.xml",
            PartKind::Styles => "styles.xml",
            PartKind::Meta => "meta.xml",
            PartKind::Settings => "settings.xml",
            PartKind::Manifest => "META-INF/manifest.xml",
        }
    }

    /// Whether a package without this part is malformed.
    pub fn is_required(&self) -> bool {
        matches!(
            self,
            PartKind::Content | PartKind::Styles | PartKind::Manifest
        )
    }
}

/// A loaded XML part.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub kind: PartKind,
    pub markup: String,
}

impl Part {
    pub fn new(kind: PartKind, markup: impl Into<String>) -> Self {
        Self {
            kind,
            markup: markup.into(),
        }
    }
}

/// An extracted package and the parts loaded from it.
#[derive(Debug, Clone)]
pub struct Document {
    root: PathBuf,
    parts: BTreeMap<PartKind, Part>,
}

impl Document {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            parts: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn insert_part(&mut self, part: Part) {
        self.parts.insert(part.kind, part);
    }

    pub fn get_part(&self, kind: PartKind) -> Option<&Part> {
        self.parts.get(&kind)
    }

    pub fn get_part_mut(&mut self, kind: PartKind) -> Option<&mut Part> {
        self.parts.get_mut(&kind)
    }

    pub fn parts(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    pub fn part_path(&self, kind: PartKind) -> PathBuf {
        self.root.join(kind.member_path())
    }

    pub fn pictures_dir(&self) -> PathBuf {
        self.root.join(PICTURES_DIR)
    }
}

/// Loads and persists document parts.
#[async_trait]
pub trait Container: Send + Sync {
    /// Load every part found under the extracted package at `path`.
    async fn load_file(&self, path: &Path) -> Result<Document>;

    /// Write every loaded part back to the package directory.
    async fn save_file(&self, document: &Document) -> Result<()>;
}

/// Substitutes data into a document's content and styles.
#[async_trait]
pub trait TemplateEngine: Send + Sync {
    /// `working_dir` is the base for embedded-resource lookups.
    async fn render(
        &self,
        document: &mut Document,
        data: &serde_json::Value,
        working_dir: &Path,
    ) -> Result<()>;
}
