//! Document backends for odfgen.
//!
//! Provides the collaborators the pipeline loads and renders documents with:
//! - `FsContainer`: reads and writes the XML parts of an extracted package
//! - `PlaceholderEngine`: substitutes `${...}` placeholders from job data

pub mod container;
pub mod template;

pub use container::FsContainer;
pub use odfgen_core::document::{Container, Document, Part, PartKind, TemplateEngine};
pub use template::PlaceholderEngine;
