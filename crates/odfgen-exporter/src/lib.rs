//! Export actions for odfgen.
//!
//! Provides resolver implementations run after a document is produced:
//! - External conversion program (e.g. `soffice --convert-to pdf`)
//! - Plain copy into an output directory

pub mod command;
pub mod copy;
pub mod target;

pub use command::CommandExporter;
pub use copy::CopyExporter;
pub use odfgen_core::exporter::{ExportOutput, Exporter};
pub use target::ExportTarget;
