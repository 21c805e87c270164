//! KDL configuration parsing for odfgen.
//!
//! This crate handles parsing of:
//! - Batch files (jobs and their data, parameters and actions)
//! - Resolver declarations
//! - Engine settings

pub mod batch;
pub mod error;
pub mod settings;

pub use batch::{BatchConfig, ResolverConfig, ResolverKind, load_batch, parse_batch};
pub use error::{ConfigError, ConfigResult};
pub use settings::EngineSettings;
