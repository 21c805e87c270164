//! Cooperative job engine for odfgen.
//!
//! Runs a batch of document-generation jobs as concurrent tasks on a
//! single-threaded runtime. Each job extracts its template, renders it,
//! re-archives it and then runs its export actions; finished jobs are
//! delivered to a [`CompletionSink`].

pub mod archive;
pub mod deleter;
pub mod driver;
pub mod pipeline;
pub mod processor;
pub mod resolver;
pub mod sink;

pub use archive::ArchiveStager;
pub use deleter::{
    DeletePolicy, DeleteProgress, DeleteStats, EntryKind, LocalFs, ProgressCallback,
    RecursiveDeleter, TreeFs,
};
pub use driver::{TaskDriver, cooperate, pause};
pub use pipeline::{JobPipeline, PipelineContext};
pub use processor::DocumentProcessor;
pub use resolver::{ResolverChain, ResolverRegistry};
pub use sink::CompletionSink;
