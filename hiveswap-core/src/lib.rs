//! Narrative extraction from Hiveswap MonoBehaviour dumps.
//!
//! This crate provides:
//! - Loading of exported archives into a keyed record store, with a JSON cache
//! - Reference resolution that survives dangling pointers
//! - Schema-driven typed nodes, including polymorphic outcome actions
//! - Two renderings of every node tree: plain JSON and Markdown transcripts
//! - A reverse reference index for "referenced by" queries
//!
//! # Quick Start
//!
//! ```ignore
//! use hiveswap_core::{loader, Category, ExportConfig, Exporter, LoaderConfig, ResolverConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hiveswap_core::Error> {
//!     let config = LoaderConfig::new("Act2-AssetStudio/ExportDev2");
//!     let loaded = loader::load_or_build(&config).await?;
//!     let graph = loader::load_graph(&config, &loaded.store).await;
//!
//!     let resolver = ResolverConfig::new();
//!     let exporter = Exporter::new(&loaded.store, &resolver).with_graph(&graph);
//!     exporter
//!         .export(&ExportConfig::new("out").with_categories([Category::Items]))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod export;
pub mod graph;
pub mod linearize;
pub mod loader;
pub mod node;
pub mod outcome;
pub mod project;
pub mod render;
pub mod resolver;
pub mod schema;
pub mod speaker;
pub mod store;
pub mod testing;
pub mod transcript;

use thiserror::Error;

// Primary public API
pub use cache::CacheError;
pub use export::{Category, ExportConfig, ExportError, ExportSummary, Exporter};
pub use graph::ReferenceGraph;
pub use loader::{LoadError, Loaded, LoaderConfig};
pub use node::{Field, NodeBuilder, SchemaError, Source, TypedNode};
pub use outcome::OutcomeKind;
pub use project::DictProjector;
pub use render::{Renderable, Transcript, TranscriptError};
pub use resolver::{Resolved, ResolveError, Resolver, ResolverConfig};
pub use schema::{DriftReport, NodeKind};
pub use store::{ArchiveStore, Record, RecordKey};

/// Any failure of a full extraction run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert() {
        let err: Error = ResolveError::StrictMiss {
            key: RecordKey::new("a", 1),
        }
        .into();
        assert!(matches!(err, Error::Resolve(_)));

        let err: Error = TranscriptError::Invariant {
            node: "a/Verb #1".to_string(),
            message: "bad".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Transcript error: "));
    }
}
