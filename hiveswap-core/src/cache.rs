//! On-disk caches for the loaded archives and the reference graph.
//!
//! Crawling tens of thousands of exported files is slow, so the loaded store
//! is snapshotted to a single JSON file. The reference graph is cached next to
//! it and tagged with a fingerprint of the store it was built from; a graph
//! whose fingerprint does not match the current store is never reused.

use crate::graph::ReferenceGraph;
use crate::store::ArchiveStore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Graph cache is stale: store fingerprint {expected:016x}, cached {found:016x}")]
    StaleGraph { expected: u64, found: u64 },
}

/// Current cache format version.
pub const CACHE_VERSION: u32 = 1;

/// A loaded store as written to the archive cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    /// Cache format version for compatibility checking.
    pub version: u32,

    /// Fingerprint of `store`, duplicated here for peek access.
    pub fingerprint: u64,

    pub store: ArchiveStore,
}

/// Version and fingerprint of a cache file, read without the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SnapshotHeader {
    pub version: u32,
    pub fingerprint: u64,
}

impl ArchiveSnapshot {
    pub fn new(store: ArchiveStore) -> Self {
        Self {
            version: CACHE_VERSION,
            fingerprint: fingerprint(&store),
            store,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let content = serde_json::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        Ok(saved)
    }
}

/// Read just the header of a cache file.
pub async fn peek(path: impl AsRef<Path>) -> Result<SnapshotHeader, CacheError> {
    let content = fs::read_to_string(path).await?;
    // Unknown fields (the payload) are ignored.
    let header: SnapshotHeader = serde_json::from_str(&content)?;
    check_version(header.version)?;
    Ok(header)
}

/// A reference graph tagged with the store it indexes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub version: u32,
    pub fingerprint: u64,
    pub graph: ReferenceGraph,
}

impl GraphSnapshot {
    pub fn new(fingerprint: u64, graph: ReferenceGraph) -> Self {
        Self {
            version: CACHE_VERSION,
            fingerprint,
            graph,
        }
    }

    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let content = serde_json::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load a graph, rejecting it unless it was built for `expected`.
    pub async fn load_matching(
        path: impl AsRef<Path>,
        expected: u64,
    ) -> Result<ReferenceGraph, CacheError> {
        let content = fs::read_to_string(path).await?;
        let saved: Self = serde_json::from_str(&content)?;
        check_version(saved.version)?;
        if saved.fingerprint != expected {
            return Err(CacheError::StaleGraph {
                expected,
                found: saved.fingerprint,
            });
        }
        Ok(saved.graph)
    }
}

fn check_version(found: u32) -> Result<(), CacheError> {
    if found != CACHE_VERSION {
        return Err(CacheError::VersionMismatch {
            expected: CACHE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Where the graph cache lives for a given archive cache path.
///
/// `archives.json` becomes `archives.graph.json`.
pub fn graph_cache_path(archive_cache: &Path) -> PathBuf {
    archive_cache.with_extension("graph.json")
}

/// Content hash over every record, independent of map iteration order.
///
/// Only stable for one build of the program; a mismatch just means the graph
/// is rebuilt.
pub fn fingerprint(store: &ArchiveStore) -> u64 {
    let mut hasher = DefaultHasher::new();
    for record in store.records_sorted() {
        record.key().hash(&mut hasher);
        record.kind().hash(&mut hasher);
        for (name, value) in record.fields() {
            name.hash(&mut hasher);
            hash_value(value, &mut hasher);
        }
    }
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, state: &mut H) {
    match value {
        Value::Null => 0u8.hash(state),
        Value::Bool(flag) => {
            1u8.hash(state);
            flag.hash(state);
        }
        Value::Number(number) => {
            2u8.hash(state);
            number.to_string().hash(state);
        }
        Value::String(text) => {
            3u8.hash(state);
            text.hash(state);
        }
        Value::Array(items) => {
            4u8.hash(state);
            items.len().hash(state);
            for item in items {
                hash_value(item, state);
            }
        }
        Value::Object(map) => {
            5u8.hash(state);
            map.len().hash(state);
            for (name, child) in map {
                name.hash(state);
                hash_value(child, state);
            }
        }
    }
}

/// The graph for `store`, from the cache when it matches, else rebuilt.
///
/// A rebuilt graph is written back to the cache; failing to write only logs.
pub async fn load_or_build_graph(path: impl AsRef<Path>, store: &ArchiveStore) -> ReferenceGraph {
    let path = path.as_ref();
    let expected = fingerprint(store);
    match GraphSnapshot::load_matching(path, expected).await {
        Ok(graph) => {
            tracing::info!(path = %path.display(), edges = graph.len(), "graph cache hit");
            return graph;
        }
        Err(CacheError::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no graph cache");
        }
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "graph cache unusable, rebuilding"
            );
        }
    }

    let graph = ReferenceGraph::build(store);
    let snapshot = GraphSnapshot::new(expected, graph);
    if let Err(err) = snapshot.save_json(path).await {
        tracing::warn!(path = %path.display(), error = %err, "failed to write graph cache");
    }
    snapshot.graph
}
