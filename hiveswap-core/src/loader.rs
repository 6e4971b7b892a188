//! Loading exported archives from disk.
//!
//! The export tool writes one folder per archive, one subfolder per asset
//! type, and one file per object:
//!
//! ```text
//! <game_root>/<archive>/<AssetType>/<Kind> #<path id>.json
//! <game_root>/<archive>/Sprite/<Name> #<path id>.png
//! ```
//!
//! JSON files become records; everything else is indexed as an asset file.
//! Reads run concurrently, bounded by [`LoaderConfig::concurrency`].

use crate::cache::{self, ArchiveSnapshot};
use crate::graph::ReferenceGraph;
use crate::store::{ArchiveStore, AssetEntry, Record, RecordKey};
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from loading archives.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },

    #[error("{} does not match '<Kind> #<id>.json'", path.display())]
    FileName { path: PathBuf },
}

/// Where and how to load archives from.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Folder holding one subfolder per archive.
    pub game_root: PathBuf,

    /// Archive cache file.
    pub cache_path: PathBuf,

    /// Read and write the caches.
    pub use_cache: bool,

    /// Maximum number of files read at once.
    pub concurrency: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            game_root: PathBuf::from("Act2-AssetStudio/ExportDev2"),
            cache_path: PathBuf::from("archives.json"),
            use_cache: true,
            concurrency: 20,
        }
    }
}

impl LoaderConfig {
    pub fn new(game_root: impl Into<PathBuf>) -> Self {
        Self {
            game_root: game_root.into(),
            ..Self::default()
        }
    }

    pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = path.into();
        self
    }

    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Graph cache file, next to the archive cache.
    pub fn graph_cache_path(&self) -> PathBuf {
        cache::graph_cache_path(&self.cache_path)
    }
}

/// Result of [`load_or_build`].
#[derive(Debug)]
pub struct Loaded {
    pub store: ArchiveStore,
    /// Whether the store came from the archive cache.
    pub from_cache: bool,
}

/// Split `"<Kind> #<id>.<ext>"` into kind and id.
pub fn parse_file_name(file_name: &str) -> Option<(&str, i64)> {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let (kind, id) = stem.rsplit_once(" #")?;
    let id = id.parse().ok()?;
    Some((kind, id))
}

/// Load the store from the cache, or crawl the game root and cache it.
///
/// Any cache failure (missing file, bad JSON, wrong version) falls back to a
/// full crawl. Failing to write the cache afterwards is only logged.
pub async fn load_or_build(config: &LoaderConfig) -> Result<Loaded, LoadError> {
    if config.use_cache {
        match ArchiveSnapshot::load_json(&config.cache_path).await {
            Ok(snapshot) => {
                tracing::info!(
                    path = %config.cache_path.display(),
                    records = snapshot.store.len(),
                    "loaded archive cache"
                );
                return Ok(Loaded {
                    store: snapshot.store,
                    from_cache: true,
                });
            }
            Err(err) => {
                tracing::warn!(
                    path = %config.cache_path.display(),
                    error = %err,
                    "archive cache load failed, rebuilding"
                );
            }
        }
    }

    let store = crawl(&config.game_root, config.concurrency).await?;
    if !config.use_cache {
        return Ok(Loaded {
            store,
            from_cache: false,
        });
    }

    let snapshot = ArchiveSnapshot::new(store);
    match snapshot.save_json(&config.cache_path).await {
        Ok(()) => tracing::info!(path = %config.cache_path.display(), "wrote archive cache"),
        Err(err) => tracing::warn!(
            path = %config.cache_path.display(),
            error = %err,
            "failed to write archive cache"
        ),
    }
    Ok(Loaded {
        store: snapshot.store,
        from_cache: false,
    })
}

/// The reference graph for `store`, cached when the config allows it.
pub async fn load_graph(config: &LoaderConfig, store: &ArchiveStore) -> ReferenceGraph {
    if config.use_cache {
        cache::load_or_build_graph(config.graph_cache_path(), store).await
    } else {
        ReferenceGraph::build(store)
    }
}

struct PendingRecord {
    path: PathBuf,
    key: RecordKey,
    kind: String,
}

/// Crawl every archive folder under `game_root`.
pub async fn crawl(game_root: &Path, concurrency: usize) -> Result<ArchiveStore, LoadError> {
    let mut store = ArchiveStore::new();
    let mut pending = Vec::new();

    for archive_dir in subdirectories(game_root).await? {
        let archive = match archive_dir.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };
        let files = list_files(&archive_dir).await?;
        tracing::debug!(archive = %archive, files = files.len(), "scanning archive");

        for path in files {
            let Ok(relative) = path.strip_prefix(&archive_dir) else {
                continue;
            };
            let components: Vec<String> = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy().into_owned())
                .collect();
            let Some(file_name) = components.last() else {
                continue;
            };
            let is_json = path.extension().is_some_and(|ext| ext == "json");

            let Some((kind, id)) = parse_file_name(file_name) else {
                if is_json {
                    return Err(LoadError::FileName { path });
                }
                tracing::debug!(path = %path.display(), "skipping unrecognized file");
                continue;
            };
            let key = RecordKey::new(archive.clone(), id);

            if is_json {
                pending.push(PendingRecord {
                    path,
                    key,
                    kind: kind.to_string(),
                });
            } else {
                let asset_type = if components.len() > 1 {
                    components[0].clone()
                } else {
                    String::new()
                };
                store.insert_asset(
                    key,
                    AssetEntry {
                        asset_type,
                        path: format!("{archive}/{}", components.join("/")),
                    },
                );
            }
        }
    }

    tracing::info!(
        files = pending.len(),
        assets = store.asset_count(),
        concurrency,
        "reading records"
    );
    let mut records: Vec<(usize, Record)> = stream::iter(pending.into_iter().enumerate())
        .map(|(index, pending)| async move {
            read_record(pending).await.map(|record| (index, record))
        })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await?;

    // Completion order is arbitrary; insert in crawl order so a duplicate key
    // always resolves the same way.
    records.sort_by_key(|(index, _)| *index);
    for (_, record) in records {
        let label = record.label();
        if let Some(previous) = store.insert(record) {
            tracing::warn!(record = %label, replaced = %previous.label(), "duplicate record key");
        }
    }
    tracing::info!(
        records = store.len(),
        archives = store.archive_names().len(),
        "loaded archives"
    );
    Ok(store)
}

async fn read_record(pending: PendingRecord) -> Result<Record, LoadError> {
    let content = fs::read_to_string(&pending.path)
        .await
        .map_err(|source| LoadError::Io {
            path: pending.path.clone(),
            source,
        })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| LoadError::Json {
        path: pending.path.clone(),
        source,
    })?;
    match value {
        Value::Object(fields) => Ok(Record::new(pending.key, pending.kind, fields)),
        _ => Err(LoadError::NotAnObject { path: pending.path }),
    }
}

/// Immediate subdirectories of `dir`, sorted.
async fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(io_error)?;
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        if entry.file_type().await.map_err(io_error)?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Every file below `dir`, sorted.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        let io_error = |source| LoadError::Io {
            path: current.clone(),
            source,
        };
        let mut entries = fs::read_dir(&current).await.map_err(io_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
            let file_type = entry.file_type().await.map_err(io_error)?;
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();
    Ok(files)
}
