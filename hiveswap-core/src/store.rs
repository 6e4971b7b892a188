//! Archive store: every loaded record, addressed by archive name and path id.
//!
//! The store is built once by the loader (or restored from the cache) and is
//! read-only afterwards. Everything downstream borrows records out of it, so
//! a resolved reference is the stored record itself, never a copy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Field injected at load time holding the record's archive name.
pub const ARCHIVE_FIELD: &str = "_archiveName";

/// Field injected at load time holding the record's path id.
pub const RECORD_ID_FIELD: &str = "_recordId";

/// Field injected at load time holding the kind tag taken from the filename.
pub const KIND_FIELD: &str = "_kind";

/// Every field the loader injects. Only stored records carry them.
pub const IDENTITY_FIELDS: [&str; 3] = [ARCHIVE_FIELD, RECORD_ID_FIELD, KIND_FIELD];

/// Identity of a record: the archive it was exported from plus its path id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Archive (asset bundle folder) name.
    pub archive: String,
    /// Unity path id within the archive.
    pub id: i64,
}

impl RecordKey {
    pub fn new(archive: impl Into<String>, id: i64) -> Self {
        Self {
            archive: archive.into(),
            id,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.archive, self.id)
    }
}

/// Error parsing a `archive/id` key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid record key {0:?}, expected <archive>/<id>")]
pub struct ParseKeyError(String);

impl FromStr for RecordKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (archive, id) = s
            .rsplit_once('/')
            .ok_or_else(|| ParseKeyError(s.to_string()))?;
        if archive.is_empty() {
            return Err(ParseKeyError(s.to_string()));
        }
        let id = id.parse().map_err(|_| ParseKeyError(s.to_string()))?;
        Ok(Self::new(archive, id))
    }
}

/// One raw JSON object from the dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    key: RecordKey,
    kind: String,
    fields: Map<String, Value>,
}

impl Record {
    /// Create a record, injecting the archive name, path id and kind tag
    /// into its fields.
    pub fn new(key: RecordKey, kind: impl Into<String>, mut fields: Map<String, Value>) -> Self {
        let kind = kind.into();
        fields.insert(ARCHIVE_FIELD.to_string(), Value::from(key.archive.clone()));
        fields.insert(RECORD_ID_FIELD.to_string(), Value::from(key.id));
        fields.insert(KIND_FIELD.to_string(), Value::from(kind.clone()));
        Self { key, kind, fields }
    }

    pub fn key(&self) -> &RecordKey {
        &self.key
    }

    /// Kind tag derived from the source filename.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Human-readable label, `archive/Kind #id`.
    pub fn label(&self) -> String {
        format!("{}/{} #{}", self.key.archive, self.kind, self.key.id)
    }
}

/// A non-JSON file exported next to the records (sprites, audio clips).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetEntry {
    /// Folder the file was exported under, e.g. `Sprite`.
    pub asset_type: String,
    /// Path relative to the game root, always `/`-separated.
    pub path: String,
}

/// Keyed collection of all loaded records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchiveStore {
    archives: HashMap<String, HashMap<i64, Record>>,
    #[serde(default)]
    assets: HashMap<String, HashMap<i64, Vec<AssetEntry>>>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning the record it replaced, if any.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.archives
            .entry(record.key.archive.clone())
            .or_default()
            .insert(record.key.id, record)
    }

    pub fn insert_asset(&mut self, key: RecordKey, entry: AssetEntry) {
        self.assets
            .entry(key.archive)
            .or_default()
            .entry(key.id)
            .or_default()
            .push(entry);
    }

    pub fn get(&self, key: &RecordKey) -> Option<&Record> {
        self.archives.get(&key.archive)?.get(&key.id)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.get(key).is_some()
    }

    /// Asset files exported under `key`, in insertion order.
    pub fn assets(&self, key: &RecordKey) -> &[AssetEntry] {
        self.assets
            .get(&key.archive)
            .and_then(|ids| ids.get(&key.id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over all records in no particular order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.archives.values().flat_map(|ids| ids.values())
    }

    /// All records sorted by key, for deterministic traversal.
    pub fn records_sorted(&self) -> Vec<&Record> {
        let mut records: Vec<_> = self.records().collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    /// Archive names, sorted.
    pub fn archive_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.archives.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.archives.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn asset_count(&self) -> usize {
        self.assets
            .values()
            .flat_map(|ids| ids.values())
            .map(Vec::len)
            .sum()
    }
}
