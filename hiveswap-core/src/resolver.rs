//! Reference resolution.
//!
//! Unity serializes a pointer to another object inline as
//! `{"m_FileID": .., "m_FileName": .., "m_PathID": ..}`. The resolver turns
//! such a value into the stored record it names, an explicit null, or a
//! marked copy of the reference when the target is missing from the dump.

use crate::store::{ArchiveStore, Record, RecordKey};
use once_cell::sync::Lazy;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

/// Marker added to a reference whose target could not be found.
pub const UNRESOLVED_MARKER: &str = "_KeyError";

const FILE_NAME: &str = "m_FileName";
const FILE_ID: &str = "m_FileID";
const PATH_ID: &str = "m_PathID";

/// Errors from reference resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("strict reference {key} is missing from the archive store")]
    StrictMiss { key: RecordKey },
}

/// A reference-shaped value, decoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RawRef {
    /// Archive name; `None` when the field is null or empty.
    pub archive: Option<String>,
    pub path_id: i64,
    pub file_id: i64,
}

impl RawRef {
    /// Decode `value` if it is shaped like a reference.
    pub fn parse(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if !obj.contains_key(FILE_NAME) || !obj.contains_key(PATH_ID) {
            return None;
        }
        let archive = obj
            .get(FILE_NAME)
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Some(Self {
            archive,
            path_id: obj.get(PATH_ID).and_then(json_i64).unwrap_or(0),
            file_id: obj.get(FILE_ID).and_then(json_i64).unwrap_or(0),
        })
    }

    /// Whether this is Unity's encoding of a null pointer.
    pub fn is_null(&self) -> bool {
        self.path_id == 0 && (self.file_id == 0 || self.archive.is_none())
    }

    /// Key of the record this reference names, if it names an archive.
    pub fn key(&self) -> Option<RecordKey> {
        self.archive
            .as_ref()
            .map(|archive| RecordKey::new(archive.clone(), self.path_id))
    }
}

/// Read an integer that may have been serialized as a number or a string.
pub fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Whether a value carries the unresolved marker.
pub fn is_unresolved(value: &Value) -> bool {
    value
        .get(UNRESOLVED_MARKER)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Copy `value` and attach the unresolved marker to the copy.
pub fn mark_unresolved(value: &Value) -> Value {
    let mut marked = value.clone();
    if let Some(obj) = marked.as_object_mut() {
        obj.insert(UNRESOLVED_MARKER.to_string(), Value::Bool(true));
    }
    marked
}

/// Outcome of resolving one value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    /// Not a reference; the value itself.
    Plain(&'a Value),
    /// Unity null pointer.
    Null,
    /// The record the reference names.
    Record(&'a Record),
    /// The target is missing; a marked copy of the reference.
    Unresolved(Value),
}

/// Resolver settings.
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Keys whose misses raise instead of degrading to a marked value.
    pub strict_ids: HashSet<RecordKey>,
}

impl ResolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail loudly when `key` cannot be found.
    pub fn with_strict_id(mut self, key: RecordKey) -> Self {
        self.strict_ids.insert(key);
        self
    }

    pub fn with_strict_ids(mut self, keys: impl IntoIterator<Item = RecordKey>) -> Self {
        self.strict_ids.extend(keys);
        self
    }
}

static LENIENT: Lazy<ResolverConfig> = Lazy::new(ResolverConfig::new);

/// Resolves references against an [`ArchiveStore`].
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    store: &'a ArchiveStore,
    config: &'a ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(store: &'a ArchiveStore, config: &'a ResolverConfig) -> Self {
        Self { store, config }
    }

    /// A resolver with no strict ids.
    pub fn lenient(store: &'a ArchiveStore) -> Self {
        Self::new(store, &LENIENT)
    }

    pub fn store(&self) -> &'a ArchiveStore {
        self.store
    }

    /// Resolve `value`.
    ///
    /// Misses never fail unless the missing key is configured as strict.
    pub fn resolve(&self, value: &'a Value) -> Result<Resolved<'a>, ResolveError> {
        let Some(reference) = RawRef::parse(value) else {
            return Ok(Resolved::Plain(value));
        };
        if reference.is_null() {
            return Ok(Resolved::Null);
        }
        if let Some(key) = reference.key() {
            if let Some(record) = self.store.get(&key) {
                return Ok(Resolved::Record(record));
            }
            if self.config.strict_ids.contains(&key) {
                return Err(ResolveError::StrictMiss { key });
            }
            tracing::trace!(%key, "unresolved reference");
        }
        Ok(Resolved::Unresolved(mark_unresolved(value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{null_reference, reference, StoreBuilder};
    use serde_json::json;

    fn store() -> ArchiveStore {
        StoreBuilder::new("sharedassets0")
            .record("Item", 42, json!({"_displayName": "Pogo Hammer"}))
            .build()
    }

    #[test]
    fn test_null_sentinel_resolves_to_null() {
        let store = store();
        let config = ResolverConfig::new();
        let resolver = Resolver::new(&store, &config);

        let null = null_reference();
        assert_eq!(resolver.resolve(&null).unwrap(), Resolved::Null);

        let no_file_id = json!({"m_FileName": "", "m_PathID": 0});
        assert_eq!(resolver.resolve(&no_file_id).unwrap(), Resolved::Null);
    }

    #[test]
    fn test_hit_returns_stored_record() {
        let store = store();
        let config = ResolverConfig::new();
        let resolver = Resolver::new(&store, &config);

        let value = reference("sharedassets0", 42);
        let stored = store.get(&RecordKey::new("sharedassets0", 42)).unwrap();
        match resolver.resolve(&value).unwrap() {
            Resolved::Record(record) => assert!(std::ptr::eq(record, stored)),
            other => panic!("expected record, got {other:?}"),
        }
    }

    #[test]
    fn test_miss_returns_marked_copy() {
        let store = store();
        let config = ResolverConfig::new();
        let resolver = Resolver::new(&store, &config);

        let value = reference("sharedassets0", 99);
        let Resolved::Unresolved(marked) = resolver.resolve(&value).unwrap() else {
            panic!("expected unresolved");
        };
        assert!(is_unresolved(&marked));
        assert!(!is_unresolved(&value));

        let mut expected = value.clone();
        expected[UNRESOLVED_MARKER] = json!(true);
        assert_eq!(marked, expected);
    }

    #[test]
    fn test_strict_id_raises_on_miss() {
        let store = store();
        let config = ResolverConfig::new().with_strict_id(RecordKey::new("sharedassets0", 10186));
        let resolver = Resolver::new(&store, &config);

        let strict = reference("sharedassets0", 10186);
        assert!(matches!(
            resolver.resolve(&strict),
            Err(ResolveError::StrictMiss { .. })
        ));

        // Strict ids only matter when the lookup misses.
        let present = reference("sharedassets0", 42);
        let config = ResolverConfig::new().with_strict_id(RecordKey::new("sharedassets0", 42));
        let resolver = Resolver::new(&store, &config);
        assert!(matches!(resolver.resolve(&present), Ok(Resolved::Record(_))));
    }

    #[test]
    fn test_plain_values_pass_through() {
        let store = store();
        let config = ResolverConfig::new();
        let resolver = Resolver::new(&store, &config);

        for value in [json!(3), json!("text"), json!([1, 2]), json!({"LineText": "hi"})] {
            match resolver.resolve(&value).unwrap() {
                Resolved::Plain(v) => assert!(std::ptr::eq(v, &value)),
                other => panic!("expected plain, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_raw_ref_parse() {
        let parsed = RawRef::parse(&json!({"m_FileID": 1, "m_FileName": "a", "m_PathID": "12"})).unwrap();
        assert_eq!(parsed.key(), Some(RecordKey::new("a", 12)));
        assert!(!parsed.is_null());

        let nameless = RawRef::parse(&json!({"m_FileName": null, "m_PathID": 5})).unwrap();
        assert_eq!(nameless.key(), None);
        assert!(!nameless.is_null());

        assert!(RawRef::parse(&json!({"m_PathID": 5})).is_none());
    }
}
