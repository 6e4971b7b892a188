//! Testing utilities.
//!
//! This module provides tools for building small record sets in tests:
//! - `StoreBuilder` for populating an `ArchiveStore` record by record
//! - `fixture` for schema-complete field maps of any node kind
//! - reference constructors mirroring Unity's pointer encoding

use crate::schema::NodeKind;
use crate::store::{ArchiveStore, AssetEntry, Record, RecordKey, IDENTITY_FIELDS};
use serde_json::{json, Map, Value};

/// Typed fields that hold lists in the game's data.
const LIST_FIELDS: &[&str] = &[
    "_verbs",
    "_abilityTargets",
    "_itemTargets",
    "_heroTargets",
    "_interactableTargets",
    "_activationConditions",
    "_counterTests",
    "Lines",
    "OrphanedLines",
    "nodes",
];

/// A reference to `archive/id`.
pub fn reference(archive: &str, id: i64) -> Value {
    json!({"m_FileID": 0, "m_FileName": archive, "m_PathID": id})
}

/// Unity's null pointer.
pub fn null_reference() -> Value {
    json!({"m_FileID": 0, "m_FileName": "", "m_PathID": 0})
}

/// A connection slot wired to the given nodes.
pub fn connections(targets: &[(&str, i64)]) -> Value {
    let connections: Vec<Value> = targets
        .iter()
        .map(|(archive, id)| json!({"node": reference(archive, *id), "fieldName": "input"}))
        .collect();
    json!({ "connections": connections })
}

/// A field map that satisfies `kind`'s schema, with `overrides` applied.
///
/// Typed fields default to null references (or empty lists), simple fields
/// to JSON null. Identity fields are left out; `Record::new` adds them.
pub fn fixture(kind: NodeKind, overrides: Value) -> Value {
    let schema = kind.schema();
    let mut fields = Map::new();

    for (name, _) in &schema.typed {
        let default = if LIST_FIELDS.contains(name) {
            json!([])
        } else {
            null_reference()
        };
        fields.insert(name.to_string(), default);
    }
    for name in &schema.simple {
        if IDENTITY_FIELDS.contains(name) {
            continue;
        }
        let default = match *name {
            "input" | "output" => connections(&[]),
            _ => Value::Null,
        };
        fields.insert(name.to_string(), default);
    }

    if let Value::Object(overrides) = overrides {
        fields.extend(overrides);
    }
    Value::Object(fields)
}

/// Builder for an [`ArchiveStore`] in tests.
pub struct StoreBuilder {
    archive: String,
    store: ArchiveStore,
}

impl StoreBuilder {
    /// Start a store; records go into `archive` until [`Self::in_archive`].
    pub fn new(archive: impl Into<String>) -> Self {
        Self {
            archive: archive.into(),
            store: ArchiveStore::new(),
        }
    }

    /// Switch the archive subsequent records are added to.
    pub fn in_archive(mut self, archive: impl Into<String>) -> Self {
        self.archive = archive.into();
        self
    }

    /// Add a record with raw fields.
    pub fn record(mut self, kind: &str, id: i64, fields: Value) -> Self {
        let fields = match fields {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.store
            .insert(Record::new(RecordKey::new(self.archive.clone(), id), kind, fields));
        self
    }

    /// Add a schema-complete record of `kind`.
    pub fn node(self, kind: NodeKind, id: i64, overrides: Value) -> Self {
        self.record(kind.name(), id, fixture(kind, overrides))
    }

    /// Register an exported asset file for `id`.
    pub fn asset(mut self, id: i64, asset_type: &str, file_name: &str) -> Self {
        let path = format!("{}/{}/{}", self.archive, asset_type, file_name);
        self.store.insert_asset(
            RecordKey::new(self.archive.clone(), id),
            AssetEntry {
                asset_type: asset_type.to_string(),
                path,
            },
        );
        self
    }

    pub fn build(self) -> ArchiveStore {
        self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_is_schema_complete() {
        for kind in NodeKind::all() {
            let fields = fixture(kind, json!({}));
            let map = fields.as_object().unwrap();
            let record = Record::new(RecordKey::new("a", 1), kind.name(), map.clone());
            for name in kind.schema().declared() {
                assert!(record.has_field(name), "{kind} fixture lacks {name}");
            }
        }
    }

    #[test]
    fn test_store_builder() {
        let store = StoreBuilder::new("a")
            .node(NodeKind::Hero, 1, json!({"m_Name": "Joey"}))
            .in_archive("b")
            .record("Verb", 1, json!({"_name": "Use"}))
            .asset(3, "Sprite", "icon #3.png")
            .build();

        assert_eq!(store.len(), 2);
        let hero = store.get(&RecordKey::new("a", 1)).unwrap();
        assert_eq!(hero.kind(), "Hero");
        assert_eq!(hero.get("m_Name"), Some(&json!("Joey")));
        assert_eq!(store.assets(&RecordKey::new("b", 3))[0].path, "b/Sprite/icon #3.png");
    }

    #[test]
    fn test_connections() {
        let slot = connections(&[("a", 4)]);
        assert_eq!(slot["connections"][0]["node"]["m_PathID"], json!(4));
    }
}
