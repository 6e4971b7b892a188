//! Typed nodes built from raw records through the composed schemas.

use crate::outcome;
use crate::resolver::{json_i64, RawRef, ResolveError, Resolved, Resolver};
use crate::schema::{Constructor, NodeKind, DEEP_FIELD};
use crate::store::{Record, RecordKey, IDENTITY_FIELDS, KIND_FIELD};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors from node construction.
///
/// All of these mean the data no longer matches the modelled layouts and
/// abort the build of the node that raised them.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("{kind} does not fit {record}: missing {missing:?} (expected {expected:?}, found {actual:?})")]
    MissingFields {
        kind: NodeKind,
        record: String,
        expected: Vec<&'static str>,
        actual: Vec<String>,
        missing: Vec<&'static str>,
    },

    #[error("{kind}.{field} on {record}: {constructor} needs an object, found {found}")]
    Malformed {
        kind: NodeKind,
        record: String,
        field: &'static str,
        constructor: Constructor,
        found: &'static str,
    },

    #[error("unknown outcome kind {tag:?} on {record}")]
    UnknownOutcome { tag: Option<String>, record: String },

    #[error("{kind}.{field} on {record}: expected exactly one {asset_type} asset for {reference}, found {found}")]
    AssetLookup {
        kind: NodeKind,
        record: String,
        field: &'static str,
        asset_type: &'static str,
        reference: String,
        found: usize,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// The raw mapping a node wraps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Source<'a> {
    /// A record from the store.
    Record(&'a Record),
    /// An object embedded in another record's fields.
    Inline(&'a Map<String, Value>),
}

impl<'a> Source<'a> {
    pub fn fields(&self) -> &'a Map<String, Value> {
        match self {
            Source::Record(record) => record.fields(),
            Source::Inline(map) => *map,
        }
    }

    pub fn get(&self, field: &str) -> Option<&'a Value> {
        self.fields().get(field)
    }

    pub fn key(&self) -> Option<&'a RecordKey> {
        match self {
            Source::Record(record) => Some(record.key()),
            Source::Inline(_) => None,
        }
    }

    /// The `_kind` tag, if the source carries one.
    pub fn tag(&self) -> Option<&'a str> {
        self.get(KIND_FIELD).and_then(Value::as_str)
    }

    /// Whether `field` must be present for a schema to accept this source.
    ///
    /// Inline objects never went through the loader, so they lack the
    /// identity fields even when their kind declares them.
    fn requires(&self, field: &str) -> bool {
        match self {
            Source::Record(_) => true,
            Source::Inline(_) => !IDENTITY_FIELDS.contains(&field),
        }
    }

    /// Identification for diagnostics.
    pub fn label(&self) -> String {
        match self {
            Source::Record(record) => record.label(),
            Source::Inline(_) => match self.tag() {
                Some(tag) => format!("inline {tag}"),
                None => "inline object".to_string(),
            },
        }
    }
}

/// One wrapped field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<'a> {
    /// An explicit null reference.
    Null,
    /// The deep field on a shallow node.
    Omitted,
    /// A plain value, borrowed from the record.
    Value(&'a Value),
    /// A simple field that referenced another record.
    Record(&'a Record),
    /// A reference whose target is missing, with the unresolved marker set.
    Unresolved(Value),
    /// Path of an exported asset file.
    Asset(String),
    /// A record that is already being built further up the path.
    Recursive(RecordKey),
    Node(Box<TypedNode<'a>>),
    List(Vec<Field<'a>>),
}

static NULL_FIELD: Field<'static> = Field::Null;

impl<'a> Field<'a> {
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Field::Value(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.as_value().and_then(Value::as_str)
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(json_i64)
    }

    /// Unity serializes booleans as 0/1 as often as true/false.
    pub fn as_bool(&self) -> bool {
        match self.as_value() {
            Some(Value::Bool(flag)) => *flag,
            Some(value) => json_i64(value).is_some_and(|n| n != 0),
            None => false,
        }
    }

    pub fn as_node(&self) -> Option<&TypedNode<'a>> {
        match self {
            Field::Node(node) => Some(&**node),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&'a Record> {
        match self {
            Field::Record(record) => Some(*record),
            _ => None,
        }
    }

    /// The field as a slice: a list's elements, or the field itself.
    pub fn items(&self) -> &[Field<'a>] {
        match self {
            Field::List(items) => items.as_slice(),
            other => std::slice::from_ref(other),
        }
    }

    /// Every node in the field, skipping anything that is not a node.
    pub fn nodes(&self) -> impl Iterator<Item = &TypedNode<'a>> {
        self.items().iter().filter_map(Field::as_node)
    }

    /// Whether the field points at a deleted record.
    pub fn is_missing(&self) -> bool {
        matches!(self, Field::Null | Field::Unresolved(_))
    }
}

/// A record (or inline object) projected through its kind's schema.
///
/// Fields are assigned once during construction. Typed fields come first in
/// declared order, then simple fields, then anything the schema does not
/// claim, under `unused`.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedNode<'a> {
    kind: NodeKind,
    source: Source<'a>,
    fields: Vec<(&'static str, Field<'a>)>,
    unused: Vec<(String, Field<'a>)>,
}

impl<'a> TypedNode<'a> {
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn source(&self) -> Source<'a> {
        self.source
    }

    pub fn key(&self) -> Option<&'a RecordKey> {
        self.source.key()
    }

    pub fn label(&self) -> String {
        self.source.label()
    }

    pub fn field(&self, name: &str) -> Option<&Field<'a>> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, value)| value)
    }

    /// The named field, or [`Field::Null`] when the node has no such field.
    pub fn get(&self, name: &str) -> &Field<'a> {
        self.field(name).unwrap_or(&NULL_FIELD)
    }

    pub fn str_field(&self, name: &str) -> Option<&'a str> {
        self.get(name).as_str()
    }

    /// Display name, falling back to the Unity object name.
    pub fn title(&self) -> Option<&'a str> {
        self.str_field("_displayName")
            .filter(|name| !name.is_empty())
            .or_else(|| self.str_field("m_Name"))
    }

    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &Field<'a>)> {
        self.fields.iter().map(|(name, field)| (*name, field))
    }

    pub fn unused(&self) -> impl Iterator<Item = (&str, &Field<'a>)> {
        self.unused.iter().map(|(name, field)| (name.as_str(), field))
    }
}

/// Builds typed nodes, resolving references through a [`Resolver`].
///
/// The builder tracks the records on the current construction path. A
/// reference back to one of them becomes [`Field::Recursive`].
#[derive(Debug)]
pub struct NodeBuilder<'a> {
    resolver: Resolver<'a>,
    path: Vec<RecordKey>,
}

impl<'a> NodeBuilder<'a> {
    pub fn new(resolver: Resolver<'a>) -> Self {
        Self {
            resolver,
            path: Vec::new(),
        }
    }

    pub fn resolver(&self) -> Resolver<'a> {
        self.resolver
    }

    /// Build `record` as `kind`. Only `deep` roots expand their verbs.
    pub fn build_record(
        &mut self,
        kind: NodeKind,
        record: &'a Record,
        deep: bool,
    ) -> Result<TypedNode<'a>, SchemaError> {
        self.build(kind, Source::Record(record), deep)
    }

    /// Build an outcome, choosing the kind from the source's tag.
    pub fn build_outcome(&mut self, source: Source<'a>) -> Result<TypedNode<'a>, SchemaError> {
        let kind = outcome::dispatch(&source)?;
        self.build(NodeKind::Outcome(kind), source, false)
    }

    pub fn build(
        &mut self,
        kind: NodeKind,
        source: Source<'a>,
        deep: bool,
    ) -> Result<TypedNode<'a>, SchemaError> {
        let schema = kind.schema();
        let raw = source.fields();

        let missing: Vec<&'static str> = schema
            .declared()
            .filter(|name| source.requires(name) && !raw.contains_key(*name))
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingFields {
                kind,
                record: source.label(),
                expected: schema.declared().collect(),
                actual: raw.keys().cloned().collect(),
                missing,
            });
        }

        let key = source.key();
        if let Some(key) = key {
            self.path.push(key.clone());
        }
        let built = self.build_fields(kind, source, deep);
        if key.is_some() {
            self.path.pop();
        }
        built
    }

    fn build_fields(
        &mut self,
        kind: NodeKind,
        source: Source<'a>,
        deep: bool,
    ) -> Result<TypedNode<'a>, SchemaError> {
        let schema = kind.schema();
        let raw = source.fields();
        let mut fields = Vec::with_capacity(schema.typed.len() + schema.simple.len());

        for &(name, constructor) in &schema.typed {
            let Some(value) = raw.get(name) else {
                continue;
            };
            if name == DEEP_FIELD && !deep {
                fields.push((name, Field::Omitted));
                continue;
            }
            let field = match value {
                Value::Array(items) => {
                    let mut built = Vec::with_capacity(items.len());
                    for item in items {
                        if is_falsy(item) {
                            built.push(Field::Value(item));
                        } else {
                            built.push(self.construct(kind, source, name, constructor, item)?);
                        }
                    }
                    Field::List(built)
                }
                _ => self.construct(kind, source, name, constructor, value)?,
            };
            fields.push((name, field));
        }

        for &name in &schema.simple {
            if let Some(value) = raw.get(name) {
                fields.push((name, self.resolve_simple(value)?));
            }
        }

        let mut unused = Vec::new();
        for (name, value) in raw {
            if !schema.claims(name) {
                unused.push((name.clone(), self.resolve_simple(value)?));
            }
        }

        Ok(TypedNode {
            kind,
            source,
            fields,
            unused,
        })
    }

    fn construct(
        &mut self,
        kind: NodeKind,
        parent: Source<'a>,
        field: &'static str,
        constructor: Constructor,
        value: &'a Value,
    ) -> Result<Field<'a>, SchemaError> {
        let child_kind = match constructor {
            Constructor::Asset(asset_type) => {
                return self.locate_asset(kind, parent, field, asset_type, value)
            }
            Constructor::Node(child_kind) => Some(child_kind),
            Constructor::Outcome => None,
        };

        let target = match self.resolver.resolve(value)? {
            Resolved::Null | Resolved::Plain(Value::Null) => return Ok(Field::Null),
            Resolved::Unresolved(marked) => return Ok(Field::Unresolved(marked)),
            Resolved::Record(record) => {
                if self.path.contains(record.key()) {
                    tracing::trace!(record = %record.label(), "recursive reference");
                    return Ok(Field::Recursive(record.key().clone()));
                }
                Source::Record(record)
            }
            Resolved::Plain(Value::Object(map)) => Source::Inline(map),
            Resolved::Plain(other) => {
                return Err(SchemaError::Malformed {
                    kind,
                    record: parent.label(),
                    field,
                    constructor,
                    found: value_type(other),
                })
            }
        };

        let node = match child_kind {
            Some(child_kind) => self.build(child_kind, target, false)?,
            None => self.build_outcome(target)?,
        };
        Ok(Field::Node(Box::new(node)))
    }

    fn locate_asset(
        &self,
        kind: NodeKind,
        parent: Source<'a>,
        field: &'static str,
        asset_type: &'static str,
        value: &'a Value,
    ) -> Result<Field<'a>, SchemaError> {
        let Some(reference) = RawRef::parse(value) else {
            if value.is_null() {
                return Ok(Field::Null);
            }
            return Err(SchemaError::Malformed {
                kind,
                record: parent.label(),
                field,
                constructor: Constructor::Asset(asset_type),
                found: value_type(value),
            });
        };
        if reference.is_null() {
            return Ok(Field::Null);
        }

        let matches: Vec<_> = match reference.key() {
            Some(ref key) => self
                .resolver
                .store()
                .assets(key)
                .iter()
                .filter(|entry| entry.asset_type == asset_type)
                .collect(),
            None => Vec::new(),
        };
        match matches.as_slice() {
            [entry] => Ok(Field::Asset(entry.path.clone())),
            _ => Err(SchemaError::AssetLookup {
                kind,
                record: parent.label(),
                field,
                asset_type,
                reference: match reference.key() {
                    Some(key) => key.to_string(),
                    None => format!("?/{}", reference.path_id),
                },
                found: matches.len(),
            }),
        }
    }

    fn resolve_simple(&self, value: &'a Value) -> Result<Field<'a>, SchemaError> {
        Ok(match self.resolver.resolve(value)? {
            Resolved::Plain(value) => Field::Value(value),
            Resolved::Null => Field::Null,
            Resolved::Record(record) => Field::Record(record),
            Resolved::Unresolved(marked) => Field::Unresolved(marked),
        })
    }
}

/// Values that list construction passes through untouched.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::OutcomeKind;
    use crate::resolver::{is_unresolved, ResolverConfig};
    use crate::testing::{fixture, null_reference, reference, StoreBuilder};
    use crate::ArchiveStore;
    use serde_json::json;

    const ARCHIVE: &str = "sharedassets0";

    fn build_root(
        store: &ArchiveStore,
        kind: NodeKind,
        id: i64,
        deep: bool,
    ) -> Result<TypedNode<'_>, SchemaError> {
        let mut builder = NodeBuilder::new(Resolver::lenient(store));
        let record = store
            .get(&RecordKey::new(ARCHIVE, id))
            .expect("fixture record");
        builder.build_record(kind, record, deep)
    }

    #[test]
    fn test_missing_field_is_named() {
        let mut fields = fixture(NodeKind::Counter, json!({}));
        if let Some(map) = fields.as_object_mut() {
            map.remove("_maxValue");
        }
        let store = StoreBuilder::new(ARCHIVE).record("Counter", 1, fields).build();

        match build_root(&store, NodeKind::Counter, 1, false) {
            Err(SchemaError::MissingFields { kind, missing, record, .. }) => {
                assert_eq!(kind, NodeKind::Counter);
                assert_eq!(missing, vec!["_maxValue"]);
                assert_eq!(record, "sharedassets0/Counter #1");
            }
            other => panic!("expected missing fields, got {other:?}"),
        }
    }

    #[test]
    fn test_verbs_omitted_unless_deep() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(NodeKind::Item, 1, json!({"_verbs": [reference(ARCHIVE, 2)]}))
            .node(NodeKind::Verb, 2, json!({"_name": "Use"}))
            .build();

        let shallow = build_root(&store, NodeKind::Item, 1, false).unwrap();
        assert_eq!(shallow.get(DEEP_FIELD), &Field::Omitted);

        let deep = build_root(&store, NodeKind::Item, 1, true).unwrap();
        let verbs: Vec<_> = deep.get(DEEP_FIELD).nodes().collect();
        assert_eq!(verbs.len(), 1);
        assert_eq!(verbs[0].kind(), NodeKind::Verb);
        assert_eq!(verbs[0].str_field("_name"), Some("Use"));
    }

    #[test]
    fn test_list_elements() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(
                NodeKind::Conversation,
                1,
                json!({"Lines": [
                    null,
                    {},
                    reference(ARCHIVE, 404),
                    null_reference(),
                    fixture(NodeKind::ConvoLine, json!({"LineText": "Hi."})),
                ]}),
            )
            .build();

        let convo = build_root(&store, NodeKind::Conversation, 1, false).unwrap();
        let lines = convo.get("Lines").items();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], Field::Value(&Value::Null));
        assert!(matches!(lines[1], Field::Value(_)));
        assert!(matches!(&lines[2], Field::Unresolved(marked) if is_unresolved(marked)));
        assert_eq!(lines[3], Field::Null);
        let line = lines[4].as_node().unwrap();
        assert_eq!(line.kind(), NodeKind::ConvoLine);
        assert_eq!(line.str_field("LineText"), Some("Hi."));
    }

    #[test]
    fn test_scalar_null_and_unresolved() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(
                NodeKind::StateEnter,
                1,
                json!({"_outcome": null_reference()}),
            )
            .node(
                NodeKind::StateEnter,
                2,
                json!({"_outcome": reference(ARCHIVE, 999)}),
            )
            .build();

        let null = build_root(&store, NodeKind::StateEnter, 1, false).unwrap();
        assert_eq!(null.get("_outcome"), &Field::Null);

        let dangling = build_root(&store, NodeKind::StateEnter, 2, false).unwrap();
        assert!(dangling.get("_outcome").is_missing());
    }

    #[test]
    fn test_simple_fields_resolve_records() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(NodeKind::Hero, 5, json!({"m_Name": "Joey"}))
            .node(
                NodeKind::TriggerVolume,
                1,
                json!({"_conditions": fixture(NodeKind::Condition, json!({"MustBeHero": reference(ARCHIVE, 5)}))}),
            )
            .build();

        let volume = build_root(&store, NodeKind::TriggerVolume, 1, false).unwrap();
        let condition = volume.get("_conditions").as_node().unwrap();
        let hero = condition.get("MustBeHero").as_record().unwrap();
        assert_eq!(hero.get("m_Name"), Some(&json!("Joey")));
    }

    #[test]
    fn test_unclaimed_fields_are_kept() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(NodeKind::Counter, 1, json!({"_legacyFlag": 3}))
            .build();

        let counter = build_root(&store, NodeKind::Counter, 1, false).unwrap();
        let unused: Vec<_> = counter.unused().map(|(name, _)| name).collect();
        assert_eq!(unused, vec!["_legacyFlag"]);
        assert!(counter.field("_legacyFlag").is_none());
    }

    #[test]
    fn test_outcome_cycle_becomes_recursive() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(
                NodeKind::Outcome(OutcomeKind::Wrapper),
                1,
                json!({"ActionsList": reference(ARCHIVE, 2)}),
            )
            .node(
                NodeKind::Outcome(OutcomeKind::Wrapper),
                2,
                json!({"ActionsList": reference(ARCHIVE, 1)}),
            )
            .build();

        let wrapper = build_root(&store, NodeKind::Outcome(OutcomeKind::Wrapper), 1, false).unwrap();
        let inner = wrapper.get("ActionsList").as_node().unwrap();
        assert_eq!(inner.key(), Some(&RecordKey::new(ARCHIVE, 2)));
        assert_eq!(
            inner.get("ActionsList"),
            &Field::Recursive(RecordKey::new(ARCHIVE, 1))
        );
    }

    #[test]
    fn test_malformed_typed_field() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(NodeKind::StateEnter, 1, json!({"_outcome": 17}))
            .build();

        match build_root(&store, NodeKind::StateEnter, 1, false) {
            Err(SchemaError::Malformed { field, found, .. }) => {
                assert_eq!(field, "_outcome");
                assert_eq!(found, "a number");
            }
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_asset_lookup() {
        let store = StoreBuilder::new(ARCHIVE)
            .asset(77, "Sprite", "PogoHammer #77.png")
            .asset(77, "Texture2D", "PogoHammer #77.png")
            .node(NodeKind::Item, 1, json!({"_icon": reference(ARCHIVE, 77)}))
            .node(NodeKind::Item, 2, json!({"_icon": reference(ARCHIVE, 78)}))
            .build();

        let item = build_root(&store, NodeKind::Item, 1, false).unwrap();
        assert_eq!(
            item.get("_icon"),
            &Field::Asset("sharedassets0/Sprite/PogoHammer #77.png".to_string())
        );

        assert!(matches!(
            build_root(&store, NodeKind::Item, 2, false),
            Err(SchemaError::AssetLookup { found: 0, .. })
        ));
    }

    #[test]
    fn test_strict_miss_aborts_build() {
        let store = StoreBuilder::new(ARCHIVE)
            .node(
                NodeKind::StateEnter,
                1,
                json!({"_outcome": reference(ARCHIVE, 10186)}),
            )
            .build();
        let config = ResolverConfig::new().with_strict_id(RecordKey::new(ARCHIVE, 10186));
        let mut builder = NodeBuilder::new(Resolver::new(&store, &config));
        let record = store.get(&RecordKey::new(ARCHIVE, 1)).unwrap();

        assert!(matches!(
            builder.build_record(NodeKind::StateEnter, record, false),
            Err(SchemaError::Resolve(ResolveError::StrictMiss { .. }))
        ));
    }
}
