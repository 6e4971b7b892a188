//! Projection of typed nodes into plain JSON.
//!
//! Projection only reshapes what construction already produced. It never
//! touches the store, so references that were not resolved at build time
//! stay as they are.

use crate::node::{Field, TypedNode};
use crate::store::RecordKey;
use serde_json::{Map, Value};

/// Key holding the node kind in a projected object.
pub const KIND_KEY: &str = "__kind";

/// Key holding unclaimed fields in a projected object.
pub const UNUSED_KEY: &str = "__unused";

/// Key marking a node that was cut off by a cycle.
pub const RECURSIVE_KEY: &str = "__recursive";

/// Placeholder for the deep field on shallow nodes.
pub const OMITTED: &str = "[OMITTED]";

/// Walks a node tree into nested [`Value`]s.
///
/// Records currently being projected are tracked; meeting one again yields a
/// `{"__recursive": "<archive>/<id>"}` marker instead of recursing.
#[derive(Debug, Default)]
pub struct DictProjector {
    active: Vec<RecordKey>,
}

impl DictProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Project a root node, starting from a clean guard.
    pub fn project_root(&mut self, node: &TypedNode<'_>) -> Value {
        self.active.clear();
        self.project_node(node)
    }

    pub fn project_node(&mut self, node: &TypedNode<'_>) -> Value {
        if let Some(key) = node.key() {
            if self.active.contains(key) {
                return recursive(key);
            }
            self.active.push(key.clone());
        }

        let mut object = Map::new();
        object.insert(KIND_KEY.to_string(), Value::from(node.kind().name()));
        for (name, field) in node.fields() {
            object.insert(name.to_string(), self.project_field(field));
        }
        let unused: Map<String, Value> = node
            .unused()
            .map(|(name, field)| (name.to_string(), self.project_field(field)))
            .collect();
        if !unused.is_empty() {
            object.insert(UNUSED_KEY.to_string(), Value::Object(unused));
        }

        if node.key().is_some() {
            self.active.pop();
        }
        Value::Object(object)
    }

    pub fn project_field(&mut self, field: &Field<'_>) -> Value {
        match field {
            Field::Null => Value::Null,
            Field::Omitted => Value::from(OMITTED),
            Field::Value(value) => (*value).clone(),
            Field::Record(record) => Value::Object(record.fields().clone()),
            Field::Unresolved(marked) => marked.clone(),
            Field::Asset(path) => Value::from(path.as_str()),
            Field::Recursive(key) => recursive(key),
            Field::Node(node) => self.project_node(node),
            Field::List(items) => {
                Value::Array(items.iter().map(|item| self.project_field(item)).collect())
            }
        }
    }
}

fn recursive(key: &RecordKey) -> Value {
    let mut object = Map::new();
    object.insert(RECURSIVE_KEY.to_string(), Value::from(key.to_string()));
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeBuilder;
    use crate::outcome::OutcomeKind;
    use crate::render::Renderable;
    use crate::resolver::{Resolver, UNRESOLVED_MARKER};
    use crate::schema::NodeKind;
    use crate::testing::{reference, StoreBuilder};
    use serde_json::json;

    const A: &str = "sharedassets0";

    #[test]
    fn test_projection_layout() {
        let store = StoreBuilder::new(A)
            .node(NodeKind::Hero, 5, json!({"m_Name": "Joey"}))
            .node(
                NodeKind::Item,
                1,
                json!({"_displayName": "Pogo Hammer", "ItemID": 12, "m_Script": reference(A, 5), "_extra": reference(A, 404)}),
            )
            .build();
        let mut builder = NodeBuilder::new(Resolver::lenient(&store));
        let record = store.get(&RecordKey::new(A, 1)).unwrap();
        let item = builder.build_record(NodeKind::Item, record, false).unwrap();

        let dict = item.to_dict();
        assert_eq!(dict[KIND_KEY], json!("Item"));
        assert_eq!(dict["_verbs"], json!(OMITTED));
        assert_eq!(dict["_icon"], Value::Null);
        assert_eq!(dict["ItemID"], json!(12));
        assert_eq!(dict["m_Script"]["m_Name"], json!("Joey"));
        assert_eq!(dict[UNUSED_KEY]["_extra"][UNRESOLVED_MARKER], json!(true));

        let keys: Vec<_> = dict.as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys.first().map(String::as_str), Some(KIND_KEY));
        assert_eq!(keys.last().map(String::as_str), Some(UNUSED_KEY));
    }

    #[test]
    fn test_deep_projection_is_plain_and_repeatable() {
        let store = StoreBuilder::new(A)
            .node(
                NodeKind::Item,
                1,
                json!({"_displayName": "Pogo Hammer", "_verbs": [reference(A, 2)]}),
            )
            .node(
                NodeKind::Verb,
                2,
                json!({"_name": "Use", "_outcome": reference(A, 3)}),
            )
            .node(
                NodeKind::Outcome(OutcomeKind::Wrapper),
                3,
                json!({"ActionsList": reference(A, 3)}),
            )
            .build();
        let mut builder = NodeBuilder::new(Resolver::lenient(&store));
        let record = store.get(&RecordKey::new(A, 1)).unwrap();
        let item = builder.build_record(NodeKind::Item, record, true).unwrap();

        let dict = item.to_dict();
        assert_eq!(dict, item.to_dict());

        let outcome = &dict["_verbs"][0]["_outcome"];
        assert_eq!(outcome[KIND_KEY], json!("Outcome"));
        assert_eq!(outcome["ActionsList"], json!({RECURSIVE_KEY: "sharedassets0/3"}));

        // The dict is plain JSON all the way down and survives a text round trip.
        let text = serde_json::to_string(&dict).unwrap();
        let reparsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, dict);
    }

    #[test]
    fn test_project_root_resets_guard() {
        let store = StoreBuilder::new(A)
            .node(NodeKind::Hero, 5, json!({"m_Name": "Joey"}))
            .build();
        let mut builder = NodeBuilder::new(Resolver::lenient(&store));
        let record = store.get(&RecordKey::new(A, 5)).unwrap();
        let hero = builder.build_record(NodeKind::Hero, record, false).unwrap();

        let mut projector = DictProjector::new();
        projector.active.push(RecordKey::new(A, 5));
        assert_eq!(projector.project_node(&hero), json!({RECURSIVE_KEY: "sharedassets0/5"}));
        assert_eq!(projector.project_root(&hero)["m_Name"], json!("Joey"));
    }
}
