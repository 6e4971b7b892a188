//! Reference graph index.
//!
//! Built by scanning raw record fields, independently of typed nodes. Every
//! reference-shaped value becomes an edge tagged with the dotted field path
//! it was found at (list positions add no segment), so an inspector can say
//! "referenced by X as Y" for any record.

use crate::resolver::RawRef;
use crate::store::{ArchiveStore, RecordKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One reference from a field of `source` to `target`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: RecordKey,
    pub target: RecordKey,
    pub path: String,
}

/// Serialized form: the edges alone. The adjacency maps are rebuilt on load.
#[derive(Serialize, Deserialize)]
struct GraphEdges {
    edges: Vec<Edge>,
}

/// Inbound and outbound adjacency over all records.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "GraphEdges", into = "GraphEdges")]
pub struct ReferenceGraph {
    edges: Vec<Edge>,
    inbound: HashMap<RecordKey, Vec<usize>>,
    outbound: HashMap<RecordKey, Vec<usize>>,
}

impl From<GraphEdges> for ReferenceGraph {
    fn from(serialized: GraphEdges) -> Self {
        Self::from_edges(serialized.edges)
    }
}

impl From<ReferenceGraph> for GraphEdges {
    fn from(graph: ReferenceGraph) -> Self {
        Self { edges: graph.edges }
    }
}

impl ReferenceGraph {
    /// Scan every record in the store.
    pub fn build(store: &ArchiveStore) -> Self {
        let mut edges = Vec::new();
        for record in store.records_sorted() {
            for (name, value) in record.fields() {
                collect(record.key(), name, value, &mut edges);
            }
        }
        tracing::debug!(records = store.len(), edges = edges.len(), "built reference graph");
        Self::from_edges(edges)
    }

    pub fn from_edges(edges: Vec<Edge>) -> Self {
        let mut inbound: HashMap<RecordKey, Vec<usize>> = HashMap::new();
        let mut outbound: HashMap<RecordKey, Vec<usize>> = HashMap::new();
        for (index, edge) in edges.iter().enumerate() {
            inbound.entry(edge.target.clone()).or_default().push(index);
            outbound.entry(edge.source.clone()).or_default().push(index);
        }
        Self {
            edges,
            inbound,
            outbound,
        }
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// `(source, field path)` for every reference pointing at `key`.
    pub fn references_to(&self, key: &RecordKey) -> Vec<(RecordKey, String)> {
        self.lookup(&self.inbound, key)
            .map(|edge| (edge.source.clone(), edge.path.clone()))
            .collect()
    }

    /// `(target, field path)` for every reference `key` holds.
    pub fn references_from(&self, key: &RecordKey) -> Vec<(RecordKey, String)> {
        self.lookup(&self.outbound, key)
            .map(|edge| (edge.target.clone(), edge.path.clone()))
            .collect()
    }

    fn lookup<'g>(
        &'g self,
        map: &'g HashMap<RecordKey, Vec<usize>>,
        key: &RecordKey,
    ) -> impl Iterator<Item = &'g Edge> + 'g {
        map.get(key)
            .into_iter()
            .flatten()
            .map(|&index| &self.edges[index])
    }

    /// Records referencing `key`, each once, with every field path they
    /// use. Records appear in the order their first reference was found.
    pub fn referrers(&self, key: &RecordKey) -> Vec<(RecordKey, Vec<String>)> {
        group(self.references_to(key))
    }

    /// Records `key` references, grouped like [`Self::referrers`].
    pub fn referents(&self, key: &RecordKey) -> Vec<(RecordKey, Vec<String>)> {
        group(self.references_from(key))
    }

    /// A short, stable label for a record, even a missing one.
    pub fn record_label(store: &ArchiveStore, key: &RecordKey) -> String {
        match store.get(key) {
            Some(record) => record.label(),
            None => format!("Unknown! ({key})"),
        }
    }

    /// Inbound and outbound references of `key` as HTML lists.
    pub fn references_html(&self, store: &ArchiveStore, key: &RecordKey) -> String {
        let mut html = String::new();
        for (heading, references) in [
            ("Referenced by", self.referrers(key)),
            ("References", self.referents(key)),
        ] {
            html.push_str(&format!("<h2>{heading}</h2>\n<ul>\n"));
            for (other, paths) in references {
                let paths: Vec<String> = paths
                    .iter()
                    .map(|path| format!("<code>{}</code>", escape_html(path)))
                    .collect();
                html.push_str(&format!(
                    "<li><a href=\"/{}/{}\">{}</a> as {}</li>\n",
                    escape_html(&other.archive),
                    other.id,
                    escape_html(&Self::record_label(store, &other)),
                    paths.join(", "),
                ));
            }
            html.push_str("</ul>\n");
        }
        html
    }

    /// One-line markdown annotation listing inbound references.
    pub fn annotation(&self, store: &ArchiveStore, key: &RecordKey) -> Option<String> {
        let referrers = self.referrers(key);
        if referrers.is_empty() {
            return None;
        }
        let listed: Vec<String> = referrers
            .iter()
            .map(|(source, paths)| {
                format!("{} ({})", Self::record_label(store, source), paths.join(", "))
            })
            .collect();
        Some(format!("*Referenced by: {}*", listed.join(", ")))
    }
}

fn group(references: Vec<(RecordKey, String)>) -> Vec<(RecordKey, Vec<String>)> {
    let mut grouped: Vec<(RecordKey, Vec<String>)> = Vec::new();
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();
    for (other, path) in references {
        match positions.get(&other) {
            Some(&position) => grouped[position].1.push(path),
            None => {
                positions.insert(other.clone(), grouped.len());
                grouped.push((other, vec![path]));
            }
        }
    }
    grouped
}

fn collect(source: &RecordKey, path: &str, value: &Value, edges: &mut Vec<Edge>) {
    if let Some(reference) = RawRef::parse(value) {
        if !reference.is_null() {
            if let Some(target) = reference.key() {
                edges.push(Edge {
                    source: source.clone(),
                    target,
                    path: path.to_string(),
                });
            }
        }
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                collect(source, path, item, edges);
            }
        }
        Value::Object(map) => {
            for (name, child) in map {
                collect(source, &format!("{path}.{name}"), child, edges);
            }
        }
        _ => {}
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{connections, null_reference, reference, StoreBuilder};
    use serde_json::json;

    fn store() -> ArchiveStore {
        StoreBuilder::new("a")
            .record(
                "Verb",
                1,
                json!({
                    "_outcome": reference("a", 2),
                    "_itemTargets": [{"Item": reference("a", 3)}, {"Item": null_reference()}],
                    "_defaultTargetFail": null_reference(),
                }),
            )
            .record("Outcome", 2, json!({"Sequence": reference("b", 9)}))
            .record("Item", 3, json!({"_displayName": "<Pogo>"}))
            .in_archive("b")
            .record("OutcomeSequence", 9, json!({"output": connections(&[("a", 2)])}))
            .build()
    }

    #[test]
    fn test_paths_skip_list_indices() {
        let graph = ReferenceGraph::build(&store());
        let to_item = graph.references_to(&RecordKey::new("a", 3));
        assert_eq!(to_item, vec![(RecordKey::new("a", 1), "_itemTargets.Item".to_string())]);

        let to_outcome = graph.references_to(&RecordKey::new("a", 2));
        assert_eq!(
            to_outcome,
            vec![
                (RecordKey::new("a", 1), "_outcome".to_string()),
                (RecordKey::new("b", 9), "output.connections.node".to_string()),
            ]
        );
    }

    #[test]
    fn test_null_references_are_skipped() {
        let graph = ReferenceGraph::build(&store());
        let from_verb: Vec<_> = graph
            .references_from(&RecordKey::new("a", 1))
            .into_iter()
            .map(|(target, _)| target)
            .collect();
        assert_eq!(from_verb, vec![RecordKey::new("a", 2), RecordKey::new("a", 3)]);
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_labels_and_html() {
        let store = store();
        let graph = ReferenceGraph::build(&store);

        assert_eq!(
            ReferenceGraph::record_label(&store, &RecordKey::new("b", 9)),
            "b/OutcomeSequence #9"
        );
        assert_eq!(
            ReferenceGraph::record_label(&store, &RecordKey::new("z", 1)),
            "Unknown! (z/1)"
        );

        let html = graph.references_html(&store, &RecordKey::new("a", 1));
        assert!(html.contains("<h2>Referenced by</h2>\n<ul>\n</ul>"));
        assert!(html.contains("<a href=\"/a/3\">a/Item #3</a> as <code>_itemTargets.Item</code>"));

        let annotation = graph.annotation(&store, &RecordKey::new("a", 3)).unwrap();
        assert_eq!(annotation, "*Referenced by: a/Verb #1 (_itemTargets.Item)*");
        assert!(graph.annotation(&store, &RecordKey::new("a", 1)).is_none());
        assert_eq!(escape_html("<Pogo> & \"co\""), "&lt;Pogo&gt; &amp; &quot;co&quot;");
    }

    #[test]
    fn test_referrers_group_paths_per_record() {
        let store = StoreBuilder::new("a")
            .record(
                "Verb",
                1,
                json!({"_outcome": reference("a", 2), "_defaultTargetFail": reference("a", 2)}),
            )
            .record("Outcome", 2, json!({}))
            .record("Verb", 3, json!({"_outcome": reference("a", 2)}))
            .build();
        let graph = ReferenceGraph::build(&store);
        let target = RecordKey::new("a", 2);

        assert_eq!(graph.references_to(&target).len(), 3);
        assert_eq!(
            graph.referrers(&target),
            vec![
                (
                    RecordKey::new("a", 1),
                    vec!["_outcome".to_string(), "_defaultTargetFail".to_string()]
                ),
                (RecordKey::new("a", 3), vec!["_outcome".to_string()]),
            ]
        );
        assert_eq!(graph.referents(&RecordKey::new("a", 1)).len(), 1);

        let html = graph.references_html(&store, &target);
        assert_eq!(html.matches("href=\"/a/1\"").count(), 1);
        assert!(html.contains("as <code>_outcome</code>, <code>_defaultTargetFail</code>"));
        assert_eq!(
            graph.annotation(&store, &target).unwrap(),
            "*Referenced by: a/Verb #1 (_outcome, _defaultTargetFail), a/Verb #3 (_outcome)*"
        );
    }

    #[test]
    fn test_serialized_graph_rebuilds_maps() {
        let graph = ReferenceGraph::build(&store());
        let text = serde_json::to_string(&graph).unwrap();
        let restored: ReferenceGraph = serde_json::from_str(&text).unwrap();

        assert_eq!(restored, graph);
        assert_eq!(
            restored.references_to(&RecordKey::new("a", 3)),
            graph.references_to(&RecordKey::new("a", 3))
        );
    }
}
