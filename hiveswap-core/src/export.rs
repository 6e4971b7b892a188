//! Per-category JSON and transcript documents.
//!
//! Each [`Category`] selects a set of root records, builds them deep, and
//! writes two files to the output directory:
//!
//! - `<Category>.json`: a pretty-printed array of every root's `to_dict()`
//! - `<Category>Transcript.md`: every root's `# <title>` heading, an optional
//!   "Referenced by" line, and its transcript body

use crate::graph::ReferenceGraph;
use crate::node::{NodeBuilder, SchemaError, TypedNode};
use crate::render::{Renderable, Transcript, TranscriptError};
use crate::resolver::{Resolver, ResolverConfig};
use crate::schema::{self, DriftReport, NodeKind};
use crate::store::{ArchiveStore, Record};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tokio::fs;

/// Errors from exporting documents.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

/// A family of root records exported together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Items,
    Abilities,
    Evidence,
    Interactables,
    Scenes,
    TriggerVolumes,
    StateEnterOutcomes,
    OutcomeCanvases,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::Items,
        Category::Abilities,
        Category::Evidence,
        Category::Interactables,
        Category::Scenes,
        Category::TriggerVolumes,
        Category::StateEnterOutcomes,
        Category::OutcomeCanvases,
    ];

    /// Name used for the output files.
    pub fn name(self) -> &'static str {
        match self {
            Category::Items => "Items",
            Category::Abilities => "Abilities",
            Category::Evidence => "Evidence",
            Category::Interactables => "Interactables",
            Category::Scenes => "Scenes",
            Category::TriggerVolumes => "TriggerVolumes",
            Category::StateEnterOutcomes => "StateEnterOutcomes",
            Category::OutcomeCanvases => "OutcomeCanvases",
        }
    }

    /// The node kind roots of this category are built as.
    pub fn kind(self) -> NodeKind {
        match self {
            Category::Items => NodeKind::Item,
            Category::Abilities => NodeKind::Ability,
            Category::Evidence => NodeKind::Evidence,
            Category::Interactables => NodeKind::Interactable,
            Category::Scenes => NodeKind::Scene,
            Category::TriggerVolumes => NodeKind::TriggerVolume,
            Category::StateEnterOutcomes => NodeKind::StateEnter,
            Category::OutcomeCanvases => NodeKind::OutcomeCanvas,
        }
    }

    /// The id field that marks a record as a root of this category.
    ///
    /// Categories without one are selected by the record's kind tag.
    fn id_field(self) -> Option<&'static str> {
        match self {
            Category::Items => Some("ItemID"),
            Category::Abilities => Some("AbilityID"),
            Category::Evidence => Some("EvidenceID"),
            Category::Interactables => Some("InteractableID"),
            Category::Scenes => Some("SceneID"),
            Category::TriggerVolumes => Some("TriggerVolumeID"),
            Category::StateEnterOutcomes | Category::OutcomeCanvases => None,
        }
    }

    pub fn selects(self, record: &Record) -> bool {
        match self.id_field() {
            Some(field) => record.has_field(field),
            None => record.kind() == self.kind().name(),
        }
    }

    /// Whether roots are ordered by title rather than by key.
    fn titled(self) -> bool {
        !matches!(
            self,
            Category::TriggerVolumes | Category::StateEnterOutcomes | Category::OutcomeCanvases
        )
    }

    pub fn json_file(self) -> String {
        format!("{}.json", self.name())
    }

    pub fn transcript_file(self) -> String {
        format!("{}Transcript.md", self.name())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error parsing a category name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown category {0:?}")]
pub struct ParseCategoryError(String);

impl FromStr for Category {
    type Err = ParseCategoryError;

    /// Accepts the file name (`TriggerVolumes`) or the kind name
    /// (`trigger-volume`), ignoring case, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = normalize(s);
        Category::ALL
            .into_iter()
            .find(|category| {
                normalize(category.name()) == wanted || normalize(category.kind().name()) == wanted
            })
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

fn normalize(name: &str) -> String {
    name.chars()
        .filter(|c| *c != '-' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Where and what to export.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub out_dir: PathBuf,
    pub categories: Vec<Category>,
    /// Add a "Referenced by" line under each root heading.
    pub references: bool,
}

impl ExportConfig {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            categories: Category::ALL.to_vec(),
            references: true,
        }
    }

    pub fn with_categories(mut self, categories: impl IntoIterator<Item = Category>) -> Self {
        self.categories = categories.into_iter().collect();
        self
    }

    pub fn with_references(mut self, references: bool) -> Self {
        self.references = references;
        self
    }
}

/// One category rendered in memory.
#[derive(Debug, Clone)]
pub struct RenderedCategory {
    pub category: Category,
    pub roots: usize,
    pub json: Value,
    pub transcript: Transcript,
}

/// What an export run wrote.
#[derive(Debug, Clone, Default)]
pub struct ExportSummary {
    pub categories: Vec<(Category, usize)>,
    pub files: Vec<PathBuf>,
}

/// Builds and renders root nodes over one store.
pub struct Exporter<'a> {
    store: &'a ArchiveStore,
    resolver: &'a ResolverConfig,
    graph: Option<&'a ReferenceGraph>,
}

impl<'a> Exporter<'a> {
    pub fn new(store: &'a ArchiveStore, resolver: &'a ResolverConfig) -> Self {
        Self {
            store,
            resolver,
            graph: None,
        }
    }

    /// Use `graph` for "Referenced by" annotations.
    pub fn with_graph(mut self, graph: &'a ReferenceGraph) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Every root of `category`, built deep and in output order.
    pub fn roots(&self, category: Category) -> Result<Vec<TypedNode<'a>>, SchemaError> {
        let mut builder = NodeBuilder::new(Resolver::new(self.store, self.resolver));
        let mut roots = Vec::new();
        for record in self.store.records_sorted() {
            if category.selects(record) {
                roots.push(builder.build_record(category.kind(), record, true)?);
            }
        }
        if category.titled() {
            // Stable, so equal titles keep key order.
            roots.sort_by_cached_key(root_title);
        }
        Ok(roots)
    }

    /// One root's section of a transcript document.
    pub fn render_root(
        &self,
        root: &TypedNode<'_>,
        references: bool,
    ) -> Result<Transcript, TranscriptError> {
        let mut out = Transcript::new();
        out.push(format!("# {}", root_title(root)));
        out.blank();
        if references {
            let annotation = self
                .graph
                .zip(root.key())
                .and_then(|(graph, key)| graph.annotation(self.store, key));
            if let Some(annotation) = annotation {
                out.push(annotation);
                out.blank();
            }
        }
        out.append(root.transcript_body()?);
        out.blank();
        Ok(out)
    }

    pub fn render(
        &self,
        category: Category,
        references: bool,
    ) -> Result<RenderedCategory, ExportError> {
        let roots = self.roots(category)?;
        let mut transcript = Transcript::new();
        for root in &roots {
            transcript.append(self.render_root(root, references)?);
        }
        Ok(RenderedCategory {
            category,
            roots: roots.len(),
            json: Value::Array(roots.iter().map(Renderable::to_dict).collect()),
            transcript,
        })
    }

    /// Render and write every configured category.
    pub async fn export(&self, config: &ExportConfig) -> Result<ExportSummary, ExportError> {
        fs::create_dir_all(&config.out_dir)
            .await
            .map_err(|source| ExportError::Io {
                path: config.out_dir.clone(),
                source,
            })?;

        let mut summary = ExportSummary::default();
        for &category in &config.categories {
            let rendered = self.render(category, config.references)?;

            let json_path = config.out_dir.join(category.json_file());
            write(&json_path, serde_json::to_string_pretty(&rendered.json)?).await?;
            let transcript_path = config.out_dir.join(category.transcript_file());
            write(&transcript_path, format!("{}\n", rendered.transcript)).await?;

            tracing::info!(category = %category, roots = rendered.roots, "exported category");
            summary.categories.push((category, rendered.roots));
            summary.files.push(json_path);
            summary.files.push(transcript_path);
        }
        Ok(summary)
    }

    /// Unclaimed fields across the roots of `categories`.
    pub fn drift(&self, categories: &[Category]) -> Result<DriftReport, SchemaError> {
        let mut roots = Vec::new();
        for &category in categories {
            roots.extend(self.roots(category)?);
        }
        Ok(schema::drift_report(&roots))
    }
}

/// Heading for a root: its title, or its label when it has none.
fn root_title(root: &TypedNode<'_>) -> String {
    match root.title() {
        Some(title) if !title.is_empty() => title.to_string(),
        _ => root.label(),
    }
}

async fn write(path: &Path, content: String) -> Result<(), ExportError> {
    fs::write(path, content)
        .await
        .map_err(|source| ExportError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordKey;
    use crate::testing::StoreBuilder;
    use serde_json::json;

    const A: &str = "sharedassets0";

    fn store() -> ArchiveStore {
        StoreBuilder::new(A)
            .node(NodeKind::Item, 3, json!({"_displayName": "Zither", "ItemID": 3}))
            .node(NodeKind::Item, 1, json!({"_displayName": "Pogo Hammer", "ItemID": 1}))
            .node(NodeKind::Item, 2, json!({"_displayName": "", "m_Name": "Apple", "ItemID": 2}))
            .node(NodeKind::StateEnter, 9, json!({"m_Name": "B"}))
            .node(NodeKind::StateEnter, 8, json!({"m_Name": "A"}))
            .build()
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("items".parse::<Category>(), Ok(Category::Items));
        assert_eq!("TriggerVolumes".parse::<Category>(), Ok(Category::TriggerVolumes));
        assert_eq!("trigger-volume".parse::<Category>(), Ok(Category::TriggerVolumes));
        assert_eq!("state_enter".parse::<Category>(), Ok(Category::StateEnterOutcomes));
        assert!("hats".parse::<Category>().is_err());
        assert_eq!(Category::Evidence.transcript_file(), "EvidenceTranscript.md");
    }

    #[test]
    fn test_roots_sorted_by_title_or_key() {
        let store = store();
        let config = ResolverConfig::new();
        let exporter = Exporter::new(&store, &config);

        let items: Vec<_> = exporter
            .roots(Category::Items)
            .unwrap()
            .iter()
            .map(root_title)
            .collect();
        assert_eq!(items, vec!["Apple", "Pogo Hammer", "Zither"]);

        let states: Vec<_> = exporter
            .roots(Category::StateEnterOutcomes)
            .unwrap()
            .iter()
            .filter_map(|root| root.key().map(|key| key.id))
            .collect();
        assert_eq!(states, vec![8, 9]);
        assert!(exporter.roots(Category::Scenes).unwrap().is_empty());
    }

    #[test]
    fn test_render_root_annotation() {
        let store = StoreBuilder::new(A)
            .node(NodeKind::Item, 1, json!({"_displayName": "Pogo Hammer", "ItemID": 1}))
            .record("Inventory", 5, json!({"_item": crate::testing::reference(A, 1)}))
            .build();
        let graph = ReferenceGraph::build(&store);
        let config = ResolverConfig::new();
        let exporter = Exporter::new(&store, &config).with_graph(&graph);
        let roots = exporter.roots(Category::Items).unwrap();

        let annotated = exporter.render_root(&roots[0], true).unwrap();
        assert_eq!(annotated.lines()[0], "# Pogo Hammer");
        assert_eq!(
            annotated.lines()[2],
            "*Referenced by: sharedassets0/Inventory #5 (_item)*"
        );

        let plain = exporter.render_root(&roots[0], false).unwrap();
        assert_eq!(&plain.lines()[..2], &["# Pogo Hammer".to_string(), String::new()]);
        assert!(!plain.text().contains("Referenced by"));
        assert!(store.contains(&RecordKey::new(A, 5)));
    }

    #[tokio::test]
    async fn test_export_writes_both_files() {
        let store = store();
        let config = ResolverConfig::new();
        let dir = tempfile::tempdir().unwrap();
        let export = ExportConfig::new(dir.path())
            .with_categories([Category::Items])
            .with_references(false);

        let summary = Exporter::new(&store, &config).export(&export).await.unwrap();
        assert_eq!(summary.categories, vec![(Category::Items, 3)]);
        assert_eq!(summary.files.len(), 2);

        let json: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("Items.json")).unwrap())
                .unwrap();
        assert_eq!(json.as_array().map(Vec::len), Some(3));
        assert_eq!(json[1]["_displayName"], json!("Pogo Hammer"));

        let transcript = std::fs::read_to_string(dir.path().join("ItemsTranscript.md")).unwrap();
        assert!(transcript.starts_with("# Apple\n"));
        assert!(transcript.ends_with('\n'));
    }
}
