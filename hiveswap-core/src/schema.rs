//! Declarative field schemas for every node kind.
//!
//! Each kind declares only its own fields in a [`SchemaDecl`] and names its
//! parent declaration. [`Schema::compose`] walks the chain root-first and
//! merges the declarations (child entries override parent entries with the
//! same name). The composed schemas are computed once per kind and kept in a
//! static table, so the full field layout of any kind can be inspected or
//! diffed without building a node.
//!
//! ```text
//! MonoBehaviour ─┬─ Root ─┬─ VerbHolder ─┬─ Item / Ability / Evidence / Interactable
//!                │        ├─ Scene, TriggerVolume, StateEnter, OutcomeCanvas, Counter
//!                │        └─ OutcomeNode ── every OutcomeAction* kind
//!                └─ Verb, Target ─┬─ ImportedTarget ── Ability/Item/InteractableTarget
//!                                 └─ HeroTarget
//! ```

use crate::node::{Field, TypedNode};
use crate::outcome::OutcomeKind;
use crate::store::{ARCHIVE_FIELD, IDENTITY_FIELDS, KIND_FIELD, RECORD_ID_FIELD};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// The one field that is only expanded on nodes built with `deep = true`.
///
/// Items and abilities reference verbs, whose targets reference items and
/// abilities again; expanding verbs everywhere blows up exponentially.
pub const DEEP_FIELD: &str = "_verbs";

/// Every kind of typed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Item,
    Ability,
    Evidence,
    Interactable,
    Scene,
    TriggerVolume,
    StateEnter,
    OutcomeCanvas,
    Counter,
    Verb,
    AbilityTarget,
    ItemTarget,
    HeroTarget,
    InteractableTarget,
    Condition,
    CounterTest,
    Hero,
    Conversation,
    ConvoLine,
    ConversationId,
    /// A member of the outcome tagged union.
    Outcome(OutcomeKind),
}

impl NodeKind {
    const BASE: [NodeKind; 20] = [
        NodeKind::Item,
        NodeKind::Ability,
        NodeKind::Evidence,
        NodeKind::Interactable,
        NodeKind::Scene,
        NodeKind::TriggerVolume,
        NodeKind::StateEnter,
        NodeKind::OutcomeCanvas,
        NodeKind::Counter,
        NodeKind::Verb,
        NodeKind::AbilityTarget,
        NodeKind::ItemTarget,
        NodeKind::HeroTarget,
        NodeKind::InteractableTarget,
        NodeKind::Condition,
        NodeKind::CounterTest,
        NodeKind::Hero,
        NodeKind::Conversation,
        NodeKind::ConvoLine,
        NodeKind::ConversationId,
    ];

    /// All kinds, outcome kinds included.
    pub fn all() -> impl Iterator<Item = NodeKind> {
        Self::BASE
            .into_iter()
            .chain(OutcomeKind::ALL.into_iter().map(NodeKind::Outcome))
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Item => "Item",
            NodeKind::Ability => "Ability",
            NodeKind::Evidence => "Evidence",
            NodeKind::Interactable => "Interactable",
            NodeKind::Scene => "Scene",
            NodeKind::TriggerVolume => "TriggerVolume",
            NodeKind::StateEnter => "StateEnter",
            NodeKind::OutcomeCanvas => "OutcomeCanvas",
            NodeKind::Counter => "Counter",
            NodeKind::Verb => "Verb",
            NodeKind::AbilityTarget => "AbilityTarget",
            NodeKind::ItemTarget => "ItemTarget",
            NodeKind::HeroTarget => "HeroTarget",
            NodeKind::InteractableTarget => "InteractableTarget",
            NodeKind::Condition => "Condition",
            NodeKind::CounterTest => "CounterTest",
            NodeKind::Hero => "Hero",
            NodeKind::Conversation => "Conversation",
            NodeKind::ConvoLine => "ConvoLine",
            NodeKind::ConversationId => "ConversationId",
            NodeKind::Outcome(kind) => kind.tag(),
        }
    }

    /// This kind's own declaration.
    pub fn decl(self) -> &'static SchemaDecl {
        match self {
            NodeKind::Item => &ITEM,
            NodeKind::Ability => &ABILITY,
            NodeKind::Evidence => &EVIDENCE,
            NodeKind::Interactable => &INTERACTABLE,
            NodeKind::Scene => &SCENE,
            NodeKind::TriggerVolume => &TRIGGER_VOLUME,
            NodeKind::StateEnter => &STATE_ENTER,
            NodeKind::OutcomeCanvas => &OUTCOME_CANVAS,
            NodeKind::Counter => &COUNTER,
            NodeKind::Verb => &VERB,
            NodeKind::AbilityTarget => &ABILITY_TARGET,
            NodeKind::ItemTarget => &ITEM_TARGET,
            NodeKind::HeroTarget => &HERO_TARGET,
            NodeKind::InteractableTarget => &INTERACTABLE_TARGET,
            NodeKind::Condition => &CONDITION,
            NodeKind::CounterTest => &COUNTER_TEST,
            NodeKind::Hero => &HERO,
            NodeKind::Conversation => &CONVERSATION,
            NodeKind::ConvoLine => &CONVO_LINE,
            NodeKind::ConversationId => &CONVERSATION_ID,
            NodeKind::Outcome(kind) => kind.decl(),
        }
    }

    /// The composed schema for this kind.
    pub fn schema(self) -> &'static Schema {
        // The table is built from `NodeKind::all()`, so every kind is present.
        &SCHEMAS[&self]
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a typed field's value is wrapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constructor {
    /// Build a node of a fixed kind.
    Node(NodeKind),
    /// Dispatch through the outcome tagged union.
    Outcome,
    /// Locate an exported asset file of the given type.
    Asset(&'static str),
}

impl fmt::Display for Constructor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constructor::Node(kind) => write!(f, "{kind}"),
            Constructor::Outcome => f.write_str("Outcome dispatch"),
            Constructor::Asset(asset_type) => write!(f, "Asset<{asset_type}>"),
        }
    }
}

/// The fields one schema layer adds on top of its parent.
#[derive(Debug)]
pub struct SchemaDecl {
    pub name: &'static str,
    pub parent: Option<&'static SchemaDecl>,
    /// Copied through reference resolution without further wrapping.
    pub simple: &'static [&'static str],
    /// Wrapped by a constructor, in construction order.
    pub typed: &'static [(&'static str, Constructor)],
}

impl SchemaDecl {
    /// This declaration and its ancestors, nearest first.
    pub fn lineage(&'static self) -> impl Iterator<Item = &'static SchemaDecl> {
        std::iter::successors(Some(self), |decl| decl.parent)
    }
}

/// A kind's fully merged field layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    pub kind: NodeKind,
    pub simple: Vec<&'static str>,
    pub typed: Vec<(&'static str, Constructor)>,
}

impl Schema {
    /// Merge `decl` over its ancestors, parent first.
    pub fn compose(kind: NodeKind, decl: &'static SchemaDecl) -> Self {
        let mut chain: Vec<_> = decl.lineage().collect();
        chain.reverse();

        let mut simple: Vec<&'static str> = Vec::new();
        let mut typed: Vec<(&'static str, Constructor)> = Vec::new();
        for layer in chain {
            for &name in layer.simple {
                typed.retain(|(typed_name, _)| *typed_name != name);
                if !simple.contains(&name) {
                    simple.push(name);
                }
            }
            for &(name, constructor) in layer.typed {
                simple.retain(|simple_name| *simple_name != name);
                match typed.iter_mut().find(|(typed_name, _)| *typed_name == name) {
                    Some(slot) => slot.1 = constructor,
                    None => typed.push((name, constructor)),
                }
            }
        }

        Self {
            kind,
            simple,
            typed,
        }
    }

    /// Every declared field name, typed fields first.
    pub fn declared(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.typed
            .iter()
            .map(|(name, _)| *name)
            .chain(self.simple.iter().copied())
    }

    /// Whether the schema claims `field` as simple or typed.
    pub fn claims(&self, field: &str) -> bool {
        self.simple.contains(&field) || self.typed.iter().any(|(name, _)| *name == field)
    }

    pub fn constructor(&self, field: &str) -> Option<Constructor> {
        self.typed
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, constructor)| *constructor)
    }
}

static SCHEMAS: Lazy<HashMap<NodeKind, Schema>> = Lazy::new(|| {
    NodeKind::all()
        .map(|kind| (kind, Schema::compose(kind, kind.decl())))
        .collect()
});

// ============================================================================
// Shared layers
// ============================================================================

pub(crate) static MONO_BEHAVIOUR: SchemaDecl = SchemaDecl {
    name: "MonoBehaviour",
    parent: None,
    simple: &[],
    typed: &[],
};

/// Every record loaded from the store carries its identity fields.
pub(crate) static ROOT: SchemaDecl = SchemaDecl {
    name: "Root",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[ARCHIVE_FIELD, RECORD_ID_FIELD, KIND_FIELD],
    typed: &[],
};

static VERB_HOLDER: SchemaDecl = SchemaDecl {
    name: "VerbHolder",
    parent: Some(&ROOT),
    simple: &["m_Name", "_displayName"],
    typed: &[(DEEP_FIELD, Constructor::Node(NodeKind::Verb))],
};

static TARGET: SchemaDecl = SchemaDecl {
    name: "Target",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[
        "CursorHighlightHotspot",
        "CursorHighlightOverride",
        "MustApproachOverride",
        "ImportedAnimOneShot",
        "m_Script",
        "m_Name",
    ],
    typed: &[
        ("Conditions", Constructor::Node(NodeKind::Condition)),
        ("Outcome", Constructor::Outcome),
    ],
};

static IMPORTED_TARGET: SchemaDecl = SchemaDecl {
    name: "ImportedTarget",
    parent: Some(&TARGET),
    simple: &["ImportedInteractMessage"],
    typed: &[(
        "ImportedInteractConversation",
        Constructor::Node(NodeKind::Conversation),
    )],
};

// ============================================================================
// Root kinds
// ============================================================================

static ITEM: SchemaDecl = SchemaDecl {
    name: "Item",
    parent: Some(&VERB_HOLDER),
    simple: &["ItemID", "m_Script"],
    typed: &[("_icon", Constructor::Asset("Sprite"))],
};

static ABILITY: SchemaDecl = SchemaDecl {
    name: "Ability",
    parent: Some(&VERB_HOLDER),
    simple: &["AbilityID", "m_Script"],
    typed: &[("_icon", Constructor::Asset("Sprite"))],
};

static EVIDENCE: SchemaDecl = SchemaDecl {
    name: "Evidence",
    parent: Some(&VERB_HOLDER),
    simple: &["EvidenceID", "_description"],
    typed: &[("_icon", Constructor::Asset("Sprite"))],
};

static INTERACTABLE: SchemaDecl = SchemaDecl {
    name: "Interactable",
    parent: Some(&VERB_HOLDER),
    simple: &["InteractableID"],
    typed: &[],
};

static SCENE: SchemaDecl = SchemaDecl {
    name: "Scene",
    parent: Some(&ROOT),
    simple: &["m_Name", "_sceneName", "SceneID"],
    typed: &[
        ("_onEnter", Constructor::Outcome),
        ("_onExit", Constructor::Outcome),
    ],
};

static TRIGGER_VOLUME: SchemaDecl = SchemaDecl {
    name: "TriggerVolume",
    parent: Some(&ROOT),
    simple: &["m_Name", "TriggerVolumeID"],
    typed: &[
        ("_conditions", Constructor::Node(NodeKind::Condition)),
        ("_onEnter", Constructor::Outcome),
        ("_onExit", Constructor::Outcome),
    ],
};

static STATE_ENTER: SchemaDecl = SchemaDecl {
    name: "StateEnter",
    parent: Some(&ROOT),
    simple: &["m_Name", "_stateName"],
    typed: &[("_outcome", Constructor::Outcome)],
};

static OUTCOME_CANVAS: SchemaDecl = SchemaDecl {
    name: "OutcomeCanvas",
    parent: Some(&ROOT),
    simple: &["m_Name"],
    typed: &[("Outcome", Constructor::Outcome)],
};

static COUNTER: SchemaDecl = SchemaDecl {
    name: "Counter",
    parent: Some(&ROOT),
    simple: &[
        "_dataScope",
        "_guid",
        "_maxValue",
        "_minValue",
        "_startValue",
        "_wraps",
        "m_Name",
    ],
    typed: &[],
};

// ============================================================================
// Inner kinds
// ============================================================================

static VERB: SchemaDecl = SchemaDecl {
    name: "Verb",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &["_name", "_cursorOverride", "_mustApproach"],
    typed: &[
        ("_abilityTargets", Constructor::Node(NodeKind::AbilityTarget)),
        ("_itemTargets", Constructor::Node(NodeKind::ItemTarget)),
        ("_heroTargets", Constructor::Node(NodeKind::HeroTarget)),
        (
            "_interactableTargets",
            Constructor::Node(NodeKind::InteractableTarget),
        ),
        ("_activationConditions", Constructor::Node(NodeKind::Condition)),
        ("_defaultTargetFail", Constructor::Outcome),
        ("_outcome", Constructor::Outcome),
    ],
};

static ABILITY_TARGET: SchemaDecl = SchemaDecl {
    name: "AbilityTarget",
    parent: Some(&IMPORTED_TARGET),
    simple: &[],
    typed: &[("Ability", Constructor::Node(NodeKind::Ability))],
};

static ITEM_TARGET: SchemaDecl = SchemaDecl {
    name: "ItemTarget",
    parent: Some(&IMPORTED_TARGET),
    simple: &[],
    typed: &[("Item", Constructor::Node(NodeKind::Item))],
};

static INTERACTABLE_TARGET: SchemaDecl = SchemaDecl {
    name: "InteractableTarget",
    parent: Some(&IMPORTED_TARGET),
    simple: &[],
    typed: &[("TargetId", Constructor::Node(NodeKind::Interactable))],
};

static HERO_TARGET: SchemaDecl = SchemaDecl {
    name: "HeroTarget",
    parent: Some(&TARGET),
    simple: &[],
    typed: &[("Hero", Constructor::Node(NodeKind::Hero))],
};

static CONDITION: SchemaDecl = SchemaDecl {
    name: "Condition",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &["MustBeHero"],
    typed: &[("_counterTests", Constructor::Node(NodeKind::CounterTest))],
};

static COUNTER_TEST: SchemaDecl = SchemaDecl {
    name: "CounterTest",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &["_comparison", "_value"],
    typed: &[("_counter", Constructor::Node(NodeKind::Counter))],
};

static HERO: SchemaDecl = SchemaDecl {
    name: "Hero",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[
        "Hero",
        "_prefab",
        "_startScene",
        "_startingAbilities",
        "_startingDevices",
        "_startingEquipment",
        "m_Name",
    ],
    typed: &[],
};

static CONVERSATION: SchemaDecl = SchemaDecl {
    name: "Conversation",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[
        "AutoPlayLines",
        "ConversationUIOverride",
        "ConvoCameraSizeOverride",
        "IsPlayerOnly",
        "IsRefresher",
        "DestroyConversationAfterSceneChange",
        "m_Name",
    ],
    typed: &[
        ("ConvoId", Constructor::Node(NodeKind::ConversationId)),
        ("FinalOutcome", Constructor::Outcome),
        ("HasBeenPlayedCounter", Constructor::Node(NodeKind::Counter)),
        ("Lines", Constructor::Node(NodeKind::ConvoLine)),
        ("OrphanedLines", Constructor::Node(NodeKind::ConvoLine)),
    ],
};

static CONVO_LINE: SchemaDecl = SchemaDecl {
    name: "ConvoLine",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[
        "DisplaySpeed",
        "EmotionIndex",
        "EndsConversation",
        "HideConversationWindowForLine",
        "HideLineUntilOutcomeFinishes",
        "IsPlayerOption",
        "LineText",
        "LineVFX",
        "LineMappings",
        "LoopLineIndex",
        "NextLineIndex",
        "SpeakerId",
        "TextColorOverride",
        "LinkMappings",
    ],
    typed: &[
        ("Condition", Constructor::Node(NodeKind::Condition)),
        ("OptionConvoId", Constructor::Node(NodeKind::ConversationId)),
        ("Outcome", Constructor::Outcome),
    ],
};

static CONVERSATION_ID: SchemaDecl = SchemaDecl {
    name: "ConversationId",
    parent: Some(&MONO_BEHAVIOUR),
    simple: &[
        "Area",
        "Branches",
        "Character",
        "Conversation",
        "IdString",
        "MajorPlot",
        "MinorPlot",
    ],
    typed: &[],
};

// ============================================================================
// Drift report
// ============================================================================

/// Fields seen on built nodes that no schema claims, grouped by kind.
///
/// Unknown fields never fail construction; this report is how they surface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DriftReport {
    unused: BTreeMap<&'static str, BTreeSet<String>>,
}

impl DriftReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the unused fields of `node` and all of its descendants.
    ///
    /// The bookkeeping fields injected by the loader are not drift and are
    /// skipped.
    pub fn record(&mut self, node: &TypedNode<'_>) {
        let drifted: Vec<String> = node
            .unused()
            .map(|(name, _)| name)
            .filter(|name| !IDENTITY_FIELDS.contains(name))
            .map(str::to_string)
            .collect();
        if !drifted.is_empty() {
            self.unused
                .entry(node.kind().name())
                .or_default()
                .extend(drifted);
        }
        for (_, field) in node.fields() {
            self.record_field(field);
        }
    }

    fn record_field(&mut self, field: &Field<'_>) {
        match field {
            Field::Node(node) => self.record(node),
            Field::List(items) => items.iter().for_each(|item| self.record_field(item)),
            _ => {}
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unused.is_empty()
    }

    /// Unused field names for one kind.
    pub fn fields_for(&self, kind: NodeKind) -> Option<&BTreeSet<String>> {
        self.unused.get(kind.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &BTreeSet<String>)> {
        self.unused.iter().map(|(kind, fields)| (*kind, fields))
    }
}

/// Aggregate the unused fields of a set of built nodes.
pub fn drift_report<'n, 'a: 'n>(
    nodes: impl IntoIterator<Item = &'n TypedNode<'a>>,
) -> DriftReport {
    let mut report = DriftReport::new();
    for node in nodes {
        report.record(node);
    }
    if !report.is_empty() {
        for (kind, fields) in report.iter() {
            tracing::debug!(kind, ?fields, "fields without a schema entry");
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_fields_propagate() {
        for kind in [NodeKind::Item, NodeKind::Scene, NodeKind::Counter] {
            let schema = kind.schema();
            for field in [ARCHIVE_FIELD, RECORD_ID_FIELD, KIND_FIELD] {
                assert!(schema.claims(field), "{kind} should claim {field}");
            }
        }
        assert!(!NodeKind::Verb.schema().claims(ARCHIVE_FIELD));
    }

    #[test]
    fn test_outcome_kinds_share_node_fields() {
        let schema = NodeKind::Outcome(OutcomeKind::Sound).schema();
        for field in ["m_Name", "graph", "position", "input", "output", "_clipName", "_loop"] {
            assert!(schema.claims(field), "sound outcome should claim {field}");
        }
    }

    #[test]
    fn test_parent_first_order() {
        let schema = NodeKind::Item.schema();
        assert_eq!(
            schema.simple,
            vec![
                ARCHIVE_FIELD,
                RECORD_ID_FIELD,
                KIND_FIELD,
                "m_Name",
                "_displayName",
                "ItemID",
                "m_Script"
            ]
        );
        let typed: Vec<_> = schema.typed.iter().map(|(name, _)| *name).collect();
        assert_eq!(typed, vec![DEEP_FIELD, "_icon"]);
    }

    #[test]
    fn test_item_target_inherits_target_layers() {
        let schema = NodeKind::ItemTarget.schema();
        let typed: Vec<_> = schema.typed.iter().map(|(name, _)| *name).collect();
        assert_eq!(
            typed,
            vec!["Conditions", "Outcome", "ImportedInteractConversation", "Item"]
        );
        assert_eq!(
            schema.constructor("Item"),
            Some(Constructor::Node(NodeKind::Item))
        );
        assert!(!NodeKind::HeroTarget.schema().claims("ImportedInteractMessage"));
    }

    static BASE_LAYER: SchemaDecl = SchemaDecl {
        name: "Base",
        parent: None,
        simple: &["a", "b"],
        typed: &[("c", Constructor::Outcome)],
    };

    static CHILD_LAYER: SchemaDecl = SchemaDecl {
        name: "Child",
        parent: Some(&BASE_LAYER),
        simple: &["c", "d"],
        typed: &[("b", Constructor::Node(NodeKind::Hero))],
    };

    #[test]
    fn test_child_overrides_parent() {
        let schema = Schema::compose(NodeKind::Hero, &CHILD_LAYER);
        assert_eq!(schema.simple, vec!["a", "c", "d"]);
        assert_eq!(schema.typed, vec![("b", Constructor::Node(NodeKind::Hero))]);
        let declared: Vec<_> = schema.declared().collect();
        assert_eq!(declared, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn test_every_kind_has_a_schema() {
        assert_eq!(NodeKind::all().count(), 20 + OutcomeKind::ALL.len());
        for kind in NodeKind::all() {
            assert_eq!(kind.schema().kind, kind);
        }
    }

    #[test]
    fn test_presentation_fields_are_claimed() {
        const TARGET_FIELDS: &[&str] = &[
            "CursorHighlightHotspot",
            "CursorHighlightOverride",
            "MustApproachOverride",
            "ImportedAnimOneShot",
            "m_Script",
        ];
        let claimed: [(NodeKind, &[&str]); 6] = [
            (
                NodeKind::Hero,
                &[
                    "_prefab",
                    "_startScene",
                    "_startingAbilities",
                    "_startingDevices",
                    "_startingEquipment",
                ],
            ),
            (NodeKind::HeroTarget, TARGET_FIELDS),
            (NodeKind::ItemTarget, TARGET_FIELDS),
            (
                NodeKind::ConvoLine,
                &[
                    "DisplaySpeed",
                    "EmotionIndex",
                    "HideConversationWindowForLine",
                    "HideLineUntilOutcomeFinishes",
                    "LineVFX",
                    "LineMappings",
                    "LoopLineIndex",
                    "TextColorOverride",
                    "LinkMappings",
                ],
            ),
            (
                NodeKind::Conversation,
                &[
                    "ConversationUIOverride",
                    "ConvoCameraSizeOverride",
                    "IsRefresher",
                    "DestroyConversationAfterSceneChange",
                ],
            ),
            (NodeKind::ConversationId, &["Branches", "MajorPlot", "MinorPlot"]),
        ];
        for (kind, fields) in claimed {
            for field in fields {
                assert!(kind.schema().claims(field), "{kind} should claim {field}");
            }
        }
    }

    #[test]
    fn test_conversation_layout_does_not_drift() {
        use crate::node::NodeBuilder;
        use crate::resolver::Resolver;
        use crate::store::RecordKey;
        use crate::testing::{fixture, StoreBuilder};
        use serde_json::json;

        let line = fixture(
            NodeKind::ConvoLine,
            json!({"LineText": "Hi.", "EmotionIndex": 2, "LineVFX": "", "LinkMappings": []}),
        );
        let store = StoreBuilder::new("a")
            .node(
                NodeKind::Conversation,
                1,
                json!({"Lines": [line], "IsRefresher": 0, "ConvoCameraSizeOverride": 5.5}),
            )
            .build();
        let mut builder = NodeBuilder::new(Resolver::lenient(&store));
        let record = store.get(&RecordKey::new("a", 1)).unwrap();
        let conversation = builder
            .build_record(NodeKind::Conversation, record, false)
            .unwrap();

        assert!(drift_report([&conversation]).is_empty());
    }

    #[test]
    fn test_drift_report_skips_loader_fields() {
        use crate::node::NodeBuilder;
        use crate::resolver::Resolver;
        use crate::store::RecordKey;
        use crate::testing::{reference, StoreBuilder};
        use serde_json::json;

        let store = StoreBuilder::new("a")
            .node(
                NodeKind::Item,
                1,
                json!({"_verbs": [reference("a", 2)], "_extra": 3}),
            )
            .node(NodeKind::Verb, 2, json!({"_name": "Use", "_legacy": true}))
            .build();
        let mut builder = NodeBuilder::new(Resolver::lenient(&store));
        let record = store.get(&RecordKey::new("a", 1)).unwrap();
        let item = builder.build_record(NodeKind::Item, record, true).unwrap();

        let report = drift_report([&item]);
        let fields = |kind| -> Vec<String> {
            report.fields_for(kind).into_iter().flatten().cloned().collect()
        };
        assert_eq!(fields(NodeKind::Item), vec!["_extra".to_string()]);
        assert_eq!(fields(NodeKind::Verb), vec!["_legacy".to_string()]);
        assert!(drift_report(Vec::<&TypedNode<'_>>::new()).is_empty());
    }
}
