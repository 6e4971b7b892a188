//! The outcome tagged union.
//!
//! Gameplay side effects are serialized as outcome records whose `_kind` tag
//! names the concrete action. Dispatch is a closed table: a tag that is not
//! listed here means the data has grown a kind nobody has modelled yet, and
//! construction fails instead of guessing.

use crate::node::{SchemaError, Source};
use crate::schema::{Constructor, NodeKind, SchemaDecl, ROOT};

/// Every outcome kind the game serializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutcomeKind {
    /// `Outcome`: holds a sequence plus an optional activation condition.
    Wrapper,
    /// `OutcomeSequence`: a graph of action nodes.
    Sequence,
    /// `OutcomeConnector`: forwards connections, renders nothing.
    Connector,
    Animation,
    Conversation,
    Counter,
    Move,
    Inventory,
    Ability,
    Evidence,
    Scene,
    Fade,
    Camera,
    Vfx,
    Ui,
    Sound,
    Save,
    Trial,
    Wait,
    SubOutcome,
    Narration,
    HeroSwitch,
}

/// Field on a wrapper that identifies the untagged legacy shape.
const LEGACY_SEQUENCE_FIELD: &str = "Sequence";

impl OutcomeKind {
    pub const ALL: [OutcomeKind; 22] = [
        OutcomeKind::Wrapper,
        OutcomeKind::Sequence,
        OutcomeKind::Connector,
        OutcomeKind::Animation,
        OutcomeKind::Conversation,
        OutcomeKind::Counter,
        OutcomeKind::Move,
        OutcomeKind::Inventory,
        OutcomeKind::Ability,
        OutcomeKind::Evidence,
        OutcomeKind::Scene,
        OutcomeKind::Fade,
        OutcomeKind::Camera,
        OutcomeKind::Vfx,
        OutcomeKind::Ui,
        OutcomeKind::Sound,
        OutcomeKind::Save,
        OutcomeKind::Trial,
        OutcomeKind::Wait,
        OutcomeKind::SubOutcome,
        OutcomeKind::Narration,
        OutcomeKind::HeroSwitch,
    ];

    /// The `_kind` tag this kind is serialized under.
    pub fn tag(self) -> &'static str {
        match self {
            OutcomeKind::Wrapper => "Outcome",
            OutcomeKind::Sequence => "OutcomeSequence",
            OutcomeKind::Connector => "OutcomeConnector",
            OutcomeKind::Animation => "OutcomeActionAnimation",
            OutcomeKind::Conversation => "OutcomeActionConversation",
            OutcomeKind::Counter => "OutcomeActionCounter",
            OutcomeKind::Move => "OutcomeActionMove",
            OutcomeKind::Inventory => "OutcomeActionInventory",
            OutcomeKind::Ability => "OutcomeActionAbility",
            OutcomeKind::Evidence => "OutcomeActionEvidence",
            OutcomeKind::Scene => "OutcomeActionScene",
            OutcomeKind::Fade => "OutcomeActionFade",
            OutcomeKind::Camera => "OutcomeActionCamera",
            OutcomeKind::Vfx => "OutcomeActionVFX",
            OutcomeKind::Ui => "OutcomeActionUI",
            OutcomeKind::Sound => "OutcomeActionSound",
            OutcomeKind::Save => "OutcomeActionSave",
            OutcomeKind::Trial => "OutcomeActionTrial",
            OutcomeKind::Wait => "OutcomeActionWait",
            OutcomeKind::SubOutcome => "OutcomeActionSubOutcome",
            OutcomeKind::Narration => "OutcomeActionNarration",
            OutcomeKind::HeroSwitch => "OutcomeActionHeroSwitch",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }

    /// Whether nodes of this kind sit in a sequence's execution graph.
    pub fn is_graph_node(self) -> bool {
        !matches!(self, OutcomeKind::Wrapper | OutcomeKind::Sequence)
    }

    pub(crate) fn decl(self) -> &'static SchemaDecl {
        match self {
            OutcomeKind::Wrapper => &WRAPPER,
            OutcomeKind::Sequence => &SEQUENCE,
            OutcomeKind::Connector => &CONNECTOR,
            OutcomeKind::Animation => &ANIMATION,
            OutcomeKind::Conversation => &CONVERSATION,
            OutcomeKind::Counter => &COUNTER,
            OutcomeKind::Move => &MOVE,
            OutcomeKind::Inventory => &INVENTORY,
            OutcomeKind::Ability => &ABILITY,
            OutcomeKind::Evidence => &EVIDENCE,
            OutcomeKind::Scene => &SCENE,
            OutcomeKind::Fade => &FADE,
            OutcomeKind::Camera => &CAMERA,
            OutcomeKind::Vfx => &VFX,
            OutcomeKind::Ui => &UI,
            OutcomeKind::Sound => &SOUND,
            OutcomeKind::Save => &SAVE,
            OutcomeKind::Trial => &TRIAL,
            OutcomeKind::Wait => &WAIT,
            OutcomeKind::SubOutcome => &SUB_OUTCOME,
            OutcomeKind::Narration => &NARRATION,
            OutcomeKind::HeroSwitch => &HERO_SWITCH,
        }
    }
}

/// Pick the outcome kind for `source`.
///
/// An untagged source that still carries a `Sequence` field is the older
/// wrapper shape and becomes [`OutcomeKind::Wrapper`]. Anything else without
/// a known tag is an error.
pub fn dispatch(source: &Source<'_>) -> Result<OutcomeKind, SchemaError> {
    let tag = source.tag();
    if let Some(kind) = tag.and_then(OutcomeKind::from_tag) {
        return Ok(kind);
    }
    if source.get(LEGACY_SEQUENCE_FIELD).is_some() {
        tracing::debug!(record = %source.label(), ?tag, "untagged outcome wrapper");
        return Ok(OutcomeKind::Wrapper);
    }
    Err(SchemaError::UnknownOutcome {
        tag: tag.map(str::to_string),
        record: source.label(),
    })
}

// ============================================================================
// Schemas
// ============================================================================

static WRAPPER: SchemaDecl = SchemaDecl {
    name: "Outcome",
    parent: Some(&ROOT),
    simple: &["m_Name"],
    typed: &[
        ("Sequence", Constructor::Outcome),
        ("ActivateCondition", Constructor::Node(NodeKind::Condition)),
        ("ActionsList", Constructor::Outcome),
    ],
};

static SEQUENCE: SchemaDecl = SchemaDecl {
    name: "OutcomeSequence",
    parent: Some(&ROOT),
    simple: &["m_Name"],
    typed: &[("nodes", Constructor::Outcome)],
};

/// Shared by every node of an execution graph.
static OUTCOME_NODE: SchemaDecl = SchemaDecl {
    name: "OutcomeNode",
    parent: Some(&ROOT),
    simple: &["m_Name", "graph", "position", "input", "output"],
    typed: &[],
};

static CONNECTOR: SchemaDecl = SchemaDecl {
    name: "OutcomeConnector",
    parent: Some(&OUTCOME_NODE),
    simple: &[],
    typed: &[],
};

static ANIMATION: SchemaDecl = SchemaDecl {
    name: "OutcomeActionAnimation",
    parent: Some(&OUTCOME_NODE),
    simple: &["_targetName", "_animationName", "_waitForCompletion"],
    typed: &[],
};

static CONVERSATION: SchemaDecl = SchemaDecl {
    name: "OutcomeActionConversation",
    parent: Some(&OUTCOME_NODE),
    simple: &[],
    typed: &[("_conversation", Constructor::Node(NodeKind::Conversation))],
};

static COUNTER: SchemaDecl = SchemaDecl {
    name: "OutcomeActionCounter",
    parent: Some(&OUTCOME_NODE),
    simple: &["_operation", "_value"],
    typed: &[("_counter", Constructor::Node(NodeKind::Counter))],
};

static MOVE: SchemaDecl = SchemaDecl {
    name: "OutcomeActionMove",
    parent: Some(&OUTCOME_NODE),
    simple: &["_destinationName"],
    typed: &[("_hero", Constructor::Node(NodeKind::Hero))],
};

static INVENTORY: SchemaDecl = SchemaDecl {
    name: "OutcomeActionInventory",
    parent: Some(&OUTCOME_NODE),
    simple: &["_add"],
    typed: &[("_item", Constructor::Node(NodeKind::Item))],
};

static ABILITY: SchemaDecl = SchemaDecl {
    name: "OutcomeActionAbility",
    parent: Some(&OUTCOME_NODE),
    simple: &["_add"],
    typed: &[("_ability", Constructor::Node(NodeKind::Ability))],
};

static EVIDENCE: SchemaDecl = SchemaDecl {
    name: "OutcomeActionEvidence",
    parent: Some(&OUTCOME_NODE),
    simple: &["_add"],
    typed: &[("_evidence", Constructor::Node(NodeKind::Evidence))],
};

static SCENE: SchemaDecl = SchemaDecl {
    name: "OutcomeActionScene",
    parent: Some(&OUTCOME_NODE),
    simple: &["_sceneName", "_spawnPointName"],
    typed: &[],
};

static FADE: SchemaDecl = SchemaDecl {
    name: "OutcomeActionFade",
    parent: Some(&OUTCOME_NODE),
    simple: &["_fadeToBlack", "_duration"],
    typed: &[],
};

static CAMERA: SchemaDecl = SchemaDecl {
    name: "OutcomeActionCamera",
    parent: Some(&OUTCOME_NODE),
    simple: &["_cameraTargetName", "_zoom"],
    typed: &[],
};

static VFX: SchemaDecl = SchemaDecl {
    name: "OutcomeActionVFX",
    parent: Some(&OUTCOME_NODE),
    simple: &["_effectName"],
    typed: &[],
};

static UI: SchemaDecl = SchemaDecl {
    name: "OutcomeActionUI",
    parent: Some(&OUTCOME_NODE),
    simple: &["_uiElement", "_visible"],
    typed: &[],
};

static SOUND: SchemaDecl = SchemaDecl {
    name: "OutcomeActionSound",
    parent: Some(&OUTCOME_NODE),
    simple: &["_clipName", "_loop"],
    typed: &[],
};

static SAVE: SchemaDecl = SchemaDecl {
    name: "OutcomeActionSave",
    parent: Some(&OUTCOME_NODE),
    simple: &["_checkpointName"],
    typed: &[],
};

static TRIAL: SchemaDecl = SchemaDecl {
    name: "OutcomeActionTrial",
    parent: Some(&OUTCOME_NODE),
    simple: &["_trialStep", "_correct"],
    typed: &[("_evidence", Constructor::Node(NodeKind::Evidence))],
};

static WAIT: SchemaDecl = SchemaDecl {
    name: "OutcomeActionWait",
    parent: Some(&OUTCOME_NODE),
    simple: &["_seconds"],
    typed: &[],
};

static SUB_OUTCOME: SchemaDecl = SchemaDecl {
    name: "OutcomeActionSubOutcome",
    parent: Some(&OUTCOME_NODE),
    simple: &[],
    typed: &[("_outcome", Constructor::Outcome)],
};

static NARRATION: SchemaDecl = SchemaDecl {
    name: "OutcomeActionNarration",
    parent: Some(&OUTCOME_NODE),
    simple: &["_lines"],
    typed: &[],
};

static HERO_SWITCH: SchemaDecl = SchemaDecl {
    name: "OutcomeActionHeroSwitch",
    parent: Some(&OUTCOME_NODE),
    simple: &[],
    typed: &[("_hero", Constructor::Node(NodeKind::Hero))],
};
