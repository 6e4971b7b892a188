//! Narrative text for every node kind.
//!
//! Rendering only reads the node tree, so the same node renders the same
//! lines every time. Missing referents never fail here; they fall back to
//! labels like `[deleted item]`.

use crate::linearize::ExecutionGraph;
use crate::node::{Field, TypedNode};
use crate::outcome::OutcomeKind;
use crate::render::{Renderable, Transcript, TranscriptError};
use crate::schema::NodeKind;
use crate::speaker::speaker_name;
use serde_json::Value;
use std::borrow::Cow;

pub(crate) fn write_field(
    field: &Field<'_>,
    out: &mut Transcript,
) -> Result<(), TranscriptError> {
    match field {
        Field::Node(node) => write_node(node, out),
        Field::List(items) => items.iter().try_for_each(|item| write_field(item, out)),
        Field::Recursive(_) => {
            out.push("(Recursive)");
            Ok(())
        }
        _ => Ok(()),
    }
}

pub(crate) fn write_node(
    node: &TypedNode<'_>,
    out: &mut Transcript,
) -> Result<(), TranscriptError> {
    match node.kind() {
        NodeKind::Item | NodeKind::Ability | NodeKind::Interactable => write_verbs(node, out),
        NodeKind::Evidence => {
            if let Some(description) = node.str_field("_description").filter(|d| !d.is_empty()) {
                out.push(format!("*{description}*"));
                out.blank();
            }
            write_verbs(node, out)
        }
        NodeKind::Scene => {
            write_section(out, "On enter", node.get("_onEnter"))?;
            write_section(out, "On exit", node.get("_onExit"))
        }
        NodeKind::TriggerVolume => {
            let mut body = Transcript::new();
            write_section(&mut body, "On enter", node.get("_onEnter"))?;
            write_section(&mut body, "On exit", node.get("_onExit"))?;
            out.gated(&predicate(node.get("_conditions")), body);
            Ok(())
        }
        NodeKind::StateEnter => write_field(node.get("_outcome"), out),
        NodeKind::OutcomeCanvas => write_field(node.get("Outcome"), out),
        NodeKind::Verb => write_verb(node, None, out),
        NodeKind::AbilityTarget
        | NodeKind::ItemTarget
        | NodeKind::HeroTarget
        | NodeKind::InteractableTarget => write_target(node, out),
        NodeKind::Conversation => {
            write_field(node.get("Lines"), out)?;
            write_field(node.get("FinalOutcome"), out)
        }
        NodeKind::ConvoLine => write_line(node, out),
        NodeKind::Counter
        | NodeKind::Condition
        | NodeKind::CounterTest
        | NodeKind::Hero
        | NodeKind::ConversationId => Ok(()),
        NodeKind::Outcome(kind) => write_outcome(node, kind, out),
    }
}

/// `## heading` over the field's transcript, when there is one.
fn write_section(
    out: &mut Transcript,
    heading: &str,
    field: &Field<'_>,
) -> Result<(), TranscriptError> {
    let body = field.transcript_body()?;
    if !body.is_empty() {
        out.push(format!("## {heading}"));
        out.blank();
        out.append(body);
        out.blank();
    }
    Ok(())
}

fn write_verbs(holder: &TypedNode<'_>, out: &mut Transcript) -> Result<(), TranscriptError> {
    let parent = holder.title().unwrap_or("[unnamed]");
    for verb in holder.get("_verbs").nodes() {
        write_verb(verb, Some(parent), out)?;
    }
    Ok(())
}

/// How each target list names its referent.
const TARGET_LISTS: [(&str, &str, &str); 4] = [
    ("_abilityTargets", "Ability", "[deleted ability]"),
    ("_itemTargets", "Item", "[deleted item]"),
    ("_heroTargets", "Hero", "[deleted hero]"),
    ("_interactableTargets", "TargetId", "[deleted interactable]"),
];

struct RenderedTarget {
    kind: NodeKind,
    /// `None` when the referent was deleted.
    referent: Option<String>,
    deleted_label: &'static str,
    body: Transcript,
}

fn write_verb(
    verb: &TypedNode<'_>,
    parent: Option<&str>,
    out: &mut Transcript,
) -> Result<(), TranscriptError> {
    let name = verb.str_field("_name").unwrap_or_default();
    let clause = match parent {
        Some(parent) if parent == name => parent.to_string(),
        Some(parent) => format!("{name} {parent}"),
        None => name.to_string(),
    };

    let mut targets = Vec::new();
    for (list, referent_field, deleted_label) in TARGET_LISTS {
        for target in verb.get(list).nodes() {
            let referent = match target.get(referent_field) {
                Field::Node(node) => Some(node.title().unwrap_or("[unnamed]").to_string()),
                Field::Recursive(key) => Some(key.to_string()),
                _ => None,
            };
            targets.push(RenderedTarget {
                kind: target.kind(),
                referent,
                deleted_label,
                body: target.transcript_body()?,
            });
        }
    }
    let default_message = majority(targets.iter().map(|target| target.body.text()));

    let mut body = Transcript::new();
    for target in targets {
        let text = target.body.text();
        let deleted = target.referent.is_none();
        if deleted && default_message.as_deref() == Some(text.as_str()) {
            continue;
        }
        match target.kind {
            NodeKind::HeroTarget if target.body.is_empty() => continue,
            NodeKind::InteractableTarget => {
                if target.body.is_empty() {
                    continue;
                }
                if deleted {
                    return Err(TranscriptError::Invariant {
                        node: verb.label(),
                        message: format!(
                            "deleted interactable target under {clause:?} renders {text:?}"
                        ),
                    });
                }
            }
            _ => {}
        }
        let label = target.referent.as_deref().unwrap_or(target.deleted_label);
        body.push(format!("## {clause} with {label}"));
        body.blank();
        body.append(target.body);
        body.blank();
    }

    write_section(&mut body, &format!("{clause} default outcome"), verb.get("_outcome"))?;
    write_section(&mut body, &format!("{clause} invalid target"), verb.get("_defaultTargetFail"))?;

    if body.is_empty() {
        out.push(format!("## {clause} (Empty)"));
        out.blank();
        for line in format!("{:#}", verb.to_dict()).lines() {
            out.push(line);
        }
        out.blank();
    } else {
        out.gated(&predicate(verb.get("_activationConditions")), body);
    }
    Ok(())
}

/// The most frequent message. Ties go to the message first seen latest.
fn majority(messages: impl Iterator<Item = String>) -> Option<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for message in messages {
        match counts.iter_mut().find(|(seen, _)| *seen == message) {
            Some((_, count)) => *count += 1,
            None => counts.push((message, 1)),
        }
    }
    let mut best: Option<(String, usize)> = None;
    for (message, count) in counts {
        if best.as_ref().map_or(true, |(_, top)| count >= *top) {
            best = Some((message, count));
        }
    }
    best.map(|(message, _)| message)
}

fn write_target(target: &TypedNode<'_>, out: &mut Transcript) -> Result<(), TranscriptError> {
    let mut body = Transcript::new();
    for message in strings(target.get("ImportedInteractMessage")) {
        body.push(format!("Narrator: {message}"));
    }
    write_field(target.get("ImportedInteractConversation"), &mut body)?;
    write_field(target.get("Outcome"), &mut body)?;
    out.gated(&predicate(target.get("Conditions")), body);
    Ok(())
}

fn write_line(line: &TypedNode<'_>, out: &mut Transcript) -> Result<(), TranscriptError> {
    let speaker = speaker_name(line.get("SpeakerId").as_i64().unwrap_or(0));
    let text = line.str_field("LineText").unwrap_or_default();
    let marker = if line.get("IsPlayerOption").as_bool() { "* " } else { "" };

    let mut body = Transcript::new();
    body.push(format!("{marker}{speaker}: {text}"));
    write_field(line.get("Outcome"), &mut body)?;
    out.gated(&predicate(line.get("Condition")), body);
    Ok(())
}

fn write_outcome(
    node: &TypedNode<'_>,
    kind: OutcomeKind,
    out: &mut Transcript,
) -> Result<(), TranscriptError> {
    match kind {
        OutcomeKind::Wrapper => {
            let mut body = Transcript::new();
            write_field(node.get("Sequence"), &mut body)?;
            write_field(node.get("ActionsList"), &mut body)?;
            out.gated(&predicate(node.get("ActivateCondition")), body);
        }
        OutcomeKind::Sequence => {
            let nodes: Vec<_> = node.get("nodes").nodes().collect();
            for index in ExecutionGraph::from_nodes(&nodes).linearize() {
                write_node(nodes[index], out)?;
            }
        }
        OutcomeKind::Connector => {}
        OutcomeKind::Animation => action(
            out,
            format!(
                "{} plays animation {}",
                text(node, "_targetName"),
                text(node, "_animationName")
            ),
        ),
        OutcomeKind::Conversation => {
            let conversation = node.get("_conversation");
            if conversation.is_missing() {
                action(out, "[deleted conversation]".to_string());
            } else {
                write_field(conversation, out)?;
            }
        }
        OutcomeKind::Counter => action(out, counter_operation(node)),
        OutcomeKind::Move => action(
            out,
            format!(
                "{} moves to {}",
                referent_name(node.get("_hero"), "the current hero"),
                text(node, "_destinationName")
            ),
        ),
        OutcomeKind::Inventory => action(
            out,
            format!(
                "{} item: {}",
                gain_or_lose(node),
                referent_name(node.get("_item"), "[deleted item]")
            ),
        ),
        OutcomeKind::Ability => action(
            out,
            format!(
                "{} ability: {}",
                gain_or_lose(node),
                referent_name(node.get("_ability"), "[deleted ability]")
            ),
        ),
        OutcomeKind::Evidence => action(
            out,
            format!(
                "{} evidence: {}",
                gain_or_lose(node),
                referent_name(node.get("_evidence"), "[deleted evidence]")
            ),
        ),
        OutcomeKind::Scene => {
            let spawn = node.str_field("_spawnPointName").filter(|s| !s.is_empty());
            let line = match spawn {
                Some(spawn) => format!("Change scene to {} at {spawn}", text(node, "_sceneName")),
                None => format!("Change scene to {}", text(node, "_sceneName")),
            };
            action(out, line);
        }
        OutcomeKind::Fade => {
            let line = if node.get("_fadeToBlack").as_bool() {
                "Fade to black"
            } else {
                "Fade in"
            };
            action(out, line.to_string());
        }
        OutcomeKind::Camera => action(
            out,
            format!("Camera focuses on {}", text(node, "_cameraTargetName")),
        ),
        OutcomeKind::Vfx => action(out, format!("Play effect {}", text(node, "_effectName"))),
        OutcomeKind::Ui => {
            let verb = if node.get("_visible").as_bool() {
                "Show"
            } else {
                "Hide"
            };
            action(out, format!("{verb} {}", text(node, "_uiElement")));
        }
        OutcomeKind::Sound => {
            let looping = if node.get("_loop").as_bool() {
                " (looping)"
            } else {
                ""
            };
            action(out, format!("Play sound {}{looping}", text(node, "_clipName")));
        }
        OutcomeKind::Save => action(out, format!("Checkpoint: {}", text(node, "_checkpointName"))),
        OutcomeKind::Trial => {
            let verdict = if node.get("_correct").as_bool() {
                "correct"
            } else {
                "incorrect"
            };
            action(
                out,
                format!(
                    "Trial step {}: {} is {verdict}",
                    text(node, "_trialStep"),
                    referent_name(node.get("_evidence"), "[deleted evidence]")
                ),
            );
        }
        OutcomeKind::Wait => action(out, format!("Wait {} seconds", text(node, "_seconds"))),
        OutcomeKind::SubOutcome => write_field(node.get("_outcome"), out)?,
        OutcomeKind::Narration => {
            for line in strings(node.get("_lines")) {
                out.push(format!("Narrator: {line}"));
            }
        }
        OutcomeKind::HeroSwitch => action(
            out,
            format!(
                "Switch hero to {}",
                referent_name(node.get("_hero"), "[deleted hero]")
            ),
        ),
    }
    Ok(())
}

fn action(out: &mut Transcript, line: String) {
    out.push(format!("*{line}*"));
}

fn gain_or_lose(node: &TypedNode<'_>) -> &'static str {
    if node.get("_add").as_bool() {
        "Gain"
    } else {
        "Lose"
    }
}

/// A simple field as display text.
fn text<'a>(node: &TypedNode<'a>, field: &str) -> Cow<'a, str> {
    match node.get(field).as_value() {
        Some(Value::String(s)) => Cow::Borrowed(s.as_str()),
        Some(Value::Null) | None => Cow::Borrowed("[unset]"),
        Some(other) => Cow::Owned(other.to_string()),
    }
}

/// Non-empty strings in a field holding a string or a list of strings.
fn strings<'a>(field: &Field<'a>) -> Vec<&'a str> {
    let values: Vec<&'a str> = match field.as_value() {
        Some(Value::String(s)) => vec![s.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    values.into_iter().filter(|s| !s.is_empty()).collect()
}

fn referent_name(field: &Field<'_>, deleted: &str) -> String {
    match field {
        Field::Node(node) => node.title().unwrap_or("[unnamed]").to_string(),
        Field::Recursive(key) => key.to_string(),
        _ => deleted.to_string(),
    }
}

// ============================================================================
// Conditions and counters
// ============================================================================

/// Human-readable predicate for one or more conditions; empty when nothing
/// gates.
pub fn predicate(field: &Field<'_>) -> String {
    field
        .nodes()
        .map(condition_text)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" and ")
}

fn condition_text(condition: &TypedNode<'_>) -> String {
    let mut parts = Vec::new();
    if let Some(hero) = condition.get("MustBeHero").as_record() {
        let name = hero.get("m_Name").and_then(Value::as_str).unwrap_or("[unnamed]");
        parts.push(format!("the hero is {name}"));
    }
    for test in condition.get("_counterTests").nodes() {
        parts.push(counter_test_text(test));
    }
    parts.join(" and ")
}

const COMPARISONS: [&str; 6] = [
    "Equals",
    "NotEquals",
    "LessThan",
    "LessThanOrEqual",
    "GreaterThan",
    "GreaterThanOrEqual",
];

fn comparison_name(comparison: i64) -> Cow<'static, str> {
    usize::try_from(comparison)
        .ok()
        .and_then(|index| COMPARISONS.get(index))
        .map(|name| Cow::Borrowed(*name))
        .unwrap_or_else(|| Cow::Owned(format!("Comparison{comparison}")))
}

fn counter_test_text(test: &TypedNode<'_>) -> String {
    let counter = test.get("_counter");
    let name = counter_name(counter);
    let value = test.get("_value").as_i64().unwrap_or(0);
    let comparison = test.get("_comparison").as_i64().unwrap_or(0);

    if is_boolean_counter(counter) {
        match comparison {
            0 => return format!("{name} is {}", truth(value != 0)),
            1 => return format!("{name} is {}", truth(value == 0)),
            _ => {}
        }
    }
    format!("{name} {} {value}", comparison_name(comparison))
}

fn counter_operation(node: &TypedNode<'_>) -> String {
    let counter = node.get("_counter");
    let name = counter_name(counter);
    let value = node.get("_value").as_i64().unwrap_or(0);
    let operation = node.get("_operation").as_i64().unwrap_or(0);

    // Set, Add, Subtract, Toggle
    match operation {
        0 if is_boolean_counter(counter) => format!("Set {name} to {}", truth(value != 0)),
        0 => format!("Set {name} to {value}"),
        1 => format!("Add {value} to {name}"),
        2 => format!("Subtract {value} from {name}"),
        3 => format!("Toggle {name}"),
        _ => format!("Counter operation {operation} on {name} with {value}"),
    }
}

fn counter_name(field: &Field<'_>) -> String {
    match field {
        Field::Node(node) => node.str_field("m_Name").unwrap_or("[unnamed counter]").to_string(),
        Field::Recursive(key) => key.to_string(),
        _ => "[deleted counter]".to_string(),
    }
}

/// Counters bounded to 0..=1 are flags.
fn is_boolean_counter(field: &Field<'_>) -> bool {
    field.as_node().is_some_and(|counter| {
        counter.get("_minValue").as_i64() == Some(0) && counter.get("_maxValue").as_i64() == Some(1)
    })
}

fn truth(flag: bool) -> &'static str {
    if flag {
        "True"
    } else {
        "False"
    }
}
