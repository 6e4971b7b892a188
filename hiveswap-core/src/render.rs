//! Rendering interface shared by the transcript and dict back ends.

use crate::node::{Field, TypedNode};
use crate::project::DictProjector;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Errors from transcript rendering.
#[derive(Debug, Error)]
pub enum TranscriptError {
    /// The data took a shape the renderer refuses to guess about.
    #[error("transcript invariant violated at {node}: {message}")]
    Invariant { node: String, message: String },
}

/// Both back ends over one node tree.
pub trait Renderable {
    /// Nested plain JSON with every node unwrapped.
    fn to_dict(&self) -> Value;

    /// Append this value's narrative lines to `out`.
    fn write_transcript(&self, out: &mut Transcript) -> Result<(), TranscriptError>;

    /// The narrative lines on their own.
    fn transcript_body(&self) -> Result<Transcript, TranscriptError> {
        let mut out = Transcript::new();
        self.write_transcript(&mut out)?;
        Ok(out)
    }
}

impl Renderable for TypedNode<'_> {
    fn to_dict(&self) -> Value {
        DictProjector::new().project_root(self)
    }

    fn write_transcript(&self, out: &mut Transcript) -> Result<(), TranscriptError> {
        crate::transcript::write_node(self, out)
    }
}

impl Renderable for Field<'_> {
    fn to_dict(&self) -> Value {
        DictProjector::new().project_field(self)
    }

    fn write_transcript(&self, out: &mut Transcript) -> Result<(), TranscriptError> {
        crate::transcript::write_field(self, out)
    }
}

/// An ordered list of transcript lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn blank(&mut self) {
        self.lines.push(String::new());
    }

    pub fn append(&mut self, other: Transcript) {
        self.lines.extend(other.lines);
    }

    /// Append `body` as a block gated by `predicate`.
    ///
    /// An empty predicate appends the body unchanged; an empty body appends
    /// nothing.
    pub fn gated(&mut self, predicate: &str, body: Transcript) {
        if body.is_empty() {
            return;
        }
        if predicate.is_empty() {
            self.append(body);
            return;
        }
        self.push(format!("**If** {predicate}:"));
        for line in body.lines {
            if line.is_empty() {
                self.push(">");
            } else {
                self.push(format!("> {line}"));
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// The lines joined with newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl From<Vec<String>> for Transcript {
    fn from(lines: Vec<String>) -> Self {
        Self { lines }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(lines: &[&str]) -> Transcript {
        Transcript::from(lines.iter().map(|line| line.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_gated_wraps_body() {
        let mut out = Transcript::new();
        out.gated("Met Joey is True", body(&["Narrator: Hi.", "", "*Wait 2 seconds*"]));
        assert_eq!(
            out.lines(),
            &[
                "**If** Met Joey is True:",
                "> Narrator: Hi.",
                ">",
                "> *Wait 2 seconds*"
            ]
        );
    }

    #[test]
    fn test_empty_predicate_is_unwrapped() {
        let mut out = Transcript::new();
        out.gated("", body(&["Narrator: Hi."]));
        assert_eq!(out.lines(), &["Narrator: Hi."]);
    }

    #[test]
    fn test_empty_body_emits_nothing() {
        let mut out = Transcript::new();
        out.gated("Met Joey is True", Transcript::new());
        assert!(out.is_empty());
    }

    #[test]
    fn test_text_joins_lines() {
        assert_eq!(body(&["a", "b"]).text(), "a\nb");
        assert_eq!(body(&["a", "b"]).to_string(), "a\nb");
    }
}
