//! Parsing the model reply into its three labelled sections.
//!
//! ## Grammar
//!
//! ```text
//! reply   := noise? (anchor body)*
//! anchor  := "[Summary]" | "[Key Findings]" | "[Recommended Actions]"
//! ```
//!
//! Anchors match ASCII case-insensitively. A section's body starts after the
//! first occurrence of its anchor and ends at the nearest following
//! occurrence of any anchor (or the end of the reply). Bodies are trimmed.
//! Output is always rendered in the fixed order Summary, Key Findings,
//! Recommended Actions, whatever order the model used.

use crate::error::MedExplainError;
use crate::pipeline::postprocess::clean_reply;
use serde::Serialize;

/// Shown when a reply contains none of the three sections.
pub const FALLBACK_NOTICE: &str = "Could not parse response. Please try again.";

/// Which of the three sections an anchor introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Summary,
    Findings,
    Actions,
}

impl Section {
    const ALL: [Section; 3] = [Section::Summary, Section::Findings, Section::Actions];

    fn anchor(self) -> &'static str {
        match self {
            Section::Summary => "[Summary]",
            Section::Findings => "[Key Findings]",
            Section::Actions => "[Recommended Actions]",
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Section::Summary => "Summary",
            Section::Findings => "Key Findings",
            Section::Actions => "Recommended Actions",
        }
    }
}

/// The structured form of a model reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedAnswer {
    pub summary: Option<String>,
    pub findings: Option<String>,
    pub actions: Option<String>,
}

impl ParsedAnswer {
    /// True when no section was found.
    pub fn is_unparseable(&self) -> bool {
        self.summary.is_none() && self.findings.is_none() && self.actions.is_none()
    }

    /// `Err(UnparseableReply)` when no section was found.
    pub fn into_result(self) -> Result<Self, MedExplainError> {
        if self.is_unparseable() {
            Err(MedExplainError::UnparseableReply)
        } else {
            Ok(self)
        }
    }

    fn get(&self, section: Section) -> Option<&str> {
        match section {
            Section::Summary => self.summary.as_deref(),
            Section::Findings => self.findings.as_deref(),
            Section::Actions => self.actions.as_deref(),
        }
    }

    /// Bold heading plus body for each present section, blank-line separated.
    ///
    /// An unparseable answer renders as [`FALLBACK_NOTICE`].
    pub fn render(&self) -> String {
        if self.is_unparseable() {
            return FALLBACK_NOTICE.to_string();
        }
        Section::ALL
            .iter()
            .filter_map(|&s| self.get(s).map(|body| format!("**{}**\n{}", s.heading(), body)))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Parse a raw reply into its sections.
pub fn parse_reply(reply: &str) -> ParsedAnswer {
    let cleaned = clean_reply(reply);
    let lower = cleaned.to_ascii_lowercase();

    // (section, anchor start, body start) for each anchor's first occurrence.
    let firsts: Vec<(Section, usize, usize)> = Section::ALL
        .iter()
        .filter_map(|&s| {
            let anchor = s.anchor().to_ascii_lowercase();
            lower.find(&anchor).map(|pos| (s, pos, pos + anchor.len()))
        })
        .collect();

    // Every anchor occurrence, so a repeated label still ends the body before it.
    let mut boundaries: Vec<usize> = Section::ALL
        .iter()
        .flat_map(|s| {
            let anchor = s.anchor().to_ascii_lowercase();
            lower
                .match_indices(anchor.as_str())
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        })
        .collect();
    boundaries.sort_unstable();

    let mut answer = ParsedAnswer::default();
    for (section, _, body_start) in firsts {
        let end = boundaries
            .iter()
            .copied()
            .find(|&b| b >= body_start)
            .unwrap_or(cleaned.len());
        let body = cleaned[body_start..end].trim().to_string();
        match section {
            Section::Summary => answer.summary = Some(body),
            Section::Findings => answer.findings = Some(body),
            Section::Actions => answer.actions = Some(body),
        }
    }
    answer
}

/// Parse and render a raw reply. Never fails.
pub fn parse(reply: &str) -> String {
    parse_reply(reply).render()
}
