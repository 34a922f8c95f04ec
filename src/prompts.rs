//! The prompt sent with every question.
//!
//! The instruction text fixes the reply grammar that [`crate::answer`] parses:
//! three bracket-labelled sections in a fixed order. Changing a label here
//! means changing the anchors there.
//!
//! Only a prefix of the document is embedded. The cut is a hard character
//! cut, not a semantic boundary, so long reports silently lose their tail.

use crate::config::DEFAULT_EXCERPT_CHARS;

/// Instruction block placed before the document excerpt.
pub const INSTRUCTIONS: &str = r#"You are a medical report interpreter. Respond ONLY in this format:

[Summary]
- Concise 2-3 line summary
- Focus on main concerns

[Key Findings]
- Bullet points of notable results
- Highlight abnormal values with ⚠️
- Include normal ranges

[Recommended Actions]
- Suggest next steps
- List specialist referrals if needed
- Reminder to consult doctor

Do NOT include:
- Your thought process
- Disclaimers
- Explanations
- Markdown formatting"#;

/// One question about one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// At most `max_chars` characters from the start of the document text.
    pub document_excerpt: String,
    pub question: String,
}

impl Prompt {
    /// Build a prompt, truncating `text` to `max_chars` characters.
    ///
    /// `max_chars` above the 6000-character cap is lowered to the cap.
    pub fn new(text: &str, question: &str, max_chars: usize) -> Self {
        Self {
            document_excerpt: excerpt(text, max_chars.min(DEFAULT_EXCERPT_CHARS)).to_string(),
            question: question.to_string(),
        }
    }

    /// The full prompt string.
    pub fn render(&self) -> String {
        format!(
            "{INSTRUCTIONS}\n\nDocument:\n{}\n\nQuestion: {}\n\nResponse:",
            self.document_excerpt, self.question
        )
    }
}

/// Render the prompt for `question` over the first 6000 characters of `text`.
pub fn build_prompt(text: &str, question: &str) -> String {
    Prompt::new(text, question, DEFAULT_EXCERPT_CHARS).render()
}

/// The first `max_chars` characters of `text`, cut on a character boundary.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
