//! One user's conversation about one document.
//!
//! A [`Session`] owns the extracted text and the chat history. The pipeline,
//! prompt builder and parser it calls are stateless; nothing here is global.
//! A failed extraction or completion leaves the session as it was, so the
//! next action (new document, new question) always works.

use crate::answer::{parse_reply, ParsedAnswer, FALLBACK_NOTICE};
use crate::completion::CompletionClient;
use crate::config::{CompletionConfig, DEFAULT_EXCERPT_CHARS};
use crate::document::{ExtractedText, SourceDocument};
use crate::error::MedExplainError;
use crate::extract::{Extraction, ExtractionPipeline};
use crate::prompts::Prompt;
use serde::Serialize;
use tracing::{info, warn};

/// Opening assistant message.
pub const GREETING: &str = "Upload a medical report and ask questions about:\n\n\
- Test results\n\
- Scan findings\n\
- Medication lists\n\
- Doctor's notes";

/// Assistant reply when the completion request fails.
pub const ERROR_REPLY: &str = "Error generating response. Please try again.";

/// Shown alongside every answer.
pub const DISCLAIMER: &str =
    "⚠️ This tool provides general explanations and does not replace professional medical advice.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The outcome of one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub question: String,
    /// Parsed sections; `None` when the request failed or the reply had no
    /// recognised section.
    pub answer: Option<ParsedAnswer>,
    /// The text shown to the user.
    pub rendered: String,
    /// Why no answer could be produced, if none was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Conversation state: the loaded document text and the message history.
#[derive(Debug, Clone)]
pub struct Session {
    document: Option<ExtractedText>,
    document_name: Option<String>,
    messages: Vec<Turn>,
    excerpt_chars: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            document: None,
            document_name: None,
            messages: vec![Turn::assistant(GREETING)],
            excerpt_chars: DEFAULT_EXCERPT_CHARS,
        }
    }

    /// Session whose prompts follow `config`.
    pub fn with_config(config: &CompletionConfig) -> Self {
        Self::new().with_excerpt_chars(config.excerpt_chars)
    }

    /// Embed at most `chars` characters of the document in each prompt.
    pub fn with_excerpt_chars(mut self, chars: usize) -> Self {
        self.excerpt_chars = chars.clamp(1, DEFAULT_EXCERPT_CHARS);
        self
    }

    pub fn excerpt_chars(&self) -> usize {
        self.excerpt_chars
    }

    pub fn messages(&self) -> &[Turn] {
        &self.messages
    }

    pub fn document(&self) -> Option<&ExtractedText> {
        self.document.as_ref()
    }

    pub fn document_name(&self) -> Option<&str> {
        self.document_name.as_deref()
    }

    /// Extract `doc` and keep its text for later questions.
    ///
    /// The previously loaded document is replaced only when the new one
    /// yields text; the history then restarts from the greeting.
    pub fn load_document(
        &mut self,
        pipeline: &ExtractionPipeline,
        doc: &SourceDocument,
    ) -> Result<Extraction, MedExplainError> {
        doc.check_size()?;

        let extraction = pipeline.extract(&doc.bytes, &doc.media_type);
        self.store(doc, extraction)
    }

    /// [`load_document`](Self::load_document) with extraction on the blocking pool.
    pub async fn load_document_async(
        &mut self,
        pipeline: &ExtractionPipeline,
        doc: &SourceDocument,
    ) -> Result<Extraction, MedExplainError> {
        doc.check_size()?;

        let extraction = pipeline
            .extract_blocking(doc.bytes.clone(), doc.media_type.clone())
            .await?;
        self.store(doc, extraction)
    }

    fn store(&mut self, doc: &SourceDocument, extraction: Extraction) -> Result<Extraction, MedExplainError> {
        if let Some(reason) = extraction.failure_message() {
            warn!("{}: {}", doc.name, reason);
            return Err(MedExplainError::DocumentUnreadable { reason });
        }

        info!(
            "Loaded {} ({} chars of text)",
            doc.name,
            extraction.text.char_count()
        );
        self.document = Some(extraction.text.clone());
        self.document_name = Some(doc.name.clone());
        self.messages = vec![Turn::assistant(GREETING)];
        Ok(extraction)
    }

    /// Forget the document and reset the history to the greeting.
    pub fn clear_document(&mut self) {
        self.document = None;
        self.document_name = None;
        self.messages = vec![Turn::assistant(GREETING)];
    }

    /// Ask one question about the loaded document.
    ///
    /// Returns the rendered answer. A failed completion request is not an
    /// error here: the reply is [`ERROR_REPLY`] and it is recorded in the
    /// history like any other answer.
    pub async fn ask(
        &mut self,
        client: &dyn CompletionClient,
        question: &str,
    ) -> Result<String, MedExplainError> {
        self.ask_detailed(client, question).await.map(|r| r.rendered)
    }

    /// Like [`ask`](Self::ask), keeping the parsed sections and any error.
    pub async fn ask_detailed(
        &mut self,
        client: &dyn CompletionClient,
        question: &str,
    ) -> Result<Reply, MedExplainError> {
        let text = self.document.as_ref().ok_or(MedExplainError::NoDocumentLoaded)?;

        let prompt = Prompt::new(text.as_str(), question, self.excerpt_chars).render();
        self.messages.push(Turn::user(question));

        let reply = match client.complete(&prompt).await {
            Ok(raw) => match parse_reply(&raw).into_result() {
                Ok(parsed) => Reply {
                    question: question.to_string(),
                    rendered: parsed.render(),
                    answer: Some(parsed),
                    error: None,
                },
                Err(e) => {
                    warn!("{e}");
                    Reply {
                        question: question.to_string(),
                        answer: None,
                        rendered: FALLBACK_NOTICE.to_string(),
                        error: Some(e.to_string()),
                    }
                }
            },
            Err(e) => {
                warn!("Question not answered: {e}");
                Reply {
                    question: question.to_string(),
                    answer: None,
                    rendered: ERROR_REPLY.to_string(),
                    error: Some(e.to_string()),
                }
            }
        };

        self.messages.push(Turn::assistant(reply.rendered.clone()));
        Ok(reply)
    }
}
