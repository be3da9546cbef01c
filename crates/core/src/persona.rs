//! Persona instruction: the fixed system-level directive sent with every
//! completion.
//!
//! Built once at startup from the knowledge document and never recomputed.
//! Sections are wrapped in XML-style tags so the model can tell the persona,
//! the data, and the rules apart:
//!
//! ```text
//! <identity>   who the assistant is and whom it represents
//! <knowledge>  the document, serialized verbatim
//! <rules>      answer-only-from-data, fallback contact, extra rules
//! <tone>       register to answer in
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::KnowledgeError;
use crate::knowledge::KnowledgeDocument;

/// The assembled instruction. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaInstruction {
    text: String,
    fallback_contact: String,
}

impl PersonaInstruction {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The address unanswerable questions are referred to.
    pub fn fallback_contact(&self) -> &str {
        &self.fallback_contact
    }

    /// Rough token estimate (4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.text.len() / 4
    }
}

impl std::fmt::Display for PersonaInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Composes a [`PersonaInstruction`] from a knowledge document.
#[derive(Debug, Clone)]
pub struct PersonaBuilder {
    role: String,
    organization: Option<String>,
    tone: String,
    rules: Vec<String>,
}

impl Default for PersonaBuilder {
    fn default() -> Self {
        Self {
            role: "Admissions Assistant".into(),
            organization: None,
            tone: "Professional, helpful, and concise.".into(),
            rules: Vec::new(),
        }
    }
}

impl PersonaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// The assistant's title, e.g. "Admissions Assistant".
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    /// Whom the assistant speaks for. Falls back to the document's `name` field.
    pub fn organization(mut self, organization: Option<String>) -> Self {
        self.organization = organization;
        self
    }

    pub fn tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    /// Extra behavioural rules, appended after the built-in ones in order.
    pub fn rules(mut self, rules: Vec<String>) -> Self {
        self.rules = rules;
        self
    }

    /// Build the instruction. Pure: the same document always yields the same text.
    pub fn build(&self, doc: &KnowledgeDocument) -> PersonaInstruction {
        let organization = self
            .organization
            .clone()
            .or_else(|| doc.field("name").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| "the organization".into());
        let contact = doc.fallback_contact();

        let mut text = String::with_capacity(1024);

        push_section(
            &mut text,
            "identity",
            &format!("You are the official {} for {}.", self.role, organization),
        );

        push_section(
            &mut text,
            "knowledge",
            &format!(
                "Answer questions strictly based on this data:\n{}",
                doc.to_pretty_json()
            ),
        );

        let mut rules = vec![
            "Answer only from the data above. Never invent names, numbers, dates, or fees."
                .to_string(),
            format!(
                "If the data does not contain the answer, say so and refer them to {contact}."
            ),
        ];
        rules.extend(self.rules.iter().map(|r| r.trim().to_string()).filter(|r| !r.is_empty()));
        let rules = rules
            .iter()
            .map(|r| format!("- {r}"))
            .collect::<Vec<_>>()
            .join("\n");
        push_section(&mut text, "rules", &rules);

        push_section(&mut text, "tone", &format!("Tone: {}", self.tone));

        debug!(
            chars = text.len(),
            fallback_contact = %contact,
            "Persona instruction built"
        );

        PersonaInstruction {
            text,
            fallback_contact: contact.to_string(),
        }
    }

    /// Validate a raw document tree and build from it.
    ///
    /// Fails with `MissingField` when `contact_info.emails[0]` is absent.
    pub fn build_from_value(&self, root: Value) -> Result<PersonaInstruction, KnowledgeError> {
        let doc = KnowledgeDocument::from_value(root)?;
        Ok(self.build(&doc))
    }
}

fn push_section(prompt: &mut String, tag: &str, body: &str) {
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    prompt.push_str(&format!("<{tag}>\n"));
    prompt.push_str(body.trim());
    prompt.push_str(&format!("\n</{tag}>\n"));
}
