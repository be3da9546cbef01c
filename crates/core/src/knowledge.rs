//! Knowledge document: the static facts the assistant answers from.
//!
//! Loaded once at startup from a JSON (or TOML) file and never mutated.
//! The only structural requirement is a non-empty `contact_info.emails`
//! list; its first entry becomes the fallback contact the assistant refers
//! people to when the document does not cover a question. That requirement is
//! checked here, at load time, so prompt construction never has to guess.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::KnowledgeError;

/// Dotted path of the required contact list.
pub const CONTACT_EMAILS_FIELD: &str = "contact_info.emails";

/// An immutable, validated knowledge document.
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocument {
    root: Value,
    fallback_contact: String,
}

impl KnowledgeDocument {
    /// Load and validate a document from disk.
    ///
    /// Files ending in `.toml` are parsed as TOML; anything else as JSON.
    pub fn load(path: &Path) -> Result<Self, KnowledgeError> {
        if !path.exists() {
            return Err(KnowledgeError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| KnowledgeError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let parse_error = |reason: String| KnowledgeError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let root: Value = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => {
                let table: toml::Value =
                    toml::from_str(&content).map_err(|e| parse_error(e.to_string()))?;
                serde_json::to_value(table).map_err(|e| parse_error(e.to_string()))?
            }
            _ => serde_json::from_str(&content).map_err(|e| parse_error(e.to_string()))?,
        };

        if !root.is_object() {
            return Err(parse_error("top level must be an object".into()));
        }

        let doc = Self::from_value(root)?;

        debug!(
            path = %path.display(),
            bytes = content.len(),
            fallback_contact = %doc.fallback_contact,
            "Knowledge document loaded"
        );

        Ok(doc)
    }

    /// Validate an in-memory document.
    pub fn from_value(root: Value) -> Result<Self, KnowledgeError> {
        let fallback_contact = root
            .pointer("/contact_info/emails/0")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| KnowledgeError::MissingField {
                field: format!("{CONTACT_EMAILS_FIELD}[0]"),
            })?
            .to_string();

        Ok(Self {
            root,
            fallback_contact,
        })
    }

    /// Parse and validate a JSON string (used by tests and tooling).
    pub fn from_json_str(json: &str) -> Result<Self, KnowledgeError> {
        let root = serde_json::from_str(json).map_err(|e| KnowledgeError::Parse {
            path: PathBuf::from("<inline>"),
            reason: e.to_string(),
        })?;
        Self::from_value(root)
    }

    /// The first contact email; where unanswerable questions are referred.
    pub fn fallback_contact(&self) -> &str {
        &self.fallback_contact
    }

    /// Look up a field by dotted path, e.g. `"fees.btech"`.
    pub fn field(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.root, |node, key| node.get(key))
    }

    /// Pretty-printed JSON, in the document's own key order.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| self.root.to_string())
    }
}
