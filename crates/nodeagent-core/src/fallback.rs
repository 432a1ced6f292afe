//! # Error Fallback Chain
//!
//! Turns any pipeline failure into a reply the caller can parse.
//!
//! | Tier | Source | Keeps |
//! |------|--------|-------|
//! | [`FallbackTier::Original`] | the caller's own input, reparsed | everything the caller sent |
//! | [`FallbackTier::Scratch`] | a fresh RTML 2.2 document | nothing |
//! | [`FallbackTier::LastResort`] | a fixed string template | nothing |
//!
//! The last tier does not touch the document model at all, since the
//! document model may be what failed.

use nodeagent_rtml::{RtmlDocument, DOC_TYPE, RTML_VERSION_22, XML_HEADER};
use quick_xml::escape::escape;
use tracing::error;

use crate::rewrite::NODE_AGENT_URI;

/// Suffix of the error string of a scratch-built reject.
pub const BADLY_FORMATTED_SUFFIX: &str = " : badly formatted rtml received";

const LAST_RESORT_PREFIX: &str = "<RTML type=\"reject\" version=\"2.2\">";
const LAST_RESORT_POSTFIX: &str = "</RTML> ";

/// Which tier produced an error reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackTier {
    /// The caller's document, marked as rejected.
    Original,
    /// A minimal document built from scratch.
    Scratch,
    /// The fixed string template.
    LastResort,
}

/// An error reply and the tier that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReply {
    /// Tier that produced the reply.
    pub tier: FallbackTier,
    /// Serialized reply.
    pub xml: String,
}

/// Builds reject replies.
#[derive(Debug, Clone)]
pub struct FallbackChain {
    agent_name: String,
}

impl FallbackChain {
    /// Creates a chain signing history entries as `agent_name`.
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    /// Serialized reject reply. Never fails.
    pub fn reply(&self, message: &str, raw_input: &str) -> ErrorReply {
        if let Some(document) = self.from_original(message, raw_input) {
            match document.to_xml_string() {
                Ok(xml) => {
                    error!(tier = "original", error = %message, "returning reject built from received document");
                    return ErrorReply {
                        tier: FallbackTier::Original,
                        xml,
                    };
                }
                Err(err) => {
                    error!(error = %err, "failed to serialize reject built from received document");
                }
            }
        }

        match self.from_scratch(message).to_xml_string() {
            Ok(xml) => {
                error!(tier = "scratch", error = %message, "returning reject built from scratch");
                ErrorReply {
                    tier: FallbackTier::Scratch,
                    xml,
                }
            }
            Err(err) => {
                error!(tier = "last_resort", error = %message, cause = %err, "returning last resort reject");
                ErrorReply {
                    tier: FallbackTier::LastResort,
                    xml: last_resort_document(message),
                }
            }
        }
    }

    fn from_original(&self, message: &str, raw_input: &str) -> Option<RtmlDocument> {
        let mut document = RtmlDocument::parse(raw_input).ok()?;
        document.set_reject();
        document.set_error_string(message);
        document.add_history_error(&self.agent_name, NODE_AGENT_URI, message, message);
        Some(document)
    }

    fn from_scratch(&self, message: &str) -> RtmlDocument {
        let mut document = RtmlDocument::new(RTML_VERSION_22);
        document.set_reject();
        document.set_error_string(&format!("{}{}", message, BADLY_FORMATTED_SUFFIX));
        document.add_history_error(
            &self.agent_name,
            NODE_AGENT_URI,
            message,
            BADLY_FORMATTED_SUFFIX.trim_start_matches(" : "),
        );
        document
    }
}

/// Fixed-template reject document carrying `message`.
///
/// Markup characters in `message` are escaped so the result stays
/// well-formed.
pub fn last_resort_document(message: &str) -> String {
    format!(
        "{}{}{}{}{}",
        XML_HEADER,
        DOC_TYPE,
        LAST_RESORT_PREFIX,
        escape(message),
        LAST_RESORT_POSTFIX
    )
}
