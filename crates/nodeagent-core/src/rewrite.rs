//! # Identity Rewriter
//!
//! Translates contact and project identities between the names an
//! intelligent agent uses and the names the telescope knows.
//!
//! | Direction | Lookup | Used for |
//! |-----------|--------|----------|
//! | [`Direction::Inbound`] | alias key → value | requests on their way to the TEA |
//! | [`Direction::Outbound`] | alias value → key | updates on their way back to the agent |
//!
//! An identity with no alias is left alone. Each identity that is replaced
//! gets one history entry recording the new name.

use std::fmt;
use std::sync::Arc;

use nodeagent_rtml::RtmlDocument;
use nodeagent_store::AliasStore;
use tracing::debug;

use crate::error::{GatewayError, Result};

/// URI the node agent signs history entries with.
pub const NODE_AGENT_URI: &str = "urn:/node_agent";

/// Which way identities are translated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// External to internal.
    Inbound,
    /// Internal to external.
    Outbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbound => f.write_str("inbound"),
            Self::Outbound => f.write_str("outbound"),
        }
    }
}

/// Alias-driven identity translation.
#[derive(Debug, Clone)]
pub struct IdentityRewriter {
    users: Arc<AliasStore>,
    projects: Arc<AliasStore>,
    agent_name: String,
}

impl IdentityRewriter {
    /// Creates a rewriter over the user and project alias stores.
    pub fn new(users: Arc<AliasStore>, projects: Arc<AliasStore>, agent_name: impl Into<String>) -> Self {
        Self {
            users,
            projects,
            agent_name: agent_name.into(),
        }
    }

    /// Returns a rewritten copy of `document`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::MalformedDocument`] if the document has no
    /// contact, no project, or an empty user or project identity.
    pub fn rewrite(&self, document: &RtmlDocument, direction: Direction) -> Result<RtmlDocument> {
        if !document.has_contact() {
            return Err(malformed("No Contact in received document"));
        }
        if !document.has_project() {
            return Err(malformed("No Project in received document"));
        }
        let Some(user) = document.contact_user() else {
            return Err(malformed("No User in Contact in received document"));
        };
        let Some(project) = document.project() else {
            return Err(malformed("No Project in Project in received document"));
        };

        let user_alias = self.translate(&self.users, user, direction);
        let project_alias = self.translate(&self.projects, project, direction);

        let mut rewritten = document.clone();
        if let Some(alias) = user_alias {
            debug!(direction = %direction, from = %user, to = %alias, "rewriting contact");
            rewritten.set_contact_user(&alias);
            rewritten.add_history_entry(
                &self.agent_name,
                NODE_AGENT_URI,
                &format!("rewritten contact to {}", alias),
            );
        }
        if let Some(alias) = project_alias {
            debug!(direction = %direction, from = %project, to = %alias, "rewriting project");
            rewritten.set_project(&alias);
            rewritten.add_history_entry(
                &self.agent_name,
                NODE_AGENT_URI,
                &format!("rewritten project to {}", alias),
            );
        }
        Ok(rewritten)
    }

    fn translate(&self, store: &AliasStore, identity: &str, direction: Direction) -> Option<String> {
        let alias = match direction {
            Direction::Inbound => store.resolve(identity),
            Direction::Outbound => store.reverse(identity),
        };
        if alias.is_none() {
            debug!(store = %store.label(), direction = %direction, identity = %identity, "no alias");
        }
        alias.map(str::to_string)
    }

    /// Checks that the authenticated caller is the document's contact.
    ///
    /// Only `header_username` is alias-resolved; the document is expected
    /// to have been rewritten inbound already.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::IdentityMismatch`] if the document has no
    /// contact user, the header user resolves to an empty name, or the two
    /// differ.
    pub fn match_identity(&self, header_username: &str, document: &RtmlDocument) -> Result<()> {
        if !document.has_contact() {
            return Err(mismatch("No Contact in received document".to_string()));
        }
        let Some(document_user) = document.contact_user() else {
            return Err(mismatch("RTML username was null".to_string()));
        };
        let resolved = self.users.resolve(header_username).unwrap_or(header_username);
        if resolved.is_empty() {
            return Err(mismatch(format!(
                "header username {} could not be resolved",
                header_username
            )));
        }
        debug!(header = %header_username, resolved = %resolved, document = %document_user, "matching identity");
        if resolved != document_user {
            return Err(mismatch(format!(
                "unaliased header username {} does not match RTML username {}",
                resolved, document_user
            )));
        }
        Ok(())
    }
}

fn malformed(message: &str) -> GatewayError {
    GatewayError::MalformedDocument(message.to_string())
}

fn mismatch(message: String) -> GatewayError {
    GatewayError::IdentityMismatch(message)
}
