//! # RTML Document
//!
//! Typed view over an RTML element tree.
//!
//! Two protocol versions are understood:
//!
//! | Version | Kind attribute | Callback address | Contact location |
//! |---------|----------------|------------------|------------------|
//! | `2.2` | `type` | `IntelligentAgent@host` + `@port` | `RTML/Contact/User` |
//! | `3.1a` | `mode` | `IntelligentAgent@uri` | `RTML/Project/Contact/Username` |
//!
//! Both contact layouts are accepted regardless of the declared version.
//!
//! `RtmlDocument` has value semantics: cloning copies the whole tree, so a
//! rewritten copy can never alias the document it was derived from.

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::charset::{decode_document, encode_document};
use crate::element::{parse_tree, write_tree, Element};
use crate::error::{Result, RtmlError};

/// XML declaration emitted ahead of every serialized document.
pub const XML_HEADER: &str = "<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>";

/// DOCTYPE declaration emitted ahead of every serialized document.
pub const DOC_TYPE: &str =
    "<!DOCTYPE RTML SYSTEM \"http://www.estar.org.uk/documents/rtml2.2.dtd\">";

/// Version string of RTML 2.2 documents.
pub const RTML_VERSION_22: &str = "2.2";

/// Version string of RTML 3.1a documents.
pub const RTML_VERSION_31: &str = "3.1a";

const ROOT: &str = "RTML";

/// Declared intent of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    /// Ask the telescope to score (rate the feasibility of) an observation.
    ScoreRequest,
    /// Submit an observation request.
    Request,
    /// Abort a previously submitted request.
    Abort,
    /// Progress or completion notice for an accepted request.
    Update,
    /// Anything else, including rejects and confirmations.
    Unknown,
}

impl DocumentKind {
    /// Classifies a `type`/`mode` attribute value.
    pub fn from_type_attribute(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "score" => Self::ScoreRequest,
            "request" => Self::Request,
            "abort" => Self::Abort,
            "update" | "observation" | "complete" | "incomplete" | "fail" => Self::Update,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScoreRequest => write!(f, "score request"),
            Self::Request => write!(f, "request"),
            Self::Abort => write!(f, "abort"),
            Self::Update => write!(f, "update"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Protocol version of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RtmlVersion {
    /// RTML 2.2: callbacks addressed by host and port.
    V22,
    /// RTML 3.1a: callbacks addressed by URI.
    V31,
    /// Missing or unrecognised version attribute.
    Unknown(String),
}

impl fmt::Display for RtmlVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V22 => f.write_str(RTML_VERSION_22),
            Self::V31 => f.write_str(RTML_VERSION_31),
            Self::Unknown(raw) => write!(f, "'{}'", raw),
        }
    }
}

/// Return address of the agent that submitted a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelligentAgent {
    /// Agent-side identifier of the request.
    pub id: String,
    /// Callback host (2.2).
    pub hostname: Option<String>,
    /// Callback port (2.2); zero when absent or unparsable.
    pub port: u16,
    /// Callback URI (3.1a).
    pub uri: Option<String>,
}

impl IntelligentAgent {
    fn from_element(element: &Element) -> Self {
        let hostname = element
            .attribute("host")
            .or_else(|| element.attribute("hostname"))
            .map(str::to_string);
        let port = element
            .attribute("port")
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(0);
        Self {
            id: element.text.clone(),
            hostname,
            port,
            uri: element.attribute("uri").map(str::to_string),
        }
    }

    fn to_element(&self) -> Element {
        let mut element = Element::with_text("IntelligentAgent", self.id.clone());
        if let Some(host) = &self.hostname {
            element.set_attribute("host", host.clone());
        }
        if self.port != 0 {
            element.set_attribute("port", self.port.to_string());
        }
        if let Some(uri) = &self.uri {
            element.set_attribute("uri", uri.clone());
        }
        element
    }
}

/// One entry of a document's history trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// RFC 3339 timestamp, when recorded.
    pub timestamp: Option<String>,
    /// Name of the agent that added the entry.
    pub agent_name: String,
    /// URI of the agent that added the entry.
    pub agent_uri: String,
    /// Free-text description.
    pub description: String,
    /// Error message for failure entries.
    pub error: Option<String>,
}

/// An RTML document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtmlDocument {
    root: Element,
}

impl RtmlDocument {
    /// Creates an empty document of the given version.
    pub fn new(version: &str) -> Self {
        Self {
            root: Element::new(ROOT).attr("version", version),
        }
    }

    /// Parses a document from its XML text.
    ///
    /// # Errors
    ///
    /// Fails for empty input, malformed XML, or a root other than `<RTML>`.
    pub fn parse(input: &str) -> Result<Self> {
        Self::from_element(parse_tree(input.trim())?)
    }

    /// Parses a document received as bytes, honouring its declared encoding.
    ///
    /// # Errors
    ///
    /// As [`parse`](Self::parse).
    pub fn parse_bytes(input: &[u8]) -> Result<Self> {
        Self::parse(&decode_document(input))
    }

    /// Wraps an existing element tree.
    ///
    /// # Errors
    ///
    /// Returns [`RtmlError::NotRtml`] if the root is not `<RTML>`.
    pub fn from_element(root: Element) -> Result<Self> {
        if root.name != ROOT {
            return Err(RtmlError::NotRtml(root.name));
        }
        Ok(Self { root })
    }

    /// Serializes the document, header and DOCTYPE included.
    ///
    /// # Errors
    ///
    /// Returns [`RtmlError::EmptyElementName`] if the tree is corrupt.
    pub fn to_xml_string(&self) -> Result<String> {
        let mut out = String::with_capacity(512);
        out.push_str(XML_HEADER);
        out.push('\n');
        out.push_str(DOC_TYPE);
        out.push('\n');
        write_tree(&self.root, &mut out)?;
        Ok(out)
    }

    /// Serializes the document to ISO-8859-1 bytes, the encoding named by
    /// [`XML_HEADER`].
    ///
    /// # Errors
    ///
    /// As [`to_xml_string`](Self::to_xml_string).
    pub fn to_xml_bytes(&self) -> Result<Vec<u8>> {
        Ok(encode_document(&self.to_xml_string()?))
    }

    /// The underlying element tree.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// The underlying element tree, mutably.
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Raw `version` attribute.
    pub fn version(&self) -> Option<&str> {
        self.root.attribute("version")
    }

    /// Sets the `version` attribute.
    pub fn set_version(&mut self, version: &str) {
        self.root.set_attribute("version", version);
    }

    /// Protocol version classification.
    pub fn rtml_version(&self) -> RtmlVersion {
        match self.version().map(str::trim) {
            Some(RTML_VERSION_22) => RtmlVersion::V22,
            Some(RTML_VERSION_31) => RtmlVersion::V31,
            Some(other) => RtmlVersion::Unknown(other.to_string()),
            None => RtmlVersion::Unknown(String::new()),
        }
    }

    /// Raw document type: the `type` attribute, else the `mode` attribute.
    pub fn document_type(&self) -> Option<&str> {
        self.root
            .attribute("type")
            .or_else(|| self.root.attribute("mode"))
    }

    /// Declared intent of the document.
    pub fn kind(&self) -> DocumentKind {
        self.document_type()
            .map(DocumentKind::from_type_attribute)
            .unwrap_or(DocumentKind::Unknown)
    }

    /// Sets the document type, keeping whichever attribute the document uses.
    pub fn set_document_type(&mut self, value: &str) {
        if self.root.attribute("type").is_none() && self.root.attribute("mode").is_some() {
            self.root.set_attribute("mode", value);
        } else {
            self.root.set_attribute("type", value);
        }
    }

    /// Returns true for score requests.
    pub fn is_score_request(&self) -> bool {
        self.kind() == DocumentKind::ScoreRequest
    }

    /// Returns true for observation requests.
    pub fn is_request(&self) -> bool {
        self.kind() == DocumentKind::Request
    }

    /// Returns true for abort documents.
    pub fn is_abort(&self) -> bool {
        self.kind() == DocumentKind::Abort
    }

    /// Returns true for update documents.
    pub fn is_update(&self) -> bool {
        self.kind() == DocumentKind::Update
    }

    fn contact(&self) -> Option<&Element> {
        self.root.child("Contact").or_else(|| {
            self.root
                .child("Project")
                .and_then(|project| project.child("Contact"))
        })
    }

    fn contact_mut(&mut self) -> Option<&mut Element> {
        if self.root.child("Contact").is_some() {
            return self.root.child_mut("Contact");
        }
        self.root
            .child_mut("Project")
            .and_then(|project| project.child_mut("Contact"))
    }

    /// Returns true if the document has a `Contact` element.
    pub fn has_contact(&self) -> bool {
        self.contact().is_some()
    }

    /// Contact user name, if present and non-empty.
    pub fn contact_user(&self) -> Option<&str> {
        let contact = self.contact()?;
        contact
            .child("User")
            .or_else(|| contact.child("Username"))
            .and_then(Element::text)
    }

    /// Replaces the contact user name.
    ///
    /// Returns false (and changes nothing) if the document has no contact.
    pub fn set_contact_user(&mut self, user: &str) -> bool {
        let Some(contact) = self.contact_mut() else {
            return false;
        };
        let slot = if contact.child("User").is_none() && contact.child("Username").is_some() {
            contact.child_or_insert("Username")
        } else {
            contact.child_or_insert("User")
        };
        slot.text = user.to_string();
        true
    }

    /// Returns true if the document has a `Project` element.
    pub fn has_project(&self) -> bool {
        self.root.child("Project").is_some()
    }

    /// Project identity: `ProjectID` attribute, else the element text.
    pub fn project(&self) -> Option<&str> {
        let project = self.root.child("Project")?;
        match project.attribute("ProjectID") {
            Some(id) if !id.is_empty() => Some(id),
            _ => project.text(),
        }
    }

    /// Replaces the project identity.
    ///
    /// Returns false (and changes nothing) if the document has no project.
    pub fn set_project(&mut self, project_id: &str) -> bool {
        let Some(project) = self.root.child_mut("Project") else {
            return false;
        };
        if project.attribute("ProjectID").is_some() {
            project.set_attribute("ProjectID", project_id);
        } else {
            project.text = project_id.to_string();
        }
        true
    }

    /// Callback address of the submitting agent.
    pub fn intelligent_agent(&self) -> Option<IntelligentAgent> {
        self.root
            .child("IntelligentAgent")
            .map(IntelligentAgent::from_element)
    }

    /// Replaces the callback address.
    pub fn set_intelligent_agent(&mut self, agent: &IntelligentAgent) {
        let element = agent.to_element();
        match self.root.child_mut("IntelligentAgent") {
            Some(slot) => *slot = element,
            None => self.root.children.insert(0, element),
        }
    }

    /// Score value, if present and numeric.
    pub fn score(&self) -> Option<f64> {
        self.root
            .child("Score")
            .and_then(Element::text)
            .and_then(|s| s.trim().parse().ok())
    }

    /// Sets the score value.
    pub fn set_score(&mut self, score: f64) {
        self.root.child_or_insert("Score").text = format!("{:.1}", score);
    }

    /// Marks the document as rejected.
    ///
    /// Score requests also have their score zeroed.
    pub fn set_reject(&mut self) {
        if self.is_score_request() {
            self.set_score(0.0);
        }
        self.set_document_type("reject");
    }

    /// Returns true if the document is marked as rejected.
    pub fn is_reject(&self) -> bool {
        self.document_type()
            .map(|t| t.eq_ignore_ascii_case("reject"))
            .unwrap_or(false)
    }

    /// Error string of a reject document.
    pub fn error_string(&self) -> Option<&str> {
        self.root.child("ErrorString").and_then(Element::text)
    }

    /// Sets the error string.
    pub fn set_error_string(&mut self, message: &str) {
        self.root.child_or_insert("ErrorString").text = message.to_string();
    }

    /// Appends a history entry.
    pub fn add_history_entry(&mut self, agent_name: &str, agent_uri: &str, description: &str) {
        let entry = history_element(agent_name, agent_uri, description, None);
        self.root.child_or_insert("History").children.push(entry);
    }

    /// Appends a history entry recording a failure.
    pub fn add_history_error(
        &mut self,
        agent_name: &str,
        agent_uri: &str,
        error: &str,
        description: &str,
    ) {
        let entry = history_element(agent_name, agent_uri, description, Some(error));
        self.root.child_or_insert("History").children.push(entry);
    }

    /// History trail in document order.
    pub fn history(&self) -> Vec<HistoryEntry> {
        let Some(history) = self.root.child("History") else {
            return Vec::new();
        };
        history
            .children_named("Entry")
            .map(|entry| {
                let agent = entry.child("Agent");
                HistoryEntry {
                    timestamp: entry.attribute("timeStamp").map(str::to_string),
                    agent_name: agent
                        .and_then(|a| a.attribute("name"))
                        .unwrap_or_default()
                        .to_string(),
                    agent_uri: agent
                        .and_then(|a| a.attribute("uri"))
                        .unwrap_or_default()
                        .to_string(),
                    description: entry
                        .child("Description")
                        .map(|d| d.text.clone())
                        .unwrap_or_default(),
                    error: entry.child("Error").map(|e| e.text.clone()),
                }
            })
            .collect()
    }
}

fn history_element(
    agent_name: &str,
    agent_uri: &str,
    description: &str,
    error: Option<&str>,
) -> Element {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let mut entry = Element::new("Entry")
        .attr("timeStamp", timestamp)
        .child_element(
            Element::new("Agent")
                .attr("name", agent_name)
                .attr("uri", agent_uri),
        )
        .child_element(Element::with_text("Description", description));
    if let Some(error) = error {
        entry.children.push(Element::with_text("Error", error));
    }
    entry
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCORE_22: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<!DOCTYPE RTML SYSTEM "http://www.estar.org.uk/documents/rtml2.2.dtd">
<RTML version="2.2" type="score">
  <IntelligentAgent host="ia.example.org" port="8000">req-17</IntelligentAgent>
  <Contact PI="true">
    <User>alice</User>
    <Name>Alice Smith</Name>
  </Contact>
  <Project>agent_test</Project>
  <Observation><Target name="M31"/></Observation>
</RTML>"#;

    const REQUEST_31: &str = r#"<RTML version="3.1a" mode="request" uid="abc">
  <IntelligentAgent uri="http://ia.example.org:8000/callback">req-18</IntelligentAgent>
  <Project ProjectID="agent_test">
    <Contact><Username>alice</Username></Contact>
  </Project>
</RTML>"#;

    #[test]
    fn test_parse_v22_score_request() {
        let doc = RtmlDocument::parse(SCORE_22).unwrap();
        assert_eq!(doc.rtml_version(), RtmlVersion::V22);
        assert_eq!(doc.kind(), DocumentKind::ScoreRequest);
        assert!(doc.is_score_request());
        assert_eq!(doc.contact_user(), Some("alice"));
        assert_eq!(doc.project(), Some("agent_test"));

        let agent = doc.intelligent_agent().unwrap();
        assert_eq!(agent.id, "req-17");
        assert_eq!(agent.hostname.as_deref(), Some("ia.example.org"));
        assert_eq!(agent.port, 8000);
    }

    #[test]
    fn test_parse_v31_request() {
        let doc = RtmlDocument::parse(REQUEST_31).unwrap();
        assert_eq!(doc.rtml_version(), RtmlVersion::V31);
        assert!(doc.is_request());
        assert_eq!(doc.contact_user(), Some("alice"));
        assert_eq!(doc.project(), Some("agent_test"));
        assert_eq!(
            doc.intelligent_agent().unwrap().uri.as_deref(),
            Some("http://ia.example.org:8000/callback")
        );
    }

    #[test]
    fn test_wrong_root_rejected() {
        let err = RtmlDocument::parse("<html><body/></html>").unwrap_err();
        assert_eq!(err, RtmlError::NotRtml("html".to_string()));
    }

    #[test]
    fn test_kind_predicates_are_exclusive() {
        for value in ["score", "request", "abort", "update", "reject", "bogus"] {
            let mut doc = RtmlDocument::new(RTML_VERSION_22);
            doc.set_document_type(value);
            let hits = [
                doc.is_score_request(),
                doc.is_request(),
                doc.is_abort(),
                doc.is_update(),
            ]
            .iter()
            .filter(|hit| **hit)
            .count();
            assert!(hits <= 1, "{} matched {} predicates", value, hits);
        }
    }

    #[test]
    fn test_missing_type_is_unknown() {
        let doc = RtmlDocument::new(RTML_VERSION_22);
        assert_eq!(doc.kind(), DocumentKind::Unknown);
    }

    #[test]
    fn test_set_contact_user_keeps_layout() {
        let mut doc = RtmlDocument::parse(REQUEST_31).unwrap();
        assert!(doc.set_contact_user("a.smith"));
        assert_eq!(doc.contact_user(), Some("a.smith"));
        let contact = doc.root().child("Project").unwrap().child("Contact").unwrap();
        assert!(contact.child("User").is_none());
    }

    #[test]
    fn test_set_contact_without_contact_fails() {
        let mut doc = RtmlDocument::new(RTML_VERSION_22);
        assert!(!doc.set_contact_user("alice"));
        assert!(!doc.has_contact());
    }

    #[test]
    fn test_set_project_attribute_form() {
        let mut doc = RtmlDocument::parse(REQUEST_31).unwrap();
        doc.set_project("LT_PROJ");
        assert_eq!(
            doc.root().child("Project").unwrap().attribute("ProjectID"),
            Some("LT_PROJ")
        );
    }

    #[test]
    fn test_reject_zeroes_score() {
        let mut doc = RtmlDocument::parse(SCORE_22).unwrap();
        doc.set_reject();
        assert!(doc.is_reject());
        assert_eq!(doc.score(), Some(0.0));
        assert_eq!(doc.kind(), DocumentKind::Unknown);
    }

    #[test]
    fn test_reject_uses_mode_for_v31() {
        let mut doc = RtmlDocument::parse(REQUEST_31).unwrap();
        doc.set_reject();
        assert_eq!(doc.root().attribute("mode"), Some("reject"));
        assert!(doc.root().attribute("type").is_none());
    }

    #[test]
    fn test_history_entries() {
        let mut doc = RtmlDocument::new(RTML_VERSION_22);
        doc.add_history_entry("NodeAgent", "urn:/node_agent", "rewritten contact to a.smith");
        doc.add_history_error("NodeAgent", "urn:/node_agent", "boom", "failed");

        let history = doc.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].agent_name, "NodeAgent");
        assert_eq!(history[0].error, None);
        assert_eq!(history[1].error.as_deref(), Some("boom"));
        assert!(history[1].timestamp.is_some());
    }

    #[test]
    fn test_serialized_form_reparses() {
        let mut doc = RtmlDocument::parse(SCORE_22).unwrap();
        doc.set_error_string("x < y");
        let xml = doc.to_xml_string().unwrap();
        assert!(xml.starts_with(XML_HEADER));
        assert!(xml.contains(DOC_TYPE));

        let reparsed = RtmlDocument::parse(&xml).unwrap();
        assert_eq!(reparsed, doc);
        assert_eq!(reparsed.error_string(), Some("x < y"));
    }

    #[test]
    fn test_clone_is_independent() {
        let original = RtmlDocument::parse(SCORE_22).unwrap();
        let mut copy = original.clone();
        copy.set_contact_user("bob");
        assert_eq!(original.contact_user(), Some("alice"));
    }

    #[test]
    fn test_history_entry_serializes() {
        let mut doc = RtmlDocument::new(RTML_VERSION_22);
        doc.add_history_entry("NodeAgent", "urn:/node_agent", "relayed");
        let json = serde_json::to_value(&doc.history()[0]).unwrap();
        assert_eq!(json["agent_uri"], "urn:/node_agent");
        assert_eq!(json["description"], "relayed");
    }

    #[test]
    fn test_intelligent_agent_roundtrip() {
        let mut doc = RtmlDocument::new(RTML_VERSION_22);
        let agent = IntelligentAgent {
            id: "42".to_string(),
            hostname: Some("ia".to_string()),
            port: 9000,
            uri: None,
        };
        doc.set_intelligent_agent(&agent);
        assert_eq!(doc.intelligent_agent(), Some(agent));
    }

    #[test]
    fn test_non_ascii_identity_survives_the_wire() {
        let mut doc = RtmlDocument::parse(SCORE_22).unwrap();
        doc.set_contact_user("Jos\u{e9}");
        doc.set_project("\u{65e5}\u{672c}");

        let bytes = doc.to_xml_bytes().unwrap();
        assert!(bytes.starts_with(XML_HEADER.as_bytes()));
        assert!(bytes.windows(4).any(|w| w == &b"Jos\xe9"[..]));
        assert!(!bytes.windows(2).any(|w| w == [0xC3, 0xA9]));

        let back = RtmlDocument::parse_bytes(&bytes).unwrap();
        assert_eq!(back.contact_user(), Some("Jos\u{e9}"));
        assert_eq!(back.project(), Some("\u{65e5}\u{672c}"));
    }

    #[test]
    fn test_parse_bytes_reads_utf8_documents() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<RTML version=\"2.2\" type=\"score\"><Contact><User>Jos\u{e9}</User></Contact></RTML>";
        let doc = RtmlDocument::parse_bytes(xml.as_bytes()).unwrap();
        assert_eq!(doc.contact_user(), Some("Jos\u{e9}"));
    }
}
