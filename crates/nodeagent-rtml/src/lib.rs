//! # nodeagent-rtml - RTML Document Model
//!
//! RTML (Remote Telescope Markup Language) is the XML dialect spoken between
//! eSTAR intelligent agents and telescope node agents. This crate owns the
//! document model: parsing, typed inspection, mutation and serialization.
//!
//! ## Design
//!
//! Documents are kept as a generic element tree rather than a fixed schema.
//! Unknown elements and attributes survive a parse/serialize cycle, which is
//! what lets the gateway echo a failed request back with a reject marker
//! instead of inventing a fresh document.
//!
//! ```text
//! ┌──────────────┐   parse_tree    ┌──────────────┐   RtmlDocument   ┌──────────────┐
//! │  XML text    │ ──────────────▶ │ Element tree │ ───────────────▶ │ typed view   │
//! │ (2.2 / 3.1a) │ ◀────────────── │ (owned)      │ ◀─────────────── │ kind/contact │
//! └──────────────┘   write_tree    └──────────────┘   root()/mut     │ project/...  │
//!                                                                    └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use nodeagent_rtml::{DocumentKind, RtmlDocument};
//!
//! let xml = r#"<RTML version="2.2" type="score">
//!   <Contact><User>alice</User></Contact>
//!   <Project>agent_test</Project>
//! </RTML>"#;
//!
//! let mut doc = RtmlDocument::parse(xml).unwrap();
//! assert_eq!(doc.kind(), DocumentKind::ScoreRequest);
//!
//! doc.set_contact_user("a.smith");
//! doc.add_history_entry("NodeAgent", "urn:/node_agent", "rewritten contact to a.smith");
//!
//! let out = doc.to_xml_string().unwrap();
//! assert!(out.contains("a.smith"));
//! ```

pub mod charset;
pub mod document;
pub mod element;
pub mod error;

pub use charset::{declared_encoding, decode_document, encode_document};
pub use document::{
    DocumentKind, HistoryEntry, IntelligentAgent, RtmlDocument, RtmlVersion, DOC_TYPE,
    RTML_VERSION_22, RTML_VERSION_31, XML_HEADER,
};
pub use element::{parse_tree, write_tree, Element, MAX_DOCUMENT_SIZE};
pub use error::{Result, RtmlError};
