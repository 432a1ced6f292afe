//! # Element Tree
//!
//! Owned XML element tree backing [`RtmlDocument`](crate::RtmlDocument).
//!
//! The tree keeps every element and attribute of the input so that a
//! document can be re-emitted with its original structure intact, which
//! the gateway relies on when it turns a failed request back into a reject
//! reply. Mixed content is flattened: an element keeps the concatenation
//! of its text nodes and its child elements in order.
//!
//! Whitespace-only text is discarded on read, so a pretty-printed document
//! and its compact form parse to the same tree.

use std::borrow::Cow;

use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RtmlError};

/// Maximum accepted input size (10MB).
pub const MAX_DOCUMENT_SIZE: usize = 10 * 1024 * 1024;

/// A single XML element with its attributes, text and children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Element name, including any namespace prefix.
    pub name: String,
    /// Attributes in document order.
    pub attributes: Vec<(String, String)>,
    /// Concatenated, unescaped text content.
    pub text: String,
    /// Child elements in document order.
    pub children: Vec<Element>,
}

impl Element {
    /// Creates an empty element.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates an element holding only text.
    pub fn with_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    /// Builder-style attribute setter.
    #[must_use]
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(key, value);
        self
    }

    /// Builder-style child append.
    #[must_use]
    pub fn child_element(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    /// Returns the value of an attribute.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets an attribute, replacing an existing value in place.
    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// First child with the given name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First child with the given name, mutably.
    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// First child with the given name, appending an empty one if absent.
    pub fn child_or_insert(&mut self, name: &str) -> &mut Element {
        let index = match self.children.iter().position(|c| c.name == name) {
            Some(index) => index,
            None => {
                self.children.push(Element::new(name));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    /// All children with the given name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Text content, or `None` when empty.
    pub fn text(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(&self.text)
        }
    }
}

/// Parses a complete XML document into its root element.
///
/// # Errors
///
/// Returns an error for empty or oversized input, XML syntax errors,
/// unbalanced tags, stray top-level text and multiple roots.
pub fn parse_tree(input: &str) -> Result<Element> {
    if input.len() > MAX_DOCUMENT_SIZE {
        return Err(RtmlError::TooLarge {
            size: input.len(),
            max: MAX_DOCUMENT_SIZE,
        });
    }
    if input.trim().is_empty() {
        return Err(RtmlError::Empty);
    }

    let mut reader = Reader::from_str(input);
    reader.trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = match reader.read_event() {
            Ok(event) => event,
            Err(err) => {
                return Err(RtmlError::Syntax(format!(
                    "{} (at byte {})",
                    err,
                    reader.buffer_position()
                )))
            }
        };

        match event {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| RtmlError::Syntax("unexpected closing tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let value = text
                    .unescape()
                    .map_err(|e| RtmlError::Syntax(e.to_string()))?;
                append_text(&mut stack, &value)?;
            }
            Event::CData(data) => {
                let raw = data.into_inner();
                let value = String::from_utf8_lossy(&raw);
                append_text(&mut stack, &value)?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(RtmlError::Unclosed(open.name));
    }
    root.ok_or(RtmlError::NoRoot)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| RtmlError::Syntax(e.to_string()))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(|e| RtmlError::Syntax(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(element);
            Ok(())
        }
        None if root.is_some() => Err(RtmlError::MultipleRoots),
        None => {
            *root = Some(element);
            Ok(())
        }
    }
}

fn append_text(stack: &mut [Element], value: &str) -> Result<()> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(value);
            Ok(())
        }
        None if value.trim().is_empty() => Ok(()),
        None => Err(RtmlError::StrayText),
    }
}

/// Writes an element and its subtree as indented XML.
///
/// # Errors
///
/// Returns [`RtmlError::EmptyElementName`] if any element in the subtree
/// has no name.
pub fn write_tree(element: &Element, out: &mut String) -> Result<()> {
    write_element(element, 0, out)
}

fn write_element(element: &Element, depth: usize, out: &mut String) -> Result<()> {
    if element.name.is_empty() {
        return Err(RtmlError::EmptyElementName);
    }

    indent(depth, out);
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape_str(value));
        out.push('"');
    }

    if element.text.is_empty() && element.children.is_empty() {
        out.push_str("/>\n");
        return Ok(());
    }

    out.push('>');
    if element.children.is_empty() {
        out.push_str(&escape_str(&element.text));
    } else {
        out.push('\n');
        if !element.text.is_empty() {
            indent(depth + 1, out);
            out.push_str(&escape_str(&element.text));
            out.push('\n');
        }
        for child in &element.children {
            write_element(child, depth + 1, out)?;
        }
        indent(depth, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push_str(">\n");
    Ok(())
}

fn escape_str(value: &str) -> Cow<'_, str> {
    escape(value)
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}
