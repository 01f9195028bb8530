//! Minimal element tree over `quick-xml` events.
//!
//! Keeps comments and whitespace so html panels and comments survive a
//! parse/serialize round trip, and records the source line of every element.

use crate::error::Result;
use crate::error::ViewError;
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use serde::Serialize;

const MAX_DOCUMENT_DEPTH: usize = 256;

/// Source line of a node. Line numbers are for diagnostics only and never
/// take part in model equality.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(transparent)]
pub struct SourceLine(pub usize);

impl PartialEq for SourceLine {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl SourceLine {
    pub fn get(self) -> Option<usize> {
        (self.0 > 0).then_some(self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub line: SourceLine,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
            line: SourceLine::default(),
        }
    }

    pub fn line(&self) -> Option<usize> {
        self.line.get()
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.elements().find(|element| element.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.elements().filter(move |element| element.name == name)
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Comment(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Concatenated text of the direct text children.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|child| match child {
                XmlNode::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }

    /// Trimmed text of child `name`, `None` when absent or blank.
    pub fn child_text(&self, name: &str) -> Option<String> {
        self.child(name)
            .map(XmlElement::trimmed_text)
            .filter(|text| !text.is_empty())
    }

    pub fn with_attr(mut self, name: &str, value: impl Into<String>) -> Self {
        self.attributes.push((name.to_string(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.children.push(XmlNode::Text(text.into()));
        self
    }

    pub fn push(&mut self, element: XmlElement) {
        self.children.push(XmlNode::Element(element));
    }

    pub fn push_comment(&mut self, comment: &str) {
        self.children.push(XmlNode::Comment(comment.to_string()));
    }

    /// Serialized children, without the element's own tags.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }
}

/// Parses a whole document and returns its root element.
pub fn parse_document(source: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    let mut lines = LineCounter::new(source);

    loop {
        let position = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        let line = lines.line_at(position);
        let event = reader
            .read_event()
            .map_err(|err| ViewError::invalid(format!("malformed XML: {err}"), Some(line)))?;
        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DOCUMENT_DEPTH {
                    return Err(ViewError::invalid("document is nested too deeply", Some(line)));
                }
                stack.push(open_element(&start, line)?);
            }
            Event::Empty(start) => {
                let element = open_element(&start, line)?;
                attach(&mut stack, &mut root, element, line)?;
            }
            Event::End(_) => {
                let Some(element) = stack.pop() else {
                    return Err(ViewError::invalid("unexpected closing tag", Some(line)));
                };
                attach(&mut stack, &mut root, element, line)?;
            }
            Event::Text(text) => {
                if let Some(parent) = stack.last_mut() {
                    let value = text.unescape().map_err(|err| {
                        ViewError::invalid(format!("malformed XML text: {err}"), Some(line))
                    })?;
                    push_text(parent, &value);
                }
            }
            Event::CData(data) => {
                if let Some(parent) = stack.last_mut() {
                    push_text(parent, &String::from_utf8_lossy(&data));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    parent
                        .children
                        .push(XmlNode::Comment(String::from_utf8_lossy(&comment).into_owned()));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ViewError::invalid("unexpected end of document", None));
    }
    root.ok_or_else(|| ViewError::invalid("document has no root element", None))
}

fn open_element(start: &BytesStart<'_>, line: usize) -> Result<XmlElement> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    element.line = SourceLine(line);
    for attribute in start.attributes() {
        let attribute = attribute
            .map_err(|err| ViewError::invalid(format!("malformed attribute: {err}"), Some(line)))?;
        let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
        let value = attribute.unescape_value().map_err(|err| {
            ViewError::invalid(format!("malformed attribute value: {err}"), Some(line))
        })?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
    line: usize,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(ViewError::invalid(
            "document has more than one root element",
            Some(line),
        )),
    }
}

fn push_text(parent: &mut XmlElement, value: &str) {
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(value);
    } else {
        parent.children.push(XmlNode::Text(value.to_string()));
    }
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(element) => write_element(element, out),
        XmlNode::Text(text) => out.push_str(&escape(text.as_str())),
        XmlNode::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
    }
}

fn write_element(element: &XmlElement, out: &mut String) {
    out.push('<');
    out.push_str(&element.name);
    for (key, value) in &element.attributes {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&escape(value.as_str()));
        out.push('"');
    }
    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &element.children {
        write_node(child, out);
    }
    out.push_str("</");
    out.push_str(&element.name);
    out.push('>');
}

/// Maps byte offsets to 1-based line numbers; offsets only move forward.
struct LineCounter<'a> {
    source: &'a [u8],
    offset: usize,
    line: usize,
}

impl<'a> LineCounter<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, position: usize) -> usize {
        let end = position.min(self.source.len());
        if end > self.offset {
            self.line += self.source[self.offset..end]
                .iter()
                .filter(|byte| **byte == b'\n')
                .count();
            self.offset = end;
        }
        self.line
    }
}
