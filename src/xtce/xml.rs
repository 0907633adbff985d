//! A minimal namespace-agnostic XML tree, the shared substrate the loader
//! reads from and the writer builds (section 4.G: "accept documents with or
//! without an `xtce:` prefix; preserve the namespace on re-serialization").

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::Reader;

use crate::error::XtceError;

#[derive(Debug, Clone, Default)]
pub struct XmlNode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    pub text: String,
}

impl XmlNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn local_name(qname: QName) -> String {
    String::from_utf8_lossy(qname.local_name().as_ref()).into_owned()
}

fn is_xmlns_attr(raw_key: &[u8]) -> bool {
    raw_key == b"xmlns" || raw_key.starts_with(b"xmlns:")
}

/// Picks the one `xmlns*` attribute on `start` that actually declares the
/// root element's own namespace: the bare `xmlns` if the element has no
/// prefix, otherwise `xmlns:<prefix>` for the element's own prefix. Any
/// other `xmlns:*` declaration (e.g. `xmlns:xsi`) is ignored even if it
/// appears earlier in the attribute list.
fn root_namespace_attr(start: &BytesStart) -> Result<Option<String>, XtceError> {
    let wanted_key: Vec<u8> = match start.name().prefix() {
        Some(prefix) => {
            let mut key = b"xmlns:".to_vec();
            key.extend_from_slice(prefix.as_ref());
            key
        }
        None => b"xmlns".to_vec(),
    };
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XtceError::Malformed { position: 0, message: e.to_string() })?;
        if attr.key.as_ref() == wanted_key.as_slice() {
            let value = attr
                .unescape_value()
                .map_err(|e| XtceError::Malformed { position: 0, message: e.to_string() })?
                .into_owned();
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn read_attrs(start: &BytesStart) -> Result<Vec<(String, String)>, XtceError> {
    let mut out = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XtceError::Malformed { position: 0, message: e.to_string() })?;
        if is_xmlns_attr(attr.key.as_ref()) {
            continue;
        }
        let key = local_name(attr.key);
        let value = attr
            .unescape_value()
            .map_err(|e| XtceError::Malformed { position: 0, message: e.to_string() })?
            .into_owned();
        out.push((key, value));
    }
    Ok(out)
}

/// Tracks the default xmlns value seen on the root element, so the writer
/// can reuse it (rather than hard-coding the OMG 2018-02-04 namespace).
pub struct ParsedDocument {
    pub root: XmlNode,
    pub namespace: Option<String>,
}

pub fn parse_document<R: BufRead>(reader: R) -> Result<ParsedDocument, XtceError> {
    let mut xml_reader = Reader::from_reader(reader);
    xml_reader.config_mut().trim_text = true;

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;
    let mut namespace: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match xml_reader.read_event_into(&mut buf).map_err(XtceError::Xml)? {
            Event::Start(start) => {
                // Only the root element's own namespace declaration counts:
                // capture the bare `xmlns` if the root is unprefixed, or the
                // `xmlns:<prefix>` matching the root's own prefix otherwise.
                // A sibling `xmlns:xsi="...XMLSchema-instance"` (common
                // alongside `xsi:schemaLocation` on real XTCE exports) must
                // not be captured just because it happens to appear first.
                if stack.is_empty() && root.is_none() {
                    namespace = root_namespace_attr(&start)?;
                }
                let node = XmlNode { name: local_name(start.name()), attrs: read_attrs(&start)?, children: vec![], text: String::new() };
                stack.push(node);
            }
            Event::Empty(start) => {
                let node = XmlNode { name: local_name(start.name()), attrs: read_attrs(&start)?, children: vec![], text: String::new() };
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                } else {
                    root = Some(node);
                }
            }
            Event::End(_) => {
                let finished = stack.pop().ok_or_else(|| XtceError::Malformed {
                    position: xml_reader.buffer_position() as usize,
                    message: "unbalanced closing tag".into(),
                })?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(finished),
                    None => root = Some(finished),
                }
            }
            Event::Text(text) => {
                let decoded = text.unescape().map_err(XtceError::Xml)?.into_owned();
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(decoded.trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let root = root.ok_or_else(|| XtceError::Malformed { position: 0, message: "empty document".into() })?;
    Ok(ParsedDocument { root, namespace })
}
