//! XMP packet codec.
//!
//! Reads the RDF/XML found in a JPEG APP1 segment into a flat list of
//! properties keyed `Xmp.<prefix>.<name>`, and writes it back as a single
//! `rdf:Description`. Properties this model cannot express (structs,
//! qualifiers, nested arrays) are kept verbatim and written back unchanged.

use std::ops::Range;

use log::{debug, warn};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, PrefixDeclaration, ResolveResult};
use quick_xml::reader::NsReader;

use super::RawTag;
use crate::error::{Error, Result};
use crate::key::split_key;
use crate::registry::{self, TagInfo, TagType, XmpScalar, XmpType};
use crate::value::RawValue;

const RDF_NS: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayKind {
    Bag,
    Seq,
    Alt,
}

impl ArrayKind {
    fn element(self) -> &'static str {
        match self {
            ArrayKind::Bag => "rdf:Bag",
            ArrayKind::Seq => "rdf:Seq",
            ArrayKind::Alt => "rdf:Alt",
        }
    }

    fn of(ty: XmpType) -> Option<Self> {
        match ty {
            XmpType::Bag(_) => Some(ArrayKind::Bag),
            XmpType::Seq(_) => Some(ArrayKind::Seq),
            XmpType::Alt(_) => Some(ArrayKind::Alt),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PropValue {
    Text(String),
    Array(ArrayKind, Vec<String>),
    LangAlt(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq)]
struct Property {
    prefix: String,
    uri: String,
    name: String,
    value: PropValue,
}

impl Property {
    fn key(&self) -> String {
        format!("Xmp.{}.{}", self.prefix, self.name)
    }
}

/// A property element kept as source text, with the namespaces in scope
/// where it was found.
#[derive(Debug, Clone, PartialEq)]
struct Opaque {
    xml: String,
    namespaces: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct XmpPacket {
    properties: Vec<Property>,
    opaque: Vec<Opaque>,
}

impl XmpPacket {
    pub(crate) fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data).map_err(|e| Error::Codec(format!("XMP packet is not UTF-8: {e}")))?;
        let text = text.trim_start_matches('\u{feff}');
        let root = parse_document(text)?;
        let mut packet = Self::default();
        let mut scope = Vec::new();
        packet.collect(&root, &mut scope, text);
        debug!(
            "Parsed XMP packet: {} properties, {} kept as is",
            packet.properties.len(),
            packet.opaque.len()
        );
        Ok(packet)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.opaque.is_empty()
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.properties.iter().map(Property::key).collect()
    }

    pub(crate) fn get(&self, key: &str) -> Option<RawTag> {
        let prop = self.properties.iter().find(|p| p.key() == key)?;
        let (raw, hint) = match &prop.value {
            PropValue::Text(text) => (
                RawValue::Text(text.clone()),
                TagInfo::new(TagType::Xmp(XmpType::Simple(XmpScalar::Text)), false),
            ),
            PropValue::Array(kind, items) => {
                let ty = match kind {
                    ArrayKind::Bag => XmpType::Bag(XmpScalar::Text),
                    ArrayKind::Seq => XmpType::Seq(XmpScalar::Text),
                    ArrayKind::Alt => XmpType::Alt(XmpScalar::Text),
                };
                (RawValue::Array(items.clone()), TagInfo::new(TagType::Xmp(ty), true))
            }
            PropValue::LangAlt(items) => (
                RawValue::LangAlt(items.clone()),
                TagInfo::new(TagType::Xmp(XmpType::LangAlt), false),
            ),
        };
        Some(RawTag {
            key: key.to_string(),
            raw,
            hint: Some(hint),
        })
    }

    /// Add or replace a property. The namespace prefix must be registered or
    /// already used by the packet.
    pub(crate) fn set(&mut self, key: &str, raw: &RawValue) -> Result<()> {
        let parts = split_key(key)?;
        if !is_xml_name(parts.name) {
            return Err(Error::invalid_key(key, "not a valid XMP property name"));
        }
        let existing = self.properties.iter().position(|p| p.key() == key);
        let uri = registry::namespace_uri(parts.group)
            .or_else(|| {
                self.properties
                    .iter()
                    .find(|p| p.prefix == parts.group)
                    .map(|p| p.uri.clone())
            })
            .ok_or_else(|| Error::invalid_key(key, format!("XMP namespace prefix {} is not registered", parts.group)))?;

        let value = match raw {
            RawValue::Text(text) => PropValue::Text(text.clone()),
            RawValue::LangAlt(items) => PropValue::LangAlt(items.clone()),
            RawValue::Array(items) => {
                let kind = registry::lookup(key)
                    .and_then(|info| match info.tag_type {
                        TagType::Xmp(ty) => ArrayKind::of(ty),
                        _ => None,
                    })
                    .or_else(|| match existing.map(|i| &self.properties[i].value) {
                        Some(PropValue::Array(kind, _)) => Some(*kind),
                        _ => None,
                    })
                    .unwrap_or(ArrayKind::Bag);
                PropValue::Array(kind, items.clone())
            }
            RawValue::Datasets(_) => return Err(Error::conversion(raw, "XMP value")),
        };

        let prop = Property {
            prefix: parts.group.to_string(),
            uri,
            name: parts.name.to_string(),
            value,
        };
        match existing {
            Some(i) => self.properties[i] = prop,
            None => self.properties.push(prop),
        }
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: &str) -> bool {
        let before = self.properties.len();
        self.properties.retain(|p| p.key() != key);
        self.properties.len() != before
    }

    /// Serialize as a complete packet with `xpacket` wrapper.
    pub(crate) fn to_xml(&self) -> String {
        let mut namespaces: Vec<(String, String)> = Vec::new();
        let declared = self
            .properties
            .iter()
            .map(|p| (p.prefix.clone(), p.uri.clone()))
            .chain(self.opaque.iter().flat_map(|o| o.namespaces.iter().cloned()));
        for (prefix, uri) in declared {
            if !namespaces.iter().any(|(p, _)| *p == prefix) {
                namespaces.push((prefix, uri));
            }
        }

        let mut xmp = String::new();
        xmp.push_str("<?xpacket begin=\"\u{feff}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n");
        xmp.push_str("<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\n");
        xmp.push_str(&format!("<rdf:RDF xmlns:rdf=\"{RDF_NS}\">\n"));
        xmp.push_str("<rdf:Description rdf:about=\"\"");
        for (prefix, uri) in &namespaces {
            let uri = escape(uri);
            if prefix.is_empty() {
                xmp.push_str(&format!("\n  xmlns=\"{uri}\""));
            } else {
                xmp.push_str(&format!("\n  xmlns:{prefix}=\"{uri}\""));
            }
        }
        xmp.push_str(">\n");

        for prop in &self.properties {
            let qname = format!("{}:{}", prop.prefix, prop.name);
            match &prop.value {
                PropValue::Text(text) => {
                    xmp.push_str(&format!("  <{qname}>{}</{qname}>\n", escape(text)));
                }
                PropValue::Array(kind, items) => {
                    let container = kind.element();
                    xmp.push_str(&format!("  <{qname}><{container}>\n"));
                    for item in items {
                        xmp.push_str(&format!("    <rdf:li>{}</rdf:li>\n", escape(item)));
                    }
                    xmp.push_str(&format!("  </{container}></{qname}>\n"));
                }
                PropValue::LangAlt(items) => {
                    xmp.push_str(&format!("  <{qname}><rdf:Alt>\n"));
                    for (lang, text) in items {
                        xmp.push_str(&format!(
                            "    <rdf:li xml:lang=\"{}\">{}</rdf:li>\n",
                            escape(lang),
                            escape(text)
                        ));
                    }
                    xmp.push_str(&format!("  </rdf:Alt></{qname}>\n"));
                }
            }
        }
        for opaque in &self.opaque {
            xmp.push_str(&format!("  {}\n", opaque.xml));
        }

        xmp.push_str("</rdf:Description>\n");
        xmp.push_str("</rdf:RDF>\n");
        xmp.push_str("</x:xmpmeta>\n");
        xmp.push_str("<?xpacket end=\"w\"?>");
        xmp
    }

    fn collect(&mut self, el: &Element, scope: &mut Vec<(String, String)>, xml: &str) {
        let mark = scope.len();
        scope.extend(el.declarations.iter().cloned());
        if el.is(RDF_NS, "Description") {
            self.read_description(el, scope, xml);
        } else {
            for child in el.elements() {
                self.collect(child, scope, xml);
            }
        }
        scope.truncate(mark);
    }

    fn read_description(&mut self, el: &Element, scope: &mut Vec<(String, String)>, xml: &str) {
        for attr in &el.attrs {
            let uri = match attr.ns.as_deref() {
                Some(RDF_NS | XML_NS) => continue,
                Some(uri) => uri,
                None if attr.name.starts_with("xml:") => continue,
                None => {
                    warn!("Dropping XMP attribute {} without a namespace", attr.name);
                    continue;
                }
            };
            if !self.insert(uri, &attr.local, prefix_of(&attr.name), PropValue::Text(attr.value.clone())) {
                self.opaque.push(Opaque {
                    xml: format!("<{0}>{1}</{0}>", attr.name, escape(&attr.value)),
                    namespaces: bindings(scope),
                });
            }
        }

        for child in el.elements() {
            let mark = scope.len();
            scope.extend(child.declarations.iter().cloned());
            let stored = match (child.ns.as_deref(), property_value(child)) {
                (Some(uri), Some(value)) => self.insert(uri, &child.local, prefix_of(&child.name), value),
                _ => false,
            };
            if !stored {
                debug!("Keeping XMP property {} as is", child.name);
                self.opaque.push(Opaque {
                    xml: xml[child.span.clone()].to_string(),
                    namespaces: bindings(scope),
                });
            }
            scope.truncate(mark);
        }
    }

    /// Store a property under the registered prefix of its namespace, or
    /// under the prefix this packet declares for namespaces the registry does
    /// not know. Returns false when no usable key exists.
    fn insert(&mut self, uri: &str, name: &str, declared: &str, value: PropValue) -> bool {
        if declared.is_empty() || !is_xml_name(name) {
            return false;
        }
        let prefix = match registry::namespace_prefix(uri) {
            Some(prefix) => prefix,
            None if registry::namespace_uri(declared).is_none() => declared.to_string(),
            None => {
                warn!("XMP prefix {declared} is registered for another namespace than {uri}");
                return false;
            }
        };
        if self.properties.iter().any(|p| p.prefix == prefix && p.uri != uri) {
            return false;
        }
        let prop = Property {
            prefix,
            uri: uri.to_string(),
            name: name.to_string(),
            value,
        };
        let key = prop.key();
        match self.properties.iter_mut().find(|p| p.key() == key) {
            Some(existing) => *existing = prop,
            None => self.properties.push(prop),
        }
        true
    }
}

/// Value of a property element, or `None` for shapes kept verbatim.
fn property_value(el: &Element) -> Option<PropValue> {
    if let Some(resource) = el.rdf_attr("resource") {
        return Some(PropValue::Text(resource.to_string()));
    }
    if el.attrs.iter().any(|a| a.name != "xml:lang") {
        return None;
    }
    let children: Vec<&Element> = el.elements().collect();
    let container = match children.as_slice() {
        [] => return Some(PropValue::Text(el.text())),
        [container] => *container,
        _ => return None,
    };
    let kind = [("Bag", ArrayKind::Bag), ("Seq", ArrayKind::Seq), ("Alt", ArrayKind::Alt)]
        .into_iter()
        .find(|(local, _)| container.is(RDF_NS, local))
        .map(|(_, kind)| kind)?;

    let mut items = Vec::new();
    let mut langs = Vec::new();
    for li in container.elements() {
        if !li.is(RDF_NS, "li") {
            return None;
        }
        if li.elements().next().is_some() || li.attrs.iter().any(|a| a.name != "xml:lang") {
            return None;
        }
        items.push(li.text());
        langs.push(li.attr("xml:lang").map(str::to_string));
    }

    if kind == ArrayKind::Alt && !items.is_empty() && langs.iter().all(Option::is_some) {
        let pairs = langs.into_iter().flatten().zip(items).collect();
        return Some(PropValue::LangAlt(pairs));
    }
    Some(PropValue::Array(kind, items))
}

fn prefix_of(qname: &str) -> &str {
    qname.split_once(':').map_or("", |(prefix, _)| prefix)
}

/// Innermost binding of every prefix in scope, without the RDF and packet
/// wrapper namespaces.
fn bindings(scope: &[(String, String)]) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for (prefix, uri) in scope.iter().rev() {
        if prefix == "rdf" || prefix == "x" || out.iter().any(|(p, _)| p == prefix) {
            continue;
        }
        out.push((prefix.clone(), uri.clone()));
    }
    out.reverse();
    out
}

fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

// ── XML ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Attr {
    name: String,
    ns: Option<String>,
    local: String,
    value: String,
}

/// An element with its names resolved against the namespaces in scope.
#[derive(Debug, Default)]
struct Element {
    name: String,
    ns: Option<String>,
    local: String,
    /// `xmlns` bindings made on this element.
    declarations: Vec<(String, String)>,
    attrs: Vec<Attr>,
    children: Vec<Node>,
    /// Byte range of the element in the source document.
    span: Range<usize>,
}

impl Element {
    fn is(&self, ns: &str, local: &str) -> bool {
        self.ns.as_deref() == Some(ns) && self.local == local
    }

    fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        })
    }

    fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.iter().find(|a| a.name == name).map(|a| a.value.as_str())
    }

    fn rdf_attr(&self, local: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.ns.as_deref() == Some(RDF_NS) && a.local == local)
            .map(|a| a.value.as_str())
    }
}

fn xml_error(err: impl std::fmt::Display) -> Error {
    Error::Codec(format!("malformed XMP packet: {err}"))
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn namespace(result: ResolveResult) -> Option<String> {
    match result {
        ResolveResult::Bound(Namespace(uri)) => Some(lossy(uri)),
        _ => None,
    }
}

/// Build the element tree of a document from reader events.
fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = NsReader::from_str(xml);
    let mut stack = vec![Element {
        span: 0..xml.len(),
        ..Element::default()
    }];

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let end = reader.buffer_position() as usize;
                stack.push(start_element(&reader, &e, tag_start(xml, end)..end)?);
            }
            Event::Empty(e) => {
                let end = reader.buffer_position() as usize;
                let el = start_element(&reader, &e, tag_start(xml, end)..end)?;
                push_node(&mut stack, Node::Element(el));
            }
            Event::End(e) => {
                if stack.len() < 2 {
                    return Err(xml_error(format!("unexpected </{}>", lossy(e.name().as_ref()))));
                }
                let mut el = stack.pop().ok_or_else(|| xml_error("element stack underflow"))?;
                el.span.end = reader.buffer_position() as usize;
                push_node(&mut stack, Node::Element(el));
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(xml_error)?;
                push_node(&mut stack, Node::Text(text.into_owned()));
            }
            Event::CData(e) => push_node(&mut stack, Node::Text(lossy(&e))),
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        let open = stack.last().map(|el| el.name.as_str()).unwrap_or_default();
        return Err(xml_error(format!("unclosed <{open}>")));
    }
    stack.pop().ok_or_else(|| xml_error("empty document"))
}

/// Offset of the `<` opening the tag that ends at `end`.
fn tag_start(xml: &str, end: usize) -> usize {
    xml[..end].rfind('<').unwrap_or(0)
}

fn start_element(reader: &NsReader<&[u8]>, e: &BytesStart, span: Range<usize>) -> Result<Element> {
    let (ns, local) = reader.resolve_element(e.name());
    let mut el = Element {
        name: lossy(e.name().as_ref()),
        ns: namespace(ns),
        local: lossy(local.as_ref()),
        span,
        ..Element::default()
    };
    for attr in e.attributes() {
        let attr = attr.map_err(xml_error)?;
        let value = attr.unescape_value().map_err(xml_error)?.into_owned();
        match attr.key.as_namespace_binding() {
            Some(PrefixDeclaration::Default) => el.declarations.push((String::new(), value)),
            Some(PrefixDeclaration::Named(prefix)) => el.declarations.push((lossy(prefix), value)),
            None => {
                let (ns, local) = reader.resolve_attribute(attr.key);
                el.attrs.push(Attr {
                    name: lossy(attr.key.as_ref()),
                    ns: namespace(ns),
                    local: lossy(local.as_ref()),
                    value,
                });
            }
        }
    }
    Ok(el)
}

fn push_node(stack: &mut [Element], node: Node) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}
