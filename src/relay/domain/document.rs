//! In-memory XML document tree.
//!
//! Elements live in an arena addressed by [`ElementId`], so building,
//! walking, writing and dropping a document never recurses, whatever the
//! nesting depth of the input.

use super::error::DocumentError;
use quick_xml::escape::{escape, unescape};
use quick_xml::events::attributes::Attribute as XmlAttribute;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, QName as XmlName, ResolveResult};
use quick_xml::{NsReader, Writer};
use std::borrow::Cow;
use std::fmt;

/// Namespace bound to the reserved `xml` prefix.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Qualified name: namespace URI plus local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    namespace: Option<String>,
    local_name: String,
}

impl QName {
    /// Creates a qualified name.
    #[must_use]
    pub fn new(namespace: Option<impl Into<String>>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(Into::into),
            local_name: local_name.into(),
        }
    }

    /// Creates a name in no namespace.
    #[must_use]
    pub fn local(local_name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local_name: local_name.into(),
        }
    }

    /// Creates a name in the given namespace.
    #[must_use]
    pub fn namespaced(namespace: impl Into<String>, local_name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            local_name: local_name.into(),
        }
    }

    /// Returns the namespace URI, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the local name.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    fn set_namespace(&mut self, namespace: &str) {
        namespace.clone_into(self.namespace.get_or_insert_with(String::new));
    }
}

impl fmt::Display for QName {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(formatter, "{{{namespace}}}{}", self.local_name),
            None => formatter.write_str(&self.local_name),
        }
    }
}

/// Index of an element inside its [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementId(usize);

impl ElementId {
    /// Identifier of the document element.
    pub const ROOT: Self = Self(0);
}

/// Attribute of an element, in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: QName,
    prefix: Option<String>,
    value: String,
}

impl Attribute {
    /// Creates an attribute.
    #[must_use]
    pub fn new(name: QName, prefix: Option<String>, value: impl Into<String>) -> Self {
        Self {
            name,
            prefix,
            value: value.into(),
        }
    }

    /// Returns the qualified attribute name.
    #[must_use]
    pub const fn name(&self) -> &QName {
        &self.name
    }

    /// Returns the prefix the attribute was written with.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns the attribute value with entities resolved.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Child content of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// A child element.
    Element(ElementId),
    /// Character data, entities resolved.
    Text(String),
    /// A comment.
    Comment(String),
}

/// An element with its attributes and ordered child content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: QName,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Creates an element with no attributes or children.
    #[must_use]
    pub const fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Returns the element name.
    #[must_use]
    pub const fn name(&self) -> &QName {
        &self.name
    }

    /// Returns the attributes in document order.
    #[must_use]
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Looks up an attribute by qualified name.
    #[must_use]
    pub fn attribute(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name() == name)
            .map(Attribute::value)
    }

    /// Returns the child content in document order.
    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Iterates over the identifiers of child elements.
    pub fn child_element_ids(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.children.iter().filter_map(|node| match node {
            Node::Element(id) => Some(*id),
            Node::Text(_) | Node::Comment(_) => None,
        })
    }

    /// Concatenates the direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(text) => Some(text.as_str()),
                Node::Element(_) | Node::Comment(_) => None,
            })
            .collect()
    }

    /// Returns `true` when any direct text child holds non-whitespace.
    #[must_use]
    pub fn has_significant_text(&self) -> bool {
        self.children.iter().any(|node| match node {
            Node::Text(text) => !text.trim().is_empty(),
            Node::Element(_) | Node::Comment(_) => false,
        })
    }
}

/// Parsed XML document.
///
/// The document element is always present and always has
/// [`ElementId::ROOT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    root: Element,
    descendants: Vec<Element>,
}

impl Document {
    /// Parses well-formed XML text.
    ///
    /// Document type declarations are rejected. Processing instructions are
    /// dropped; comments, text and attributes are kept. Line endings and
    /// attribute values are normalised as an XML processor must.
    ///
    /// The tree is built from reader events with an explicit stack of open
    /// elements, so nesting depth costs heap, never call stack.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Malformed`] when the text is not well-formed.
    pub fn parse(xml: &str) -> Result<Self, DocumentError> {
        let mut reader = NsReader::from_str(xml);
        reader.check_comments(true);
        let mut builder = TreeBuilder::default();

        loop {
            let position = reader.buffer_position();
            let event = reader
                .read_event()
                .map_err(|err| DocumentError::Malformed(format!("{err} at byte {position}")))?;
            match event {
                Event::Start(start) => builder.open(element_from_start(&reader, &start)?)?,
                Event::Empty(start) => {
                    builder.open(element_from_start(&reader, &start)?)?;
                    builder.close()?;
                }
                Event::End(_) => builder.close()?,
                Event::Text(text) => {
                    let raw = normalize_line_endings(decode(&text)?);
                    builder.text(&unescape(&raw).map_err(malformed)?)?;
                }
                Event::CData(data) => builder.text(&normalize_line_endings(decode(&data)?))?,
                Event::Comment(comment) => {
                    builder.comment(normalize_line_endings(decode(&comment)?).into_owned());
                }
                Event::DocType(_) => {
                    return Err(DocumentError::Malformed(
                        "document type declarations are not allowed".to_owned(),
                    ));
                }
                Event::Decl(_) | Event::PI(_) => {}
                Event::Eof => return builder.finish(),
            }
        }
    }

    /// Returns the document element.
    #[must_use]
    pub const fn root(&self) -> &Element {
        &self.root
    }

    /// Looks up an element by identifier.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&Element> {
        match id.0 {
            0 => Some(&self.root),
            index => self.descendants.get(index - 1),
        }
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> Option<&mut Element> {
        match id.0 {
            0 => Some(&mut self.root),
            index => self.descendants.get_mut(index - 1),
        }
    }

    /// Returns the number of elements, the document element included.
    #[must_use]
    pub fn element_count(&self) -> usize {
        self.descendants.len() + 1
    }

    /// Iterates over the child elements of `id` in document order.
    pub fn child_elements(&self, id: ElementId) -> impl Iterator<Item = (ElementId, &Element)> {
        self.element(id)
            .into_iter()
            .flat_map(Element::child_element_ids)
            .filter_map(|child| self.element(child).map(|element| (child, element)))
    }

    /// Walks every element in document order, starting at the root.
    ///
    /// The walk uses an explicit stack, so its cost in call-stack space is
    /// constant.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            document: self,
            pending: vec![ElementId::ROOT],
        }
    }

    /// Writes the document as compact XML.
    ///
    /// Elements are written without prefixes, with a default namespace
    /// declaration wherever the in-scope default changes. Namespaced
    /// attributes keep their original prefix, declared on the element when
    /// it is not already in scope.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Write`] when the writer fails.
    pub fn to_xml_string(&self) -> Result<String, DocumentError> {
        let mut writer = Writer::new(Vec::new());
        let mut steps = vec![WriteStep::Open(&self.root, Scope::default())];

        while let Some(step) = steps.pop() {
            match step {
                WriteStep::Open(element, parent_scope) => {
                    let mut scope = parent_scope;
                    let start = start_tag(element, &mut scope);
                    if element.children.is_empty() {
                        write_event(&mut writer, Event::Empty(start))?;
                        continue;
                    }
                    write_event(&mut writer, Event::Start(start))?;
                    steps.push(WriteStep::Close(element.name.local_name()));
                    for child in element.children.iter().rev() {
                        match child {
                            Node::Element(id) => {
                                if let Some(child_element) = self.element(*id) {
                                    steps.push(WriteStep::Open(child_element, scope.clone()));
                                }
                            }
                            Node::Text(text) => steps.push(WriteStep::Text(text)),
                            Node::Comment(text) => steps.push(WriteStep::Comment(text)),
                        }
                    }
                }
                WriteStep::Close(local_name) => {
                    write_event(&mut writer, Event::End(BytesEnd::new(local_name)))?;
                }
                WriteStep::Text(text) => {
                    write_event(&mut writer, Event::Text(BytesText::from_escaped(escape_text(text))))?;
                }
                WriteStep::Comment(text) => {
                    write_event(&mut writer, Event::Comment(BytesText::from_escaped(text)))?;
                }
            }
        }

        String::from_utf8(writer.into_inner()).map_err(|err| DocumentError::Write(err.to_string()))
    }

    fn push(&mut self, element: Element) -> ElementId {
        self.descendants.push(element);
        ElementId(self.descendants.len())
    }

    pub(crate) fn rename_all(&mut self, namespace: &str) {
        let ids: Vec<ElementId> = self.walk().map(|(id, _)| id).collect();
        for id in ids {
            if let Some(element) = self.element_mut(id) {
                element.name.set_namespace(namespace);
            }
        }
    }
}

/// Pre-order iterator returned by [`Document::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    document: &'a Document,
    pending: Vec<ElementId>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (ElementId, &'a Element);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let id = self.pending.pop()?;
            let Some(element) = self.document.element(id) else {
                continue;
            };
            let children: Vec<ElementId> = element.child_element_ids().collect();
            self.pending.extend(children.into_iter().rev());
            return Some((id, element));
        }
    }
}

/// Assembles a [`Document`] from reader events.
#[derive(Default)]
struct TreeBuilder {
    document: Option<Document>,
    open: Vec<ElementId>,
}

impl TreeBuilder {
    fn open(&mut self, element: Element) -> Result<(), DocumentError> {
        let Some(document) = self.document.as_mut() else {
            self.document = Some(Document {
                root: element,
                descendants: Vec::new(),
            });
            self.open.push(ElementId::ROOT);
            return Ok(());
        };
        let Some(&parent) = self.open.last() else {
            return Err(DocumentError::Malformed(
                "content after the document element".to_owned(),
            ));
        };
        let id = document.push(element);
        if let Some(parent_element) = document.element_mut(parent) {
            parent_element.children.push(Node::Element(id));
        }
        self.open.push(id);
        Ok(())
    }

    fn close(&mut self) -> Result<(), DocumentError> {
        if self.open.pop().is_none() {
            return Err(DocumentError::Malformed("unexpected closing tag".to_owned()));
        }
        Ok(())
    }

    fn current(&mut self) -> Option<&mut Element> {
        let id = *self.open.last()?;
        self.document.as_mut()?.element_mut(id)
    }

    fn text(&mut self, text: &str) -> Result<(), DocumentError> {
        let Some(element) = self.current() else {
            if text.trim().is_empty() {
                return Ok(());
            }
            return Err(DocumentError::Malformed(
                "text outside the document element".to_owned(),
            ));
        };
        if let Some(Node::Text(previous)) = element.children.last_mut() {
            previous.push_str(text);
        } else if !text.is_empty() {
            element.children.push(Node::Text(text.to_owned()));
        }
        Ok(())
    }

    fn comment(&mut self, text: String) {
        // Comments around the document element are not part of the tree.
        if let Some(element) = self.current() {
            element.children.push(Node::Comment(text));
        }
    }

    fn finish(self) -> Result<Document, DocumentError> {
        match (self.document, self.open.last()) {
            (Some(document), None) => Ok(document),
            (Some(_), Some(_)) => Err(DocumentError::Malformed(
                "unexpected end of input inside an element".to_owned(),
            )),
            (None, _) => Err(DocumentError::Malformed("no document element".to_owned())),
        }
    }
}

fn element_from_start<R>(
    reader: &NsReader<R>,
    start: &BytesStart<'_>,
) -> Result<Element, DocumentError> {
    let (resolved, local_name) = reader.resolve_element(start.name());
    let name = QName::new(bound_namespace(resolved)?, decode(local_name.into_inner())?);

    let mut attributes = Vec::new();
    for parsed in start.attributes() {
        let attribute = parsed.map_err(malformed)?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let (attribute_namespace, attribute_local) = reader.resolve_attribute(attribute.key);
        let prefix = attribute
            .key
            .prefix()
            .map(|written| decode(written.into_inner()).map(str::to_owned))
            .transpose()?;
        let raw = normalize_line_endings(decode(&attribute.value)?).replace(['\t', '\n'], " ");
        attributes.push(Attribute::new(
            QName::new(
                bound_namespace(attribute_namespace)?,
                decode(attribute_local.into_inner())?,
            ),
            prefix,
            unescape(&raw).map_err(malformed)?,
        ));
    }

    Ok(Element {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn bound_namespace(resolved: ResolveResult<'_>) -> Result<Option<String>, DocumentError> {
    match resolved {
        ResolveResult::Bound(Namespace(uri)) => {
            Ok(Some(unescape(decode(uri)?).map_err(malformed)?.into_owned()))
        }
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(prefix) => Err(DocumentError::Malformed(format!(
            "namespace prefix '{}' is not declared",
            String::from_utf8_lossy(&prefix)
        ))),
    }
}

fn decode(bytes: &[u8]) -> Result<&str, DocumentError> {
    std::str::from_utf8(bytes).map_err(malformed)
}

fn malformed(err: impl fmt::Display) -> DocumentError {
    DocumentError::Malformed(err.to_string())
}

/// Folds `\r\n` and lone `\r` into `\n`.
fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if raw.contains('\r') {
        Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(raw)
    }
}

/// Escapes character data; a carriage return is written as a reference so
/// line-ending normalisation keeps it.
fn escape_text(text: &str) -> Cow<'_, str> {
    let escaped = escape(text);
    if escaped.contains('\r') {
        Cow::Owned(escaped.replace('\r', "&#13;"))
    } else {
        escaped
    }
}

/// Escapes an attribute value so attribute-value normalisation on the
/// reading side gives back the same characters.
fn escape_attribute(value: &str) -> Cow<'_, str> {
    let escaped = escape(value);
    if !escaped.contains(['\t', '\n', '\r']) {
        return escaped;
    }
    let mut written = String::with_capacity(escaped.len() + 8);
    for ch in escaped.chars() {
        match ch {
            '\t' => written.push_str("&#9;"),
            '\n' => written.push_str("&#10;"),
            '\r' => written.push_str("&#13;"),
            _ => written.push(ch),
        }
    }
    Cow::Owned(written)
}

fn push_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    start.push_attribute(XmlAttribute {
        key: XmlName(key.as_bytes()),
        value: Cow::Owned(escape_attribute(value).into_owned().into_bytes()),
    });
}

/// Namespace bindings in scope while writing.
#[derive(Debug, Clone, Default)]
struct Scope {
    default_namespace: Option<String>,
    prefixes: Vec<(String, String)>,
}

impl Scope {
    fn binding(&self, prefix: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .rev()
            .find(|(bound, _)| bound == prefix)
            .map(|(_, namespace)| namespace.as_str())
    }
}

enum WriteStep<'a> {
    Open(&'a Element, Scope),
    Close(&'a str),
    Text(&'a str),
    Comment(&'a str),
}

fn start_tag<'a>(element: &'a Element, scope: &mut Scope) -> BytesStart<'a> {
    let mut start = BytesStart::new(element.name.local_name());

    let namespace = element.name.namespace();
    if namespace != scope.default_namespace.as_deref() {
        push_attribute(&mut start, "xmlns", namespace.unwrap_or_default());
        scope.default_namespace = namespace.map(str::to_owned);
    }

    let mut generated = 0_usize;
    for attribute in &element.attributes {
        let Some(attribute_namespace) = attribute.name.namespace() else {
            push_attribute(&mut start, attribute.name.local_name(), &attribute.value);
            continue;
        };
        let prefix = if attribute_namespace == XML_NAMESPACE {
            "xml".to_owned()
        } else {
            let prefix = attribute.prefix.clone().unwrap_or_else(|| {
                generated += 1;
                format!("ns{generated}")
            });
            if scope.binding(&prefix) != Some(attribute_namespace) {
                push_attribute(&mut start, &format!("xmlns:{prefix}"), attribute_namespace);
                scope
                    .prefixes
                    .push((prefix.clone(), attribute_namespace.to_owned()));
            }
            prefix
        };
        let qualified = format!("{prefix}:{}", attribute.name.local_name());
        push_attribute(&mut start, &qualified, &attribute.value);
    }

    start
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<(), DocumentError> {
    writer
        .write_event(event)
        .map_err(|err| DocumentError::Write(err.to_string()))
}
