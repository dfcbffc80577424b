//! Contains the [`XmlReader`], a pull cursor over the nodes of a document.

#[cfg(feature = "async")]
mod azync;
mod builder;
mod input;
mod lexer;
mod scanner;
mod source;
mod value;

use std::mem;
use std::sync::Arc;

use encoding_rs::Encoding;
use log::{debug, trace};

use crate::errors::{Error, Result};
use crate::heap::Heap;
use crate::name::{NamespaceResolver, QName, XMLNS_NAMESPACE};
use crate::properties::{
    DtdProcessing, PropertyStore, PropertyValue, ReaderProperty, XmlResolver,
    DEFAULT_MAX_ELEMENT_DEPTH,
};

use self::input::Input;
use self::lexer::{Attr, Body, Lexer, Tag, Token};
use self::value::ValueBuffer;

pub use self::builder::ReaderBuilder;
pub use self::input::EncodingRef;
pub use self::scanner::Position;
pub use self::source::{ByteSource, FeedSource, SourceStatus};
pub use self::value::ValueChunk;

/// Kind of the node the reader is positioned on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// No node: before the first read, at the end of the document or after an
    /// error.
    None,
    /// A start tag or an empty element tag
    Element,
    /// An attribute of an element, a document type or an XML declaration,
    /// reached with the attribute navigation methods
    Attribute,
    /// Character data with at least one non-whitespace character
    Text,
    /// A CDATA section
    CData,
    /// A processing instruction
    ProcessingInstruction,
    /// A comment
    Comment,
    /// A `<!DOCTYPE>` declaration
    DocumentType,
    /// Character data consisting of whitespace only
    Whitespace,
    /// An end tag, or the end of an empty element
    EndElement,
    /// The `<?xml ...?>` declaration
    XmlDeclaration,
}

impl Default for NodeType {
    fn default() -> Self {
        Self::None
    }
}

/// Lifecycle of a reader.
///
/// ```mermaid
/// flowchart LR
///   Closed      -- set_input --> Initial
///   Initial     -- read      --> Interactive
///   Interactive -- read      --> EndOfFile
///   Initial     -- failure   --> Error
///   Interactive -- failure   --> Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadState {
    /// Input is attached, nothing was read yet
    Initial,
    /// The reader is positioned on a node
    Interactive,
    /// Reading failed. The reader keeps reporting the error until a new input
    /// is attached.
    Error,
    /// The whole document was read
    EndOfFile,
    /// No input is attached
    Closed,
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Where the input of a reader stands.
enum Slot<R> {
    /// No input was ever attached
    Detached,
    /// The input was removed with `set_input(None)`
    Cleared,
    Attached(Lexer<R>),
}

impl<R> Slot<R> {
    fn lexer(&self) -> Option<&Lexer<R>> {
        match self {
            Slot::Attached(lexer) => Some(lexer),
            _ => None,
        }
    }

    fn lexer_mut(&mut self) -> Option<&mut Lexer<R>> {
        match self {
            Slot::Attached(lexer) => Some(lexer),
            _ => None,
        }
    }
}

/// Part of the document the reader is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Before the root element
    Prolog,
    /// Inside the root element
    Content,
    /// After the root element
    Epilog,
}

#[derive(Debug, Clone, Default)]
struct Attribute {
    name: QName,
    namespace: String,
    value: String,
    position: Position,
}

impl Attribute {
    /// Attributes of declarations belong to no namespace
    fn unbound(attr: Attr) -> Self {
        Self::bound(attr, String::new())
    }

    fn bound(attr: Attr, namespace: String) -> Self {
        Self {
            name: attr.name,
            namespace,
            value: attr.value,
            position: attr.position,
        }
    }
}

/// The node the reader is positioned on, not counting the attribute cursor.
#[derive(Debug, Default)]
struct Node {
    kind: NodeType,
    name: QName,
    namespace: String,
    position: Position,
    depth: usize,
    /// Element was written as `<name/>`
    empty: bool,
    attributes: Vec<Attribute>,
    /// Value reported when positioned on this node itself, for nodes that have
    /// attributes
    value: String,
}

/// An open element.
#[derive(Debug)]
struct ElementFrame {
    name: QName,
    namespace: String,
    /// Number of namespace bindings declared on this element
    bindings: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// A forward-only cursor over the nodes of an XML document.
///
/// Every successful [`read`](Self::read) moves the reader to the next node,
/// whose type, names, value and attributes are then available through the
/// getters. Each element, including an empty one written as `<tag/>`, is
/// reported as an [`Element`] followed by an [`EndElement`] node on the same
/// [`depth`](Self::depth).
///
/// # Pending input
///
/// When the [`ByteSource`] has no data right now, methods fail with
/// [`Error::Pending`]. This does not change the reader state: the call can be
/// repeated once more data has arrived.
///
/// # Errors
///
/// Any other error is fatal. The reader moves to [`ReadState::Error`], reports
/// [`NodeType::None`] on depth 0 and returns the same error from every
/// following `read` until a new input is attached.
///
/// # Examples
///
/// ```
/// # use pretty_assertions::assert_eq;
/// use xml_cursor::{NodeType, XmlReader};
///
/// let mut reader = XmlReader::from_str(r#"<a xmlns="urn:a" id="1"><b>text</b></a>"#);
/// let mut elements = Vec::new();
/// while let Some(node) = reader.read().unwrap() {
///     if node == NodeType::Element {
///         elements.push((reader.depth(), reader.local_name().to_string()));
///         assert_eq!(reader.namespace_uri(), "urn:a");
///     }
/// }
/// assert_eq!(elements, [(0, "a".to_string()), (1, "b".to_string())]);
/// ```
///
/// [`Element`]: NodeType::Element
/// [`EndElement`]: NodeType::EndElement
pub struct XmlReader<R> {
    slot: Slot<R>,
    state: ReadState,
    /// The failure reported while in [`ReadState::Error`]
    error: Option<Error>,
    node: Node,
    /// Index of the attribute the cursor is on
    attr: Option<usize>,
    frames: Vec<ElementFrame>,
    namespaces: NamespaceResolver,
    phase: Phase,
    doctype_seen: bool,
    /// Current node is an empty element whose end was not reported yet
    pending_end: bool,
    /// Current node is an end element whose frame is still on the stack
    pending_pop: bool,
    value: ValueBuffer,
    properties: PropertyStore<ReaderProperty>,
    /// Encoding forced for every attached input
    encoding: Option<&'static Encoding>,
}

impl XmlReader<()> {
    /// Create a new builder for configuring a reader.
    pub fn builder() -> ReaderBuilder {
        ReaderBuilder::new()
    }
}

impl<'a> XmlReader<&'a [u8]> {
    /// Creates a reader over a string with the default configuration.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &'a str) -> Self {
        Self::from_source(s.as_bytes())
    }
}

/// Builder methods
impl<R> XmlReader<R> {
    /// Creates a reader with the default configuration and no input.
    pub fn new() -> Self {
        Self::with_config(PropertyStore::new(), None, None)
    }

    /// Creates a reader with the default configuration over `source`.
    pub fn from_source(source: R) -> Self {
        let mut reader = Self::new();
        reader.set_input(Some(source));
        reader
    }

    pub(crate) fn with_config(
        properties: PropertyStore<ReaderProperty>,
        encoding: Option<&'static Encoding>,
        heap: Option<Arc<Heap>>,
    ) -> Self {
        Self {
            slot: Slot::Detached,
            state: ReadState::Closed,
            error: None,
            node: Node::default(),
            attr: None,
            frames: Vec::new(),
            namespaces: NamespaceResolver::default(),
            phase: Phase::Prolog,
            doctype_seen: false,
            pending_end: false,
            pending_pop: false,
            value: ValueBuffer::new(heap),
            properties,
            encoding,
        }
    }
}

impl<R> Default for XmlReader<R> {
    fn default() -> Self {
        Self::new()
    }
}

/// Input management
impl<R> XmlReader<R> {
    /// Attaches a new input, or detaches the current one with `None`, and
    /// returns the previous input.
    ///
    /// All document state is reset; properties are kept.
    pub fn set_input(&mut self, source: Option<R>) -> Option<R> {
        self.clear_document();
        let previous = match mem::replace(&mut self.slot, Slot::Cleared) {
            Slot::Attached(lexer) => Some(lexer.into_input().into_source()),
            _ => None,
        };
        match source {
            Some(source) => {
                debug!("input attached");
                self.slot = Slot::Attached(Lexer::new(Input::new(source, self.encoding)));
                self.state = ReadState::Initial;
            }
            None => {
                debug!("input cleared");
                self.state = ReadState::Closed;
            }
        }
        previous
    }

    /// Returns `true` if the input was removed with `set_input(None)`, as
    /// opposed to never having been attached.
    pub fn is_input_cleared(&self) -> bool {
        matches!(self.slot, Slot::Cleared)
    }

    /// Gets a reference to the attached input.
    pub fn source(&self) -> Option<&R> {
        self.slot.lexer().map(|lexer| lexer.input().source())
    }

    /// Gets a mutable reference to the attached input, for example to push
    /// more bytes into a [`FeedSource`].
    pub fn source_mut(&mut self) -> Option<&mut R> {
        self.slot.lexer_mut().map(|lexer| lexer.input_mut().source_mut())
    }

    /// Consumes the reader, returning the attached input.
    pub fn into_source(self) -> Option<R> {
        match self.slot {
            Slot::Attached(lexer) => Some(lexer.into_input().into_source()),
            _ => None,
        }
    }

    /// Get the encoding used to decode the input, if one is attached.
    ///
    /// It may change after the first read, once a byte order mark or an XML
    /// declaration was seen.
    pub fn encoding(&self) -> Option<EncodingRef> {
        self.slot.lexer().map(|lexer| lexer.input().encoding())
    }

    fn clear_document(&mut self) {
        self.clear_node();
        self.node.position = Position::default();
        self.frames.clear();
        self.namespaces.clear();
        self.phase = Phase::Prolog;
        self.doctype_seen = false;
        self.pending_end = false;
        self.pending_pop = false;
        self.error = None;
    }

    fn clear_node(&mut self) {
        self.node = Node::default();
        self.attr = None;
        self.value.clear();
    }

    /// Moves to the Error state, returning the error for the caller
    fn fail(&mut self, error: Error) -> Error {
        debug!("reader failed: {}", error);
        let position = self
            .slot
            .lexer()
            .map_or_else(Position::default, Lexer::token_start);
        self.clear_document();
        self.node.position = position;
        self.state = ReadState::Error;
        self.error = Some(error.clone());
        error
    }
}

/// Properties
impl<R> XmlReader<R> {
    /// Returns the current value of a property.
    pub fn property(&self, id: ReaderProperty) -> Result<PropertyValue> {
        match id {
            ReaderProperty::ReadState => Ok(PropertyValue::ReadState(self.read_state())),
            _ => self.properties.get(id).map(Clone::clone),
        }
    }

    /// Changes a property. Read-only properties and values of the wrong kind
    /// are rejected with [`Error::InvalidArgument`] and leave the reader
    /// untouched.
    pub fn set_property(&mut self, id: ReaderProperty, value: PropertyValue) -> Result<()> {
        self.properties.set(id, value)
    }

    /// Returns the lifecycle state.
    pub fn read_state(&self) -> ReadState {
        match self.slot {
            Slot::Attached(_) => self.state,
            _ => ReadState::Closed,
        }
    }

    /// Maximum nesting of elements, `0` if unlimited.
    pub fn max_element_depth(&self) -> u64 {
        self.properties
            .get(ReaderProperty::MaxElementDepth)
            .ok()
            .and_then(PropertyValue::as_uint)
            .unwrap_or(DEFAULT_MAX_ELEMENT_DEPTH)
    }

    /// Limits the nesting of elements. `0` disables the limit.
    pub fn set_max_element_depth(&mut self, depth: u64) {
        self.properties
            .store(ReaderProperty::MaxElementDepth, PropertyValue::UInt(depth));
    }

    /// How `<!DOCTYPE>` declarations are treated.
    pub fn dtd_processing(&self) -> DtdProcessing {
        self.properties
            .get(ReaderProperty::DtdProcessing)
            .ok()
            .and_then(PropertyValue::as_dtd_processing)
            .unwrap_or_default()
    }

    /// Changes how `<!DOCTYPE>` declarations are treated.
    pub fn set_dtd_processing(&mut self, mode: DtdProcessing) {
        self.properties
            .store(ReaderProperty::DtdProcessing, PropertyValue::DtdProcessing(mode));
    }

    /// The stored resolver for external entities.
    pub fn resolver(&self) -> Option<Arc<dyn XmlResolver>> {
        self.properties
            .get(ReaderProperty::XmlResolver)
            .ok()
            .and_then(PropertyValue::as_resolver)
            .cloned()
    }

    /// Stores a resolver for external entities. The reader never calls it.
    pub fn set_resolver(&mut self, resolver: Option<Arc<dyn XmlResolver>>) {
        self.properties
            .store(ReaderProperty::XmlResolver, PropertyValue::Resolver(resolver));
    }

    /// The multi-language flag.
    pub fn multi_language(&self) -> bool {
        self.properties
            .get(ReaderProperty::MultiLanguage)
            .ok()
            .and_then(PropertyValue::as_bool)
            .unwrap_or(false)
    }

    /// Changes the multi-language flag. It is stored only.
    pub fn set_multi_language(&mut self, value: bool) {
        self.properties
            .store(ReaderProperty::MultiLanguage, PropertyValue::Bool(value));
    }
}

/// Getters
impl<R> XmlReader<R> {
    fn current_attribute(&self) -> Option<&Attribute> {
        self.attr.and_then(|i| self.node.attributes.get(i))
    }

    /// Type of the current node.
    pub fn node_type(&self) -> NodeType {
        if self.attr.is_some() {
            NodeType::Attribute
        } else {
            self.node.kind
        }
    }

    /// Nesting depth of the current node. The root element is on depth 0, its
    /// children and its attributes on depth 1.
    pub fn depth(&self) -> usize {
        self.node.depth + self.attr.map_or(0, |_| 1)
    }

    /// Position of the current node, `0:0` before the first read.
    pub fn position(&self) -> Position {
        self.current_attribute()
            .map_or(self.node.position, |a| a.position)
    }

    /// Line of the current node, starting from 1.
    pub fn line_number(&self) -> u32 {
        self.position().line
    }

    /// Column of the current node, starting from 1.
    pub fn line_position(&self) -> u32 {
        self.position().column
    }

    /// Returns `true` once the whole document was read.
    pub fn is_eof(&self) -> bool {
        self.read_state() == ReadState::EndOfFile
    }

    /// Local part of the name of the current node. Empty for nodes without
    /// a name.
    pub fn local_name(&self) -> &str {
        match self.current_attribute() {
            Some(attr) => attr.name.local_name(),
            None => self.node.name.local_name(),
        }
    }

    /// Prefixed name of the current node, as written in the document.
    pub fn qualified_name(&self) -> &str {
        match self.current_attribute() {
            Some(attr) => attr.name.as_str(),
            None => self.node.name.as_str(),
        }
    }

    /// Namespace prefix of the current node, empty if there is none.
    pub fn prefix(&self) -> &str {
        match self.current_attribute() {
            Some(attr) => attr.name.prefix(),
            None => self.node.name.prefix(),
        }
    }

    /// Namespace URI of the current node, empty if it has none.
    pub fn namespace_uri(&self) -> &str {
        match self.current_attribute() {
            Some(attr) => &attr.namespace,
            None => &self.node.namespace,
        }
    }

    /// Returns `true` if the cursor is on an attribute declaring a namespace
    /// (`xmlns` or `xmlns:prefix`).
    pub fn is_namespace_declaration(&self) -> bool {
        self.current_attribute()
            .map_or(false, |attr| attr.namespace == XMLNS_NAMESPACE)
    }

    /// Returns `true` if the current element was written as `<name/>`.
    pub fn is_empty_element(&self) -> bool {
        self.node.kind == NodeType::Element && self.node.empty
    }

    /// Number of attributes of the current element, document type or XML
    /// declaration.
    pub fn attribute_count(&self) -> usize {
        self.node.attributes.len()
    }
}

/// Attribute navigation
impl<R> XmlReader<R> {
    /// Moves to the first attribute of the current node.
    ///
    /// Returns `Ok(false)` if there are no attributes. Stepping onto an
    /// attribute counts as one more nesting level against the
    /// [maximum depth](Self::max_element_depth).
    pub fn move_to_first_attribute(&mut self) -> Result<bool> {
        if self.node.attributes.is_empty() {
            return Ok(false);
        }
        let max = self.max_element_depth();
        if max != 0 && self.node.depth as u64 + 1 > max {
            return Err(self.fail(Error::MaxElementDepth));
        }
        self.move_to_attribute(0)?;
        Ok(true)
    }

    /// Moves to the next attribute, or to the first one when positioned on
    /// the node itself. Returns `Ok(false)` after the last attribute.
    pub fn move_to_next_attribute(&mut self) -> Result<bool> {
        match self.attr {
            None => self.move_to_first_attribute(),
            Some(i) if i + 1 < self.node.attributes.len() => {
                self.move_to_attribute(i + 1)?;
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// Moves from an attribute back to its node. Returns `Ok(false)` if the
    /// cursor was not on an attribute.
    pub fn move_to_element(&mut self) -> Result<bool> {
        if self.attr.take().is_none() {
            return Ok(false);
        }
        if let Err(e) = self.value.set(&self.node.value) {
            return Err(self.fail(e));
        }
        Ok(true)
    }

    fn move_to_attribute(&mut self, index: usize) -> Result<()> {
        self.attr = Some(index);
        let value = &self.node.attributes[index].value;
        if let Err(e) = self.value.set(value) {
            return Err(self.fail(e));
        }
        Ok(())
    }
}

/// Read methods
impl<R: ByteSource> XmlReader<R> {
    /// Moves to the next node and returns its type, or `None` at the end of
    /// the document.
    ///
    /// After the end was reached every call returns `Ok(None)` again.
    ///
    /// # Errors
    ///
    /// [`Error::Pending`] if the source has no data right now; the call
    /// can be repeated. [`Error::InvalidArgument`] if no input is attached.
    /// Anything else moves the reader to [`ReadState::Error`].
    pub fn read(&mut self) -> Result<Option<NodeType>> {
        match self.state {
            ReadState::Error => {
                return Err(match &self.error {
                    Some(e) => e.clone(),
                    None => Error::InvalidArgument("reader failed"),
                })
            }
            ReadState::EndOfFile => return Ok(None),
            _ => {}
        }
        if self.slot.lexer().is_none() {
            return Err(Error::InvalidArgument("no input attached"));
        }
        match self.advance() {
            Ok(Some(kind)) => {
                self.state = ReadState::Interactive;
                trace!(
                    "{:?} `{}` at {}:{}, depth {}",
                    kind,
                    self.node.name,
                    self.node.position.line,
                    self.node.position.column,
                    self.node.depth
                );
                Ok(Some(kind))
            }
            Ok(None) => {
                debug!("end of document");
                self.state = ReadState::EndOfFile;
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            Err(e) => Err(e),
        }
    }

    /// Returns the value of the current node: the text of character data,
    /// comments and CDATA sections, the data of a processing instruction, the
    /// internal subset of a document type or the value of an attribute. Empty
    /// for other nodes.
    ///
    /// The part already returned by [`read_value_chunk`] is not included.
    ///
    /// [`read_value_chunk`]: Self::read_value_chunk
    pub fn value(&mut self) -> Result<&str> {
        if let Some(lexer) = self.slot.lexer_mut() {
            if let Err(e) = self.value.complete(lexer) {
                return Err(if e.is_fatal() { self.fail(e) } else { e });
            }
        }
        Ok(self.value.value())
    }

    /// Moves up to `max` characters from the front of the current value into
    /// `out`.
    ///
    /// Returns [`ValueChunk::Unavailable`] once [`value`](Self::value) was
    /// called for the current node. A `max` of 0 always reads nothing.
    pub fn read_value_chunk(&mut self, out: &mut String, max: usize) -> Result<ValueChunk> {
        match self.value.read_chunk(self.slot.lexer_mut(), out, max) {
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            result => result,
        }
    }

    fn advance(&mut self) -> Result<Option<NodeType>> {
        if let Some(lexer) = self.slot.lexer_mut() {
            // the unread rest of the previous value comes before the next node
            self.value.complete(lexer)?;
        }
        if self.pending_pop {
            self.pending_pop = false;
            self.pop_frame();
        }
        if self.pending_end {
            self.pending_end = false;
            return Ok(Some(self.end_empty_element()));
        }

        let dtd = self.dtd_processing();
        let token = match self.slot.lexer_mut() {
            Some(lexer) => lexer.next_token(dtd)?,
            None => return Err(Error::InvalidArgument("no input attached")),
        };
        self.attr = None;
        self.value.clear();
        let depth = self.frames.len();
        let kind = match token {
            Token::Eof => return self.finish(),
            Token::XmlDecl {
                attributes,
                position,
            } => {
                self.set_node(NodeType::XmlDeclaration, QName::local("xml"), position, 0);
                self.node.attributes = attributes.into_iter().map(Attribute::unbound).collect();
                NodeType::XmlDeclaration
            }
            Token::StartTag(tag) => self.start_element(tag, false)?,
            Token::EmptyElementTag(tag) => self.start_element(tag, true)?,
            Token::EndTag { name, position } => self.end_element(name, position)?,
            Token::Text { text, position } => {
                if self.phase != Phase::Content {
                    return Err(Error::Syntax("text outside of the root element"));
                }
                self.set_node(NodeType::Text, QName::default(), position, depth);
                self.value.set(&text)?;
                NodeType::Text
            }
            Token::Whitespace { text, position } => {
                self.set_node(NodeType::Whitespace, QName::default(), position, depth);
                self.value.set(&text)?;
                NodeType::Whitespace
            }
            Token::CData { position } => {
                if self.phase != Phase::Content {
                    return Err(Error::Syntax("CDATA section outside of the root element"));
                }
                self.set_node(NodeType::CData, QName::default(), position, depth);
                self.start_body(Body::CData)?;
                NodeType::CData
            }
            Token::Comment { position } => {
                self.set_node(NodeType::Comment, QName::default(), position, depth);
                self.start_body(Body::Comment)?;
                NodeType::Comment
            }
            Token::Pi { target, position } => {
                let kind = NodeType::ProcessingInstruction;
                self.set_node(kind, QName::local(target), position, depth);
                self.start_body(Body::Pi)?;
                kind
            }
            Token::DocType {
                name,
                attributes,
                subset,
                position,
            } => {
                if self.phase != Phase::Prolog || self.doctype_seen {
                    return Err(Error::Syntax("misplaced DOCTYPE"));
                }
                self.doctype_seen = true;
                self.set_node(NodeType::DocumentType, QName::local(name), position, 0);
                self.node.attributes = attributes.into_iter().map(Attribute::unbound).collect();
                self.node.value = subset;
                self.value.set(&self.node.value)?;
                NodeType::DocumentType
            }
        };
        Ok(Some(kind))
    }

    fn set_node(&mut self, kind: NodeType, name: QName, position: Position, depth: usize) {
        self.node = Node {
            kind,
            name,
            position,
            depth,
            ..Node::default()
        };
    }

    fn start_body(&mut self, body: Body) -> Result<()> {
        self.value.start(body);
        match self.slot.lexer_mut() {
            Some(lexer) => self.value.prefetch(lexer),
            None => Ok(()),
        }
    }

    fn start_element(&mut self, tag: Tag, empty: bool) -> Result<NodeType> {
        if self.phase == Phase::Epilog {
            return Err(Error::Syntax("element after the root element"));
        }
        let max = self.max_element_depth();
        if max != 0 && self.frames.len() as u64 + 1 > max {
            return Err(Error::MaxElementDepth);
        }

        // declarations apply to the name of the element declaring them
        let mut bindings = 0;
        for attr in &tag.attributes {
            if let Some(prefix) = attr.name.as_namespace_binding() {
                self.namespaces.bind(prefix, &attr.value)?;
                bindings += 1;
            }
        }
        let namespace = self.namespaces.resolve_element(&tag.name)?.to_string();
        let mut attributes = Vec::with_capacity(tag.attributes.len());
        for attr in tag.attributes {
            let namespace = self.namespaces.resolve_attribute(&attr.name)?.to_string();
            // different prefixes may still expand to the same name
            let duplicate = !namespace.is_empty()
                && attributes.iter().any(|a: &Attribute| {
                    a.namespace == namespace && a.name.local_name() == attr.name.local_name()
                });
            if duplicate {
                return Err(Error::DuplicateAttribute(attr.name.to_string()));
            }
            attributes.push(Attribute::bound(attr, namespace));
        }

        let depth = self.frames.len();
        self.frames.push(ElementFrame {
            name: tag.name.clone(),
            namespace: namespace.clone(),
            bindings,
        });
        self.phase = Phase::Content;
        self.set_node(NodeType::Element, tag.name, tag.position, depth);
        self.node.namespace = namespace;
        self.node.attributes = attributes;
        self.node.empty = empty;
        self.pending_end = empty;
        Ok(NodeType::Element)
    }

    fn end_element(&mut self, name: QName, position: Position) -> Result<NodeType> {
        let frame = match self.frames.last() {
            Some(frame) => frame,
            None if self.phase == Phase::Prolog => return Err(Error::QNameCharacter),
            None => return Err(Error::Syntax("end tag after the root element")),
        };
        if frame.name != name {
            return Err(Error::ElementMatch {
                expected: frame.name.to_string(),
                found: name.to_string(),
            });
        }
        let namespace = frame.namespace.clone();
        let depth = self.frames.len() - 1;
        self.set_node(NodeType::EndElement, name, position, depth);
        self.node.namespace = namespace;
        self.pending_pop = true;
        Ok(NodeType::EndElement)
    }

    /// Turns the current empty element into its end
    fn end_empty_element(&mut self) -> NodeType {
        self.attr = None;
        self.value.clear();
        self.node.kind = NodeType::EndElement;
        self.node.empty = false;
        self.node.attributes.clear();
        self.node.value.clear();
        self.pending_pop = true;
        NodeType::EndElement
    }

    fn pop_frame(&mut self) {
        if let Some(frame) = self.frames.pop() {
            self.namespaces.unbind(frame.bindings);
        }
        if self.frames.is_empty() {
            self.phase = Phase::Epilog;
        }
    }

    fn finish(&mut self) -> Result<Option<NodeType>> {
        if let Some(frame) = self.frames.last() {
            return Err(Error::UnexpectedEof(format!("</{}>", frame.name)));
        }
        if self.phase == Phase::Prolog {
            return Err(Error::Syntax("document has no root element"));
        }
        let position = self
            .slot
            .lexer()
            .map_or_else(Position::default, Lexer::position);
        self.node = Node {
            position,
            ..Node::default()
        };
        Ok(None)
    }
}
