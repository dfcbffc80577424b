use std::sync::Arc;

use encoding_rs::Encoding;

use crate::heap::Heap;
use crate::properties::{
    DtdProcessing, PropertyStore, PropertyValue, ReaderProperty, XmlResolver,
    DEFAULT_MAX_ELEMENT_DEPTH,
};

use super::XmlReader;

/// Builder for configuring a new [`XmlReader`].
///
/// ```
/// use xml_cursor::{DtdProcessing, NodeType, XmlReader};
///
/// let mut reader = XmlReader::builder()
///     .dtd_processing(DtdProcessing::Parse)
///     .max_element_depth(4)
///     .into_str_reader("<!DOCTYPE a><a/>");
/// assert_eq!(reader.read().unwrap(), Some(NodeType::DocumentType));
/// ```
pub struct ReaderBuilder {
    max_element_depth: u64,
    dtd_processing: DtdProcessing,
    multi_language: bool,
    resolver: Option<Arc<dyn XmlResolver>>,
    encoding: Option<&'static Encoding>,
    heap: Option<Arc<Heap>>,
}

impl Default for ReaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderBuilder {
    /// Create a new default [`ReaderBuilder`].
    pub fn new() -> Self {
        Self {
            max_element_depth: DEFAULT_MAX_ELEMENT_DEPTH,
            dtd_processing: DtdProcessing::Prohibit,
            multi_language: false,
            resolver: None,
            encoding: None,
            heap: None,
        }
    }

    /// Limits how deep elements may nest. A document going deeper fails with
    /// [`Error::MaxElementDepth`]. Moving onto the attributes of a node counts
    /// as one more level.
    ///
    /// (`256` by default, `0` disables the limit)
    ///
    /// [`Error::MaxElementDepth`]: crate::Error::MaxElementDepth
    pub fn max_element_depth(mut self, val: u64) -> Self {
        self.max_element_depth = val;
        self
    }

    /// Changes how `<!DOCTYPE>` declarations are treated.
    ///
    /// ([`DtdProcessing::Prohibit`] by default)
    pub fn dtd_processing(mut self, val: DtdProcessing) -> Self {
        self.dtd_processing = val;
        self
    }

    /// Sets the multi-language flag. The reader only stores it.
    ///
    /// (`false` by default)
    pub fn multi_language(mut self, val: bool) -> Self {
        self.multi_language = val;
        self
    }

    /// Stores a resolver for external entities. The reader never calls it.
    pub fn resolver(mut self, val: Arc<dyn XmlResolver>) -> Self {
        self.resolver = Some(val);
        self
    }

    /// Decodes every input with `encoding`, ignoring byte order marks and
    /// the `encoding` of the XML declaration.
    pub fn encoding(mut self, val: &'static Encoding) -> Self {
        self.encoding = Some(val);
        self
    }

    /// Charges the memory of node values to `heap`. A value that does not fit
    /// fails the reader with [`Error::QuotaExceeded`].
    ///
    /// [`Error::QuotaExceeded`]: crate::Error::QuotaExceeded
    pub fn heap(mut self, val: Arc<Heap>) -> Self {
        self.heap = Some(val);
        self
    }

    /// Builds a new [`XmlReader`] without input. Attach one with
    /// [`XmlReader::set_input`].
    pub fn build<R>(self) -> XmlReader<R> {
        let mut properties = PropertyStore::new();
        properties.store(
            ReaderProperty::MaxElementDepth,
            PropertyValue::UInt(self.max_element_depth),
        );
        properties.store(
            ReaderProperty::DtdProcessing,
            PropertyValue::DtdProcessing(self.dtd_processing),
        );
        properties.store(
            ReaderProperty::MultiLanguage,
            PropertyValue::Bool(self.multi_language),
        );
        properties.store(
            ReaderProperty::XmlResolver,
            PropertyValue::Resolver(self.resolver),
        );
        XmlReader::with_config(properties, self.encoding, self.heap)
    }

    /// Builds a new [`XmlReader`] reading from the given source.
    pub fn into_reader<R>(self, source: R) -> XmlReader<R> {
        let mut reader = self.build();
        reader.set_input(Some(source));
        reader
    }

    /// Builds a new [`XmlReader`] reading from the given string slice.
    pub fn into_str_reader(self, str: &str) -> XmlReader<&[u8]> {
        self.into_reader(str.as_bytes())
    }
}
