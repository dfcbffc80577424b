//! A streaming, pull-based XML reader.
//!
//! An [`XmlReader`] is a forward-only cursor: each [`read`](XmlReader::read)
//! moves it to the next node of the document, and the node's type, names,
//! namespace, value, attributes, depth and position are then queried with
//! getters. Nothing but the current node and the stack of open elements is
//! kept in memory.
//!
//! Input comes from any [`ByteSource`]. A source may be non-blocking: when it
//! has no data the reader returns [`Error::Pending`] and the call can simply be
//! repeated later. [`FeedSource`] is an in-memory source fed by the caller.
//!
//! ## Example
//!
//! ```
//! # use pretty_assertions::assert_eq;
//! use xml_cursor::{NodeType, XmlReader};
//!
//! let xml = r#"<?xml version="1.0"?>
//! <tag1 att1 = "test">
//!    <tag2><!--Test comment-->Test</tag2>
//!    <tag2>Test 2</tag2>
//! </tag1>"#;
//! let mut reader = XmlReader::from_str(xml);
//!
//! let mut count = 0;
//! let mut txt = Vec::new();
//! while let Some(node) = reader.read().unwrap() {
//!     match node {
//!         NodeType::Element => count += 1,
//!         NodeType::Text => txt.push(reader.value().unwrap().to_string()),
//!         _ => (),
//!     }
//! }
//! assert_eq!(count, 3);
//! assert_eq!(txt, ["Test", "Test 2"]);
//! ```
//!
//! ## Features
//!
#![cfg_attr(
    feature = "document-features",
    cfg_attr(doc, doc = ::document_features::document_features!())
)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub use encoding_rs;

mod errors;
mod escape;
pub mod heap;
pub mod name;
pub mod properties;
pub mod reader;

// reexports
pub use crate::errors::{Error, Result};
pub use crate::heap::{Heap, HeapProperty};
pub use crate::name::{NamespaceError, XMLNS_NAMESPACE, XML_NAMESPACE};
pub use crate::properties::{
    DtdProcessing, PropertyDesc, PropertyKey, PropertyStore, PropertyValue, ReaderProperty,
    XmlResolver,
};
pub use crate::reader::{
    ByteSource, EncodingRef, FeedSource, NodeType, Position, ReadState, ReaderBuilder,
    SourceStatus, ValueChunk, XmlReader,
};
