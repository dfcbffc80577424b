//! Typed property tables shared by the reader and the heap.
//!
//! Each owner declares its property ids as an enum implementing
//! [`PropertyKey`], with one [`PropertyDesc`] per id giving the default value
//! and whether callers may change it. A [`PropertyStore`] keeps the current
//! values and rejects writes to read-only ids and values of the wrong kind.

use std::convert::TryFrom;
use std::fmt;
use std::io::Read;
use std::marker::PhantomData;
use std::mem;
use std::sync::Arc;

use crate::reader::ReadState;
use crate::{Error, Result};

/// How a `<!DOCTYPE>` declaration is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtdProcessing {
    /// A document type declaration is an error.
    Prohibit,
    /// The declaration is reported as a [`NodeType::DocumentType`] node.
    ///
    /// [`NodeType::DocumentType`]: crate::NodeType::DocumentType
    Parse,
}

impl Default for DtdProcessing {
    fn default() -> Self {
        Self::Prohibit
    }
}

impl TryFrom<i64> for DtdProcessing {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            0 => Ok(Self::Prohibit),
            1 => Ok(Self::Parse),
            _ => Err(Error::InvalidArgument("unknown DTD processing mode")),
        }
    }
}

/// Resolves external entities, such as an external DTD subset.
///
/// The reader only stores the resolver; documents are parsed without loading
/// anything external.
pub trait XmlResolver: Send + Sync {
    /// Opens the entity identified by `public_id` and `system_id`, relative to
    /// `base_uri`. Returns `None` if it cannot be resolved.
    fn resolve(
        &self,
        base_uri: &str,
        public_id: Option<&str>,
        system_id: &str,
    ) -> Option<Box<dyn Read>>;
}

/// A property value.
#[derive(Clone)]
pub enum PropertyValue {
    /// A flag
    Bool(bool),
    /// A count or a size
    UInt(u64),
    /// See [`DtdProcessing`]
    DtdProcessing(DtdProcessing),
    /// A shared resolver, or none
    Resolver(Option<Arc<dyn XmlResolver>>),
    /// See [`ReadState`]
    ReadState(ReadState),
}

impl PropertyValue {
    /// Returns the flag of a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the content of a `UInt` value.
    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the content of a `DtdProcessing` value.
    pub fn as_dtd_processing(&self) -> Option<DtdProcessing> {
        match self {
            Self::DtdProcessing(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the content of a `Resolver` value.
    pub fn as_resolver(&self) -> Option<&Arc<dyn XmlResolver>> {
        match self {
            Self::Resolver(v) => v.as_ref(),
            _ => None,
        }
    }

    /// Returns the content of a `ReadState` value.
    pub fn as_read_state(&self) -> Option<ReadState> {
        match self {
            Self::ReadState(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Debug for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::UInt(v) => f.debug_tuple("UInt").field(v).finish(),
            Self::DtdProcessing(v) => f.debug_tuple("DtdProcessing").field(v).finish(),
            Self::Resolver(Some(r)) => write!(f, "Resolver({:p})", Arc::as_ptr(r)),
            Self::Resolver(None) => f.write_str("Resolver(None)"),
            Self::ReadState(v) => f.debug_tuple("ReadState").field(v).finish(),
        }
    }
}

impl PartialEq for PropertyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::UInt(a), Self::UInt(b)) => a == b,
            (Self::DtdProcessing(a), Self::DtdProcessing(b)) => a == b,
            (Self::Resolver(Some(a)), Self::Resolver(Some(b))) => Arc::ptr_eq(a, b),
            (Self::Resolver(None), Self::Resolver(None)) => true,
            (Self::ReadState(a), Self::ReadState(b)) => a == b,
            _ => false,
        }
    }
}

/// Static description of one property.
pub struct PropertyDesc<K> {
    /// The property this entry describes
    pub id: K,
    /// Read-only properties are computed by their owner and cannot be set.
    pub read_only: bool,
    /// Produces the initial value, which also fixes the kind of the property
    pub default: fn() -> PropertyValue,
}

/// An enum of property ids.
pub trait PropertyKey: Copy + Eq + fmt::Debug + 'static {
    /// All properties of this kind, in declaration order.
    fn descriptors() -> &'static [PropertyDesc<Self>];
}

/// Current values of all properties of one kind.
pub struct PropertyStore<K: PropertyKey> {
    values: Vec<PropertyValue>,
    _key: PhantomData<K>,
}

impl<K: PropertyKey> PropertyStore<K> {
    /// Creates a store holding the default of every property.
    pub fn new() -> Self {
        Self {
            values: K::descriptors().iter().map(|d| (d.default)()).collect(),
            _key: PhantomData,
        }
    }

    fn index(id: K) -> Result<usize> {
        K::descriptors()
            .iter()
            .position(|d| d.id == id)
            .ok_or(Error::InvalidArgument("unknown property"))
    }

    /// Returns the stored value of a property.
    pub fn get(&self, id: K) -> Result<&PropertyValue> {
        Ok(&self.values[Self::index(id)?])
    }

    /// Changes a property. The value must be of the same kind as the default.
    pub fn set(&mut self, id: K, value: PropertyValue) -> Result<()> {
        let index = Self::index(id)?;
        if K::descriptors()[index].read_only {
            return Err(Error::InvalidArgument("property is read-only"));
        }
        if mem::discriminant(&self.values[index]) != mem::discriminant(&value) {
            return Err(Error::InvalidArgument("property value of a wrong type"));
        }
        self.values[index] = value;
        Ok(())
    }

    /// Writes a value without the read-only check, for owners initializing
    /// their configuration.
    pub(crate) fn store(&mut self, id: K, value: PropertyValue) {
        if let Ok(index) = Self::index(id) {
            debug_assert!(mem::discriminant(&self.values[index]) == mem::discriminant(&value));
            self.values[index] = value;
        }
    }

    /// Restores all defaults.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl<K: PropertyKey> Default for PropertyStore<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: PropertyKey> fmt::Debug for PropertyStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map()
            .entries(K::descriptors().iter().map(|d| d.id).zip(&self.values))
            .finish()
    }
}

/// Properties of an [`XmlReader`](crate::XmlReader).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderProperty {
    /// `Bool`, `false` by default. Stored only.
    MultiLanguage,
    /// `Resolver`, `None` by default. Stored only, never called.
    XmlResolver,
    /// `DtdProcessing`, [`DtdProcessing::Prohibit`] by default.
    DtdProcessing,
    /// `ReadState`, read-only.
    ReadState,
    /// `UInt`, 256 by default. `0` disables the limit.
    MaxElementDepth,
}

/// Default nesting limit of a reader
pub const DEFAULT_MAX_ELEMENT_DEPTH: u64 = 256;

static READER_PROPERTIES: [PropertyDesc<ReaderProperty>; 5] = [
    PropertyDesc {
        id: ReaderProperty::MultiLanguage,
        read_only: false,
        default: || PropertyValue::Bool(false),
    },
    PropertyDesc {
        id: ReaderProperty::XmlResolver,
        read_only: false,
        default: || PropertyValue::Resolver(None),
    },
    PropertyDesc {
        id: ReaderProperty::DtdProcessing,
        read_only: false,
        default: || PropertyValue::DtdProcessing(DtdProcessing::Prohibit),
    },
    PropertyDesc {
        id: ReaderProperty::ReadState,
        read_only: true,
        default: || PropertyValue::ReadState(ReadState::Closed),
    },
    PropertyDesc {
        id: ReaderProperty::MaxElementDepth,
        read_only: false,
        default: || PropertyValue::UInt(DEFAULT_MAX_ELEMENT_DEPTH),
    },
];

impl PropertyKey for ReaderProperty {
    fn descriptors() -> &'static [PropertyDesc<Self>] {
        &READER_PROPERTIES
    }
}
