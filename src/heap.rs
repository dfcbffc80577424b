//! A byte quota that readers and their callers draw buffers from.

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::properties::{PropertyDesc, PropertyKey, PropertyStore, PropertyValue};
use crate::{Error, Result};

/// Properties of a [`Heap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapProperty {
    /// `UInt`, the most bytes that may be allocated at once.
    MaxSize,
    /// `UInt`, stored only.
    TrimSize,
    /// `UInt`, read-only: bytes currently allocated.
    RequestedSize,
    /// `UInt`, read-only: same as `RequestedSize`.
    ActualSize,
}

static HEAP_PROPERTIES: [PropertyDesc<HeapProperty>; 4] = [
    PropertyDesc {
        id: HeapProperty::MaxSize,
        read_only: false,
        default: || PropertyValue::UInt(0),
    },
    PropertyDesc {
        id: HeapProperty::TrimSize,
        read_only: false,
        default: || PropertyValue::UInt(0),
    },
    PropertyDesc {
        id: HeapProperty::RequestedSize,
        read_only: true,
        default: || PropertyValue::UInt(0),
    },
    PropertyDesc {
        id: HeapProperty::ActualSize,
        read_only: true,
        default: || PropertyValue::UInt(0),
    },
];

impl PropertyKey for HeapProperty {
    fn descriptors() -> &'static [PropertyDesc<Self>] {
        &HEAP_PROPERTIES
    }
}

#[derive(Debug)]
struct HeapState {
    properties: PropertyStore<HeapProperty>,
    allocated: usize,
}

impl HeapState {
    fn max_size(&self) -> usize {
        self.properties
            .get(HeapProperty::MaxSize)
            .ok()
            .and_then(PropertyValue::as_uint)
            .unwrap_or(0) as usize
    }
}

/// A quota of bytes shared between everyone holding the heap.
///
/// Every allocation is checked against [`HeapProperty::MaxSize`] under one
/// lock, so a heap can be shared between threads in an [`Arc`].
///
/// ```
/// use xml_cursor::{Error, Heap};
///
/// let heap = Heap::new(8, 0);
/// let buf = heap.alloc(6).unwrap();
/// assert!(matches!(heap.alloc(3), Err(Error::QuotaExceeded)));
/// heap.free(buf);
/// assert!(heap.alloc(8).is_ok());
/// ```
///
/// [`Arc`]: std::sync::Arc
#[derive(Debug)]
pub struct Heap {
    state: Mutex<HeapState>,
}

impl Heap {
    /// Creates a heap allowing `max_size` bytes to be allocated at once.
    pub fn new(max_size: usize, trim_size: usize) -> Self {
        let mut properties = PropertyStore::new();
        properties.store(HeapProperty::MaxSize, PropertyValue::UInt(max_size as u64));
        properties.store(HeapProperty::TrimSize, PropertyValue::UInt(trim_size as u64));
        Self {
            state: Mutex::new(HeapState {
                properties,
                allocated: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HeapState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Allocates a zeroed buffer of `size` bytes.
    pub fn alloc(&self, size: usize) -> Result<Vec<u8>> {
        self.charge(size)?;
        Ok(vec![0; size])
    }

    /// Returns a buffer obtained from [`alloc`](Self::alloc) to the quota.
    pub fn free(&self, buf: Vec<u8>) {
        self.release(buf.len());
    }

    /// Forgets all allocations. Buffers handed out before stay valid but no
    /// longer count against the quota.
    pub fn reset(&self) {
        self.lock().allocated = 0;
    }

    /// Number of bytes currently allocated.
    pub fn requested_size(&self) -> usize {
        self.lock().allocated
    }

    /// Returns a property. The size properties are computed.
    pub fn property(&self, id: HeapProperty) -> Result<PropertyValue> {
        let state = self.lock();
        match id {
            HeapProperty::RequestedSize | HeapProperty::ActualSize => {
                Ok(PropertyValue::UInt(state.allocated as u64))
            }
            _ => state.properties.get(id).map(Clone::clone),
        }
    }

    /// Changes [`HeapProperty::MaxSize`] or [`HeapProperty::TrimSize`].
    pub fn set_property(&self, id: HeapProperty, value: PropertyValue) -> Result<()> {
        self.lock().properties.set(id, value)
    }

    pub(crate) fn charge(&self, size: usize) -> Result<()> {
        let mut state = self.lock();
        if size > state.max_size().saturating_sub(state.allocated) {
            return Err(Error::QuotaExceeded);
        }
        state.allocated += size;
        Ok(())
    }

    pub(crate) fn release(&self, size: usize) {
        let mut state = self.lock();
        state.allocated = state.allocated.saturating_sub(size);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn quota() {
        let heap = Heap::new(1 << 4, 1 << 4);
        let a = heap.alloc(10).unwrap();
        assert_eq!(a.len(), 10);
        assert_eq!(heap.requested_size(), 10);
        assert!(matches!(heap.alloc(7), Err(Error::QuotaExceeded)));
        let b = heap.alloc(6).unwrap();
        assert_eq!(heap.property(HeapProperty::ActualSize).unwrap(), PropertyValue::UInt(16));

        heap.free(a);
        heap.free(b);
        assert_eq!(heap.requested_size(), 0);
    }

    #[test]
    fn reset() {
        let heap = Heap::new(4, 0);
        let _buf = heap.alloc(4).unwrap();
        heap.reset();
        assert_eq!(
            heap.property(HeapProperty::RequestedSize).unwrap(),
            PropertyValue::UInt(0)
        );
        assert!(heap.alloc(4).is_ok());
    }

    #[test]
    fn properties() {
        let heap = Heap::new(1 << 16, 1 << 6);
        assert_eq!(
            heap.property(HeapProperty::MaxSize).unwrap(),
            PropertyValue::UInt(1 << 16)
        );
        assert_eq!(
            heap.property(HeapProperty::TrimSize).unwrap(),
            PropertyValue::UInt(1 << 6)
        );
        heap.set_property(HeapProperty::MaxSize, PropertyValue::UInt(2))
            .unwrap();
        assert!(matches!(heap.alloc(3), Err(Error::QuotaExceeded)));
        assert!(matches!(
            heap.set_property(HeapProperty::RequestedSize, PropertyValue::UInt(0)),
            Err(Error::InvalidArgument(_))
        ));
    }
}
