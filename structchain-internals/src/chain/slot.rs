//! Per-record bookkeeping for a [`RawChain`].
//!
//! [`RawChain`]: crate::RawChain

use core::{alloc::Layout, any::TypeId};

use crate::record::vtable::RecordVtable;

/// Location and type of one record inside a [`RawChain`].
///
/// [`RawChain`]: crate::RawChain
#[derive(Clone, Copy)]
pub struct RecordSlot {
    /// Byte offset of the record from the start of the chain allocation.
    offset: usize,
    /// Vtable of the record type that was copied to `offset`.
    vtable: &'static RecordVtable,
}

impl RecordSlot {
    /// Creates a slot for a record of the vtable's type at `offset`.
    #[inline]
    pub(super) fn new(offset: usize, vtable: &'static RecordVtable) -> Self {
        Self { offset, vtable }
    }

    /// Byte offset of the record from the start of the chain.
    #[inline]
    pub fn offset(self) -> usize {
        self.offset
    }

    /// Size of the record in bytes.
    #[inline]
    pub fn size(self) -> usize {
        self.vtable.layout().size()
    }

    /// Byte offset one past the end of the record.
    #[inline]
    pub fn end(self) -> usize {
        self.offset + self.size()
    }

    /// Layout of the record type.
    #[inline]
    pub fn layout(self) -> Layout {
        self.vtable.layout()
    }

    /// The [`TypeId`] of the record type.
    #[inline]
    pub fn type_id(self) -> TypeId {
        self.vtable.type_id()
    }

    /// The [`core::any::type_name`] of the record type.
    #[inline]
    pub fn type_name(self) -> &'static str {
        self.vtable.type_name()
    }
}

impl core::fmt::Debug for RecordSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordSlot")
            .field("offset", &self.offset)
            .field("size", &self.size())
            .field("type", &self.type_name())
            .finish()
    }
}
