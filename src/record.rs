//! Record identifiers and per-record views of a finalized chain.

use core::any::TypeId;

use structchain_internals::{RecordSlot, header::RecordHeader};

/// Identifies a record within the chain it will be (or was) finalized into.
///
/// A record id is the byte offset the record occupies in the finalized
/// buffer. It is returned by [`ChainBuilder::append`] and is valid against
/// every [`Chain`] finalized from that same builder.
///
/// [`ChainBuilder::append`]: crate::ChainBuilder::append
/// [`Chain`]: crate::Chain
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RecordId(u32);

impl RecordId {
    /// The id of the root record, which always starts a chain.
    pub const ROOT: RecordId = RecordId(0);

    /// Creates a record id from a raw byte offset.
    ///
    /// Ids obtained this way are not checked against any chain until they are
    /// used.
    #[inline]
    pub const fn from_offset(offset: u32) -> Self {
        Self(offset)
    }

    /// The byte offset of the record.
    #[inline]
    pub const fn offset(self) -> u32 {
        self.0
    }

    /// The byte offset of the record as a `usize`.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for RecordId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A view of one record in a [`Chain`], as yielded by [`Chain::records`].
///
/// [`Chain`]: crate::Chain
/// [`Chain::records`]: crate::Chain::records
#[derive(Clone, Copy)]
pub struct RecordRef<'a> {
    /// Id of the record.
    pub(crate) id: RecordId,
    /// Location and type of the record.
    pub(crate) slot: RecordSlot,
    /// The header at the start of the record.
    pub(crate) header: &'a RecordHeader,
}

impl<'a> RecordRef<'a> {
    /// The id of this record.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Size of the record in bytes.
    pub fn size(&self) -> usize {
        self.slot.size()
    }

    /// The [`TypeId`] of the record's type.
    pub fn type_id(&self) -> TypeId {
        self.slot.type_id()
    }

    /// The name of the record's type.
    pub fn type_name(&self) -> &'static str {
        self.slot.type_name()
    }

    /// The header at the start of the record.
    pub fn header(&self) -> &'a RecordHeader {
        self.header
    }

    /// Whether the record is of type `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.type_id() == TypeId::of::<T>()
    }
}

impl core::fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Record")
            .field("id", &self.id)
            .field("type", &self.type_name())
            .field("size", &self.size())
            .field("tag", &self.header.tag)
            .finish()
    }
}
