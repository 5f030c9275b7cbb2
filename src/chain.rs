//! The finalized, linked chain.

use core::{any::TypeId, marker::PhantomData, ptr::NonNull};

use rootcause::Report;
use structchain_internals::{RawChain, header::ChainRecord};

use crate::{
    RecordId, RecordRef,
    builder::TypeIndex,
    error::{ChainError, ChainResult, enforce},
};

/// One contiguous allocation holding a root record of type `R` followed by
/// its extension records, each linked to the next through its forward
/// pointer.
///
/// A chain is produced by [`ChainBuilder::finalize`]. Its allocation never
/// moves or resizes for as long as the chain exists, so the pointer returned
/// by [`as_ptr`](Self::as_ptr) can be handed to a consumer that walks the
/// forward pointers. Moving the `Chain` value itself does not move the
/// allocation.
///
/// Records can be read and written through the typed accessors, but the
/// layout of the chain is fixed.
///
/// [`ChainBuilder::finalize`]: crate::ChainBuilder::finalize
pub struct Chain<R: ChainRecord> {
    raw: RawChain,
    types: TypeIndex,
    _root: PhantomData<R>,
}

impl<R: ChainRecord> Chain<R> {
    /// Wraps a finalized raw chain.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The record at offset 0 of `raw` is of type `R`.
    /// 2. `types` maps each record type to the offset of its first record in
    ///    `raw`.
    /// 3. `raw` is no longer than `u32::MAX` bytes.
    pub(crate) unsafe fn from_raw(raw: RawChain, types: TypeIndex) -> Self {
        Self {
            raw,
            types,
            _root: PhantomData,
        }
    }

    /// The root record.
    pub fn root(&self) -> &R {
        // SAFETY: The record at offset 0 is an `R`, guaranteed by `from_raw`. The
        // allocation is aligned to at least the alignment of `R`.
        unsafe { self.raw.get_unchecked::<R>(0) }
    }

    /// The root record, mutably.
    ///
    /// Changing the root's forward pointer unlinks the rest of the chain for
    /// any consumer walking it.
    pub fn root_mut(&mut self) -> &mut R {
        // SAFETY: The record at offset 0 is an `R`, guaranteed by `from_raw`. The
        // allocation is aligned to at least the alignment of `R`.
        unsafe { self.raw.get_unchecked_mut::<R>(0) }
    }

    /// Pointer to the root record, for handing the chain to its consumer.
    #[inline]
    pub fn as_ptr(&self) -> *const R {
        self.raw.as_ptr().cast::<R>()
    }

    /// Mutable pointer to the root record, for consumers that write their
    /// output into the chain.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut R {
        self.raw.as_mut_ptr().cast::<R>()
    }

    /// Returns a pointer to the record with the given id, reinterpreted as a
    /// `T`.
    ///
    /// No type checking is done: the caller decides what `T` the bytes at
    /// `id` are. The pointer is not necessarily aligned for `T`. See
    /// [`get`](Self::get) for a checked alternative.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not less than the length of the chain.
    #[track_caller]
    pub fn at<T>(&self, id: RecordId) -> NonNull<T> {
        enforce(self.try_at(id))
    }

    /// Returns a pointer to the record with the given id, reinterpreted as a
    /// `T`, or an [`OutOfBounds`] error.
    ///
    /// [`OutOfBounds`]: ChainError::OutOfBounds
    pub fn try_at<T>(&self, id: RecordId) -> ChainResult<NonNull<T>> {
        match self.raw.ptr_at(id.as_usize()) {
            Some(ptr) => Ok(ptr.cast::<T>()),
            None => {
                tracing::warn!(
                    record_id = id.offset(),
                    len = self.raw.len_bytes(),
                    "record id out of bounds"
                );
                Err(Report::new_sendsync(ChainError::OutOfBounds {
                    id: id.offset(),
                    len: self.raw.len_bytes(),
                }))
            }
        }
    }

    /// Returns the record with the given id if it is a `T`.
    ///
    /// Returns [`None`] if no record starts at `id`, if the record there is of
    /// another type, or if the record's address is not aligned for `T` (the
    /// chain inserts no padding, so a record with a larger alignment than its
    /// predecessors' sizes allow can land on an unaligned address; use
    /// [`read`](Self::read) for those).
    pub fn get<T: ChainRecord>(&self, id: RecordId) -> Option<&T> {
        self.raw.get::<T>(id.as_usize())
    }

    /// Mutable version of [`get`](Self::get).
    pub fn get_mut<T: ChainRecord>(&mut self, id: RecordId) -> Option<&mut T> {
        self.raw.get_mut::<T>(id.as_usize())
    }

    /// Returns a copy of the record with the given id if it is a `T`,
    /// regardless of alignment.
    pub fn read<T: ChainRecord>(&self, id: RecordId) -> Option<T> {
        let slot = self.raw.slot_at(id.as_usize())?;
        if slot.type_id() != TypeId::of::<T>() {
            return None;
        }
        let ptr = self.raw.ptr_at(slot.offset())?.cast::<T>();
        // SAFETY: A `T` was copied to this offset, and `read_unaligned` places no
        // alignment requirement on the pointer.
        Some(unsafe { ptr.as_ptr().read_unaligned() })
    }

    /// Returns the id of the first record of type `T`.
    pub fn find_id<T: ChainRecord>(&self) -> Option<RecordId> {
        self.types.get(&TypeId::of::<T>()).copied()
    }

    /// Returns the first record of type `T`.
    pub fn find<T: ChainRecord>(&self) -> Option<&T> {
        self.get::<T>(self.find_id::<T>()?)
    }

    /// Mutable version of [`find`](Self::find).
    pub fn find_mut<T: ChainRecord>(&mut self) -> Option<&mut T> {
        let id = self.find_id::<T>()?;
        self.get_mut::<T>(id)
    }

    /// Whether the chain holds at least one record of type `T`.
    pub fn contains<T: ChainRecord>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<T>())
    }

    /// Iterates over the records of the chain in order.
    pub fn records(&self) -> impl ExactSizeIterator<Item = RecordRef<'_>> + '_ {
        self.raw.records().map(|(slot, header)| {
            debug_assert!(u32::try_from(slot.offset()).is_ok());
            // Offsets fit in a `u32`, guaranteed by `from_raw`.
            let id = RecordId::from_offset(slot.offset() as u32);
            RecordRef { id, slot, header }
        })
    }

    /// Number of records in the chain.
    pub fn record_count(&self) -> usize {
        self.raw.slots().len()
    }

    /// Size of the chain in bytes.
    pub fn len_bytes(&self) -> usize {
        self.raw.len_bytes()
    }
}

impl<R: ChainRecord> core::fmt::Debug for Chain<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.records()).finish()
    }
}
