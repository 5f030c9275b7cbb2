//! The finalized chain allocation.
//!
//! This module encapsulates the fields of [`RawChain`], ensuring they are only
//! visible within this module. This visibility restriction guarantees the
//! safety invariant: **the allocation was created by [`RawChain::new`] with
//! `layout`, every slot describes a record that was copied to that offset, and
//! the allocation is never moved or resized**.
//!
//! # Forward Pointers
//!
//! [`RawChain::new`] first allocates the final buffer, then copies every
//! record into it, and only then writes the forward pointers. Every forward
//! pointer is computed from the final allocation's base pointer, so the
//! addresses stay valid for as long as the [`RawChain`] exists, regardless of
//! where the [`RawChain`] value itself is moved to.

use alloc::vec::Vec;
use core::{alloc::Layout, any::TypeId, ffi::c_void, mem::offset_of, ptr::NonNull};

use crate::{
    chain::slot::RecordSlot,
    header::{ChainRecord, RecordHeader},
    record::RawRecord,
};

/// An owned, aligned allocation holding a chain of records back to back.
///
/// Every record except the last has the `next` field of its
/// [`RecordHeader`] pointing at the start of the following record. The last
/// record's `next` field is left exactly as it was copied in.
pub struct RawChain {
    /// Start of the allocation.
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer was returned by [`alloc::alloc::alloc`] called with
    ///    `layout`.
    /// 2. The allocation is never reallocated or freed before `Drop`.
    /// 3. For every entry in `slots`, a record of the slot's type was written at
    ///    the slot's offset.
    ptr: NonNull<u8>,
    /// The layout the allocation was made with. Its size is the sum of all
    /// record sizes and its alignment is the largest record alignment.
    layout: Layout,
    /// One slot per record in chain order, sorted by offset.
    slots: Vec<RecordSlot>,
}

impl RawChain {
    /// Allocates a buffer for `records`, copies them into it in order and links
    /// their forward pointers.
    ///
    /// No padding is inserted between records: the record at index `n` starts
    /// at the sum of the sizes of the records before it.
    ///
    /// Returns [`None`] if `records` is empty or if the combined size does not
    /// form a valid [`Layout`].
    pub fn new(records: &[RawRecord]) -> Option<Self> {
        let mut size: usize = 0;
        let mut align: usize = 1;
        for record in records {
            let layout = record.as_ref().record_layout();
            size = size.checked_add(layout.size())?;
            align = align.max(layout.align());
        }
        if size == 0 {
            return None;
        }
        let layout = Layout::from_size_align(size, align).ok()?;

        // SAFETY: `layout` has a non-zero size, checked above.
        let ptr = unsafe { alloc::alloc::alloc(layout) };
        let Some(ptr) = NonNull::new(ptr) else {
            alloc::alloc::handle_alloc_error(layout)
        };

        let mut slots = Vec::with_capacity(records.len());
        let mut offset = 0;
        for record in records {
            let record = record.as_ref();
            let dst = ptr.as_ptr().wrapping_add(offset);
            // SAFETY: `offset + size_of(record) <= size` because `size` is the sum
            // of all record sizes, so `dst` is valid for writing the record.
            unsafe { record.copy_to(dst) };
            slots.push(RecordSlot::new(offset, record.vtable()));
            offset += record.record_layout().size();
        }

        for pair in slots.windows(2) {
            let (current, next) = (pair[0], pair[1]);
            let field = ptr
                .as_ptr()
                .wrapping_add(current.offset() + offset_of!(RecordHeader, next))
                .cast::<*mut c_void>();
            let target = ptr.as_ptr().wrapping_add(next.offset()).cast::<c_void>();
            // SAFETY: Every `ChainRecord` starts with a `RecordHeader`, so the
            // forward-pointer field lies inside the record that was copied to
            // `current.offset()`, which is inside the allocation.
            unsafe { field.write_unaligned(target) };
        }

        Some(Self { ptr, layout, slots })
    }

    /// Total size of the chain in bytes.
    #[inline]
    pub fn len_bytes(&self) -> usize {
        self.layout.size()
    }

    /// Alignment of the allocation, the largest alignment of any record.
    #[inline]
    pub fn align(&self) -> usize {
        self.layout.align()
    }

    /// Pointer to the first byte of the chain.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    /// Mutable pointer to the first byte of the chain.
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    /// The records of this chain in order.
    #[inline]
    pub fn slots(&self) -> &[RecordSlot] {
        &self.slots
    }

    /// Returns the slot of the record starting exactly at `offset`.
    pub fn slot_at(&self, offset: usize) -> Option<RecordSlot> {
        let index = self
            .slots
            .binary_search_by_key(&offset, |slot| slot.offset())
            .ok()?;
        Some(self.slots[index])
    }

    /// Returns a pointer `offset` bytes into the chain, or [`None`] if
    /// `offset` is not inside the allocation.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> Option<NonNull<u8>> {
        if offset < self.layout.size() {
            // SAFETY: `offset` is inside the allocation, so the result is in bounds
            // and non-null.
            Some(unsafe { self.ptr.add(offset) })
        } else {
            None
        }
    }

    /// Returns the header of the record starting exactly at `offset`.
    pub fn header_at(&self, offset: usize) -> Option<&RecordHeader> {
        let slot = self.slot_at(offset)?;
        let ptr = self.ptr_at(slot.offset())?.cast::<RecordHeader>();
        if !ptr.is_aligned() {
            return None;
        }
        // SAFETY: Every `ChainRecord` starts with a `RecordHeader`, a record was
        // copied to this offset, and the pointer is aligned. The reference
        // borrows `self`.
        Some(unsafe { ptr.as_ref() })
    }

    /// Iterates over the records of this chain in order, together with their
    /// headers.
    pub fn records(&self) -> impl ExactSizeIterator<Item = (RecordSlot, &RecordHeader)> {
        self.slots.iter().map(|&slot| {
            let ptr = self
                .ptr
                .as_ptr()
                .wrapping_add(slot.offset())
                .cast::<RecordHeader>();
            debug_assert!(ptr.is_aligned());
            // SAFETY: The slot describes a record copied into this allocation, and
            // every `ChainRecord` starts with a `RecordHeader`. A record's alignment
            // is at least that of its header and its size is a multiple of its
            // alignment, so every offset is aligned for `RecordHeader`. The
            // reference borrows `self`.
            let header = unsafe { &*ptr };
            (slot, header)
        })
    }

    /// Returns the record at `offset` as an `R` if a record of that exact type
    /// starts there and the address is aligned for `R`.
    pub fn get<R: ChainRecord>(&self, offset: usize) -> Option<&R> {
        let ptr = self.checked_ptr::<R>(offset)?;
        // SAFETY: `checked_ptr` verified that an `R` was copied to this aligned
        // address, and the returned reference borrows `self`.
        Some(unsafe { ptr.as_ref() })
    }

    /// Mutable version of [`get`](Self::get).
    pub fn get_mut<R: ChainRecord>(&mut self, offset: usize) -> Option<&mut R> {
        let mut ptr = self.checked_ptr::<R>(offset)?;
        // SAFETY: `checked_ptr` verified that an `R` was copied to this aligned
        // address, and the returned reference mutably borrows `self`.
        Some(unsafe { ptr.as_mut() })
    }

    /// Returns the record at `offset` as an `R` without any checks.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. A record of type `R` starts at `offset`.
    /// 2. `self.as_ptr() + offset` is aligned for `R`.
    #[inline]
    pub unsafe fn get_unchecked<R: ChainRecord>(&self, offset: usize) -> &R {
        debug_assert!(self.checked_ptr::<R>(offset).is_some());
        let ptr = self.ptr.as_ptr().wrapping_add(offset).cast::<R>();
        // SAFETY: Guaranteed by the caller.
        unsafe { &*ptr }
    }

    /// Mutable version of [`get_unchecked`](Self::get_unchecked).
    ///
    /// # Safety
    ///
    /// The same requirements as [`get_unchecked`](Self::get_unchecked).
    #[inline]
    pub unsafe fn get_unchecked_mut<R: ChainRecord>(&mut self, offset: usize) -> &mut R {
        debug_assert!(self.checked_ptr::<R>(offset).is_some());
        let ptr = self.ptr.as_ptr().wrapping_add(offset).cast::<R>();
        // SAFETY: Guaranteed by the caller.
        unsafe { &mut *ptr }
    }

    /// Returns an aligned pointer to the `R` that starts at `offset`, if there
    /// is one.
    fn checked_ptr<R: ChainRecord>(&self, offset: usize) -> Option<NonNull<R>> {
        let slot = self.slot_at(offset)?;
        if slot.type_id() != TypeId::of::<R>() {
            return None;
        }
        let ptr = self.ptr_at(offset)?.cast::<R>();
        ptr.is_aligned().then_some(ptr)
    }
}

impl core::ops::Drop for RawChain {
    fn drop(&mut self) {
        // SAFETY: The pointer was allocated with `self.layout` and has not been
        // freed, as guaranteed by the invariants on this type.
        unsafe { alloc::alloc::dealloc(self.ptr.as_ptr(), self.layout) };
    }
}

impl core::fmt::Debug for RawChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawChain")
            .field("ptr", &self.ptr)
            .field("len_bytes", &self.len_bytes())
            .field("align", &self.align())
            .field("slots", &self.slots)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::{vec, vec::Vec};

    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Extension {
        header: RecordHeader,
        value: u64,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for Extension {}

    #[repr(C, align(32))]
    #[derive(Clone, Copy)]
    struct Aligned {
        header: RecordHeader,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for Aligned {}

    #[test]
    fn test_empty_is_none() {
        assert!(RawChain::new(&[]).is_none());
    }

    #[test]
    fn test_links_are_patched() {
        let records = vec![
            RawRecord::new(RecordHeader::new(1)),
            RawRecord::new(Extension {
                header: RecordHeader::new(2),
                value: 10,
            }),
            RawRecord::new(RecordHeader::new(3)),
        ];
        let chain = RawChain::new(&records).unwrap();
        let header_size = core::mem::size_of::<RecordHeader>();
        let extension_size = core::mem::size_of::<Extension>();

        assert_eq!(chain.len_bytes(), 2 * header_size + extension_size);
        assert_eq!(chain.slots().len(), 3);

        let base = chain.as_ptr();
        let first = chain.get::<RecordHeader>(0).unwrap();
        assert_eq!(first.tag, 1);
        assert_eq!(first.next.cast_const().cast::<u8>(), base.wrapping_add(header_size));

        let second = chain.get::<Extension>(header_size).unwrap();
        assert_eq!(second.value, 10);
        assert_eq!(
            second.header.next.cast_const().cast::<u8>(),
            base.wrapping_add(header_size + extension_size)
        );

        let third = chain.get::<RecordHeader>(header_size + extension_size).unwrap();
        assert_eq!(third.tag, 3);
        assert!(third.next.is_null());
    }

    #[test]
    fn test_typed_access_checks() {
        let records = vec![
            RawRecord::new(RecordHeader::new(1)),
            RawRecord::new(Extension {
                header: RecordHeader::new(2),
                value: 10,
            }),
        ];
        let mut chain = RawChain::new(&records).unwrap();
        let header_size = core::mem::size_of::<RecordHeader>();

        assert!(chain.get::<Extension>(0).is_none());
        assert!(chain.get::<RecordHeader>(header_size).is_none());
        assert_eq!(chain.header_at(header_size).unwrap().tag, 2);
        assert!(chain.header_at(header_size + 1).is_none());
        assert!(chain.get::<Extension>(1).is_none());
        assert!(chain.get::<Extension>(chain.len_bytes()).is_none());
        assert!(chain.ptr_at(chain.len_bytes()).is_none());
        assert!(chain.ptr_at(chain.len_bytes() - 1).is_some());

        chain.get_mut::<Extension>(header_size).unwrap().value = 20;
        assert_eq!(chain.get::<Extension>(header_size).unwrap().value, 20);
    }

    #[test]
    fn test_records_yield_every_slot() {
        let records = vec![
            RawRecord::new(Aligned {
                header: RecordHeader::new(1),
            }),
            RawRecord::new(RecordHeader::new(2)),
            RawRecord::new(Aligned {
                header: RecordHeader::new(3),
            }),
            RawRecord::new(Extension {
                header: RecordHeader::new(4),
                value: 0,
            }),
        ];
        let chain = RawChain::new(&records).unwrap();

        let iter = chain.records();
        assert_eq!(iter.len(), 4);
        let tags: Vec<i32> = iter.map(|(_, header)| header.tag).collect();
        assert_eq!(tags, [1, 2, 3, 4]);

        for ((slot, header), expected) in chain.records().zip(chain.slots()) {
            assert_eq!(slot.offset(), expected.offset());
            assert_eq!(
                core::ptr::from_ref(header).cast::<u8>(),
                chain.as_ptr().wrapping_add(slot.offset())
            );
        }
    }

    #[test]
    fn test_alignment_is_largest_record_alignment() {
        let records = vec![
            RawRecord::new(Aligned {
                header: RecordHeader::new(1),
            }),
            RawRecord::new(RecordHeader::new(2)),
        ];
        let chain = RawChain::new(&records).unwrap();
        assert_eq!(chain.align(), 32);
        assert_eq!(chain.as_ptr().align_offset(32), 0);
        assert!(chain.get::<Aligned>(0).is_some());
    }

    #[test]
    fn test_misaligned_record_is_not_handed_out() {
        let records = vec![
            RawRecord::new(RecordHeader::new(1)),
            RawRecord::new(Aligned {
                header: RecordHeader::new(2),
            }),
        ];
        let chain = RawChain::new(&records).unwrap();
        let offset = core::mem::size_of::<RecordHeader>();

        // 16 bytes into a 32-byte aligned allocation is never 32-byte aligned.
        assert!(chain.slot_at(offset).is_some());
        assert!(chain.get::<Aligned>(offset).is_none());
        let header = chain.get::<RecordHeader>(0).unwrap();
        assert_eq!(header.next.cast_const().cast::<u8>(), chain.as_ptr().wrapping_add(offset));
    }

    #[test]
    fn test_moving_chain_keeps_addresses() {
        let records = vec![
            RawRecord::new(RecordHeader::new(1)),
            RawRecord::new(RecordHeader::new(2)),
        ];
        let chain = RawChain::new(&records).unwrap();
        let base = chain.as_ptr();
        let boxed = alloc::boxed::Box::new(chain);
        assert_eq!(boxed.as_ptr(), base);
        let first = boxed.get::<RecordHeader>(0).unwrap();
        assert_eq!(
            first.next.cast_const().cast::<u8>(),
            base.wrapping_add(core::mem::size_of::<RecordHeader>())
        );
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(RawChain: Send, Sync);
    }
}
