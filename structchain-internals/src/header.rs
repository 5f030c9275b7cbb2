//! The record header shared by every chained record type.
//!
//! Extensible C APIs (Vulkan being the best known) accept optional parameter
//! blocks by letting every block start with the same two fields: a type tag
//! the consumer uses to identify the block, and a pointer to the next block.
//! This module defines that header and the trait record types implement to
//! declare that they start with it.

use core::ffi::c_void;

/// The common prefix of every chained record.
///
/// The layout is identical to Vulkan's `VkBaseOutStructure`: a 32-bit type
/// tag followed by a pointer-sized forward link.
///
/// The chain machinery only ever reads and writes [`next`](Self::next). The
/// [`tag`](Self::tag) belongs to the consumer.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordHeader {
    /// Identifies the concrete record type to the consumer.
    pub tag: i32,
    /// Address of the next record's header, or null for the last record.
    pub next: *mut c_void,
}

impl RecordHeader {
    /// Creates a header with the given tag and no forward link.
    #[inline]
    pub const fn new(tag: i32) -> Self {
        Self {
            tag,
            next: core::ptr::null_mut(),
        }
    }
}

/// Marker trait for record types that can be placed in a chain.
///
/// # Safety
///
/// Implementors must guarantee:
///
/// 1. The type is `#[repr(C)]` (or `#[repr(transparent)]` over such a type).
/// 2. The type begins with a [`RecordHeader`], or with fields whose layout is
///    identical to it, at offset 0.
/// 3. Every bit pattern the type can hold is safe to copy byte-for-byte,
///    which the [`Copy`] bound already implies.
///
/// The chain writes the forward-pointer field by raw offset without any
/// per-type knowledge, so a type violating (2) would have an unrelated field
/// overwritten.
///
/// # Examples
///
/// ```
/// use structchain_internals::header::{ChainRecord, RecordHeader};
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct DeviceCreateInfo {
///     header: RecordHeader,
///     queue_count: u32,
/// }
///
/// // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
/// unsafe impl ChainRecord for DeviceCreateInfo {}
///
/// let info = DeviceCreateInfo {
///     header: RecordHeader::new(3),
///     queue_count: 1,
/// };
/// assert_eq!(info.header().tag, 3);
/// assert!(info.next().is_null());
/// ```
pub unsafe trait ChainRecord: Copy + 'static {
    /// Returns the [`RecordHeader`] at the start of this record.
    #[inline]
    fn header(&self) -> &RecordHeader {
        let ptr: *const RecordHeader = core::ptr::from_ref(self).cast::<RecordHeader>();
        // SAFETY: The implementor guarantees that `Self` starts with a
        // `RecordHeader` at offset 0, so the pointer is aligned and points to an
        // initialized header that lives as long as `self`.
        unsafe { &*ptr }
    }

    /// Returns the forward pointer stored in the header.
    #[inline]
    fn next(&self) -> *const c_void {
        self.header().next.cast_const()
    }
}

// SAFETY: `RecordHeader` is `#[repr(C)]` and trivially starts with itself.
unsafe impl ChainRecord for RecordHeader {}

#[cfg(test)]
mod tests {
    use core::mem::{align_of, offset_of, size_of};

    use super::*;

    #[repr(C)]
    #[derive(Clone, Copy)]
    struct Extended {
        header: RecordHeader,
        value: u64,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for Extended {}

    #[test]
    fn test_header_layout() {
        assert_eq!(offset_of!(RecordHeader, tag), 0);
        assert_eq!(offset_of!(RecordHeader, next), size_of::<*mut c_void>());
        assert_eq!(size_of::<RecordHeader>(), 2 * size_of::<*mut c_void>());
        assert_eq!(align_of::<RecordHeader>(), align_of::<*mut c_void>());
    }

    #[test]
    fn test_header_access() {
        let mut target = 0u8;
        let mut record = Extended {
            header: RecordHeader::new(42),
            value: 7,
        };
        assert_eq!(record.header().tag, 42);
        assert!(record.next().is_null());

        record.header.next = (&raw mut target).cast::<c_void>();
        assert_eq!(record.next(), (&raw const target).cast::<c_void>());
        assert_eq!(record.value, 7);
    }
}
