//! Type-erased record pointer types.
//!
//! This module encapsulates the `ptr` field of [`RawRecord`] and
//! [`RawRecordRef`], ensuring it is only visible within this module. This
//! visibility restriction guarantees the safety invariant: **the pointer always
//! comes from `Box<RecordData<R>>`**.
//!
//! # Safety Invariant
//!
//! Since the `ptr` field can only be set via [`RawRecord::new`] (which creates
//! it from `Box::into_raw`), and cannot be modified afterward (no `pub` or
//! `pub(crate)` fields), the pointer provenance remains valid throughout the
//! value's lifetime.
//!
//! The [`RawRecord::drop`] implementation relies on this invariant to safely
//! reconstruct the `Box` and deallocate the memory.
//!
//! # Type Erasure
//!
//! The concrete record type `R` is erased by casting to
//! `RecordData<Erased>`. The vtable stored within the `RecordData` provides
//! the layout and copy routine the chain needs to place the record.

use alloc::boxed::Box;
use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::{header::ChainRecord, record::data::RecordData, util::Erased};

/// A pointer to a [`RecordData`] that is guaranteed to point to an initialized
/// instance of a [`RecordData<R>`] for some specific `R`, though we do not
/// know which actual `R` it is.
///
/// However, the pointer is allowed to transition into a non-initialized state
/// inside the [`RawRecord::drop`] method.
///
/// The pointer is guaranteed to have been created using [`Box::into_raw`].
///
/// We cannot use a [`Box<RecordData<R>>`] directly, because that does not
/// allow us to type-erase the `R`.
#[repr(transparent)]
pub struct RawRecord {
    /// Pointer to the inner record data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer must have been created from a `Box<RecordData<R>>` for
    ///    some `R` using `Box::into_raw`.
    /// 2. The pointer will point to the same `RecordData<R>` for the entire
    ///    lifetime of this object.
    /// 3. The pointee is properly initialized for the entire lifetime of this
    ///    object, except during the execution of the `Drop` implementation.
    ptr: NonNull<RecordData<Erased>>,
}

impl RawRecord {
    /// Creates a new [`RawRecord`] holding a copy of `record`.
    #[inline]
    pub fn new<R: ChainRecord>(record: R) -> Self {
        let ptr = Box::new(RecordData::new(record));
        let ptr: *mut RecordData<R> = Box::into_raw(ptr);
        let ptr: *mut RecordData<Erased> = ptr.cast::<RecordData<Erased>>();

        // SAFETY: `Box::into_raw` returns a non-null pointer
        let ptr: NonNull<RecordData<Erased>> = unsafe { NonNull::new_unchecked(ptr) };

        Self { ptr }
    }

    /// Returns a reference to the [`RecordData`] instance.
    #[inline]
    pub fn as_ref(&self) -> RawRecordRef<'_> {
        RawRecordRef {
            ptr: self.ptr,
            _marker: core::marker::PhantomData,
        }
    }
}

impl core::ops::Drop for RawRecord {
    #[inline]
    fn drop(&mut self) {
        let vtable = self.as_ref().vtable();

        // SAFETY:
        // 1. The pointer comes from `Box::into_raw` (guaranteed by
        //    `RawRecord::new`)
        // 2. The vtable returned by `self.as_ref().vtable()` is guaranteed to match the
        //    data in the `RecordData`.
        // 3. The pointer is initialized and has not been previously freed as guaranteed
        //    by the invariants on this type. We are correctly transferring ownership
        //    here and the pointer is not used afterwards, as we are in the drop
        //    function.
        unsafe {
            vtable.drop(self.ptr);
        }
    }
}

impl core::fmt::Debug for RawRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.as_ref(), f)
    }
}

/// A lifetime-bound pointer to a [`RecordData`] that is guaranteed to point
/// to an initialized instance of a [`RecordData<R>`] for some specific `R`,
/// though we do not know which actual `R` it is.
///
/// We cannot use a [`&'a RecordData<R>`] directly, because that would require
/// us to know the actual type of the record, which we do not.
///
/// [`&'a RecordData<R>`]: RecordData
#[derive(Clone, Copy)]
#[repr(transparent)]
pub struct RawRecordRef<'a> {
    /// Pointer to the inner record data
    ///
    /// # Safety
    ///
    /// The following safety invariants are guaranteed to be upheld as long as
    /// this struct exists:
    ///
    /// 1. The pointer must have been created from a `Box<RecordData<R>>` for
    ///    some `R` using `Box::into_raw`.
    /// 2. The pointer will point to the same `RecordData<R>` for the entire
    ///    lifetime of this object.
    ptr: NonNull<RecordData<Erased>>,

    /// Marker to tell the compiler that we should
    /// behave the same as a `&'a RecordData<Erased>`
    _marker: core::marker::PhantomData<&'a RecordData<Erased>>,
}

impl<'a> RawRecordRef<'a> {
    /// Casts the [`RawRecordRef`] to a [`RecordData<R>`] reference.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The type `R` matches the actual record type stored in the
    ///    [`RecordData`].
    #[inline]
    pub(super) unsafe fn cast_inner<R>(self) -> &'a RecordData<R> {
        // Debug assertion to catch type mismatches in case of bugs
        debug_assert_eq!(self.vtable().type_id(), TypeId::of::<R>());

        let this = self.ptr.cast::<RecordData<R>>();
        // SAFETY: Converting the NonNull pointer to a reference is sound because:
        // - The pointer is non-null, properly aligned, and dereferenceable (guaranteed
        //   by RawRecordRef's type invariants)
        // - The pointee is properly initialized (RawRecordRef's doc comment
        //   guarantees it points to an initialized RecordData<R> for some R)
        // - The type `R` matches the actual record type (guaranteed by caller)
        // - Shared access is allowed
        // - The reference lifetime 'a is valid (tied to RawRecordRef<'a>'s lifetime)
        unsafe { this.as_ref() }
    }

    /// Returns a raw pointer to the [`RecordData`] instance.
    #[inline]
    pub(super) fn as_ptr(self) -> *const RecordData<Erased> {
        self.ptr.as_ptr()
    }

    /// Returns the [`TypeId`] of the record.
    #[inline]
    pub fn record_type_id(self) -> TypeId {
        self.vtable().type_id()
    }

    /// Returns the [`core::any::type_name`] of the record.
    #[inline]
    pub fn record_type_name(self) -> &'static str {
        self.vtable().type_name()
    }

    /// Returns the [`Layout`] of the record.
    #[inline]
    pub fn record_layout(self) -> Layout {
        self.vtable().layout()
    }

    /// Copies the record bytes to `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. `dst` is valid for writes of `self.record_layout().size()` bytes.
    ///    It does not need to be aligned.
    #[inline]
    pub(crate) unsafe fn copy_to(self, dst: *mut u8) {
        let vtable = self.vtable();
        // SAFETY:
        // 1. The vtable returned by `self.vtable()` is guaranteed to match the data in
        //    the `RecordData`.
        // 2. Guaranteed by the caller
        unsafe {
            vtable.copy_to(self, dst);
        }
    }
}

impl core::fmt::Debug for RawRecordRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawRecord")
            .field("type", &self.record_type_name())
            .field("size", &self.record_layout().size())
            .finish()
    }
}
