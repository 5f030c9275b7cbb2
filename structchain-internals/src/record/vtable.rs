//! Vtable for type-erased record operations.
//!
//! This module contains the [`RecordVtable`] which enables copying and
//! dropping pending records when their concrete record type `R` has been
//! erased. The vtable also carries the [`Layout`] of `R`, which is all the
//! chain needs to compute offsets.
//!
//! This module encapsulates the fields of [`RecordVtable`] so they cannot be
//! accessed directly. This visibility restriction guarantees the safety
//! invariant: **the vtable's type parameter must match the actual record type
//! stored in the [`RecordData`]**.
//!
//! # Safety Invariant
//!
//! This invariant is maintained because vtables are created as `&'static`
//! references via [`RecordVtable::new`], which pairs the function pointers
//! and the layout with one specific type `R` at compile time.

use alloc::boxed::Box;
use core::{alloc::Layout, any::TypeId, ptr::NonNull};

use crate::{
    header::ChainRecord,
    record::{data::RecordData, raw::RawRecordRef},
    util::Erased,
};

/// Vtable for type-erased record operations.
///
/// # Safety Invariant
///
/// The fields `drop` and `copy_to` are guaranteed to point to the functions
/// defined below instantiated with the record type `R` that was used to
/// create this [`RecordVtable`], and `layout` is `Layout::new::<R>()`.
pub(crate) struct RecordVtable {
    /// Gets the [`TypeId`] of the record type that was used to create this
    /// [`RecordVtable`].
    type_id: fn() -> TypeId,
    /// Gets the [`core::any::type_name`] of the record type.
    type_name: fn() -> &'static str,
    /// Size and alignment of the record type.
    layout: Layout,
    /// Drops the [`Box<RecordData<R>>`] instance pointed to by this pointer.
    drop: unsafe fn(NonNull<RecordData<Erased>>),
    /// Copies the record bytes to a destination pointer.
    copy_to: unsafe fn(RawRecordRef<'_>, *mut u8),
}

impl RecordVtable {
    /// Creates a new [`RecordVtable`] for the record type `R`.
    pub(super) const fn new<R: ChainRecord>() -> &'static Self {
        const {
            &Self {
                type_id: TypeId::of::<R>,
                type_name: core::any::type_name::<R>,
                layout: Layout::new::<R>(),
                drop: drop::<R>,
                copy_to: copy_to::<R>,
            }
        }
    }

    /// Gets the [`TypeId`] of the record type that was used to create this
    /// [`RecordVtable`].
    #[inline]
    pub(crate) fn type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Gets the [`core::any::type_name`] of the record type that was used to
    /// create this [`RecordVtable`].
    #[inline]
    pub(crate) fn type_name(&self) -> &'static str {
        (self.type_name)()
    }

    /// Gets the [`Layout`] of the record type.
    #[inline]
    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    /// Drops the `Box<RecordData<R>>` instance pointed to by this pointer.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. The pointer comes from [`Box<RecordData<R>>`] via [`Box::into_raw`]
    /// 2. This [`RecordVtable`] must be a vtable for the record type stored in
    ///    the [`RecordData`].
    /// 3. This method drops the [`Box<RecordData<R>>`], so the caller must
    ///    ensure that the pointer has not previously been dropped, that it is
    ///    able to transfer ownership of the pointer, and that it will not use
    ///    the pointer after calling this method.
    #[inline]
    pub(super) unsafe fn drop(&self, ptr: NonNull<RecordData<Erased>>) {
        // SAFETY: We know that `self.drop` points to the function `drop::<R>` below.
        // That function's safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        // 3. Guaranteed by the caller
        unsafe {
            (self.drop)(ptr);
        }
    }

    /// Copies the record referenced by `ptr` to `dst`.
    ///
    /// # Safety
    ///
    /// The caller must ensure:
    ///
    /// 1. This [`RecordVtable`] must be a vtable for the record type stored in
    ///    the [`RawRecordRef`].
    /// 2. `dst` is valid for writes of `self.layout().size()` bytes. It does
    ///    not need to be aligned.
    #[inline]
    pub(super) unsafe fn copy_to(&self, ptr: RawRecordRef<'_>, dst: *mut u8) {
        // SAFETY: We know that `self.copy_to` points to the function
        // `copy_to::<R>` below. That function's safety requirements are upheld:
        // 1. Guaranteed by the caller
        // 2. Guaranteed by the caller
        unsafe {
            (self.copy_to)(ptr, dst);
        }
    }
}

/// Drops the [`Box<RecordData<R>>`] instance pointed to by this pointer.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The pointer comes from [`Box<RecordData<R>>`] via [`Box::into_raw`]
/// 2. The record type `R` matches the actual record type stored in the
///    [`RecordData`]
/// 3. The pointer has not previously been dropped and is not used afterwards
unsafe fn drop<R: 'static>(ptr: NonNull<RecordData<Erased>>) {
    let ptr: NonNull<RecordData<R>> = ptr.cast::<RecordData<R>>();
    let ptr = ptr.as_ptr();
    // SAFETY: Our pointer has the correct type as guaranteed by the caller, and it
    // came from a call to `Box::into_raw` as also guaranteed by our caller.
    let boxed = unsafe { Box::from_raw(ptr) };
    core::mem::drop(boxed);
}

/// Copies the `R` stored in the [`RecordData`] to `dst`.
///
/// # Safety
///
/// The caller must ensure:
///
/// 1. The type `R` matches the actual record type stored in the
///    [`RecordData`]
/// 2. `dst` is valid for writes of `size_of::<R>()` bytes
unsafe fn copy_to<R: ChainRecord>(ptr: RawRecordRef<'_>, dst: *mut u8) {
    // SAFETY: The type `R` matches the stored record, as guaranteed by our caller.
    let record: &R = unsafe { ptr.record_downcast_unchecked::<R>() };
    // SAFETY: `dst` is valid for writes of `R` as guaranteed by our caller, and
    // `write_unaligned` places no alignment requirement on it.
    unsafe { dst.cast::<R>().write_unaligned(*record) };
}
