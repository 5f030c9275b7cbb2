//! This module encapsulates the fields of the [`RecordData`]. Since this is
//! the only place they are visible, this means that the type of the
//! [`RecordVtable`] is guaranteed to always be in sync with the type of the
//! actual record. This follows from the fact that they are in sync when
//! created and that the API offers no way to change the [`RecordVtable`] or
//! record type after creation.

use core::any::TypeId;

use crate::{
    header::ChainRecord,
    record::{raw::RawRecordRef, vtable::RecordVtable},
};

/// Type-erased record data structure with vtable-based dispatch.
///
/// This struct uses `#[repr(C)]` to enable safe field access in type-erased
/// contexts, allowing access to the vtable field even when the concrete
/// record type `R` is unknown.
#[repr(C)]
pub(crate) struct RecordData<R: 'static> {
    /// The Vtable of this record
    vtable: &'static RecordVtable,
    /// The record as supplied by the caller
    record: R,
}

impl<R: ChainRecord> RecordData<R> {
    /// Creates a new [`RecordData`] holding a copy of `record`.
    #[inline]
    pub(super) fn new(record: R) -> Self {
        Self {
            vtable: RecordVtable::new::<R>(),
            record,
        }
    }
}

impl<'a> RawRecordRef<'a> {
    /// Returns a reference to the [`RecordVtable`] of the [`RecordData`]
    /// instance.
    #[inline]
    pub(crate) fn vtable(self) -> &'static RecordVtable {
        let ptr = self.as_ptr();
        // SAFETY: We don't know the actual inner record type, but we do know
        // that it points to an instance of `RecordData<R>` for some specific `R`.
        // Since `RecordData<R>` is `#[repr(C)]`, that means that it's
        // safe to create pointers to the fields before the actual record.
        //
        // We need to take care to avoid creating an actual reference to
        // the `RecordData` itself though, as that would still be undefined behavior
        // since we don't have the right type.
        let vtable_ptr: *const &'static RecordVtable = unsafe { &raw const (*ptr).vtable };

        // SAFETY: Deferencing the pointer and getting out the `&'static
        // RecordVtable` is valid for the same reasons
        unsafe { *vtable_ptr }
    }

    /// Accesses the inner record of the [`RecordData`] instance as a reference
    /// to the specified type.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the type `R` matches the actual record type
    /// stored in the [`RecordData`].
    #[inline]
    pub unsafe fn record_downcast_unchecked<R: 'static>(self) -> &'a R {
        // SAFETY: The inner function requires that `R` matches the type stored, but
        // that is guaranteed by our caller.
        let this = unsafe { self.cast_inner::<R>() };
        &this.record
    }

    /// Accesses the inner record as `R` if that is the type it was created
    /// with.
    #[inline]
    pub fn record_downcast<R: 'static>(self) -> Option<&'a R> {
        if self.record_type_id() == TypeId::of::<R>() {
            // SAFETY: We just checked that the stored type is `R`.
            Some(unsafe { self.record_downcast_unchecked::<R>() })
        } else {
            None
        }
    }
}
