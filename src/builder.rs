//! Incremental assembly of a chain.

use alloc::{format, string::String, vec::Vec};
use core::{any::TypeId, marker::PhantomData};

use hashbrown::HashMap;
use rootcause::Report;
use structchain_internals::{RawChain, RawRecord, header::ChainRecord};

use crate::{
    Chain, RecordId,
    error::{ChainError, ChainResult, enforce},
};

/// Maps each record type to the id of its first occurrence in a chain.
pub(crate) type TypeIndex = HashMap<TypeId, RecordId, rustc_hash::FxBuildHasher>;

/// Collects records and computes where each one will live in the finalized
/// chain.
///
/// The first record appended must be of the root type `R`. Every record must
/// be appended with a null forward pointer; the builder links the records
/// itself when the chain is [finalized](Self::finalize).
///
/// # Examples
///
/// ```
/// use structchain::{ChainBuilder, ChainRecord, RecordHeader};
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct InstanceInfo {
///     header: RecordHeader,
///     api_version: u32,
/// }
/// // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
/// unsafe impl ChainRecord for InstanceInfo {}
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct ValidationFeatures {
///     header: RecordHeader,
///     enabled_count: u32,
/// }
/// // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
/// unsafe impl ChainRecord for ValidationFeatures {}
///
/// let mut builder = ChainBuilder::<InstanceInfo>::new();
/// let root = builder.append(InstanceInfo {
///     header: RecordHeader::new(1),
///     api_version: 0x0040_3000,
/// });
/// let features = builder.append(ValidationFeatures {
///     header: RecordHeader::new(1000247000),
///     enabled_count: 2,
/// });
/// assert_eq!(root.offset(), 0);
/// assert_eq!(features.as_usize(), size_of::<InstanceInfo>());
///
/// let chain = builder.finalize();
/// assert_eq!(chain.root().api_version, 0x0040_3000);
/// assert_eq!(chain.get::<ValidationFeatures>(features).unwrap().enabled_count, 2);
/// ```
pub struct ChainBuilder<R: ChainRecord> {
    records: Vec<RawRecord>,
    size: u32,
    types: TypeIndex,
    _root: PhantomData<R>,
}

impl<R: ChainRecord> ChainBuilder<R> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty builder with room for `records` records before
    /// reallocating.
    pub fn with_capacity(records: usize) -> Self {
        Self {
            records: Vec::with_capacity(records),
            size: 0,
            types: HashMap::with_capacity_and_hasher(records, rustc_hash::FxBuildHasher),
            _root: PhantomData,
        }
    }

    /// Appends a copy of `record` and returns the id it will have in the
    /// finalized chain.
    ///
    /// The id is the number of bytes appended before this record.
    ///
    /// # Panics
    ///
    /// Panics if the record's forward pointer is not null, if this is the
    /// first record and it is not of the root type `R`, or if the chain would
    /// grow past `u32::MAX` bytes. Use [`try_append`](Self::try_append) to
    /// get these conditions as an error instead.
    #[track_caller]
    pub fn append<T: ChainRecord>(&mut self, record: T) -> RecordId {
        enforce(self.try_append(record))
    }

    /// Appends a copy of `record`, returning an error instead of panicking
    /// when the record would break the chain's structure.
    ///
    /// On error the builder is left unchanged.
    pub fn try_append<T: ChainRecord>(&mut self, record: T) -> ChainResult<RecordId> {
        let type_name = core::any::type_name::<T>();

        if !record.next().is_null() {
            tracing::warn!(record_type = type_name, "rejected record with a preset forward pointer");
            return Err(
                Report::new_sendsync(ChainError::ForwardPointerSet { type_name })
                    .attach(self.describe()),
            );
        }

        if self.records.is_empty() && TypeId::of::<T>() != TypeId::of::<R>() {
            let expected = core::any::type_name::<R>();
            tracing::warn!(
                root_type = expected,
                record_type = type_name,
                "rejected first record that is not of the root type"
            );
            return Err(Report::new_sendsync(ChainError::RootTypeMismatch {
                expected,
                found: type_name,
            }));
        }

        let Some(size) = u32::try_from(size_of::<T>())
            .ok()
            .and_then(|size| self.size.checked_add(size))
        else {
            tracing::warn!(record_type = type_name, "rejected record that overflows the chain");
            return Err(
                Report::new_sendsync(ChainError::SizeOverflow { type_name })
                    .attach(self.describe()),
            );
        };

        let id = RecordId::from_offset(self.size);
        self.records.push(RawRecord::new(record));
        self.types.entry(TypeId::of::<T>()).or_insert(id);
        self.size = size;

        tracing::trace!(
            record_id = id.offset(),
            record_type = type_name,
            size = size_of::<T>(),
            "appended record"
        );
        Ok(id)
    }

    /// Copies every record into one allocation and links them together.
    ///
    /// The builder is not consumed. Finalizing it again produces an
    /// independent chain with the same content at a different address.
    ///
    /// # Panics
    ///
    /// Panics if no records have been appended. Use
    /// [`try_finalize`](Self::try_finalize) to get an error instead.
    #[track_caller]
    #[must_use]
    pub fn finalize(&self) -> Chain<R> {
        enforce(self.try_finalize())
    }

    /// Copies every record into one allocation and links them together,
    /// returning an error if the builder is empty.
    pub fn try_finalize(&self) -> ChainResult<Chain<R>> {
        if self.records.is_empty() {
            tracing::warn!(
                root_type = core::any::type_name::<R>(),
                "refused to finalize an empty chain"
            );
            return Err(Report::new_sendsync(ChainError::EmptyChain));
        }

        let Some(raw) = RawChain::new(&self.records) else {
            return Err(
                Report::new_sendsync(ChainError::SizeOverflow {
                    type_name: core::any::type_name::<R>(),
                })
                .attach(self.describe()),
            );
        };

        tracing::debug!(
            records = raw.slots().len(),
            bytes = raw.len_bytes(),
            align = raw.align(),
            "finalized chain"
        );

        // SAFETY: `try_append` only accepts a first record of type `R`, so the
        // record at offset 0 is an `R`, and the allocation is aligned to the
        // largest record alignment, which is at least that of `R`. The type
        // index was built from the same records, and `self.size` caps the
        // chain at `u32::MAX` bytes.
        Ok(unsafe { Chain::from_raw(raw, self.types.clone()) })
    }

    /// Number of records appended so far.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records have been appended.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size in bytes of the chain this builder would produce.
    pub fn size_in_bytes(&self) -> u32 {
        self.size
    }

    /// The root record as it was appended, if any.
    pub fn root(&self) -> Option<&R> {
        self.records.first()?.as_ref().record_downcast::<R>()
    }

    fn describe(&self) -> String {
        format!(
            "builder holds {} records in {} bytes",
            self.records.len(),
            self.size
        )
    }
}

impl<R: ChainRecord> Default for ChainBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ChainRecord> core::fmt::Debug for ChainBuilder<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChainBuilder")
            .field("root", &core::any::type_name::<R>())
            .field("records", &self.records)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use core::ffi::c_void;

    use super::*;
    use crate::{ErrorKind, RecordHeader};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Root {
        header: RecordHeader,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for Root {}

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Extension {
        header: RecordHeader,
        value: u64,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for Extension {}

    fn root() -> Root {
        Root {
            header: RecordHeader::new(1),
        }
    }

    fn extension(value: u64) -> Extension {
        Extension {
            header: RecordHeader::new(2),
            value,
        }
    }

    #[test]
    fn test_ids_are_running_byte_totals() {
        let mut builder = ChainBuilder::<Root>::new();
        let sizes = [
            size_of::<Root>(),
            size_of::<Extension>(),
            size_of::<Extension>(),
            size_of::<Root>(),
        ];

        let ids = [
            builder.append(root()),
            builder.append(extension(1)),
            builder.append(extension(2)),
            builder.append(root()),
        ];

        let mut expected = 0;
        for (id, size) in ids.iter().zip(sizes) {
            assert_eq!(id.as_usize(), expected);
            expected += size;
        }
        assert_eq!(builder.size_in_bytes() as usize, expected);
        assert_eq!(builder.len(), 4);
    }

    #[test]
    fn test_root_type_is_enforced_on_first_record_only() {
        let mut builder = ChainBuilder::<Root>::new();

        let report = builder.try_append(extension(1)).unwrap_err();
        assert_eq!(report.current_context().kind(), ErrorKind::InvariantViolation);
        assert!(matches!(
            report.current_context(),
            ChainError::RootTypeMismatch { .. }
        ));
        assert!(builder.is_empty());
        assert_eq!(builder.size_in_bytes(), 0);

        builder.try_append(root()).unwrap();
        builder.try_append(extension(1)).unwrap();
        builder.try_append(root()).unwrap();
        assert_eq!(builder.len(), 3);
    }

    #[test]
    fn test_preset_forward_pointer_is_rejected() {
        let mut target = 0u64;
        let mut builder = ChainBuilder::<Root>::new();
        builder.append(root());

        let mut linked = extension(3);
        linked.header.next = (&raw mut target).cast::<c_void>();

        let report = builder.try_append(linked).unwrap_err();
        assert!(matches!(
            report.current_context(),
            ChainError::ForwardPointerSet { .. }
        ));
        assert_eq!(builder.len(), 1);
        assert_eq!(builder.size_in_bytes() as usize, size_of::<Root>());
    }

    #[test]
    fn test_preset_forward_pointer_on_root_is_rejected() {
        let mut target = 0u64;
        let mut first = root();
        first.header.next = (&raw mut target).cast::<c_void>();

        let mut builder = ChainBuilder::<Root>::new();
        assert!(builder.try_append(first).is_err());
        assert!(builder.is_empty());
    }

    #[test]
    #[should_panic(expected = "must be of type")]
    fn test_append_panics_on_wrong_root() {
        let mut builder = ChainBuilder::<Root>::new();
        builder.append(extension(1));
    }

    #[test]
    #[should_panic(expected = "forward pointer already set")]
    fn test_append_panics_on_preset_forward_pointer() {
        let mut target = 0u64;
        let mut first = root();
        first.header.next = (&raw mut target).cast::<c_void>();
        ChainBuilder::<Root>::new().append(first);
    }

    #[test]
    fn test_finalize_empty_is_an_error() {
        let builder = ChainBuilder::<Root>::new();
        let report = builder.try_finalize().unwrap_err();
        assert_eq!(*report.current_context(), ChainError::EmptyChain);
        assert_eq!(report.current_context().kind(), ErrorKind::InvariantViolation);
    }

    #[test]
    #[should_panic(expected = "holds no records")]
    fn test_finalize_empty_panics() {
        let _chain = ChainBuilder::<Root>::new().finalize();
    }

    #[test]
    fn test_staged_root() {
        let mut builder = ChainBuilder::<Root>::new();
        assert!(builder.root().is_none());
        builder.append(root());
        builder.append(extension(5));
        assert_eq!(builder.root(), Some(&root()));
    }

    #[test]
    fn test_finalize_twice_gives_independent_chains() {
        let mut builder = ChainBuilder::<Root>::new();
        builder.append(root());
        let id = builder.append(extension(9));

        let mut first = builder.finalize();
        let second = builder.finalize();

        assert_ne!(first.as_ptr(), second.as_ptr());
        assert_eq!(first.len_bytes(), second.len_bytes());
        assert_eq!(first.get::<Extension>(id), second.get::<Extension>(id));

        first.get_mut::<Extension>(id).unwrap().value = 10;
        assert_eq!(second.get::<Extension>(id).unwrap().value, 9);
    }

    #[test]
    fn test_append_after_finalize_only_affects_later_chains() {
        let mut builder = ChainBuilder::<Root>::new();
        builder.append(root());
        let early = builder.finalize();

        let id = builder.append(extension(4));
        let late = builder.finalize();

        assert_eq!(early.record_count(), 1);
        assert!(early.root().header.next.is_null());
        assert_eq!(late.record_count(), 2);
        assert_eq!(late.get::<Extension>(id).unwrap().value, 4);
    }

    #[test]
    fn test_error_report_mentions_state() {
        let mut target = 0u64;
        let mut builder = ChainBuilder::<Root>::new();
        builder.append(root());
        let mut linked = extension(3);
        linked.header.next = (&raw mut target).cast::<c_void>();

        let rendered = builder.try_append(linked).unwrap_err().to_string();
        assert!(rendered.contains("forward pointer already set"));
        assert!(rendered.contains("builder holds 1 records"));
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(ChainBuilder<Root>: Send, Sync);
    }
}
