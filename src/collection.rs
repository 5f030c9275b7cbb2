//! Batches of chains with a flat array of their root records.

use alloc::vec::Vec;

use structchain_internals::header::ChainRecord;

use crate::Chain;

/// An append-only collection of chains that also keeps a contiguous copy of
/// every chain's root record.
///
/// APIs that create many objects in one call take an array of root records,
/// each of which may point into its own extension chain. The collection owns
/// the chains and exposes the root copies as a slice ready to be passed to
/// such an API. Each root copy keeps its forward pointer, so it still links
/// into the extension records of the chain it was copied from. Those records
/// stay where they are for as long as the collection holds the chain.
///
/// The root copies are snapshots. Changing a chain's root through
/// [`get_mut`](Self::get_mut) after it was inserted does not update its copy
/// until [`sync_root_copies`](Self::sync_root_copies) is called.
///
/// # Examples
///
/// ```
/// use structchain::{ChainBuilder, ChainCollection, ChainRecord, RecordHeader};
///
/// #[repr(C)]
/// #[derive(Clone, Copy)]
/// struct PipelineInfo {
///     header: RecordHeader,
///     stage_count: u32,
/// }
/// // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
/// unsafe impl ChainRecord for PipelineInfo {}
///
/// let mut pipelines = ChainCollection::new();
/// for stage_count in 1..=3 {
///     let mut builder = ChainBuilder::<PipelineInfo>::new();
///     builder.append(PipelineInfo {
///         header: RecordHeader::new(28),
///         stage_count,
///     });
///     pipelines.insert(builder.finalize());
/// }
///
/// assert_eq!(pipelines.count(), 3);
/// let stage_counts: Vec<u32> = pipelines
///     .root_copies()
///     .iter()
///     .map(|info| info.stage_count)
///     .collect();
/// assert_eq!(stage_counts, [1, 2, 3]);
/// ```
pub struct ChainCollection<R: ChainRecord> {
    root_copies: Vec<R>,
    chains: Vec<Chain<R>>,
}

impl<R: ChainRecord> ChainCollection<R> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            root_copies: Vec::new(),
            chains: Vec::new(),
        }
    }

    /// Creates an empty collection with room for `chains` chains.
    pub fn with_capacity(chains: usize) -> Self {
        Self {
            root_copies: Vec::with_capacity(chains),
            chains: Vec::with_capacity(chains),
        }
    }

    /// Takes ownership of `chain` and appends a copy of its current root
    /// record to the root copies.
    ///
    /// This may reallocate the root copies, invalidating pointers previously
    /// obtained from [`root_copies_ptr`](Self::root_copies_ptr).
    ///
    /// # Panics
    ///
    /// Panics if the collection already holds `u32::MAX` chains.
    pub fn insert(&mut self, chain: Chain<R>) {
        assert!(
            self.chains.len() < u32::MAX as usize,
            "a chain collection cannot hold more than u32::MAX chains"
        );
        self.root_copies.push(*chain.root());
        self.chains.push(chain);
        tracing::debug!(
            index = self.chains.len() - 1,
            root_type = core::any::type_name::<R>(),
            "inserted chain into collection"
        );
    }

    /// Number of chains in the collection.
    pub fn count(&self) -> u32 {
        u32::try_from(self.chains.len()).unwrap_or(u32::MAX)
    }

    /// Number of chains in the collection, as a `usize`.
    pub fn len(&self) -> usize {
        self.chains.len()
    }

    /// Whether the collection holds no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    /// The root copies, one per chain in insertion order.
    pub fn root_copies(&self) -> &[R] {
        &self.root_copies
    }

    /// Pointer to the first root copy, for consumers expecting a flat array
    /// of [`count`](Self::count) root records.
    ///
    /// The pointer is valid until the next call to [`insert`](Self::insert).
    /// It is dangling (but non-null) when the collection is empty.
    pub fn root_copies_ptr(&self) -> *const R {
        self.root_copies.as_ptr()
    }

    /// Returns the chain at `index`.
    pub fn get(&self, index: usize) -> Option<&Chain<R>> {
        self.chains.get(index)
    }

    /// Returns the chain at `index` mutably.
    ///
    /// Changes to the chain's root are not reflected in its root copy until
    /// [`sync_root_copies`](Self::sync_root_copies) is called.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Chain<R>> {
        self.chains.get_mut(index)
    }

    /// Iterates over the chains in insertion order.
    pub fn iter(&self) -> core::slice::Iter<'_, Chain<R>> {
        self.chains.iter()
    }

    /// Copies every chain's current root record over its root copy.
    pub fn sync_root_copies(&mut self) {
        for (copy, chain) in self.root_copies.iter_mut().zip(&self.chains) {
            *copy = *chain.root();
        }
    }
}

impl<R: ChainRecord> Default for ChainCollection<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: ChainRecord> Extend<Chain<R>> for ChainCollection<R> {
    fn extend<I: IntoIterator<Item = Chain<R>>>(&mut self, iter: I) {
        for chain in iter {
            self.insert(chain);
        }
    }
}

impl<R: ChainRecord> FromIterator<Chain<R>> for ChainCollection<R> {
    fn from_iter<I: IntoIterator<Item = Chain<R>>>(iter: I) -> Self {
        let mut collection = ChainCollection::new();
        collection.extend(iter);
        collection
    }
}

impl<'a, R: ChainRecord> IntoIterator for &'a ChainCollection<R> {
    type Item = &'a Chain<R>;
    type IntoIter = core::slice::Iter<'a, Chain<R>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<R: ChainRecord> core::fmt::Debug for ChainCollection<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(&self.chains).finish()
    }
}

#[cfg(test)]
mod tests {
    use core::ffi::c_void;

    use super::*;
    use crate::{ChainBuilder, RecordHeader};

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct CreateInfo {
        header: RecordHeader,
        size: u64,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for CreateInfo {}

    #[repr(C)]
    #[derive(Clone, Copy, Debug, PartialEq)]
    struct ExternalMemory {
        header: RecordHeader,
        handle_types: u32,
    }

    // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
    unsafe impl ChainRecord for ExternalMemory {}

    fn chain(size: u64, with_extension: bool) -> Chain<CreateInfo> {
        let mut builder = ChainBuilder::new();
        builder.append(CreateInfo {
            header: RecordHeader::new(12),
            size,
        });
        if with_extension {
            builder.append(ExternalMemory {
                header: RecordHeader::new(1000072000),
                handle_types: 0x40,
            });
        }
        builder.finalize()
    }

    #[test]
    fn test_insert_keeps_parallel_sequences() {
        let mut collection = ChainCollection::new();
        assert!(collection.is_empty());
        assert!(collection.root_copies().is_empty());

        collection.insert(chain(64, false));
        collection.insert(chain(128, true));
        collection.insert(chain(256, false));

        assert_eq!(collection.count(), 3);
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.root_copies().len(), 3);
        for (copy, chain) in collection.root_copies().iter().zip(&collection) {
            assert_eq!(copy, chain.root());
        }
    }

    #[test]
    fn test_root_copy_links_into_owned_chain() {
        let mut collection = ChainCollection::new();
        collection.insert(chain(128, true));
        // Force the chain vector to reallocate.
        for size in 0..32 {
            collection.insert(chain(size, false));
        }

        let copy = collection.root_copies()[0];
        let owned = collection.get(0).unwrap();
        let extension_id = owned.find_id::<ExternalMemory>().unwrap();
        let expected = owned
            .as_ptr()
            .cast::<u8>()
            .wrapping_add(extension_id.as_usize())
            .cast::<c_void>();
        assert_eq!(copy.header.next.cast_const(), expected);
        assert!(collection.root_copies()[1].header.next.is_null());
    }

    #[test]
    fn test_root_copies_are_snapshots() {
        let mut collection = ChainCollection::new();
        collection.insert(chain(64, false));

        collection.get_mut(0).unwrap().root_mut().size = 65;
        assert_eq!(collection.get(0).unwrap().root().size, 65);
        assert_eq!(collection.root_copies()[0].size, 64);

        collection.sync_root_copies();
        assert_eq!(collection.root_copies()[0].size, 65);
    }

    #[test]
    fn test_root_copies_ptr() {
        let mut collection = ChainCollection::with_capacity(2);
        collection.insert(chain(1, false));
        collection.insert(chain(2, true));

        let ptr = collection.root_copies_ptr();
        // SAFETY: The collection holds two root copies and has not been modified
        // since the pointer was taken.
        let second = unsafe { *ptr.add(1) };
        assert_eq!(second.size, 2);
    }

    #[test]
    fn test_from_iterator() {
        let collection: ChainCollection<CreateInfo> =
            (1..=4).map(|size| chain(size, size % 2 == 0)).collect();
        assert_eq!(collection.count(), 4);
        let sizes: alloc::vec::Vec<u64> = collection.iter().map(|chain| chain.root().size).collect();
        assert_eq!(sizes, [1, 2, 3, 4]);
        assert_eq!(collection.get(1).unwrap().record_count(), 2);
        assert!(collection.get(4).is_none());
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_not_impl_any!(ChainCollection<CreateInfo>: Send, Sync);
    }
}
