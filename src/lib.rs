#![cfg_attr(not(doc), no_std)]
#![deny(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    clippy::as_ptr_cast_mut,
    clippy::ptr_as_ptr,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
// Make docs.rs generate better docs
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Contiguous, pointer-linked chains of extensible C structs.
//!
//! ## Overview
//!
//! Extensible C APIs let callers attach an open-ended list of optional
//! parameter blocks to a mandatory root structure. Every block starts with the
//! same header: a type tag telling the consumer what the block is, and a
//! pointer to the next block. Vulkan's `sType`/`pNext` chains are the best
//! known example.
//!
//! Building such a chain by hand means juggling raw pointers between values
//! that must not move. This crate instead copies every block into one
//! allocation and links them inside it:
//!
//! 1. Append records to a [`ChainBuilder`]. Each append returns a
//!    [`RecordId`], the byte offset the record will have in the chain.
//! 2. [`finalize`](ChainBuilder::finalize) the builder into a [`Chain`]. The
//!    chain owns one buffer holding all records back to back, with every
//!    forward pointer patched to the next record in that buffer.
//! 3. Hand [`Chain::as_ptr`] to the consumer, or collect many chains in a
//!    [`ChainCollection`] whose [`root_copies`](ChainCollection::root_copies)
//!    form a flat array of root records.
//!
//! ## Quick Example
//!
//! ```
//! use structchain::{ChainBuilder, ChainRecord, RecordHeader};
//!
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! struct DeviceCreateInfo {
//!     header: RecordHeader,
//!     queue_create_info_count: u32,
//! }
//! // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
//! unsafe impl ChainRecord for DeviceCreateInfo {}
//!
//! #[repr(C)]
//! #[derive(Clone, Copy)]
//! struct Features12 {
//!     header: RecordHeader,
//!     timeline_semaphore: u32,
//! }
//! // SAFETY: `#[repr(C)]` and starts with a `RecordHeader`.
//! unsafe impl ChainRecord for Features12 {}
//!
//! let mut builder = ChainBuilder::<DeviceCreateInfo>::new();
//! builder.append(DeviceCreateInfo {
//!     header: RecordHeader::new(3),
//!     queue_create_info_count: 1,
//! });
//! let features = builder.append(Features12 {
//!     header: RecordHeader::new(52),
//!     timeline_semaphore: 1,
//! });
//!
//! let chain = builder.finalize();
//! let root = chain.root();
//! assert_eq!(
//!     root.header.next.cast_const(),
//!     chain.at::<Features12>(features).as_ptr().cast_const().cast()
//! );
//! ```
//!
//! ## Record Types
//!
//! Any `#[repr(C)]`, [`Copy`] type starting with a [`RecordHeader`] can be
//! chained by implementing the unsafe marker trait [`ChainRecord`]. The chain
//! writes the forward pointer by raw offset, so that layout is the one thing
//! the implementation must get right.
//!
//! ## Contract Violations
//!
//! Appending a record whose forward pointer is already set, starting a chain
//! with a record that is not of the root type, finalizing an empty builder
//! and addressing past the end of a chain are programming errors. The
//! primary operations panic on them. Each has a `try_*` counterpart returning
//! a [`rootcause::Report`] of [`ChainError`] instead.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `trace` for appends and handle
//! closes, `debug` for finalization and collection inserts, and `warn` for
//! every rejected operation. No subscriber is installed by the crate.
//!
//! For implementation details, see the [`structchain-internals`] crate.
//!
//! [`structchain-internals`]: structchain_internals

extern crate alloc;

mod builder;
mod chain;
mod collection;
mod error;
pub mod handle;
pub mod prelude;
mod record;

pub use structchain_internals::header::{ChainRecord, RecordHeader};

pub use self::{
    builder::ChainBuilder,
    chain::Chain,
    collection::ChainCollection,
    error::{ChainError, ChainResult, ErrorKind},
    record::{RecordId, RecordRef},
};
