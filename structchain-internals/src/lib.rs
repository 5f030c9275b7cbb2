#![no_std]
#![forbid(
    missing_docs,
    clippy::alloc_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::std_instead_of_core,
    clippy::missing_safety_doc,
    clippy::missing_docs_in_private_items,
    clippy::undocumented_unsafe_blocks,
    clippy::multiple_unsafe_ops_per_block,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]
#![allow(rustdoc::private_intra_doc_links)]
//! Internal implementation crate for [`structchain`].
//!
//! # Overview
//!
//! This crate contains the low-level, type-erased data structures and unsafe
//! operations that power the [`structchain`] library: owned copies of
//! arbitrary record types, and the single allocation those copies are
//! concatenated into when a chain is finalized.
//!
//! **This crate is an implementation detail.** No semantic versioning guarantees
//! are provided. Users should depend on the [`structchain`] crate, not this one.
//!
//! # Architecture
//!
//! - **[`header`]**: The binary contract shared with the consumer of a chain
//!   - [`RecordHeader`]: `#[repr(C)]` type tag + forward pointer
//!   - [`ChainRecord`]: Unsafe marker trait for record types starting with a
//!     [`RecordHeader`]
//!
//! - **[`record`]**: Type-erased storage for records that are waiting to be
//!   chained
//!   - [`RawRecord`]: Owned record with [`Box`]-based allocation
//!   - [`RawRecordRef`]: Borrowed reference to a record
//!   - [`RecordData`]: `#[repr(C)]` wrapper enabling field access on erased
//!     types
//!   - [`RecordVtable`]: Function pointers and layout for type-erased dispatch
//!
//! - **[`chain`]**: The finalized buffer
//!   - [`RawChain`]: One aligned allocation holding every record back to back,
//!     with the forward pointers patched
//!   - [`RecordSlot`]: Offset and type information for one record in a
//!     [`RawChain`]
//!
//! # Safety Strategy
//!
//! A finalized chain hands out pointers into its own allocation, so the
//! allocation must never move once the forward pointers have been written.
//! [`RawChain`] owns a heap allocation that it never reallocates, and the
//! patching step only runs after that allocation exists. Moving a
//! [`RawChain`] moves the handle, not the bytes.
//!
//! Type erasure follows the same rules as elsewhere in this crate:
//!
//! - **Module-based encapsulation**: Safety-critical types keep fields
//!   module-private, making invariants locally verifiable within a single file
//! - **`#[repr(C)]` layout**: Enables safe field projection on type-erased
//!   pointers without constructing invalid references
//! - **Documented vtable contracts**: Each vtable method specifies exactly when
//!   it can be safely called
//!
//! [`structchain`]: https://docs.rs/structchain/latest/structchain/
//! [`RecordHeader`]: header::RecordHeader
//! [`ChainRecord`]: header::ChainRecord
//! [`RecordData`]: record::data::RecordData
//! [`RecordVtable`]: record::vtable::RecordVtable
//! [`Box`]: alloc::boxed::Box

extern crate alloc;

mod chain;
pub mod header;
mod record;
mod util;

pub use chain::{RawChain, RecordSlot};
pub use record::{RawRecord, RawRecordRef};
