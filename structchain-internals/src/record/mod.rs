//! Module containing the type-erased storage for records that have been
//! appended to a builder but not yet placed in a chain.

pub(crate) mod data;
mod raw;
pub(crate) mod vtable;

pub use self::raw::{RawRecord, RawRecordRef};
