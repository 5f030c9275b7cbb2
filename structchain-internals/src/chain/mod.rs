//! Module containing the finalized chain buffer.

mod raw;
mod slot;

pub use self::{raw::RawChain, slot::RecordSlot};
