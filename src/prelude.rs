//! Commonly used items.
//!
//! ```
//! use structchain::prelude::*;
//! ```

pub use crate::{
    Chain, ChainBuilder, ChainCollection, ChainError, ChainRecord, ChainResult, RecordHeader,
    RecordId,
};
