//! Errors raised when the structural contract of a chain is violated.
//!
//! Every error in this crate describes a programming mistake in the caller,
//! not an environmental failure: a record appended with its forward pointer
//! already set, a chain that does not start with its root type, a lookup past
//! the end of a chain. The primary operations
//! ([`ChainBuilder::append`], [`ChainBuilder::finalize`], [`Chain::at`]) treat
//! these as assertion failures and panic at the caller's location. The
//! `try_*` variants return the same condition as a [`Report<ChainError>`] for
//! callers that assemble chains from untrusted descriptions.
//!
//! [`ChainBuilder::append`]: crate::ChainBuilder::append
//! [`ChainBuilder::finalize`]: crate::ChainBuilder::finalize
//! [`Chain::at`]: crate::Chain::at

use rootcause::Report;

/// Broad category of a [`ChainError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A structural invariant of the chain would be broken.
    InvariantViolation,
    /// A record id does not fall inside the chain.
    OutOfBounds,
}

/// A violation of the chain contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// A record was appended with a non-null forward pointer.
    #[error("record of type `{type_name}` was appended with its forward pointer already set")]
    ForwardPointerSet {
        /// Type of the offending record.
        type_name: &'static str,
    },
    /// The first record appended to a builder was not of the root type.
    #[error("the first record of a chain must be of type `{expected}`, got `{found}`")]
    RootTypeMismatch {
        /// The root type of the builder.
        expected: &'static str,
        /// Type of the record that was appended.
        found: &'static str,
    },
    /// A builder without records was finalized.
    #[error("cannot finalize a chain builder that holds no records")]
    EmptyChain,
    /// The chain would no longer be addressable by a 32-bit record id.
    #[error("appending a record of type `{type_name}` would grow the chain past u32::MAX bytes")]
    SizeOverflow {
        /// Type of the record that did not fit.
        type_name: &'static str,
    },
    /// A record id lies at or past the end of the chain.
    #[error("record id {id} is out of bounds for a chain of {len} bytes")]
    OutOfBounds {
        /// The requested record id.
        id: u32,
        /// Length of the chain in bytes.
        len: usize,
    },
}

impl ChainError {
    /// Returns the category of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use structchain::{ChainError, ErrorKind};
    ///
    /// assert_eq!(ChainError::EmptyChain.kind(), ErrorKind::InvariantViolation);
    /// assert_eq!(
    ///     ChainError::OutOfBounds { id: 64, len: 48 }.kind(),
    ///     ErrorKind::OutOfBounds
    /// );
    /// ```
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::ForwardPointerSet { .. }
            | ChainError::RootTypeMismatch { .. }
            | ChainError::EmptyChain
            | ChainError::SizeOverflow { .. } => ErrorKind::InvariantViolation,
            ChainError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
        }
    }
}

/// Result type of the fallible chain operations.
pub type ChainResult<T> = Result<T, Report<ChainError>>;

/// Unwraps `result`, turning a contract violation into a panic at the
/// caller's location.
#[track_caller]
pub(crate) fn enforce<T>(result: ChainResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(report) => panic!("{report}"),
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn test_error_messages() {
        let error = ChainError::RootTypeMismatch {
            expected: "Root",
            found: "Extension",
        };
        assert_eq!(
            error.to_string(),
            "the first record of a chain must be of type `Root`, got `Extension`"
        );
        assert_eq!(
            ChainError::OutOfBounds { id: 56, len: 56 }.to_string(),
            "record id 56 is out of bounds for a chain of 56 bytes"
        );
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ChainError::ForwardPointerSet { type_name: "T" }.kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            ChainError::SizeOverflow { type_name: "T" }.kind(),
            ErrorKind::InvariantViolation
        );
        assert_eq!(
            ChainError::OutOfBounds { id: 0, len: 0 }.kind(),
            ErrorKind::OutOfBounds
        );
    }

    #[test]
    fn test_enforce_passes_values_through() {
        assert_eq!(enforce::<u32>(Ok(7)), 7);
    }

    #[test]
    #[should_panic(expected = "cannot finalize a chain builder that holds no records")]
    fn test_enforce_panics_with_report() {
        enforce::<()>(Err(Report::new_sendsync(ChainError::EmptyChain)));
    }

    #[test]
    fn test_send_sync() {
        static_assertions::assert_impl_all!(ChainError: Send, Sync, Copy);
    }
}
