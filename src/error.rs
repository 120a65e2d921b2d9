use alloc::collections::TryReserveError;

/// Convenient result alias used by every fallible tree operation.
pub type Result<T> = core::result::Result<T, Error>;

/// Failures a mutating operation can report.
///
/// Lookups never fail: an absent key is `None`, not an error. Every error
/// below is raised before the tree is touched, so the tree is left exactly
/// as it was when one is returned.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The configured node limit would be exceeded by this operation.
    #[error("node limit of {limit} nodes would be exceeded")]
    NodeLimitExceeded {
        /// The limit set with [`Config::with_node_limit`](crate::Config::with_node_limit).
        limit: usize,
    },

    /// The arena ran out of addressable handles.
    #[error("node arena has no addressable handles left")]
    HandleSpaceExhausted,

    /// The allocator refused to grow node or value storage.
    #[error("allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),
}

/// The first broken structural invariant found by
/// [`BPlusTree::check_invariants`](crate::BPlusTree::check_invariants).
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// A non-root node holds fewer than `min_keys` or more than `max_keys` keys.
    #[error("node at depth {depth} holds {count} keys, allowed range is {min}..={max}")]
    KeyCount { depth: usize, count: usize, min: usize, max: usize },

    /// The root holds more than `max_keys` keys, or is an empty internal node.
    #[error("root holds {count} keys, which is not a valid root occupancy")]
    RootKeyCount { count: usize },

    /// Keys within one node are not strictly increasing.
    #[error("keys are not strictly increasing in a node at depth {depth}")]
    UnsortedKeys { depth: usize },

    /// A key lies outside the range delimited by its ancestors' separators.
    #[error("key at depth {depth} lies outside its separator bounds")]
    SeparatorBounds { depth: usize },

    /// An internal node does not hold exactly one more child than keys.
    #[error("internal node at depth {depth} has {keys} keys but {children} children")]
    ChildCount { depth: usize, keys: usize, children: usize },

    /// A leaf holds a different number of values than keys.
    #[error("leaf at depth {depth} has {keys} keys but {values} values")]
    ValueCount { depth: usize, keys: usize, values: usize },

    /// Two leaves sit at different depths.
    #[error("leaf found at depth {found}, expected {expected}")]
    LeafDepth { expected: usize, found: usize },

    /// A node's parent link does not point at the node that owns it.
    #[error("parent link mismatch at depth {depth}")]
    ParentLink { depth: usize },

    /// The leaf chain disagrees with the in-order leaf sequence.
    #[error("leaf chain is broken at leaf {position}")]
    LeafChain { position: usize },

    /// The cached entry count disagrees with the leaves.
    #[error("tree reports {reported} entries but the leaves hold {actual}")]
    Length { reported: usize, actual: usize },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    #[test]
    fn error_display() {
        let err = Error::NodeLimitExceeded { limit: 8 };
        assert_eq!(err.to_string(), "node limit of 8 nodes would be exceeded");

        let violation = InvariantViolation::Length { reported: 3, actual: 2 };
        assert_eq!(violation.to_string(), "tree reports 3 entries but the leaves hold 2");
    }

    #[test]
    fn try_reserve_error_converts() {
        let mut v: Vec<u64> = Vec::new();
        let err: Error = v.try_reserve(usize::MAX).unwrap_err().into();
        assert!(matches!(err, Error::AllocationFailed(_)));
    }
}
