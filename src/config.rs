use tracing::debug;

/// Smallest order that still lets nodes split and merge.
pub const MIN_ORDER: usize = 3;

/// Order used by [`Config::default`] and [`BPlusTree::default`](crate::BPlusTree::default).
pub const DEFAULT_ORDER: usize = 64;

/// Construction parameters for a [`BPlusTree`](crate::BPlusTree).
///
/// # Examples
///
/// ```
/// use leafline::Config;
///
/// let config = Config::new(4).with_node_limit(1024);
/// assert_eq!(config.max_keys(), 3);
/// assert_eq!(config.min_keys(), 1);
///
/// // Orders below the minimum are raised, never rejected.
/// assert_eq!(Config::new(1).order(), 3);
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    order: usize,
    node_limit: Option<usize>,
}

impl Config {
    /// Creates a configuration for a tree of the given order (maximum children per node).
    #[must_use]
    pub fn new(order: usize) -> Self {
        let clamped = order.max(MIN_ORDER);
        if clamped != order {
            debug!(requested = order, order = clamped, "order raised to minimum");
        }
        Self {
            order: clamped,
            node_limit: None,
        }
    }

    /// Caps the number of live nodes the tree may hold.
    ///
    /// Operations that would exceed the cap fail with
    /// [`Error::NodeLimitExceeded`](crate::Error::NodeLimitExceeded) and leave the tree untouched.
    #[must_use]
    pub const fn with_node_limit(mut self, limit: usize) -> Self {
        self.node_limit = Some(limit);
        self
    }

    /// Maximum number of children of an internal node.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.order
    }

    /// Maximum number of keys any node holds between operations.
    #[must_use]
    pub const fn max_keys(&self) -> usize {
        self.order - 1
    }

    /// Minimum number of keys every non-root node holds between operations.
    #[must_use]
    pub const fn min_keys(&self) -> usize {
        self.order.div_ceil(2) - 1
    }

    /// The node cap, if one was set.
    #[must_use]
    pub const fn node_limit(&self) -> Option<usize> {
        self.node_limit
    }

    /// Index at which an overfull node (holding `max_keys + 1` keys) splits.
    pub(crate) const fn split_point(&self) -> usize {
        (self.max_keys() + 1) / 2
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_ORDER)
    }
}
