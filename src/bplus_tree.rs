use core::borrow::Borrow;
use core::fmt;
use core::iter::FusedIterator;
use core::marker::PhantomData;
use core::ops::Index;

use alloc::vec::Vec;
use tracing::warn;

use crate::config::Config;
use crate::error::{InvariantViolation, Result};
use crate::raw::{Handle, RawBPlusTree};

mod cursor;

pub use cursor::{BidirectionalCursor, Cursor, CursorMut, CursorPosition, Reversed};

/// An ordered map backed by a B+ tree.
///
/// Every entry lives in a leaf, leaves sit at the same depth and are chained
/// in key order, and internal nodes hold only routing keys. This makes point
/// lookups logarithmic and ordered scans (forward or backward, from any
/// starting key) a walk along the leaf chain.
///
/// The branching factor is fixed at construction through the tree's *order*:
/// the maximum number of children of an internal node. Every node except the
/// root keeps between `ceil(order / 2) - 1` and `order - 1` keys.
///
/// Nodes live in an arena owned by the tree. An optional node limit
/// ([`Config::with_node_limit`]) bounds that arena; inserts and bulk loads that
/// would exceed it fail with an [`Error`](crate::Error) and leave the tree as it was.
///
/// # Examples
///
/// ```
/// use leafline::BPlusTree;
///
/// let mut tree = BPlusTree::new(4);
/// for key in [50, 20, 80, 10, 30, 70, 90, 40, 60] {
///     tree.insert(key, key * 100).unwrap();
/// }
///
/// assert_eq!(tree.search(&30), Some(&3000));
/// assert_eq!(tree.remove(&30), Some(3000));
/// assert!(!tree.contains_key(&30));
///
/// let keys: Vec<_> = tree.keys().copied().collect();
/// assert_eq!(keys, [10, 20, 40, 50, 60, 70, 80, 90]);
/// assert!(tree.validate());
/// ```
pub struct BPlusTree<K, V> {
    raw: RawBPlusTree<K, V>,
}

/// An iterator over the entries of a `BPlusTree`, in key order.
///
/// This `struct` is created by the [`iter`] method on [`BPlusTree`].
///
/// [`iter`]: BPlusTree::iter
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Iter<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    front_leaf: Option<Handle>,
    front_index: usize,
    back_leaf: Option<Handle>,
    back_index: usize,
    remaining: usize,
}

/// A mutable iterator over the entries of a `BPlusTree`, in key order.
///
/// This `struct` is created by the [`iter_mut`] method on [`BPlusTree`].
/// Values can be updated in place; keys are always shared.
///
/// [`iter_mut`]: BPlusTree::iter_mut
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct IterMut<'a, K: 'a, V: 'a> {
    tree: *mut RawBPlusTree<K, V>,
    front_leaf: Option<Handle>,
    front_index: usize,
    back_leaf: Option<Handle>,
    back_index: usize,
    remaining: usize,
    _marker: PhantomData<&'a mut (K, V)>,
}

// SAFETY: IterMut behaves as &mut RawBPlusTree<K, V>, so it is Send when K and V are Send.
unsafe impl<K: Send, V: Send> Send for IterMut<'_, K, V> {}

/// An owning iterator over the entries of a `BPlusTree`, in key order.
pub struct IntoIter<K, V> {
    inner: alloc::vec::IntoIter<(K, V)>,
}

/// An iterator over the keys of a `BPlusTree`.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// An iterator over the values of a `BPlusTree`, in key order.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

/// A mutable iterator over the values of a `BPlusTree`, in key order.
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct ValuesMut<'a, K, V> {
    inner: IterMut<'a, K, V>,
}

/// An iterator over the entries of a `BPlusTree` whose keys lie in an inclusive range.
///
/// This `struct` is created by the [`range`] method on [`BPlusTree`].
///
/// [`range`]: BPlusTree::range
#[must_use = "iterators are lazy and do nothing unless consumed"]
pub struct Range<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    /// First and last positions still to be yielded; `None` once exhausted.
    bounds: Option<((Handle, usize), (Handle, usize))>,
}

impl<K, V> BPlusTree<K, V> {
    /// Makes a new, empty `BPlusTree` of the given order.
    ///
    /// Orders below [`MIN_ORDER`](crate::MIN_ORDER) are raised to it.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let tree: BPlusTree<u32, &str> = BPlusTree::new(1);
    /// assert_eq!(tree.order(), 3);
    /// assert!(tree.is_empty());
    /// ```
    #[must_use]
    pub fn new(order: usize) -> Self {
        Self::with_config(Config::new(order))
    }

    /// Makes a new, empty `BPlusTree` from a full [`Config`].
    #[must_use]
    pub const fn with_config(config: Config) -> Self {
        BPlusTree {
            raw: RawBPlusTree::new(config),
        }
    }

    /// The tree's order: the maximum number of children of an internal node.
    #[must_use]
    pub const fn order(&self) -> usize {
        self.raw.config().order()
    }

    /// The configuration the tree was built with.
    #[must_use]
    pub const fn config(&self) -> &Config {
        self.raw.config()
    }

    /// Returns the number of entries in the tree.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns `true` if the tree contains no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Number of levels from the root to the leaves, `0` for an empty tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(3);
    /// assert_eq!(tree.height(), 0);
    /// tree.insert(1, ()).unwrap();
    /// tree.insert(2, ()).unwrap();
    /// assert_eq!(tree.height(), 1);
    /// tree.insert(3, ()).unwrap();
    /// assert_eq!(tree.height(), 2);
    /// ```
    #[must_use]
    pub fn height(&self) -> usize {
        self.raw.height()
    }

    /// Removes every entry and frees every node.
    pub fn clear(&mut self) {
        self.raw.clear();
    }

    /// Returns the first entry in key order.
    #[must_use]
    pub fn first_key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.raw.first_leaf()?;
        Some(self.raw.entry(leaf, 0))
    }

    /// Returns the last entry in key order.
    #[must_use]
    pub fn last_key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.raw.last_leaf()?;
        Some(self.raw.entry(leaf, self.raw.leaf_len(leaf) - 1))
    }

    /// Gets an iterator over the entries of the tree, in key order.
    ///
    /// The iterator is double ended, so `iter().rev()` walks the tree backwards.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(3);
    /// for key in 1..=20 {
    ///     tree.insert(key, ()).unwrap();
    /// }
    /// assert!(tree.iter().map(|(k, _)| *k).eq(1..=20));
    /// assert!(tree.iter().rev().map(|(k, _)| *k).eq((1..=20).rev()));
    /// ```
    pub fn iter(&self) -> Iter<'_, K, V> {
        let last_leaf = self.raw.last_leaf();
        Iter {
            tree: &self.raw,
            front_leaf: self.raw.first_leaf(),
            front_index: 0,
            back_leaf: last_leaf,
            back_index: last_leaf.map_or(0, |leaf| self.raw.leaf_len(leaf) - 1),
            remaining: self.raw.len(),
        }
    }

    /// Gets a mutable iterator over the entries of the tree, in key order.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4);
    /// for key in 0..10 {
    ///     tree.insert(key, key).unwrap();
    /// }
    /// for (_, value) in tree.iter_mut() {
    ///     *value *= 2;
    /// }
    /// assert_eq!(tree.search(&7), Some(&14));
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let last_leaf = self.raw.last_leaf();
        let back_index = last_leaf.map_or(0, |leaf| self.raw.leaf_len(leaf) - 1);
        IterMut {
            front_leaf: self.raw.first_leaf(),
            front_index: 0,
            back_leaf: last_leaf,
            back_index,
            remaining: self.raw.len(),
            tree: &raw mut self.raw,
            _marker: PhantomData,
        }
    }

    /// Gets an iterator over the keys of the tree, in order.
    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    /// Gets an iterator over the values of the tree, in key order.
    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    /// Gets a mutable iterator over the values of the tree, in key order.
    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    /// Returns a cursor at the first entry, or at the end position if the tree is empty.
    pub fn cursor_first(&self) -> Cursor<'_, K, V> {
        Cursor::new(&self.raw, self.raw.first_leaf(), 0)
    }

    /// Returns a cursor at the last entry, or at the end position if the tree is empty.
    pub fn cursor_last(&self) -> Cursor<'_, K, V> {
        let leaf = self.raw.last_leaf();
        Cursor::new(&self.raw, leaf, leaf.map_or(0, |leaf| self.raw.leaf_len(leaf) - 1))
    }

    /// Returns a cursor at the end position, one past the last entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4);
    /// tree.insert(1, "a").unwrap();
    /// tree.insert(2, "b").unwrap();
    ///
    /// let mut cursor = tree.cursor_end();
    /// assert_eq!(cursor.key(), None);
    /// cursor.move_prev();
    /// assert_eq!(cursor.key_value(), Some((&2, &"b")));
    /// ```
    pub fn cursor_end(&self) -> Cursor<'_, K, V> {
        Cursor::new(&self.raw, None, 0)
    }

    /// Mutable counterpart of [`cursor_first`](Self::cursor_first).
    pub fn cursor_first_mut(&mut self) -> CursorMut<'_, K, V> {
        let leaf = self.raw.first_leaf();
        CursorMut::new(&mut self.raw, leaf, 0)
    }

    /// Mutable counterpart of [`cursor_last`](Self::cursor_last).
    pub fn cursor_last_mut(&mut self) -> CursorMut<'_, K, V> {
        let leaf = self.raw.last_leaf();
        let index = leaf.map_or(0, |leaf| self.raw.leaf_len(leaf) - 1);
        CursorMut::new(&mut self.raw, leaf, index)
    }

    /// Mutable counterpart of [`cursor_end`](Self::cursor_end).
    pub fn cursor_end_mut(&mut self) -> CursorMut<'_, K, V> {
        CursorMut::new(&mut self.raw, None, 0)
    }

    /// Returns a reverse cursor at the last entry: its [`move_next`](Reversed::move_next)
    /// walks towards smaller keys.
    pub fn rev_cursor(&self) -> Reversed<Cursor<'_, K, V>> {
        Reversed::new(self.cursor_last())
    }

    /// Returns a reverse cursor at the end position, one before the first entry.
    pub fn rev_cursor_end(&self) -> Reversed<Cursor<'_, K, V>> {
        Reversed::new(self.cursor_end())
    }

    /// Mutable counterpart of [`rev_cursor`](Self::rev_cursor).
    pub fn rev_cursor_mut(&mut self) -> Reversed<CursorMut<'_, K, V>> {
        Reversed::new(self.cursor_last_mut())
    }

    /// Mutable counterpart of [`rev_cursor_end`](Self::rev_cursor_end).
    pub fn rev_cursor_end_mut(&mut self) -> Reversed<CursorMut<'_, K, V>> {
        Reversed::new(self.cursor_end_mut())
    }
}

impl<K: Ord, V> BPlusTree<K, V> {
    /// Checks every structural invariant of the tree.
    ///
    /// Occupancy bounds, key order, separator bounds, uniform leaf depth,
    /// parent links, the leaf chain and the cached length are all verified.
    /// This walks the whole tree; it is meant for tests and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn check_invariants(&self) -> core::result::Result<(), InvariantViolation> {
        self.raw.check_invariants()
    }

    /// Returns `true` if every structural invariant holds.
    ///
    /// A violation is logged at `warn` level before `false` is returned.
    #[must_use]
    pub fn validate(&self) -> bool {
        match self.raw.check_invariants() {
            Ok(()) => true,
            Err(violation) => {
                warn!(%violation, "B+ tree invariant violated");
                false
            }
        }
    }
}

impl<K: Clone + Ord, V> BPlusTree<K, V> {
    /// Returns a reference to the value stored under `key`.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(8);
    /// tree.insert(String::from("alpha"), 1).unwrap();
    /// assert_eq!(tree.search("alpha"), Some(&1));
    /// assert_eq!(tree.search("beta"), None);
    /// ```
    pub fn search<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get(key)
    }

    /// Returns a mutable reference to the value stored under `key`.
    pub fn search_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get_mut(key)
    }

    /// Returns the stored key and value for `key`.
    pub fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.get_key_value(key)
    }

    /// Returns `true` if the tree holds an entry for `key`.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.search(key).is_some()
    }

    /// Inserts an entry, replacing the value of an existing equal key.
    ///
    /// Returns the replaced value, or `None` if the key is new. Replacing a
    /// value never changes the shape of the tree.
    ///
    /// # Errors
    ///
    /// Fails when the split cascade this insert needs would exceed the node
    /// limit or the allocator refuses to grow the tree. The tree is then
    /// exactly as it was before the call.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(4);
    /// assert_eq!(tree.insert(37, "a")?, None);
    /// assert_eq!(tree.insert(37, "b")?, Some("a"));
    /// assert_eq!(tree[&37], "b");
    /// # Ok::<(), leafline::Error>(())
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        self.raw.insert(key, value)
    }

    /// Removes `key`, returning its value if it was present.
    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove_entry(key).map(|(_, value)| value)
    }

    /// Removes `key`, returning the stored key and value if it was present.
    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.raw.remove_entry(key)
    }

    /// Replaces the whole contents of the tree with `entries`.
    ///
    /// Entries need not be sorted. When a key appears more than once the
    /// last occurrence wins, exactly as if the entries had been inserted one
    /// by one in order. The tree is built bottom-up from sorted runs rather
    /// than by repeated descent, so loading is linear after the sort.
    ///
    /// # Errors
    ///
    /// Fails when the new tree would exceed the node limit or the allocator
    /// refuses to grow; the previous contents are then still in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let data: Vec<(u32, u32)> = (0..50).map(|k| (k, k)).collect();
    ///
    /// let mut tree = BPlusTree::new(4);
    /// tree.bulk_load(data[10..30].iter().copied())?;
    /// assert_eq!(tree.len(), 20);
    /// assert!(!tree.contains_key(&9));
    /// assert!(tree.contains_key(&10));
    /// assert!(!tree.contains_key(&30));
    ///
    /// let mut names = BPlusTree::new(4);
    /// names.bulk_load([(1, "first1"), (1, "second1"), (3, "a"), (3, "c")])?;
    /// assert_eq!(names.search(&1), Some(&"second1"));
    /// assert_eq!(names.search(&3), Some(&"c"));
    /// # Ok::<(), leafline::Error>(())
    /// ```
    pub fn bulk_load<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        self.raw.bulk_load(entries)
    }

    /// Gets an iterator over the entries with `start <= key <= end`, in key order.
    ///
    /// An inverted range (`start > end`) yields nothing.
    ///
    /// # Examples
    ///
    /// ```
    /// use leafline::BPlusTree;
    ///
    /// let mut tree = BPlusTree::new(3);
    /// for key in (0..100).step_by(10) {
    ///     tree.insert(key, ()).unwrap();
    /// }
    /// let keys: Vec<_> = tree.range(&15, &50).map(|(k, _)| *k).collect();
    /// assert_eq!(keys, [20, 30, 40, 50]);
    /// assert_eq!(tree.range(&50, &15).count(), 0);
    /// ```
    pub fn range<Q>(&self, start: &Q, end: &Q) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let bounds = if start > end {
            None
        } else {
            self.raw
                .lower_bound(start)
                .filter(|&(leaf, index)| self.raw.entry(leaf, index).0.borrow().cmp(end).is_le())
                .and_then(|front| Some((front, self.last_at_or_before(end)?)))
        };
        Range { tree: &self.raw, bounds }
    }

    /// Collects the entries with `start <= key <= end`, in key order.
    pub fn range_query<Q>(&self, start: &Q, end: &Q) -> Vec<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.range(start, end).collect()
    }

    /// Returns a cursor at the first entry whose key is `>= key`, or at the
    /// end position if there is none.
    pub fn lower_bound<Q>(&self, key: &Q) -> Cursor<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.raw.lower_bound(key) {
            Some((leaf, index)) => Cursor::new(&self.raw, Some(leaf), index),
            None => self.cursor_end(),
        }
    }

    /// Mutable counterpart of [`lower_bound`](Self::lower_bound).
    pub fn lower_bound_mut<Q>(&mut self, key: &Q) -> CursorMut<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.raw.lower_bound(key) {
            Some((leaf, index)) => CursorMut::new(&mut self.raw, Some(leaf), index),
            None => self.cursor_end_mut(),
        }
    }

    /// Position of the last entry whose key is `<= key`.
    fn last_at_or_before<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf = self.raw.find_leaf(key)?;
        let after = self.raw.node(leaf).keys().partition_point(|k| k.borrow().cmp(key).is_le());
        match after.checked_sub(1) {
            Some(index) => Some((leaf, index)),
            None => {
                let prev = self.raw.prev_leaf(leaf)?;
                Some((prev, self.raw.leaf_len(prev) - 1))
            }
        }
    }
}

impl<K, V> Default for BPlusTree<K, V> {
    /// Creates an empty tree of order [`DEFAULT_ORDER`](crate::DEFAULT_ORDER).
    fn default() -> Self {
        BPlusTree::with_config(Config::default())
    }
}

impl<K: Clone, V: Clone> Clone for BPlusTree<K, V> {
    /// Deep-copies every node and value. The copy has the same shape as `self`.
    fn clone(&self) -> Self {
        BPlusTree { raw: self.raw.clone() }
    }
}

impl<K: PartialEq, V: PartialEq> PartialEq for BPlusTree<K, V> {
    /// Trees are equal when they hold the same entries, whatever their order or shape.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}

impl<K: Eq, V: Eq> Eq for BPlusTree<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for BPlusTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, Q, V> Index<&Q> for BPlusTree<K, V>
where
    K: Borrow<Q> + Ord + Clone,
    Q: ?Sized + Ord,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if the key is not present.
    fn index(&self, key: &Q) -> &V {
        self.search(key).expect("no entry found for key")
    }
}

impl<'a, K, V> IntoIterator for &'a BPlusTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V> IntoIterator for &'a mut BPlusTree<K, V> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V> IntoIterator for BPlusTree<K, V> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    /// Gets an owning iterator over the entries of the tree, in key order.
    fn into_iter(mut self) -> IntoIter<K, V> {
        IntoIter {
            inner: self.raw.drain_to_vec().into_iter(),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let leaf = self.front_leaf?;
        let entry = self.tree.entry(leaf, self.front_index);

        self.remaining -= 1;
        self.front_index += 1;
        if self.front_index >= self.tree.leaf_len(leaf) {
            self.front_leaf = self.tree.next_leaf(leaf);
            self.front_index = 0;
        }

        Some(entry)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for Iter<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let leaf = self.back_leaf?;
        let entry = self.tree.entry(leaf, self.back_index);

        self.remaining -= 1;
        if self.back_index == 0 {
            self.back_leaf = self.tree.prev_leaf(leaf);
            if let Some(prev) = self.back_leaf {
                self.back_index = self.tree.leaf_len(prev) - 1;
            }
        } else {
            self.back_index -= 1;
        }

        Some(entry)
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            tree: self.tree,
            front_leaf: self.front_leaf,
            front_index: self.front_index,
            back_leaf: self.back_leaf,
            back_index: self.back_index,
            remaining: self.remaining,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Iter<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let leaf_handle = self.front_leaf?;

        // SAFETY: The iterator holds the tree's unique borrow for 'a and never
        // yields the same entry twice. Keys are read from the nodes arena and
        // values written through the values arena, so the two never alias.
        unsafe {
            let leaf = RawBPlusTree::node_ptr(self.tree, leaf_handle).as_leaf();
            let key = leaf.key(self.front_index);
            let value = RawBPlusTree::value_mut_ptr(self.tree, leaf.value(self.front_index));

            self.remaining -= 1;
            self.front_index += 1;
            if self.front_index >= leaf.key_count() {
                self.front_leaf = leaf.next();
                self.front_index = 0;
            }

            Some((key, value))
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> DoubleEndedIterator for IterMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }

        let leaf_handle = self.back_leaf?;

        // SAFETY: Same as in next().
        unsafe {
            let leaf = RawBPlusTree::node_ptr(self.tree, leaf_handle).as_leaf();
            let key = leaf.key(self.back_index);
            let value = RawBPlusTree::value_mut_ptr(self.tree, leaf.value(self.back_index));

            self.remaining -= 1;
            if self.back_index == 0 {
                self.back_leaf = leaf.prev();
                if let Some(prev) = self.back_leaf {
                    self.back_index = RawBPlusTree::node_ptr(self.tree, prev).key_count() - 1;
                }
            } else {
                self.back_index -= 1;
            }

            Some((key, value))
        }
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {
    fn len(&self) -> usize {
        self.remaining
    }
}

impl<K, V> FusedIterator for IterMut<'_, K, V> {}

impl<K, V> fmt::Debug for IterMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IterMut").field("remaining", &self.remaining).finish()
    }
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for IntoIter<K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back()
    }
}

impl<K, V> ExactSizeIterator for IntoIter<K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for IntoIter<K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for IntoIter<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.as_slice()).finish()
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Keys<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(k, _)| k)
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Keys<'_, K, V> {}

impl<K, V> Clone for Keys<'_, K, V> {
    fn clone(&self) -> Self {
        Keys {
            inner: self.inner.clone(),
        }
    }
}

impl<K: fmt::Debug, V> fmt::Debug for Keys<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for Values<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for Values<'_, K, V> {}

impl<K, V> Clone for Values<'_, K, V> {
    fn clone(&self) -> Self {
        Values {
            inner: self.inner.clone(),
        }
    }
}

impl<K, V: fmt::Debug> fmt::Debug for Values<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> DoubleEndedIterator for ValuesMut<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(|(_, v)| v)
    }
}

impl<K, V> ExactSizeIterator for ValuesMut<'_, K, V> {
    fn len(&self) -> usize {
        self.inner.len()
    }
}

impl<K, V> FusedIterator for ValuesMut<'_, K, V> {}

impl<K, V> fmt::Debug for ValuesMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValuesMut").field("remaining", &self.inner.len()).finish()
    }
}

impl<'a, K, V> Iterator for Range<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let ((leaf, index), back) = self.bounds?;
        let entry = self.tree.entry(leaf, index);

        self.bounds = if (leaf, index) == back {
            None
        } else if index + 1 < self.tree.leaf_len(leaf) {
            Some(((leaf, index + 1), back))
        } else {
            // Not yet at `back`, so a next leaf exists.
            self.tree.next_leaf(leaf).map(|next| ((next, 0), back))
        };

        Some(entry)
    }
}

impl<K, V> DoubleEndedIterator for Range<'_, K, V> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let (front, (leaf, index)) = self.bounds?;
        let entry = self.tree.entry(leaf, index);

        self.bounds = if front == (leaf, index) {
            None
        } else if let Some(prev_index) = index.checked_sub(1) {
            Some((front, (leaf, prev_index)))
        } else {
            self.tree
                .prev_leaf(leaf)
                .map(|prev| (front, (prev, self.tree.leaf_len(prev) - 1)))
        };

        Some(entry)
    }
}

impl<K, V> FusedIterator for Range<'_, K, V> {}

impl<K, V> Clone for Range<'_, K, V> {
    fn clone(&self) -> Self {
        Range {
            tree: self.tree,
            bounds: self.bounds,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Range<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.clone()).finish()
    }
}
