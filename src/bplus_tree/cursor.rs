use core::fmt;
use core::ops::{Deref, DerefMut};

use crate::raw::{Handle, RawBPlusTree};

/// A cursor's place in the leaf chain: a leaf and an index within it, or the end position.
///
/// Positions compare equal exactly when they name the same slot, and all
/// end positions are equal. They are only meaningful for the tree they came
/// from, and only until that tree is next modified.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CursorPosition {
    leaf: Option<Handle>,
    index: usize,
}

impl CursorPosition {
    const END: Self = CursorPosition { leaf: None, index: 0 };

    /// Returns `true` for the end position, which holds no entry.
    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.leaf.is_none()
    }

    fn last<K, V>(tree: &RawBPlusTree<K, V>) -> Self {
        match tree.last_leaf() {
            Some(leaf) => CursorPosition {
                leaf: Some(leaf),
                index: tree.leaf_len(leaf) - 1,
            },
            None => Self::END,
        }
    }

    // From the end position, stepping forward wraps to the first entry.
    fn next<K, V>(self, tree: &RawBPlusTree<K, V>) -> Self {
        match self.leaf {
            None => CursorPosition {
                leaf: tree.first_leaf(),
                index: 0,
            },
            Some(leaf) if self.index + 1 < tree.leaf_len(leaf) => CursorPosition {
                leaf: Some(leaf),
                index: self.index + 1,
            },
            Some(leaf) => CursorPosition {
                leaf: tree.next_leaf(leaf),
                index: 0,
            },
        }
    }

    // From the end position, stepping backward wraps to the last entry.
    fn prev<K, V>(self, tree: &RawBPlusTree<K, V>) -> Self {
        match self.leaf {
            None => Self::last(tree),
            Some(leaf) if self.index > 0 => CursorPosition {
                leaf: Some(leaf),
                index: self.index - 1,
            },
            Some(leaf) => match tree.prev_leaf(leaf) {
                Some(prev) => CursorPosition {
                    leaf: Some(prev),
                    index: tree.leaf_len(prev) - 1,
                },
                None => Self::END,
            },
        }
    }
}

/// Movement and access shared by every cursor kind, so code can be written
/// once for forward and [`Reversed`] cursors alike.
pub trait BidirectionalCursor {
    type Key;
    type Value;

    /// Steps one entry forward, from the end position to the first entry.
    fn move_next(&mut self);

    /// Steps one entry backward, from the end position to the last entry.
    fn move_prev(&mut self);

    /// The entry under the cursor, or `None` at the end position.
    fn key_value(&self) -> Option<(&Self::Key, &Self::Value)>;

    fn position(&self) -> CursorPosition;

    fn key(&self) -> Option<&Self::Key> {
        self.key_value().map(|(key, _)| key)
    }

    fn value(&self) -> Option<&Self::Value> {
        self.key_value().map(|(_, value)| value)
    }

    fn is_end(&self) -> bool {
        self.position().is_end()
    }
}

/// A read-only cursor over the entries of a [`BPlusTree`](crate::BPlusTree).
///
/// A cursor rests either on an entry or on the end position, which sits
/// between the last entry and the first. Moving past either end lands on the
/// end position; moving again wraps around.
///
/// # Examples
///
/// ```
/// use leafline::BPlusTree;
///
/// let mut tree = BPlusTree::new(3);
/// for key in 1..=5 {
///     tree.insert(key, key * 10).unwrap();
/// }
///
/// let mut cursor = tree.lower_bound(&4);
/// assert_eq!(cursor.key_value(), Some((&4, &40)));
/// cursor.move_next();
/// cursor.move_next();
/// assert!(cursor.is_end());
/// assert_eq!(tree.cursor_first().distance_to(&cursor), Some(5));
/// ```
pub struct Cursor<'a, K, V> {
    tree: &'a RawBPlusTree<K, V>,
    position: CursorPosition,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(crate) fn new(tree: &'a RawBPlusTree<K, V>, leaf: Option<Handle>, index: usize) -> Self {
        Cursor {
            tree,
            position: CursorPosition { leaf, index },
        }
    }

    /// The entry under the cursor, or `None` at the end position.
    #[must_use]
    pub fn key_value(&self) -> Option<(&'a K, &'a V)> {
        let leaf = self.position.leaf?;
        Some(self.tree.entry(leaf, self.position.index))
    }

    #[must_use]
    pub fn key(&self) -> Option<&'a K> {
        self.key_value().map(|(key, _)| key)
    }

    #[must_use]
    pub fn value(&self) -> Option<&'a V> {
        self.key_value().map(|(_, value)| value)
    }

    pub fn move_next(&mut self) {
        self.position = self.position.next(self.tree);
    }

    pub fn move_prev(&mut self) {
        self.position = self.position.prev(self.tree);
    }

    #[must_use]
    pub const fn position(&self) -> CursorPosition {
        self.position
    }

    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.position.is_end()
    }

    /// Counts the forward steps from `self` to `other`, walking the leaf chain.
    ///
    /// Returns `None` when `other` is not reached before the end position,
    /// i.e. when it lies behind `self`.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> Option<usize> {
        let mut position = self.position;
        let mut steps = 0;
        loop {
            if position == other.position {
                return Some(steps);
            }
            if position.is_end() {
                return None;
            }
            position = position.next(self.tree);
            steps += 1;
        }
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.position == other.position
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Cursor").field(&self.key_value()).finish()
    }
}

impl<K, V> BidirectionalCursor for Cursor<'_, K, V> {
    type Key = K;
    type Value = V;

    fn move_next(&mut self) {
        Cursor::move_next(self);
    }

    fn move_prev(&mut self) {
        Cursor::move_prev(self);
    }

    fn key_value(&self) -> Option<(&K, &V)> {
        Cursor::key_value(self)
    }

    fn position(&self) -> CursorPosition {
        self.position
    }
}

/// A cursor that can update the value under it.
///
/// Keys are never handed out mutably: changing a key in place would break
/// the tree's ordering.
///
/// # Examples
///
/// ```
/// use leafline::BPlusTree;
///
/// let mut tree = BPlusTree::new(4);
/// for key in 0..10 {
///     tree.insert(key, 0).unwrap();
/// }
///
/// let mut cursor = tree.lower_bound_mut(&7);
/// while let Some(value) = cursor.value_mut() {
///     *value = 1;
///     cursor.move_next();
/// }
/// assert_eq!(tree.values().sum::<i32>(), 3);
/// ```
pub struct CursorMut<'a, K, V> {
    tree: &'a mut RawBPlusTree<K, V>,
    position: CursorPosition,
}

impl<'a, K, V> CursorMut<'a, K, V> {
    pub(crate) fn new(tree: &'a mut RawBPlusTree<K, V>, leaf: Option<Handle>, index: usize) -> Self {
        CursorMut {
            tree,
            position: CursorPosition { leaf, index },
        }
    }

    #[must_use]
    pub fn key_value(&self) -> Option<(&K, &V)> {
        let leaf = self.position.leaf?;
        Some(self.tree.entry(leaf, self.position.index))
    }

    /// The entry under the cursor with its value borrowed mutably.
    pub fn key_value_mut(&mut self) -> Option<(&K, &mut V)> {
        let leaf = self.position.leaf?;
        Some(self.tree.entry_mut(leaf, self.position.index))
    }

    #[must_use]
    pub fn key(&self) -> Option<&K> {
        self.key_value().map(|(key, _)| key)
    }

    #[must_use]
    pub fn value(&self) -> Option<&V> {
        self.key_value().map(|(_, value)| value)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.key_value_mut().map(|(_, value)| value)
    }

    pub fn move_next(&mut self) {
        self.position = self.position.next(self.tree);
    }

    pub fn move_prev(&mut self) {
        self.position = self.position.prev(self.tree);
    }

    #[must_use]
    pub const fn position(&self) -> CursorPosition {
        self.position
    }

    #[must_use]
    pub const fn is_end(&self) -> bool {
        self.position.is_end()
    }

    /// A read-only cursor at the same position, borrowing from this one.
    #[must_use]
    pub fn as_cursor(&self) -> Cursor<'_, K, V> {
        Cursor {
            tree: self.tree,
            position: self.position,
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for CursorMut<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorMut").field(&self.key_value()).finish()
    }
}

impl<K, V> BidirectionalCursor for CursorMut<'_, K, V> {
    type Key = K;
    type Value = V;

    fn move_next(&mut self) {
        CursorMut::move_next(self);
    }

    fn move_prev(&mut self) {
        CursorMut::move_prev(self);
    }

    fn key_value(&self) -> Option<(&K, &V)> {
        CursorMut::key_value(self)
    }

    fn position(&self) -> CursorPosition {
        self.position
    }
}

/// Runs a cursor backwards: `move_next` goes to smaller keys.
///
/// The end position of a reversed cursor is the same slot as the inner
/// cursor's, so it sits one before the first entry in reversed order.
/// Everything else, such as [`CursorMut::value_mut`], is reached through `Deref`.
///
/// # Examples
///
/// ```
/// use leafline::BPlusTree;
///
/// let mut tree = BPlusTree::new(3);
/// for key in 1..=4 {
///     tree.insert(key, ()).unwrap();
/// }
///
/// let mut cursor = tree.rev_cursor();
/// let mut keys = Vec::new();
/// while let Some(key) = cursor.key() {
///     keys.push(*key);
///     cursor.move_next();
/// }
/// assert_eq!(keys, [4, 3, 2, 1]);
/// assert_eq!(cursor, tree.rev_cursor_end());
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Reversed<C> {
    inner: C,
}

impl<C> Reversed<C> {
    pub const fn new(inner: C) -> Self {
        Reversed { inner }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: BidirectionalCursor> Reversed<C> {
    pub fn move_next(&mut self) {
        self.inner.move_prev();
    }

    pub fn move_prev(&mut self) {
        self.inner.move_next();
    }
}

impl<C: BidirectionalCursor> BidirectionalCursor for Reversed<C> {
    type Key = C::Key;
    type Value = C::Value;

    fn move_next(&mut self) {
        self.inner.move_prev();
    }

    fn move_prev(&mut self) {
        self.inner.move_next();
    }

    fn key_value(&self) -> Option<(&C::Key, &C::Value)> {
        self.inner.key_value()
    }

    fn position(&self) -> CursorPosition {
        self.inner.position()
    }
}

impl<C> Deref for Reversed<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.inner
    }
}

impl<C> DerefMut for Reversed<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.inner
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use crate::BPlusTree;
    use alloc::vec::Vec;

    use super::*;

    fn tree_of(keys: impl IntoIterator<Item = u32>) -> BPlusTree<u32, u32> {
        let mut tree = BPlusTree::new(3);
        for key in keys {
            tree.insert(key, key).unwrap();
        }
        tree
    }

    #[test]
    fn end_position_wraps_both_ways() {
        let tree = tree_of(1..=20);
        let mut cursor = tree.cursor_end();
        cursor.move_next();
        assert_eq!(cursor.key(), Some(&1));
        cursor.move_prev();
        assert!(cursor.is_end());
        cursor.move_prev();
        assert_eq!(cursor.key(), Some(&20));
        cursor.move_next();
        assert_eq!(cursor, tree.cursor_end());
    }

    #[test]
    fn walks_across_leaves() {
        let tree = tree_of(1..=20);
        let mut cursor = tree.cursor_first();
        let mut forward = Vec::new();
        while let Some(key) = cursor.key() {
            forward.push(*key);
            cursor.move_next();
        }
        assert_eq!(forward, (1..=20).collect::<Vec<_>>());

        let mut cursor = tree.cursor_last();
        let mut backward = Vec::new();
        while let Some(key) = cursor.key() {
            backward.push(*key);
            cursor.move_prev();
        }
        assert_eq!(backward, (1..=20).rev().collect::<Vec<_>>());
    }

    #[test]
    fn empty_tree_cursors_are_at_end() {
        let mut tree: BPlusTree<u32, u32> = BPlusTree::new(3);
        assert!(tree.cursor_first().is_end());
        assert!(tree.cursor_last().is_end());
        assert_eq!(tree.lower_bound(&1).position(), tree.cursor_end().position());

        let mut cursor = tree.cursor_first_mut();
        cursor.move_next();
        assert!(cursor.is_end());
        assert_eq!(cursor.value_mut(), None);
    }

    #[test]
    fn distance_is_linear_walk() {
        let tree = tree_of(0..30);
        let first = tree.cursor_first();
        let tenth = tree.lower_bound(&10);
        assert_eq!(first.distance_to(&tenth), Some(10));
        assert_eq!(tenth.distance_to(&first), None);
        assert_eq!(first.distance_to(&tree.cursor_end()), Some(30));
        assert_eq!(tenth.distance_to(&tenth), Some(0));
    }

    #[test]
    fn reversed_cursor_mirrors_forward() {
        let mut tree = tree_of([5, 1, 3]);
        let mut reversed = tree.rev_cursor();
        assert_eq!(reversed.key(), Some(&5));
        reversed.move_next();
        assert_eq!(reversed.key(), Some(&3));
        reversed.move_prev();
        assert_eq!(reversed.key(), Some(&5));
        reversed.move_prev();
        assert!(reversed.is_end());

        let mut reversed = tree.rev_cursor_mut();
        reversed.move_next();
        if let Some(value) = reversed.value_mut() {
            *value = 33;
        }
        assert_eq!(tree.search(&3), Some(&33));

        let mut reversed = tree.rev_cursor_end_mut();
        BidirectionalCursor::move_next(&mut reversed);
        assert_eq!(BidirectionalCursor::key(&reversed), Some(&5));
    }

    #[test]
    fn generic_over_cursor_kind() {
        fn collect<C: BidirectionalCursor<Key = u32>>(mut cursor: C) -> Vec<u32> {
            let mut keys = Vec::new();
            while let Some(key) = cursor.key() {
                keys.push(*key);
                cursor.move_next();
            }
            keys
        }

        let mut tree = tree_of(0..6);
        assert_eq!(collect(tree.cursor_first()), [0, 1, 2, 3, 4, 5]);
        assert_eq!(collect(tree.rev_cursor()), [5, 4, 3, 2, 1, 0]);
        assert_eq!(collect(tree.lower_bound_mut(&4)), [4, 5]);
    }

    #[test]
    fn as_cursor_shares_position() {
        let mut tree = tree_of(0..10);
        let mut cursor = tree.lower_bound_mut(&3);
        cursor.move_next();
        let position = cursor.position();
        assert_eq!(cursor.as_cursor().key(), Some(&4));
        assert_eq!(cursor.as_cursor().position(), position);
    }
}
