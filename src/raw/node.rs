use core::borrow::Borrow;

use smallvec::SmallVec;

use super::handle::Handle;

// Nodes of small orders stay inline; larger orders spill to the heap.
// One spare slot absorbs the transient `max_keys + 1` state before a split.
const INLINE_KEYS: usize = 8;

pub(crate) type KeyVec<K> = SmallVec<[K; INLINE_KEYS]>;
pub(crate) type HandleVec = SmallVec<[Handle; INLINE_KEYS + 1]>;

#[allow(private_interfaces)]
pub(crate) enum Node<K> {
    Internal(InternalNode<K>),
    Leaf(LeafNode<K>),
}

// B+Tree: Internal nodes store separator keys and child handles.
pub(crate) struct InternalNode<K> {
    parent: Option<Handle>,
    // keys[i] is <= every key under children[i + 1] and > every key under children[i].
    keys: KeyVec<K>,
    children: HandleVec,
}

// B+Tree: Leaf nodes store keys, value handles and the sibling chain.
pub(crate) struct LeafNode<K> {
    parent: Option<Handle>,
    prev: Option<Handle>,
    next: Option<Handle>,
    keys: KeyVec<K>,
    values: HandleVec,
}

/// Result of searching for a key in a leaf.
pub(crate) enum SearchResult {
    /// Key was found at the given index.
    Found(usize),
    /// Key was not found; index is where it would be inserted.
    NotFound(usize),
}

impl<K> Node<K> {
    /// Returns true if this is a leaf node.
    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Returns the leaf node, panicking if this is not a leaf.
    pub(crate) fn as_leaf(&self) -> &LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the leaf node mutably, panicking if this is not a leaf.
    pub(crate) fn as_leaf_mut(&mut self) -> &mut LeafNode<K> {
        match self {
            Node::Leaf(leaf) => leaf,
            Node::Internal(_) => panic!("expected leaf node"),
        }
    }

    /// Returns the internal node, panicking if this is not internal.
    pub(crate) fn as_internal(&self) -> &InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    /// Returns the internal node mutably, panicking if this is not internal.
    pub(crate) fn as_internal_mut(&mut self) -> &mut InternalNode<K> {
        match self {
            Node::Internal(internal) => internal,
            Node::Leaf(_) => panic!("expected internal node"),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys().len()
    }

    pub(crate) fn keys(&self) -> &[K] {
        match self {
            Node::Internal(internal) => &internal.keys,
            Node::Leaf(leaf) => &leaf.keys,
        }
    }

    pub(crate) fn parent(&self) -> Option<Handle> {
        match self {
            Node::Internal(internal) => internal.parent,
            Node::Leaf(leaf) => leaf.parent,
        }
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Handle>) {
        match self {
            Node::Internal(internal) => internal.parent = parent,
            Node::Leaf(leaf) => leaf.parent = parent,
        }
    }
}

impl<K> InternalNode<K> {
    /// Creates an internal node whose only child is `first`.
    pub(crate) fn with_first_child(first: Handle) -> Self {
        let mut children = HandleVec::new();
        children.push(first);
        Self {
            parent: None,
            keys: KeyVec::new(),
            children,
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn child_count(&self) -> usize {
        self.children.len()
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn child(&self, index: usize) -> Handle {
        self.children[index]
    }

    pub(crate) fn children(&self) -> &[Handle] {
        &self.children
    }

    /// Returns the index of the child to descend into for `key`.
    ///
    /// This is the number of separators `<= key`, so a key equal to a
    /// separator routes right, matching how leaf splits promote separators.
    #[inline]
    pub(crate) fn search_child<Q>(&self, key: &Q) -> usize
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.keys.partition_point(|k| k.borrow().cmp(key).is_le())
    }

    /// Returns the slot holding `child`, if it is one of this node's children.
    pub(crate) fn position_of(&self, child: Handle) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Inserts `key` at `index` and `child` immediately to its right.
    pub(crate) fn insert_child(&mut self, index: usize, key: K, child: Handle) {
        self.keys.insert(index, key);
        self.children.insert(index + 1, child);
    }

    /// Removes the key at `index` and the child to its right.
    pub(crate) fn remove_child(&mut self, index: usize) -> (K, Handle) {
        let key = self.keys.remove(index);
        let child = self.children.remove(index + 1);
        (key, child)
    }

    /// Appends a separator and the child to its right.
    pub(crate) fn push_child(&mut self, key: K, child: Handle) {
        self.keys.push(key);
        self.children.push(child);
    }

    /// Prepends a child and the separator to its right.
    pub(crate) fn push_child_front(&mut self, child: Handle, key: K) {
        self.keys.insert(0, key);
        self.children.insert(0, child);
    }

    /// Replaces the separator at `index`, returning the old one.
    pub(crate) fn set_key(&mut self, index: usize, key: K) -> K {
        core::mem::replace(&mut self.keys[index], key)
    }

    /// Removes the last separator and the last child.
    pub(crate) fn pop_back_child(&mut self) -> (K, Handle) {
        let last = self.keys.len() - 1;
        (self.keys.remove(last), self.children.remove(last + 1))
    }

    /// Removes the first child and the separator to its right.
    pub(crate) fn pop_front_child(&mut self) -> (Handle, K) {
        (self.children.remove(0), self.keys.remove(0))
    }

    /// Splits an overfull node at `split_point`.
    ///
    /// The separator at `split_point` is returned for promotion; it stays in
    /// neither half. `self` keeps `split_point + 1` children.
    pub(crate) fn split(&mut self, split_point: usize) -> (K, InternalNode<K>) {
        let keys: KeyVec<K> = self.keys.drain(split_point + 1..).collect();
        let children: HandleVec = self.children.drain(split_point + 1..).collect();
        let separator = self.keys.remove(split_point);
        let right = InternalNode {
            parent: self.parent,
            keys,
            children,
        };
        (separator, right)
    }

    /// Absorbs a right sibling, pulling the parent's separator down between them.
    pub(crate) fn merge_with_right(&mut self, separator: K, mut right: InternalNode<K>) {
        self.keys.push(separator);
        self.keys.append(&mut right.keys);
        self.children.append(&mut right.children);
    }
}

impl<K> LeafNode<K> {
    pub(crate) fn new() -> Self {
        Self {
            parent: None,
            prev: None,
            next: None,
            keys: KeyVec::new(),
            values: HandleVec::new(),
        }
    }

    pub(crate) fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub(crate) fn value_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn prev(&self) -> Option<Handle> {
        self.prev
    }

    pub(crate) fn set_prev(&mut self, prev: Option<Handle>) {
        self.prev = prev;
    }

    pub(crate) fn next(&self) -> Option<Handle> {
        self.next
    }

    pub(crate) fn set_next(&mut self, next: Option<Handle>) {
        self.next = next;
    }

    #[inline]
    pub(crate) fn key(&self, index: usize) -> &K {
        &self.keys[index]
    }

    pub(crate) fn keys(&self) -> &[K] {
        &self.keys
    }

    #[inline]
    pub(crate) fn value(&self, index: usize) -> Handle {
        self.values[index]
    }

    #[inline]
    pub(crate) fn search<Q>(&self, key: &Q) -> SearchResult
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        match self.keys.binary_search_by(|k| k.borrow().cmp(key)) {
            Ok(idx) => SearchResult::Found(idx),
            Err(idx) => SearchResult::NotFound(idx),
        }
    }

    pub(crate) fn insert(&mut self, index: usize, key: K, value: Handle) {
        self.keys.insert(index, key);
        self.values.insert(index, value);
    }

    pub(crate) fn remove(&mut self, index: usize) -> (K, Handle) {
        let key = self.keys.remove(index);
        let value = self.values.remove(index);
        (key, value)
    }

    pub(crate) fn push(&mut self, key: K, value: Handle) {
        self.keys.push(key);
        self.values.push(value);
    }

    pub(crate) fn push_front(&mut self, key: K, value: Handle) {
        self.keys.insert(0, key);
        self.values.insert(0, value);
    }

    pub(crate) fn pop_back(&mut self) -> (K, Handle) {
        self.remove(self.keys.len() - 1)
    }

    pub(crate) fn pop_front(&mut self) -> (K, Handle) {
        self.remove(0)
    }

    /// Takes ownership of all keys and value handles, leaving the leaf empty.
    pub(crate) fn take_all(&mut self) -> (KeyVec<K>, HandleVec) {
        (core::mem::take(&mut self.keys), core::mem::take(&mut self.values))
    }

    /// Moves entries from `split_point` on into a new right-hand leaf.
    ///
    /// Chain links are left to the caller, which knows the new leaf's handle.
    pub(crate) fn split(&mut self, split_point: usize) -> LeafNode<K> {
        LeafNode {
            parent: self.parent,
            prev: None,
            next: None,
            keys: self.keys.drain(split_point..).collect(),
            values: self.values.drain(split_point..).collect(),
        }
    }

    /// Absorbs a right sibling, inheriting its forward link.
    pub(crate) fn merge_with_right(&mut self, mut right: LeafNode<K>) {
        self.keys.append(&mut right.keys);
        self.values.append(&mut right.values);
        self.next = right.next;
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn h(index: usize) -> Handle {
        Handle::from_index(index)
    }

    fn internal(keys: &[u32]) -> InternalNode<u32> {
        let mut node = InternalNode::with_first_child(h(0));
        for (i, &key) in keys.iter().enumerate() {
            node.push_child(key, h(i + 1));
        }
        node
    }

    #[test]
    fn search_child_routes_equal_keys_right() {
        let node = internal(&[10, 20, 30]);
        assert_eq!(node.search_child(&5), 0);
        assert_eq!(node.search_child(&10), 1);
        assert_eq!(node.search_child(&15), 1);
        assert_eq!(node.search_child(&30), 3);
        assert_eq!(node.search_child(&99), 3);
    }

    #[test]
    fn internal_split_promotes_middle_key() {
        let mut left = internal(&[10, 20, 30, 40]);
        let (separator, right) = left.split(2);
        assert_eq!(separator, 30);
        assert_eq!(left.keys(), &[10, 20]);
        assert_eq!(left.children(), &[h(0), h(1), h(2)]);
        assert_eq!(right.keys(), &[40]);
        assert_eq!(right.children(), &[h(3), h(4)]);
    }

    #[test]
    fn internal_merge_pulls_separator_down() {
        let mut left = internal(&[10]);
        let mut right = InternalNode::with_first_child(h(7));
        right.push_child(40, h(8));
        left.merge_with_right(30, right);
        assert_eq!(left.keys(), &[10, 30, 40]);
        assert_eq!(left.children(), &[h(0), h(1), h(7), h(8)]);
    }

    #[test]
    fn leaf_split_and_merge() {
        let mut leaf = LeafNode::new();
        for i in 0..5u32 {
            leaf.push(i, h(i as usize));
        }
        leaf.set_next(Some(h(100)));

        let right = leaf.split(2);
        assert_eq!(leaf.keys(), &[0, 1]);
        assert_eq!(right.keys(), &[2, 3, 4]);
        assert_eq!(right.key(0), &2);

        let mut right = right;
        right.set_next(Some(h(100)));
        leaf.merge_with_right(right);
        assert_eq!(leaf.keys().iter().copied().collect::<Vec<_>>(), [0, 1, 2, 3, 4]);
        assert_eq!(leaf.next(), Some(h(100)));
    }

    #[test]
    fn leaf_search() {
        let mut leaf = LeafNode::new();
        leaf.push(10u32, h(0));
        leaf.push(20, h(1));
        assert!(matches!(leaf.search(&20), SearchResult::Found(1)));
        assert!(matches!(leaf.search(&15), SearchResult::NotFound(1)));
        assert!(matches!(leaf.search(&25), SearchResult::NotFound(2)));
    }
}
