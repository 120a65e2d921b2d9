use core::borrow::Borrow;

use alloc::vec::Vec;
use tracing::{debug, trace};

use super::arena::Arena;
use super::handle::Handle;
use super::node::{HandleVec, InternalNode, LeafNode, Node, SearchResult};
use crate::config::Config;
use crate::error::Result;

/// The core B+Tree implementation backing `BPlusTree`.
pub(crate) struct RawBPlusTree<K, V> {
    /// Order and derived occupancy bounds.
    pub(super) config: Config,
    /// Arena owning every tree node. Parent and sibling links are handles into it.
    pub(super) nodes: Arena<Node<K>>,
    /// Arena storing all values (separate from nodes so keys and values never alias).
    pub(super) values: Arena<V>,
    /// Handle to the root node, if the tree is non-empty.
    pub(super) root: Option<Handle>,
    /// Total number of key-value pairs in the tree.
    pub(super) len: usize,
    /// Handle to the first (leftmost) leaf, for forward iteration.
    pub(super) first_leaf: Option<Handle>,
    /// Handle to the last (rightmost) leaf, for backward iteration.
    pub(super) last_leaf: Option<Handle>,
}

impl<K, V> RawBPlusTree<K, V> {
    /// Creates a new, empty tree.
    pub(crate) const fn new(config: Config) -> Self {
        Self {
            config,
            nodes: Arena::new(config.node_limit()),
            values: Arena::new(None),
            root: None,
            len: 0,
            first_leaf: None,
            last_leaf: None,
        }
    }

    pub(crate) const fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the number of key-value pairs in the tree.
    pub(crate) const fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the tree contains no elements.
    pub(crate) const fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Returns the number of live nodes.
    pub(crate) const fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Destroys every node and value.
    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.values.clear();
        self.root = None;
        self.len = 0;
        self.first_leaf = None;
        self.last_leaf = None;
    }

    /// Number of levels from the root down to the leaves; 0 for an empty tree.
    pub(crate) fn height(&self) -> usize {
        let mut height = 0;
        let mut current = self.root;
        while let Some(handle) = current {
            height += 1;
            current = match self.nodes.get(handle) {
                Node::Internal(internal) => Some(internal.child(0)),
                Node::Leaf(_) => None,
            };
        }
        height
    }

    /// Drains all key-value pairs by walking the leaf chain, leaving the tree empty.
    pub(crate) fn drain_to_vec(&mut self) -> Vec<(K, V)> {
        let mut result = Vec::with_capacity(self.len);
        let mut current_leaf = self.first_leaf;

        while let Some(leaf_handle) = current_leaf {
            let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
            let next = leaf.next();
            let (keys, value_handles) = leaf.take_all();

            for (key, vh) in keys.into_iter().zip(value_handles) {
                result.push((key, self.values.take(vh)));
            }

            current_leaf = next;
        }

        self.clear();
        result
    }

    pub(crate) fn first_leaf(&self) -> Option<Handle> {
        self.first_leaf
    }

    pub(crate) fn last_leaf(&self) -> Option<Handle> {
        self.last_leaf
    }

    /// Returns a reference to a node by handle.
    pub(crate) fn node(&self, handle: Handle) -> &Node<K> {
        self.nodes.get(handle)
    }

    /// Returns a reference to a node by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `RawBPlusTree<K, V>`.
    pub(crate) unsafe fn node_ptr<'a>(ptr: *const Self, handle: Handle) -> &'a Node<K> {
        // SAFETY: Only the `nodes` field is reached, through addr_of, so no reference to
        // the `values` field is created.
        unsafe { Arena::get_ptr(core::ptr::addr_of!((*ptr).nodes), handle) }
    }

    /// Returns a mutable reference to a value by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `RawBPlusTree<K, V>`.
    /// - The caller must ensure no other mutable references to the values arena exist.
    /// - The caller must have logical exclusive access to the value at `handle`.
    pub(crate) unsafe fn value_mut_ptr<'a>(ptr: *mut Self, handle: Handle) -> &'a mut V {
        // SAFETY: Only the `values` field is reached, so keys borrowed from `nodes` stay valid.
        unsafe { (*core::ptr::addr_of_mut!((*ptr).values)).get_mut(handle) }
    }

    /// Returns the entry at `index` of `leaf`.
    pub(crate) fn entry(&self, leaf: Handle, index: usize) -> (&K, &V) {
        let leaf = self.nodes.get(leaf).as_leaf();
        (leaf.key(index), self.values.get(leaf.value(index)))
    }

    /// Returns the entry at `index` of `leaf` with its value borrowed mutably.
    pub(crate) fn entry_mut(&mut self, leaf: Handle, index: usize) -> (&K, &mut V) {
        let leaf = self.nodes.get(leaf).as_leaf();
        (leaf.key(index), self.values.get_mut(leaf.value(index)))
    }

    /// Number of entries stored in `leaf`.
    pub(crate) fn leaf_len(&self, leaf: Handle) -> usize {
        self.nodes.get(leaf).as_leaf().key_count()
    }

    /// The leaf after `leaf` in the chain.
    pub(crate) fn next_leaf(&self, leaf: Handle) -> Option<Handle> {
        self.nodes.get(leaf).as_leaf().next()
    }

    /// The leaf before `leaf` in the chain.
    pub(crate) fn prev_leaf(&self, leaf: Handle) -> Option<Handle> {
        self.nodes.get(leaf).as_leaf().prev()
    }
}

impl<K: Clone + Ord, V> RawBPlusTree<K, V> {
    /// Walks from the root to the unique leaf whose key range covers `key`.
    pub(crate) fn find_leaf<Q>(&self, key: &Q) -> Option<Handle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root?;
        loop {
            match self.nodes.get(current) {
                Node::Internal(internal) => current = internal.child(internal.search_child(key)),
                Node::Leaf(_) => return Some(current),
            }
        }
    }

    /// Searches for a key and returns the leaf handle and index if found.
    pub(crate) fn search<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        match self.nodes.get(leaf_handle).as_leaf().search(key) {
            SearchResult::Found(idx) => Some((leaf_handle, idx)),
            SearchResult::NotFound(_) => None,
        }
    }

    /// Returns a reference to the value corresponding to the key.
    pub(crate) fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf, idx) = self.search(key)?;
        Some(self.entry(leaf, idx).1)
    }

    /// Returns a mutable reference to the value corresponding to the key.
    pub(crate) fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf, idx) = self.search(key)?;
        Some(self.entry_mut(leaf, idx).1)
    }

    /// Returns the key-value pair corresponding to the key.
    pub(crate) fn get_key_value<Q>(&self, key: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let (leaf, idx) = self.search(key)?;
        Some(self.entry(leaf, idx))
    }

    /// Finds the first position whose key is `>= key`.
    pub(crate) fn lower_bound<Q>(&self, key: &Q) -> Option<(Handle, usize)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        let leaf = self.nodes.get(leaf_handle).as_leaf();
        match leaf.search(key) {
            SearchResult::Found(idx) => Some((leaf_handle, idx)),
            SearchResult::NotFound(idx) if idx < leaf.key_count() => Some((leaf_handle, idx)),
            // Every key here is smaller; leaves are never empty, so the next one starts the bound.
            SearchResult::NotFound(_) => leaf.next().map(|next| (next, 0)),
        }
    }

    /// Inserts a key-value pair, replacing and returning the value of an existing key.
    ///
    /// Every node the split cascade can need is reserved before the tree is
    /// touched, so an `Err` leaves the tree exactly as it was.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let Some(leaf_handle) = self.find_leaf(&key) else {
            self.nodes.reserve(1)?;
            self.values.reserve(1)?;
            let mut leaf = LeafNode::new();
            leaf.push(key, self.values.alloc(value));
            let leaf_handle = self.nodes.alloc(Node::Leaf(leaf));
            self.root = Some(leaf_handle);
            self.first_leaf = Some(leaf_handle);
            self.last_leaf = Some(leaf_handle);
            self.len = 1;
            return Ok(None);
        };

        let idx = match self.nodes.get(leaf_handle).as_leaf().search(&key) {
            SearchResult::Found(idx) => {
                // Upsert: overwrite in place, the structure does not change.
                let old_value = core::mem::replace(self.entry_mut(leaf_handle, idx).1, value);
                return Ok(Some(old_value));
            }
            SearchResult::NotFound(idx) => idx,
        };

        self.reserve_for_insert(leaf_handle)?;
        self.values.reserve(1)?;

        let value_handle = self.values.alloc(value);
        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        leaf.insert(idx, key, value_handle);
        self.len += 1;

        if leaf.key_count() > self.config.max_keys() {
            self.split_leaf(leaf_handle);
        }
        Ok(None)
    }

    /// Reserves one node per full node on the path from `leaf` upward, plus a
    /// new root when the cascade would reach past the current one.
    fn reserve_for_insert(&mut self, leaf: Handle) -> Result<()> {
        let max_keys = self.config.max_keys();
        let mut splits = 0;
        let mut current = Some(leaf);

        while let Some(handle) = current {
            let node = self.nodes.get(handle);
            if node.key_count() < max_keys {
                break;
            }
            splits += 1;
            current = node.parent();
        }

        let new_root = usize::from(current.is_none());
        self.nodes.reserve(splits + new_root)
    }

    /// Moves the upper half of an overfull leaf into a new right sibling and
    /// promotes the sibling's first key.
    fn split_leaf(&mut self, leaf_handle: Handle) {
        let split_point = self.config.split_point();
        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        let mut right = leaf.split(split_point);
        let old_next = leaf.next();

        let separator = right.key(0).clone();
        right.set_prev(Some(leaf_handle));
        right.set_next(old_next);
        let right_handle = self.nodes.alloc(Node::Leaf(right));

        self.nodes.get_mut(leaf_handle).as_leaf_mut().set_next(Some(right_handle));
        match old_next {
            Some(next) => self.nodes.get_mut(next).as_leaf_mut().set_prev(Some(right_handle)),
            None => self.last_leaf = Some(right_handle),
        }

        trace!(split_point, "split leaf");
        self.insert_into_parent(leaf_handle, separator, right_handle);
    }

    /// Splits an overfull internal node, moving the promoted separator out of both halves.
    fn split_internal(&mut self, node_handle: Handle) {
        let split_point = self.config.split_point();
        let (separator, right) = self.nodes.get_mut(node_handle).as_internal_mut().split(split_point);
        let moved: HandleVec = right.children().iter().copied().collect();
        let right_handle = self.nodes.alloc(Node::Internal(right));

        for child in moved {
            self.nodes.get_mut(child).set_parent(Some(right_handle));
        }

        trace!(split_point, "split internal node");
        self.insert_into_parent(node_handle, separator, right_handle);
    }

    /// Links a freshly split `right` sibling next to `left`, growing a new root
    /// when `left` was the root.
    fn insert_into_parent(&mut self, left: Handle, separator: K, right: Handle) {
        let Some(parent_handle) = self.nodes.get(left).parent() else {
            let mut root = InternalNode::with_first_child(left);
            root.push_child(separator, right);
            let root_handle = self.nodes.alloc(Node::Internal(root));
            self.nodes.get_mut(left).set_parent(Some(root_handle));
            self.nodes.get_mut(right).set_parent(Some(root_handle));
            self.root = Some(root_handle);
            debug!(height = self.height(), "root split, tree grew");
            return;
        };

        let parent = self.nodes.get_mut(parent_handle).as_internal_mut();
        // The separator lies inside `left`'s range, so it routes to `left`'s slot.
        let index = parent.search_child(&separator);
        parent.insert_child(index, separator, right);
        let overfull = parent.key_count() > self.config.max_keys();

        self.nodes.get_mut(right).set_parent(Some(parent_handle));
        if overfull {
            self.split_internal(parent_handle);
        }
    }

    /// Removes a key from the tree and returns the key-value pair.
    pub(crate) fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let leaf_handle = self.find_leaf(key)?;
        let leaf = self.nodes.get_mut(leaf_handle).as_leaf_mut();
        let SearchResult::Found(idx) = leaf.search(key) else {
            return None;
        };

        let (removed_key, value_handle) = leaf.remove(idx);
        let remaining = leaf.key_count();
        let removed_value = self.values.take(value_handle);
        self.len -= 1;

        if self.root == Some(leaf_handle) {
            // A root leaf may underflow freely; once empty the tree is empty.
            if remaining == 0 {
                self.clear();
                debug!("last entry removed, tree is empty");
            }
        } else if remaining < self.config.min_keys() {
            self.rebalance(leaf_handle);
        }

        Some((removed_key, removed_value))
    }

    /// Restores the occupancy of an underflowing non-root node by borrowing
    /// from a sibling, or merging with one when neither can spare an entry.
    ///
    /// The left sibling is preferred over the right for both borrowing and merging.
    fn rebalance(&mut self, node: Handle) {
        let Some(parent_handle) = self.nodes.get(node).parent() else {
            return;
        };

        let min_keys = self.config.min_keys();
        let parent = self.nodes.get(parent_handle).as_internal();
        let index = parent
            .position_of(node)
            .expect("`RawBPlusTree::rebalance()` - node is missing from its parent!");
        let left = index.checked_sub(1).map(|i| parent.child(i));
        let right = (index + 1 < parent.child_count()).then(|| parent.child(index + 1));

        if let Some(left) = left
            && self.nodes.get(left).key_count() > min_keys
        {
            self.borrow_from_left(node, left, parent_handle, index - 1);
        } else if let Some(right) = right
            && self.nodes.get(right).key_count() > min_keys
        {
            self.borrow_from_right(node, right, parent_handle, index);
        } else if let Some(left) = left {
            self.merge(left, node, parent_handle, index - 1);
        } else if let Some(right) = right {
            self.merge(node, right, parent_handle, index);
        }
    }

    /// Moves the last entry (or child) of `left` to the front of `node`.
    fn borrow_from_left(&mut self, node: Handle, left: Handle, parent: Handle, separator_idx: usize) {
        if self.nodes.get(node).is_leaf() {
            let (key, value) = self.nodes.get_mut(left).as_leaf_mut().pop_back();
            let separator = key.clone();
            self.nodes.get_mut(node).as_leaf_mut().push_front(key, value);
            self.nodes.get_mut(parent).as_internal_mut().set_key(separator_idx, separator);
        } else {
            let (key, child) = self.nodes.get_mut(left).as_internal_mut().pop_back_child();
            let separator = self.nodes.get_mut(parent).as_internal_mut().set_key(separator_idx, key);
            self.nodes.get_mut(node).as_internal_mut().push_child_front(child, separator);
            self.nodes.get_mut(child).set_parent(Some(node));
        }
        trace!(separator_idx, "borrowed from left sibling");
    }

    /// Moves the first entry (or child) of `right` to the back of `node`.
    fn borrow_from_right(&mut self, node: Handle, right: Handle, parent: Handle, separator_idx: usize) {
        if self.nodes.get(node).is_leaf() {
            let right_leaf = self.nodes.get_mut(right).as_leaf_mut();
            let (key, value) = right_leaf.pop_front();
            let separator = right_leaf.key(0).clone();
            self.nodes.get_mut(node).as_leaf_mut().push(key, value);
            self.nodes.get_mut(parent).as_internal_mut().set_key(separator_idx, separator);
        } else {
            let (child, key) = self.nodes.get_mut(right).as_internal_mut().pop_front_child();
            let separator = self.nodes.get_mut(parent).as_internal_mut().set_key(separator_idx, key);
            self.nodes.get_mut(node).as_internal_mut().push_child(separator, child);
            self.nodes.get_mut(child).set_parent(Some(node));
        }
        trace!(separator_idx, "borrowed from right sibling");
    }

    /// Absorbs `right` into `left`, destroys `right`, and removes their
    /// separator from `parent`, repairing the parent in turn.
    fn merge(&mut self, left: Handle, right: Handle, parent: Handle, separator_idx: usize) {
        let (separator, removed) = self.nodes.get_mut(parent).as_internal_mut().remove_child(separator_idx);
        debug_assert_eq!(removed, right, "`RawBPlusTree::merge()` - separator does not precede `right`!");

        match self.nodes.take(right) {
            Node::Leaf(right_leaf) => {
                let left_leaf = self.nodes.get_mut(left).as_leaf_mut();
                left_leaf.merge_with_right(right_leaf);
                match left_leaf.next() {
                    Some(next) => self.nodes.get_mut(next).as_leaf_mut().set_prev(Some(left)),
                    None => self.last_leaf = Some(left),
                }
            }
            Node::Internal(right_internal) => {
                let moved: HandleVec = right_internal.children().iter().copied().collect();
                self.nodes.get_mut(left).as_internal_mut().merge_with_right(separator, right_internal);
                for child in moved {
                    self.nodes.get_mut(child).set_parent(Some(left));
                }
            }
        }
        trace!(separator_idx, "merged siblings");

        let parent_node = self.nodes.get(parent);
        let remaining = parent_node.key_count();
        if parent_node.parent().is_none() {
            if remaining == 0 {
                self.collapse_root(parent);
            }
        } else if remaining < self.config.min_keys() {
            self.rebalance(parent);
        }
    }

    /// Replaces an internal root with no keys by its only child.
    fn collapse_root(&mut self, root: Handle) {
        let child = self.nodes.take(root).as_internal().child(0);
        self.nodes.get_mut(child).set_parent(None);
        self.root = Some(child);
        debug!(height = self.height(), "root collapsed, tree shrank");
    }
}

impl<K: Clone, V: Clone> Clone for RawBPlusTree<K, V> {
    fn clone(&self) -> Self {
        fn clone_node<K: Clone, V: Clone>(
            source: &RawBPlusTree<K, V>,
            target: &mut RawBPlusTree<K, V>,
            old_handle: Handle,
            leaves: &mut Vec<Handle>,
        ) -> Handle {
            match source.nodes.get(old_handle) {
                Node::Leaf(leaf) => {
                    let mut new_leaf = LeafNode::new();
                    for i in 0..leaf.key_count() {
                        let (key, value) = source.entry(old_handle, i);
                        let value_handle = target.values.alloc(value.clone());
                        new_leaf.push(key.clone(), value_handle);
                    }
                    let handle = target.nodes.alloc(Node::Leaf(new_leaf));
                    leaves.push(handle);
                    handle
                }
                Node::Internal(internal) => {
                    let first = clone_node(source, target, internal.child(0), leaves);
                    let mut new_internal = InternalNode::with_first_child(first);
                    for (i, key) in internal.keys().iter().enumerate() {
                        let child = clone_node(source, target, internal.child(i + 1), leaves);
                        new_internal.push_child(key.clone(), child);
                    }

                    let children: HandleVec = new_internal.children().iter().copied().collect();
                    let handle = target.nodes.alloc(Node::Internal(new_internal));
                    for child in children {
                        target.nodes.get_mut(child).set_parent(Some(handle));
                    }
                    handle
                }
            }
        }

        let mut target = RawBPlusTree::new(self.config);
        let Some(root) = self.root else {
            return target;
        };

        let mut leaves = Vec::new();
        target.root = Some(clone_node(self, &mut target, root, &mut leaves));

        // Relink the leaf chain in key order.
        for (i, &handle) in leaves.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| leaves[p]);
            let next = leaves.get(i + 1).copied();
            let leaf = target.nodes.get_mut(handle).as_leaf_mut();
            leaf.set_prev(prev);
            leaf.set_next(next);
        }

        target.len = self.len;
        target.first_leaf = leaves.first().copied();
        target.last_leaf = leaves.last().copied();
        target
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::error::Error;
    use alloc::collections::BTreeMap;
    use alloc::vec;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn tree_of(order: usize, keys: impl IntoIterator<Item = u32>) -> RawBPlusTree<u32, u32> {
        let mut tree = RawBPlusTree::new(Config::new(order));
        for key in keys {
            tree.insert(key, key * 10).unwrap();
        }
        tree
    }

    /// Keys grouped by leaf, in chain order.
    fn leaf_keys(tree: &RawBPlusTree<u32, u32>) -> Vec<Vec<u32>> {
        let mut leaves = Vec::new();
        let mut current = tree.first_leaf();
        while let Some(leaf) = current {
            leaves.push(tree.node(leaf).keys().to_vec());
            current = tree.next_leaf(leaf);
        }
        leaves
    }

    fn root_keys(tree: &RawBPlusTree<u32, u32>) -> Vec<u32> {
        tree.root.map(|root| tree.node(root).keys().to_vec()).unwrap_or_default()
    }

    #[test]
    fn root_split_grows_tree() {
        let tree = tree_of(3, [1, 2]);
        assert_eq!(tree.height(), 1);

        let tree = tree_of(3, [1, 2, 3]);
        assert_eq!(tree.height(), 2);
        assert_eq!(leaf_keys(&tree), vec![vec![1], vec![2, 3]]);
        assert_eq!(root_keys(&tree), [2]);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn upsert_keeps_structure() {
        let mut tree = tree_of(3, [1, 2, 3]);
        let nodes = tree.node_count();
        assert_eq!(tree.insert(2, 7).unwrap(), Some(20));
        assert_eq!(tree.get(&2), Some(&7));
        assert_eq!(tree.node_count(), nodes);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn borrow_from_left_leaf() {
        let mut tree = tree_of(3, [1, 2, 3, 0]);
        assert_eq!(leaf_keys(&tree), vec![vec![0, 1], vec![2, 3]]);

        assert!(tree.remove_entry(&2).is_some());
        assert!(tree.remove_entry(&3).is_some());
        assert_eq!(leaf_keys(&tree), vec![vec![0], vec![1]]);
        assert_eq!(root_keys(&tree), [1]);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn borrow_from_right_leaf() {
        let mut tree = tree_of(3, [1, 2, 3]);
        assert_eq!(tree.remove_entry(&1), Some((1, 10)));
        assert_eq!(leaf_keys(&tree), vec![vec![2], vec![3]]);
        assert_eq!(root_keys(&tree), [3]);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn merge_collapses_root() {
        // Merge into the right sibling when there is no left one.
        let mut tree = tree_of(3, [1, 2, 3, 0]);
        tree.remove_entry(&2);
        tree.remove_entry(&3);
        tree.remove_entry(&0);
        assert_eq!(leaf_keys(&tree), vec![vec![1]]);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));

        // Merge into the left sibling.
        let mut tree = tree_of(3, [1, 2, 3]);
        tree.remove_entry(&3);
        tree.remove_entry(&2);
        assert_eq!(leaf_keys(&tree), vec![vec![1]]);
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn removing_last_entry_empties_tree() {
        let mut tree = tree_of(4, [5]);
        assert_eq!(tree.remove_entry(&6), None);
        assert_eq!(tree.remove_entry(&5), Some((5, 50)));
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert_eq!(tree.node_count(), 0);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn deep_cascades_keep_invariants() {
        let mut tree = tree_of(3, 0..500);
        assert_eq!(tree.check_invariants(), Ok(()));
        assert!(tree.height() >= 5);

        for key in (0..500).rev().step_by(3) {
            assert!(tree.remove_entry(&key).is_some());
            assert_eq!(tree.check_invariants(), Ok(()));
        }
        for key in 0..500 {
            tree.remove_entry(&key);
        }
        assert!(tree.is_empty());
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn node_limit_rejects_split_without_change() {
        let mut tree = RawBPlusTree::new(Config::new(3).with_node_limit(3));
        for key in [1, 2, 3] {
            tree.insert(key, key).unwrap();
        }
        assert_eq!(tree.node_count(), 3);
        let before = leaf_keys(&tree);

        // [2, 3] would split, needing a fourth node.
        assert!(matches!(tree.insert(4, 4), Err(Error::NodeLimitExceeded { limit: 3 })));
        assert_eq!(leaf_keys(&tree), before);
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.get(&4), None);
        assert_eq!(tree.check_invariants(), Ok(()));

        // Overwrites and inserts into non-full leaves need no node.
        assert_eq!(tree.insert(3, 30).unwrap(), Some(3));
        assert_eq!(tree.insert(0, 0).unwrap(), None);
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[test]
    fn lower_bound_crosses_leaves() {
        let tree = tree_of(3, [10, 20, 30, 40]);
        let key_at = |pos: Option<(Handle, usize)>| pos.map(|(leaf, idx)| *tree.entry(leaf, idx).0);

        assert_eq!(key_at(tree.lower_bound(&0)), Some(10));
        assert_eq!(key_at(tree.lower_bound(&20)), Some(20));
        assert_eq!(key_at(tree.lower_bound(&21)), Some(30));
        assert_eq!(key_at(tree.lower_bound(&41)), None);
    }

    #[test]
    fn clone_is_deep_and_valid() {
        let mut tree = tree_of(4, 0..100);
        let copy = tree.clone();
        assert_eq!(copy.check_invariants(), Ok(()));
        assert_eq!(leaf_keys(&copy), leaf_keys(&tree));

        tree.remove_entry(&50);
        *tree.get_mut(&10).unwrap() = 0;
        assert_eq!(copy.get(&50), Some(&500));
        assert_eq!(copy.get(&10), Some(&100));
    }

    #[test]
    fn drain_returns_sorted_entries() {
        let mut tree = tree_of(3, [3, 1, 2]);
        assert_eq!(tree.drain_to_vec(), [(1, 10), (2, 20), (3, 30)]);
        assert!(tree.is_empty());
        assert_eq!(tree.check_invariants(), Ok(()));
    }

    #[derive(Clone, Debug)]
    enum Op {
        Insert(u32),
        Remove(u32),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => (0u32..400).prop_map(Op::Insert),
            2 => (0u32..400).prop_map(Op::Remove),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn tree_invariants_maintained_after_operations(
            order in 3usize..8,
            ops in prop::collection::vec(op_strategy(), 0..400),
        ) {
            let mut tree: RawBPlusTree<u32, u32> = RawBPlusTree::new(Config::new(order));
            let mut model = BTreeMap::new();

            for op in ops {
                match op {
                    Op::Insert(key) => {
                        prop_assert_eq!(tree.insert(key, key + 1).unwrap(), model.insert(key, key + 1));
                    }
                    Op::Remove(key) => {
                        prop_assert_eq!(tree.remove_entry(&key), model.remove_entry(&key));
                    }
                }
                prop_assert_eq!(tree.check_invariants(), Ok(()));
            }

            prop_assert_eq!(tree.len(), model.len());
            let flattened: Vec<u32> = leaf_keys(&tree).into_iter().flatten().collect();
            prop_assert_eq!(flattened, model.keys().copied().collect::<Vec<_>>());
        }
    }
}
