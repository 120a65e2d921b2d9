use alloc::vec::Vec;
use tracing::debug;

use super::handle::Handle;
use super::node::{HandleVec, InternalNode, LeafNode, Node};
use super::raw_bplus_tree::RawBPlusTree;
use crate::config::Config;
use crate::error::Result;

impl<K: Clone + Ord, V> RawBPlusTree<K, V> {
    /// Replaces the contents of the tree with `entries`, building it level by level.
    ///
    /// Later entries win over earlier entries with the same key. The new tree is
    /// built into fresh storage and only swapped in once complete, so on `Err`
    /// the old contents are still in place.
    pub(crate) fn bulk_load<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut entries: Vec<(K, V)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries.dedup_by(|later, kept| {
            if later.0 == kept.0 {
                core::mem::swap(&mut later.1, &mut kept.1);
                true
            } else {
                false
            }
        });

        if entries.is_empty() {
            self.clear();
            debug!("bulk load of no entries, tree is empty");
            return Ok(());
        }

        let len = entries.len();
        let mut tree = Self::new(self.config);
        tree.nodes.reserve(node_count(len, &self.config))?;
        tree.values.reserve(len)?;

        let mut level = tree.build_leaves(entries);
        while level.len() > 1 {
            level = tree.build_parents(level);
        }
        tree.root = level.pop().map(|(handle, _)| handle);

        *self = tree;
        debug!(len, height = self.height(), nodes = self.node_count(), "bulk load complete");
        Ok(())
    }

    /// Packs sorted, distinct entries into evenly filled, chained leaves.
    ///
    /// Returns each leaf with its first key, the separator it contributes to its parent.
    fn build_leaves(&mut self, entries: Vec<(K, V)>) -> Vec<(Handle, K)> {
        let len = entries.len();
        let leaf_count = len.div_ceil(self.config.max_keys());
        let mut level = Vec::with_capacity(leaf_count);
        let mut entries = entries.into_iter();
        let mut prev: Option<Handle> = None;

        for size in even_chunks(len, leaf_count) {
            let mut leaf = LeafNode::new();
            for (key, value) in entries.by_ref().take(size) {
                leaf.push(key, self.values.alloc(value));
            }
            leaf.set_prev(prev);
            let first_key = leaf.key(0).clone();
            let handle = self.nodes.alloc(Node::Leaf(leaf));

            match prev {
                Some(prev) => self.nodes.get_mut(prev).as_leaf_mut().set_next(Some(handle)),
                None => self.first_leaf = Some(handle),
            }
            prev = Some(handle);
            level.push((handle, first_key));
        }

        self.last_leaf = prev;
        self.len = len;
        level
    }

    /// Groups one level of nodes under as few evenly filled parents as the order allows.
    fn build_parents(&mut self, level: Vec<(Handle, K)>) -> Vec<(Handle, K)> {
        let count = level.len();
        let parent_count = count.div_ceil(self.config.order());
        let mut parents = Vec::with_capacity(parent_count);
        let mut level = level.into_iter();

        for size in even_chunks(count, parent_count) {
            let mut group = level.by_ref().take(size);
            let (first, first_key) = group.next().expect("`RawBPlusTree::build_parents()` - empty group!");

            let mut parent = InternalNode::with_first_child(first);
            for (child, separator) in group {
                parent.push_child(separator, child);
            }

            let children: HandleVec = parent.children().iter().copied().collect();
            let handle = self.nodes.alloc(Node::Internal(parent));
            for child in children {
                self.nodes.get_mut(child).set_parent(Some(handle));
            }
            parents.push((handle, first_key));
        }

        parents
    }
}

/// Number of nodes a bulk-loaded tree of `len > 0` entries needs.
fn node_count(len: usize, config: &Config) -> usize {
    let mut level = len.div_ceil(config.max_keys());
    let mut total = level;
    while level > 1 {
        level = level.div_ceil(config.order());
        total += level;
    }
    total
}

/// Splits `total` items into `parts` sizes that differ by at most one, larger first.
fn even_chunks(total: usize, parts: usize) -> impl Iterator<Item = usize> {
    let base = total / parts;
    let extra = total % parts;
    (0..parts).map(move |i| base + usize::from(i < extra))
}
