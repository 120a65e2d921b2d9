use alloc::vec::Vec;

use super::handle::Handle;
use super::node::Node;
use super::raw_bplus_tree::RawBPlusTree;
use crate::error::InvariantViolation;

/// Key range a subtree must fall within: `lower <= key < upper`.
struct Bounds<'a, K> {
    lower: Option<&'a K>,
    upper: Option<&'a K>,
}

impl<K: Ord> Bounds<'_, K> {
    fn contains(&self, key: &K) -> bool {
        self.lower.is_none_or(|lower| lower <= key) && self.upper.is_none_or(|upper| key < upper)
    }
}

struct Walk {
    leaf_depth: Option<usize>,
    leaves: Vec<Handle>,
    entries: usize,
}

impl<K: Ord, V> RawBPlusTree<K, V> {
    /// Checks every structural invariant, returning the first violation found.
    pub(crate) fn check_invariants(&self) -> Result<(), InvariantViolation> {
        let Some(root) = self.root else {
            if self.len != 0 {
                return Err(InvariantViolation::Length { reported: self.len, actual: 0 });
            }
            if self.first_leaf.is_some() || self.last_leaf.is_some() {
                return Err(InvariantViolation::LeafChain { position: 0 });
            }
            return Ok(());
        };

        let mut walk = Walk {
            leaf_depth: None,
            leaves: Vec::new(),
            entries: 0,
        };
        let unbounded = Bounds { lower: None, upper: None };
        self.check_node(root, None, 0, unbounded, &mut walk)?;
        self.check_leaf_chain(&walk.leaves)?;

        if walk.entries != self.len {
            return Err(InvariantViolation::Length {
                reported: self.len,
                actual: walk.entries,
            });
        }
        Ok(())
    }

    fn check_node(
        &self,
        handle: Handle,
        parent: Option<Handle>,
        depth: usize,
        bounds: Bounds<'_, K>,
        walk: &mut Walk,
    ) -> Result<(), InvariantViolation> {
        let node = self.nodes.get(handle);
        if node.parent() != parent {
            return Err(InvariantViolation::ParentLink { depth });
        }

        let count = node.key_count();
        let (min, max) = (self.config.min_keys(), self.config.max_keys());
        if parent.is_none() {
            // The root only needs one key; a keyless root means the tree should have been emptied or collapsed.
            if count == 0 || count > max {
                return Err(InvariantViolation::RootKeyCount { count });
            }
        } else if !(min..=max).contains(&count) {
            return Err(InvariantViolation::KeyCount { depth, count, min, max });
        }

        if !node.keys().is_sorted_by(|a, b| a < b) {
            return Err(InvariantViolation::UnsortedKeys { depth });
        }

        match node {
            Node::Leaf(leaf) => {
                if leaf.value_count() != count {
                    return Err(InvariantViolation::ValueCount {
                        depth,
                        keys: count,
                        values: leaf.value_count(),
                    });
                }
                if !leaf.keys().iter().all(|key| bounds.contains(key)) {
                    return Err(InvariantViolation::SeparatorBounds { depth });
                }
                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(InvariantViolation::LeafDepth { expected, found: depth });
                    }
                    Some(_) => {}
                }
                walk.leaves.push(handle);
                walk.entries += count;
            }
            Node::Internal(internal) => {
                if internal.child_count() != count + 1 {
                    return Err(InvariantViolation::ChildCount {
                        depth,
                        keys: count,
                        children: internal.child_count(),
                    });
                }
                for (i, &child) in internal.children().iter().enumerate() {
                    let child_bounds = Bounds {
                        lower: if i == 0 { bounds.lower } else { Some(internal.key(i - 1)) },
                        upper: if i == count { bounds.upper } else { Some(internal.key(i)) },
                    };
                    self.check_node(child, Some(handle), depth + 1, child_bounds, walk)?;
                }
            }
        }
        Ok(())
    }

    /// The chain must visit exactly the in-order leaves, linked both ways.
    fn check_leaf_chain(&self, leaves: &[Handle]) -> Result<(), InvariantViolation> {
        if self.first_leaf != leaves.first().copied() {
            return Err(InvariantViolation::LeafChain { position: 0 });
        }
        if self.last_leaf != leaves.last().copied() {
            return Err(InvariantViolation::LeafChain { position: leaves.len().saturating_sub(1) });
        }

        for (position, &leaf) in leaves.iter().enumerate() {
            let node = self.nodes.get(leaf).as_leaf();
            let expected_prev = position.checked_sub(1).map(|p| leaves[p]);
            let expected_next = leaves.get(position + 1).copied();
            if node.prev() != expected_prev || node.next() != expected_next {
                return Err(InvariantViolation::LeafChain { position });
            }
        }
        Ok(())
    }
}
