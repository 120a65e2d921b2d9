//! An in-memory B+ tree for Rust.
//!
//! [`BPlusTree`] is an ordered key-value map. All entries live in leaves that
//! sit at the same depth and form a doubly linked chain in key order; internal
//! nodes hold only routing keys. On top of the usual map operations it offers:
//!
//! - [`range`](BPlusTree::range) / [`range_query`](BPlusTree::range_query) - inclusive range scans along the leaf chain
//! - [`bulk_load`](BPlusTree::bulk_load) - bottom-up construction from an unsorted batch
//! - [`Cursor`] / [`CursorMut`] - bidirectional cursors, with a [`Reversed`] adapter
//! - [`validate`](BPlusTree::validate) - a full structural invariant check
//!
//! # Example
//!
//! ```
//! use leafline::BPlusTree;
//!
//! let mut tree = BPlusTree::new(4);
//! for key in 1..=20 {
//!     tree.insert(key, key * key)?;
//! }
//!
//! assert_eq!(tree.search(&7), Some(&49));
//! assert_eq!(tree.range_query(&3, &5), [(&3, &9), (&4, &16), (&5, &25)]);
//!
//! let mut cursor = tree.cursor_end();
//! cursor.move_prev();
//! assert_eq!(cursor.key(), Some(&20));
//!
//! tree.bulk_load([(2, 0), (1, 0), (2, 4)])?;
//! assert_eq!(tree.iter().collect::<Vec<_>>(), [(&1, &0), (&2, &4)]);
//! assert!(tree.validate());
//! # Ok::<(), leafline::Error>(())
//! ```
//!
//! # Features
//!
//! - **`no_std` compatible** - Only requires `alloc`, no standard library dependency
//! - **Configurable order** - Fan-out chosen per tree, from 3 upwards
//! - **Fallible growth** - An optional node limit turns runaway growth into an [`Error`] instead of an abort
//!
//! # Implementation
//!
//! Nodes live in an arena and refer to each other (parent, children, leaf
//! chain) through compact handles. Inserts reserve every node a split cascade
//! may need before touching the tree, so a failed insert leaves it unchanged.
//! Logging goes through [`tracing`]; no subscriber is installed.

#![no_std]
// These forbid rules and lint groups are meant to be very restrictive.
// NOTE: `IterMut` hands out disjoint mutable borrows of values and needs unsafe code.
// #![forbid(unsafe_code)]
#![forbid(keyword_idents)]
#![forbid(non_ascii_idents)]
#![forbid(unreachable_pub)]
#![warn(clippy::all)]
#![warn(clippy::cargo)]
#![warn(clippy::pedantic)]
// Enable coverage attributes for nightly builds.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

mod config;
mod error;
mod raw;

pub mod bplus_tree;

pub use bplus_tree::{BPlusTree, BidirectionalCursor, Cursor, CursorMut, CursorPosition, Reversed};
pub use config::{Config, DEFAULT_ORDER, MIN_ORDER};
pub use error::{Error, InvariantViolation, Result};
