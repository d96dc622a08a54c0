//! A crate which flattens binary bounding volume hierarchies, and the scene data
//! traversed alongside them, into byte buffers for GPU kernels.
//!
//! ## About
//!
//! GPU kernels cannot follow pointers, so a tree has to be turned into a flat array of
//! fixed size records which are navigated by index arithmetic alone. This crate writes
//! such arrays: each node of a hierarchy becomes one 56 byte record, leaves are marked
//! by a sentinel in their first `z` slot, and branches refer to their children by a
//! sign encoded identifier (`-id - 1` for leaves, `id` for branches).
//!
//! Records are laid out in pre-order (a node, then its left subtree, then its right
//! subtree) while identifiers are handed out in post-order, so a reference names the
//! order in which nodes were finished, not their position in the buffer. See
//! [`flat_bvh::serialize_tree`] for details.
//!
//! Any tree can be flattened by implementing [`HierarchyTree`]. [`AabbTree`] is a
//! ready to use implementation built by incremental insertion.
//!
//! The [`serializer`] module writes the remaining kernel inputs: triangle records and
//! their offset table, detector slices, light sources with their cumulative power
//! table, and sensors with their own hierarchy.
//!
//! ## Example
//!
//! ```
//! use fluxbvh::aabb::Aabb;
//! use fluxbvh::aabb_tree::AabbTree;
//! use fluxbvh::flat_bvh::{ChildRef, RecordPayload, NODE_RECORD_SIZE};
//! use fluxbvh::nalgebra::Point3;
//!
//! let mut tree = AabbTree::new();
//! tree.add(Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)), 0);
//! tree.add(Aabb::with_bounds(Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0)), 1);
//!
//! let flat = tree.flatten().unwrap();
//! assert_eq!(flat.len(), 3 * NODE_RECORD_SIZE);
//!
//! match flat.record(0).unwrap().payload().unwrap() {
//!     RecordPayload::Branch { left, right, .. } => {
//!         assert_eq!(left, ChildRef::Leaf(0));
//!         assert_eq!(right, ChildRef::Leaf(1));
//!         assert_eq!(left.encode().unwrap(), -1);
//!         assert_eq!(right.encode().unwrap(), -2);
//!     }
//!     RecordPayload::Leaf { .. } => unreachable!(),
//! }
//! ```
//!
//! ## Features
//!
//! - `rayon` (default **enabled**) - encodes the triangles of a mesh in parallel
//! - `serde` (default **disabled**) - adds `Serialize` and `Deserialize` implementations for some types
//!

/// A minimal floating value used as a lower bound.
pub const EPSILON: f32 = 0.00001;

pub mod aabb;
pub mod aabb_tree;
pub mod bounding_hierarchy;
pub mod bounding_volume;
pub mod config;
pub mod error;
pub mod flat_bvh;
pub mod serializer;
mod utils;

#[cfg(test)]
mod testbase;

pub use nalgebra;

pub use crate::aabb_tree::AabbTree;
pub use crate::bounding_hierarchy::{HierarchyNode, HierarchyTree};
pub use crate::bounding_volume::{convert_bounding_box, BoundingVolume};
pub use crate::config::SerializerConfig;
pub use crate::error::{Result, SerializeError};
pub use crate::flat_bvh::{serialize_tree, FlatBvh};
