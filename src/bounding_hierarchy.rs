//! This module defines the [`HierarchyTree`] trait, the read-only view of a binary
//! bounding volume hierarchy that the flattener consumes.
//!
//! [`HierarchyTree`]: trait.HierarchyTree.html
//!

use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};

/// A node of a binary bounding volume hierarchy, as exposed by a spatial partitioning
/// backend.
///
/// Any backend can be flattened as long as it can answer these five questions about
/// each of its nodes. Leaves must report a value, branches must report both children.
/// A node which breaks this contract is rejected by [`HierarchyTree::classify`].
///
/// [`HierarchyTree::classify`]: trait.HierarchyTree.html#method.classify
///
pub trait HierarchyTree {
    /// Returns true if this node stores a single primitive.
    fn is_leaf(&self) -> bool;

    /// Returns the volume enclosing everything below this node.
    fn bounding_volume(&self) -> BoundingVolume;

    /// Returns the left child of a branch. `None` for leaves.
    fn left(&self) -> Option<&Self>;

    /// Returns the right child of a branch. `None` for leaves.
    fn right(&self) -> Option<&Self>;

    /// Returns the primitive index stored in a leaf. `None` for branches.
    fn value(&self) -> Option<usize>;

    /// Resolves this node into a [`HierarchyNode`], checking the leaf/branch contract.
    ///
    /// [`HierarchyNode`]: enum.HierarchyNode.html
    ///
    fn classify(&self) -> Result<HierarchyNode<'_, Self>> {
        let volume = self.bounding_volume();
        if self.is_leaf() {
            match self.value() {
                Some(primitive_index) => Ok(HierarchyNode::Leaf {
                    primitive_index,
                    volume,
                }),
                None => Err(SerializeError::InvalidNode(
                    "leaf node does not store a primitive index".to_string(),
                )),
            }
        } else {
            match (self.left(), self.right()) {
                (Some(left), Some(right)) => Ok(HierarchyNode::Branch {
                    left,
                    right,
                    volume,
                }),
                (left, right) => Err(SerializeError::InvalidNode(format!(
                    "branch node is missing its {} child",
                    match (left, right) {
                        (None, None) => "left and right",
                        (None, _) => "left",
                        _ => "right",
                    }
                ))),
            }
        }
    }
}

/// The two kinds of node a [`HierarchyTree`] is made of.
///
/// [`HierarchyTree`]: trait.HierarchyTree.html
///
#[derive(Debug)]
pub enum HierarchyNode<'a, H: ?Sized> {
    /// A node representing exactly one scene primitive.
    Leaf {
        /// Index of the primitive in the caller's primitive list.
        primitive_index: usize,
        /// Bounds of the primitive.
        volume: BoundingVolume,
    },
    /// A node with exactly two children.
    Branch {
        left: &'a H,
        right: &'a H,
        /// Union of the children's volumes.
        volume: BoundingVolume,
    },
}

impl<'a, H: ?Sized> HierarchyNode<'a, H> {
    /// Returns true for the `Leaf` variant.
    pub fn is_leaf(&self) -> bool {
        matches!(self, HierarchyNode::Leaf { .. })
    }

    /// Returns the volume of the node, whatever its kind.
    pub fn volume(&self) -> BoundingVolume {
        match *self {
            HierarchyNode::Leaf { volume, .. } | HierarchyNode::Branch { volume, .. } => volume,
        }
    }
}
