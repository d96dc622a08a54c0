//! An incrementally built binary tree of [`Aabb`]s, used as the default
//! [`HierarchyTree`] backend.
//!
//! Shapes are inserted one at a time. At every branch the new shape either becomes a
//! sibling of that branch or moves down into one of its children, whichever adds the
//! least surface area. The two subtrees of any branch never differ in height by more
//! than one level, so the tree stays logarithmically deep even when shapes arrive in
//! spatial order.
//!
//! [`Aabb`]: ../aabb/struct.Aabb.html
//! [`HierarchyTree`]: ../bounding_hierarchy/trait.HierarchyTree.html
//!

use crate::aabb::{Aabb, Bounded};
use crate::bounding_hierarchy::HierarchyTree;
use crate::bounding_volume::BoundingVolume;

/// A node of an [`AabbTree`].
///
/// [`AabbTree`]: struct.AabbTree.html
///
#[derive(Debug, Clone)]
pub enum AabbTreeNode {
    /// Leaf node.
    Leaf {
        /// Bounds of the stored shape.
        aabb: Aabb,
        /// Opaque id of the stored shape.
        value: usize,
    },
    /// Inner node.
    Branch {
        /// Convex hull of both subtrees.
        aabb: Aabb,
        /// Number of levels below and including this node.
        height: usize,
        left: Box<AabbTreeNode>,
        right: Box<AabbTreeNode>,
    },
}

impl AabbTreeNode {
    /// Returns the bounds of this node.
    pub fn aabb(&self) -> Aabb {
        match *self {
            AabbTreeNode::Leaf { aabb, .. } | AabbTreeNode::Branch { aabb, .. } => aabb,
        }
    }

    /// Returns the number of levels below and including this node.
    pub fn depth(&self) -> usize {
        match *self {
            AabbTreeNode::Leaf { .. } => 1,
            AabbTreeNode::Branch { height, .. } => height,
        }
    }

    /// Surface area this node gains by also enclosing `aabb`.
    fn growth(&self, aabb: &Aabb) -> f32 {
        self.aabb().join(aabb).surface_area() - self.aabb().surface_area()
    }

    fn new_branch(left: AabbTreeNode, right: AabbTreeNode) -> AabbTreeNode {
        AabbTreeNode::Branch {
            aabb: left.aabb().join(&right.aabb()),
            height: 1 + left.depth().max(right.depth()),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Puts two balanced subtrees under a new parent.
    ///
    /// Their heights may differ by up to two levels. If they do, the taller side is
    /// rotated: its higher child moves up next to the pairing of its lower child with
    /// the shorter side.
    fn balanced_branch(left: AabbTreeNode, right: AabbTreeNode) -> AabbTreeNode {
        if left.depth() > right.depth() + 1 {
            match left {
                AabbTreeNode::Branch {
                    left: a, right: b, ..
                } => {
                    let (higher, lower) = if a.depth() >= b.depth() { (a, b) } else { (b, a) };
                    AabbTreeNode::new_branch(*higher, AabbTreeNode::new_branch(*lower, right))
                }
                leaf => AabbTreeNode::new_branch(leaf, right),
            }
        } else if right.depth() > left.depth() + 1 {
            match right {
                AabbTreeNode::Branch {
                    left: a, right: b, ..
                } => {
                    let (higher, lower) = if a.depth() >= b.depth() { (a, b) } else { (b, a) };
                    AabbTreeNode::new_branch(AabbTreeNode::new_branch(left, *lower), *higher)
                }
                leaf => AabbTreeNode::new_branch(left, leaf),
            }
        } else {
            AabbTreeNode::new_branch(left, right)
        }
    }

    /// Puts two balanced subtrees of any heights under a common ancestor.
    ///
    /// The shorter one sinks into the taller one, along the children that grow the
    /// least, until the heights are within one level of each other.
    fn join(self, other: AabbTreeNode) -> AabbTreeNode {
        if other.depth() > self.depth() + 1 {
            return other.join(self);
        }
        if self.depth() <= other.depth() + 1 {
            return AabbTreeNode::new_branch(self, other);
        }
        match self {
            AabbTreeNode::Branch { left, right, .. } => {
                let aabb = other.aabb();
                if left.growth(&aabb) <= right.growth(&aabb) {
                    AabbTreeNode::balanced_branch((*left).join(other), *right)
                } else {
                    AabbTreeNode::balanced_branch(*left, (*right).join(other))
                }
            }
            leaf => AabbTreeNode::new_branch(leaf, other),
        }
    }

    /// Inserts a new leaf below this node and returns the new subtree root.
    fn insert(self, aabb: Aabb, value: usize) -> AabbTreeNode {
        let leaf = AabbTreeNode::Leaf { aabb, value };
        match self {
            AabbTreeNode::Branch {
                aabb: node_aabb,
                height,
                left,
                right,
            } => {
                // A new parent over this node, against moving down into either child.
                let sibling_cost = node_aabb.join(&aabb).surface_area();
                let left_cost = left.aabb().join(&aabb).surface_area() + right.aabb().surface_area();
                let right_cost = right.aabb().join(&aabb).surface_area() + left.aabb().surface_area();

                if sibling_cost < left_cost && sibling_cost < right_cost {
                    let node = AabbTreeNode::Branch {
                        aabb: node_aabb,
                        height,
                        left,
                        right,
                    };
                    node.join(leaf)
                } else if left_cost <= right_cost {
                    AabbTreeNode::balanced_branch((*left).insert(aabb, value), *right)
                } else {
                    AabbTreeNode::balanced_branch(*left, (*right).insert(aabb, value))
                }
            }
            node => node.join(leaf),
        }
    }

    fn pretty_print_at(&self, depth: usize) {
        let padding: String = " ".repeat(depth);
        match *self {
            AabbTreeNode::Leaf { aabb, value } => {
                log::info!("{}leaf {} {}", padding, value, aabb);
            }
            AabbTreeNode::Branch {
                aabb,
                ref left,
                ref right,
                ..
            } => {
                log::info!("{}branch {}", padding, aabb);
                left.pretty_print_at(depth + 1);
                right.pretty_print_at(depth + 1);
            }
        }
    }
}

impl HierarchyTree for AabbTreeNode {
    fn is_leaf(&self) -> bool {
        matches!(self, AabbTreeNode::Leaf { .. })
    }

    fn bounding_volume(&self) -> BoundingVolume {
        self.aabb().into()
    }

    fn left(&self) -> Option<&Self> {
        match self {
            AabbTreeNode::Branch { left, .. } => Some(left.as_ref()),
            AabbTreeNode::Leaf { .. } => None,
        }
    }

    fn right(&self) -> Option<&Self> {
        match self {
            AabbTreeNode::Branch { right, .. } => Some(right.as_ref()),
            AabbTreeNode::Leaf { .. } => None,
        }
    }

    fn value(&self) -> Option<usize> {
        match *self {
            AabbTreeNode::Leaf { value, .. } => Some(value),
            AabbTreeNode::Branch { .. } => None,
        }
    }
}

/// A binary tree of [`Aabb`]s which grows by insertion.
///
/// # Examples
/// ```
/// use fluxbvh::aabb::Aabb;
/// use fluxbvh::aabb_tree::AabbTree;
/// use nalgebra::Point3;
///
/// let mut tree = AabbTree::new();
/// for i in 0..4 {
///     let min = Point3::new(i as f32, 0.0, 0.0);
///     let max = Point3::new(i as f32 + 1.0, 1.0, 1.0);
///     tree.add(Aabb::with_bounds(min, max), i);
/// }
/// assert_eq!(tree.len(), 4);
/// ```
///
/// [`Aabb`]: ../aabb/struct.Aabb.html
///
#[derive(Debug, Clone, Default)]
pub struct AabbTree {
    root: Option<AabbTreeNode>,
    len: usize,
}

impl AabbTree {
    /// Creates an empty [`AabbTree`].
    ///
    /// [`AabbTree`]: struct.AabbTree.html
    ///
    pub fn new() -> AabbTree {
        AabbTree::default()
    }

    /// Builds a tree over `shapes`, storing each shape's position in the slice as its value.
    pub fn from_shapes<T: Bounded>(shapes: &[T]) -> AabbTree {
        let mut tree = AabbTree::new();
        for (index, shape) in shapes.iter().enumerate() {
            tree.add(shape.aabb(), index);
        }
        tree
    }

    /// Inserts a shape's bounds together with an opaque `value` identifying it.
    pub fn add(&mut self, aabb: Aabb, value: usize) {
        self.root = Some(match self.root.take() {
            None => AabbTreeNode::Leaf { aabb, value },
            Some(root) => root.insert(aabb, value),
        });
        self.len += 1;
    }

    /// Returns the number of stored shapes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if nothing was inserted yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the root node, or `None` for an empty tree.
    pub fn root(&self) -> Option<&AabbTreeNode> {
        self.root.as_ref()
    }

    /// Returns the number of levels of the tree, `0` if it is empty.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map_or(0, AabbTreeNode::depth)
    }

    /// Logs the tree in an indented, tree-like visualization.
    pub fn pretty_print(&self) {
        if let Some(root) = &self.root {
            root.pretty_print_at(0);
        }
    }
}
