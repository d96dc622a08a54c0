//! Common utilities shared by unit tests.
#![cfg(test)]

use nalgebra::{Point3, Vector3};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::Rng;

use crate::aabb::{Aabb, Bounded};
use crate::bounding_hierarchy::HierarchyTree;
use crate::bounding_volume::BoundingVolume;
use crate::flat_bvh::LEAF_SENTINEL;
use crate::serializer::TriangleMesh;

/// Routes the crate's log output through the test harness. Safe to call repeatedly.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A vector represented as a tuple
pub type TupleVec = (f32, f32, f32);

/// Generate a `TupleVec` for [`proptest::strategy::Strategy`] from -10e10 to 10e10
/// A small enough range to prevent most fp32 errors from breaking certain tests
pub fn tuplevec_small_strategy() -> impl Strategy<Value = TupleVec> {
    (
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
        -10e10_f32..10e10_f32,
    )
}

/// Convert a `TupleVec` to a [`Point3`].
pub fn tuple_to_point(tpl: &TupleVec) -> Point3<f32> {
    Point3::new(tpl.0, tpl.1, tpl.2)
}

/// A hand built hierarchy, independent of any real backend.
#[derive(Debug, Clone)]
pub enum TestNode {
    Leaf {
        value: usize,
        volume: BoundingVolume,
    },
    Branch {
        left: Box<TestNode>,
        right: Box<TestNode>,
        volume: BoundingVolume,
    },
}

impl TestNode {
    pub fn branch(left: TestNode, right: TestNode) -> TestNode {
        TestNode::Branch {
            volume: left.bounding_volume().union(&right.bounding_volume()),
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn node_count(&self) -> usize {
        match self {
            TestNode::Leaf { .. } => 1,
            TestNode::Branch { left, right, .. } => 1 + left.node_count() + right.node_count(),
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            TestNode::Leaf { .. } => 1,
            TestNode::Branch { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }
}

impl HierarchyTree for TestNode {
    fn is_leaf(&self) -> bool {
        matches!(self, TestNode::Leaf { .. })
    }

    fn bounding_volume(&self) -> BoundingVolume {
        match self {
            TestNode::Leaf { volume, .. } | TestNode::Branch { volume, .. } => *volume,
        }
    }

    fn left(&self) -> Option<&Self> {
        match self {
            TestNode::Branch { left, .. } => Some(left.as_ref()),
            TestNode::Leaf { .. } => None,
        }
    }

    fn right(&self) -> Option<&Self> {
        match self {
            TestNode::Branch { right, .. } => Some(right.as_ref()),
            TestNode::Leaf { .. } => None,
        }
    }

    fn value(&self) -> Option<usize> {
        match *self {
            TestNode::Leaf { value, .. } => Some(value),
            TestNode::Branch { .. } => None,
        }
    }
}

/// Children are released one at a time, so dropping a deep tree cannot overflow the stack.
impl Drop for TestNode {
    fn drop(&mut self) {
        fn detach(node: &mut TestNode, pending: &mut Vec<TestNode>) {
            if let TestNode::Branch { left, right, .. } = node {
                let empty = || leaf(0, (0.0, 0.0, 0.0, 0.0, 0.0, 0.0));
                pending.push(std::mem::replace(left.as_mut(), empty()));
                pending.push(std::mem::replace(right.as_mut(), empty()));
            }
        }

        let mut pending = Vec::new();
        detach(self, &mut pending);
        while let Some(mut node) = pending.pop() {
            detach(&mut node, &mut pending);
        }
    }
}

/// Builds a tree in which every branch has a leaf on its right, `leaves` leaves in total.
/// Leaf `i` sits `leaves - i` levels below the root.
pub fn comb_tree(leaves: usize) -> TestNode {
    let mut tree = leaf(0, (0.0, 1.0, 0.0, 1.0, 0.0, 1.0));
    for value in 1..leaves {
        let x = value as f32;
        tree = TestNode::branch(tree, leaf(value, (x, x + 1.0, 0.0, 1.0, 0.0, 1.0)));
    }
    tree
}

/// Creates a leaf from its value and its six limits in wire order.
pub fn leaf(value: usize, limits: (f32, f32, f32, f32, f32, f32)) -> TestNode {
    let (x_min, x_max, y_min, y_max, z_min, z_max) = limits;
    TestNode::Leaf {
        value,
        volume: BoundingVolume::new(x_min, x_max, y_min, y_max, z_min, z_max),
    }
}

/// Nodes which break the leaf/branch contract of [`HierarchyTree`].
#[derive(Debug)]
pub enum BrokenNode {
    LeafWithoutValue,
    BranchWithoutRight,
}

impl HierarchyTree for BrokenNode {
    fn is_leaf(&self) -> bool {
        matches!(self, BrokenNode::LeafWithoutValue)
    }

    fn bounding_volume(&self) -> BoundingVolume {
        BoundingVolume::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0)
    }

    fn left(&self) -> Option<&Self> {
        match self {
            BrokenNode::BranchWithoutRight => Some(&BrokenNode::LeafWithoutValue),
            BrokenNode::LeafWithoutValue => None,
        }
    }

    fn right(&self) -> Option<&Self> {
        None
    }

    fn value(&self) -> Option<usize> {
        None
    }
}

/// Generates a box around the origin. About one box in four starts exactly on the leaf
/// sentinel along the z axis.
pub fn arb_volume() -> impl Strategy<Value = BoundingVolume> {
    let z_min = prop_oneof![
        3 => -1000.0_f32..1000.0,
        1 => Just(LEAF_SENTINEL),
    ];
    (
        -1000.0_f32..1000.0,
        -1000.0_f32..1000.0,
        z_min,
        0.0_f32..100.0,
        0.0_f32..100.0,
        0.0_f32..100.0,
    )
        .prop_map(|(x, y, z, dx, dy, dz)| BoundingVolume::new(x, x + dx, y, y + dy, z, z + dz))
}

/// Generates arbitrarily shaped trees of up to 64 leaves.
pub fn arb_tree() -> impl Strategy<Value = TestNode> {
    let leaf = (0usize..10_000, arb_volume())
        .prop_map(|(value, volume)| TestNode::Leaf { value, volume });
    leaf.prop_recursive(8, 64, 2, |inner| {
        (inner.clone(), inner).prop_map(|(left, right)| TestNode::branch(left, right))
    })
}

/// Builds a random tree with exactly `leaves` leaves, valued `0..leaves` from left to right.
pub fn random_tree(rng: &mut StdRng, leaves: usize) -> TestNode {
    fn build(rng: &mut StdRng, first: usize, count: usize) -> TestNode {
        if count == 1 {
            let x = rng.random_range(0.0_f32..100.0);
            let y = rng.random_range(0.0_f32..100.0);
            let z = rng.random_range(0.0_f32..100.0);
            return TestNode::Leaf {
                value: first,
                volume: BoundingVolume::new(x, x + 1.0, y, y + 1.0, z, z + 1.0),
            };
        }
        let left_count = rng.random_range(1..count);
        let left = build(rng, first, left_count);
        let right = build(rng, first + left_count, count - left_count);
        TestNode::branch(left, right)
    }
    build(rng, 0, leaves)
}

/// Define some [`Bounded`] structure.
pub struct UnitBox {
    pub id: i32,
    pub pos: Point3<f32>,
}

impl UnitBox {
    pub fn new(id: i32, pos: Point3<f32>) -> UnitBox {
        UnitBox { id, pos }
    }
}

/// `UnitBox`'s [`Aabb`]s are unit [`Aabb`]s centered on the box's position.
impl Bounded for UnitBox {
    fn aabb(&self) -> Aabb {
        let min = self.pos + Vector3::new(-0.5, -0.5, -0.5);
        let max = self.pos + Vector3::new(0.5, 0.5, 0.5);
        Aabb::with_bounds(min, max)
    }
}

/// Generate 21 `UnitBox`s along the X axis centered on whole numbers (-10,9,..,10).
/// The index is set to the rounded x-coordinate of the box center.
pub fn generate_aligned_boxes() -> Vec<UnitBox> {
    // Create 21 boxes along the x-axis
    let mut shapes = Vec::new();
    for x in -10..11 {
        shapes.push(UnitBox::new(x, Point3::new(x as f32, 0.0, 0.0)));
    }
    shapes
}

/// A tetrahedron with one corner at the origin and one at `(1, 1, 1)`.
pub fn tetrahedron() -> TriangleMesh {
    TriangleMesh::new(
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 1.0),
        ],
        vec![[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]],
    )
}
