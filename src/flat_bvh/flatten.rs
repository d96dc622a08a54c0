//! Flattens a [`HierarchyTree`] into a buffer of [`NodeRecord`]s.
//!
//! [`HierarchyTree`]: ../bounding_hierarchy/trait.HierarchyTree.html
//! [`NodeRecord`]: struct.NodeRecord.html
//!

use bytemuck::Zeroable;
use log::{debug, trace};

use crate::aabb_tree::AabbTree;
use crate::bounding_hierarchy::{HierarchyNode, HierarchyTree};
use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};
use crate::flat_bvh::{ChildRef, FlatBvh, NodeRecord};

/// Hands out node identifiers in the order in which nodes finish flattening.
///
/// A node is finished once its whole left subtree, then its whole right subtree, are
/// finished, so identifiers follow a post-order numbering of the tree, starting at `0`.
/// One counter lives exactly as long as one call to [`serialize_tree`].
///
/// [`serialize_tree`]: fn.serialize_tree.html
///
#[derive(Debug, Default)]
pub(crate) struct NodeCounter {
    count: usize,
}

impl NodeCounter {
    /// Counts one more finished node and returns its identifier.
    pub(crate) fn next_identifier(&mut self) -> usize {
        let identifier = self.count;
        self.count += 1;
        identifier
    }

    /// Returns the number of finished nodes.
    pub(crate) fn count(&self) -> usize {
        self.count
    }
}

/// What a parent needs to know about a flattened child.
#[derive(Debug, Copy, Clone)]
struct FlattenedSubtree {
    identifier: usize,
    is_leaf: bool,
    volume: BoundingVolume,
    primitive_count: usize,
}

impl FlattenedSubtree {
    fn child_ref(&self) -> ChildRef {
        ChildRef::new(self.identifier, self.is_leaf)
    }
}

/// Pending work of the flattening walk.
enum Step<'a, H: ?Sized> {
    /// Write the record of this node, or reserve its slot if it is a branch.
    Enter(&'a H),
    /// Both subtrees of the branch reserved at `slot` are done.
    Finish { slot: usize, volume: BoundingVolume },
}

/// Flattens the tree rooted at `root`, appending its records to `records`.
///
/// Records are laid out in pre-order: a branch reserves a zeroed slot before descending
/// and fills it in once both children are known. The walk keeps its own stack, so the
/// depth of the tree is only bounded by memory.
fn flatten_nodes<'a, H: HierarchyTree + ?Sized>(
    root: &'a H,
    records: &mut Vec<NodeRecord>,
    counter: &mut NodeCounter,
) -> Result<FlattenedSubtree> {
    let mut steps = vec![Step::Enter(root)];
    let mut finished: Vec<FlattenedSubtree> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter(node) => match node.classify()? {
                HierarchyNode::Leaf {
                    primitive_index,
                    volume,
                } => {
                    volume.validate()?;
                    records.push(NodeRecord::leaf(primitive_index, 1)?);
                    let identifier = counter.next_identifier();
                    trace!(
                        "leaf {} at record {} covers primitive {}",
                        identifier,
                        records.len() - 1,
                        primitive_index
                    );
                    finished.push(FlattenedSubtree {
                        identifier,
                        is_leaf: true,
                        volume,
                        primitive_count: 1,
                    });
                }
                HierarchyNode::Branch {
                    left,
                    right,
                    volume,
                } => {
                    volume.validate()?;
                    steps.push(Step::Finish {
                        slot: records.len(),
                        volume,
                    });
                    records.push(NodeRecord::zeroed());
                    // Popped left first, so the left subtree is written first.
                    steps.push(Step::Enter(right));
                    steps.push(Step::Enter(left));
                }
            },
            Step::Finish { slot, volume } => {
                let (right, left) = match (finished.pop(), finished.pop()) {
                    (Some(right), Some(left)) => (right, left),
                    _ => {
                        return Err(SerializeError::InvalidNode(format!(
                            "branch at record {} finished without two subtrees",
                            slot
                        )))
                    }
                };
                records[slot] = NodeRecord::branch(
                    &left.volume,
                    left.child_ref(),
                    &right.volume,
                    right.child_ref(),
                )?;
                let identifier = counter.next_identifier();
                trace!(
                    "branch {} at record {} references {:?} and {:?}",
                    identifier,
                    slot,
                    left.child_ref(),
                    right.child_ref()
                );
                finished.push(FlattenedSubtree {
                    identifier,
                    is_leaf: false,
                    volume,
                    primitive_count: left.primitive_count + right.primitive_count,
                });
            }
        }
    }

    finished
        .pop()
        .ok_or_else(|| SerializeError::InvalidNode("hierarchy produced no root".to_string()))
}

/// Serializes a whole hierarchy into the flat binary format read by the GPU kernels.
///
/// Every node becomes one 56 byte [`NodeRecord`]. The records are written in
/// pre-order (a node, then its left subtree, then its right subtree) while the
/// identifiers used in child references are assigned in post-order. Both orders are
/// part of the format the kernels were written against.
///
/// On error no partial buffer is returned.
///
/// # Examples
/// ```
/// use fluxbvh::aabb::Aabb;
/// use fluxbvh::aabb_tree::AabbTree;
/// use fluxbvh::flat_bvh::{serialize_tree, NODE_RECORD_SIZE};
/// use nalgebra::Point3;
///
/// let mut tree = AabbTree::new();
/// tree.add(Aabb::with_bounds(Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)), 0);
/// tree.add(Aabb::with_bounds(Point3::new(1.0, 1.0, 1.0), Point3::new(2.0, 2.0, 2.0)), 1);
///
/// let flat = serialize_tree(tree.root().unwrap()).unwrap();
/// assert_eq!(flat.node_count(), 3);
/// assert_eq!(flat.as_bytes().len(), 3 * NODE_RECORD_SIZE);
/// ```
///
/// [`NodeRecord`]: struct.NodeRecord.html
///
pub fn serialize_tree<H: HierarchyTree + ?Sized>(tree: &H) -> Result<FlatBvh> {
    let mut records = Vec::new();
    let mut counter = NodeCounter::default();
    let root = flatten_nodes(tree, &mut records, &mut counter)?;

    let flat = FlatBvh::from_records(&records, counter.count());
    debug!(
        "serialized hierarchy: {} nodes covering {} primitives, {} bytes",
        flat.node_count(),
        root.primitive_count,
        flat.len()
    );
    Ok(flat)
}

impl AabbTree {
    /// Serializes this tree with [`serialize_tree`].
    ///
    /// Fails with [`SerializeError::EmptyCollection`] if nothing was inserted, since the
    /// kernels need at least a root record.
    ///
    /// [`serialize_tree`]: ../flat_bvh/fn.serialize_tree.html
    /// [`SerializeError::EmptyCollection`]: ../error/enum.SerializeError.html
    ///
    pub fn flatten(&self) -> Result<FlatBvh> {
        match self.root() {
            Some(root) => {
                debug!("flattening {} shapes, {} levels deep", self.len(), self.depth());
                serialize_tree(root)
            }
            None => Err(SerializeError::EmptyCollection("hierarchy")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flat_bvh::{RecordPayload, LEAF_SENTINEL, NODE_RECORD_SIZE};
    use crate::aabb::Aabb;
    use crate::flat_bvh::DecodedNode;
    use crate::testbase::{
        arb_tree, comb_tree, generate_aligned_boxes, init_logger, leaf, random_tree, BrokenNode,
        TestNode,
    };
    use nalgebra::Point3;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_leaf_tree() -> TestNode {
        TestNode::branch(
            leaf(0, (0.0, 1.0, 0.0, 1.0, 0.0, 1.0)),
            leaf(1, (1.0, 2.0, 1.0, 2.0, 1.0, 2.0)),
        )
    }

    #[test]
    fn test_single_leaf() {
        let flat = serialize_tree(&leaf(9, (0.0, 1.0, 0.0, 1.0, 0.0, 1.0))).unwrap();
        assert_eq!(flat.node_count(), 1);
        let bytes = flat.as_bytes();
        assert_eq!(bytes.len(), NODE_RECORD_SIZE);
        assert_eq!(
            f32::from_ne_bytes(bytes[16..20].try_into().unwrap()),
            LEAF_SENTINEL
        );
        assert_eq!(i32::from_ne_bytes(bytes[48..52].try_into().unwrap()), 9);
        assert_eq!(i32::from_ne_bytes(bytes[52..56].try_into().unwrap()), 1);
    }

    #[test]
    fn test_two_leaves() {
        let flat = serialize_tree(&two_leaf_tree()).unwrap();
        assert_eq!(flat.node_count(), 3);

        let root = flat.record(0).unwrap();
        assert_eq!(root.value1, -1);
        assert_eq!(root.value2, -2);
        assert_eq!(root.n0xy, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(root.nz, [0.0, 1.0, 1.0, 2.0]);
        assert_eq!(root.n1xy, [1.0, 2.0, 1.0, 2.0]);

        // The leaves follow their parent, left before right.
        assert_eq!(flat.record(1).unwrap().value1, 0);
        assert_eq!(flat.record(2).unwrap().value1, 1);
    }

    /// Records are laid out in pre-order while identifiers are handed out in post-order,
    /// so for a branch with a non-trivial right subtree, `identifier * 56` is not the
    /// byte offset of the referenced record. This pins the layout the kernels were
    /// written against; confirm it against the consumer before changing either order.
    #[test]
    fn test_preorder_layout_with_postorder_identifiers() {
        //        root
        //       /    \
        //    leaf 0   b
        //            / \
        //       leaf 1  leaf 2
        let tree = TestNode::branch(
            leaf(0, (0.0, 1.0, 0.0, 1.0, 0.0, 1.0)),
            TestNode::branch(
                leaf(1, (1.0, 2.0, 1.0, 2.0, 1.0, 2.0)),
                leaf(2, (2.0, 3.0, 2.0, 3.0, 2.0, 3.0)),
            ),
        );
        let flat = serialize_tree(&tree).unwrap();
        assert_eq!(flat.node_count(), 5);

        // Pre-order bytes: root, leaf 0, b, leaf 1, leaf 2.
        let records: Vec<NodeRecord> = flat.records().collect();
        assert!(!records[0].is_leaf());
        assert!(records[1].is_leaf() && records[1].value1 == 0);
        assert!(!records[2].is_leaf());
        assert!(records[3].is_leaf() && records[3].value1 == 1);
        assert!(records[4].is_leaf() && records[4].value1 == 2);

        // Post-order identifiers: leaf 0 -> 0, leaf 1 -> 1, leaf 2 -> 2, b -> 3, root -> 4.
        assert_eq!(ChildRef::decode(records[0].value1), ChildRef::Leaf(0));
        assert_eq!(ChildRef::decode(records[0].value2), ChildRef::Branch(3));
        assert_eq!(ChildRef::decode(records[2].value1), ChildRef::Leaf(1));
        assert_eq!(ChildRef::decode(records[2].value2), ChildRef::Leaf(2));

        // Branch 3 sits at record 2, not record 3.
        assert!(records[3].is_leaf());
    }

    #[test]
    fn test_nan_volume_fails_without_partial_buffer() {
        let tree = TestNode::branch(
            leaf(0, (0.0, 1.0, 0.0, 1.0, 0.0, 1.0)),
            leaf(1, (1.0, f32::NAN, 1.0, 2.0, 1.0, 2.0)),
        );
        let result = serialize_tree(&tree);
        assert!(matches!(
            result,
            Err(SerializeError::InvalidBoundingVolume { .. })
        ));

        let lone = leaf(0, (0.0, 1.0, f32::INFINITY, 1.0, 0.0, 1.0));
        assert!(matches!(
            serialize_tree(&lone),
            Err(SerializeError::InvalidBoundingVolume { .. })
        ));
    }

    #[test]
    fn test_broken_node_is_rejected() {
        assert!(matches!(
            serialize_tree(&BrokenNode::BranchWithoutRight),
            Err(SerializeError::InvalidNode(_))
        ));
        assert!(matches!(
            serialize_tree(&BrokenNode::LeafWithoutValue),
            Err(SerializeError::InvalidNode(_))
        ));
    }

    #[test]
    fn test_independent_calls_start_from_zero() {
        let tree = two_leaf_tree();
        let first = serialize_tree(&tree).unwrap();
        let second = serialize_tree(&tree).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_flatten_aabb_tree() {
        let boxes = generate_aligned_boxes();
        let tree = AabbTree::from_shapes(&boxes);
        let flat = tree.flatten().unwrap();
        assert_eq!(flat.node_count(), 2 * boxes.len() - 1);

        let mut primitives: Vec<usize> = flat
            .records()
            .filter_map(|record| match record.payload().unwrap() {
                RecordPayload::Leaf {
                    primitive_index, ..
                } => Some(primitive_index),
                RecordPayload::Branch { .. } => None,
            })
            .collect();
        primitives.sort_unstable();
        assert_eq!(primitives, (0..boxes.len()).collect::<Vec<_>>());

        assert!(matches!(
            AabbTree::new().flatten(),
            Err(SerializeError::EmptyCollection(_))
        ));
    }

    #[test]
    fn test_large_random_tree() {
        init_logger();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = random_tree(&mut rng, 1_000);
        let flat = serialize_tree(&tree).unwrap();
        assert_eq!(flat.node_count(), 1_999);
        assert_eq!(flat.len(), 1_999 * NODE_RECORD_SIZE);
        flat.decode_tree().unwrap();
        flat.pretty_print();
    }

    #[test]
    fn test_left_child_on_sentinel_stays_branch() {
        let tree = TestNode::branch(
            leaf(0, (0.0, 1.0, 0.0, 1.0, LEAF_SENTINEL, 1.0)),
            leaf(1, (1.0, 2.0, 1.0, 2.0, LEAF_SENTINEL, 2.0)),
        );
        let flat = serialize_tree(&tree).unwrap();
        let root = flat.record(0).unwrap();
        assert!(!root.is_leaf());
        assert!(root.nz[0] < LEAF_SENTINEL);
        assert_eq!(root.nz[0], f32::from_bits(LEAF_SENTINEL.to_bits() + 1));
        // Only the left z_min moves.
        assert_eq!(root.nz[1..], [1.0, LEAF_SENTINEL, 2.0]);

        match flat.decode_tree().unwrap() {
            DecodedNode::Branch {
                left_volume,
                right_volume,
                ..
            } => {
                assert!(left_volume.z_min < LEAF_SENTINEL);
                assert_eq!(right_volume.z_min, LEAF_SENTINEL);
            }
            DecodedNode::Leaf { .. } => panic!("root decoded as a leaf"),
        }
    }

    #[test]
    fn test_deep_tree_is_flattened_without_recursion() {
        let leaves = 200_000;
        let tree = comb_tree(leaves);
        let flat = serialize_tree(&tree).unwrap();
        assert_eq!(flat.node_count(), 2 * leaves - 1);

        // The deepest pair comes right after the chain of branches above it.
        let records: Vec<NodeRecord> = flat.records().collect();
        assert!(records[..leaves - 1].iter().all(|record| !record.is_leaf()));
        assert_eq!(records[leaves - 1].value1, 0);
        assert_eq!(records[leaves].value1, 1);
        assert_eq!(records[leaves - 2].value1, ChildRef::Leaf(0).encode().unwrap());
        // The root finishes last and refers to the last leaf.
        assert_eq!(
            ChildRef::decode(records[0].value2),
            ChildRef::Leaf(2 * leaves - 3)
        );
        assert_eq!(records[2 * leaves - 2].value1, (leaves - 1) as i32);
    }

    #[test]
    fn test_flatten_sorted_boxes() {
        init_logger();
        let count = 100_000;
        let mut tree = AabbTree::new();
        for x in 0..count {
            let min = Point3::new(x as f32, 0.0, 0.0);
            let max = Point3::new(x as f32 + 1.0, 1.0, 1.0);
            tree.add(Aabb::with_bounds(min, max), x);
        }
        let flat = tree.flatten().unwrap();
        assert_eq!(flat.node_count(), 2 * count - 1);

        let root = flat.decode_tree().unwrap();
        assert_eq!(root.primitive_count(), count);
    }

    proptest! {
        // The buffer always holds exactly one record per node.
        #[test]
        fn test_buffer_length_matches_node_count(tree in arb_tree()) {
            let flat = serialize_tree(&tree).unwrap();
            prop_assert_eq!(flat.node_count(), tree.node_count());
            prop_assert_eq!(flat.len(), flat.node_count() * NODE_RECORD_SIZE);
        }

        // No branch record may carry the leaf sentinel.
        #[test]
        fn test_branch_records_are_not_leaves(tree in arb_tree()) {
            let flat = serialize_tree(&tree).unwrap();
            let leaves = flat.records().filter(NodeRecord::is_leaf).count();
            prop_assert_eq!(leaves, tree.leaf_count());
        }
    }
}
