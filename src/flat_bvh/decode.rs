//! Re-walks a flat buffer the way the traversal kernels see it.

use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};
use crate::flat_bvh::flatten::NodeCounter;
use crate::flat_bvh::{ChildRef, FlatBvh, NodeRecord, RecordPayload};

/// A node recovered from a [`FlatBvh`].
///
/// Leaf records carry no box, so a node's volume is only known through its parent's
/// record (`left_volume` / `right_volume` of a branch).
///
/// [`FlatBvh`]: struct.FlatBvh.html
///
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedNode {
    Leaf {
        /// Post-order identifier, as used in child references.
        identifier: usize,
        /// Index of the record in the buffer.
        position: usize,
        primitive_index: usize,
        primitive_count: usize,
    },
    Branch {
        /// Post-order identifier, as used in child references.
        identifier: usize,
        /// Index of the record in the buffer.
        position: usize,
        left_volume: BoundingVolume,
        right_volume: BoundingVolume,
        left: Box<DecodedNode>,
        right: Box<DecodedNode>,
    },
}

impl DecodedNode {
    /// Returns the identifier the parent's record refers to this node by.
    pub fn identifier(&self) -> usize {
        match *self {
            DecodedNode::Leaf { identifier, .. } | DecodedNode::Branch { identifier, .. } => {
                identifier
            }
        }
    }

    /// Returns the reference a parent record holds for this node.
    pub fn child_ref(&self) -> ChildRef {
        ChildRef::new(self.identifier(), matches!(self, DecodedNode::Leaf { .. }))
    }

    /// Returns the number of primitives below this node.
    pub fn primitive_count(&self) -> usize {
        match self {
            DecodedNode::Leaf {
                primitive_count, ..
            } => *primitive_count,
            DecodedNode::Branch { left, right, .. } => {
                left.primitive_count() + right.primitive_count()
            }
        }
    }
}

/// Pending work of the decoding walk.
enum Step {
    /// Decode the subtree whose root record is the next one to read.
    Enter,
    /// Both subtrees of the branch at `position` are decoded.
    Finish {
        position: usize,
        left_volume: BoundingVolume,
        left: ChildRef,
        right_volume: BoundingVolume,
        right: ChildRef,
    },
}

/// Decodes the tree starting at the first record. Returns the root and the number of
/// records it spans.
fn decode_records(records: &[NodeRecord], counter: &mut NodeCounter) -> Result<(DecodedNode, usize)> {
    let mut steps = vec![Step::Enter];
    let mut decoded: Vec<DecodedNode> = Vec::new();
    let mut position = 0;

    while let Some(step) = steps.pop() {
        match step {
            Step::Enter => {
                let record = records.get(position).ok_or_else(|| {
                    SerializeError::MalformedBuffer(format!(
                        "subtree expected at record {} but the buffer holds {} records",
                        position,
                        records.len()
                    ))
                })?;
                match record.payload()? {
                    RecordPayload::Leaf {
                        primitive_index,
                        primitive_count,
                    } => decoded.push(DecodedNode::Leaf {
                        identifier: counter.next_identifier(),
                        position,
                        primitive_index,
                        primitive_count,
                    }),
                    RecordPayload::Branch {
                        left_volume,
                        left,
                        right_volume,
                        right,
                    } => {
                        steps.push(Step::Finish {
                            position,
                            left_volume,
                            left,
                            right_volume,
                            right,
                        });
                        steps.push(Step::Enter);
                        steps.push(Step::Enter);
                    }
                }
                position += 1;
            }
            Step::Finish {
                position: branch_position,
                left_volume,
                left: left_ref,
                right_volume,
                right: right_ref,
            } => {
                let (right, left) = match (decoded.pop(), decoded.pop()) {
                    (Some(right), Some(left)) => (right, left),
                    _ => {
                        return Err(SerializeError::MalformedBuffer(format!(
                            "branch at record {} is missing a subtree",
                            branch_position
                        )))
                    }
                };
                for (expected, found) in [(left_ref, left.child_ref()), (right_ref, right.child_ref())] {
                    if expected != found {
                        return Err(SerializeError::MalformedBuffer(format!(
                            "branch at record {} references {:?} but its subtree is {:?}",
                            branch_position, expected, found
                        )));
                    }
                }
                decoded.push(DecodedNode::Branch {
                    identifier: counter.next_identifier(),
                    position: branch_position,
                    left_volume,
                    right_volume,
                    left: Box::new(left),
                    right: Box::new(right),
                });
            }
        }
    }

    let root = decoded
        .pop()
        .ok_or_else(|| SerializeError::MalformedBuffer("buffer holds no tree".to_string()))?;
    Ok((root, position))
}

impl FlatBvh {
    /// Rebuilds the tree from the buffer and checks every child reference.
    ///
    /// The walk follows the buffer layout (a node, its left subtree, its right subtree),
    /// recomputes the post-order identifiers the serializer handed out, and fails with
    /// [`SerializeError::MalformedBuffer`] if any encoded reference disagrees or the
    /// records do not form exactly one tree.
    ///
    /// [`SerializeError::MalformedBuffer`]: ../error/enum.SerializeError.html
    ///
    pub fn decode_tree(&self) -> Result<DecodedNode> {
        let records: Vec<NodeRecord> = self.records().collect();
        let mut counter = NodeCounter::default();
        let (root, end) = decode_records(&records, &mut counter)?;
        if end != records.len() {
            return Err(SerializeError::MalformedBuffer(format!(
                "tree ends at record {} but the buffer holds {} records",
                end,
                records.len()
            )));
        }
        if counter.count() != self.node_count() {
            return Err(SerializeError::MalformedBuffer(format!(
                "decoded {} nodes, expected {}",
                counter.count(),
                self.node_count()
            )));
        }
        Ok(root)
    }
}
