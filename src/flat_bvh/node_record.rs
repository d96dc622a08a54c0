//! The fixed size record every hierarchy node is encoded into.

use bytemuck::{Pod, Zeroable};

use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};
use crate::utils::to_wire_index;

/// Size in bytes of one [`NodeRecord`], for leaves and branches alike.
///
/// [`NodeRecord`]: struct.NodeRecord.html
///
pub const NODE_RECORD_SIZE: usize = 56;

/// Value written into all twelve box slots of a leaf record. Kernels test `nz[0]`
/// against it to tell leaves from branches.
pub const LEAF_SENTINEL: f32 = -1.0;

const SENTINEL_GROUP: [f32; 4] = [LEAF_SENTINEL; 4];

/// One node of a flat hierarchy, laid out exactly as the traversal kernels read it.
///
/// A branch packs the boxes of both of its children into the three float groups:
///
/// ```text
/// n0xy = [L.x_min, L.x_max, L.y_min, L.y_max]
/// nz   = [L.z_min, L.z_max, R.z_min, R.z_max]
/// n1xy = [R.x_min, R.x_max, R.y_min, R.y_max]
/// ```
///
/// and stores the sign encoded [`ChildRef`]s of its children in `value1` and `value2`.
/// A leaf fills the float groups with [`LEAF_SENTINEL`] and stores the primitive
/// index and primitive count in `value1` and `value2`.
///
/// [`ChildRef`]: enum.ChildRef.html
/// [`LEAF_SENTINEL`]: constant.LEAF_SENTINEL.html
///
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct NodeRecord {
    pub n0xy: [f32; 4],
    pub nz: [f32; 4],
    pub n1xy: [f32; 4],
    pub value1: i32,
    pub value2: i32,
}

const _: () = assert!(std::mem::size_of::<NodeRecord>() == NODE_RECORD_SIZE);

/// A reference from a branch record to one of its children.
///
/// The kind of the child is carried by the sign of the encoded value: branches are
/// referenced by their identifier, leaves by `-identifier - 1` so that leaf `0` does
/// not collide with branch `0`.
///
/// # Examples
/// ```
/// use fluxbvh::flat_bvh::ChildRef;
///
/// assert_eq!(ChildRef::Leaf(0).encode().unwrap(), -1);
/// assert_eq!(ChildRef::Branch(0).encode().unwrap(), 0);
/// assert_eq!(ChildRef::decode(-5), ChildRef::Leaf(4));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ChildRef {
    /// The child is a branch with this identifier.
    Branch(usize),
    /// The child is a leaf with this identifier.
    Leaf(usize),
}

impl ChildRef {
    /// Creates the reference for a child with the given identifier.
    pub fn new(identifier: usize, is_leaf: bool) -> ChildRef {
        if is_leaf {
            ChildRef::Leaf(identifier)
        } else {
            ChildRef::Branch(identifier)
        }
    }

    /// Returns the sign encoded 32 bit value stored in a branch record.
    pub fn encode(self) -> Result<i32> {
        match self {
            ChildRef::Branch(identifier) => to_wire_index(identifier),
            ChildRef::Leaf(identifier) => Ok(-to_wire_index(identifier)? - 1),
        }
    }

    /// Inverse of [`ChildRef::encode`].
    ///
    /// [`ChildRef::encode`]: enum.ChildRef.html#method.encode
    ///
    pub fn decode(encoded: i32) -> ChildRef {
        if encoded >= 0 {
            ChildRef::Branch(encoded as usize)
        } else {
            // `-1 - encoded` cannot overflow, even for `i32::MIN`.
            ChildRef::Leaf((-1 - encoded) as usize)
        }
    }

    /// Returns the identifier regardless of the child's kind.
    pub fn identifier(self) -> usize {
        match self {
            ChildRef::Branch(identifier) | ChildRef::Leaf(identifier) => identifier,
        }
    }

    /// Returns true if the referenced child is a leaf.
    pub fn is_leaf(self) -> bool {
        matches!(self, ChildRef::Leaf(_))
    }
}

/// The interpretation of a [`NodeRecord`], chosen by its sentinel.
///
/// [`NodeRecord`]: struct.NodeRecord.html
///
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RecordPayload {
    Leaf {
        primitive_index: usize,
        primitive_count: usize,
    },
    Branch {
        left_volume: BoundingVolume,
        left: ChildRef,
        right_volume: BoundingVolume,
        right: ChildRef,
    },
}

/// Moves a `z_min` off the sentinel towards negative infinity.
fn clear_of_sentinel(z_min: f32) -> f32 {
    if z_min == LEAF_SENTINEL {
        // Negative floats grow in magnitude with their bit pattern.
        f32::from_bits(z_min.to_bits() + 1)
    } else {
        z_min
    }
}

impl NodeRecord {
    /// Encodes a leaf covering `primitive_count` primitives starting at `primitive_index`.
    pub fn leaf(primitive_index: usize, primitive_count: usize) -> Result<NodeRecord> {
        Ok(NodeRecord {
            n0xy: SENTINEL_GROUP,
            nz: SENTINEL_GROUP,
            n1xy: SENTINEL_GROUP,
            value1: to_wire_index(primitive_index)?,
            value2: to_wire_index(primitive_count)?,
        })
    }

    /// Encodes a branch from the volumes and references of its two children.
    ///
    /// Fails with [`SerializeError::InvalidBoundingVolume`] if either volume holds a NaN
    /// or an infinite scalar. A left child whose `z_min` is exactly [`LEAF_SENTINEL`] gets
    /// it lowered by one ulp, so the record can never read as a leaf and the box still
    /// encloses the child.
    ///
    /// # Examples
    /// ```
    /// use fluxbvh::bounding_volume::BoundingVolume;
    /// use fluxbvh::flat_bvh::{ChildRef, NodeRecord};
    ///
    /// let left = BoundingVolume::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0);
    /// let right = BoundingVolume::new(1.0, 2.0, 1.0, 2.0, 1.0, 2.0);
    /// let record = NodeRecord::branch(&left, ChildRef::Leaf(0), &right, ChildRef::Leaf(1)).unwrap();
    ///
    /// assert_eq!(record.n0xy, [0.0, 1.0, 0.0, 1.0]);
    /// assert_eq!(record.nz, [0.0, 1.0, 1.0, 2.0]);
    /// assert_eq!(record.n1xy, [1.0, 2.0, 1.0, 2.0]);
    /// assert_eq!((record.value1, record.value2), (-1, -2));
    /// ```
    ///
    /// [`SerializeError::InvalidBoundingVolume`]: ../error/enum.SerializeError.html
    /// [`LEAF_SENTINEL`]: constant.LEAF_SENTINEL.html
    ///
    pub fn branch(
        left_volume: &BoundingVolume,
        left: ChildRef,
        right_volume: &BoundingVolume,
        right: ChildRef,
    ) -> Result<NodeRecord> {
        left_volume.validate()?;
        right_volume.validate()?;

        Ok(NodeRecord {
            n0xy: [
                left_volume.x_min,
                left_volume.x_max,
                left_volume.y_min,
                left_volume.y_max,
            ],
            nz: [
                clear_of_sentinel(left_volume.z_min),
                left_volume.z_max,
                right_volume.z_min,
                right_volume.z_max,
            ],
            n1xy: [
                right_volume.x_min,
                right_volume.x_max,
                right_volume.y_min,
                right_volume.y_max,
            ],
            value1: left.encode()?,
            value2: right.encode()?,
        })
    }

    /// Returns true if this record carries the leaf sentinel.
    pub fn is_leaf(&self) -> bool {
        self.nz[0] == LEAF_SENTINEL
    }

    /// Interprets the record the way a traversal kernel does.
    ///
    /// Leaf payloads with negative index or count cannot come out of [`NodeRecord::leaf`]
    /// and are reported as [`SerializeError::MalformedBuffer`].
    ///
    /// [`NodeRecord::leaf`]: struct.NodeRecord.html#method.leaf
    /// [`SerializeError::MalformedBuffer`]: ../error/enum.SerializeError.html
    ///
    pub fn payload(&self) -> Result<RecordPayload> {
        if self.is_leaf() {
            if self.value1 < 0 || self.value2 < 0 {
                return Err(SerializeError::MalformedBuffer(format!(
                    "leaf record holds negative primitive range ({}, {})",
                    self.value1, self.value2
                )));
            }
            Ok(RecordPayload::Leaf {
                primitive_index: self.value1 as usize,
                primitive_count: self.value2 as usize,
            })
        } else {
            Ok(RecordPayload::Branch {
                left_volume: BoundingVolume::new(
                    self.n0xy[0],
                    self.n0xy[1],
                    self.n0xy[2],
                    self.n0xy[3],
                    self.nz[0],
                    self.nz[1],
                ),
                left: ChildRef::decode(self.value1),
                right_volume: BoundingVolume::new(
                    self.n1xy[0],
                    self.n1xy[1],
                    self.n1xy[2],
                    self.n1xy[3],
                    self.nz[2],
                    self.nz[3],
                ),
                right: ChildRef::decode(self.value2),
            })
        }
    }

    /// Returns the raw bytes of this record.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }

    /// Reads a record from exactly [`NODE_RECORD_SIZE`] bytes. The slice need not be aligned.
    ///
    /// [`NODE_RECORD_SIZE`]: constant.NODE_RECORD_SIZE.html
    ///
    pub fn from_bytes(bytes: &[u8]) -> Result<NodeRecord> {
        if bytes.len() != NODE_RECORD_SIZE {
            return Err(SerializeError::MalformedBuffer(format!(
                "a node record is {} bytes, got {}",
                NODE_RECORD_SIZE,
                bytes.len()
            )));
        }
        Ok(bytemuck::pod_read_unaligned(bytes))
    }
}
