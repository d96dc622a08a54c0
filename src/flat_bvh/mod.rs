//! This module flattens a bounding volume hierarchy into a pointer free byte buffer
//! which GPU kernels traverse by index arithmetic alone.
//!
//! The buffer is a sequence of [`NodeRecord`]s of [`NODE_RECORD_SIZE`] bytes each.
//! A record is a leaf if its `nz[0]` equals [`LEAF_SENTINEL`], a branch otherwise.
//! Branches reference their children through sign encoded [`ChildRef`]s.
//!
//! [`NodeRecord`]: struct.NodeRecord.html
//! [`NODE_RECORD_SIZE`]: constant.NODE_RECORD_SIZE.html
//! [`LEAF_SENTINEL`]: constant.LEAF_SENTINEL.html
//! [`ChildRef`]: enum.ChildRef.html
//!

mod decode;
mod flatten;
mod node_record;

pub use self::decode::*;
pub use self::flatten::*;
pub use self::node_record::*;

use crate::error::{Result, SerializeError};

/// A serialized hierarchy: the byte buffer uploaded to the GPU and the number of
/// records it holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatBvh {
    bytes: Vec<u8>,
    node_count: usize,
}

impl FlatBvh {
    pub(crate) fn from_records(records: &[NodeRecord], node_count: usize) -> FlatBvh {
        FlatBvh {
            bytes: bytemuck::cast_slice(records).to_vec(),
            node_count,
        }
    }

    /// Wraps a buffer read back from elsewhere, checking that it holds whole records.
    ///
    /// # Examples
    /// ```
    /// use fluxbvh::flat_bvh::FlatBvh;
    ///
    /// assert!(FlatBvh::from_bytes(vec![0; 112]).is_ok());
    /// assert!(FlatBvh::from_bytes(vec![0; 100]).is_err());
    /// ```
    pub fn from_bytes(bytes: Vec<u8>) -> Result<FlatBvh> {
        if bytes.len() % NODE_RECORD_SIZE != 0 {
            return Err(SerializeError::MalformedBuffer(format!(
                "buffer length {} is not a multiple of {}",
                bytes.len(),
                NODE_RECORD_SIZE
            )));
        }
        let node_count = bytes.len() / NODE_RECORD_SIZE;
        Ok(FlatBvh { bytes, node_count })
    }

    /// Returns the number of records in the buffer.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Returns the size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if the buffer holds no record.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Returns the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Splits into the buffer and the node count.
    pub fn into_parts(self) -> (Vec<u8>, usize) {
        (self.bytes, self.node_count)
    }

    /// Returns the record stored at `position` (not at an identifier, see
    /// [`serialize_tree`]).
    ///
    /// [`serialize_tree`]: fn.serialize_tree.html
    ///
    pub fn record(&self, position: usize) -> Option<NodeRecord> {
        let start = position.checked_mul(NODE_RECORD_SIZE)?;
        let end = start.checked_add(NODE_RECORD_SIZE)?;
        let bytes = self.bytes.get(start..end)?;
        NodeRecord::from_bytes(bytes).ok()
    }

    /// Iterates over the records in buffer order.
    pub fn records(&self) -> impl Iterator<Item = NodeRecord> + '_ {
        self.bytes
            .chunks_exact(NODE_RECORD_SIZE)
            .map(bytemuck::pod_read_unaligned::<NodeRecord>)
    }

    /// Logs a textual representation of the buffer, one line per record.
    pub fn pretty_print(&self) {
        for (position, record) in self.records().enumerate() {
            match record.payload() {
                Ok(RecordPayload::Leaf {
                    primitive_index,
                    primitive_count,
                }) => log::info!(
                    "{}\tleaf\tprimitive {}\tcount {}",
                    position,
                    primitive_index,
                    primitive_count
                ),
                Ok(RecordPayload::Branch { left, right, .. }) => {
                    log::info!("{}\tbranch\tleft {:?}\tright {:?}", position, left, right)
                }
                Err(err) => log::info!("{}\t{}", position, err),
            }
        }
    }
}
