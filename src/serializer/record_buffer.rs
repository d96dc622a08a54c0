//! A byte chain of heterogeneous records and the offset table kernels index it with.

use bytemuck::Pod;

use crate::error::Result;
use crate::utils::to_wire_index;

/// Records appended back to back, each one reachable through its byte offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordBuffer {
    bytes: Vec<u8>,
    offsets: Vec<i32>,
}

impl RecordBuffer {
    pub fn new() -> RecordBuffer {
        RecordBuffer::default()
    }

    /// Appends one plain old data record and returns its byte offset.
    pub fn push<T: Pod>(&mut self, record: &T) -> Result<i32> {
        self.push_bytes(bytemuck::bytes_of(record))
    }

    /// Appends one record given as raw bytes and returns its byte offset.
    pub fn push_bytes(&mut self, record: &[u8]) -> Result<i32> {
        let offset = to_wire_index(self.bytes.len())?;
        // The end of the chain must stay addressable too.
        to_wire_index(self.bytes.len() + record.len())?;
        self.bytes.extend_from_slice(record);
        self.offsets.push(offset);
        Ok(offset)
    }

    /// Appends every record of `other`, shifting its offsets past the current end.
    pub fn append(&mut self, other: RecordBuffer) -> Result<()> {
        let base = self.bytes.len();
        for offset in other.offsets {
            self.offsets.push(to_wire_index(base + offset as usize)?);
        }
        to_wire_index(base + other.bytes.len())?;
        self.bytes.extend(other.bytes);
        Ok(())
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn offsets(&self) -> &[i32] {
        &self.offsets
    }

    /// Splits into the byte chain and the offset table.
    pub fn into_parts(self) -> (Vec<u8>, Vec<i32>) {
        (self.bytes, self.offsets)
    }
}
