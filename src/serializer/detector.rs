//! Detector records: each primitive group's slice of the measurement array.

use bytemuck::{Pod, Zeroable};

use crate::error::{Result, SerializeError};
use crate::utils::to_wire_index;

/// Kernel side `Detector`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct DetectorRecord {
    /// First measurement of the group.
    pub offset: i32,
    /// Number of measurements of the group.
    pub count: i32,
}

/// The detector buffer and the size of the measurement array it indexes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorBuffers {
    pub bytes: Vec<u8>,
    /// The measurement array holds `1 << measurement_bits` entries.
    pub measurement_bits: u32,
}

impl DetectorBuffers {
    /// Returns the number of entries of the measurement array.
    pub fn measurement_count(&self) -> usize {
        1 << self.measurement_bits
    }

    /// Iterates over the detector records.
    pub fn records(&self) -> impl Iterator<Item = DetectorRecord> + '_ {
        self.bytes
            .chunks_exact(std::mem::size_of::<DetectorRecord>())
            .map(bytemuck::pod_read_unaligned::<DetectorRecord>)
    }
}

/// Returns `ceil(log2(n))`, at least 1.
fn measurement_bits(n: usize) -> u32 {
    let bits = usize::BITS - n.saturating_sub(1).leading_zeros();
    bits.max(1)
}

/// Splits a power of two sized measurement array between the primitive groups.
///
/// Every group gets one measurement, and the rest is shared in proportion to the
/// group areas. The array has at least `max(group count, min_measurements)` entries.
///
/// # Examples
/// ```
/// use fluxbvh::serializer::serialize_detectors;
///
/// let detectors = serialize_detectors(&[1.0, 3.0], 8).unwrap();
/// assert_eq!(detectors.measurement_bits, 3);
/// let counts: Vec<i32> = detectors.records().map(|d| d.count).collect();
/// assert_eq!(counts, vec![2, 5]);
/// ```
pub fn serialize_detectors(group_areas: &[f32], min_measurements: usize) -> Result<DetectorBuffers> {
    if group_areas.is_empty() {
        return Err(SerializeError::EmptyCollection("detector"));
    }

    let dimensions = group_areas.len();
    let bits = measurement_bits(dimensions.max(min_measurements));
    let total = 1_usize
        .checked_shl(bits)
        .ok_or(SerializeError::IndexOverflow(dimensions.max(min_measurements)))?;
    let shared = (total - dimensions) as f64;
    let total_area: f64 = group_areas.iter().map(|&area| f64::from(area)).sum();

    let mut records = Vec::with_capacity(dimensions);
    let mut offset = 0_usize;
    for &area in group_areas {
        let share = if total_area > 0.0 {
            (f64::from(area) / total_area * shared).floor() as usize
        } else {
            0
        };
        let count = share + 1;
        records.push(DetectorRecord {
            offset: to_wire_index(offset)?,
            count: to_wire_index(count)?,
        });
        offset += count;
    }

    log::debug!(
        "serialized {} detectors over {} measurements",
        records.len(),
        total
    );
    Ok(DetectorBuffers {
        bytes: bytemuck::cast_slice(&records).to_vec(),
        measurement_bits: bits,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_measurement_bits() {
        assert_eq!(measurement_bits(1), 1);
        assert_eq!(measurement_bits(2), 1);
        assert_eq!(measurement_bits(3), 2);
        assert_eq!(measurement_bits(4), 2);
        assert_eq!(measurement_bits(5), 3);
        assert_eq!(measurement_bits(1024), 10);
    }

    #[test]
    fn test_single_group_takes_everything() {
        let detectors = serialize_detectors(&[5.0], 1).unwrap();
        assert_eq!(detectors.measurement_count(), 2);
        let records: Vec<_> = detectors.records().collect();
        assert_eq!(records, vec![DetectorRecord { offset: 0, count: 2 }]);
        assert_eq!(detectors.bytes.len(), 8);
    }

    #[test]
    fn test_offsets_are_running_sums() {
        let detectors = serialize_detectors(&[1.0, 1.0, 2.0], 16).unwrap();
        let records: Vec<_> = detectors.records().collect();
        // 13 shared measurements: floor(3.25) + 1, floor(3.25) + 1, floor(6.5) + 1.
        assert_eq!(
            records,
            vec![
                DetectorRecord { offset: 0, count: 4 },
                DetectorRecord { offset: 4, count: 4 },
                DetectorRecord { offset: 8, count: 7 },
            ]
        );
    }

    #[test]
    fn test_no_groups() {
        assert_eq!(
            serialize_detectors(&[], 1),
            Err(SerializeError::EmptyCollection("detector"))
        );
    }

    proptest! {
        // Detectors never overlap and never run past the measurement array.
        #[test]
        fn test_detectors_fit_measurements(
            areas in prop::collection::vec(0.00001_f32..1000.0, 1..64),
            min_measurements in 1_usize..4096,
        ) {
            let detectors = serialize_detectors(&areas, min_measurements).unwrap();
            let mut expected_offset = 0;
            for record in detectors.records() {
                prop_assert_eq!(record.offset, expected_offset);
                prop_assert!(record.count >= 1);
                expected_offset += record.count;
            }
            prop_assert!(expected_offset as usize <= detectors.measurement_count());
            prop_assert!(detectors.measurement_count() >= areas.len().max(min_measurements));
        }
    }
}
