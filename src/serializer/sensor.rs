//! Sensors and the hierarchy the kernels find them with.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Vector3};

use crate::aabb::Aabb;
use crate::aabb_tree::AabbTree;
use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};
use crate::flat_bvh::FlatBvh;
use crate::serializer::matrix::Mat34;

/// Size of a [`SensorRecord`] in bytes.
///
/// [`SensorRecord`]: struct.SensorRecord.html
///
pub const SENSOR_RECORD_SIZE: usize = 72;

/// Kernel side `Sensor`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SensorRecord {
    pub group_index: i32,
    pub world_to_object: Mat34,
    /// 1 if the sensor senses on both sides, 0 otherwise.
    pub two_sided: i32,
    /// Sensitivity per color channel.
    pub color: [f32; 3],
    /// Sensitivity distribution parameter.
    pub exponent: f32,
}

const _: () = assert!(std::mem::size_of::<SensorRecord>() == SENSOR_RECORD_SIZE);

/// A sensor waiting to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Sensor {
    pub group_index: i32,
    pub world_to_object: Matrix4<f32>,
    pub two_sided: bool,
    pub color: Vector3<f32>,
    pub exponent: f32,
    /// World space bounds, used to place the sensor in the hierarchy.
    pub bounds: Aabb,
}

impl Sensor {
    pub fn record(&self) -> SensorRecord {
        SensorRecord {
            group_index: self.group_index,
            world_to_object: Mat34::from(&self.world_to_object),
            two_sided: i32::from(self.two_sided),
            color: self.color.into(),
            exponent: self.exponent,
        }
    }
}

/// The sensor buffers of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorBuffers {
    pub bytes: Vec<u8>,
    /// Hierarchy over the sensor bounds. Leaves hold positions in `bytes`.
    pub bvh: FlatBvh,
}

/// Collects sensors and keeps a hierarchy over them up to date.
#[derive(Debug, Clone, Default)]
pub struct SensorSerializer {
    sensors: Vec<Sensor>,
    tree: AabbTree,
}

impl SensorSerializer {
    pub fn new() -> SensorSerializer {
        SensorSerializer::default()
    }

    /// Adds a sensor. Its bounds must be finite.
    pub fn add_sensor(&mut self, sensor: Sensor) -> Result<()> {
        BoundingVolume::from(sensor.bounds).validate()?;
        self.tree.add(sensor.bounds, self.sensors.len());
        self.sensors.push(sensor);
        Ok(())
    }

    /// Removes and returns the sensor at `index`. Later sensors move up by one and
    /// the hierarchy is rebuilt with their new positions.
    pub fn remove_sensor(&mut self, index: usize) -> Result<Sensor> {
        if index >= self.sensors.len() {
            return Err(SerializeError::IndexOutOfRange {
                kind: "sensor",
                index,
                len: self.sensors.len(),
            });
        }
        let removed = self.sensors.remove(index);
        self.tree = AabbTree::new();
        for (position, sensor) in self.sensors.iter().enumerate() {
            self.tree.add(sensor.bounds, position);
        }
        Ok(removed)
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn tree(&self) -> &AabbTree {
        &self.tree
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Serializes every sensor, in insertion order, and flattens the hierarchy.
    pub fn serialize(&self) -> Result<SensorBuffers> {
        if self.sensors.is_empty() {
            return Err(SerializeError::EmptyCollection("sensor"));
        }
        let records: Vec<SensorRecord> = self.sensors.iter().map(Sensor::record).collect();
        let bytes = bytemuck::cast_slice(&records).to_vec();
        let bvh = self.tree.flatten()?;
        log::debug!(
            "serialized {} sensors into {} bytes, hierarchy of {} nodes",
            records.len(),
            bytes.len(),
            bvh.node_count()
        );
        Ok(SensorBuffers { bytes, bvh })
    }
}
