//! Everything a kernel launch uploads, built in one go.

use crate::aabb_tree::AabbTree;
use crate::config::SerializerConfig;
use crate::error::{Result, SerializeError};
use crate::flat_bvh::FlatBvh;
use crate::serializer::detector::{serialize_detectors, DetectorBuffers};
use crate::serializer::light::{LightBuffers, LightSerializer};
use crate::serializer::primitive::{serialize_meshes, PrimitiveBuffers, TriangleMesh};
use crate::serializer::sensor::{SensorBuffers, SensorSerializer};

/// The input buffers of one kernel launch.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneBuffers {
    pub primitives: PrimitiveBuffers,
    /// Hierarchy over the triangles. Leaves hold positions in the primitive offset table.
    pub primitive_bvh: FlatBvh,
    pub detectors: DetectorBuffers,
    pub lights: LightBuffers,
    pub sensors: SensorBuffers,
}

impl SceneBuffers {
    /// Serializes a whole scene.
    ///
    /// Fails if any part is empty, or if `lights` was set up for a different number
    /// of wavelength bins than `config`.
    pub fn build(
        config: &SerializerConfig,
        meshes: &[TriangleMesh],
        lights: &LightSerializer,
        sensors: &SensorSerializer,
    ) -> Result<SceneBuffers> {
        config.validate()?;
        if lights.spectral_bins() != config.spectral_bins {
            return Err(SerializeError::SpectralBinMismatch {
                expected: config.spectral_bins,
                found: lights.spectral_bins(),
            });
        }

        let primitives = serialize_meshes(meshes)?;
        let primitive_bvh = AabbTree::from_shapes(&primitives.bounds).flatten()?;
        let detectors = serialize_detectors(&primitives.group_areas, config.min_measurements)?;
        let lights = lights.serialize()?;
        let sensors = sensors.serialize()?;

        log::debug!(
            "scene: {} triangles, {} detectors, {} lights, {} sensor bytes",
            primitives.len(),
            primitives.group_areas.len(),
            lights.offsets.len(),
            sensors.bytes.len()
        );
        Ok(SceneBuffers {
            primitives,
            primitive_bvh,
            detectors,
            lights,
            sensors,
        })
    }
}
