//! Triangle meshes and the packed polygon records the kernels intersect.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Point3, Vector3};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::aabb::{Aabb, Bounded};
use crate::bounding_volume::BoundingVolume;
use crate::error::{Result, SerializeError};
use crate::serializer::matrix::Mat34;
use crate::serializer::record_buffer::RecordBuffer;
use crate::utils::to_wire_index;
use crate::EPSILON;

/// Kernel primitive type of a triangle.
pub const PRIM_TRIANGLE: i32 = 5;

/// Size of a [`TriangleRecord`] in bytes.
///
/// [`TriangleRecord`]: struct.TriangleRecord.html
///
pub const TRIANGLE_RECORD_SIZE: usize = 196;

/// Kernel side `Polygon`: the common primitive header followed by the triangle data.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct TriangleRecord {
    pub prim_type: i32,
    pub group_index: i32,
    pub shader_offset: i32,
    pub ior: f32,
    /// `x_min, x_max, y_min, y_max, z_min, z_max`.
    pub bounds: [f32; 6],
    pub world_to_object: Mat34,
    pub vertices: [[f32; 3]; 3],
    pub face_normal: [f32; 3],
    pub uvs: [[f32; 2]; 3],
    pub vertex_normals: [[f32; 3]; 3],
}

const _: () = assert!(std::mem::size_of::<TriangleRecord>() == TRIANGLE_RECORD_SIZE);

/// An indexed triangle mesh, one primitive group of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    pub points: Vec<Point3<f32>>,
    pub faces: Vec<[usize; 3]>,
    /// Per vertex normals. Computed from the faces when absent.
    pub normals: Option<Vec<Vector3<f32>>>,
    pub shader_offset: i32,
    pub ior: f32,
}

impl TriangleMesh {
    pub fn new(points: Vec<Point3<f32>>, faces: Vec<[usize; 3]>) -> TriangleMesh {
        TriangleMesh {
            points,
            faces,
            normals: None,
            shader_offset: 0,
            ior: 0.0,
        }
    }

    /// Uses the given per vertex normals instead of computed ones.
    pub fn with_normals(mut self, normals: Vec<Vector3<f32>>) -> TriangleMesh {
        self.normals = Some(normals);
        self
    }

    /// Sets the shader offset and index of refraction written into every record.
    pub fn with_shader(mut self, shader_offset: i32, ior: f32) -> TriangleMesh {
        self.shader_offset = shader_offset;
        self.ior = ior;
        self
    }

    /// Returns the area used to size this group's detector share.
    pub fn group_area(&self) -> f32 {
        self.aabb().surface_area().max(EPSILON)
    }

    /// Looks up the corners of a face, checking its indices.
    fn corners(&self, face: &[usize; 3]) -> Result<[Point3<f32>; 3]> {
        let mut corners = [Point3::origin(); 3];
        for (corner, &index) in corners.iter_mut().zip(face.iter()) {
            *corner = *self
                .points
                .get(index)
                .ok_or(SerializeError::IndexOutOfRange {
                    kind: "vertex",
                    index,
                    len: self.points.len(),
                })?;
        }
        Ok(corners)
    }

    /// Returns the unit normal of every vertex.
    ///
    /// Computed normals are the normalised sum of the adjacent faces' normals weighted
    /// by face area. Vertices touching only degenerate faces get a zero normal.
    pub fn vertex_normals(&self) -> Result<Vec<Vector3<f32>>> {
        if let Some(normals) = &self.normals {
            if normals.len() != self.points.len() {
                return Err(SerializeError::TypeMismatch {
                    expected: "one normal per vertex",
                    found: format!("{} normals for {} vertices", normals.len(), self.points.len()),
                });
            }
            return Ok(normals.clone());
        }

        let mut sums = vec![Vector3::zeros(); self.points.len()];
        for face in &self.faces {
            let [a, b, c] = self.corners(face)?;
            // The cross product's length is twice the face area.
            let weighted = (b - a).cross(&(c - a));
            for &index in face {
                sums[index] += weighted;
            }
        }
        Ok(sums
            .into_iter()
            .map(|sum| sum.try_normalize(0.0).unwrap_or_else(Vector3::zeros))
            .collect())
    }

    /// Encodes every face into a [`TriangleRecord`] of the given group.
    ///
    /// [`TriangleRecord`]: struct.TriangleRecord.html
    ///
    pub fn triangle_records(&self, group_index: usize) -> Result<Vec<TriangleRecord>> {
        Ok(self
            .encode_faces(group_index)?
            .into_iter()
            .map(|(record, _)| record)
            .collect())
    }

    /// Encodes every face and keeps the box each record was written with.
    fn encode_faces(&self, group_index: usize) -> Result<Vec<(TriangleRecord, Aabb)>> {
        let group_index = to_wire_index(group_index)?;
        let normals = self.vertex_normals()?;
        let encode = |face: &[usize; 3]| self.triangle_record(face, group_index, &normals);

        #[cfg(feature = "rayon")]
        let records = self.faces.par_iter().map(encode).collect();
        #[cfg(not(feature = "rayon"))]
        let records = self.faces.iter().map(encode).collect();
        records
    }

    fn triangle_record(
        &self,
        face: &[usize; 3],
        group_index: i32,
        normals: &[Vector3<f32>],
    ) -> Result<(TriangleRecord, Aabb)> {
        let corners = self.corners(face)?;
        let [a, b, c] = corners;
        let aabb = triangle_aabb(&corners);
        let bounds = BoundingVolume::from(aabb);
        bounds.validate()?;
        let face_normal = (b - a)
            .cross(&(c - a))
            .try_normalize(0.0)
            .unwrap_or_else(Vector3::zeros);

        let record = TriangleRecord {
            prim_type: PRIM_TRIANGLE,
            group_index,
            shader_offset: self.shader_offset,
            ior: self.ior,
            bounds: bounds.to_array(),
            world_to_object: Mat34::identity(),
            vertices: corners.map(|p| [p.x, p.y, p.z]),
            face_normal: face_normal.into(),
            uvs: [[0.0; 2]; 3],
            vertex_normals: face.map(|index| normals[index].into()),
        };
        Ok((record, aabb))
    }
}

impl Bounded for TriangleMesh {
    fn aabb(&self) -> Aabb {
        self.points
            .iter()
            .fold(Aabb::empty(), |aabb, point| aabb.grow(point))
    }
}

fn triangle_aabb(corners: &[Point3<f32>; 3]) -> Aabb {
    Aabb::empty()
        .grow(&corners[0])
        .grow(&corners[1])
        .grow(&corners[2])
}

/// The primitive buffers of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveBuffers {
    /// Every triangle record, back to back.
    pub bytes: Vec<u8>,
    /// Byte offset of each record.
    pub offsets: Vec<i32>,
    /// Box of each record, in offset table order.
    pub bounds: Vec<Aabb>,
    /// Detector sizing area of each group, one entry per mesh.
    pub group_areas: Vec<f32>,
}

impl PrimitiveBuffers {
    /// Returns the number of triangle records.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Serializes a scene, one primitive group per mesh.
///
/// The group index of a mesh is its position in `meshes`. A mesh without faces
/// produces no record but keeps its group index and its group area.
///
/// # Examples
/// ```
/// use fluxbvh::nalgebra::Point3;
/// use fluxbvh::serializer::{serialize_meshes, TriangleMesh, TRIANGLE_RECORD_SIZE};
///
/// let mesh = TriangleMesh::new(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![[0, 1, 2]],
/// );
/// let buffers = serialize_meshes(&[mesh]).unwrap();
/// assert_eq!(buffers.bytes.len(), TRIANGLE_RECORD_SIZE);
/// assert_eq!(buffers.offsets, vec![0]);
/// ```
pub fn serialize_meshes(meshes: &[TriangleMesh]) -> Result<PrimitiveBuffers> {
    let mut buffer = RecordBuffer::new();
    let mut bounds = Vec::new();
    let mut group_areas = Vec::with_capacity(meshes.len());

    for (group_index, mesh) in meshes.iter().enumerate() {
        group_areas.push(mesh.group_area());
        if mesh.faces.is_empty() {
            log::warn!("mesh {} has no faces and is skipped", group_index);
            continue;
        }
        for (record, aabb) in mesh.encode_faces(group_index)? {
            buffer.push(&record)?;
            bounds.push(aabb);
        }
    }

    if buffer.is_empty() {
        return Err(SerializeError::EmptyCollection("triangle"));
    }

    let (bytes, offsets) = buffer.into_parts();
    log::debug!(
        "serialized {} triangles of {} groups into {} bytes",
        offsets.len(),
        meshes.len(),
        bytes.len()
    );
    Ok(PrimitiveBuffers {
        bytes,
        offsets,
        bounds,
        group_areas,
    })
}
