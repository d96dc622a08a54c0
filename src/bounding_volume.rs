//! The six scalar box the flat hierarchy records are written from.

use crate::aabb::{Aabb, Bounded};
use crate::error::{Result, SerializeError};
use crate::utils::ensure_finite;
use nalgebra::Point3;

/// An axis aligned box stored as its six limits, in wire order.
///
/// Unlike [`Aabb`] this type carries no geometric behavior. It is the value the node
/// encoder copies into records, axis for axis, so its field order mirrors the layout
/// of the GPU structures: `x_min, x_max, y_min, y_max, z_min, z_max`.
///
/// [`Aabb`]: ../aabb/struct.Aabb.html
///
#[derive(Debug, Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingVolume {
    pub x_min: f32,
    pub x_max: f32,
    pub y_min: f32,
    pub y_max: f32,
    pub z_min: f32,
    pub z_max: f32,
}

impl BoundingVolume {
    /// Creates a new [`BoundingVolume`] from its six limits.
    ///
    /// [`BoundingVolume`]: struct.BoundingVolume.html
    ///
    pub fn new(x_min: f32, x_max: f32, y_min: f32, y_max: f32, z_min: f32, z_max: f32) -> Self {
        BoundingVolume {
            x_min,
            x_max,
            y_min,
            y_max,
            z_min,
            z_max,
        }
    }

    /// Returns the six limits in wire order.
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.x_min, self.x_max, self.y_min, self.y_max, self.z_min, self.z_max,
        ]
    }

    /// Checks that every limit is finite. Returns the volume itself for chaining.
    ///
    /// # Examples
    /// ```
    /// use fluxbvh::bounding_volume::BoundingVolume;
    ///
    /// let ok = BoundingVolume::new(0.0, 1.0, 0.0, 1.0, 0.0, 1.0);
    /// assert!(ok.validate().is_ok());
    ///
    /// let poisoned = BoundingVolume::new(0.0, f32::NAN, 0.0, 1.0, 0.0, 1.0);
    /// assert!(poisoned.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<&Self> {
        ensure_finite("x_min", self.x_min)?;
        ensure_finite("x_max", self.x_max)?;
        ensure_finite("y_min", self.y_min)?;
        ensure_finite("y_max", self.y_max)?;
        ensure_finite("z_min", self.z_min)?;
        ensure_finite("z_max", self.z_max)?;
        Ok(self)
    }

    /// Returns the smallest volume enclosing both `self` and `other`.
    pub fn union(&self, other: &BoundingVolume) -> BoundingVolume {
        Aabb::from(*self).join(&Aabb::from(*other)).into()
    }
}

impl From<Aabb> for BoundingVolume {
    fn from(aabb: Aabb) -> Self {
        BoundingVolume::new(
            aabb.min.x, aabb.max.x, aabb.min.y, aabb.max.y, aabb.min.z, aabb.max.z,
        )
    }
}

impl From<BoundingVolume> for Aabb {
    fn from(volume: BoundingVolume) -> Self {
        Aabb::with_bounds(
            Point3::new(volume.x_min, volume.y_min, volume.z_min),
            Point3::new(volume.x_max, volume.y_max, volume.z_max),
        )
    }
}

impl Bounded for BoundingVolume {
    fn aabb(&self) -> Aabb {
        Aabb::from(*self)
    }
}

impl TryFrom<&[(f32, f32)]> for BoundingVolume {
    type Error = SerializeError;

    fn try_from(limits: &[(f32, f32)]) -> Result<Self> {
        match *limits {
            [(x_min, x_max), (y_min, y_max), (z_min, z_max)] => Ok(BoundingVolume::new(
                x_min, x_max, y_min, y_max, z_min, z_max,
            )),
            _ => Err(SerializeError::TypeMismatch {
                expected: "three (min, max) axis limits",
                found: format!("{} axis limits", limits.len()),
            }),
        }
    }
}

/// Converts the geometry side's per axis limits into a [`BoundingVolume`].
///
/// The input is one `(min, max)` pair per axis in x, y, z order, which is how
/// spatial partitioning backends usually hand out their boxes. All six scalars are
/// copied unchanged.
///
/// # Examples
/// ```
/// use fluxbvh::bounding_volume::{convert_bounding_box, BoundingVolume};
///
/// let volume = convert_bounding_box(&[(0.0, 1.0), (2.0, 3.0), (4.0, 5.0)]).unwrap();
/// assert_eq!(volume, BoundingVolume::new(0.0, 1.0, 2.0, 3.0, 4.0, 5.0));
///
/// assert!(convert_bounding_box(&[(0.0, 1.0), (2.0, 3.0)]).is_err());
/// ```
///
/// [`BoundingVolume`]: struct.BoundingVolume.html
///
pub fn convert_bounding_box(limits: &[(f32, f32)]) -> Result<BoundingVolume> {
    BoundingVolume::try_from(limits)
}
