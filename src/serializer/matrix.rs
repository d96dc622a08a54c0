//! The 3x4 affine matrix embedded in primitive, light and sensor records.

use bytemuck::{Pod, Zeroable};
use nalgebra::Matrix4;

use crate::error::{Result, SerializeError};

/// Kernel side `Mat34`: a row major 3x3 linear part followed by the translation.
///
/// The projective row of a 4x4 matrix is dropped.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Mat34 {
    pub m: [f32; 12],
}

const _: () = assert!(std::mem::size_of::<Mat34>() == 48);

impl Mat34 {
    /// The identity transformation.
    pub fn identity() -> Mat34 {
        Mat34::from(&Matrix4::identity())
    }
}

impl From<&Matrix4<f32>> for Mat34 {
    fn from(matrix: &Matrix4<f32>) -> Mat34 {
        let mut m = [0.0; 12];
        for row in 0..3 {
            for col in 0..3 {
                m[row * 3 + col] = matrix[(row, col)];
            }
            m[9 + row] = matrix[(row, 3)];
        }
        Mat34 { m }
    }
}

/// Returns the inverse of `matrix`, or [`SerializeError::SingularMatrix`].
///
/// [`SerializeError::SingularMatrix`]: ../error/enum.SerializeError.html
///
pub fn invert(matrix: &Matrix4<f32>) -> Result<Matrix4<f32>> {
    matrix.try_inverse().ok_or(SerializeError::SingularMatrix)
}
