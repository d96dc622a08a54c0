//! Light sources and the power weighted table the kernels sample them with.

use bytemuck::{Pod, Zeroable};
use nalgebra::{Matrix4, Vector3};

use crate::config::SerializerConfig;
use crate::error::{Result, SerializeError};
use crate::serializer::matrix::{invert, Mat34};
use crate::serializer::record_buffer::RecordBuffer;

/// Kernel light type of a point light.
pub const LIGHT_POINT: i32 = 0;
/// Kernel light type of a light with an explicit spectral distribution.
pub const LIGHT_SPECTRAL: i32 = 6;

/// Fixed size head of a kernel `Light`. The spectral arrays follow it.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
struct LightHeader {
    light_type: i32,
    samples: i32,
    object_to_world: Mat34,
    world_to_object: Mat34,
    power: [f32; 3],
}

/// What kind of light, with the data only that kind carries.
#[derive(Debug, Clone, PartialEq)]
pub enum LightKind {
    Point,
    Spectral {
        rgb: Vector3<f32>,
        /// Relative power per wavelength bin.
        distribution: Vec<f32>,
    },
}

/// A light source waiting to be serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    /// Number of samples the kernel takes per light.
    pub samples: i32,
    pub color: Vector3<f32>,
    pub power: f32,
    /// Discretized cumulative spectral importance, one entry per bin.
    pub spectral_cdf: Vec<f32>,
    /// Object to world transformation. Must be invertible.
    pub transform: Matrix4<f32>,
}

impl Light {
    pub fn point(samples: i32, color: Vector3<f32>, power: f32, spectral_cdf: Vec<f32>) -> Light {
        Light {
            kind: LightKind::Point,
            samples,
            color,
            power,
            spectral_cdf,
            transform: Matrix4::identity(),
        }
    }

    pub fn spectral(
        samples: i32,
        color: Vector3<f32>,
        power: f32,
        spectral_cdf: Vec<f32>,
        rgb: Vector3<f32>,
        distribution: Vec<f32>,
    ) -> Light {
        Light {
            kind: LightKind::Spectral { rgb, distribution },
            ..Light::point(samples, color, power, spectral_cdf)
        }
    }

    /// Places the light in the world.
    pub fn with_transform(mut self, transform: Matrix4<f32>) -> Light {
        self.transform = transform;
        self
    }

    /// Returns the kernel type code.
    pub fn light_type(&self) -> i32 {
        match self.kind {
            LightKind::Point => LIGHT_POINT,
            LightKind::Spectral { .. } => LIGHT_SPECTRAL,
        }
    }

    /// Spreads the scalar power over the color channels, keeping their sum at
    /// three times the scalar power.
    pub fn power3(&self) -> Vector3<f32> {
        let sum = self.color.x + self.color.y + self.color.z;
        if sum == 0.0 {
            return Vector3::zeros();
        }
        self.color * (3.0 * self.power / sum)
    }

    /// Returns the weight this light is sampled with. Never negative.
    pub fn sampling_weight(&self) -> f32 {
        let weight = match self.kind {
            LightKind::Point => self.power,
            LightKind::Spectral { .. } => {
                let color_power = quantized_color_power(&self.color);
                if color_power == 0.0 {
                    0.0
                } else {
                    (self.power / color_power) * self.power
                }
            }
        };
        if weight <= 0.0 || weight.is_nan() {
            log::warn!(
                "light with power {} gets no sampling weight",
                self.power
            );
            return 0.0;
        }
        weight
    }

    fn check_bins(&self, bins: usize) -> Result<()> {
        let mut lengths = vec![self.spectral_cdf.len()];
        if let LightKind::Spectral { distribution, .. } = &self.kind {
            lengths.push(distribution.len());
        }
        match lengths.into_iter().find(|&len| len != bins) {
            Some(found) => Err(SerializeError::SpectralBinMismatch {
                expected: bins,
                found,
            }),
            None => Ok(()),
        }
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let header = LightHeader {
            light_type: self.light_type(),
            samples: self.samples,
            object_to_world: Mat34::from(&self.transform),
            world_to_object: Mat34::from(&invert(&self.transform)?),
            power: self.power3().into(),
        };
        let mut bytes = bytemuck::bytes_of(&header).to_vec();
        bytes.extend_from_slice(bytemuck::cast_slice(&self.spectral_cdf));
        if let LightKind::Spectral { rgb, distribution } = &self.kind {
            let rgb: [f32; 3] = (*rgb).into();
            bytes.extend_from_slice(bytemuck::cast_slice(&rgb));
            bytes.extend_from_slice(bytemuck::cast_slice(distribution));
        }
        Ok(bytes)
    }
}

/// Maps a channel to `0..=255` the way 8 bit colors are stored.
fn quantize(channel: f32) -> u32 {
    (channel * 255.0).round().clamp(0.0, 255.0) as u32
}

/// Sum of the 8 bit quantized channels, scaled back to roughly `0..3`.
fn quantized_color_power(color: &Vector3<f32>) -> f32 {
    (quantize(color.x) + quantize(color.y) + quantize(color.z)) as f32 / 256.0
}

/// The light buffers of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LightBuffers {
    pub bytes: Vec<u8>,
    /// Byte offset of each light record.
    pub offsets: Vec<i32>,
    /// Running sum of the sampling weights.
    pub cumulative_power: Vec<f32>,
}

/// Collects the lights of a scene.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSerializer {
    lights: Vec<Light>,
    spectral_bins: usize,
}

impl LightSerializer {
    pub fn new(config: &SerializerConfig) -> Result<LightSerializer> {
        config.validate()?;
        Ok(LightSerializer {
            lights: Vec::new(),
            spectral_bins: config.spectral_bins,
        })
    }

    /// Adds a light, checking its spectral arrays against the bin count.
    pub fn add_light(&mut self, light: Light) -> Result<()> {
        light.check_bins(self.spectral_bins)?;
        self.lights.push(light);
        Ok(())
    }

    pub fn add_point_light(
        &mut self,
        samples: i32,
        color: Vector3<f32>,
        power: f32,
        spectral_cdf: Vec<f32>,
    ) -> Result<()> {
        self.add_light(Light::point(samples, color, power, spectral_cdf))
    }

    pub fn add_spectral_light(
        &mut self,
        samples: i32,
        color: Vector3<f32>,
        power: f32,
        spectral_cdf: Vec<f32>,
        rgb: Vector3<f32>,
        distribution: Vec<f32>,
    ) -> Result<()> {
        self.add_light(Light::spectral(
            samples,
            color,
            power,
            spectral_cdf,
            rgb,
            distribution,
        ))
    }

    /// Removes and returns the light at `index`. Later lights move up by one.
    pub fn remove_light(&mut self, index: usize) -> Result<Light> {
        if index >= self.lights.len() {
            return Err(SerializeError::IndexOutOfRange {
                kind: "light",
                index,
                len: self.lights.len(),
            });
        }
        Ok(self.lights.remove(index))
    }

    /// Returns the length every spectral array must have.
    pub fn spectral_bins(&self) -> usize {
        self.spectral_bins
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    /// Serializes every light, in insertion order.
    pub fn serialize(&self) -> Result<LightBuffers> {
        if self.lights.is_empty() {
            return Err(SerializeError::EmptyCollection("light"));
        }

        let mut buffer = RecordBuffer::new();
        let mut cumulative_power = Vec::with_capacity(self.lights.len());
        let mut total = 0.0;
        for light in &self.lights {
            buffer.push_bytes(&light.to_bytes()?)?;
            total += light.sampling_weight();
            cumulative_power.push(total);
        }

        let (bytes, offsets) = buffer.into_parts();
        log::debug!(
            "serialized {} lights into {} bytes, total power {}",
            offsets.len(),
            bytes.len(),
            total
        );
        Ok(LightBuffers {
            bytes,
            offsets,
            cumulative_power,
        })
    }
}
