//! Runtime settings shared by the sibling serializers.

use crate::error::{Result, SerializeError};

/// Settings which must agree with the constants the kernels were compiled with.
///
/// `spectral_bins` is the kernel's `SPECTRAL_WAVELENGTH_BINS`, the length of every
/// spectral array in a light record. `min_measurements` is the lower bound on the
/// number of detector measurements, usually 1.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SerializerConfig {
    pub spectral_bins: usize,
    pub min_measurements: usize,
}

impl Default for SerializerConfig {
    fn default() -> Self {
        SerializerConfig {
            spectral_bins: 1,
            min_measurements: 1,
        }
    }
}

impl SerializerConfig {
    /// Sets the number of wavelength bins.
    ///
    /// # Examples
    /// ```
    /// use fluxbvh::SerializerConfig;
    ///
    /// let config = SerializerConfig::default()
    ///     .with_spectral_bins(16)
    ///     .with_min_measurements(4);
    /// assert_eq!(config.spectral_bins, 16);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn with_spectral_bins(mut self, spectral_bins: usize) -> Self {
        self.spectral_bins = spectral_bins;
        self
    }

    /// Sets the lower bound on detector measurements.
    pub fn with_min_measurements(mut self, min_measurements: usize) -> Self {
        self.min_measurements = min_measurements;
        self
    }

    /// Rejects settings the kernels cannot be compiled with.
    pub fn validate(&self) -> Result<&Self> {
        if self.spectral_bins == 0 {
            return Err(SerializeError::TypeMismatch {
                expected: "at least one spectral bin",
                found: "0".to_string(),
            });
        }
        if self.min_measurements == 0 {
            return Err(SerializeError::TypeMismatch {
                expected: "at least one measurement",
                found: "0".to_string(),
            });
        }
        Ok(self)
    }
}
