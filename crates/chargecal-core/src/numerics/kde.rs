//! One-dimensional Gaussian kernel density estimation.

use super::{kahan_add, sample_std};

const INV_SQRT_TWO_PI: f64 = 0.398_942_280_401_432_7;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum KdeError {
    #[error("kernel density estimation requires at least 2 samples, got {actual}")]
    InsufficientSamples { actual: usize },
    #[error("kernel density sample at index {index} must be finite, got {value}")]
    NonFiniteSample { index: usize, value: f64 },
    #[error("kernel density bandwidth degenerated to {bandwidth}; samples have no spread")]
    DegenerateBandwidth { bandwidth: f64 },
}

/// Gaussian kernel density estimate over a one-dimensional sample, with
/// the bandwidth set by the rule-of-thumb factor n^(-1/5) applied to the
/// unbiased sample standard deviation.
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianKde {
    samples: Vec<f64>,
    bandwidth: f64,
}

impl GaussianKde {
    pub fn from_samples(samples: &[f64]) -> Result<Self, KdeError> {
        if samples.len() < 2 {
            return Err(KdeError::InsufficientSamples {
                actual: samples.len(),
            });
        }
        for (index, &value) in samples.iter().enumerate() {
            if !value.is_finite() {
                return Err(KdeError::NonFiniteSample { index, value });
            }
        }

        let std = match sample_std(samples) {
            Some(std) => std,
            None => {
                return Err(KdeError::InsufficientSamples {
                    actual: samples.len(),
                });
            }
        };
        let bandwidth = std * (samples.len() as f64).powf(-0.2);
        if !bandwidth.is_finite() || bandwidth <= 0.0 {
            return Err(KdeError::DegenerateBandwidth { bandwidth });
        }

        Ok(Self {
            samples: samples.to_vec(),
            bandwidth,
        })
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Density of the estimate at `x`.
    pub fn density(&self, x: f64) -> f64 {
        let mut sum = 0.0;
        let mut correction = 0.0;
        for &sample in &self.samples {
            let z = (x - sample) / self.bandwidth;
            kahan_add(&mut sum, &mut correction, (-0.5 * z * z).exp());
        }

        sum * INV_SQRT_TWO_PI / (self.samples.len() as f64 * self.bandwidth)
    }
}
