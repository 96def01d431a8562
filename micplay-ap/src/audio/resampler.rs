//! Sample rate conversion using rubato
//!
//! Voice mode resamples the mono asset to the quality tier's rate. The whole
//! buffer is converted in one pass.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Audio resampler for mono buffers.
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates already match.
    pub fn resample(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::Resample(format!(
                "invalid sample rates {}Hz -> {}Hz",
                input_rate, output_rate
            )));
        }

        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }

        if input.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            "Resampling {} samples from {}Hz to {}Hz",
            input.len(),
            input_rate,
            output_rate
        );

        let mut resampler = Self::create_resampler(input_rate, output_rate, input.len())?;

        let mut planar_output = resampler
            .process(&[input], None)
            .map_err(|e| Error::Resample(format!("Resampling failed: {}", e)))?;

        let output = planar_output.pop().unwrap_or_default();

        debug!(
            "Resampled {} input frames to {} output frames",
            input.len(),
            output.len()
        );

        Ok(output)
    }

    /// Expected output length for a conversion, ignoring resampler delay
    pub fn expected_len(input_len: usize, input_rate: u32, output_rate: u32) -> usize {
        if input_rate == 0 {
            return 0;
        }
        (input_len as f64 * output_rate as f64 / input_rate as f64).round() as usize
    }

    /// FastFixedIn with a septic polynomial: good quality at low cost.
    fn create_resampler(
        input_rate: u32,
        output_rate: u32,
        chunk_size: usize,
    ) -> Result<FastFixedIn<f32>> {
        FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            chunk_size,
            1,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {}", e)))
    }
}
