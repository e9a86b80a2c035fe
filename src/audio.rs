//! Synthesized audio buffers and the scratch WAV sink.

use std::path::Path;

use crate::error::PlaybackError;

/// PCM audio produced by one synthesis pass. Owned by the playback side
/// until it is written to the scratch sink, then discarded.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Convert f32 model output in [-1, 1] to 16-bit PCM.
    pub fn from_f32(samples: &[f32], sample_rate: u32) -> Self {
        let samples = samples
            .iter()
            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16)
            .collect();
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Write the buffer as a mono 16-bit WAV, overwriting any prior file
    /// at `path`. Only one synthesis is ever in flight, so plain
    /// overwrite needs no collision handling.
    pub fn write_wav(&self, path: &Path) -> Result<(), PlaybackError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer =
            hound::WavWriter::create(path, spec).map_err(|e| PlaybackError::Io(e.to_string()))?;
        for &sample in &self.samples {
            writer
                .write_sample(sample)
                .map_err(|e| PlaybackError::Io(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| PlaybackError::Io(e.to_string()))?;
        Ok(())
    }
}
