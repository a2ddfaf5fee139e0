pub mod analyser;
pub mod microphone;
pub mod peak;
pub mod wav_source;

pub use analyser::ByteSpectrumAnalyser;
pub use microphone::MicrophoneSource;
pub use peak::{find_peak, Peak};
pub use wav_source::WavSource;

use std::fmt;

/// Transform size used when nothing else is configured.
pub const DEFAULT_TRANSFORM_SIZE: usize = 2048;
pub const MIN_TRANSFORM_SIZE: usize = 512;

/// Transform sizes must be a power of two of at least 512 samples.
pub fn is_valid_transform_size(size: usize) -> bool {
    size >= MIN_TRANSFORM_SIZE && size.is_power_of_two()
}

/// One tick's worth of byte-scaled bin magnitudes.
///
/// `magnitudes[i]` is the level of the bin centred on `i * bin_frequency_step` Hz,
/// quantised to 0..=255. A snapshot is never mutated after it is taken.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSnapshot {
    pub magnitudes: Vec<u8>,
    pub bin_frequency_step: f32,
}

impl SpectrumSnapshot {
    pub fn new(magnitudes: Vec<u8>, bin_frequency_step: f32) -> Self {
        Self {
            magnitudes,
            bin_frequency_step,
        }
    }

    pub fn silent(bin_count: usize, bin_frequency_step: f32) -> Self {
        Self::new(vec![0; bin_count], bin_frequency_step)
    }

    pub fn bin_count(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn frequency_of(&self, bin: usize) -> f32 {
        bin as f32 * self.bin_frequency_step
    }
}

/// The sampler boundary: anything that can hand the core a spectrum on demand.
///
/// `snapshot` is synchronous and always reflects the most recent audio the
/// source has seen. `release` gives the underlying device back; implementations
/// must tolerate being released more than once and must return silence afterwards.
pub trait SpectrumSource {
    fn sample_rate(&self) -> f32;

    fn transform_size(&self) -> usize;

    fn bin_frequency_step(&self) -> f32 {
        self.sample_rate() / self.transform_size() as f32
    }

    fn snapshot(&mut self) -> SpectrumSnapshot;

    /// Drop audio that arrived since the last call without analysing it. Called
    /// on ticks that take no snapshot so live sources never build a backlog.
    fn discard_pending(&mut self) {}

    fn release(&mut self);

    /// Short identification string ("microphone", "wav", ...) for logging.
    fn source_type(&self) -> &'static str;
}

/// Why an audio source could not be acquired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    PermissionDenied,
    DeviceUnavailable,
    /// Backend failure that is neither a permission nor a missing-device condition.
    Stream(String),
}

impl fmt::Display for AcquireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquireError::PermissionDenied => write!(f, "microphone permission denied"),
            AcquireError::DeviceUnavailable => write!(f, "no audio input device available"),
            AcquireError::Stream(message) => write!(f, "audio stream error: {message}"),
        }
    }
}

impl std::error::Error for AcquireError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_sizes() {
        assert!(is_valid_transform_size(512));
        assert!(is_valid_transform_size(2048));
        assert!(!is_valid_transform_size(256));
        assert!(!is_valid_transform_size(1000));
        assert!(!is_valid_transform_size(0));
    }

    #[test]
    fn snapshot_bin_frequencies() {
        let snapshot = SpectrumSnapshot::silent(1024, 48000.0 / 2048.0);
        assert_eq!(snapshot.bin_count(), 1024);
        assert_eq!(snapshot.frequency_of(0), 0.0);
        assert_eq!(snapshot.frequency_of(64), 1500.0);
    }
}
