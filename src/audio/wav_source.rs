use log::{info, warn};
use std::path::Path;

use super::{AcquireError, ByteSpectrumAnalyser, SpectrumSnapshot, SpectrumSource};

/// Replays a recording through the sampler boundary.
///
/// Every snapshot advances the playhead by one tick's worth of audio
/// (`sample_rate / ticks_per_second` frames), so a loop driven at the display
/// rate hears the file in real time. Past the end of the file the source is silent.
pub struct WavSource {
    samples: Vec<f32>,
    cursor: usize,
    hop: usize,
    sample_rate: f32,
    analyser: ByteSpectrumAnalyser,
    released: bool,
}

impl From<hound::Error> for AcquireError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(_) => AcquireError::DeviceUnavailable,
            other => AcquireError::Stream(other.to_string()),
        }
    }
}

impl WavSource {
    pub fn open<P: AsRef<Path>>(
        path: P,
        analyser: ByteSpectrumAnalyser,
        ticks_per_second: f32,
    ) -> Result<Self, AcquireError> {
        let mut reader = hound::WavReader::open(&path)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
            hound::SampleFormat::Int => {
                let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        // Mix to mono for analysis
        let samples: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        info!(
            "Loaded recording: {:?} ({}Hz, {} channels, {:.2}s)",
            path.as_ref(),
            spec.sample_rate,
            channels,
            samples.len() as f32 / spec.sample_rate as f32
        );

        Ok(Self::from_samples(samples, spec.sample_rate as f32, analyser, ticks_per_second))
    }

    pub fn from_samples(
        samples: Vec<f32>,
        sample_rate: f32,
        analyser: ByteSpectrumAnalyser,
        ticks_per_second: f32,
    ) -> Self {
        let hop = (sample_rate / ticks_per_second.max(1.0)).round().max(1.0) as usize;

        Self {
            samples,
            cursor: 0,
            hop,
            sample_rate,
            analyser,
            released: false,
        }
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn position_seconds(&self) -> f32 {
        self.cursor as f32 / self.sample_rate
    }

    pub fn duration_seconds(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }

    pub fn is_finished(&self) -> bool {
        self.released || self.cursor >= self.samples.len()
    }
}

impl SpectrumSource for WavSource {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn transform_size(&self) -> usize {
        self.analyser.fft_size()
    }

    fn snapshot(&mut self) -> SpectrumSnapshot {
        let step = self.bin_frequency_step();
        if self.released || self.cursor >= self.samples.len() {
            return SpectrumSnapshot::silent(self.analyser.bin_count(), step);
        }

        let end = (self.cursor + self.hop).min(self.samples.len());
        if end == self.samples.len() {
            warn!("Recording exhausted after {:.2}s; replaying silence", self.duration_seconds());
        }
        self.cursor = end;

        let start = end.saturating_sub(self.analyser.fft_size());
        let magnitudes = self.analyser.analyse(&self.samples[start..end]);
        SpectrumSnapshot::new(magnitudes, step)
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            info!("Recording released at {:.2}s", self.position_seconds());
        }
    }

    fn source_type(&self) -> &'static str {
        "wav"
    }
}
