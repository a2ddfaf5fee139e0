use serde::{Deserialize, Serialize};

use crate::audio::Peak;

/// The three sampling phases a player goes through before playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationStep {
    /// Player whistles at a comfortable loudness.
    VoiceAmplitude,
    /// Player stays quiet while the room is measured.
    NoiseAmplitude,
    /// Player sweeps from their lowest to their highest whistle.
    FrequencyRange,
}

impl CalibrationStep {
    pub const ALL: [CalibrationStep; 3] = [
        CalibrationStep::VoiceAmplitude,
        CalibrationStep::NoiseAmplitude,
        CalibrationStep::FrequencyRange,
    ];

    pub fn label(self) -> &'static str {
        match self {
            CalibrationStep::VoiceAmplitude => "voice level",
            CalibrationStep::NoiseAmplitude => "background noise",
            CalibrationStep::FrequencyRange => "whistle range",
        }
    }

    /// The step that has to have collected samples before this one is offered.
    pub fn prerequisite(self) -> Option<CalibrationStep> {
        match self {
            CalibrationStep::VoiceAmplitude => None,
            CalibrationStep::NoiseAmplitude => Some(CalibrationStep::VoiceAmplitude),
            CalibrationStep::FrequencyRange => Some(CalibrationStep::NoiseAmplitude),
        }
    }

    /// The value this step records for a peak, if the peak is usable.
    ///
    /// Frequency samples are only taken when the peak is louder than the
    /// threshold derived on the previous tick and above `lowest_freq`.
    pub fn sample(self, peak: &Peak, previous: &CalibrationResult, lowest_freq: f32) -> Option<f32> {
        match self {
            CalibrationStep::VoiceAmplitude | CalibrationStep::NoiseAmplitude => Some(peak.amplitude),
            CalibrationStep::FrequencyRange => {
                let loud_enough = peak.amplitude > previous.amplitude_threshold;
                let high_enough = peak.frequency > lowest_freq;
                (loud_enough && high_enough).then_some(peak.frequency)
            }
        }
    }
}

/// Everything collected so far, one sequence per step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationState {
    frequencies: Vec<f32>,
    voice_amplitudes: Vec<f32>,
    noise_amplitudes: Vec<f32>,
}

impl CalibrationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples(&self, step: CalibrationStep) -> &[f32] {
        match step {
            CalibrationStep::VoiceAmplitude => &self.voice_amplitudes,
            CalibrationStep::NoiseAmplitude => &self.noise_amplitudes,
            CalibrationStep::FrequencyRange => &self.frequencies,
        }
    }

    fn samples_mut(&mut self, step: CalibrationStep) -> &mut Vec<f32> {
        match step {
            CalibrationStep::VoiceAmplitude => &mut self.voice_amplitudes,
            CalibrationStep::NoiseAmplitude => &mut self.noise_amplitudes,
            CalibrationStep::FrequencyRange => &mut self.frequencies,
        }
    }

    pub fn clear(&mut self, step: CalibrationStep) {
        self.samples_mut(step).clear();
    }

    pub fn record(&mut self, step: CalibrationStep, value: f32) {
        self.samples_mut(step).push(value);
    }

    /// Reduce the collected samples to an envelope.
    ///
    /// Amplitudes use the lower median (index `n / 2`), the band uses nearest-rank
    /// 10th and 90th percentiles by truncation. Empty sequences contribute 0.
    pub fn evaluate(&self) -> CalibrationResult {
        let voice = sorted(&self.voice_amplitudes);
        let noise = sorted(&self.noise_amplitudes);
        let frequencies = sorted(&self.frequencies);

        let voice_amplitude = nearest_rank(&voice, 50);
        let noise_amplitude = nearest_rank(&noise, 50);

        CalibrationResult {
            min_freq: nearest_rank(&frequencies, 10),
            max_freq: nearest_rank(&frequencies, 90),
            voice_amplitude,
            noise_amplitude,
            amplitude_threshold: (voice_amplitude + noise_amplitude) / 2.0,
        }
    }
}

fn sorted(values: &[f32]) -> Vec<f32> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Element at `floor(n * percent / 100)`, or 0 for an empty sequence.
fn nearest_rank(sorted: &[f32], percent: usize) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (sorted.len() * percent / 100).min(sorted.len() - 1);
    sorted[index]
}

/// Personal operating envelope derived from calibration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CalibrationResult {
    pub min_freq: f32,
    pub max_freq: f32,
    pub voice_amplitude: f32,
    pub noise_amplitude: f32,
    pub amplitude_threshold: f32,
}

impl CalibrationResult {
    pub fn is_complete(&self) -> bool {
        [
            self.min_freq,
            self.max_freq,
            self.voice_amplitude,
            self.noise_amplitude,
            self.amplitude_threshold,
        ]
        .iter()
        .all(|&value| value > 0.0)
    }

    pub fn band_width(&self) -> f32 {
        self.max_freq - self.min_freq
    }
}
