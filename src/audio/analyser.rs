use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_MIN_DECIBELS: f32 = -100.0;
pub const DEFAULT_MAX_DECIBELS: f32 = -30.0;
pub const DEFAULT_SMOOTHING: f32 = 0.8;

/// Turns the most recent PCM window into byte-scaled bin magnitudes.
///
/// Each call windows the last `fft_size` samples (Blackman), takes |X[k]| / N for
/// the first N/2 bins, blends it with the previous call's level using the
/// smoothing constant, converts to decibels and maps `[min_decibels, max_decibels]`
/// linearly onto `0..=255`.
pub struct ByteSpectrumAnalyser {
    fft_size: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    min_decibels: f32,
    max_decibels: f32,
    smoothing: f32,
}

impl ByteSpectrumAnalyser {
    /// `fft_size` is expected to have passed `is_valid_transform_size`.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            fft_size,
            fft,
            window: Self::blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            min_decibels: DEFAULT_MIN_DECIBELS,
            max_decibels: DEFAULT_MAX_DECIBELS,
            smoothing: DEFAULT_SMOOTHING,
        }
    }

    pub fn with_range(mut self, min_decibels: f32, max_decibels: f32, smoothing: f32) -> Self {
        self.min_decibels = min_decibels;
        self.max_decibels = max_decibels;
        self.smoothing = smoothing.clamp(0.0, 1.0);
        self
    }

    fn blackman_window(size: usize) -> Vec<f32> {
        const A0: f32 = 0.42;
        const A1: f32 = 0.5;
        const A2: f32 = 0.08;

        (0..size)
            .map(|i| {
                let phase = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
                A0 - A1 * phase.cos() + A2 * (2.0 * phase).cos()
            })
            .collect()
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Forget the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.iter_mut().for_each(|level| *level = 0.0);
    }

    pub fn analyse(&mut self, samples: &[f32]) -> Vec<u8> {
        // Short input is zero padded at the front so the newest sample stays last.
        let start = samples.len().saturating_sub(self.fft_size);
        let recent = &samples[start..];
        let offset = self.fft_size - recent.len();

        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        for (i, &sample) in recent.iter().enumerate() {
            buffer[offset + i] = Complex::new(sample * self.window[offset + i], 0.0);
        }

        self.fft.process(&mut buffer);

        let scale = 1.0 / self.fft_size as f32;
        let min_decibels = self.min_decibels;
        let range = self.max_decibels - min_decibels;
        let smoothing = self.smoothing;

        buffer[..self.fft_size / 2]
            .iter()
            .zip(self.smoothed.iter_mut())
            .map(|(bin, level)| {
                let magnitude = bin.norm() * scale;
                let blended = smoothing * *level + (1.0 - smoothing) * magnitude;
                *level = if blended.is_finite() { blended } else { 0.0 };

                if *level <= 0.0 {
                    return 0;
                }
                let decibels = 20.0 * level.log10();
                let scaled = 255.0 / range * (decibels - min_decibels);
                scaled.clamp(0.0, 255.0).floor() as u8
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, amplitude: f32, sample_rate: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|n| {
                amplitude * (2.0 * std::f32::consts::PI * frequency * n as f32 / sample_rate).sin()
            })
            .collect()
    }

    #[test]
    fn silence_maps_to_zero() {
        let mut analyser = ByteSpectrumAnalyser::new(2048);
        let bytes = analyser.analyse(&vec![0.0; 2048]);
        assert_eq!(bytes.len(), 1024);
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn tone_peaks_at_its_bin() {
        let sample_rate = 48000.0;
        let mut analyser = ByteSpectrumAnalyser::new(2048);
        // Bin 64 sits exactly on 1500 Hz for 48 kHz / 2048.
        let tone = sine(1500.0, 0.01, sample_rate, 2048);

        let mut bytes = Vec::new();
        for _ in 0..30 {
            bytes = analyser.analyse(&tone);
        }

        let (loudest, &level) = bytes
            .iter()
            .enumerate()
            .max_by_key(|(_, level)| **level)
            .expect("non-empty spectrum");
        assert_eq!(loudest, 64);
        assert!(level > 100, "level was {level}");
        assert!(bytes[64] > bytes[63] && bytes[64] > bytes[65]);
    }

    #[test]
    fn full_scale_tone_saturates() {
        let mut analyser = ByteSpectrumAnalyser::new(1024);
        let tone = sine(44100.0 / 1024.0 * 23.0, 1.0, 44100.0, 1024);
        let mut bytes = Vec::new();
        for _ in 0..5 {
            bytes = analyser.analyse(&tone);
        }
        assert_eq!(bytes.iter().copied().max(), Some(255));
    }

    #[test]
    fn short_input_is_padded() {
        let mut analyser = ByteSpectrumAnalyser::new(512);
        let bytes = analyser.analyse(&[0.5; 100]);
        assert_eq!(bytes.len(), 256);
    }

    #[test]
    fn smoothing_carries_previous_level() {
        let mut analyser = ByteSpectrumAnalyser::new(2048).with_range(-100.0, -30.0, 0.8);
        let tone = sine(1500.0, 0.01, 48000.0, 2048);
        let first = analyser.analyse(&tone)[64];
        let after_silence = analyser.analyse(&vec![0.0; 2048])[64];
        assert!(after_silence > 0);
        assert!(after_silence <= first);

        analyser.reset();
        assert_eq!(analyser.analyse(&vec![0.0; 2048])[64], 0);
    }
}
