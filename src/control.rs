//! Pitch-to-paddle mapping.

use crate::audio::Peak;
use crate::calibration::CalibrationResult;
use crate::config::ControlConfig;

/// Paddle x for a live peak, or `None` when the paddle should stay put.
///
/// Peaks at or below the envelope's amplitude threshold are ignored so room
/// noise cannot nudge the paddle. The calibrated band maps linearly onto
/// `[0, canvas_width - paddle_width]` without clamping, so pitches outside the
/// band put the paddle past the canvas edge. A zero-width band never moves it.
pub fn map_to_paddle_x(
    peak: &Peak,
    envelope: &CalibrationResult,
    canvas_width: f32,
    paddle_width: f32,
) -> Option<f32> {
    if peak.amplitude <= envelope.amplitude_threshold {
        return None;
    }

    let band = envelope.band_width();
    if band == 0.0 || !band.is_finite() {
        return None;
    }

    let normalized = (peak.frequency - envelope.min_freq) / band;
    let x = normalized * (canvas_width - paddle_width);
    x.is_finite().then_some(x)
}

/// Play-time control policy on top of `map_to_paddle_x`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlMapper {
    clamp_paddle: bool,
    band_limited_peak: bool,
}

impl ControlMapper {
    pub fn new(config: &ControlConfig) -> Self {
        Self {
            clamp_paddle: config.clamp_paddle,
            band_limited_peak: config.band_limited_peak,
        }
    }

    /// Frequency window the play-time peak search should use.
    pub fn peak_window(&self, envelope: &CalibrationResult) -> (Option<f32>, Option<f32>) {
        if self.band_limited_peak {
            (Some(envelope.min_freq), Some(envelope.max_freq))
        } else {
            (None, None)
        }
    }

    pub fn paddle_x(
        &self,
        peak: &Peak,
        envelope: &CalibrationResult,
        canvas_width: f32,
        paddle_width: f32,
    ) -> Option<f32> {
        let x = map_to_paddle_x(peak, envelope, canvas_width, paddle_width)?;
        if self.clamp_paddle {
            Some(x.clamp(0.0, (canvas_width - paddle_width).max(0.0)))
        } else {
            Some(x)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn envelope() -> CalibrationResult {
        CalibrationResult {
            min_freq: 500.0,
            max_freq: 1500.0,
            voice_amplitude: 90.0,
            noise_amplitude: 10.0,
            amplitude_threshold: 50.0,
        }
    }

    #[test]
    fn quiet_peaks_do_not_move_the_paddle() {
        let peak = Peak { frequency: 1000.0, amplitude: 40.0 };
        assert_eq!(map_to_paddle_x(&peak, &envelope(), 480.0, 80.0), None);

        let at_threshold = Peak { frequency: 1000.0, amplitude: 50.0 };
        assert_eq!(map_to_paddle_x(&at_threshold, &envelope(), 480.0, 80.0), None);
    }

    #[test]
    fn band_maps_linearly_onto_the_track() {
        let env = envelope();
        let low = Peak { frequency: 500.0, amplitude: 100.0 };
        let mid = Peak { frequency: 1000.0, amplitude: 100.0 };
        let high = Peak { frequency: 1500.0, amplitude: 100.0 };

        assert_relative_eq!(map_to_paddle_x(&low, &env, 480.0, 80.0).unwrap(), 0.0);
        assert_relative_eq!(map_to_paddle_x(&mid, &env, 480.0, 80.0).unwrap(), 200.0);
        assert_relative_eq!(map_to_paddle_x(&high, &env, 480.0, 80.0).unwrap(), 400.0);
    }

    #[test]
    fn out_of_band_pitch_is_not_clamped() {
        let peak = Peak { frequency: 2000.0, amplitude: 100.0 };
        assert_relative_eq!(map_to_paddle_x(&peak, &envelope(), 480.0, 80.0).unwrap(), 600.0);

        let peak = Peak { frequency: 250.0, amplitude: 100.0 };
        assert_relative_eq!(map_to_paddle_x(&peak, &envelope(), 480.0, 80.0).unwrap(), -100.0);
    }

    #[test]
    fn zero_width_band_never_moves() {
        let env = CalibrationResult {
            min_freq: 900.0,
            max_freq: 900.0,
            ..envelope()
        };
        let peak = Peak { frequency: 900.0, amplitude: 200.0 };
        assert_eq!(map_to_paddle_x(&peak, &env, 480.0, 80.0), None);
    }

    #[test]
    fn mapper_policies() {
        let env = envelope();
        let peak = Peak { frequency: 2000.0, amplitude: 100.0 };

        let plain = ControlMapper::default();
        assert_eq!(plain.peak_window(&env), (None, None));
        assert_relative_eq!(plain.paddle_x(&peak, &env, 480.0, 80.0).unwrap(), 600.0);

        let clamped = ControlMapper::new(&ControlConfig {
            clamp_paddle: true,
            band_limited_peak: true,
        });
        assert_eq!(clamped.peak_window(&env), (Some(500.0), Some(1500.0)));
        assert_relative_eq!(clamped.paddle_x(&peak, &env, 480.0, 80.0).unwrap(), 400.0);
    }
}
