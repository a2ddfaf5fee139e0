use log::info;
use std::fmt;
use std::time::{Duration, Instant};

use super::{CalibrationResult, CalibrationState, CalibrationStep};
use crate::audio::Peak;
use crate::config::CalibrationConfig;

/// Lead-in before sampling so the player can get ready.
pub const WARMUP_TIME: Duration = Duration::from_millis(5000);
/// Length of the sampling window that follows the warm-up.
pub const CALIBRATION_TIME: Duration = Duration::from_millis(10000);
/// Frequency samples at or below this are treated as noise.
pub const LOWEST_FREQ: f32 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTimings {
    pub warmup: Duration,
    pub sampling: Duration,
    pub lowest_freq: f32,
}

impl Default for CalibrationTimings {
    fn default() -> Self {
        Self {
            warmup: WARMUP_TIME,
            sampling: CALIBRATION_TIME,
            lowest_freq: LOWEST_FREQ,
        }
    }
}

impl From<&CalibrationConfig> for CalibrationTimings {
    fn from(config: &CalibrationConfig) -> Self {
        Self {
            warmup: Duration::from_millis(config.warmup_ms),
            sampling: Duration::from_millis(config.sampling_ms),
            lowest_freq: config.lowest_freq_hz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineStatus {
    Idle,
    Sampling {
        step: CalibrationStep,
        started_at: Instant,
    },
}

/// Where the active step is within its timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CalibrationPhase {
    Warmup { remaining: Duration },
    Sampling { remaining: Duration },
    Finished,
}

/// What one calibration tick produced, for the renderer and the session.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationTick {
    pub step: CalibrationStep,
    pub phase: CalibrationPhase,
    pub elapsed: Duration,
    pub result: CalibrationResult,
    pub last_used_value: Option<f32>,
    /// True on the tick that closed the step; `result` is the final one.
    pub finalized: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    AlreadySampling(CalibrationStep),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalibrationError::AlreadySampling(step) => {
                write!(f, "calibration of {} is still running", step.label())
            }
        }
    }
}

impl std::error::Error for CalibrationError {}

/// Runs one timed sampling step at a time over a shared `CalibrationState`.
#[derive(Debug, Clone)]
pub struct CalibrationEngine {
    state: CalibrationState,
    status: EngineStatus,
    timings: CalibrationTimings,
}

impl CalibrationEngine {
    pub fn new(timings: CalibrationTimings) -> Self {
        Self {
            state: CalibrationState::new(),
            status: EngineStatus::Idle,
            timings,
        }
    }

    pub fn timings(&self) -> &CalibrationTimings {
        &self.timings
    }

    /// Begin sampling `step` from `now`, discarding only that step's samples.
    pub fn start(&mut self, step: CalibrationStep, now: Instant) -> Result<(), CalibrationError> {
        if let EngineStatus::Sampling { step: active, .. } = self.status {
            return Err(CalibrationError::AlreadySampling(active));
        }

        self.state.clear(step);
        self.status = EngineStatus::Sampling { step, started_at: now };
        info!("Calibration of {} started", step.label());
        Ok(())
    }

    /// Abandon the active step without emitting a result.
    pub fn cancel(&mut self) {
        if let EngineStatus::Sampling { step, .. } = self.status {
            info!("Calibration of {} cancelled", step.label());
        }
        self.status = EngineStatus::Idle;
    }

    pub fn is_sampling(&self) -> bool {
        matches!(self.status, EngineStatus::Sampling { .. })
    }

    pub fn active_step(&self) -> Option<CalibrationStep> {
        match self.status {
            EngineStatus::Sampling { step, .. } => Some(step),
            EngineStatus::Idle => None,
        }
    }

    pub fn samples(&self, step: CalibrationStep) -> &[f32] {
        self.state.samples(step)
    }

    pub fn evaluate(&self) -> CalibrationResult {
        self.state.evaluate()
    }

    /// Advance the active step to `now` using this tick's unbounded peak.
    ///
    /// `previous` is the result handed out by the previous tick; the frequency
    /// step filters on its threshold. Returns `None` while idle.
    pub fn tick(
        &mut self,
        now: Instant,
        peak: &Peak,
        previous: &CalibrationResult,
    ) -> Option<CalibrationTick> {
        let EngineStatus::Sampling { step, started_at } = self.status else {
            return None;
        };

        let elapsed = now.saturating_duration_since(started_at);
        let sampling_ends = self.timings.warmup + self.timings.sampling;

        if elapsed < self.timings.warmup {
            return Some(CalibrationTick {
                step,
                phase: CalibrationPhase::Warmup {
                    remaining: self.timings.warmup - elapsed,
                },
                elapsed,
                result: self.state.evaluate(),
                last_used_value: None,
                finalized: false,
            });
        }

        if elapsed <= sampling_ends {
            let value = step.sample(peak, previous, self.timings.lowest_freq);
            if let Some(value) = value {
                self.state.record(step, value);
            }

            return Some(CalibrationTick {
                step,
                phase: CalibrationPhase::Sampling {
                    remaining: sampling_ends - elapsed,
                },
                elapsed,
                result: self.state.evaluate(),
                last_used_value: value,
                finalized: false,
            });
        }

        let result = self.state.evaluate();
        self.status = EngineStatus::Idle;

        Some(CalibrationTick {
            step,
            phase: CalibrationPhase::Finished,
            elapsed,
            result,
            last_used_value: None,
            finalized: true,
        })
    }
}

impl Default for CalibrationEngine {
    fn default() -> Self {
        Self::new(CalibrationTimings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frequency: f32, level: u8) -> Peak {
        Peak {
            frequency,
            amplitude: level as f32,
        }
    }

    fn at(start: Instant, millis: u64) -> Instant {
        start + Duration::from_millis(millis)
    }

    #[test]
    fn idle_engine_does_nothing() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        assert!(engine.tick(t0, &tone(800.0, 100), &CalibrationResult::default()).is_none());
        assert!(!engine.is_sampling());
    }

    #[test]
    fn warmup_records_nothing() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        engine.start(CalibrationStep::VoiceAmplitude, t0).unwrap();

        let tick = engine
            .tick(at(t0, 4999), &tone(800.0, 100), &CalibrationResult::default())
            .unwrap();
        assert_eq!(
            tick.phase,
            CalibrationPhase::Warmup { remaining: Duration::from_millis(1) }
        );
        assert_eq!(tick.last_used_value, None);
        assert!(engine.samples(CalibrationStep::VoiceAmplitude).is_empty());
    }

    #[test]
    fn sampling_window_is_inclusive() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        let previous = CalibrationResult::default();
        engine.start(CalibrationStep::VoiceAmplitude, t0).unwrap();

        let first = engine.tick(at(t0, 5000), &tone(800.0, 100), &previous).unwrap();
        assert_eq!(first.last_used_value, Some(100.0));
        assert_eq!(first.result.voice_amplitude, 100.0);

        let last = engine.tick(at(t0, 15000), &tone(800.0, 140), &previous).unwrap();
        assert_eq!(last.phase, CalibrationPhase::Sampling { remaining: Duration::ZERO });
        assert!(!last.finalized);
        assert_eq!(engine.samples(CalibrationStep::VoiceAmplitude), &[100.0, 140.0]);

        let done = engine.tick(at(t0, 15001), &tone(800.0, 250), &previous).unwrap();
        assert!(done.finalized);
        assert_eq!(done.phase, CalibrationPhase::Finished);
        assert_eq!(done.result.voice_amplitude, 140.0);
        assert!(!engine.is_sampling());
        assert_eq!(engine.samples(CalibrationStep::VoiceAmplitude).len(), 2);

        // Terminal until restarted.
        assert!(engine.tick(at(t0, 15020), &tone(800.0, 250), &previous).is_none());
    }

    #[test]
    fn start_is_rejected_while_sampling() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        engine.start(CalibrationStep::VoiceAmplitude, t0).unwrap();
        assert_eq!(
            engine.start(CalibrationStep::NoiseAmplitude, t0),
            Err(CalibrationError::AlreadySampling(CalibrationStep::VoiceAmplitude))
        );

        engine.cancel();
        assert!(engine.start(CalibrationStep::NoiseAmplitude, t0).is_ok());
    }

    #[test]
    fn restarting_clears_only_that_step() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        let previous = CalibrationResult::default();

        engine.start(CalibrationStep::VoiceAmplitude, t0).unwrap();
        engine.tick(at(t0, 6000), &tone(800.0, 150), &previous);
        engine.tick(at(t0, 16000), &tone(800.0, 150), &previous);

        engine.start(CalibrationStep::NoiseAmplitude, at(t0, 20000)).unwrap();
        engine.tick(at(t0, 26000), &tone(800.0, 20), &previous);
        engine.tick(at(t0, 36000), &tone(800.0, 20), &previous);

        engine.start(CalibrationStep::VoiceAmplitude, at(t0, 40000)).unwrap();
        assert!(engine.samples(CalibrationStep::VoiceAmplitude).is_empty());
        assert_eq!(engine.samples(CalibrationStep::NoiseAmplitude), &[20.0]);
    }

    #[test]
    fn frequency_filter_uses_previous_threshold() {
        let mut engine = CalibrationEngine::default();
        let t0 = Instant::now();
        engine.start(CalibrationStep::FrequencyRange, t0).unwrap();

        let previous = CalibrationResult {
            amplitude_threshold: 80.0,
            ..CalibrationResult::default()
        };

        let quiet = engine.tick(at(t0, 5100), &tone(900.0, 70), &previous).unwrap();
        assert_eq!(quiet.last_used_value, None);

        let low = engine.tick(at(t0, 5200), &tone(150.0, 200), &previous).unwrap();
        assert_eq!(low.last_used_value, None);

        let good = engine.tick(at(t0, 5300), &tone(900.0, 90), &previous).unwrap();
        assert_eq!(good.last_used_value, Some(900.0));
        assert_eq!(good.result.min_freq, 900.0);
        assert_eq!(good.result.max_freq, 900.0);
    }

    #[test]
    fn configured_timings_are_respected() {
        let mut engine = CalibrationEngine::new(CalibrationTimings {
            warmup: Duration::from_millis(100),
            sampling: Duration::from_millis(200),
            lowest_freq: 200.0,
        });
        let t0 = Instant::now();
        let previous = CalibrationResult::default();
        engine.start(CalibrationStep::NoiseAmplitude, t0).unwrap();

        assert!(matches!(
            engine.tick(at(t0, 50), &tone(800.0, 9), &previous).unwrap().phase,
            CalibrationPhase::Warmup { .. }
        ));
        assert_eq!(
            engine.tick(at(t0, 150), &tone(800.0, 9), &previous).unwrap().last_used_value,
            Some(9.0)
        );
        assert!(engine.tick(at(t0, 301), &tone(800.0, 9), &previous).unwrap().finalized);
    }
}
