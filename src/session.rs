//! One player's session: owns the audio source and sequences calibration and play.

use log::{debug, info, warn};
use serde::Serialize;
use std::fmt;
use std::time::{Duration, Instant};

use crate::audio::{find_peak, AcquireError, Peak, SpectrumSource};
use crate::calibration::{
    CalibrationEngine, CalibrationError, CalibrationPhase, CalibrationResult, CalibrationStep,
    CalibrationTimings,
};
use crate::config::GameConfig;
use crate::control::ControlMapper;
use crate::game::{Arena, Ball, Brick, Game, Paddle, StepOutcome};

/// Debug logging of the play-time peak every this many ticks.
const PEAK_LOG_INTERVAL: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameOutcome {
    Lost,
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GameSummary {
    pub score: u32,
    pub outcome: GameOutcome,
    pub bricks_total: usize,
}

/// Coarse session state for UI gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Idle,
    Calibrating,
    Playing,
    GameOver,
    TornDown,
}

enum Mode {
    Idle,
    Calibrating,
    Playing {
        game: Game,
        envelope: CalibrationResult,
    },
    GameOver {
        summary: GameSummary,
        envelope: CalibrationResult,
    },
    TornDown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    AudioUnavailable(Option<AcquireError>),
    Calibration(CalibrationError),
    IncompleteEnvelope(CalibrationResult),
    /// The command does not apply to the current mode.
    Busy(SessionMode),
    NotPlaying,
    TornDown,
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AudioUnavailable(Some(e)) => write!(f, "audio unavailable: {e}"),
            SessionError::AudioUnavailable(None) => write!(f, "audio unavailable"),
            SessionError::Calibration(e) => write!(f, "{e}"),
            SessionError::IncompleteEnvelope(_) => {
                write!(f, "calibration is incomplete; run all three steps first")
            }
            SessionError::Busy(mode) => write!(f, "session is busy ({mode:?})"),
            SessionError::NotPlaying => write!(f, "no game in progress"),
            SessionError::TornDown => write!(f, "session has been torn down"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::AudioUnavailable(Some(e)) => Some(e),
            SessionError::Calibration(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CalibrationError> for SessionError {
    fn from(e: CalibrationError) -> Self {
        SessionError::Calibration(e)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationView {
    pub step: CalibrationStep,
    pub phase: CalibrationPhase,
    pub elapsed: Duration,
    pub result: CalibrationResult,
    pub last_used_value: Option<f32>,
    pub peak: Peak,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayView {
    pub arena: Arena,
    pub paddle: Paddle,
    pub ball: Ball,
    pub bricks: Vec<Brick>,
    pub score: u32,
    pub peak: Peak,
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderFrame {
    Idle { result: CalibrationResult },
    Calibration(CalibrationView),
    Play(PlayView),
    GameOver(GameSummary),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub frame: RenderFrame,
    pub keep_running: bool,
}

pub struct Session {
    config: GameConfig,
    source: Option<Box<dyn SpectrumSource>>,
    audio_error: Option<AcquireError>,
    engine: CalibrationEngine,
    result: CalibrationResult,
    mapper: ControlMapper,
    mode: Mode,
}

impl Session {
    /// Build a session around an acquisition attempt. A failed acquisition is
    /// kept for display; calibration and play stay disabled until audio is attached.
    pub fn new(config: GameConfig, source: Result<Box<dyn SpectrumSource>, AcquireError>) -> Self {
        let engine = CalibrationEngine::new(CalibrationTimings::from(&config.calibration));
        let mapper = ControlMapper::new(&config.control);
        let mut session = Self {
            config,
            source: None,
            audio_error: None,
            engine,
            result: CalibrationResult::default(),
            mapper,
            mode: Mode::Idle,
        };
        session.install_source(source);
        session
    }

    fn install_source(&mut self, source: Result<Box<dyn SpectrumSource>, AcquireError>) {
        match source {
            Ok(source) => {
                info!(
                    "Audio source attached: {} ({}Hz, {}-point transform)",
                    source.source_type(),
                    source.sample_rate(),
                    source.transform_size()
                );
                self.source = Some(source);
                self.audio_error = None;
            }
            Err(e) => {
                warn!("Audio unavailable: {}", e);
                self.source = None;
                self.audio_error = Some(e);
            }
        }
    }

    /// Replace the audio source, releasing the current one first.
    ///
    /// Only allowed between steps and outside a game.
    pub fn attach_audio(
        &mut self,
        source: Result<Box<dyn SpectrumSource>, AcquireError>,
    ) -> Result<(), SessionError> {
        match self.mode() {
            SessionMode::TornDown => return Err(SessionError::TornDown),
            SessionMode::Calibrating | SessionMode::Playing => {
                return Err(SessionError::Busy(self.mode()))
            }
            SessionMode::Idle | SessionMode::GameOver => {}
        }

        self.release_source();
        self.install_source(source);
        match &self.audio_error {
            Some(e) => Err(SessionError::AudioUnavailable(Some(e.clone()))),
            None => Ok(()),
        }
    }

    /// Try acquiring audio again after a failure.
    pub fn retry_audio<F>(&mut self, acquire: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<Box<dyn SpectrumSource>, AcquireError>,
    {
        if self.mode() == SessionMode::TornDown {
            return Err(SessionError::TornDown);
        }
        info!("Retrying audio acquisition");
        self.attach_audio(acquire())
    }

    fn release_source(&mut self) -> bool {
        match self.source.take() {
            Some(mut source) => {
                source.release();
                info!("Audio source released: {}", source.source_type());
                true
            }
            None => false,
        }
    }

    pub fn start_calibration_step(
        &mut self,
        step: CalibrationStep,
        now: Instant,
    ) -> Result<(), SessionError> {
        match self.mode() {
            SessionMode::TornDown => return Err(SessionError::TornDown),
            SessionMode::Playing => return Err(SessionError::Busy(SessionMode::Playing)),
            _ => {}
        }
        if self.source.is_none() {
            return Err(SessionError::AudioUnavailable(self.audio_error.clone()));
        }

        self.engine.start(step, now)?;
        self.mode = Mode::Calibrating;
        Ok(())
    }

    /// Abandon the running calibration step; samples recorded so far are kept.
    pub fn cancel_calibration(&mut self) {
        if matches!(self.mode, Mode::Calibrating) {
            self.engine.cancel();
            self.result = self.engine.evaluate();
            self.mode = Mode::Idle;
        }
    }

    pub fn start_game(&mut self, envelope: CalibrationResult) -> Result<(), SessionError> {
        match self.mode() {
            SessionMode::TornDown => return Err(SessionError::TornDown),
            SessionMode::Calibrating | SessionMode::Playing => {
                return Err(SessionError::Busy(self.mode()))
            }
            SessionMode::Idle | SessionMode::GameOver => {}
        }
        if self.source.is_none() {
            return Err(SessionError::AudioUnavailable(self.audio_error.clone()));
        }
        if !envelope.is_complete() {
            warn!("Refusing to start with incomplete envelope {:?}", envelope);
            return Err(SessionError::IncompleteEnvelope(envelope));
        }

        // Calibration samples do not outlive the start of a game.
        self.engine = CalibrationEngine::new(*self.engine.timings());
        self.result = CalibrationResult::default();

        let game = Game::new(&self.config);
        info!(
            "Game started: band {:.0}-{:.0}Hz, threshold {:.1}, {} bricks",
            envelope.min_freq,
            envelope.max_freq,
            envelope.amplitude_threshold,
            game.bricks().len()
        );
        self.mode = Mode::Playing { game, envelope };
        Ok(())
    }

    /// End the running game with its final score.
    pub fn report_game_over(
        &mut self,
        score: u32,
        outcome: GameOutcome,
    ) -> Result<GameSummary, SessionError> {
        let (bricks_total, envelope) = match &self.mode {
            Mode::Playing { game, envelope } => (game.bricks().len(), *envelope),
            Mode::TornDown => return Err(SessionError::TornDown),
            _ => return Err(SessionError::NotPlaying),
        };

        let summary = GameSummary {
            score,
            outcome,
            bricks_total,
        };
        info!("Game over ({:?}): score {}/{}", outcome, score, bricks_total);
        self.mode = Mode::GameOver { summary, envelope };
        Ok(summary)
    }

    /// Stop everything and release the audio source. Safe to call repeatedly;
    /// returns true only on the call that released the source.
    pub fn teardown(&mut self) -> bool {
        if matches!(self.mode, Mode::TornDown) {
            return false;
        }
        self.engine.cancel();
        self.mode = Mode::TornDown;
        let released = self.release_source();
        info!("Session torn down");
        released
    }

    /// Run one display tick: sample, update calibration or play, describe the frame.
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let frame = match self.mode {
            Mode::TornDown => {
                return TickOutput {
                    frame: RenderFrame::Idle {
                        result: self.result,
                    },
                    keep_running: false,
                }
            }
            Mode::Idle => {
                self.discard_pending_audio();
                RenderFrame::Idle {
                    result: self.result,
                }
            }
            Mode::GameOver { summary, .. } => {
                self.discard_pending_audio();
                RenderFrame::GameOver(summary)
            }
            Mode::Calibrating => self.tick_calibration(now),
            Mode::Playing { .. } => self.tick_play(),
        };

        TickOutput {
            frame,
            keep_running: true,
        }
    }

    /// Nothing listens outside calibration and play, but the source keeps filling.
    fn discard_pending_audio(&mut self) {
        if let Some(source) = self.source.as_mut() {
            source.discard_pending();
        }
    }

    fn tick_calibration(&mut self, now: Instant) -> RenderFrame {
        let Some(source) = self.source.as_mut() else {
            self.engine.cancel();
            self.mode = Mode::Idle;
            return RenderFrame::Idle {
                result: self.result,
            };
        };

        let snapshot = source.snapshot();
        let peak = find_peak(&snapshot, None, None);

        let Some(tick) = self.engine.tick(now, &peak, &self.result) else {
            self.mode = Mode::Idle;
            return RenderFrame::Idle {
                result: self.result,
            };
        };

        self.result = tick.result;
        if tick.finalized {
            info!(
                "Calibration of {} finished with {} samples: {:?}",
                tick.step.label(),
                self.engine.samples(tick.step).len(),
                tick.result
            );
            self.mode = Mode::Idle;
        }

        RenderFrame::Calibration(CalibrationView {
            step: tick.step,
            phase: tick.phase,
            elapsed: tick.elapsed,
            result: tick.result,
            last_used_value: tick.last_used_value,
            peak,
        })
    }

    fn tick_play(&mut self) -> RenderFrame {
        let (outcome, view) = {
            let Mode::Playing { game, envelope } = &mut self.mode else {
                return RenderFrame::Idle {
                    result: self.result,
                };
            };

            let peak = match self.source.as_mut() {
                Some(source) => {
                    let snapshot = source.snapshot();
                    let (min_freq, max_freq) = self.mapper.peak_window(envelope);
                    find_peak(&snapshot, min_freq, max_freq)
                }
                None => Peak::default(),
            };

            let arena = *game.arena();
            if let Some(x) = self.mapper.paddle_x(&peak, envelope, arena.width, game.paddle().width) {
                game.set_paddle_x(x);
            }
            if game.ticks() % PEAK_LOG_INTERVAL == 0 {
                debug!(
                    "Peak {:.0}Hz @ {:.0}, paddle at {:.1}",
                    peak.frequency,
                    peak.amplitude,
                    game.paddle().x
                );
            }

            let outcome = game.step();
            let view = PlayView {
                arena,
                paddle: *game.paddle(),
                ball: *game.ball(),
                bricks: game.bricks().to_vec(),
                score: game.score(),
                peak,
            };
            (outcome, view)
        };

        let summary = match outcome {
            StepOutcome::Running => None,
            StepOutcome::Lost { score } => self.report_game_over(score, GameOutcome::Lost).ok(),
            StepOutcome::Cleared { score } => self.report_game_over(score, GameOutcome::Cleared).ok(),
        };

        match summary {
            Some(summary) => RenderFrame::GameOver(summary),
            None => RenderFrame::Play(view),
        }
    }

    pub fn mode(&self) -> SessionMode {
        match self.mode {
            Mode::Idle => SessionMode::Idle,
            Mode::Calibrating => SessionMode::Calibrating,
            Mode::Playing { .. } => SessionMode::Playing,
            Mode::GameOver { .. } => SessionMode::GameOver,
            Mode::TornDown => SessionMode::TornDown,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Latest calibration result; the envelope to hand to `start_game`.
    pub fn calibration_result(&self) -> CalibrationResult {
        self.result
    }

    pub fn sample_count(&self, step: CalibrationStep) -> usize {
        self.engine.samples(step).len()
    }

    pub fn active_step(&self) -> Option<CalibrationStep> {
        self.engine.active_step()
    }

    /// Envelope of the running or just finished game.
    pub fn envelope(&self) -> Option<CalibrationResult> {
        match &self.mode {
            Mode::Playing { envelope, .. } | Mode::GameOver { envelope, .. } => Some(*envelope),
            _ => None,
        }
    }

    /// The envelope a new game would start with: the last game's at game over,
    /// otherwise the current calibration result.
    pub fn pending_envelope(&self) -> CalibrationResult {
        match &self.mode {
            Mode::GameOver { envelope, .. } => *envelope,
            _ => self.result,
        }
    }

    pub fn game(&self) -> Option<&Game> {
        match &self.mode {
            Mode::Playing { game, .. } => Some(game),
            _ => None,
        }
    }

    pub fn has_audio(&self) -> bool {
        self.source.is_some()
    }

    pub fn audio_error(&self) -> Option<&AcquireError> {
        self.audio_error.as_ref()
    }

    pub fn audio_source_type(&self) -> Option<&'static str> {
        self.source.as_ref().map(|source| source.source_type())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SpectrumSnapshot;

    struct ConstantSource {
        magnitudes: Vec<u8>,
    }

    impl SpectrumSource for ConstantSource {
        fn sample_rate(&self) -> f32 {
            48000.0
        }

        fn transform_size(&self) -> usize {
            2048
        }

        fn snapshot(&mut self) -> SpectrumSnapshot {
            SpectrumSnapshot::new(self.magnitudes.clone(), self.bin_frequency_step())
        }

        fn release(&mut self) {}

        fn source_type(&self) -> &'static str {
            "constant"
        }
    }

    fn silent() -> Result<Box<dyn SpectrumSource>, AcquireError> {
        Ok(Box::new(ConstantSource {
            magnitudes: vec![0; 1024],
        }))
    }

    fn complete_envelope() -> CalibrationResult {
        CalibrationResult {
            min_freq: 500.0,
            max_freq: 1500.0,
            voice_amplitude: 90.0,
            noise_amplitude: 10.0,
            amplitude_threshold: 50.0,
        }
    }

    #[test]
    fn failed_acquisition_disables_everything() {
        let mut session = Session::new(GameConfig::default(), Err(AcquireError::PermissionDenied));
        assert!(!session.has_audio());
        assert_eq!(session.audio_error(), Some(&AcquireError::PermissionDenied));

        let now = Instant::now();
        assert_eq!(
            session.start_calibration_step(CalibrationStep::VoiceAmplitude, now),
            Err(SessionError::AudioUnavailable(Some(AcquireError::PermissionDenied)))
        );
        assert!(matches!(
            session.start_game(complete_envelope()),
            Err(SessionError::AudioUnavailable(_))
        ));
        assert_eq!(session.mode(), SessionMode::Idle);

        assert!(session.retry_audio(silent).is_ok());
        assert!(session.has_audio());
        assert_eq!(session.audio_error(), None);
    }

    #[test]
    fn incomplete_envelope_is_rejected() {
        let mut session = Session::new(GameConfig::default(), silent());
        let envelope = CalibrationResult {
            noise_amplitude: 0.0,
            ..complete_envelope()
        };
        assert_eq!(
            session.start_game(envelope),
            Err(SessionError::IncompleteEnvelope(envelope))
        );
        assert!(session.start_game(complete_envelope()).is_ok());
        assert_eq!(session.mode(), SessionMode::Playing);
        assert_eq!(session.envelope(), Some(complete_envelope()));
    }

    #[test]
    fn cannot_start_game_while_calibrating() {
        let mut session = Session::new(GameConfig::default(), silent());
        session
            .start_calibration_step(CalibrationStep::NoiseAmplitude, Instant::now())
            .unwrap();
        assert_eq!(
            session.start_game(complete_envelope()),
            Err(SessionError::Busy(SessionMode::Calibrating))
        );
        assert!(matches!(
            session.start_calibration_step(CalibrationStep::VoiceAmplitude, Instant::now()),
            Err(SessionError::Calibration(CalibrationError::AlreadySampling(
                CalibrationStep::NoiseAmplitude
            )))
        ));

        session.cancel_calibration();
        assert_eq!(session.mode(), SessionMode::Idle);
        assert!(session.start_game(complete_envelope()).is_ok());
    }

    #[test]
    fn game_over_outside_a_game_is_rejected() {
        let mut session = Session::new(GameConfig::default(), silent());
        assert_eq!(
            session.report_game_over(3, GameOutcome::Lost),
            Err(SessionError::NotPlaying)
        );

        session.start_game(complete_envelope()).unwrap();
        let summary = session.report_game_over(3, GameOutcome::Lost).unwrap();
        assert_eq!(summary.score, 3);
        assert_eq!(summary.bricks_total, 15);
        assert_eq!(session.mode(), SessionMode::GameOver);
        assert_eq!(session.tick(Instant::now()).frame, RenderFrame::GameOver(summary));
    }

    #[test]
    fn starting_a_game_discards_calibration() {
        let mut session = Session::new(GameConfig::default(), silent());
        let t0 = Instant::now();
        session
            .start_calibration_step(CalibrationStep::VoiceAmplitude, t0)
            .unwrap();
        session.tick(t0 + Duration::from_millis(6000));
        assert_eq!(session.sample_count(CalibrationStep::VoiceAmplitude), 1);
        session.cancel_calibration();

        session.start_game(complete_envelope()).unwrap();
        assert_eq!(session.sample_count(CalibrationStep::VoiceAmplitude), 0);
        assert_eq!(session.calibration_result(), CalibrationResult::default());

        session.report_game_over(0, GameOutcome::Lost).unwrap();
        assert_eq!(session.pending_envelope(), complete_envelope());
        assert_eq!(session.envelope(), Some(complete_envelope()));
    }

    #[test]
    fn teardown_is_terminal() {
        let mut session = Session::new(GameConfig::default(), silent());
        assert!(session.teardown());
        assert!(!session.teardown());

        let output = session.tick(Instant::now());
        assert!(!output.keep_running);
        assert_eq!(session.start_game(complete_envelope()), Err(SessionError::TornDown));
        assert_eq!(
            session.start_calibration_step(CalibrationStep::VoiceAmplitude, Instant::now()),
            Err(SessionError::TornDown)
        );
        assert_eq!(session.attach_audio(silent()), Err(SessionError::TornDown));
    }
}
