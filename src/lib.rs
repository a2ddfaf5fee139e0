//! Whistle-controlled brick breaker.
//!
//! A spectrum source feeds a per-player calibration, and the calibrated
//! envelope maps the dominant pitch onto the paddle while the ball runs.

pub mod audio;
pub mod calibration;
pub mod config;
pub mod control;
pub mod game;
pub mod game_loop;
pub mod session;

pub use audio::{AcquireError, Peak, SpectrumSnapshot, SpectrumSource};
pub use calibration::{CalibrationEngine, CalibrationResult, CalibrationStep};
pub use config::GameConfig;
pub use game_loop::FrameLoop;
pub use session::{RenderFrame, Session, SessionError, TickOutput};
