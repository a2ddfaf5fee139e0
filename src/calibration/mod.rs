//! Calibration: timed sampling of voice level, room noise and whistle range,
//! reduced to the envelope the control mapper plays with.

pub mod engine;
pub mod state;

pub use engine::{
    CalibrationEngine, CalibrationError, CalibrationPhase, CalibrationTick, CalibrationTimings,
    CALIBRATION_TIME, LOWEST_FREQ, WARMUP_TIME,
};
pub use state::{CalibrationResult, CalibrationState, CalibrationStep};
