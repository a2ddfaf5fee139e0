use anyhow::Result;
use clap::Parser;
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use whistle_breaker::audio::WavSource;
use whistle_breaker::calibration::CalibrationStep;
use whistle_breaker::config::{AudioConfig, CalibrationConfig};
use whistle_breaker::game_loop::{run_headless, FrameLoop};
use whistle_breaker::session::SessionMode;
use whistle_breaker::{AcquireError, GameConfig, Session, SpectrumSource};

/// Extra ticks allowed past the nominal step length before giving up.
const TICK_SLACK: u64 = 10;

#[derive(Parser)]
#[command(name = "calibrate-wav")]
#[command(about = "Run the three calibration steps against recordings and print the envelope")]
struct Args {
    /// Recording of the player whistling at a comfortable level
    #[arg(long)]
    voice: PathBuf,

    /// Recording of the quiet room
    #[arg(long)]
    noise: PathBuf,

    /// Recording of a low-to-high whistle sweep
    #[arg(long)]
    whistle: PathBuf,

    /// JSON config file; missing sections use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the resulting envelope here as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn open_recording(
    path: &Path,
    audio: &AudioConfig,
    calibration: &CalibrationConfig,
) -> Result<Box<dyn SpectrumSource>, AcquireError> {
    let source = WavSource::open(path, audio.analyser(), audio.ticks_per_second)?;

    let needed = (calibration.warmup_ms + calibration.sampling_ms) as f32 / 1000.0;
    if source.duration_seconds() < needed {
        warn!(
            "{:?} is {:.1}s long but a step runs {:.1}s; the rest is sampled as silence",
            path,
            source.duration_seconds(),
            needed
        );
    }
    Ok(Box::new(source))
}

/// Drive one step to completion on a fabricated clock.
fn run_step(session: &mut Session, step: CalibrationStep, clock: &mut Instant, interval: Duration) -> Result<()> {
    session.start_calibration_step(step, *clock)?;

    let timings = &session.config().calibration;
    let step_length = Duration::from_millis(timings.warmup_ms + timings.sampling_ms);
    let max_ticks = (step_length.as_secs_f64() / interval.as_secs_f64()).ceil() as u64 + TICK_SLACK;

    let mut frame_loop = FrameLoop::new();
    let ticks = run_headless(&mut frame_loop, max_ticks, |_| {
        *clock += interval;
        session.tick(*clock);
        session.mode() == SessionMode::Calibrating
    });

    if session.mode() == SessionMode::Calibrating {
        session.cancel_calibration();
        return Err(anyhow::anyhow!(
            "calibration of {} did not finish within {} ticks",
            step.label(),
            ticks
        ));
    }

    info!(
        "{}: {} samples over {} ticks",
        step.label(),
        session.sample_count(step),
        ticks
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    config.validate()?;

    let interval = Duration::from_secs_f32(1.0 / config.audio.ticks_per_second);
    let steps = [
        (CalibrationStep::VoiceAmplitude, &args.voice),
        (CalibrationStep::NoiseAmplitude, &args.noise),
        (CalibrationStep::FrequencyRange, &args.whistle),
    ];

    let audio = config.audio.clone();
    let calibration = config.calibration.clone();
    let mut session = Session::new(config, open_recording(&args.voice, &audio, &calibration));
    let mut clock = Instant::now();

    for (index, (step, path)) in steps.into_iter().enumerate() {
        if index > 0 {
            session.attach_audio(open_recording(path, &audio, &calibration))?;
        }
        run_step(&mut session, step, &mut clock, interval)?;
    }

    let result = session.calibration_result();
    session.teardown();

    if result.is_complete() {
        info!("Calibration complete");
    } else {
        warn!("Calibration is incomplete; the game will refuse this envelope");
    }

    let json = serde_json::to_string_pretty(&result)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            info!("Envelope written to {:?}", path);
        }
        None => println!("{json}"),
    }

    Ok(())
}
