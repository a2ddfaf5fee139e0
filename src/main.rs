use anyhow::Result;
use clap::Parser;
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, Event, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

mod graphics;
mod ui;

use graphics::{build_scene, GraphicsEngine};
use ui::{HudState, UiCommand, UserInterface};
use whistle_breaker::audio::{MicrophoneSource, WavSource};
use whistle_breaker::config::AudioConfig;
use whistle_breaker::game::Arena;
use whistle_breaker::{AcquireError, FrameLoop, GameConfig, RenderFrame, Session, SpectrumSource};

/// Window size relative to the game canvas.
const WINDOW_SCALE: f64 = 2.0;

#[derive(Parser, Debug)]
#[command(name = "whistle-breaker")]
#[command(about = "Brick breaker steered by the pitch of your whistle")]
struct Args {
    /// JSON config file; missing sections use defaults
    #[arg(long)]
    config: Option<PathBuf>,

    /// Replay a WAV recording instead of listening to the microphone
    #[arg(long)]
    wav: Option<PathBuf>,

    /// FFT size (power of two, at least 512)
    #[arg(long)]
    transform_size: Option<usize>,

    /// Canvas width in game units
    #[arg(long)]
    width: Option<f32>,

    /// Canvas height in game units
    #[arg(long)]
    height: Option<f32>,
}

fn load_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };

    if let Some(size) = args.transform_size {
        config.audio.transform_size = size;
    }
    if let Some(width) = args.width {
        config.canvas.width = width;
    }
    if let Some(height) = args.height {
        config.canvas.height = height;
    }

    config.validate()?;
    Ok(config)
}

fn acquire_source(
    wav: Option<&Path>,
    audio: &AudioConfig,
) -> Result<Box<dyn SpectrumSource>, AcquireError> {
    let analyser = audio.analyser();
    match wav {
        Some(path) => Ok(Box::new(WavSource::open(path, analyser, audio.ticks_per_second)?)),
        None => Ok(Box::new(MicrophoneSource::acquire(analyser)?)),
    }
}

fn apply_command(session: &mut Session, command: UiCommand, wav: Option<&Path>) {
    let outcome = match command {
        UiCommand::StartCalibration(step) => session.start_calibration_step(step, Instant::now()),
        UiCommand::CancelCalibration => {
            session.cancel_calibration();
            Ok(())
        }
        UiCommand::StartGame => {
            let envelope = session.pending_envelope();
            session.start_game(envelope)
        }
        UiCommand::RetryAudio => {
            let audio = session.config().audio.clone();
            session.retry_audio(|| acquire_source(wav, &audio))
        }
    };

    if let Err(e) = outcome {
        warn!("{:?} rejected: {}", command, e);
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    info!("Starting Whistle Breaker");

    let config = load_config(&args)?;
    let canvas = Arena {
        width: config.canvas.width,
        height: config.canvas.height,
    };

    let source = acquire_source(args.wav.as_deref(), &config.audio);
    let mut session = Session::new(config, source);

    let event_loop = EventLoop::new()?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Whistle Breaker")
            .with_inner_size(winit::dpi::LogicalSize::new(
                canvas.width as f64 * WINDOW_SCALE,
                canvas.height as f64 * WINDOW_SCALE,
            ))
            .build(&event_loop)?,
    );

    let mut graphics_engine = pollster::block_on(GraphicsEngine::new(&window, canvas.width, canvas.height))?;
    let mut ui = UserInterface::new(&window, &graphics_engine);

    let mut frame_loop = FrameLoop::new();
    frame_loop.start();
    let mut last_frame = RenderFrame::Idle {
        result: session.calibration_result(),
    };

    info!("Game initialized successfully");

    let window_clone = Arc::clone(&window);
    event_loop.run(move |event, elwt| match event {
        Event::WindowEvent { event, .. } => {
            let consumed = ui.handle_event(&event, &window_clone);

            match event {
                WindowEvent::CloseRequested => {
                    info!("Close requested");
                    frame_loop.cancel();
                    session.teardown();
                    elwt.exit();
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if !consumed
                        && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                        && event.state == ElementState::Pressed
                    {
                        info!("Escape pressed");
                        frame_loop.cancel();
                        session.teardown();
                        elwt.exit();
                    }
                }
                WindowEvent::Resized(physical_size) => {
                    graphics_engine.resize(physical_size);
                }
                WindowEvent::RedrawRequested => {
                    if frame_loop.take() {
                        let output = session.tick(Instant::now());
                        if !output.keep_running {
                            frame_loop.cancel();
                        }
                        last_frame = output.frame;
                    }

                    let vertices = build_scene(&last_frame, &canvas);
                    let hud = HudState::new(&session, &last_frame);
                    if let Err(e) =
                        graphics_engine.render(&vertices, |target| ui.render(target, &window_clone, &hud))
                    {
                        error!("Render error: {}", e);
                    }

                    for command in ui.take_commands() {
                        apply_command(&mut session, command, args.wav.as_deref());
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => {
            if frame_loop.request() {
                window_clone.request_redraw();
            }
        }
        _ => {}
    })?;

    Ok(())
}
