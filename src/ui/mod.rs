use anyhow::Result;
use egui_wgpu::Renderer;
use egui_winit::State;
use winit::{event::WindowEvent, window::Window};

use whistle_breaker::calibration::{CalibrationPhase, CalibrationResult, CalibrationStep};
use whistle_breaker::session::{GameOutcome, RenderFrame, Session, SessionMode};

use crate::graphics::{GraphicsEngine, OverlayTarget};

/// Something the player asked for this frame. The main loop applies these to
/// the session after rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiCommand {
    StartCalibration(CalibrationStep),
    CancelCalibration,
    StartGame,
    RetryAudio,
}

/// Read-only view of the session the HUD is drawn from.
pub struct HudState<'s> {
    pub mode: SessionMode,
    pub frame: &'s RenderFrame,
    pub result: CalibrationResult,
    /// What "Start game" would play with.
    pub envelope: CalibrationResult,
    pub sample_counts: [usize; 3],
    pub audio_source: Option<&'static str>,
    pub audio_error: Option<String>,
}

impl<'s> HudState<'s> {
    pub fn new(session: &Session, frame: &'s RenderFrame) -> Self {
        Self {
            mode: session.mode(),
            frame,
            result: session.calibration_result(),
            envelope: session.pending_envelope(),
            sample_counts: CalibrationStep::ALL.map(|step| session.sample_count(step)),
            audio_source: session.audio_source_type(),
            audio_error: session.audio_error().map(|e| e.to_string()),
        }
    }

    fn samples(&self, step: CalibrationStep) -> usize {
        let index = CalibrationStep::ALL
            .iter()
            .position(|&candidate| candidate == step)
            .unwrap_or(0);
        self.sample_counts[index]
    }

    /// Steps are offered in order: each needs the previous one to have samples.
    fn step_enabled(&self, step: CalibrationStep) -> bool {
        let idle = matches!(self.mode, SessionMode::Idle | SessionMode::GameOver);
        let ready = step
            .prerequisite()
            .map_or(true, |previous| self.samples(previous) > 0);
        idle && self.audio_source.is_some() && ready
    }

    fn game_enabled(&self) -> bool {
        matches!(self.mode, SessionMode::Idle | SessionMode::GameOver)
            && self.audio_source.is_some()
            && self.envelope.is_complete()
    }
}

pub struct UserInterface {
    context: egui::Context,
    state: State,
    renderer: Renderer,
    show_calibration: bool,
    commands: Vec<UiCommand>,
}

impl UserInterface {
    pub fn new(window: &Window, graphics_engine: &GraphicsEngine) -> Self {
        let context = egui::Context::default();

        let egui_state = State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            &window,
            None,
            None,
        );

        let renderer = Renderer::new(
            &graphics_engine.device,
            graphics_engine.config.format,
            None,
            1,
        );

        Self {
            context,
            state: egui_state,
            renderer,
            show_calibration: true,
            commands: Vec::new(),
        }
    }

    /// Returns true when egui consumed the event.
    pub fn handle_event(&mut self, event: &WindowEvent, window: &Window) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    pub fn take_commands(&mut self) -> Vec<UiCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn render(&mut self, target: OverlayTarget<'_>, window: &Window, hud: &HudState<'_>) -> Result<()> {
        let raw_input = self.state.take_egui_input(window);

        let show_calibration = &mut self.show_calibration;
        let commands = &mut self.commands;

        let full_output = self.context.run(raw_input, |ctx| {
            Self::ui_content(ctx, hud, show_calibration, commands);
        });

        self.state.handle_platform_output(window, full_output.platform_output);

        let tris = self.context.tessellate(full_output.shapes, full_output.pixels_per_point);

        for (id, image_delta) in &full_output.textures_delta.set {
            self.renderer.update_texture(target.device, target.queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: target.size_in_pixels,
            pixels_per_point: full_output.pixels_per_point,
        };

        self.renderer
            .update_buffers(target.device, target.queue, target.encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui render pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            self.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        Ok(())
    }

    fn ui_content(
        ctx: &egui::Context,
        hud: &HudState<'_>,
        show_calibration: &mut bool,
        commands: &mut Vec<UiCommand>,
    ) {
        egui::TopBottomPanel::top("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                match (&hud.audio_source, &hud.audio_error) {
                    (Some(source), _) => {
                        ui.label(format!("Audio: {source}"));
                    }
                    (None, Some(error)) => {
                        ui.colored_label(egui::Color32::LIGHT_RED, format!("Audio: {error}"));
                        if ui.button("Retry").clicked() {
                            commands.push(UiCommand::RetryAudio);
                        }
                    }
                    (None, None) => {
                        ui.label("Audio: none");
                    }
                }

                ui.separator();
                if let RenderFrame::Play(view) = hud.frame {
                    ui.label(format!("Score: {}", view.score));
                    ui.separator();
                    ui.label(format!(
                        "Pitch: {:.0} Hz @ {:.0}",
                        view.peak.frequency, view.peak.amplitude
                    ));
                }
            });
        });

        if *show_calibration && hud.mode != SessionMode::Playing {
            egui::Window::new("Calibration")
                .default_pos([10.0, 40.0])
                .default_width(280.0)
                .show(ctx, |ui| Self::calibration_panel(ui, hud, commands));
        }

        if let RenderFrame::GameOver(summary) = hud.frame {
            egui::Window::new("Game over")
                .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    let headline = match summary.outcome {
                        GameOutcome::Lost => "The ball got away",
                        GameOutcome::Cleared => "All bricks cleared!",
                    };
                    ui.heading(headline);
                    ui.label(format!("Score: {} / {}", summary.score, summary.bricks_total));
                    if ui
                        .add_enabled(hud.game_enabled(), egui::Button::new("Play again"))
                        .clicked()
                    {
                        commands.push(UiCommand::StartGame);
                    }
                });
        }

        if ctx.input(|i| i.key_pressed(egui::Key::F1)) {
            *show_calibration = !*show_calibration;
        }
    }

    fn calibration_panel(ui: &mut egui::Ui, hud: &HudState<'_>, commands: &mut Vec<UiCommand>) {
        for step in CalibrationStep::ALL {
            ui.horizontal(|ui| {
                if ui
                    .add_enabled(hud.step_enabled(step), egui::Button::new(format!("Calibrate {}", step.label())))
                    .clicked()
                {
                    commands.push(UiCommand::StartCalibration(step));
                }
                ui.label(format!("{} samples", hud.samples(step)));
            });
        }

        if let RenderFrame::Calibration(view) = hud.frame {
            ui.separator();
            let status = match view.phase {
                CalibrationPhase::Warmup { remaining } => {
                    format!("Get ready... {:.1}s", remaining.as_secs_f32())
                }
                CalibrationPhase::Sampling { remaining } => {
                    format!("Sampling {} ({:.1}s left)", view.step.label(), remaining.as_secs_f32())
                }
                CalibrationPhase::Finished => format!("Finished {}", view.step.label()),
            };
            ui.label(status);
            ui.label(format!(
                "Peak: {:.0} Hz @ {:.0}",
                view.peak.frequency, view.peak.amplitude
            ));
            if let Some(value) = view.last_used_value {
                ui.label(format!("Last sample: {value:.1}"));
            }
            if hud.mode == SessionMode::Calibrating && ui.button("Cancel").clicked() {
                commands.push(UiCommand::CancelCalibration);
            }
        }

        ui.separator();
        let result = &hud.result;
        egui::Grid::new("calibration_result").num_columns(2).show(ui, |ui| {
            ui.label("Voice level");
            ui.label(format!("{:.1}", result.voice_amplitude));
            ui.end_row();
            ui.label("Noise level");
            ui.label(format!("{:.1}", result.noise_amplitude));
            ui.end_row();
            ui.label("Threshold");
            ui.label(format!("{:.1}", result.amplitude_threshold));
            ui.end_row();
            ui.label("Range");
            ui.label(format!("{:.0} - {:.0} Hz", result.min_freq, result.max_freq));
            ui.end_row();
        });

        ui.separator();
        if ui
            .add_enabled(hud.game_enabled(), egui::Button::new("Start game"))
            .clicked()
        {
            commands.push(UiCommand::StartGame);
        }
        ui.label("F1 toggles this panel, Esc quits");
    }
}
