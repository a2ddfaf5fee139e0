use whistle_breaker::calibration::CalibrationPhase;
use whistle_breaker::game::Arena;
use whistle_breaker::session::{CalibrationView, PlayView, RenderFrame};

use super::Vertex;

const BRICK_COLOR: [f32; 4] = [0.0, 0.58, 0.87, 1.0];
const PADDLE_COLOR: [f32; 4] = [0.0, 0.58, 0.87, 1.0];
const BALL_COLOR: [f32; 4] = [0.95, 0.95, 0.95, 1.0];
const TRACK_COLOR: [f32; 4] = [0.2, 0.2, 0.25, 1.0];
const LEVEL_COLOR: [f32; 4] = [0.2, 0.8, 0.4, 1.0];
const THRESHOLD_COLOR: [f32; 4] = [0.9, 0.2, 0.2, 1.0];
const WARMUP_COLOR: [f32; 4] = [0.9, 0.65, 0.1, 1.0];
const SAMPLING_COLOR: [f32; 4] = [0.2, 0.6, 0.95, 1.0];

/// Largest byte magnitude the analyser reports.
const FULL_SCALE: f32 = 255.0;

/// Turn a frame into canvas-space triangles. Idle and game-over frames are
/// drawn entirely by the overlay.
pub fn build_scene(frame: &RenderFrame, canvas: &Arena) -> Vec<Vertex> {
    let mut vertices = Vec::new();
    match frame {
        RenderFrame::Play(view) => push_play(&mut vertices, view),
        RenderFrame::Calibration(view) => push_calibration(&mut vertices, view, canvas),
        RenderFrame::Idle { .. } | RenderFrame::GameOver(_) => {}
    }
    vertices
}

fn push_play(vertices: &mut Vec<Vertex>, view: &PlayView) {
    for brick in view.bricks.iter().filter(|brick| brick.alive) {
        push_rect(vertices, brick.x, brick.y, brick.width, brick.height, BRICK_COLOR);
    }

    let paddle = &view.paddle;
    push_rect(vertices, paddle.x, paddle.y, paddle.width, paddle.height, PADDLE_COLOR);

    let ball = &view.ball;
    push_disc(vertices, ball.x, ball.y, ball.radius, BALL_COLOR);
}

fn push_calibration(vertices: &mut Vec<Vertex>, view: &CalibrationView, canvas: &Arena) {
    let track_x = canvas.width * 0.1;
    let track_w = canvas.width * 0.8;

    // Live level against the current threshold
    let level_y = canvas.height * 0.6;
    push_rect(vertices, track_x, level_y, track_w, 16.0, TRACK_COLOR);
    let level = (view.peak.amplitude / FULL_SCALE).clamp(0.0, 1.0);
    if level > 0.0 {
        push_rect(vertices, track_x, level_y, track_w * level, 16.0, LEVEL_COLOR);
    }
    let threshold = view.result.amplitude_threshold / FULL_SCALE;
    if threshold > 0.0 {
        let x = track_x + track_w * threshold.min(1.0);
        push_rect(vertices, x - 1.0, level_y - 4.0, 2.0, 24.0, THRESHOLD_COLOR);
    }

    let progress_y = canvas.height * 0.75;
    push_rect(vertices, track_x, progress_y, track_w, 8.0, TRACK_COLOR);
    let (fraction, color) = match view.phase {
        CalibrationPhase::Warmup { remaining } => (progress(view, remaining.as_secs_f32()), WARMUP_COLOR),
        CalibrationPhase::Sampling { remaining } => {
            (progress(view, remaining.as_secs_f32()), SAMPLING_COLOR)
        }
        CalibrationPhase::Finished => (1.0, SAMPLING_COLOR),
    };
    if fraction > 0.0 {
        push_rect(vertices, track_x, progress_y, track_w * fraction, 8.0, color);
    }
}

fn progress(view: &CalibrationView, remaining: f32) -> f32 {
    let elapsed = view.elapsed.as_secs_f32();
    let total = elapsed + remaining;
    if total > 0.0 {
        (elapsed / total).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn push_rect(vertices: &mut Vec<Vertex>, x: f32, y: f32, width: f32, height: f32, color: [f32; 4]) {
    let corners = [
        [x, y],
        [x + width, y],
        [x + width, y + height],
        [x, y],
        [x + width, y + height],
        [x, y + height],
    ];
    vertices.extend(corners.iter().map(|&[px, py]| Vertex {
        position: [px, py, 0.0],
        color,
        tex_coords: Vertex::SOLID,
    }));
}

fn push_disc(vertices: &mut Vec<Vertex>, cx: f32, cy: f32, radius: f32, color: [f32; 4]) {
    let (x0, y0, x1, y1) = (cx - radius, cy - radius, cx + radius, cy + radius);
    let corners = [
        ([x0, y0], [0.0, 0.0]),
        ([x1, y0], [1.0, 0.0]),
        ([x1, y1], [1.0, 1.0]),
        ([x0, y0], [0.0, 0.0]),
        ([x1, y1], [1.0, 1.0]),
        ([x0, y1], [0.0, 1.0]),
    ];
    vertices.extend(corners.iter().map(|&([px, py], tex_coords)| Vertex {
        position: [px, py, 0.0],
        color,
        tex_coords,
    }));
}
