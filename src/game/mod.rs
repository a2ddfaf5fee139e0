pub mod physics;

pub use physics::StepOutcome;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arena {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ball {
    pub x: f32,
    pub y: f32,
    pub dx: f32,
    pub dy: f32,
    pub radius: f32,
}

/// The paddle only moves horizontally; `y` is its top edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Paddle {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Brick {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub alive: bool,
}

impl Brick {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            alive: true,
        }
    }

    /// Strict containment of a point in the brick's rectangle.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x > self.x && x < self.x + self.width && y > self.y && y < self.y + self.height
    }
}

/// One round of play: created when a game starts, dropped at game over.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    arena: Arena,
    ball: Ball,
    paddle: Paddle,
    bricks: Vec<Brick>,
    score: u32,
    ticks: u64,
}

impl Game {
    pub fn new(config: &GameConfig) -> Self {
        let arena = Arena {
            width: config.canvas.width,
            height: config.canvas.height,
        };

        let ball = Ball {
            x: arena.width / 2.0,
            y: arena.height - config.ball.start_height,
            dx: config.ball.dx,
            dy: config.ball.dy,
            radius: config.ball.radius,
        };

        let paddle = Paddle {
            x: (arena.width - config.paddle.width) / 2.0,
            y: arena.height - config.paddle.height,
            width: config.paddle.width,
            height: config.paddle.height,
        };

        let layout = &config.bricks;
        let mut bricks = Vec::with_capacity(layout.rows * layout.columns);
        for column in 0..layout.columns {
            for row in 0..layout.rows {
                bricks.push(Brick::new(
                    column as f32 * (layout.width + layout.padding) + layout.offset_left,
                    row as f32 * (layout.height + layout.padding) + layout.offset_top,
                    layout.width,
                    layout.height,
                ));
            }
        }

        Self::from_parts(arena, ball, paddle, bricks)
    }

    /// Assemble a game from explicit entities; every brick counts towards the score.
    pub fn from_parts(arena: Arena, ball: Ball, paddle: Paddle, bricks: Vec<Brick>) -> Self {
        Self {
            arena,
            ball,
            paddle,
            bricks,
            score: 0,
            ticks: 0,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn ball(&self) -> &Ball {
        &self.ball
    }

    pub fn paddle(&self) -> &Paddle {
        &self.paddle
    }

    pub fn bricks(&self) -> &[Brick] {
        &self.bricks
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn alive_bricks(&self) -> usize {
        self.bricks.iter().filter(|brick| brick.alive).count()
    }

    pub fn set_paddle_x(&mut self, x: f32) {
        self.paddle.x = x;
    }

    /// Advance the ball one tick.
    pub fn step(&mut self) -> StepOutcome {
        let (ball, hits) = physics::advance(self.ball, &self.paddle, &mut self.bricks, &self.arena);
        self.ball = ball;
        self.score += hits;
        self.ticks += 1;

        if hits > 0 {
            debug!("{} brick(s) hit on tick {}, score {}", hits, self.ticks, self.score);
        }

        if physics::is_lost(&self.ball, &self.arena) {
            StepOutcome::Lost { score: self.score }
        } else if self.alive_bricks() == 0 {
            StepOutcome::Cleared { score: self.score }
        } else {
            StepOutcome::Running
        }
    }
}
