use super::{Arena, Ball, Brick, Paddle};

/// Result of one physics step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Running,
    /// The ball left through the bottom edge.
    Lost { score: u32 },
    /// No bricks are left standing.
    Cleared { score: u32 },
}

impl StepOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StepOutcome::Running)
    }
}

/// Move the ball one tick and resolve its collisions.
///
/// Returns the replacement ball and the number of bricks destroyed. Every brick
/// hit on the same tick flips `dy` again, so two simultaneous hits cancel out.
pub fn advance(ball: Ball, paddle: &Paddle, bricks: &mut [Brick], arena: &Arena) -> (Ball, u32) {
    let mut next = Ball {
        x: ball.x + ball.dx,
        y: ball.y + ball.dy,
        ..ball
    };
    let r = next.radius;

    // Walls only reflect a ball that is still heading into them.
    let past_right = next.x + r > arena.width && next.dx > 0.0;
    let past_left = next.x - r < 0.0 && next.dx < 0.0;
    if past_right || past_left {
        next.dx = -next.dx;
    }
    if next.y - r < 0.0 && next.dy < 0.0 {
        next.dy = -next.dy;
    }

    let over_paddle = next.x >= paddle.x && next.x <= paddle.x + paddle.width;
    if next.dy > 0.0 && next.y + r > paddle.y && over_paddle {
        next.dy = -next.dy;
    }

    let mut hits = 0;
    for brick in bricks.iter_mut().filter(|brick| brick.alive) {
        if brick.contains(next.x, next.y) {
            next.dy = -next.dy;
            brick.alive = false;
            hits += 1;
        }
    }

    (next, hits)
}

/// True once the ball's bottom edge is below the canvas.
pub fn is_lost(ball: &Ball, arena: &Arena) -> bool {
    ball.y + ball.radius > arena.height
}
