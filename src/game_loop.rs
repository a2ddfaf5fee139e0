use log::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    Stopped,
    Running { pending: bool },
}

/// Display-driven tick scheduler.
///
/// The windowing layer asks for a frame with `request` once per refresh and
/// only runs a tick when `take` grants one, so at most one tick is ever
/// outstanding. After `cancel` nothing is granted until the loop is started again.
#[derive(Debug, Clone)]
pub struct FrameLoop {
    state: LoopState,
    ticks: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Stopped,
            ticks: 0,
        }
    }

    /// Returns false if the loop was already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = LoopState::Running { pending: false };
        debug!("Frame loop started");
        true
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, LoopState::Running { .. })
    }

    /// Schedule the next tick. Returns true when the caller should ask the
    /// display for a redraw; false if stopped or a tick is already pending.
    pub fn request(&mut self) -> bool {
        match self.state {
            LoopState::Running { pending: false } => {
                self.state = LoopState::Running { pending: true };
                true
            }
            _ => false,
        }
    }

    /// Consume the pending tick, if any.
    pub fn take(&mut self) -> bool {
        match self.state {
            LoopState::Running { pending: true } => {
                self.state = LoopState::Running { pending: false };
                self.ticks += 1;
                true
            }
            _ => false,
        }
    }

    /// Stop scheduling; a pending tick is dropped. Returns true if the loop was running.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.is_running();
        if was_running {
            debug!("Frame loop cancelled after {} ticks", self.ticks);
        }
        self.state = LoopState::Stopped;
        was_running
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

/// Drive `tick` without a display until it asks to stop or `max_ticks` have run.
///
/// Returns the number of ticks executed.
pub fn run_headless<F>(frame_loop: &mut FrameLoop, max_ticks: u64, mut tick: F) -> u64
where
    F: FnMut(u64) -> bool,
{
    frame_loop.start();
    let mut executed = 0;
    while executed < max_ticks && frame_loop.request() && frame_loop.take() {
        let keep_running = tick(executed);
        executed += 1;
        if !keep_running {
            frame_loop.cancel();
        }
    }
    executed
}
