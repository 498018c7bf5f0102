//! Engine loop
//!
//! Single-threaded and cooperative: one manor holds the input focus at a
//! time and stop/pause requests are honoured between actions only.

pub mod activity;

pub use activity::ActivityFlag;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::clock::millis;
use crate::manor::{Manor, ManorError, ManorStatus};
use crate::scheduler::Scheduler;
use crate::EngineContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
    Paused,
    /// Waiting for the user to leave the mouse and keyboard alone
    UserActive,
    Stopping,
}

/// What one step or turn ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep going with the same manor
    Continue,
    /// Give the focus to someone else
    YieldWindow,
    Blocked,
    Halted,
    /// Nothing was executed
    Idle,
}

/// Stop and pause requests from other threads
#[derive(Debug, Clone, Default)]
pub struct EngineControl {
    stop: Arc<AtomicBool>,
    paused: Arc<AtomicBool>,
}

impl EngineControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

pub struct Engine {
    ctx: EngineContext,
    manors: Vec<Manor>,
    scheduler: Scheduler,
    state: EngineState,
    current: Option<usize>,
    consecutive_errors: u32,
}

impl Engine {
    pub fn new(ctx: EngineContext) -> Self {
        Self {
            ctx,
            manors: Vec::new(),
            scheduler: Scheduler::new(),
            state: EngineState::Stopped,
            current: None,
            consecutive_errors: 0,
        }
    }

    /// Engine with one scripted manor per configured window
    pub fn from_settings(ctx: EngineContext) -> Self {
        let now = ctx.now();
        let configs = ctx.settings.manors.clone();
        let mut engine = Self::new(ctx);
        for config in configs {
            engine.add_manor(Manor::new(config, now));
        }
        engine
    }

    /// Register a manor, restoring its saved timers
    pub fn add_manor(&mut self, mut manor: Manor) {
        match self.ctx.store.load(manor.id()) {
            Ok(Some(snapshot)) => manor.restore(&snapshot),
            Ok(None) => {}
            Err(e) => log::warn!("[{}] could not load saved timers: {}", manor.id(), e),
        }
        log::info!(
            "[{}] registered ({}), goal '{}'",
            manor.id(),
            manor.config().display_name(),
            manor.config().goal
        );
        self.manors.push(manor);
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut EngineContext {
        &mut self.ctx
    }

    pub fn manors(&self) -> &[Manor] {
        &self.manors
    }

    pub fn manor(&self, id: &str) -> Option<&Manor> {
        self.manors.iter().find(|m| m.id() == id)
    }

    pub fn manor_mut(&mut self, id: &str) -> Option<&mut Manor> {
        self.manors.iter_mut().find(|m| m.id() == id)
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn control(&self) -> EngineControl {
        self.ctx.control.clone()
    }

    pub fn statuses(&self) -> Vec<ManorStatus> {
        self.manors.iter().map(Manor::status).collect()
    }

    /// Run until stopped, every manor is halted, or too many loop errors
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.state = EngineState::Running;
        log::info!("Engine started with {} manors", self.manors.len());
        let limit = self.ctx.settings.engine.max_engine_errors;
        let mut result = Ok(());

        while !self.ctx.control.is_stop_requested() {
            if self.manors.iter().all(Manor::is_halted) {
                log::warn!("No manor left to run");
                break;
            }
            match self.tick() {
                Ok(_) => self.consecutive_errors = 0,
                Err(e) => {
                    self.consecutive_errors += 1;
                    log::error!("Engine error ({}/{}): {}", self.consecutive_errors, limit, e);
                    if self.consecutive_errors >= limit {
                        result = Err(EngineError::TooManyErrors(self.consecutive_errors));
                        break;
                    }
                }
            }
        }

        self.shutdown();
        result
    }

    /// One scheduling decision and, when a manor is ready, its turn
    pub fn tick(&mut self) -> Result<TickOutcome, EngineError> {
        let slice_ms = self.ctx.settings.engine.wait_slice_ms;
        if self.ctx.control.is_paused() {
            if self.state != EngineState::Paused {
                log::info!("Engine paused");
            }
            self.state = EngineState::Paused;
            self.wait(slice_ms as f64 / 1000.0);
            return Ok(TickOutcome::Idle);
        }

        let now = self.ctx.now();
        let idle_secs = self.ctx.settings.engine.user_idle_secs;
        if self.ctx.activity.is_recent(now, idle_secs) {
            if self.state != EngineState::UserActive {
                log::info!("User input detected, standing by");
            }
            self.state = EngineState::UserActive;
            let wait = self.ctx.activity.idle_in(now, idle_secs);
            self.wait(wait);
            return Ok(TickOutcome::Idle);
        }
        if self.state != EngineState::Running {
            log::info!("Engine running");
            self.state = EngineState::Running;
        }

        for manor in &mut self.manors {
            if self.ctx.bus.has_messages(manor.id(), now) {
                manor.mail_arrived();
            }
        }

        let max_wait = self.ctx.settings.engine.max_wait_secs;
        let Some(pick) = self.scheduler.select(&self.manors, now) else {
            log::debug!("Nothing pending, waiting {:.0}s", max_wait);
            self.wait(max_wait);
            return Ok(TickOutcome::Idle);
        };
        if !pick.ready {
            log::debug!("[{}] next in {:.1}s", pick.id, pick.wait_secs);
            self.wait(pick.wait_secs.min(max_wait));
            return Ok(TickOutcome::Idle);
        }

        self.switch_to(pick.index);
        self.turn(pick.index)
    }

    /// Errors of the manor itself end its turn only; store faults reach
    /// the loop's error count
    fn turn(&mut self, index: usize) -> Result<TickOutcome, EngineError> {
        let manor = &mut self.manors[index];
        match manor.prepare_turn(&mut self.ctx) {
            Ok(true) => {}
            Ok(false) => {
                let outcome = if manor.is_halted() {
                    TickOutcome::Halted
                } else if manor.is_blocked() {
                    TickOutcome::Blocked
                } else {
                    TickOutcome::Idle
                };
                let slice = self.ctx.settings.engine.wait_slice_ms;
                self.ctx.clock.sleep(millis(slice));
                return Ok(outcome);
            }
            Err(e) => {
                log::error!("[{}] turn failed: {}", manor.id(), e);
                let now = self.ctx.now();
                return Ok(manor.contain(e, now)?);
            }
        }

        let limit = self.ctx.settings.engine.max_actions_per_turn;
        let base_pause = self.ctx.settings.engine.inter_action_pause_ms;
        let mut outcome = TickOutcome::Continue;
        for _ in 0..limit {
            if self.ctx.control.is_stop_requested() || self.ctx.control.is_paused() {
                break;
            }
            outcome = match manor.execute_next(&mut self.ctx) {
                Ok(outcome) => outcome,
                Err(e) => {
                    log::error!("[{}] action failed: {}", manor.id(), e);
                    let now = self.ctx.now();
                    manor.contain(e, now)?
                }
            };
            if outcome == TickOutcome::Idle {
                break;
            }
            let pause = self
                .ctx
                .humanizer
                .action_pause(&self.ctx.settings.stealth, base_pause);
            self.ctx.clock.sleep(millis(pause));
            if outcome != TickOutcome::Continue {
                break;
            }
        }
        Ok(outcome)
    }

    fn switch_to(&mut self, index: usize) {
        if self.current == Some(index) {
            return;
        }
        if let Some(previous) = self.current {
            self.manors[previous].deactivate();
            let base = self.ctx.settings.engine.inter_window_pause_ms;
            let pause = self.ctx.humanizer.action_pause(&self.ctx.settings.stealth, base);
            self.ctx.clock.sleep(millis(pause));
        }
        log::info!("Focus on [{}]", self.manors[index].id());
        self.current = Some(index);
    }

    /// Sleep `secs` in slices, returning early on a stop request
    fn wait(&self, secs: f64) {
        let slice = self.ctx.settings.engine.wait_slice_ms.max(1);
        let mut remaining = (secs.max(0.0) * 1000.0).round() as u64;
        while remaining > 0 && !self.ctx.control.is_stop_requested() {
            let step = remaining.min(slice);
            self.ctx.clock.sleep(millis(step));
            remaining -= step;
        }
    }

    /// Save every manor's timers
    pub fn shutdown(&mut self) {
        self.state = EngineState::Stopping;
        for manor in &self.manors {
            if let Err(e) = manor.persist(&mut self.ctx) {
                log::warn!("[{}] could not save timers: {}", manor.id(), e);
            }
        }
        self.state = EngineState::Stopped;
        log::info!("Engine stopped");
    }
}

/// Engine errors
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Manor error: {0}")]
    Manor(#[from] ManorError),
    #[error("Stopped after {0} consecutive errors")]
    TooManyErrors(u32),
}
