//! Window controller
//!
//! A [`Manor`] owns everything about one emulator window: where it is in
//! the graph, what it expects to see next, its queued actions, timers and
//! health. The engine calls [`Manor::prepare_turn`] when the manor gets the
//! input focus and then [`Manor::execute_next`] action by action.

pub mod behavior;
pub mod timers;

pub use behavior::{ManorBehavior, ScriptedBehavior};
pub use timers::{Slot, Timer, TimerBook};

use serde::Serialize;

use crate::action::{
    self, Action, ActionError, ActionSequence, Entry, ExecContext, Origin, StepOutcome, Variables,
};
use crate::bus::Message;
use crate::config::ManorConfig;
use crate::engine::TickOutcome;
use crate::graph::{Destination, GraphError};
use crate::intercept::KnownError;
use crate::persist::{ManorSnapshot, PersistError};
use crate::ports::{InputError, VisionError, WindowId};
use crate::scheduler::Schedulable;
use crate::EngineContext;

/// Read-only view of a manor handed to action factories and behaviours
#[derive(Debug, Clone, Copy)]
pub struct ManorView<'a> {
    pub id: &'a str,
    pub window: &'a WindowId,
    pub current_state: Option<&'a str>,
    pub variables: &'a Variables,
    /// Messages received for this turn, empty outside `on_ready`
    pub inbox: &'a [Message],
}

fn view_of<'a>(
    config: &'a ManorConfig,
    current_state: &'a Option<String>,
    variables: &'a Variables,
) -> ManorView<'a> {
    ManorView {
        id: &config.id,
        window: &config.window,
        current_state: current_state.as_deref(),
        variables,
        inbox: &[],
    }
}

/// Health of a manor
#[derive(Debug, Clone, PartialEq)]
pub enum ManorCondition {
    Running,
    /// Needs a restart
    Blocked { since: f64, reason: String },
    /// Out of the rotation for good
    Halted { reason: String },
}

/// What the next detection should look for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expectation {
    /// Full detection
    Unknown,
    /// Full detection, a different result is logged
    Known(String),
    /// Only these are tested
    Candidates(Vec<String>),
}

impl Expectation {
    fn after(destination: &Destination) -> Self {
        match destination {
            Destination::State(name) => Expectation::Known(name.clone()),
            Destination::Uncertain(u) if u.candidates.is_empty() => Expectation::Unknown,
            Destination::Uncertain(u) => Expectation::Candidates(u.candidates.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ManorStats {
    pub actions_executed: u64,
    pub actions_failed: u64,
    pub errors_detected: u64,
    pub reboots: u32,
    pub turns: u64,
}

/// Snapshot of a manor for logs and the CLI
#[derive(Debug, Clone, Serialize)]
pub struct ManorStatus {
    pub id: String,
    pub name: String,
    pub window: String,
    pub current_state: Option<String>,
    pub goal: String,
    pub navigation_target: Option<String>,
    pub condition: String,
    pub pending_actions: usize,
    pub stats: ManorStats,
}

pub struct Manor {
    config: ManorConfig,
    behavior: Box<dyn ManorBehavior>,
    current_state: Option<String>,
    expectation: Expectation,
    navigation_target: Option<String>,
    active: bool,
    sequence: ActionSequence,
    book: TimerBook,
    variables: Variables,
    condition: ManorCondition,
    consecutive_failures: u32,
    consecutive_interceptions: u32,
    excluded_until: f64,
    delayed_until: f64,
    reboot_allowed_at: f64,
    restarting: bool,
    rotation_requested: bool,
    launched_at: f64,
    reached_goal: bool,
    mail_waiting: bool,
    stats: ManorStats,
}

impl Manor {
    /// Manor driven by the tasks and restart script of its config
    pub fn new(config: ManorConfig, now: f64) -> Self {
        let behavior = ScriptedBehavior::from_config(&config);
        Self::with_behavior(config, Box::new(behavior), now)
    }

    pub fn with_behavior(config: ManorConfig, behavior: Box<dyn ManorBehavior>, now: f64) -> Self {
        let mut book = TimerBook::new();
        behavior.install(&mut book, now);
        Self {
            variables: config.variables.clone(),
            config,
            behavior,
            current_state: None,
            expectation: Expectation::Unknown,
            navigation_target: None,
            active: false,
            sequence: ActionSequence::new(),
            book,
            condition: ManorCondition::Running,
            consecutive_failures: 0,
            consecutive_interceptions: 0,
            excluded_until: 0.0,
            delayed_until: 0.0,
            reboot_allowed_at: 0.0,
            restarting: false,
            rotation_requested: false,
            launched_at: now,
            reached_goal: false,
            mail_waiting: false,
            stats: ManorStats::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &ManorConfig {
        &self.config
    }

    pub fn window(&self) -> &WindowId {
        &self.config.window
    }

    pub fn current_state(&self) -> Option<&str> {
        self.current_state.as_deref()
    }

    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    pub fn navigation_target(&self) -> Option<&str> {
        self.navigation_target.as_deref()
    }

    pub fn condition(&self) -> &ManorCondition {
        &self.condition
    }

    pub fn is_halted(&self) -> bool {
        matches!(self.condition, ManorCondition::Halted { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self.condition, ManorCondition::Blocked { .. })
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn sequence(&self) -> &ActionSequence {
        &self.sequence
    }

    pub fn timers(&self) -> &TimerBook {
        &self.book
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn stats(&self) -> &ManorStats {
        &self.stats
    }

    /// Queue work behind whatever is pending
    pub fn enqueue(&mut self, actions: Vec<Action>) {
        self.sequence.push_all(actions, Origin::Task);
    }

    /// Messages wait on the bus; the manor wants a turn at its goal
    pub fn mail_arrived(&mut self) {
        self.mail_waiting = true;
    }

    /// Give up the focus after the current action
    pub fn request_rotation(&mut self) {
        self.rotation_requested = true;
    }

    /// Mark the manor as no longer holding the input focus
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn snapshot(&self, now: f64) -> ManorSnapshot {
        ManorSnapshot {
            timers: self.book.timers().to_vec(),
            slots: self.book.slots().to_vec(),
            saved_at: now,
        }
    }

    pub fn restore(&mut self, snapshot: &ManorSnapshot) {
        self.book.restore(&snapshot.timers, &snapshot.slots);
        log::debug!(
            "[{}] restored {} timers and {} slots",
            self.config.id,
            snapshot.timers.len(),
            snapshot.slots.len()
        );
    }

    pub fn persist(&self, ctx: &mut EngineContext) -> Result<(), PersistError> {
        let now = ctx.now();
        ctx.store.save(&self.config.id, &self.snapshot(now))
    }

    pub fn status(&self) -> ManorStatus {
        let condition = match &self.condition {
            ManorCondition::Running => "running".to_string(),
            ManorCondition::Blocked { reason, .. } => format!("blocked: {}", reason),
            ManorCondition::Halted { reason } => format!("halted: {}", reason),
        };
        ManorStatus {
            id: self.config.id.clone(),
            name: self.config.display_name().to_string(),
            window: self.config.window.to_string(),
            current_state: self.current_state.clone(),
            goal: self.config.goal.clone(),
            navigation_target: self.navigation_target.clone(),
            condition,
            pending_actions: self.sequence.remaining(),
            stats: self.stats.clone(),
        }
    }

    /// Get the manor ready to execute actions
    ///
    /// Returns `true` when actions are queued. Once the sequence holds
    /// pending actions this makes no vision calls.
    pub fn prepare_turn(&mut self, ctx: &mut EngineContext) -> Result<bool, ManorError> {
        let now = ctx.now();
        self.stats.turns += 1;

        match self.condition {
            ManorCondition::Halted { .. } => return Ok(false),
            ManorCondition::Blocked { .. } => {
                self.try_recover(ctx, now);
                return Ok(false);
            }
            ManorCondition::Running => {}
        }

        if !self.restarting {
            let view = view_of(&self.config, &self.current_state, &self.variables);
            if self.behavior.detect_error(&view, ctx.input.as_mut())? {
                self.block(now, "error condition detected");
                self.try_recover(ctx, now);
                return Ok(false);
            }
        }

        if !self.reached_goal && now - self.launched_at > ctx.settings.engine.launch_timeout_secs {
            let reason = format!(
                "goal '{}' not reached {:.0}s after launch",
                self.config.goal,
                now - self.launched_at
            );
            self.block(now, reason);
            return Ok(false);
        }

        if now < self.excluded_until {
            return Ok(false);
        }

        if !self.active {
            match self.resume(ctx) {
                Ok(()) => {}
                Err(ManorError::Input(e)) => {
                    self.block(now, e.to_string());
                    return Ok(false);
                }
                Err(e) => return Err(e),
            }
        }

        if now < self.delayed_until {
            return Ok(false);
        }

        if self.sequence.is_end() {
            self.plan(ctx, now)?;
        }
        Ok(!self.sequence.is_end())
    }

    /// Route towards `goal` ahead of the pending work
    ///
    /// The target overrides the configured goal until it is reached.
    /// Returns `true` when the manor is already there.
    pub fn navigate_to(&mut self, goal: &str, ctx: &mut EngineContext) -> Result<bool, ManorError> {
        if !ctx.graph.contains(goal) {
            return Err(GraphError::UnknownState(goal.to_string()).into());
        }
        self.navigation_target = Some(goal.to_string());

        let Some(state) = self.detect(ctx)? else {
            log::debug!("[{}] navigation to '{}' waits for a known state", self.config.id, goal);
            return Ok(false);
        };
        self.current_state = Some(state.clone());
        self.expectation = Expectation::Known(state.clone());
        if state == goal {
            log::debug!("[{}] already in '{}'", self.config.id, goal);
            self.navigation_target = None;
            return Ok(true);
        }

        self.sequence.push_front_actions(
            vec![Action::Navigate {
                goal: goal.to_string(),
            }],
            Origin::Task,
        );
        self.queue_next_transition(ctx, &state, goal, true)?;
        Ok(false)
    }

    /// Run one action, then the interception pass
    pub fn execute_next(&mut self, ctx: &mut EngineContext) -> Result<TickOutcome, ManorError> {
        match self.condition {
            ManorCondition::Halted { .. } => return Ok(TickOutcome::Halted),
            ManorCondition::Blocked { .. } => return Ok(TickOutcome::Blocked),
            ManorCondition::Running => {}
        }
        let Some(entry) = self.sequence.next() else {
            return Ok(TickOutcome::Idle);
        };
        let now = ctx.now();

        let result = {
            let mut exec = ExecContext {
                manor: &self.config.id,
                window: &self.config.window,
                vision: ctx.vision.as_mut(),
                input: ctx.input.as_mut(),
                clock: ctx.clock.as_ref(),
                humanizer: &mut ctx.humanizer,
                stealth: &ctx.settings.stealth,
                variables: &mut self.variables,
                bus: &mut ctx.bus,
            };
            action::execute(&entry.action, &mut exec)
        };
        self.stats.actions_executed += 1;

        let mut expanded = false;
        match result {
            Ok(StepOutcome::Done) => self.consecutive_failures = 0,
            Ok(StepOutcome::Skipped) => return Ok(self.after_step()),
            Ok(StepOutcome::Expanded(actions)) => {
                expanded = true;
                self.sequence.push_front_actions(actions, entry.origin);
            }
            Ok(StepOutcome::Waiting { deadline, action }) => {
                self.sequence.push_front(vec![Entry::new(action, entry.origin)]);
                self.delayed_until = deadline;
                return Ok(TickOutcome::YieldWindow);
            }
            Ok(StepOutcome::Replan) => {
                let dropped = self.sequence.discard_origin(entry.origin);
                log::debug!("[{}] replanning, {} actions dropped", self.config.id, dropped);
                self.current_state = None;
                ctx.vision.invalidate(&self.config.window);
            }
            Ok(StepOutcome::Navigate(goal)) => {
                if let Err(e) = self.navigate_to(&goal, ctx) {
                    if self.is_halted() {
                        return Ok(TickOutcome::Halted);
                    }
                    return Err(e);
                }
            }
            Ok(StepOutcome::Yield) => self.rotation_requested = true,
            Ok(StepOutcome::Failed(reason)) => {
                if let Some(outcome) = self.step_failed(ctx, now, &entry, &reason)? {
                    return Ok(outcome);
                }
            }
            Err(ActionError::Vision(e @ VisionError::TemplateNotFound(_))) => return Err(e.into()),
            Err(e) => {
                if let Some(outcome) = self.step_failed(ctx, now, &entry, &e.to_string())? {
                    return Ok(outcome);
                }
            }
        }

        if let Some(outcome) = self.intercept(ctx, now, &entry, expanded)? {
            return Ok(outcome);
        }
        Ok(self.after_step())
    }

    /// Turn an error of this manor's turn into an outcome
    ///
    /// Configuration faults halt the manor, anything else blocks it until
    /// its next restart. Store errors concern every manor and are handed
    /// back.
    pub fn contain(&mut self, error: ManorError, now: f64) -> Result<TickOutcome, ManorError> {
        if matches!(error, ManorError::Persist(_)) {
            return Err(error);
        }
        if self.is_halted() {
            return Ok(TickOutcome::Halted);
        }
        if error.is_config_fault() {
            self.halt(error.to_string());
            Ok(TickOutcome::Halted)
        } else {
            self.block(now, error.to_string());
            Ok(TickOutcome::Blocked)
        }
    }

    fn after_step(&mut self) -> TickOutcome {
        if std::mem::take(&mut self.rotation_requested) {
            TickOutcome::YieldWindow
        } else {
            TickOutcome::Continue
        }
    }

    fn resume(&mut self, ctx: &mut EngineContext) -> Result<(), ManorError> {
        let window = &self.config.window;
        ctx.input.activate_window(window)?;
        if let Some(placement) = self.config.placement {
            if ctx.input.get_window_rect(window)? != Some(placement) {
                log::info!("[{}] moving window back into place", self.config.id);
                ctx.input.place_window(window, placement)?;
            }
        }
        self.active = true;

        let view = view_of(&self.config, &self.current_state, &self.variables);
        self.behavior.on_resume(&view);
        ctx.vision.invalidate(window);
        if self.sequence.is_end() {
            self.expectation = Expectation::Unknown;
        }
        Ok(())
    }

    fn plan(&mut self, ctx: &mut EngineContext, now: f64) -> Result<(), ManorError> {
        self.restarting = false;

        let Some(state) = self.detect(ctx)? else {
            self.current_state = None;
            self.expectation = Expectation::Unknown;
            self.delayed_until = now + ctx.settings.engine.unknown_retry_secs;
            self.record_failure(ctx, now, "no known state on screen");
            return Ok(());
        };
        self.current_state = Some(state.clone());
        self.expectation = Expectation::Known(state.clone());

        if self.navigation_target.as_deref() == Some(state.as_str()) {
            log::info!("[{}] reached navigation target '{}'", self.config.id, state);
            self.navigation_target = None;
        }
        let target = self
            .navigation_target
            .clone()
            .unwrap_or_else(|| self.config.goal.clone());

        if state != target {
            return self.queue_next_transition(ctx, &state, &target, false);
        }

        if !self.reached_goal {
            log::info!("[{}] reached goal '{}'", self.config.id, state);
            self.reached_goal = true;
        }
        self.mail_waiting = false;
        let inbox = ctx.bus.receive(&self.config.id, now);
        let view = ManorView {
            inbox: &inbox,
            ..view_of(&self.config, &self.current_state, &self.variables)
        };
        let work = self.behavior.on_ready(&view, &mut self.book, now);
        if !work.is_empty() {
            self.sequence.push_all(work, Origin::Task);
        }
        if self.book.take_dirty() {
            self.persist(ctx)?;
        }
        Ok(())
    }

    fn detect(&mut self, ctx: &mut EngineContext) -> Result<Option<String>, ManorError> {
        let window = &self.config.window;
        let vision = ctx.vision.as_mut();
        let found = match &self.expectation {
            Expectation::Unknown => ctx.graph.detect_current_state(vision, window, None)?,
            Expectation::Known(name) => {
                // a popup can cover the expected state, so priorities still apply
                let found = ctx.graph.detect_current_state(vision, window, None)?;
                if let Some(state) = found.filter(|s| &s.name != name) {
                    log::debug!(
                        "[{}] expected '{}', found '{}'",
                        self.config.id,
                        name,
                        state.name
                    );
                }
                found
            }
            Expectation::Candidates(names) => {
                ctx.graph.detect_current_state(vision, window, Some(names))?
            }
        };
        match found {
            Some(state) => Ok(Some(state.name.clone())),
            None => {
                log::warn!("[{}] no known state on screen", self.config.id);
                Ok(None)
            }
        }
    }

    fn queue_next_transition(
        &mut self,
        ctx: &mut EngineContext,
        from: &str,
        to: &str,
        front: bool,
    ) -> Result<(), ManorError> {
        let route = match ctx.graph.find_path(from, to) {
            Ok(route) => route,
            Err(e @ GraphError::NoPathFound { .. }) => {
                self.halt(e.to_string());
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        let Some(id) = route.first() else {
            return Ok(());
        };
        let Some(transition) = ctx.graph.transition(id) else {
            return Ok(());
        };

        let view = view_of(&self.config, &self.current_state, &self.variables);
        let actions = transition.actions.build(&view);
        log::info!(
            "[{}] {} -> {} via '{}' (route of {})",
            self.config.id,
            from,
            to,
            transition.label,
            route.len()
        );
        self.expectation = Expectation::after(&transition.destination);
        if front {
            self.sequence.push_front_actions(actions, Origin::Transition(id));
        } else {
            self.sequence.push_all(actions, Origin::Transition(id));
        }
        Ok(())
    }

    fn intercept(
        &mut self,
        ctx: &mut EngineContext,
        now: f64,
        entry: &Entry,
        expanded: bool,
    ) -> Result<Option<TickOutcome>, ManorError> {
        let limit = ctx.settings.engine.max_consecutive_interceptions;
        let Some(error) = ctx.errors.scan(ctx.vision.as_mut(), &self.config.window)? else {
            self.consecutive_interceptions = 0;
            return Ok(None);
        };
        Ok(self.handle_error(limit, now, error, entry, expanded))
    }

    /// Failure of a step: the action's own error list, then its retries,
    /// then the consecutive failure count
    ///
    /// Returns the outcome when the step ends here, `None` to go on with
    /// the interception pass.
    fn step_failed(
        &mut self,
        ctx: &mut EngineContext,
        now: f64,
        entry: &Entry,
        reason: &str,
    ) -> Result<Option<TickOutcome>, ManorError> {
        if let Action::Guarded {
            action,
            retries,
            on_failure,
        } = &entry.action
        {
            let limit = ctx.settings.engine.max_consecutive_interceptions;
            let found = ctx
                .errors
                .scan_named(ctx.vision.as_mut(), &self.config.window, on_failure)?;
            if let Some(error) = found {
                let outcome = self.handle_error(limit, now, error, entry, false);
                return Ok(Some(outcome.unwrap_or_else(|| self.after_step())));
            }
            if *retries > 0 {
                self.stats.actions_failed += 1;
                log::info!(
                    "[{}] {} failed ({}), {} retries left",
                    self.config.id,
                    action,
                    reason,
                    retries
                );
                let again = Action::Guarded {
                    action: action.clone(),
                    retries: retries - 1,
                    on_failure: on_failure.clone(),
                };
                self.sequence.push_front(vec![Entry::new(again, entry.origin)]);
                return Ok(Some(self.after_step()));
            }
        }
        if self.record_failure(ctx, now, reason) {
            return Ok(Some(TickOutcome::Blocked));
        }
        Ok(None)
    }

    /// Queue the correction of a known error seen after `entry`
    fn handle_error(
        &mut self,
        limit: u32,
        now: f64,
        error: &KnownError,
        entry: &Entry,
        expanded: bool,
    ) -> Option<TickOutcome> {
        self.stats.errors_detected += 1;
        self.consecutive_interceptions += 1;
        log::warn!(
            "[{}] intercepted '{}' after {}: {}",
            self.config.id,
            error.name,
            entry.action,
            error.describe()
        );

        if self.consecutive_interceptions > limit {
            self.halt(format!("{} interceptions in a row", self.consecutive_interceptions));
            return Some(TickOutcome::Halted);
        }

        let mut front: Vec<Entry> = error
            .correction
            .iter()
            .cloned()
            .map(|a| Entry::new(a, Origin::Correction))
            .collect();
        if error.retry_original {
            if !expanded {
                front.push(entry.clone());
            }
        } else {
            let dropped = self.sequence.discard_origin(entry.origin);
            log::debug!("[{}] dropped {} interrupted actions", self.config.id, dropped);
            self.current_state = None;
            self.expectation = Expectation::Unknown;
        }
        self.sequence.push_front(front);

        if error.exclude_for_secs > 0.0 {
            self.excluded_until = now + error.exclude_for_secs;
            log::info!(
                "[{}] out of the rotation for {:.0}s",
                self.config.id,
                error.exclude_for_secs
            );
            return Some(TickOutcome::YieldWindow);
        }
        None
    }

    /// Returns `true` when the failure blocked the manor
    fn record_failure(&mut self, ctx: &EngineContext, now: f64, reason: &str) -> bool {
        self.stats.actions_failed += 1;
        self.consecutive_failures += 1;
        let limit = ctx.settings.engine.max_consecutive_failures;
        log::warn!(
            "[{}] failure {}/{}: {}",
            self.config.id,
            self.consecutive_failures,
            limit,
            reason
        );
        if self.consecutive_failures >= limit {
            self.block(now, format!("{} failures in a row", self.consecutive_failures));
            return true;
        }
        false
    }

    fn block(&mut self, now: f64, reason: impl Into<String>) {
        if self.is_halted() {
            return;
        }
        let reason = reason.into();
        log::warn!("[{}] blocked: {}", self.config.id, reason);
        self.condition = ManorCondition::Blocked { since: now, reason };
    }

    fn halt(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        log::error!("[{}] halted: {}", self.config.id, reason);
        self.sequence.clear();
        self.condition = ManorCondition::Halted { reason };
    }

    /// Queue the restart actions, at most once per reboot cooldown
    fn try_recover(&mut self, ctx: &EngineContext, now: f64) {
        if now < self.reboot_allowed_at {
            log::debug!(
                "[{}] restart possible in {:.0}s",
                self.config.id,
                self.reboot_allowed_at - now
            );
            return;
        }
        let view = view_of(&self.config, &self.current_state, &self.variables);
        let actions = self.behavior.restart(&view);

        self.stats.reboots += 1;
        self.reboot_allowed_at = now + ctx.settings.engine.reboot_cooldown_secs;
        log::warn!("[{}] restarting (reboot #{})", self.config.id, self.stats.reboots);

        self.sequence.clear();
        self.sequence.push_all(actions, Origin::Correction);
        self.current_state = None;
        self.expectation = Expectation::Unknown;
        self.navigation_target = None;
        self.consecutive_failures = 0;
        self.consecutive_interceptions = 0;
        self.delayed_until = 0.0;
        self.restarting = true;
        self.launched_at = now;
        self.reached_goal = false;
        self.condition = ManorCondition::Running;
    }
}

impl Schedulable for Manor {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn priority(&self) -> i32 {
        self.config.priority
    }

    fn time_until_priority_ready(&self, now: f64) -> f64 {
        match self.condition {
            ManorCondition::Running if now >= self.excluded_until => {
                self.book.time_until_next(true, now)
            }
            _ => f64::INFINITY,
        }
    }

    fn time_until_normal_ready(&self, now: f64) -> f64 {
        match self.condition {
            ManorCondition::Halted { .. } => f64::INFINITY,
            ManorCondition::Blocked { .. } => (self.reboot_allowed_at - now).max(0.0),
            ManorCondition::Running => {
                if now < self.excluded_until {
                    self.excluded_until - now
                } else if now < self.delayed_until {
                    self.delayed_until - now
                } else if !self.sequence.is_end()
                    || self.navigation_target.is_some()
                    || self.mail_waiting
                    || self.current_state.as_deref() != Some(self.config.goal.as_str())
                {
                    0.0
                } else {
                    self.book.time_until_next(false, now)
                }
            }
        }
    }
}

/// Manor errors
#[derive(Debug, thiserror::Error)]
pub enum ManorError {
    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("Input error: {0}")]
    Input(#[from] InputError),
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

impl ManorError {
    /// Errors that no restart can fix: a bad graph or a missing template
    pub fn is_config_fault(&self) -> bool {
        match self {
            ManorError::Graph(GraphError::Vision(e)) | ManorError::Vision(e) => {
                matches!(e, VisionError::TemplateNotFound(_))
            }
            ManorError::Graph(_) => true,
            ManorError::Input(_) | ManorError::Persist(_) => false,
        }
    }
}
