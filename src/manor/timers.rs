//! Recurring timers and busy slots
//!
//! Timers say when recurring work is due; slots model limited parallel
//! resources in the game (e.g. three build queues) that stay busy for a
//! while after use. Both are scheduling hints persisted between runs.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timer {
    pub name: String,
    pub interval_secs: f64,
    #[serde(default)]
    pub priority: i32,
    /// Due work belongs to the urgent scheduling class
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub last_run: f64,
    pub next_run: f64,
    #[serde(default = "enabled")]
    pub active: bool,
}

fn enabled() -> bool {
    true
}

impl Timer {
    /// Timer first due one interval from `now`
    pub fn new(name: impl Into<String>, interval_secs: f64, now: f64) -> Self {
        Self {
            name: name.into(),
            interval_secs,
            priority: 0,
            urgent: false,
            last_run: 0.0,
            next_run: now + interval_secs,
            active: true,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    /// Due right away
    pub fn starting_now(mut self, now: f64) -> Self {
        self.next_run = now;
        self
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.active && now >= self.next_run
    }

    /// Seconds until due, negative once overdue
    pub fn time_until_due(&self, now: f64) -> f64 {
        self.next_run - now
    }

    pub fn mark_executed(&mut self, now: f64) {
        self.last_run = now;
        self.next_run = now + self.interval_secs;
    }

    pub fn reset(&mut self, now: f64) {
        self.next_run = now;
    }

    pub fn delay(&mut self, secs: f64) {
        self.next_run += secs;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub kind: String,
    pub index: usize,
    /// When the slot frees up
    #[serde(default)]
    pub busy_until: f64,
    #[serde(default)]
    pub busy: bool,
}

impl Slot {
    pub fn new(kind: impl Into<String>, index: usize) -> Self {
        Self {
            kind: kind.into(),
            index,
            busy_until: 0.0,
            busy: false,
        }
    }

    pub fn is_free(&self, now: f64) -> bool {
        !self.busy || now >= self.busy_until
    }

    /// Free now or within `margin` seconds
    pub fn is_available(&self, now: f64, margin: f64) -> bool {
        !self.busy || now + margin >= self.busy_until
    }

    pub fn time_until_free(&self, now: f64) -> f64 {
        if !self.busy {
            return 0.0;
        }
        (self.busy_until - now).max(0.0)
    }

    pub fn occupy(&mut self, now: f64, duration_secs: f64) {
        self.busy = true;
        self.busy_until = now + duration_secs;
    }

    pub fn release(&mut self) {
        self.busy = false;
        self.busy_until = 0.0;
    }
}

/// A manor's timers and slots
#[derive(Debug, Clone, Default)]
pub struct TimerBook {
    timers: Vec<Timer>,
    slots: Vec<Slot>,
    dirty: bool,
}

impl TimerBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a timer, or update interval and priority of an existing one
    ///
    /// An existing timer keeps its schedule.
    pub fn add_timer(&mut self, timer: Timer) {
        match self.timers.iter_mut().find(|t| t.name == timer.name) {
            Some(existing) => {
                existing.interval_secs = timer.interval_secs;
                existing.priority = timer.priority;
                existing.urgent = timer.urgent;
            }
            None => self.timers.push(timer),
        }
    }

    pub fn timer(&self, name: &str) -> Option<&Timer> {
        self.timers.iter().find(|t| t.name == name)
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    /// Due timers, highest priority first
    pub fn due(&self, now: f64) -> Vec<&Timer> {
        let mut due: Vec<&Timer> = self.timers.iter().filter(|t| t.is_due(now)).collect();
        due.sort_by_key(|t| std::cmp::Reverse(t.priority));
        due
    }

    /// Returns `false` for an unknown timer
    pub fn mark_executed(&mut self, name: &str, now: f64) -> bool {
        match self.timers.iter_mut().find(|t| t.name == name) {
            Some(timer) => {
                timer.mark_executed(now);
                self.dirty = true;
                true
            }
            None => false,
        }
    }

    /// Push a timer's next run back to `until`
    pub fn postpone(&mut self, name: &str, until: f64) {
        if let Some(timer) = self.timers.iter_mut().find(|t| t.name == name) {
            if until > timer.next_run {
                timer.next_run = until;
                self.dirty = true;
            }
        }
    }

    /// Seconds until the next active timer of the given class is due,
    /// `+inf` when there is none
    pub fn time_until_next(&self, urgent: bool, now: f64) -> f64 {
        self.timers
            .iter()
            .filter(|t| t.active && t.urgent == urgent)
            .map(|t| t.time_until_due(now))
            .fold(f64::INFINITY, f64::min)
    }

    /// Make sure `count` slots of `kind` exist
    pub fn register_slots(&mut self, kind: &str, count: usize) {
        let existing = self.slots.iter().filter(|s| s.kind == kind).count();
        for index in existing..count {
            self.slots.push(Slot::new(kind, index));
        }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn count_free_slots(&self, kind: &str, now: f64) -> usize {
        self.slots
            .iter()
            .filter(|s| s.kind == kind && s.is_free(now))
            .count()
    }

    pub fn has_free_slot(&self, kind: &str, now: f64) -> bool {
        self.count_free_slots(kind, now) > 0
    }

    /// Occupy the first free slot of `kind`; its index, if any was free
    pub fn occupy_slot(&mut self, kind: &str, duration_secs: f64, now: f64) -> Option<usize> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.kind == kind && s.is_free(now))?;
        slot.occupy(now, duration_secs);
        self.dirty = true;
        Some(slot.index)
    }

    /// Seconds until a slot of `kind` frees up, `+inf` with no slot
    pub fn time_until_free_slot(&self, kind: &str, now: f64) -> f64 {
        self.slots
            .iter()
            .filter(|s| s.kind == kind)
            .map(|s| s.time_until_free(now))
            .fold(f64::INFINITY, f64::min)
    }

    /// Replace timer schedules and slot occupancy with saved ones
    ///
    /// Only names and kinds already registered are restored.
    pub fn restore(&mut self, timers: &[Timer], slots: &[Slot]) {
        for saved in timers {
            if let Some(t) = self.timers.iter_mut().find(|t| t.name == saved.name) {
                t.last_run = saved.last_run;
                t.next_run = saved.next_run;
                t.active = saved.active;
            }
        }
        for saved in slots {
            if let Some(s) = self
                .slots
                .iter_mut()
                .find(|s| s.kind == saved.kind && s.index == saved.index)
            {
                s.busy = saved.busy;
                s.busy_until = saved.busy_until;
            }
        }
    }

    /// Whether something changed since the last call
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
