//! Engine and manor settings
//!
//! Loaded once from JSON at startup.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::action::{Action, Variables};
use crate::ports::{Rect, WindowId};
use crate::stealth::StealthConfig;

/// Main settings structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Loop timings and limits
    pub engine: EngineSettings,
    /// Input humanization
    pub stealth: StealthConfig,
    /// Where manor snapshots are written
    pub data_dir: PathBuf,
    /// Where template images are loaded from
    pub template_dir: Option<PathBuf>,
    /// Managed windows, in declaration order
    pub manors: Vec<ManorConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            stealth: StealthConfig::default(),
            data_dir: PathBuf::from("data"),
            template_dir: None,
            manors: Vec::new(),
        }
    }
}

impl Settings {
    /// No pauses and no humanization: dry runs and tests
    pub fn fast_preset() -> Self {
        Self {
            engine: EngineSettings {
                inter_action_pause_ms: 0,
                inter_window_pause_ms: 0,
                wait_slice_ms: 100,
                ..Default::default()
            },
            stealth: StealthConfig::disabled(),
            ..Default::default()
        }
    }

    /// Slow, heavily humanized input for long unattended sessions
    pub fn cautious_preset() -> Self {
        Self {
            engine: EngineSettings {
                inter_action_pause_ms: 900,
                inter_window_pause_ms: 2500,
                max_actions_per_turn: 20,
                user_idle_secs: 120.0,
                ..Default::default()
            },
            stealth: StealthConfig::cautious(),
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    pub fn manor(&self, id: &str) -> Option<&ManorConfig> {
        self.manors.iter().find(|m| m.id == id)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.max_actions_per_turn == 0 {
            return Err(ConfigError::Invalid(
                "engine.max_actions_per_turn must be at least 1".into(),
            ));
        }
        let mut ids = HashSet::new();
        for manor in &self.manors {
            if manor.id.is_empty() {
                return Err(ConfigError::Invalid("manor with an empty id".into()));
            }
            if !ids.insert(manor.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate manor id '{}'",
                    manor.id
                )));
            }
            if manor.goal.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "manor '{}' has no goal state",
                    manor.id
                )));
            }
            if let Some(slot) = manor.slots.iter().find(|s| s.count == 0) {
                return Err(ConfigError::Invalid(format!(
                    "slot '{}' of manor '{}' needs a count of at least 1",
                    slot.kind, manor.id
                )));
            }
            for task in &manor.tasks {
                if task.interval_secs <= 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "task '{}' of manor '{}' needs a positive interval",
                        task.name, manor.id
                    )));
                }
                if let Some(kind) = &task.slot {
                    if !manor.slots.iter().any(|s| &s.kind == kind) {
                        return Err(ConfigError::Invalid(format!(
                            "task '{}' of manor '{}' uses undeclared slot '{}'",
                            task.name, manor.id, kind
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Loop timings and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Pause after every action (ms), before humanization
    pub inter_action_pause_ms: u64,
    /// Pause when the input focus moves to another window (ms)
    pub inter_window_pause_ms: u64,
    /// Longest single wait when nothing is ready (s)
    pub max_wait_secs: f64,
    /// Granularity of interruptible waits (ms)
    pub wait_slice_ms: u64,
    /// Actions executed per turn before moving on
    pub max_actions_per_turn: u32,
    /// Failed actions in a row before a manor counts as blocked
    pub max_consecutive_failures: u32,
    /// Handled interceptions in a row before a manor is halted
    pub max_consecutive_interceptions: u32,
    /// Loop errors in a row before the engine stops
    pub max_engine_errors: u32,
    /// Quiet time after real user input before resuming (s)
    pub user_idle_secs: f64,
    /// Time allowed to reach the goal state after a launch (s)
    pub launch_timeout_secs: f64,
    /// Minimum time between two restarts of a manor (s)
    pub reboot_cooldown_secs: f64,
    /// Back-off after a detection miss (s)
    pub unknown_retry_secs: f64,
    /// Longest route the pathfinder builds
    pub max_path_depth: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            inter_action_pause_ms: 400,
            inter_window_pause_ms: 1000,
            max_wait_secs: 30.0,
            wait_slice_ms: 500,
            max_actions_per_turn: 50,
            max_consecutive_failures: 5,
            max_consecutive_interceptions: 10,
            max_engine_errors: 10,
            user_idle_secs: 30.0,
            launch_timeout_secs: 1800.0,
            reboot_cooldown_secs: 300.0,
            unknown_retry_secs: 2.0,
            max_path_depth: crate::graph::DEFAULT_MAX_DEPTH,
        }
    }
}

fn default_priority() -> i32 {
    50
}

/// One managed emulator window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManorConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub window: WindowId,
    /// Static scheduling priority, higher first
    #[serde(default = "default_priority")]
    pub priority: i32,
    /// State the manor works from
    pub goal: String,
    /// Where the window should sit on screen
    #[serde(default)]
    pub placement: Option<Rect>,
    #[serde(default)]
    pub tasks: Vec<TimedTask>,
    #[serde(default)]
    pub slots: Vec<SlotConfig>,
    /// Actions that relaunch the emulator when it is blocked
    #[serde(default)]
    pub restart: Vec<Action>,
    /// Initial variables
    #[serde(default)]
    pub variables: Variables,
    /// Reactions to messages from other manors
    #[serde(default)]
    pub on_message: Vec<MessageHandler>,
}

impl ManorConfig {
    pub fn new(id: impl Into<String>, window: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            window: WindowId::new(window),
            priority: default_priority(),
            goal: goal.into(),
            placement: None,
            tasks: Vec::new(),
            slots: Vec::new(),
            restart: Vec::new(),
            variables: Variables::new(),
            on_message: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_task(mut self, task: TimedTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn on_message(mut self, kind: impl Into<String>, actions: Vec<Action>) -> Self {
        self.on_message.push(MessageHandler {
            kind: kind.into(),
            actions,
        });
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Recurring work run from the goal state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedTask {
    pub name: String,
    pub interval_secs: f64,
    #[serde(default)]
    pub priority: i32,
    /// Belongs to the urgent scheduling class
    #[serde(default)]
    pub urgent: bool,
    /// Due at the first opportunity instead of one interval from start
    #[serde(default)]
    pub start_now: bool,
    /// Slot kind the task needs free, if any
    #[serde(default)]
    pub slot: Option<String>,
    /// How long the slot stays busy (s)
    #[serde(default)]
    pub slot_secs: f64,
    pub actions: Vec<Action>,
}

impl TimedTask {
    pub fn new(name: impl Into<String>, interval_secs: f64, actions: Vec<Action>) -> Self {
        Self {
            name: name.into(),
            interval_secs,
            priority: 0,
            urgent: false,
            start_now: false,
            slot: None,
            slot_secs: 0.0,
            actions,
        }
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub fn starting_now(mut self) -> Self {
        self.start_now = true;
        self
    }

    pub fn using_slot(mut self, kind: impl Into<String>, secs: f64) -> Self {
        self.slot = Some(kind.into());
        self.slot_secs = secs;
        self
    }
}

/// Actions queued from the goal state when a message of `kind` arrives
///
/// The sender and body are stored in the `message.from` and
/// `message.body` variables first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageHandler {
    pub kind: String,
    pub actions: Vec<Action>,
}

/// Number of slots of one kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub kind: String,
    pub count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.engine.max_actions_per_turn, 50);
        assert_eq!(settings.engine.max_consecutive_failures, 5);
        assert_eq!(settings.engine.max_consecutive_interceptions, 10);
        assert_eq!(settings.engine.max_path_depth, 20);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_fast_preset() {
        let settings = Settings::fast_preset();
        assert_eq!(settings.engine.inter_action_pause_ms, 0);
        assert!(!settings.stealth.jitter_clicks);
    }

    #[test]
    fn test_cautious_preset() {
        let settings = Settings::cautious_preset();
        assert!(settings.engine.inter_window_pause_ms > Settings::default().engine.inter_window_pause_ms);
        assert!(settings.stealth.micro_pauses);
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "engine": { "max_actions_per_turn": 10 },
            "manors": [{
                "id": "main",
                "window": "BlueStacks App Player",
                "goal": "town",
                "placement": { "x": 0, "y": 0, "width": 1280, "height": 720 },
                "slots": [{ "kind": "build", "count": 2 }],
                "tasks": [{
                    "name": "collect",
                    "interval_secs": 600,
                    "urgent": true,
                    "actions": [{ "type": "key_press", "key": "c" }]
                }]
            }]
        }"#;
        let settings = Settings::from_json(json).unwrap();
        assert_eq!(settings.engine.max_actions_per_turn, 10);
        assert_eq!(settings.engine.max_consecutive_failures, 5);

        let manor = settings.manor("main").unwrap();
        assert_eq!(manor.priority, 50);
        assert_eq!(manor.display_name(), "main");
        assert_eq!(manor.tasks[0].actions, vec![Action::key("c")]);
        assert!(manor.tasks[0].urgent);
    }

    #[test]
    fn test_duplicate_manor_ids_rejected() {
        let mut settings = Settings::default();
        settings.manors.push(ManorConfig::new("a", "w1", "town"));
        settings.manors.push(ManorConfig::new("a", "w2", "town"));
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_demo_settings() {
        let settings = Settings::from_json(include_str!("../../demos/settings.json")).unwrap();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.manors.len(), 2);
        assert_eq!(settings.stealth.click_offset_px, 4);
        assert!(settings.stealth.jitter_pauses);

        let main = settings.manor("main").unwrap();
        assert_eq!(main.display_name(), "Main account");
        assert_eq!(main.tasks[1].slot.as_deref(), Some("trainer"));
        let alt = settings.manor("alt").unwrap();
        assert_eq!(alt.priority, 50);
        assert_eq!(alt.on_message[0].kind, "trained");
        assert!(matches!(main.tasks[1].actions[1], Action::Guarded { retries: 1, .. }));
    }

    #[test]
    fn test_undeclared_slot_rejected() {
        let mut settings = Settings::default();
        settings.manors.push(
            ManorConfig::new("a", "w1", "town")
                .with_task(TimedTask::new("t", 60.0, vec![]).using_slot("forge", 10.0)),
        );
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_empty_slot_pool_rejected() {
        let mut settings = Settings::default();
        let mut manor = ManorConfig::new("a", "w1", "town")
            .with_task(TimedTask::new("t", 60.0, vec![]).using_slot("forge", 10.0));
        manor.slots.push(SlotConfig {
            kind: "forge".into(),
            count: 0,
        });
        settings.manors.push(manor);
        match settings.validate() {
            Err(ConfigError::Invalid(reason)) => assert!(reason.contains("forge")),
            other => panic!("unexpected {:?}", other),
        }
    }
}
