//! Actions
//!
//! An [`Action`] is one executable step: a click, a key press, a pause, or a
//! control-flow construct holding child actions. Control flow never runs
//! its children directly; it expands them into the front of the manor's
//! [`ActionSequence`], and loops re-insert themselves behind the body with
//! an advanced counter. Every step therefore goes through the same
//! post-action interception, whatever nesting it came from.

pub mod exec;
pub mod sequence;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::graph::DEFAULT_THRESHOLD;
use crate::ports::{InputError, VisionError, VisionPort, WindowId};

pub use exec::{execute, ExecContext, StepOutcome};
pub use sequence::{ActionSequence, Entry, Origin, HISTORY_MAX};

/// Iteration cap for `While` when none is configured
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// Manor variable value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

/// Per-manor variables read by conditions
pub type Variables = BTreeMap<String, Value>;

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

/// What a click aims at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClickTarget {
    /// Center of the best match of a template, shifted by `offset`
    Template {
        template: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
        #[serde(default)]
        offset: (i32, i32),
    },
    /// Fixed position, in pixels or as fractions of the window size
    Position {
        x: f32,
        y: f32,
        #[serde(default)]
        relative: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// One executable step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Click {
        target: ClickTarget,
    },
    TextClick {
        text: String,
        #[serde(default)]
        offset: (i32, i32),
    },
    KeyPress {
        key: String,
    },
    /// Short blocking pause
    Wait {
        ms: u64,
    },
    /// Long pause that gives the window up until `deadline`
    Delay {
        ms: u64,
        #[serde(skip)]
        deadline: Option<f64>,
    },
    Log {
        #[serde(default)]
        level: LogLevel,
        message: String,
    },
    SetVariable {
        name: String,
        value: Value,
    },
    If {
        condition: Condition,
        then: Vec<Action>,
    },
    IfElse {
        condition: Condition,
        then: Vec<Action>,
        otherwise: Vec<Action>,
    },
    For {
        times: u32,
        #[serde(default)]
        done: u32,
        #[serde(default)]
        label: Option<String>,
        body: Vec<Action>,
    },
    While {
        condition: Condition,
        #[serde(default = "default_max_iterations")]
        max_iterations: u32,
        #[serde(default)]
        done: u32,
        #[serde(default)]
        label: Option<String>,
        body: Vec<Action>,
    },
    ForEach {
        variable: String,
        items: Vec<Value>,
        #[serde(default)]
        index: usize,
        body: Vec<Action>,
    },
    Composite {
        name: String,
        actions: Vec<Action>,
    },
    /// Route to a prerequisite state before going on
    Navigate {
        goal: String,
    },
    /// Run the actions of the first case equal to the variable's value
    Switch {
        variable: String,
        cases: Vec<SwitchCase>,
        #[serde(default)]
        default: Vec<Action>,
    },
    /// Another action with its own failure handling
    ///
    /// On failure the listed known errors are checked first; when none is
    /// on screen the action is tried again up to `retries` more times.
    Guarded {
        action: Box<Action>,
        #[serde(default)]
        retries: u32,
        #[serde(default)]
        on_failure: Vec<String>,
    },
    /// Post a message for other manors, every one of them when `to` is empty
    Send {
        #[serde(default)]
        to: Option<String>,
        kind: String,
        #[serde(default)]
        body: Option<Value>,
        #[serde(default)]
        ttl_secs: Option<f64>,
    },
    /// Drop the rest of the current step group and detect again
    Replan,
    /// Hand the input focus to another window after this step
    Yield,
}

/// One branch of a `Switch`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub value: Value,
    pub actions: Vec<Action>,
}

impl Action {
    pub fn click_template(template: impl Into<String>) -> Self {
        Action::Click {
            target: ClickTarget::Template {
                template: template.into(),
                threshold: DEFAULT_THRESHOLD,
                offset: (0, 0),
            },
        }
    }

    pub fn click_at(x: f32, y: f32) -> Self {
        Action::Click {
            target: ClickTarget::Position {
                x,
                y,
                relative: false,
            },
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Action::KeyPress { key: key.into() }
    }

    pub fn delay(ms: u64) -> Self {
        Action::Delay { ms, deadline: None }
    }

    pub fn counted(times: u32, body: Vec<Action>) -> Self {
        Action::For {
            times,
            done: 0,
            label: None,
            body,
        }
    }

    pub fn while_true(condition: Condition, body: Vec<Action>) -> Self {
        Action::While {
            condition,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            done: 0,
            label: None,
            body,
        }
    }

    /// Retry on failure, checking `on_failure` errors first
    pub fn guarded(self, retries: u32, on_failure: Vec<String>) -> Self {
        Action::Guarded {
            action: Box::new(self),
            retries,
            on_failure,
        }
    }

    /// Whether the step only rearranges the sequence
    pub fn is_control_flow(&self) -> bool {
        matches!(
            self,
            Action::If { .. }
                | Action::IfElse { .. }
                | Action::For { .. }
                | Action::While { .. }
                | Action::ForEach { .. }
                | Action::Composite { .. }
                | Action::Switch { .. }
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click {
                target: ClickTarget::Template { template, .. },
            } => write!(f, "click '{}'", template),
            Action::Click {
                target: ClickTarget::Position { x, y, relative },
            } => {
                if *relative {
                    write!(f, "click ({:.2}, {:.2}) rel", x, y)
                } else {
                    write!(f, "click ({}, {})", x, y)
                }
            }
            Action::TextClick { text, .. } => write!(f, "click text '{}'", text),
            Action::KeyPress { key } => write!(f, "key '{}'", key),
            Action::Wait { ms } => write!(f, "wait {}ms", ms),
            Action::Delay { ms, .. } => write!(f, "delay {}ms", ms),
            Action::Log { message, .. } => write!(f, "log '{}'", message),
            Action::SetVariable { name, value } => write!(f, "set {} = {}", name, value),
            Action::If { .. } => f.write_str("if"),
            Action::IfElse { .. } => f.write_str("if/else"),
            Action::For {
                times, done, label, ..
            } => write!(
                f,
                "for '{}' {}/{}",
                label.as_deref().unwrap_or("anonymous"),
                done,
                times
            ),
            Action::While { done, label, .. } => write!(
                f,
                "while '{}' #{}",
                label.as_deref().unwrap_or("anonymous"),
                done
            ),
            Action::ForEach {
                variable,
                index,
                items,
                ..
            } => write!(f, "for each {} {}/{}", variable, index, items.len()),
            Action::Composite { name, .. } => write!(f, "composite '{}'", name),
            Action::Switch { variable, .. } => write!(f, "switch on {}", variable),
            Action::Guarded {
                action, retries, ..
            } => write!(f, "{} (retries {})", action, retries),
            Action::Send { to, kind, .. } => match to {
                Some(to) => write!(f, "send '{}' to {}", kind, to),
                None => write!(f, "broadcast '{}'", kind),
            },
            Action::Navigate { goal } => write!(f, "navigate to '{}'", goal),
            Action::Replan => f.write_str("replan"),
            Action::Yield => f.write_str("yield"),
        }
    }
}

/// Predicate evaluated against the screen and the manor's variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Always,
    Never,
    ImagePresent {
        template: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
    ImageAbsent {
        template: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
    TextPresent {
        text: String,
    },
    TextAbsent {
        text: String,
    },
    VarEquals {
        name: String,
        value: Value,
    },
    VarAtLeast {
        name: String,
        value: i64,
    },
    VarAtMost {
        name: String,
        value: i64,
    },
    Not {
        condition: Box<Condition>,
    },
    All {
        conditions: Vec<Condition>,
    },
    Any {
        conditions: Vec<Condition>,
    },
}

impl Condition {
    pub fn evaluate(
        &self,
        vision: &mut dyn VisionPort,
        window: &WindowId,
        variables: &Variables,
    ) -> Result<bool, VisionError> {
        Ok(match self {
            Condition::Always => true,
            Condition::Never => false,
            Condition::ImagePresent {
                template,
                threshold,
            } => vision.detect_image(window, template, *threshold)?,
            Condition::ImageAbsent {
                template,
                threshold,
            } => !vision.detect_image(window, template, *threshold)?,
            Condition::TextPresent { text } => vision.detect_text(window, text)?,
            Condition::TextAbsent { text } => !vision.detect_text(window, text)?,
            Condition::VarEquals { name, value } => variables.get(name) == Some(value),
            Condition::VarAtLeast { name, value } => variables
                .get(name)
                .and_then(Value::as_int)
                .is_some_and(|v| v >= *value),
            Condition::VarAtMost { name, value } => variables
                .get(name)
                .and_then(Value::as_int)
                .is_some_and(|v| v <= *value),
            Condition::Not { condition } => !condition.evaluate(vision, window, variables)?,
            Condition::All { conditions } => {
                for c in conditions {
                    if !c.evaluate(vision, window, variables)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any { conditions } => {
                for c in conditions {
                    if c.evaluate(vision, window, variables)? {
                        return Ok(true);
                    }
                }
                false
            }
        })
    }
}

/// Errors raised while executing an action
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),
    #[error("Input error: {0}")]
    Input(#[from] InputError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeVision;

    #[test]
    fn test_variable_conditions() {
        let mut vision = FakeVision::new();
        let window = WindowId::new("w");
        let mut vars = Variables::new();
        vars.insert("gold".into(), Value::Int(120));
        vars.insert("mode".into(), Value::from("raid"));

        let at_least = Condition::VarAtLeast {
            name: "gold".into(),
            value: 100,
        };
        let at_most = Condition::VarAtMost {
            name: "gold".into(),
            value: 100,
        };
        let equals = Condition::VarEquals {
            name: "mode".into(),
            value: Value::from("raid"),
        };
        let missing = Condition::VarAtLeast {
            name: "nope".into(),
            value: 0,
        };

        assert!(at_least.evaluate(&mut vision, &window, &vars).unwrap());
        assert!(!at_most.evaluate(&mut vision, &window, &vars).unwrap());
        assert!(equals.evaluate(&mut vision, &window, &vars).unwrap());
        assert!(!missing.evaluate(&mut vision, &window, &vars).unwrap());
    }

    #[test]
    fn test_composite_conditions() {
        let mut vision = FakeVision::new();
        vision.show_image("ok.png");
        let window = WindowId::new("w");
        let vars = Variables::new();

        let all = Condition::All {
            conditions: vec![
                Condition::ImagePresent {
                    template: "ok.png".into(),
                    threshold: 0.8,
                },
                Condition::TextAbsent {
                    text: "Error".into(),
                },
            ],
        };
        assert!(all.evaluate(&mut vision, &window, &vars).unwrap());

        let not = Condition::Not {
            condition: Box::new(all),
        };
        assert!(!not.evaluate(&mut vision, &window, &vars).unwrap());

        let any = Condition::Any {
            conditions: vec![Condition::Never, Condition::Always],
        };
        assert!(any.evaluate(&mut vision, &window, &vars).unwrap());
    }

    #[test]
    fn test_actions_from_json() {
        let json = r#"[
            {"type": "click", "target": {"kind": "template", "template": "ok.png"}},
            {"type": "while", "condition": {"kind": "image_present", "template": "more.png"},
             "body": [{"type": "key_press", "key": "space"}]},
            {"type": "replan"}
        ]"#;
        let actions: Vec<Action> = serde_json::from_str(json).unwrap();
        assert_eq!(actions[0], Action::click_template("ok.png"));
        match &actions[1] {
            Action::While { max_iterations, done, .. } => {
                assert_eq!(*max_iterations, DEFAULT_MAX_ITERATIONS);
                assert_eq!(*done, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(actions[2], Action::Replan);
    }

    #[test]
    fn test_display_is_short() {
        assert_eq!(Action::key("esc").to_string(), "key 'esc'");
        assert_eq!(Action::counted(3, vec![]).to_string(), "for 'anonymous' 0/3");
        assert_eq!(
            Action::key("ok").guarded(2, vec![]).to_string(),
            "key 'ok' (retries 2)"
        );
    }

    #[test]
    fn test_switch_and_guard_from_json() {
        let json = r#"[
            {"type": "switch", "variable": "mode",
             "cases": [{"value": "raid", "actions": [{"type": "key_press", "key": "r"}]},
                       {"value": 2, "actions": []}]},
            {"type": "guarded", "action": {"type": "key_press", "key": "buy"},
             "on_failure": ["no_gold"]},
            {"type": "send", "kind": "raid_open"}
        ]"#;
        let actions: Vec<Action> = serde_json::from_str(json).unwrap();
        match &actions[0] {
            Action::Switch { cases, default, .. } => {
                assert_eq!(cases[0].value, Value::from("raid"));
                assert_eq!(cases[1].value, Value::Int(2));
                assert!(default.is_empty());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(
            actions[1],
            Action::key("buy").guarded(0, vec!["no_gold".into()])
        );
        assert_eq!(actions[2].to_string(), "broadcast 'raid_open'");
    }
}
