//! Screen states and popups
//!
//! A state is a named predicate over a window's current screen. Popups are
//! states that know how to close themselves.

use serde::{Deserialize, Serialize};

use crate::action::{Action, ClickTarget};
use crate::ports::{VisionError, VisionPort, WindowId};

use super::transition::{ActionFactory, Destination, Source, Transition, UncertainState};

/// Default template matching threshold
pub const DEFAULT_THRESHOLD: f32 = 0.8;

/// Group every popup belongs to
pub const POPUP_GROUP: &str = "popup";

/// How a state is recognized on screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Detection {
    /// Template visible with at least `threshold`
    Image {
        template: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
    },
    /// Text visible (OCR)
    Text { text: String },
    /// Both the template and the text must be visible
    Combination {
        template: String,
        #[serde(default = "default_threshold")]
        threshold: f32,
        text: String,
    },
}

impl Detection {
    pub fn image(template: impl Into<String>) -> Self {
        Detection::Image {
            template: template.into(),
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Detection::Text { text: text.into() }
    }

    /// Evaluate against the current frame of `window`
    ///
    /// A combination always runs both checks.
    pub fn verify(&self, vision: &mut dyn VisionPort, window: &WindowId) -> Result<bool, VisionError> {
        match self {
            Detection::Image {
                template,
                threshold,
            } => vision.detect_image(window, template, *threshold),
            Detection::Text { text } => vision.detect_text(window, text),
            Detection::Combination {
                template,
                threshold,
                text,
            } => {
                let image_ok = vision.detect_image(window, template, *threshold)?;
                let text_ok = vision.detect_text(window, text)?;
                Ok(image_ok && text_ok)
            }
        }
    }
}

/// A named, detectable screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Unique name within a graph
    pub name: String,
    /// Free-form tags
    #[serde(default)]
    pub groups: Vec<String>,
    /// Higher wins when several states match at once
    #[serde(default)]
    pub priority: i32,
    pub detection: Detection,
}

impl State {
    pub fn new(name: impl Into<String>, detection: Detection) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            priority: 0,
            detection,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        let group = group.into();
        if !self.groups.contains(&group) {
            self.groups.push(group);
        }
        self
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    pub fn is_popup(&self) -> bool {
        self.in_group(POPUP_GROUP)
    }
}

/// Where to click to dismiss a popup when it has no close template
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClosePosition {
    pub x: f32,
    pub y: f32,
    /// `x`/`y` are fractions of the window size instead of pixels
    #[serde(default)]
    pub relative: bool,
}

/// Transient overlay with a derived closing transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Popup {
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    pub detection_template: String,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub close_template: Option<String>,
    #[serde(default)]
    pub close_position: Option<ClosePosition>,
    /// Candidates tested after the popup is closed
    pub possible_states_after: Vec<String>,
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Popup {
    pub fn new(
        name: impl Into<String>,
        detection_template: impl Into<String>,
        possible_states_after: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            groups: Vec::new(),
            priority: 0,
            detection_template: detection_template.into(),
            threshold: DEFAULT_THRESHOLD,
            close_template: None,
            close_position: None,
            possible_states_after,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_close_template(mut self, template: impl Into<String>) -> Self {
        self.close_template = Some(template.into());
        self
    }

    pub fn with_close_position(mut self, x: f32, y: f32, relative: bool) -> Self {
        self.close_position = Some(ClosePosition { x, y, relative });
        self
    }

    /// The popup as a plain state, tagged with the popup group
    pub fn state(&self) -> State {
        let mut state = State::new(
            self.name.clone(),
            Detection::Image {
                template: self.detection_template.clone(),
                threshold: self.threshold,
            },
        )
        .with_priority(self.priority);
        state.groups = self.groups.clone();
        state.with_group(POPUP_GROUP)
    }

    /// Action that dismisses the popup
    ///
    /// Close template first, then close position, then the detection
    /// template's own location.
    pub fn close_action(&self) -> Action {
        let target = if let Some(template) = &self.close_template {
            ClickTarget::Template {
                template: template.clone(),
                threshold: self.threshold,
                offset: (0, 0),
            }
        } else if let Some(pos) = self.close_position {
            ClickTarget::Position {
                x: pos.x,
                y: pos.y,
                relative: pos.relative,
            }
        } else {
            ClickTarget::Template {
                template: self.detection_template.clone(),
                threshold: self.threshold,
                offset: (0, 0),
            }
        };
        Action::Click { target }
    }

    /// Closing transition: popup → Uncertain(possible_states_after)
    ///
    /// Ends with a replan so the landing state is detected right away.
    pub fn closing_transition(&self) -> Transition {
        Transition {
            label: format!("close {}", self.name),
            source: Source::State(self.name.clone()),
            destination: Destination::Uncertain(UncertainState::new(
                self.possible_states_after.clone(),
            )),
            actions: ActionFactory::Fixed(vec![self.close_action(), Action::Replan]),
        }
    }
}
