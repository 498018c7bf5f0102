//! Declarative graph file
//!
//! ```toml
//! ready_state = "town"
//!
//! [[state]]
//! name = "town"
//! detection = { kind = "image", template = "town.png" }
//!
//! [[popup]]
//! name = "gift"
//! detection_template = "gift.png"
//! close_template = "gift_close.png"
//! possible_states_after = ["town", "gift"]
//!
//! [[transition]]
//! from = "loading"
//! uncertain = ["town", "gift"]
//! actions = [{ type = "key_press", key = "enter" }]
//!
//! [[error]]
//! name = "disconnected"
//! detection = { kind = "text", text = "Connection lost" }
//! correction = [{ type = "key_press", key = "enter" }]
//! ```
//!
//! States are added first, then popups with their closing transitions,
//! then the declared transitions in file order.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::ConfigError;
use crate::action::Action;
use crate::graph::{
    Destination, GraphIssue, Popup, Source, State, StateGraph, Transition, UncertainState,
};
use crate::intercept::{ErrorCatalog, KnownError};

/// Source name standing for "any state"
pub const ANY_SOURCE: &str = "*";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub ready_state: Option<String>,
    #[serde(default, rename = "state")]
    pub states: Vec<State>,
    #[serde(default, rename = "popup")]
    pub popups: Vec<Popup>,
    #[serde(default, rename = "transition")]
    pub transitions: Vec<TransitionDecl>,
    #[serde(default, rename = "error")]
    pub errors: Vec<KnownError>,
}

/// A `[[transition]]` table: `to` or `uncertain`, never both
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionDecl {
    #[serde(default)]
    pub label: Option<String>,
    pub from: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub uncertain: Option<Vec<String>>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl TransitionDecl {
    fn into_transition(self) -> Result<Transition, ConfigError> {
        let source = if self.from == ANY_SOURCE {
            Source::Any
        } else {
            Source::State(self.from.clone())
        };
        let destination = match (self.to, self.uncertain) {
            (Some(to), None) => Destination::State(to),
            (None, Some(candidates)) => Destination::Uncertain(UncertainState::new(candidates)),
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "transition from '{}' needs exactly one of `to` and `uncertain`",
                    self.from
                )))
            }
        };
        let label = self.label.unwrap_or_else(|| match &destination {
            Destination::State(to) => format!("{} -> {}", self.from, to),
            Destination::Uncertain(u) => format!("{} -> ?[{}]", self.from, u.candidates.join(", ")),
        });
        Ok(Transition::new(label, source, destination, self.actions))
    }
}

impl GraphFile {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Build and validate the graph and the error catalogue
    ///
    /// Hard defects are errors; soft ones come back as issues.
    pub fn into_parts(self) -> Result<(StateGraph, ErrorCatalog, Vec<GraphIssue>), ConfigError> {
        let mut graph = StateGraph::new();
        for state in self.states {
            graph.add_state(state)?;
        }
        for popup in &self.popups {
            graph.register_popup(popup)?;
        }
        for decl in self.transitions {
            graph.add_transition(decl.into_transition()?);
        }
        if let Some(ready) = self.ready_state {
            graph.set_ready_state(ready);
        }
        let issues = graph.validate()?;

        log::info!(
            "Graph loaded: {} states, {} transitions, {} known errors",
            graph.states().len(),
            graph.transitions().len(),
            self.errors.len()
        );
        Ok((graph, ErrorCatalog::from_errors(self.errors), issues))
    }
}
