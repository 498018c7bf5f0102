//! Navigation graph
//!
//! States live in an arena indexed by [`StateId`]; transitions are stored in
//! declaration order and referenced by [`TransitionId`]. The graph answers
//! two questions for a window: which state is on screen right now
//! ([`StateGraph::detect_current_state`]) and which transitions lead to a
//! goal (see [`pathfinder`]).

pub mod pathfinder;
pub mod state;
pub mod transition;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::ports::{VisionError, VisionPort, WindowId};

pub use pathfinder::{Route, DEFAULT_MAX_DEPTH};
pub use state::{ClosePosition, Detection, Popup, State, DEFAULT_THRESHOLD, POPUP_GROUP};
pub use transition::{
    ActionFactory, Destination, DynamicActions, Source, Transition, TransitionId, UncertainState,
};

/// Index of a state in its graph
pub type StateId = usize;

/// States and transitions for one kind of window
#[derive(Debug, Clone)]
pub struct StateGraph {
    states: Vec<State>,
    by_name: HashMap<String, StateId>,
    transitions: Vec<Transition>,
    ready_state: Option<String>,
    max_depth: usize,
}

impl Default for StateGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl StateGraph {
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            by_name: HashMap::new(),
            transitions: Vec::new(),
            ready_state: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Limit on the number of transitions in a route
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn add_state(&mut self, state: State) -> Result<StateId, GraphError> {
        if self.by_name.contains_key(&state.name) {
            return Err(GraphError::DuplicateState(state.name));
        }
        let id = self.states.len();
        self.by_name.insert(state.name.clone(), id);
        self.states.push(state);
        Ok(id)
    }

    /// Add a popup's state and its closing transition
    pub fn register_popup(&mut self, popup: &Popup) -> Result<(StateId, TransitionId), GraphError> {
        let id = self.add_state(popup.state())?;
        let transition = self.add_transition(popup.closing_transition());
        Ok((id, transition))
    }

    /// Append a transition; references are checked by [`StateGraph::validate`]
    pub fn add_transition(&mut self, transition: Transition) -> TransitionId {
        self.transitions.push(transition);
        self.transitions.len() - 1
    }

    /// Designate the state every other state should be able to reach
    pub fn set_ready_state(&mut self, name: impl Into<String>) {
        self.ready_state = Some(name.into());
    }

    pub fn ready_state(&self) -> Option<&str> {
        self.ready_state.as_deref()
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.by_name.get(name).map(|&id| &self.states[id])
    }

    pub fn state_id(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition(&self, id: TransitionId) -> Option<&Transition> {
        self.transitions.get(id)
    }

    /// Transitions that can be taken from `name`, wildcard sources included
    pub fn transitions_from(&self, name: &str) -> Vec<(TransitionId, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.applies_from(name))
            .collect()
    }

    /// Transitions that may land on `name`
    pub fn transitions_to(&self, name: &str) -> Vec<(TransitionId, &Transition)> {
        self.transitions
            .iter()
            .enumerate()
            .filter(|(_, t)| t.destination.names().contains(&name))
            .collect()
    }

    pub fn states_in_group(&self, group: &str) -> Vec<&State> {
        self.states.iter().filter(|s| s.in_group(group)).collect()
    }

    /// Identify the state shown in `window`
    ///
    /// Tests `candidates` (all states when `None` or empty) by descending
    /// priority, then declaration order, and stops at the first positive.
    /// Returns `Ok(None)` when nothing matches.
    pub fn detect_current_state(
        &self,
        vision: &mut dyn VisionPort,
        window: &WindowId,
        candidates: Option<&[String]>,
    ) -> Result<Option<&State>, GraphError> {
        let mut order: Vec<StateId> = match candidates {
            Some(names) if !names.is_empty() => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    let id = self
                        .state_id(name)
                        .ok_or_else(|| GraphError::UnknownState(name.clone()))?;
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
                ids
            }
            _ => (0..self.states.len()).collect(),
        };
        order.sort_by_key(|&id| (std::cmp::Reverse(self.states[id].priority), id));

        for id in order {
            let state = &self.states[id];
            if state.detection.verify(vision, window)? {
                log::debug!("[{}] detected state '{}'", window, state.name);
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    /// Check references and reachability
    ///
    /// Dangling names are hard errors. Popups no uncertain destination can
    /// resolve to, and states with no route to the ready state, are
    /// reported as issues.
    pub fn validate(&self) -> Result<Vec<GraphIssue>, GraphError> {
        let mut seen = HashSet::new();
        for state in &self.states {
            if !seen.insert(state.name.as_str()) {
                return Err(GraphError::DuplicateState(state.name.clone()));
            }
        }

        for transition in &self.transitions {
            if let Source::State(name) = &transition.source {
                self.require(name, transition)?;
            }
            for name in transition.destination.names() {
                self.require(name, transition)?;
            }
        }
        if let Some(ready) = &self.ready_state {
            if !self.contains(ready) {
                return Err(GraphError::UnknownState(ready.clone()));
            }
        }

        let mut issues = Vec::new();
        for popup in self.states.iter().filter(|s| s.is_popup()) {
            // its own closing transition does not count
            let reachable = self
                .transitions
                .iter()
                .filter(|t| !matches!(&t.source, Source::State(s) if *s == popup.name))
                .any(|t| match &t.destination {
                    Destination::Uncertain(u) => {
                        u.candidates.is_empty() || u.contains(&popup.name)
                    }
                    Destination::State(_) => false,
                });
            if !reachable {
                issues.push(GraphIssue::UnreachablePopup(popup.name.clone()));
            }
        }

        if let Some(ready) = &self.ready_state {
            for state in &self.states {
                if &state.name != ready && self.find_path(&state.name, ready).is_err() {
                    issues.push(GraphIssue::NoRouteToReady(state.name.clone()));
                }
            }
        }

        for issue in &issues {
            log::warn!("Graph issue: {}", issue);
        }
        Ok(issues)
    }

    fn require(&self, name: &str, transition: &Transition) -> Result<(), GraphError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(GraphError::InvalidTransition {
                label: transition.label.clone(),
                reason: format!("unknown state '{}'", name),
            })
        }
    }
}

/// Non-fatal graph defects found by [`StateGraph::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphIssue {
    /// No uncertain destination lists this popup
    UnreachablePopup(String),
    /// No route from this state to the ready state
    NoRouteToReady(String),
}

impl fmt::Display for GraphIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphIssue::UnreachablePopup(name) => {
                write!(f, "popup '{}' is not a candidate of any uncertain destination", name)
            }
            GraphIssue::NoRouteToReady(name) => {
                write!(f, "state '{}' has no route to the ready state", name)
            }
        }
    }
}

/// Graph errors
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Unknown state: {0}")]
    UnknownState(String),
    #[error("Duplicate state: {0}")]
    DuplicateState(String),
    #[error("Invalid transition '{label}': {reason}")]
    InvalidTransition { label: String, reason: String },
    #[error("No path from '{from}' to '{to}'")]
    NoPathFound { from: String, to: String },
    #[error("Vision error: {0}")]
    Vision(#[from] VisionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Action;
    use crate::testing::FakeVision;

    fn graph_with(states: Vec<State>) -> StateGraph {
        let mut graph = StateGraph::new();
        for s in states {
            graph.add_state(s).unwrap();
        }
        graph
    }

    #[test]
    fn test_higher_priority_wins() {
        let graph = graph_with(vec![
            State::new("town", Detection::image("town.png")).with_priority(1),
            State::new("popup", Detection::image("popup.png")).with_priority(10),
        ]);
        let mut vision = FakeVision::new();
        vision.show_image("town.png");
        vision.show_image("popup.png");

        let found = graph
            .detect_current_state(&mut vision, &WindowId::new("w"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "popup");
    }

    #[test]
    fn test_equal_priority_uses_declaration_order() {
        let graph = graph_with(vec![
            State::new("first", Detection::image("a.png")),
            State::new("second", Detection::image("b.png")),
        ]);
        let mut vision = FakeVision::new();
        vision.show_image("a.png");
        vision.show_image("b.png");

        let found = graph
            .detect_current_state(&mut vision, &WindowId::new("w"), None)
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "first");
    }

    #[test]
    fn test_candidates_restrict_detection() {
        let graph = graph_with(vec![
            State::new("town", Detection::image("town.png")),
            State::new("gift", Detection::image("gift.png")),
            State::new("report", Detection::image("report.png")).with_priority(50),
        ]);
        let mut vision = FakeVision::new();
        vision.show_image("report.png");
        vision.show_image("gift.png");

        let candidates = vec!["town".to_string(), "gift".to_string()];
        let found = graph
            .detect_current_state(&mut vision, &WindowId::new("w"), Some(&candidates))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "gift");
        assert!(!vision.queried().contains(&"report.png".to_string()));
    }

    #[test]
    fn test_detection_short_circuits() {
        let graph = graph_with(vec![
            State::new("a", Detection::image("a.png")),
            State::new("b", Detection::image("b.png")),
            State::new("c", Detection::image("c.png")),
        ]);
        let mut vision = FakeVision::new();
        vision.show_image("a.png");

        graph
            .detect_current_state(&mut vision, &WindowId::new("w"), None)
            .unwrap();
        assert_eq!(vision.query_count(), 1);
    }

    #[test]
    fn test_miss_is_none() {
        let graph = graph_with(vec![State::new("a", Detection::image("a.png"))]);
        let mut vision = FakeVision::new();
        let found = graph
            .detect_current_state(&mut vision, &WindowId::new("w"), None)
            .unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_unknown_candidate_is_an_error() {
        let graph = graph_with(vec![State::new("a", Detection::image("a.png"))]);
        let mut vision = FakeVision::new();
        let result = graph.detect_current_state(
            &mut vision,
            &WindowId::new("w"),
            Some(&["nowhere".to_string()]),
        );
        assert!(matches!(result, Err(GraphError::UnknownState(_))));
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let mut graph = StateGraph::new();
        graph
            .add_state(State::new("a", Detection::image("a.png")))
            .unwrap();
        assert!(matches!(
            graph.add_state(State::new("a", Detection::text("A"))),
            Err(GraphError::DuplicateState(_))
        ));
    }

    #[test]
    fn test_register_popup_adds_closing_transition() {
        let mut graph = graph_with(vec![State::new("town", Detection::image("town.png"))]);
        let popup = Popup::new("gift", "gift.png", vec!["town".into(), "gift".into()]);
        let (_, tid) = graph.register_popup(&popup).unwrap();

        let closing = graph.transition(tid).unwrap();
        assert_eq!(
            closing.destination,
            Destination::Uncertain(UncertainState::new(vec!["town".into(), "gift".into()]))
        );
        assert!(graph.state("gift").unwrap().is_popup());
        assert_eq!(graph.states_in_group(POPUP_GROUP).len(), 1);
        assert_eq!(graph.transitions_from("gift").len(), 1);
        assert_eq!(graph.transitions_to("town").len(), 1);
    }

    #[test]
    fn test_validate_reports_dangling_names() {
        let mut graph = graph_with(vec![State::new("a", Detection::image("a.png"))]);
        graph.add_transition(Transition::between("a", "missing", vec![]));
        assert!(matches!(
            graph.validate(),
            Err(GraphError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_validate_reports_issues() {
        let mut graph = graph_with(vec![
            State::new("town", Detection::image("town.png")),
            State::new("island", Detection::image("island.png")),
        ]);
        graph
            .register_popup(&Popup::new("lonely", "lonely.png", vec!["town".into()]))
            .unwrap();
        graph.set_ready_state("town");

        let issues = graph.validate().unwrap();
        assert!(issues.contains(&GraphIssue::UnreachablePopup("lonely".into())));
        assert!(issues.contains(&GraphIssue::NoRouteToReady("island".into())));
        assert!(!issues.contains(&GraphIssue::NoRouteToReady("lonely".into())));
    }

    #[test]
    fn test_popup_listing_itself_is_still_unreachable() {
        let mut graph = graph_with(vec![State::new("town", Detection::image("town.png"))]);
        // closing can leave the popup on screen, but nothing else leads to it
        graph
            .register_popup(&Popup::new(
                "reward",
                "reward.png",
                vec!["town".into(), "reward".into()],
            ))
            .unwrap();
        let issues = graph.validate().unwrap();
        assert!(issues.contains(&GraphIssue::UnreachablePopup("reward".into())));

        graph.add_transition(Transition::to_uncertain(
            "town",
            &["town", "reward"],
            vec![Action::key("collect")],
        ));
        let issues = graph.validate().unwrap();
        assert!(!issues.contains(&GraphIssue::UnreachablePopup("reward".into())));
    }
}
