//! Directed, action-bearing edges between states

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::manor::ManorView;

/// Index of a transition in its graph, in declaration order
pub type TransitionId = usize;

/// Where a transition can be taken from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Available from every state (global popup handling)
    Any,
    State(String),
}

/// "One of these states" after a transition with an uncertain outcome
///
/// An empty candidate list means any declared state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UncertainState {
    pub candidates: Vec<String>,
}

impl UncertainState {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.candidates.iter().any(|c| c == name)
    }
}

/// Where a transition lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    State(String),
    Uncertain(UncertainState),
}

impl Destination {
    pub fn is_uncertain(&self) -> bool {
        matches!(self, Destination::Uncertain(_))
    }

    /// Names of the states this destination may resolve to
    pub fn names(&self) -> Vec<&str> {
        match self {
            Destination::State(name) => vec![name.as_str()],
            Destination::Uncertain(u) => u.candidates.iter().map(String::as_str).collect(),
        }
    }
}

/// Builds a transition's actions against the manor taking it
pub type DynamicActions = Arc<dyn Fn(&ManorView<'_>) -> Vec<Action> + Send + Sync>;

/// Fixed action list or a closure over the manor's view
#[derive(Clone)]
pub enum ActionFactory {
    Fixed(Vec<Action>),
    Dynamic(DynamicActions),
}

impl ActionFactory {
    pub fn build(&self, view: &ManorView<'_>) -> Vec<Action> {
        match self {
            ActionFactory::Fixed(actions) => actions.clone(),
            ActionFactory::Dynamic(f) => f(view),
        }
    }
}

impl fmt::Debug for ActionFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionFactory::Fixed(actions) => f.debug_tuple("Fixed").field(actions).finish(),
            ActionFactory::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Edge of the navigation graph
#[derive(Debug, Clone)]
pub struct Transition {
    /// Used in logs
    pub label: String,
    pub source: Source,
    pub destination: Destination,
    pub actions: ActionFactory,
}

impl Transition {
    pub fn new(
        label: impl Into<String>,
        source: Source,
        destination: Destination,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            destination,
            actions: ActionFactory::Fixed(actions),
        }
    }

    /// Transition between two named states
    pub fn between(from: &str, to: &str, actions: Vec<Action>) -> Self {
        Self::new(
            format!("{} -> {}", from, to),
            Source::State(from.to_string()),
            Destination::State(to.to_string()),
            actions,
        )
    }

    /// Transition from a named state to one of several candidates
    pub fn to_uncertain(from: &str, candidates: &[&str], actions: Vec<Action>) -> Self {
        Self::new(
            format!("{} -> ?[{}]", from, candidates.join(", ")),
            Source::State(from.to_string()),
            Destination::Uncertain(UncertainState::new(
                candidates.iter().map(|c| c.to_string()).collect(),
            )),
            actions,
        )
    }

    pub fn with_dynamic_actions(mut self, factory: DynamicActions) -> Self {
        self.actions = ActionFactory::Dynamic(factory);
        self
    }

    /// Whether the transition can be taken while in `state`
    pub fn applies_from(&self, state: &str) -> bool {
        match &self.source {
            Source::Any => true,
            Source::State(name) => name == state,
        }
    }
}
