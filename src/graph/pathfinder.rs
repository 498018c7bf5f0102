//! Shortest routes through the graph
//!
//! Breadth-first search counting transitions, not their duration. Edges are
//! tried in declaration order, so among equally short routes the one whose
//! first transition was declared first wins. Wildcard sources are edges from
//! every state, and an uncertain destination fans out to each candidate.
//! An uncertain destination with no candidates gives no edge: where it
//! lands is only known after detection.

use std::collections::VecDeque;

use super::{Destination, GraphError, StateGraph, StateId, TransitionId};

/// Longest route the search will build
pub const DEFAULT_MAX_DEPTH: usize = 20;

/// Transitions to take, in order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Route {
    pub transitions: Vec<TransitionId>,
    /// `false` when the route stops at an uncertain destination and the
    /// rest must be planned after re-detection
    pub complete: bool,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn first(&self) -> Option<TransitionId> {
        self.transitions.first().copied()
    }
}

impl StateGraph {
    /// Route from `from` to `to`
    pub fn find_path(&self, from: &str, to: &str) -> Result<Route, GraphError> {
        self.find_path_to_any(from, &[to])
    }

    /// Route from `from` to the nearest of `targets`
    pub fn find_path_to_any(&self, from: &str, targets: &[&str]) -> Result<Route, GraphError> {
        let start = self
            .state_id(from)
            .ok_or_else(|| GraphError::UnknownState(from.to_string()))?;
        let mut goal = vec![false; self.states.len()];
        for name in targets {
            let id = self
                .state_id(name)
                .ok_or_else(|| GraphError::UnknownState(name.to_string()))?;
            goal[id] = true;
        }
        let no_path = || GraphError::NoPathFound {
            from: from.to_string(),
            to: targets.join(" | "),
        };

        if goal[start] {
            return Ok(Route {
                transitions: Vec::new(),
                complete: true,
            });
        }

        // Edge that first reached each state
        let mut parent: Vec<Option<(StateId, TransitionId)>> = vec![None; self.states.len()];
        let mut depth = vec![0usize; self.states.len()];
        let mut visited = vec![false; self.states.len()];
        let mut queue = VecDeque::new();
        visited[start] = true;
        queue.push_back(start);

        while let Some(node) = queue.pop_front() {
            if depth[node] >= self.max_depth {
                continue;
            }
            let name = &self.states[node].name;
            for (tid, transition) in self.transitions.iter().enumerate() {
                if !transition.applies_from(name) {
                    continue;
                }
                for next_name in transition.destination.names() {
                    let Some(next) = self.state_id(next_name) else {
                        continue;
                    };
                    if visited[next] {
                        continue;
                    }
                    visited[next] = true;
                    parent[next] = Some((node, tid));
                    depth[next] = depth[node] + 1;
                    if goal[next] {
                        return Ok(self.build_route(&parent, next));
                    }
                    queue.push_back(next);
                }
            }
        }

        Err(no_path())
    }

    /// Walk parents back from `end`, then cut after the first uncertain hop
    fn build_route(&self, parent: &[Option<(StateId, TransitionId)>], end: StateId) -> Route {
        let mut transitions = Vec::new();
        let mut node = end;
        while let Some((prev, tid)) = parent[node] {
            transitions.push(tid);
            node = prev;
        }
        transitions.reverse();

        let cut = transitions
            .iter()
            .position(|&tid| matches!(self.transitions[tid].destination, Destination::Uncertain(_)));
        if let Some(i) = cut {
            transitions.truncate(i + 1);
        }
        Route {
            transitions,
            complete: cut.is_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::*;

    fn named(names: &[&str]) -> StateGraph {
        let mut graph = StateGraph::new();
        for n in names {
            graph
                .add_state(State::new(*n, Detection::image(format!("{}.png", n))))
                .unwrap();
        }
        graph
    }

    /// not_launched -> loading -> ?[town, popup_gift], popup_gift closes to ?[town, popup_gift]
    fn launch_graph() -> StateGraph {
        let mut graph = named(&["non_lance", "chargement", "ville"]);
        graph.add_transition(Transition::between("non_lance", "chargement", vec![]));
        graph.add_transition(Transition::to_uncertain(
            "chargement",
            &["ville", "popup_gratuit"],
            vec![],
        ));
        graph
            .register_popup(&Popup::new(
                "popup_gratuit",
                "gratuit.png",
                vec!["ville".into(), "popup_gratuit".into()],
            ))
            .unwrap();
        graph
    }

    #[test]
    fn test_launch_scenario() {
        let graph = launch_graph();

        let route = graph.find_path("non_lance", "ville").unwrap();
        assert_eq!(route.transitions, vec![0, 1]);
        assert!(!route.complete);

        let route = graph.find_path("popup_gratuit", "ville").unwrap();
        assert_eq!(route.transitions, vec![2]);
        assert_eq!(route.len(), 1);
    }

    #[test]
    fn test_same_state_is_empty_route() {
        let graph = launch_graph();
        let route = graph.find_path("ville", "ville").unwrap();
        assert!(route.is_empty());
        assert!(route.complete);
    }

    #[test]
    fn test_shortest_route_wins() {
        let mut graph = named(&["a", "b", "c", "d"]);
        graph.add_transition(Transition::between("a", "b", vec![]));
        graph.add_transition(Transition::between("b", "c", vec![]));
        graph.add_transition(Transition::between("c", "d", vec![]));
        graph.add_transition(Transition::between("a", "d", vec![]));

        let route = graph.find_path("a", "d").unwrap();
        assert_eq!(route.transitions, vec![3]);
        assert!(route.complete);
    }

    #[test]
    fn test_tie_goes_to_first_declared_edge() {
        let mut graph = named(&["a", "b", "c", "d"]);
        graph.add_transition(Transition::between("a", "c", vec![]));
        graph.add_transition(Transition::between("b", "d", vec![]));
        graph.add_transition(Transition::between("a", "b", vec![]));
        graph.add_transition(Transition::between("c", "d", vec![]));

        let route = graph.find_path("a", "d").unwrap();
        assert_eq!(route.transitions, vec![0, 3]);
    }

    #[test]
    fn test_any_source_is_an_edge_from_everywhere() {
        let mut graph = named(&["a", "b", "home"]);
        graph.add_transition(Transition::between("a", "b", vec![]));
        graph.add_transition(Transition::new(
            "escape",
            Source::Any,
            Destination::State("home".into()),
            vec![],
        ));

        assert_eq!(graph.find_path("b", "home").unwrap().transitions, vec![1]);
        assert_eq!(graph.find_path("a", "home").unwrap().transitions, vec![1]);
    }

    #[test]
    fn test_route_stops_after_uncertain_hop() {
        let mut graph = named(&["a", "b", "c", "d"]);
        graph.add_transition(Transition::to_uncertain("a", &["b", "c"], vec![]));
        graph.add_transition(Transition::between("b", "d", vec![]));

        let route = graph.find_path("a", "d").unwrap();
        assert_eq!(route.transitions, vec![0]);
        assert!(!route.complete);
    }

    #[test]
    fn test_find_path_to_any_picks_nearest() {
        let mut graph = named(&["a", "b", "c"]);
        graph.add_transition(Transition::between("a", "b", vec![]));
        graph.add_transition(Transition::between("b", "c", vec![]));

        let route = graph.find_path_to_any("a", &["c", "b"]).unwrap();
        assert_eq!(route.transitions, vec![0]);
    }

    #[test]
    fn test_unreachable_is_no_path() {
        let graph = named(&["a", "b"]);
        assert!(matches!(
            graph.find_path("a", "b"),
            Err(GraphError::NoPathFound { .. })
        ));
        assert!(matches!(
            graph.find_path("a", "zzz"),
            Err(GraphError::UnknownState(_))
        ));
    }

    #[test]
    fn test_depth_limit() {
        let mut graph = named(&["s0", "s1", "s2", "s3"]).with_max_depth(2);
        graph.add_transition(Transition::between("s0", "s1", vec![]));
        graph.add_transition(Transition::between("s1", "s2", vec![]));
        graph.add_transition(Transition::between("s2", "s3", vec![]));

        assert_eq!(graph.find_path("s0", "s2").unwrap().len(), 2);
        assert!(graph.find_path("s0", "s3").is_err());
    }
}
