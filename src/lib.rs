//! Manoir Pilot - state-graph navigation and scheduling for emulator windows
//!
//! This library drives a mobile game running in several Android emulator
//! windows ("manors") at once: it recognizes the screen each window shows,
//! finds the shortest route through a graph of known states, executes the
//! actions along the way while intercepting error popups, and decides which
//! window gets the input focus next.
//!
//! Screen capture, template matching and synthetic input stay behind the
//! [`ports::VisionPort`] and [`ports::InputPort`] traits. Manors pass
//! messages to each other over a [`bus::MessageBus`].
//!
//! ## Anti-Detection
//!
//! The `stealth` module adds realistic variance to click positions and to
//! the pauses between actions.

pub mod action;
pub mod bus;
pub mod clock;
pub mod config;
pub mod engine;
pub mod graph;
pub mod intercept;
pub mod manor;
pub mod persist;
pub mod ports;
pub mod scheduler;
pub mod stealth;

#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use crate::bus::MessageBus;
use crate::clock::Clock;
use crate::config::Settings;
use crate::engine::{ActivityFlag, EngineControl};
use crate::graph::StateGraph;
use crate::intercept::ErrorCatalog;
use crate::persist::Persistence;
use crate::ports::{InputPort, VisionPort};
use crate::stealth::Humanizer;

/// Everything shared by the manors of one engine
///
/// Built once at startup and passed explicitly to every component.
pub struct EngineContext {
    pub settings: Settings,
    pub graph: StateGraph,
    pub errors: ErrorCatalog,
    pub vision: Box<dyn VisionPort>,
    pub input: Box<dyn InputPort>,
    pub clock: Arc<dyn Clock>,
    pub store: Box<dyn Persistence>,
    pub humanizer: Humanizer,
    /// Messages between manors
    pub bus: MessageBus,
    pub control: EngineControl,
    pub activity: ActivityFlag,
}

impl EngineContext {
    /// The graph's route length limit comes from `settings.engine`
    pub fn new(
        settings: Settings,
        graph: StateGraph,
        errors: ErrorCatalog,
        vision: Box<dyn VisionPort>,
        input: Box<dyn InputPort>,
        clock: Arc<dyn Clock>,
        store: Box<dyn Persistence>,
    ) -> Self {
        let graph = graph.with_max_depth(settings.engine.max_path_depth);
        Self {
            settings,
            graph,
            errors,
            vision,
            input,
            clock,
            store,
            humanizer: Humanizer::new(),
            bus: MessageBus::new(),
            control: EngineControl::new(),
            activity: ActivityFlag::new(),
        }
    }

    /// Current time in seconds
    pub fn now(&self) -> f64 {
        self.clock.now()
    }
}
