//! Scripted ports and a manual clock for unit tests

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::Settings;
use crate::graph::StateGraph;
use crate::intercept::ErrorCatalog;
use crate::persist::MemoryStore;
use crate::ports::{InputError, InputPort, Match, Point, Rect, VisionError, VisionPort, WindowId};
use crate::EngineContext;

/// Where shown images and texts are reported
pub const DEFAULT_SPOT: Point = Point { x: 100, y: 100 };

#[derive(Default)]
struct Layer {
    images: HashMap<String, Point>,
    texts: HashMap<String, Point>,
}

#[derive(Default)]
struct Screen {
    shared: Layer,
    windows: HashMap<WindowId, Layer>,
    queries: Vec<String>,
    invalidations: usize,
}

/// Vision port answering from a scripted set of visible items
///
/// Clones share the same screen, so a test can keep a handle while the
/// engine owns another.
#[derive(Clone, Default)]
pub struct FakeVision {
    screen: Rc<RefCell<Screen>>,
}

impl FakeVision {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visible in every window
    pub fn show_image(&self, template: &str) {
        self.show_image_at(template, DEFAULT_SPOT);
    }

    pub fn show_image_at(&self, template: &str, at: Point) {
        self.screen
            .borrow_mut()
            .shared
            .images
            .insert(template.to_string(), at);
    }

    /// Visible in `window` only
    pub fn show_image_in(&self, window: &WindowId, template: &str) {
        self.screen
            .borrow_mut()
            .windows
            .entry(window.clone())
            .or_default()
            .images
            .insert(template.to_string(), DEFAULT_SPOT);
    }

    pub fn hide_image(&self, template: &str) {
        let mut screen = self.screen.borrow_mut();
        screen.shared.images.remove(template);
        for layer in screen.windows.values_mut() {
            layer.images.remove(template);
        }
    }

    pub fn show_text(&self, text: &str) {
        self.screen
            .borrow_mut()
            .shared
            .texts
            .insert(text.to_string(), DEFAULT_SPOT);
    }

    pub fn hide_text(&self, text: &str) {
        let mut screen = self.screen.borrow_mut();
        screen.shared.texts.remove(text);
        for layer in screen.windows.values_mut() {
            layer.texts.remove(text);
        }
    }

    /// Hide everything
    pub fn clear(&self) {
        let mut screen = self.screen.borrow_mut();
        screen.shared = Layer::default();
        screen.windows.clear();
    }

    pub fn query_count(&self) -> usize {
        self.screen.borrow().queries.len()
    }

    /// Templates and texts asked for, in order
    pub fn queried(&self) -> Vec<String> {
        self.screen.borrow().queries.clone()
    }

    pub fn reset_queries(&self) {
        self.screen.borrow_mut().queries.clear();
    }

    pub fn invalidations(&self) -> usize {
        self.screen.borrow().invalidations
    }

    fn lookup(&self, window: &WindowId, key: &str, text: bool) -> Option<Point> {
        let mut screen = self.screen.borrow_mut();
        screen.queries.push(key.to_string());
        let pick = |layer: &Layer| {
            if text {
                layer.texts.get(key).copied()
            } else {
                layer.images.get(key).copied()
            }
        };
        screen
            .windows
            .get(window)
            .and_then(pick)
            .or_else(|| pick(&screen.shared))
    }
}

impl VisionPort for FakeVision {
    fn find_image(
        &mut self,
        window: &WindowId,
        template: &str,
        _threshold: f32,
    ) -> Result<Option<Match>, VisionError> {
        Ok(self.lookup(window, template, false).map(|p| Match {
            x: p.x,
            y: p.y,
            confidence: 0.95,
        }))
    }

    fn find_text(&mut self, window: &WindowId, text: &str) -> Result<Option<Point>, VisionError> {
        Ok(self.lookup(window, text, true))
    }

    fn invalidate(&mut self, _window: &WindowId) {
        self.screen.borrow_mut().invalidations += 1;
    }
}

/// What the fake input port was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    Click { window: WindowId, x: i32, y: i32 },
    Key { window: WindowId, key: String },
    Activate(WindowId),
    Place(WindowId, Rect),
}

#[derive(Default)]
struct InputLog {
    events: Vec<InputEvent>,
    rects: HashMap<WindowId, Rect>,
    missing: HashSet<WindowId>,
}

/// Input port recording every call
#[derive(Clone, Default)]
pub struct FakeInput {
    log: Rc<RefCell<InputLog>>,
}

impl FakeInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.log.borrow().events.clone()
    }

    /// Keys pressed, any window
    pub fn keys(&self) -> Vec<String> {
        self.log
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Key { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    /// Keys pressed in `window`
    pub fn keys_in(&self, window: &WindowId) -> Vec<String> {
        self.log
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Key { window: w, key } if w == window => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clicks(&self) -> Vec<(i32, i32)> {
        self.log
            .borrow()
            .events
            .iter()
            .filter_map(|e| match e {
                InputEvent::Click { x, y, .. } => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }

    pub fn set_rect(&self, window: &WindowId, rect: Rect) {
        self.log.borrow_mut().rects.insert(window.clone(), rect);
    }

    /// Make the window disappear
    pub fn remove_window(&self, window: &WindowId) {
        self.log.borrow_mut().missing.insert(window.clone());
    }

    pub fn restore_window(&self, window: &WindowId) {
        self.log.borrow_mut().missing.remove(window);
    }

    fn record(&self, window: &WindowId, event: InputEvent) -> Result<(), InputError> {
        let mut log = self.log.borrow_mut();
        if log.missing.contains(window) {
            return Err(InputError::WindowNotFound(window.to_string()));
        }
        log.events.push(event);
        Ok(())
    }
}

impl InputPort for FakeInput {
    fn click_at(&mut self, window: &WindowId, x: i32, y: i32) -> Result<(), InputError> {
        self.record(
            window,
            InputEvent::Click {
                window: window.clone(),
                x,
                y,
            },
        )
    }

    fn key_press(&mut self, window: &WindowId, key: &str) -> Result<(), InputError> {
        self.record(
            window,
            InputEvent::Key {
                window: window.clone(),
                key: key.to_string(),
            },
        )
    }

    fn activate_window(&mut self, window: &WindowId) -> Result<(), InputError> {
        self.record(window, InputEvent::Activate(window.clone()))
    }

    fn get_window_rect(&mut self, window: &WindowId) -> Result<Option<Rect>, InputError> {
        let log = self.log.borrow();
        if log.missing.contains(window) {
            return Ok(None);
        }
        Ok(Some(
            log.rects
                .get(window)
                .copied()
                .unwrap_or(Rect::new(0, 0, 1280, 720)),
        ))
    }

    fn place_window(&mut self, window: &WindowId, rect: Rect) -> Result<(), InputError> {
        self.record(window, InputEvent::Place(window.clone(), rect))?;
        self.log.borrow_mut().rects.insert(window.clone(), rect);
        Ok(())
    }
}

/// Clock that only moves when told to, or when something sleeps
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<f64>>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, secs: f64) {
        *self.now.lock().unwrap() += secs;
    }

    pub fn set(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration.as_secs_f64());
    }
}

/// Fakes wired into an [`EngineContext`], with handles kept for assertions
pub struct Rig {
    pub vision: FakeVision,
    pub input: FakeInput,
    pub clock: ManualClock,
    pub store: MemoryStore,
}

pub const START: f64 = 1_000_000.0;

impl Rig {
    pub fn new() -> Self {
        Self {
            vision: FakeVision::new(),
            input: FakeInput::new(),
            clock: ManualClock::new(START),
            store: MemoryStore::new(),
        }
    }

    pub fn context(&self, graph: StateGraph, errors: ErrorCatalog) -> EngineContext {
        self.context_with(Settings::fast_preset(), graph, errors)
    }

    pub fn context_with(
        &self,
        settings: Settings,
        graph: StateGraph,
        errors: ErrorCatalog,
    ) -> EngineContext {
        EngineContext::new(
            settings,
            graph,
            errors,
            Box::new(self.vision.clone()),
            Box::new(self.input.clone()),
            Arc::new(self.clock.clone()),
            Box::new(self.store.clone()),
        )
    }
}
