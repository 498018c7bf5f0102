//! External collaborator contracts
//!
//! The engine never grabs the screen or moves the mouse itself. It talks
//! to a vision capability and an input capability through these traits,
//! and every call names the window it targets. Screen capture, template
//! matching and OCR live behind [`VisionPort`]; clicks, key presses and
//! window placement live behind [`InputPort`].

pub mod frame;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub use frame::{FrameVision, TextRecognizer};

/// Identifier of an emulator window (title or native handle rendered as text)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub String);

impl WindowId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A point in window coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Shift by an offset
    pub fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Best template match: center of the matched area plus its score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub x: i32,
    pub y: i32,
    pub confidence: f32,
}

impl Match {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// On-screen rectangle of a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a position expressed as fractions of the window size
    /// (0.0..=1.0) into window coordinates
    pub fn relative_point(&self, rx: f32, ry: f32) -> Point {
        let rx = rx.clamp(0.0, 1.0);
        let ry = ry.clamp(0.0, 1.0);
        Point::new(
            (rx * self.width as f32).round() as i32,
            (ry * self.height as f32).round() as i32,
        )
    }

    /// Clamp a window-relative point inside the window
    pub fn clamp_point(&self, p: Point) -> Point {
        let max_x = self.width.saturating_sub(1) as i32;
        let max_y = self.height.saturating_sub(1) as i32;
        Point::new(p.x.clamp(0, max_x), p.y.clamp(0, max_y))
    }
}

/// Screen queries against the current frame of a window
pub trait VisionPort {
    /// Best match of `template` with a score of at least `threshold`
    fn find_image(
        &mut self,
        window: &WindowId,
        template: &str,
        threshold: f32,
    ) -> Result<Option<Match>, VisionError>;

    /// Whether `template` is visible with a score of at least `threshold`
    fn detect_image(
        &mut self,
        window: &WindowId,
        template: &str,
        threshold: f32,
    ) -> Result<bool, VisionError> {
        Ok(self.find_image(window, template, threshold)?.is_some())
    }

    /// Position of `text` if it is visible
    fn find_text(&mut self, window: &WindowId, text: &str) -> Result<Option<Point>, VisionError>;

    /// Whether `text` is visible
    fn detect_text(&mut self, window: &WindowId, text: &str) -> Result<bool, VisionError> {
        Ok(self.find_text(window, text)?.is_some())
    }

    /// Drop any cached frame so the next query sees a fresh capture
    fn invalidate(&mut self, _window: &WindowId) {}
}

/// Synthetic input and window management
pub trait InputPort {
    /// Click at window-relative coordinates
    fn click_at(&mut self, window: &WindowId, x: i32, y: i32) -> Result<(), InputError>;

    fn key_press(&mut self, window: &WindowId, key: &str) -> Result<(), InputError>;

    /// Bring the window to the foreground
    fn activate_window(&mut self, window: &WindowId) -> Result<(), InputError>;

    /// Current on-screen rectangle, `None` if the window does not exist
    fn get_window_rect(&mut self, window: &WindowId) -> Result<Option<Rect>, InputError>;

    fn place_window(&mut self, window: &WindowId, rect: Rect) -> Result<(), InputError>;
}

/// Input port that only logs what it would do
///
/// Used by the CLI to smoke-test a configuration without touching the
/// desktop.
#[derive(Debug, Default)]
pub struct DryRunInput {
    rects: HashMap<WindowId, Rect>,
}

impl DryRunInput {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputPort for DryRunInput {
    fn click_at(&mut self, window: &WindowId, x: i32, y: i32) -> Result<(), InputError> {
        log::info!("[dry-run] click {} at ({}, {})", window, x, y);
        Ok(())
    }

    fn key_press(&mut self, window: &WindowId, key: &str) -> Result<(), InputError> {
        log::info!("[dry-run] key '{}' on {}", key, window);
        Ok(())
    }

    fn activate_window(&mut self, window: &WindowId) -> Result<(), InputError> {
        log::debug!("[dry-run] activate {}", window);
        Ok(())
    }

    fn get_window_rect(&mut self, window: &WindowId) -> Result<Option<Rect>, InputError> {
        Ok(Some(
            self.rects
                .get(window)
                .copied()
                .unwrap_or(Rect::new(0, 0, 1280, 720)),
        ))
    }

    fn place_window(&mut self, window: &WindowId, rect: Rect) -> Result<(), InputError> {
        log::info!("[dry-run] place {} at {:?}", window, rect);
        self.rects.insert(window.clone(), rect);
        Ok(())
    }
}

/// Vision capability errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Template not available: {0}")]
    TemplateNotFound(String),
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),
    #[error("Invalid frame data")]
    InvalidFrameData,
    #[error("Failed to process image: {0}")]
    ImageProcessingError(String),
}

/// Input capability errors
#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("Window not found: {0}")]
    WindowNotFound(String),
    #[error("Input dispatch failed: {0}")]
    DispatchFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_point() {
        let rect = Rect::new(100, 50, 1280, 720);
        assert_eq!(rect.relative_point(0.5, 0.5), Point::new(640, 360));
        assert_eq!(rect.relative_point(2.0, -1.0), Point::new(1280, 0));
    }

    #[test]
    fn test_clamp_point() {
        let rect = Rect::new(0, 0, 100, 50);
        assert_eq!(rect.clamp_point(Point::new(-5, 80)), Point::new(0, 49));
    }

    #[test]
    fn test_dry_run_remembers_placement() {
        let mut input = DryRunInput::new();
        let window = WindowId::new("emu-1");
        input
            .place_window(&window, Rect::new(10, 20, 640, 360))
            .unwrap();
        assert_eq!(
            input.get_window_rect(&window).unwrap(),
            Some(Rect::new(10, 20, 640, 360))
        );
    }
}
