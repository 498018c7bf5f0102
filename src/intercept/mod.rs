//! Known error and popup catalogue
//!
//! Scanned after every executed action. Entries are tried by descending
//! priority, then declaration order, and the scan stops at the first match:
//! one error is handled per pass. Errors marked `on_failure_only` are left
//! out of that pass and only checked for the guarded actions naming them.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::graph::Detection;
use crate::ports::{VisionError, VisionPort, WindowId};

/// A recognizable error screen and how to get out of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownError {
    pub name: String,
    pub detection: Detection,
    #[serde(default)]
    pub message: String,
    /// Queued in front of the sequence when the error is seen
    #[serde(default)]
    pub correction: Vec<Action>,
    /// Keep the manor out of the rotation this long after handling
    #[serde(default)]
    pub exclude_for_secs: f64,
    /// Run the interrupted action again after the correction
    #[serde(default)]
    pub retry_original: bool,
    #[serde(default)]
    pub priority: i32,
    /// Only checked when a guarded action listing it fails
    #[serde(default)]
    pub on_failure_only: bool,
}

impl KnownError {
    pub fn new(name: impl Into<String>, detection: Detection) -> Self {
        Self {
            name: name.into(),
            detection,
            message: String::new(),
            correction: Vec::new(),
            exclude_for_secs: 0.0,
            retry_original: false,
            priority: 0,
            on_failure_only: false,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_correction(mut self, correction: Vec<Action>) -> Self {
        self.correction = correction;
        self
    }

    pub fn retrying(mut self) -> Self {
        self.retry_original = true;
        self
    }

    pub fn excluding(mut self, secs: f64) -> Self {
        self.exclude_for_secs = secs;
        self
    }

    pub fn only_on_failure(mut self) -> Self {
        self.on_failure_only = true;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Message for logs, the name when none was given
    pub fn describe(&self) -> &str {
        if self.message.is_empty() {
            &self.name
        } else {
            &self.message
        }
    }
}

/// Ordered list of known errors
#[derive(Debug, Clone, Default)]
pub struct ErrorCatalog {
    errors: Vec<KnownError>,
}

impl ErrorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_errors(errors: Vec<KnownError>) -> Self {
        let mut catalog = Self::new();
        for e in errors {
            catalog.add(e);
        }
        catalog
    }

    /// Insert after every entry of equal or higher priority
    pub fn add(&mut self, error: KnownError) {
        let at = self
            .errors
            .iter()
            .position(|e| e.priority < error.priority)
            .unwrap_or(self.errors.len());
        self.errors.insert(at, error);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownError> {
        self.errors.iter()
    }

    /// First known error visible in `window`
    pub fn scan(
        &self,
        vision: &mut dyn VisionPort,
        window: &WindowId,
    ) -> Result<Option<&KnownError>, VisionError> {
        for error in self.errors.iter().filter(|e| !e.on_failure_only) {
            if error.detection.verify(vision, window)? {
                return Ok(Some(error));
            }
        }
        Ok(None)
    }

    /// First of the `names` errors visible in `window`, in catalogue order
    pub fn scan_named(
        &self,
        vision: &mut dyn VisionPort,
        window: &WindowId,
        names: &[String],
    ) -> Result<Option<&KnownError>, VisionError> {
        for error in self.errors.iter().filter(|e| names.contains(&e.name)) {
            if error.detection.verify(vision, window)? {
                return Ok(Some(error));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeVision;

    #[test]
    fn test_priority_then_declaration_order() {
        let catalog = ErrorCatalog::from_errors(vec![
            KnownError::new("low", Detection::image("low.png")),
            KnownError::new("high", Detection::image("high.png")).with_priority(5),
            KnownError::new("low2", Detection::image("low2.png")),
            KnownError::new("high2", Detection::image("high2.png")).with_priority(5),
        ]);
        let names: Vec<&str> = catalog.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["high", "high2", "low", "low2"]);
    }

    #[test]
    fn test_scan_handles_first_match_only() {
        let catalog = ErrorCatalog::from_errors(vec![
            KnownError::new("disconnected", Detection::text("Connection lost")).with_priority(10),
            KnownError::new("report", Detection::image("report.png")),
            KnownError::new("gift", Detection::image("gift.png")),
        ]);
        let mut vision = FakeVision::new();
        vision.show_image("report.png");
        vision.show_image("gift.png");

        let hit = catalog
            .scan(&mut vision, &WindowId::new("w"))
            .unwrap()
            .unwrap();
        assert_eq!(hit.name, "report");
        assert!(!vision.queried().contains(&"gift.png".to_string()));
    }

    #[test]
    fn test_scan_miss() {
        let catalog = ErrorCatalog::from_errors(vec![KnownError::new(
            "gift",
            Detection::image("gift.png"),
        )]);
        let mut vision = FakeVision::new();
        assert!(catalog
            .scan(&mut vision, &WindowId::new("w"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_failure_only_errors_need_a_name() {
        let catalog = ErrorCatalog::from_errors(vec![
            KnownError::new("no_gold", Detection::text("Not enough gold")).only_on_failure(),
            KnownError::new("report", Detection::image("report.png")),
        ]);
        let mut vision = FakeVision::new();
        let window = WindowId::new("w");
        vision.show_text("Not enough gold");

        assert!(catalog.scan(&mut vision, &window).unwrap().is_none());
        let named = ["no_gold".to_string()];
        let hit = catalog.scan_named(&mut vision, &window, &named).unwrap().unwrap();
        assert_eq!(hit.name, "no_gold");

        vision.show_image("report.png");
        vision.reset_queries();
        assert!(catalog.scan_named(&mut vision, &window, &[]).unwrap().is_none());
        assert!(vision.queried().is_empty());
    }

    #[test]
    fn test_describe_falls_back_to_name() {
        let plain = KnownError::new("gift", Detection::image("gift.png"));
        assert_eq!(plain.describe(), "gift");
        assert_eq!(plain.with_message("Free gift").describe(), "Free gift");
    }
}
