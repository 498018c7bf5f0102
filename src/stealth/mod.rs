//! Humanized input
//!
//! Clicks land a few pixels off their target and the pauses between
//! actions and window switches wander around their configured base, with
//! an occasional longer pause.

pub mod humanize;

pub use humanize::{HumanizedClick, Humanizer};

use serde::{Deserialize, Serialize};

/// The `stealth` section of the settings file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StealthConfig {
    /// Vary inter-action and inter-window pauses
    pub jitter_pauses: bool,
    /// Offset click positions
    pub jitter_clicks: bool,
    pub micro_pauses: bool,
    /// Spread of a pause around its base, in percent
    pub pause_variance_percent: u32,
    /// Largest click offset on each axis, in pixels
    pub click_offset_px: i32,
    /// Chance of a micro-pause after an action (0.0-1.0)
    pub micro_pause_chance: f32,
}

impl Default for StealthConfig {
    fn default() -> Self {
        Self {
            jitter_pauses: true,
            jitter_clicks: true,
            micro_pauses: true,
            pause_variance_percent: 30,
            click_offset_px: 6,
            micro_pause_chance: 0.05,
        }
    }
}

impl StealthConfig {
    /// Exact positions and pauses
    pub fn disabled() -> Self {
        Self {
            jitter_pauses: false,
            jitter_clicks: false,
            micro_pauses: false,
            pause_variance_percent: 0,
            click_offset_px: 0,
            micro_pause_chance: 0.0,
        }
    }

    pub fn cautious() -> Self {
        Self {
            pause_variance_percent: 40,
            click_offset_px: 10,
            micro_pause_chance: 0.12,
            ..Self::default()
        }
    }

    pub fn is_disabled(&self) -> bool {
        !self.jitter_pauses && !self.jitter_clicks && !self.micro_pauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_section_keeps_defaults() {
        let config: StealthConfig = serde_json::from_str(r#"{ "click_offset_px": 3 }"#).unwrap();
        assert_eq!(config.click_offset_px, 3);
        assert!(config.jitter_pauses);
        assert_eq!(config.pause_variance_percent, 30);
    }

    #[test]
    fn test_presets() {
        assert!(StealthConfig::disabled().is_disabled());
        assert!(!StealthConfig::cautious().is_disabled());
        assert!(StealthConfig::cautious().click_offset_px > StealthConfig::default().click_offset_px);
    }
}
