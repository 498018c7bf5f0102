//! Human behavior simulation for synthetic input
//!
//! Adds realistic variance to click positions and to the pauses between
//! actions so the emulator does not see perfectly regular input.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::StealthConfig;

/// Human reaction time range in milliseconds
const MIN_REACTION_TIME_MS: u64 = 180;
const MAX_REACTION_TIME_MS: u64 = 350;

/// Visual processing time range
const MIN_PROCESSING_TIME_MS: u64 = 100;
const MAX_PROCESSING_TIME_MS: u64 = 300;

/// Shortest pause ever produced
const MIN_PAUSE_MS: u64 = 50;

/// Humanizer for generating realistic timing and positions
pub struct Humanizer {
    rng: StdRng,
}

impl Default for Humanizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Humanizer {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence, for tests and replays
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Delay before a click
    ///
    /// Reaction time + visual processing time + occasional hesitation
    pub fn reaction_delay(&mut self) -> u64 {
        let reaction_time = self
            .rng
            .gen_range(MIN_REACTION_TIME_MS..=MAX_REACTION_TIME_MS);
        let processing_time = self
            .rng
            .gen_range(MIN_PROCESSING_TIME_MS..=MAX_PROCESSING_TIME_MS);

        // 5% chance of hesitation (200-800ms)
        let hesitation = if self.rng.gen::<f32>() < 0.05 {
            self.rng.gen_range(200..=800)
        } else {
            0
        };

        reaction_time + processing_time + hesitation
    }

    /// Spread `base_delay_ms` by up to `variance_percent` either way
    pub fn humanize_delay(&mut self, base_delay_ms: u64, variance_percent: u32) -> u64 {
        if variance_percent == 0 {
            return base_delay_ms;
        }

        let variance = (base_delay_ms as f64 * variance_percent as f64 / 100.0) as i64;
        let offset = self.rng.gen_range(-variance..=variance);

        (base_delay_ms as i64 + offset).max(MIN_PAUSE_MS as i64) as u64
    }

    /// Offset to add to a click target
    pub fn humanize_position(&mut self, max_offset: i32) -> (i32, i32) {
        if max_offset == 0 {
            return (0, 0);
        }

        let offset_x = self.gaussian_offset(max_offset);
        let offset_y = self.gaussian_offset(max_offset);

        (offset_x, offset_y)
    }

    /// Sum of uniforms, roughly bell shaped, within `max_offset`
    fn gaussian_offset(&mut self, max_offset: i32) -> i32 {
        let sum: f32 = (0..3).map(|_| self.rng.gen::<f32>() - 0.5).sum();

        (sum * max_offset as f32 * 0.67) as i32
    }

    pub fn should_micro_pause(&mut self, probability: f32) -> bool {
        self.rng.gen::<f32>() < probability
    }

    pub fn micro_pause_duration(&mut self) -> u64 {
        self.rng.gen_range(500..=2000)
    }

    /// Pause to sleep after an action, configured base included
    pub fn action_pause(&mut self, config: &StealthConfig, base_ms: u64) -> u64 {
        let mut pause = if config.jitter_pauses {
            self.humanize_delay(base_ms, config.pause_variance_percent)
        } else {
            base_ms
        };
        if config.micro_pauses && self.should_micro_pause(config.micro_pause_chance) {
            pause += self.micro_pause_duration();
        }
        pause
    }

    /// Click position and pre-click delay for `(x, y)`
    pub fn click(&mut self, config: &StealthConfig, x: i32, y: i32) -> HumanizedClick {
        let (offset_x, offset_y) = if config.jitter_clicks {
            self.humanize_position(config.click_offset_px)
        } else {
            (0, 0)
        };
        let pre_delay_ms = if config.jitter_pauses {
            self.reaction_delay()
        } else {
            0
        };
        HumanizedClick {
            x: x + offset_x,
            y: y + offset_y,
            pre_delay_ms,
        }
    }
}

/// Click with its humanized position and delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HumanizedClick {
    pub x: i32,
    pub y: i32,
    /// Pause before pressing, in ms
    pub pre_delay_ms: u64,
}
