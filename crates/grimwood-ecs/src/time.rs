//! Fixed-timestep simulation clock.
//!
//! The [`TimeManager`] decouples simulation rate from display rate. Each
//! display frame feeds it a wall-clock delta; the delta is clamped to
//! [`MAX_FRAME_DELTA`] and accumulated into a buffer. The buffer is then
//! drained in whole [`FIXED_TIMESTEP`] steps, at most
//! [`MAX_UPDATES_PER_FRAME`] per frame:
//!
//! ```
//! use grimwood_ecs::time::{TimeConfig, TimeManager};
//!
//! let mut time = TimeManager::new(TimeConfig::default());
//! time.begin_frame(3.0 / 60.0);
//! let mut ticks = 0;
//! while time.next_tick().is_some() {
//!     ticks += 1;
//! }
//! assert_eq!(ticks, 3);
//! ```
//!
//! When a frame still holds a full step after the cap is reached the
//! simulation has fallen behind real time. The leftover time is dropped and
//! an error is logged; the simulation does not try to catch up.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Duration of one simulation tick in seconds.
pub const FIXED_TIMESTEP: f64 = 1.0 / 60.0;

/// Longest wall-clock delta accepted from a single frame, in seconds.
pub const MAX_FRAME_DELTA: f64 = 0.25;

/// Most ticks produced by a single frame.
pub const MAX_UPDATES_PER_FRAME: u32 = 5;

/// Slack used when comparing the buffer against one step, so that deltas
/// that add up to exactly N steps yield N ticks despite rounding.
const STEP_EPSILON: f64 = 1e-9;

// ---------------------------------------------------------------------------
// TimeConfig
// ---------------------------------------------------------------------------

/// Clock configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// Fixed time step in seconds per tick. Must be positive and finite.
    pub fixed_dt: f64,
    /// Per-frame delta clamp in seconds.
    pub max_frame_delta: f64,
    /// Per-frame tick cap.
    pub max_updates_per_frame: u32,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            fixed_dt: FIXED_TIMESTEP,
            max_frame_delta: MAX_FRAME_DELTA,
            max_updates_per_frame: MAX_UPDATES_PER_FRAME,
        }
    }
}

// ---------------------------------------------------------------------------
// TimeManager
// ---------------------------------------------------------------------------

/// Accumulator-based fixed-step clock.
#[derive(Debug)]
pub struct TimeManager {
    config: TimeConfig,
    buffer: f64,
    updates_this_frame: u32,
    tick_counter: u64,
    dropped: f64,
    last_frame: Option<Instant>,
}

impl TimeManager {
    /// Create a clock.
    ///
    /// # Panics
    ///
    /// Panics if `fixed_dt` or `max_frame_delta` is not positive and finite.
    pub fn new(config: TimeConfig) -> Self {
        assert!(
            config.fixed_dt > 0.0 && config.fixed_dt.is_finite(),
            "fixed_dt must be positive and finite, got {}",
            config.fixed_dt
        );
        assert!(
            config.max_frame_delta > 0.0 && config.max_frame_delta.is_finite(),
            "max_frame_delta must be positive and finite, got {}",
            config.max_frame_delta
        );
        Self {
            config,
            buffer: 0.0,
            updates_this_frame: 0,
            tick_counter: 0,
            dropped: 0.0,
            last_frame: None,
        }
    }

    /// Start a frame with the given wall-clock delta in seconds.
    ///
    /// Returns the delta actually accumulated after clamping. Negative or
    /// non-finite deltas are ignored.
    pub fn begin_frame(&mut self, delta: f64) -> f64 {
        let accepted = if !delta.is_finite() || delta < 0.0 {
            warn!(delta, "ignoring invalid frame delta");
            0.0
        } else if delta > self.config.max_frame_delta {
            debug!(
                delta,
                clamp = self.config.max_frame_delta,
                "frame delta clamped"
            );
            self.config.max_frame_delta
        } else {
            delta
        };
        self.buffer += accepted;
        self.updates_this_frame = 0;
        accepted
    }

    /// Start a frame from a wall-clock instant.
    ///
    /// The first call only records the instant and accumulates nothing.
    pub fn frame_at(&mut self, now: Instant) -> f64 {
        let delta = match self.last_frame.replace(now) {
            Some(previous) => now.saturating_duration_since(previous).as_secs_f64(),
            None => 0.0,
        };
        self.begin_frame(delta)
    }

    /// Consume one step from the buffer.
    ///
    /// Returns the 1-based number of the tick, or `None` once the buffer is
    /// below one step or this frame already produced the maximum number of
    /// ticks. Hitting the cap with time still owed drops that time.
    pub fn next_tick(&mut self) -> Option<u64> {
        let step = self.config.fixed_dt;
        let has_step = self.buffer + STEP_EPSILON >= step;

        if self.updates_this_frame >= self.config.max_updates_per_frame {
            if has_step {
                error!(
                    dropped = self.buffer,
                    steps = self.buffered_steps(),
                    cap = self.config.max_updates_per_frame,
                    "simulation fell behind real time, dropping buffered time"
                );
                self.dropped += self.buffer;
                self.buffer = 0.0;
            }
            return None;
        }
        if !has_step {
            return None;
        }

        self.buffer = (self.buffer - step).max(0.0);
        self.updates_this_frame += 1;
        self.tick_counter += 1;
        Some(self.tick_counter)
    }

    /// Feed one frame and drain it, returning the number of ticks produced.
    pub fn advance(&mut self, delta: f64) -> u32 {
        self.begin_frame(delta);
        let mut ticks = 0;
        while self.next_tick().is_some() {
            ticks += 1;
        }
        ticks
    }

    // -- accessors ----------------------------------------------------------

    /// The fixed step in seconds.
    pub fn time_step(&self) -> f64 {
        self.config.fixed_dt
    }

    /// Ticks produced so far.
    pub fn tick_count(&self) -> u64 {
        self.tick_counter
    }

    /// Simulated seconds, computed as `tick_count * fixed_dt` to avoid
    /// drift from repeated addition.
    pub fn sim_time(&self) -> f64 {
        self.tick_counter as f64 * self.config.fixed_dt
    }

    /// Seconds currently buffered.
    pub fn buffered(&self) -> f64 {
        self.buffer
    }

    /// Buffered time expressed in steps.
    pub fn buffered_steps(&self) -> f64 {
        self.buffer / self.config.fixed_dt
    }

    /// Total seconds dropped by overload so far.
    pub fn dropped(&self) -> f64 {
        self.dropped
    }

    /// Ticks produced by the current frame.
    pub fn updates_this_frame(&self) -> u32 {
        self.updates_this_frame
    }

    /// The active configuration.
    pub fn config(&self) -> &TimeConfig {
        &self.config
    }
}

impl Default for TimeManager {
    fn default() -> Self {
        Self::new(TimeConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const STEP: f64 = FIXED_TIMESTEP;

    #[test]
    fn five_and_a_half_steps_yield_five_ticks() {
        let mut time = TimeManager::default();
        assert_eq!(time.advance(5.5 * STEP), 5);
        assert!((time.buffered_steps() - 0.5).abs() < 1e-6);
        assert_eq!(time.dropped(), 0.0);
    }

    #[test]
    fn residual_carries_into_next_frame() {
        let mut time = TimeManager::default();
        time.advance(5.5 * STEP);
        assert_eq!(time.advance(0.5 * STEP), 1);
        assert!(time.buffered_steps().abs() < 1e-6);
        assert_eq!(time.tick_count(), 6);
    }

    #[test]
    fn long_frame_is_clamped() {
        let mut time = TimeManager::default();
        let accepted = time.begin_frame(2.0);
        assert_eq!(accepted, MAX_FRAME_DELTA);
        assert_eq!(time.buffered(), MAX_FRAME_DELTA);
    }

    #[test]
    fn overload_caps_ticks_and_drops_time() {
        let mut time = TimeManager::default();
        // 0.25 s is 15 steps; only 5 run, the rest is dropped.
        assert_eq!(time.advance(2.0), MAX_UPDATES_PER_FRAME);
        assert_eq!(time.buffered(), 0.0);
        assert!((time.dropped() - 10.0 * STEP).abs() < 1e-6);
    }

    #[test]
    fn sub_step_frames_accumulate() {
        let mut time = TimeManager::default();
        assert_eq!(time.advance(0.4 * STEP), 0);
        assert_eq!(time.advance(0.4 * STEP), 0);
        assert_eq!(time.advance(0.4 * STEP), 1);
    }

    #[test]
    fn invalid_deltas_are_ignored() {
        let mut time = TimeManager::default();
        assert_eq!(time.begin_frame(f64::NAN), 0.0);
        assert_eq!(time.begin_frame(-1.0), 0.0);
        assert_eq!(time.buffered(), 0.0);
    }

    #[test]
    fn tick_numbers_are_sequential() {
        let mut time = TimeManager::default();
        time.begin_frame(3.0 * STEP);
        assert_eq!(time.next_tick(), Some(1));
        assert_eq!(time.next_tick(), Some(2));
        assert_eq!(time.next_tick(), Some(3));
        assert_eq!(time.next_tick(), None);
        assert!((time.sim_time() - 3.0 * STEP).abs() < 1e-12);
    }

    #[test]
    fn frame_at_measures_wall_clock() {
        let mut time = TimeManager::default();
        let start = Instant::now();
        assert_eq!(time.frame_at(start), 0.0);
        let accepted = time.frame_at(start + Duration::from_millis(50));
        assert!((accepted - 0.05).abs() < 1e-9);
    }

    #[test]
    #[should_panic(expected = "fixed_dt must be positive and finite")]
    fn zero_timestep_panics() {
        TimeManager::new(TimeConfig {
            fixed_dt: 0.0,
            ..TimeConfig::default()
        });
    }

    #[test]
    fn config_deserializes_with_defaults() {
        let config: TimeConfig = serde_json::from_str(r#"{ "max_updates_per_frame": 3 }"#).unwrap();
        assert_eq!(config.max_updates_per_frame, 3);
        assert_eq!(config.fixed_dt, FIXED_TIMESTEP);
    }
}
