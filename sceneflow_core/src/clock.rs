// Copyright 2026 the Sceneflow Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host-controlled scene clock.
//!
//! [`SceneClock`] maintains an affine mapping from host time to scene time:
//!
//! ```text
//! scene_time = rate * host_time + offset
//! ```
//!
//! Pause, seek and speed changes rewrite `rate` and `offset` so that scene
//! time stays continuous at the host time where the change happens.

use crate::host::TimeSource;

/// Scene clock with pause / seek / speed control.
///
/// The host feeds host time through [`set_host_time`](Self::set_host_time).
/// Share the clock with a graph as `Rc<RefCell<SceneClock>>`, which
/// implements [`TimeSource`].
#[derive(Clone, Debug)]
pub struct SceneClock {
    rate: f64,
    offset: f64,
    host_now: f64,
    /// Scene time held while paused.
    paused_at: Option<f64>,
}

impl Default for SceneClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneClock {
    /// A running clock with scene time equal to host time.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            rate: 1.0,
            offset: 0.0,
            host_now: 0.0,
            paused_at: None,
        }
    }

    /// Scene time at the given host time (ignores pause).
    #[must_use]
    pub fn scene_time_at(&self, host: f64) -> f64 {
        self.rate * host + self.offset
    }

    /// Current scene time.
    #[must_use]
    pub fn now(&self) -> f64 {
        self.paused_at
            .unwrap_or_else(|| self.scene_time_at(self.host_now))
    }

    /// Advances the host clock.
    pub fn set_host_time(&mut self, host: f64) {
        self.host_now = host;
    }

    /// Current playback rate.
    #[must_use]
    pub const fn rate(&self) -> f64 {
        self.rate
    }

    /// Whether the clock is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Freezes scene time at its current value.
    pub fn pause(&mut self) {
        if self.paused_at.is_none() {
            self.paused_at = Some(self.now());
        }
    }

    /// Resumes from the paused scene time.
    pub fn resume(&mut self) {
        if let Some(held) = self.paused_at.take() {
            self.offset = held - self.rate * self.host_now;
        }
    }

    /// Jumps to `scene_time`. A paused clock stays paused at the new time.
    pub fn seek(&mut self, scene_time: f64) {
        if self.paused_at.is_some() {
            self.paused_at = Some(scene_time);
        }
        self.offset = scene_time - self.rate * self.host_now;
    }

    /// Changes the playback rate, keeping scene time continuous.
    pub fn set_rate(&mut self, rate: f64) {
        let now = self.scene_time_at(self.host_now);
        self.rate = rate;
        self.offset = now - rate * self.host_now;
    }
}

impl TimeSource for SceneClock {
    fn scene_time(&self) -> f64 {
        self.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn tracks_host_time_by_default() {
        let mut clock = SceneClock::new();
        clock.set_host_time(2.5);
        assert!(close(clock.now(), 2.5));
    }

    #[test]
    fn pause_holds_and_resume_continues() {
        let mut clock = SceneClock::new();
        clock.set_host_time(1.0);
        clock.pause();
        clock.set_host_time(5.0);
        assert!(close(clock.now(), 1.0), "paused at 1.0");
        clock.resume();
        clock.set_host_time(6.0);
        assert!(close(clock.now(), 2.0), "resumed without a jump");
    }

    #[test]
    fn seek_and_rate_are_continuous() {
        let mut clock = SceneClock::new();
        clock.set_host_time(10.0);
        clock.seek(3.0);
        assert!(close(clock.now(), 3.0));
        clock.set_rate(2.0);
        assert!(close(clock.now(), 3.0), "rate change keeps scene time");
        clock.set_host_time(11.0);
        assert!(close(clock.now(), 5.0), "two scene seconds per host second");
    }

    #[test]
    fn seek_while_paused_stays_paused() {
        let mut clock = SceneClock::new();
        clock.set_host_time(1.0);
        clock.pause();
        clock.seek(7.0);
        clock.set_host_time(3.0);
        assert!(close(clock.now(), 7.0));
        assert!(clock.is_paused());
    }
}
