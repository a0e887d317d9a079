// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/
//
// Copyright 2026 Oxide Computer Company

//! Single-shot deadline timers, serviced from the owning event loop.

use common::ticks::{time_after_eq, time_before, Tick};

#[derive(Debug)]
pub(crate) struct Timer {
    expires: Tick,
    pending: bool,
}

impl Timer {
    pub fn new() -> Self {
        Timer {
            expires: 0,
            pending: false,
        }
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn expires(&self) -> Tick {
        self.expires
    }

    /// Arm (or move) the timer to fire at `at`.
    pub fn arm(&mut self, at: Tick) {
        self.expires = at;
        self.pending = true;
    }

    /// Arm the timer at `at` unless it is already pending with an earlier
    /// deadline.
    pub fn arm_no_later_than(&mut self, at: Tick) {
        if !self.pending || time_before(at, self.expires) {
            self.arm(at);
        }
    }

    pub fn disarm(&mut self) {
        self.pending = false;
    }

    /// Consume a due firing: returns true at most once per arming, when
    /// the deadline has been reached.
    pub fn fire_due(&mut self, now: Tick) -> bool {
        if self.pending && time_after_eq(now, self.expires) {
            self.pending = false;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Timer;

    #[test]
    fn test_single_shot() {
        let mut timer = Timer::new();
        assert!(!timer.pending());
        assert!(!timer.fire_due(100));

        timer.arm(50);
        assert!(timer.pending());
        assert!(!timer.fire_due(49));
        assert!(timer.fire_due(50));
        // One firing per arming.
        assert!(!timer.fire_due(51));
    }

    #[test]
    fn test_arm_no_later_than() {
        let mut timer = Timer::new();
        timer.arm_no_later_than(100);
        assert_eq!(timer.expires(), 100);

        // An earlier deadline moves the timer up.
        timer.arm_no_later_than(60);
        assert_eq!(timer.expires(), 60);

        // A later one does not push it back.
        timer.arm_no_later_than(80);
        assert_eq!(timer.expires(), 60);

        timer.disarm();
        timer.arm_no_later_than(200);
        assert_eq!(timer.expires(), 200);
        assert!(timer.pending());
    }
}
