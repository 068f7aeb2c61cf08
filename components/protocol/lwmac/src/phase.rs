//  _____       ______   ____
// |_   _|     |  ____|/ ____|  Institute of Embedded Systems
//   | |  _ __ | |__  | (___    Zurich University of Applied Sciences
//   | | | '_ \|  __|  \___ \   8401 Winterthur, Switzerland
//  _| |_| | | | |____ ____) |
// |_____|_| |_|______|_____/
//
// Copyright 2025 Institute of Embedded Systems at Zurich University of Applied Sciences.
// All rights reserved.
// SPDX-License-Identifier: MIT

//! Wakeup phase arithmetic
//!
//! A phase is a tick offset within the wakeup interval. Converting a phase back to ticks
//! always yields the next occurrence of that phase at or after the given `now`. Callers read
//! the counter once per decision and pass the same `now` to every computation.

use crate::*;

/// Duty cycle timing in real-time counter ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
///
/// `interval` must not be zero, [`Timing::new`] checks it.
pub struct Timing {
    /// Length of one wakeup interval
    pub interval: Ticks,
    /// Minimum distance of a scheduled event to now
    pub margin: Ticks,
    /// How long to listen after each wakeup
    pub wakeup_duration: Ticks,
}

impl Timing {
    /// Returns `None` for a zero interval or a listen period that does not fit into it
    pub const fn new(interval: Ticks, margin: Ticks, wakeup_duration: Ticks) -> Option<Self> {
        if interval == 0 || wakeup_duration >= interval {
            return None;
        }
        Some(Self {
            interval,
            margin,
            wakeup_duration,
        })
    }

    pub const DEFAULT: Self = Self {
        interval: us_to_ticks(WAKEUP_INTERVAL_US),
        margin: us_to_ticks(RTT_EVENT_MARGIN_US),
        wakeup_duration: us_to_ticks(WAKEUP_DURATION_US),
    };

    pub fn ticks_to_phase(&self, ticks: Ticks) -> Phase {
        ticks % self.interval
    }

    /// Absolute tick of the next occurrence of `phase`
    pub fn phase_to_ticks(&self, phase: Phase, now: Ticks) -> Ticks {
        let phase_now = self.ticks_to_phase(now);

        // start of current interval
        let mut ticks = now - phase_now;

        // phase only in next interval
        if phase < phase_now {
            ticks = ticks.wrapping_add(self.interval);
        }

        ticks.wrapping_add(phase)
    }

    /// Countdown until the next occurrence of `phase`
    pub fn ticks_until_phase(&self, phase: Phase, now: Ticks) -> Ticks {
        self.phase_to_ticks(phase, now).wrapping_sub(now)
    }

    /// Next wakeup aligned to `last` that is at least `margin` ahead of `now`
    pub fn next_wakeup(&self, last: Ticks, now: Ticks) -> Ticks {
        next_inphase_event(last, self.interval, now, self.margin)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Advance `last` by whole intervals until it lies at least `margin` ticks after `now`
///
/// A `last` numerically behind `now` is always caught up. A `last` numerically ahead of `now`
/// by less than half the counter range is still in the future, one further ahead means the
/// counter wrapped since `last`. Either way the catch-up takes one step.
pub fn next_inphase_event(last: Ticks, interval: Ticks, now: Ticks, margin: Ticks) -> Ticks {
    let behind: u64 = if last <= now {
        (now - last) as u64 + margin as u64
    } else if last - now <= Ticks::MAX / 2 {
        let ahead = last - now;
        if ahead >= margin {
            return last;
        }
        (margin - ahead) as u64
    } else {
        // counter wrapped since last
        now.wrapping_sub(last) as u64 + margin as u64
    };

    if behind == 0 {
        return last;
    }

    let intervals = behind.div_ceil(interval as u64);
    last.wrapping_add((intervals * interval as u64) as Ticks)
}
