//! Deterministic schedule of clock edges for two unrelated clocks.
//!
//! Both clocks run on a shared abstract timeline. The fast clock has a fixed
//! period; the slow clock has a base period plus an optional per-cycle jitter
//! drawn from a seeded generator, so any ratio (including non-integer and
//! drifting ones) can be replayed exactly.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::config::ClockConfig;

/// Which clocks have an edge at the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Fast,
    Slow,
    /// Coincident edges. The fast domain is stepped first.
    Both,
}

impl Edge {
    pub fn fast(self) -> bool {
        matches!(self, Edge::Fast | Edge::Both)
    }

    pub fn slow(self) -> bool {
        matches!(self, Edge::Slow | Edge::Both)
    }
}

pub struct ClockSchedule {
    fast_period: u64,
    slow_period: u64,
    jitter: u64,
    rng: SmallRng,
    next_fast: u64,
    next_slow: u64,
    now: u64,
}

impl ClockSchedule {
    /// Callers validate the config; a zero period is treated as one.
    pub fn new(config: &ClockConfig) -> Self {
        Self {
            fast_period: config.fast_period.max(1),
            slow_period: config.slow_period.max(1),
            jitter: config.jitter,
            rng: SmallRng::seed_from_u64(config.seed),
            next_fast: 0,
            next_slow: config.slow_phase,
            now: 0,
        }
    }

    /// Jitter-free schedule with the given periods.
    pub fn ratio(fast_period: u64, slow_period: u64) -> Self {
        Self::new(&ClockConfig::ratio(fast_period, slow_period))
    }

    /// Time of the most recently returned edge.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Advances to the next edge of either clock.
    pub fn next_edge(&mut self) -> Edge {
        let now = self.next_fast.min(self.next_slow);
        self.now = now;

        let fast = self.next_fast == now;
        let slow = self.next_slow == now;
        if fast {
            self.next_fast += self.fast_period;
        }
        if slow {
            let stretch = if self.jitter > 0 {
                self.rng.random_range(0..=self.jitter)
            } else {
                0
            };
            self.next_slow += self.slow_period + stretch;
        }

        match (fast, slow) {
            (true, true) => Edge::Both,
            (true, false) => Edge::Fast,
            _ => Edge::Slow,
        }
    }
}

impl Iterator for ClockSchedule {
    type Item = Edge;

    fn next(&mut self) -> Option<Edge> {
        Some(self.next_edge())
    }
}
