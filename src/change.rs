//! Change detection gate.
//!
//! Decides, at most once per interval, whether the object counts have moved
//! away from the last persisted baseline. Changes that come and go between two
//! checks are never seen; only the counts at each check instant matter.
//!
//! The baseline advances as soon as a change is reported, before the caller
//! knows whether persisting it succeeded. A failed save is therefore not
//! retried on the next check.

use std::time::{Duration, Instant};

use crate::annotate::ObjectCounts;

pub const DEFAULT_CHANGE_INTERVAL: Duration = Duration::from_secs(5);

/// What the gate decided for one frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChangeDecision {
    /// The interval has not elapsed since the last check.
    Waiting,
    /// A check ran and the counts equal the baseline.
    Unchanged,
    /// A check ran and the counts differ; persist a frame listing these classes.
    Changed { detected: Vec<String> },
}

#[derive(Debug)]
pub struct ChangeDetector {
    interval: Duration,
    last_check: Instant,
    baseline: ObjectCounts,
}

impl ChangeDetector {
    /// `started` is the reference point for the first check.
    pub fn new(interval: Duration, baseline: ObjectCounts, started: Instant) -> Self {
        Self {
            interval,
            last_check: started,
            baseline,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn baseline(&self) -> &ObjectCounts {
        &self.baseline
    }

    pub fn last_check(&self) -> Instant {
        self.last_check
    }

    /// Feed the counts of the current frame.
    ///
    /// A check happens only when strictly more than `interval` has passed since
    /// the previous one.
    pub fn evaluate(&mut self, now: Instant, current: &ObjectCounts) -> ChangeDecision {
        if now.saturating_duration_since(self.last_check) <= self.interval {
            return ChangeDecision::Waiting;
        }
        self.last_check = now;

        if *current == self.baseline {
            return ChangeDecision::Unchanged;
        }

        self.baseline = current.clone();
        ChangeDecision::Changed {
            detected: current.detected(),
        }
    }
}
