//! Device liveness tracking.
//!
//! Maps each device identifier to the instant its most recent frame arrived.
//! Entries are never expired here; callers that care about staleness can ask
//! how long a device has been idle.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct DeviceTracker {
    last_active: HashMap<String, Instant>,
}

impl DeviceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a frame from `device_id` at `now`.
    ///
    /// Returns `true` the first time a device is seen. The last-seen instant is
    /// overwritten unconditionally.
    pub fn record_activity(&mut self, device_id: &str, now: Instant) -> bool {
        let first_contact = !self.last_active.contains_key(device_id);
        if first_contact {
            log::info!("device started sending data: {}", device_id);
        }
        self.last_active.insert(device_id.to_string(), now);
        first_contact
    }

    pub fn last_seen(&self, device_id: &str) -> Option<Instant> {
        self.last_active.get(device_id).copied()
    }

    /// Time since the device last sent a frame, measured against `now`.
    pub fn idle_for(&self, device_id: &str, now: Instant) -> Option<Duration> {
        self.last_seen(device_id)
            .map(|seen| now.saturating_duration_since(seen))
    }

    /// Devices that have been silent for longer than `threshold`.
    pub fn stale_devices(&self, now: Instant, threshold: Duration) -> Vec<String> {
        let mut stale: Vec<String> = self
            .last_active
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) > threshold)
            .map(|(id, _)| id.clone())
            .collect();
        stale.sort();
        stale
    }

    pub fn len(&self) -> usize {
        self.last_active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_active.is_empty()
    }
}
