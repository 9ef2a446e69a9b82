//! Detection event persistence.
//!
//! The hub does not store anything itself. When the change gate fires, the
//! frame and the list of detected classes are handed to a `DetectionStore`.
//! The remote store is fire-and-forget: its response body is ignored.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

use crate::frame::{Frame, FramePayload};
use crate::remote::{RemoteEndpoint, ServiceError};

pub trait DetectionStore {
    /// Store name used in logs.
    fn name(&self) -> &str;

    /// Persist `frame` as evidence that `detected` classes are in view.
    fn save(&mut self, frame: &Frame, detected: &[String]) -> Result<(), ServiceError>;
}

#[derive(Serialize)]
struct SaveDetectionsRequest<'a> {
    frame: FramePayload<'a>,
    obj_detected: &'a [String],
}

/// Store backed by the remote detections API.
pub struct HttpDetectionStore {
    endpoint: RemoteEndpoint,
}

impl HttpDetectionStore {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            endpoint: RemoteEndpoint::new(url, timeout),
        }
    }

    pub fn url(&self) -> &str {
        self.endpoint.url()
    }
}

impl DetectionStore for HttpDetectionStore {
    fn name(&self) -> &str {
        self.endpoint.url()
    }

    fn save(&mut self, frame: &Frame, detected: &[String]) -> Result<(), ServiceError> {
        self.endpoint.post_json_discard(&SaveDetectionsRequest {
            frame: FramePayload(frame),
            obj_detected: detected,
        })
    }
}

/// A persisted detection event held in memory.
#[derive(Clone, Debug)]
pub struct StoredDetection {
    pub frame: Frame,
    pub detected: Vec<String>,
}

/// In-memory store for tests and dry runs. Failures can be queued to exercise
/// the best-effort path; failed saves are not recorded.
#[derive(Debug, Default)]
pub struct InMemoryDetectionStore {
    events: Vec<StoredDetection>,
    failures: VecDeque<ServiceError>,
    attempts: u64,
}

impl InMemoryDetectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next save fail with `err`.
    pub fn fail_next(&mut self, err: ServiceError) {
        self.failures.push_back(err);
    }

    pub fn events(&self) -> &[StoredDetection] {
        &self.events
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl DetectionStore for InMemoryDetectionStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn save(&mut self, frame: &Frame, detected: &[String]) -> Result<(), ServiceError> {
        self.attempts += 1;
        if let Some(err) = self.failures.pop_front() {
            return Err(err);
        }
        self.events.push(StoredDetection {
            frame: frame.clone(),
            detected: detected.to_vec(),
        });
        Ok(())
    }
}
