use std::collections::VecDeque;

use crate::detect::backend::Predictor;
use crate::detect::result::Detection;
use crate::frame::Frame;
use crate::remote::ServiceError;

/// Stub predictor for tests and offline runs.
///
/// Replays scripted outcomes in order; once the script runs out it keeps
/// returning the fallback detections.
pub struct StubPredictor {
    script: VecDeque<Result<Vec<Detection>, ServiceError>>,
    fallback: Vec<Detection>,
    calls: u64,
}

impl StubPredictor {
    pub fn new() -> Self {
        Self::always(Vec::new())
    }

    /// Return the same detections for every frame.
    pub fn always(detections: Vec<Detection>) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: detections,
            calls: 0,
        }
    }

    /// Queue an outcome for the next unscripted call.
    pub fn then(mut self, outcome: Result<Vec<Detection>, ServiceError>) -> Self {
        self.script.push_back(outcome);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubPredictor {
    fn default() -> Self {
        Self::new()
    }
}

impl Predictor for StubPredictor {
    fn name(&self) -> &str {
        "stub"
    }

    fn predict(&mut self, _frame: &Frame) -> Result<Vec<Detection>, ServiceError> {
        self.calls += 1;
        self.script
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}
