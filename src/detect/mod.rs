//! Detection client.
//!
//! A `Predictor` turns a frame into labeled boxes. The production backend
//! posts frames to a remote prediction service; the stub backend replays
//! canned results for tests and offline runs.

mod backend;
mod backends;
mod result;

pub use backend::Predictor;
pub use backends::{HttpPredictor, StubPredictor};
pub use result::{Detection, Point, PredictionResponse};
