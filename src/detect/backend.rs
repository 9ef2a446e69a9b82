use crate::frame::Frame;
use crate::remote::ServiceError;

use super::result::Detection;

/// Predictor backend trait.
///
/// Each call is an independent, at-most-once attempt. Implementations report
/// failure through `ServiceError`; deciding what a failure means for the frame
/// is left to the caller.
pub trait Predictor {
    /// Backend identifier used in logs.
    fn name(&self) -> &str;

    /// Detect objects in `frame`.
    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>, ServiceError>;
}
