use serde::Serialize;
use std::time::Duration;

use crate::detect::backend::Predictor;
use crate::detect::result::{Detection, PredictionResponse};
use crate::frame::{Frame, FramePayload};
use crate::remote::{RemoteEndpoint, ServiceError};

#[derive(Serialize)]
struct PredictRequest<'a> {
    frame: FramePayload<'a>,
}

/// Predictor backed by the remote prediction API.
///
/// Sends `{"frame": [[[b, g, r], ...], ...]}` and expects
/// `{"results": [{"label", "topleft": {x, y}, "bottomright": {x, y}}, ...]}`.
pub struct HttpPredictor {
    endpoint: RemoteEndpoint,
}

impl HttpPredictor {
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            endpoint: RemoteEndpoint::new(url, timeout),
        }
    }

    pub fn url(&self) -> &str {
        self.endpoint.url()
    }
}

impl Predictor for HttpPredictor {
    fn name(&self) -> &str {
        self.endpoint.url()
    }

    fn predict(&mut self, frame: &Frame) -> Result<Vec<Detection>, ServiceError> {
        let response: PredictionResponse = self.endpoint.post_json(&PredictRequest {
            frame: FramePayload(frame),
        })?;
        Ok(response.results)
    }
}
