use serde::{Deserialize, Serialize};

/// Pixel coordinate as reported by the prediction service.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// One detected object instance in a single frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub topleft: Point,
    pub bottomright: Point,
}

impl Detection {
    pub fn new(label: impl Into<String>, topleft: Point, bottomright: Point) -> Self {
        Self {
            label: label.into(),
            topleft,
            bottomright,
        }
    }
}

/// Body returned by the prediction endpoint: `{"results": [...]}`.
///
/// Extra fields (confidence, etc.) are ignored; a missing `results` list or a
/// result without `label`/`topleft`/`bottomright` fails to decode.
#[derive(Debug, Deserialize)]
pub struct PredictionResponse {
    pub results: Vec<Detection>,
}
