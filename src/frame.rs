//! Frame representation and its wire form.
//!
//! Frames travel through the pipeline as owned `RgbImage` buffers. Each stage
//! takes the buffer by value and hands it to the next, so a frame is never
//! shared between devices.
//!
//! The prediction and persistence services consume frames as nested numeric
//! arrays (`rows -> pixels -> channels`) in OpenCV's BGR channel order.
//! `FramePayload` streams that layout straight from the pixel buffer without
//! materialising the intermediate `Vec<Vec<[u8; 3]>>`.

use image::RgbImage;
use serde::ser::{SerializeSeq, Serializer};
use serde::Serialize;

/// A decoded 8-bit, 3-channel frame.
pub type Frame = RgbImage;

/// Channel depth of every frame handled by the hub.
pub const FRAME_CHANNELS: u32 = 3;

/// Borrowed view that serializes a frame as `[[[b, g, r], ...], ...]`.
#[derive(Clone, Copy)]
pub struct FramePayload<'a>(pub &'a Frame);

impl Serialize for FramePayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut rows = serializer.serialize_seq(Some(self.0.height() as usize))?;
        for y in 0..self.0.height() {
            rows.serialize_element(&Row {
                frame: self.0,
                y,
            })?;
        }
        rows.end()
    }
}

struct Row<'a> {
    frame: &'a Frame,
    y: u32,
}

impl Serialize for Row<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut pixels = serializer.serialize_seq(Some(self.frame.width() as usize))?;
        for x in 0..self.frame.width() {
            let [r, g, b] = self.frame.get_pixel(x, self.y).0;
            pixels.serialize_element(&[b, g, r])?;
        }
        pixels.end()
    }
}
