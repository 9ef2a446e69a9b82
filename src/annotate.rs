//! Frame annotation.
//!
//! Draws bounding boxes and labels for tracked classes, tallies per-class
//! counts for the frame, and stamps the status and device overlays.
//!
//! Text uses the bundled DejaVu Sans Mono unless another font file is loaded.

use ab_glyph::{FontArc, PxScale};
use anyhow::{anyhow, Context, Result};
use image::Rgb;
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

use crate::detect::{Detection, Point};
use crate::frame::Frame;

pub const DEFAULT_PALETTE_SIZE: usize = 5;
pub const BOX_STROKE: u32 = 2;
/// Vertical distance between a box's top edge and its label.
pub const LABEL_OFFSET: i32 = 15;

const LABEL_SCALE: f32 = 16.0;
const OVERLAY_SCALE: f32 = 12.0;
const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const STATUS_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const DEVICE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/font/DejaVuSansMono.ttf");

// ----------------------------------------------------------------------------
// Palette
// ----------------------------------------------------------------------------

/// Fixed, ordered box colors. The Nth detection drawn in a frame gets
/// `colors[N % len]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Rgb<u8>>,
}

impl Palette {
    pub fn new(colors: Vec<Rgb<u8>>) -> Result<Self> {
        if colors.is_empty() {
            return Err(anyhow!("palette must contain at least one color"));
        }
        Ok(Self { colors })
    }

    /// Random colors drawn from a seeded generator. Same seed, same palette.
    pub fn seeded(size: usize, seed: u64) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        Self::new((0..size).map(|_| Rgb(rng.gen::<[u8; 3]>())).collect())
    }

    /// Random colors from OS entropy.
    pub fn random(size: usize) -> Result<Self> {
        Self::seeded(size, rand::thread_rng().gen())
    }

    pub fn color_for(&self, index: usize) -> Rgb<u8> {
        self.colors[index % self.colors.len()]
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}

// ----------------------------------------------------------------------------
// ObjectCounts
// ----------------------------------------------------------------------------

/// Per-class object counts for one frame. Every tracked class is present,
/// starting at zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectCounts {
    counts: BTreeMap<String, u32>,
}

impl ObjectCounts {
    pub fn zeroed<'a>(classes: impl IntoIterator<Item = &'a String>) -> Self {
        Self {
            counts: classes.into_iter().map(|c| (c.clone(), 0)).collect(),
        }
    }

    /// Bump `label` if it is tracked. Returns whether it was counted.
    pub fn increment(&mut self, label: &str) -> bool {
        match self.counts.get_mut(label) {
            Some(count) => {
                *count += 1;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, label: &str) -> Option<u32> {
        self.counts.get(label).copied()
    }

    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    /// Classes with a non-zero count.
    pub fn detected(&self) -> Vec<String> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(label, _)| label.clone())
            .collect()
    }

    /// `"label: count"` pairs, comma-joined.
    pub fn status_line(&self) -> String {
        self.counts
            .iter()
            .map(|(label, count)| format!("{}: {}", label, count))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts.iter().map(|(label, count)| (label.as_str(), *count))
    }
}

// ----------------------------------------------------------------------------
// Annotator
// ----------------------------------------------------------------------------

pub struct Annotator {
    tracked: BTreeSet<String>,
    palette: Palette,
    font: FontArc,
}

impl Annotator {
    pub fn new(tracked: impl IntoIterator<Item = String>, palette: Palette) -> Self {
        Self {
            tracked: tracked.into_iter().collect(),
            palette,
            font: bundled_font(),
        }
    }

    /// Replace the bundled font with a TTF/OTF file.
    pub fn with_font_file(mut self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("read font file {}", path.display()))?;
        self.font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font file {}: {}", path.display(), e))?;
        Ok(self)
    }

    pub fn tracked(&self) -> &BTreeSet<String> {
        &self.tracked
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn zero_counts(&self) -> ObjectCounts {
        ObjectCounts::zeroed(&self.tracked)
    }

    /// Annotate `frame` with `detections` from `device_id`.
    ///
    /// Detections keep their arrival index for color selection even when they
    /// are skipped, so a tracked object's color does not depend on which
    /// untracked objects precede it. Boxes are clipped to the frame; a box
    /// entirely outside it is counted but not drawn.
    pub fn annotate(
        &self,
        mut frame: Frame,
        detections: &[Detection],
        device_id: &str,
    ) -> (Frame, ObjectCounts) {
        let mut counts = self.zero_counts();

        for (index, detection) in detections.iter().enumerate() {
            if !counts.increment(&detection.label) {
                continue;
            }
            let color = self.palette.color_for(index);
            if !draw_box(&mut frame, detection.topleft, detection.bottomright, color) {
                continue;
            }
            let (x, y) = label_origin(clamp_to_frame(&frame, detection.topleft));
            draw_text_mut(
                &mut frame,
                LABEL_COLOR,
                x,
                y,
                PxScale::from(LABEL_SCALE),
                &self.font,
                &detection.label,
            );
        }

        let status_y = frame.height() as i32 - LABEL_OFFSET - OVERLAY_SCALE as i32;
        draw_text_mut(
            &mut frame,
            STATUS_COLOR,
            10,
            status_y,
            PxScale::from(OVERLAY_SCALE),
            &self.font,
            &counts.status_line(),
        );
        draw_text_mut(
            &mut frame,
            DEVICE_COLOR,
            5,
            4,
            PxScale::from(OVERLAY_SCALE),
            &self.font,
            device_id,
        );

        (frame, counts)
    }
}

fn bundled_font() -> FontArc {
    static FONT: OnceLock<FontArc> = OnceLock::new();
    FONT.get_or_init(|| {
        FontArc::try_from_slice(BUNDLED_FONT).expect("bundled font is a valid TTF")
    })
    .clone()
}

/// Where a box's label goes: above the box, or below its top edge when above
/// would leave the frame.
pub fn label_origin(topleft: Point) -> (i32, i32) {
    let y = match topleft.y.checked_sub(LABEL_OFFSET) {
        Some(y) if y >= 0 => y,
        _ => topleft.y.saturating_add(LABEL_OFFSET),
    };
    (topleft.x, y)
}

fn clamp_to_frame(frame: &Frame, point: Point) -> Point {
    let max_x = frame.width().saturating_sub(1).min(i32::MAX as u32) as i32;
    let max_y = frame.height().saturating_sub(1).min(i32::MAX as u32) as i32;
    Point::new(point.x.clamp(0, max_x), point.y.clamp(0, max_y))
}

/// Draw the box clipped to the frame. Returns false when nothing of it is
/// inside the frame.
fn draw_box(frame: &mut Frame, topleft: Point, bottomright: Point, color: Rgb<u8>) -> bool {
    let (width, height) = (i64::from(frame.width()), i64::from(frame.height()));
    let (x0, x1) = min_max(topleft.x, bottomright.x);
    let (y0, y1) = min_max(topleft.y, bottomright.y);
    if width == 0 || height == 0 || x1 < 0 || y1 < 0 || x0 >= width || y0 >= height {
        return false;
    }

    let left = x0.max(0);
    let top = y0.max(0);
    let box_width = (x1.min(width - 1) - left + 1) as u32;
    let box_height = (y1.min(height - 1) - top + 1) as u32;

    for inset in 0..BOX_STROKE {
        let shrink = inset * 2;
        if box_width <= shrink || box_height <= shrink {
            break;
        }
        let rect = Rect::at((left + i64::from(inset)) as i32, (top + i64::from(inset)) as i32)
            .of_size(box_width - shrink, box_height - shrink);
        draw_hollow_rect_mut(frame, rect, color);
    }
    true
}

fn min_max(a: i32, b: i32) -> (i64, i64) {
    (i64::from(a.min(b)), i64::from(a.max(b)))
}
