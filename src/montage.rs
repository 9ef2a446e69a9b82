//! Latest-frame board and montage composition.
//!
//! `FrameBoard` keeps the most recent annotated frame for every device ever
//! seen. Entries are overwritten, never removed, so a silent camera keeps its
//! last picture on the dashboard. `build_montages` tiles those frames into one
//! or more fixed-size grid pages.

use image::imageops::{self, FilterType};
use image::RgbImage;
use std::collections::BTreeMap;

use crate::frame::Frame;

/// Most tiles along one side of the grid.
pub const MAX_GRID_SIDE: u32 = 64;
/// Largest montage page, in pixels along either side.
pub const MAX_MONTAGE_SIDE: u32 = 16_384;

#[derive(Debug, Default)]
pub struct FrameBoard {
    frames: BTreeMap<String, Frame>,
}

impl FrameBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the frame for `device_id`.
    pub fn update(&mut self, device_id: &str, frame: Frame) {
        self.frames.insert(device_id.to_string(), frame);
    }

    pub fn get(&self, device_id: &str) -> Option<&Frame> {
        self.frames.get(device_id)
    }

    /// Frames in device-id order.
    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.frames.values()
    }

    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.frames.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Grid geometry for one montage page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MontageLayout {
    pub tile_width: u32,
    pub tile_height: u32,
    pub cols: u32,
    pub rows: u32,
}

impl MontageLayout {
    pub fn capacity(&self) -> usize {
        (self.cols as usize).saturating_mul(self.rows as usize)
    }

    /// Page dimensions, or `None` when a side would exceed `MAX_MONTAGE_SIDE`.
    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        let width = self.tile_width.checked_mul(self.cols)?;
        let height = self.tile_height.checked_mul(self.rows)?;
        if width > MAX_MONTAGE_SIDE || height > MAX_MONTAGE_SIDE {
            return None;
        }
        Some((width, height))
    }
}

/// Configured grid. Without a fixed tile size, tiles take the dimensions of
/// the frame that triggered the render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MontageGrid {
    pub cols: u32,
    pub rows: u32,
    pub tile_size: Option<(u32, u32)>,
}

impl MontageGrid {
    pub fn layout_for(&self, frame_dims: (u32, u32)) -> MontageLayout {
        let (tile_width, tile_height) = self.tile_size.unwrap_or(frame_dims);
        MontageLayout {
            tile_width,
            tile_height,
            cols: self.cols,
            rows: self.rows,
        }
    }
}

/// Tile `frames` row-major into pages of `cols x rows` tiles, each frame
/// resized to the tile size. A page is filled before the next one starts;
/// unused tiles on the last page stay black. No frames, no pages.
pub fn build_montages<'a>(
    frames: impl IntoIterator<Item = &'a Frame>,
    layout: MontageLayout,
) -> Vec<RgbImage> {
    let capacity = layout.capacity();
    if capacity == 0 || layout.tile_width == 0 || layout.tile_height == 0 {
        return Vec::new();
    }
    let Some((canvas_width, canvas_height)) = layout.canvas_size() else {
        log::warn!(
            "montage of {}x{} tiles at {}x{} exceeds {} pixels per side; skipping render",
            layout.cols,
            layout.rows,
            layout.tile_width,
            layout.tile_height,
            MAX_MONTAGE_SIDE
        );
        return Vec::new();
    };

    let mut pages = Vec::new();
    let mut page: Option<RgbImage> = None;
    for (i, frame) in frames.into_iter().enumerate() {
        let slot = i % capacity;
        if slot == 0 {
            if let Some(done) = page.take() {
                pages.push(done);
            }
        }
        let canvas = page.get_or_insert_with(|| RgbImage::new(canvas_width, canvas_height));

        let col = slot as u32 % layout.cols;
        let row = slot as u32 / layout.cols;
        let x = (col * layout.tile_width) as i64;
        let y = (row * layout.tile_height) as i64;
        if frame.dimensions() == (layout.tile_width, layout.tile_height) {
            imageops::replace(canvas, frame, x, y);
        } else {
            let tile = imageops::resize(
                frame,
                layout.tile_width,
                layout.tile_height,
                FilterType::Triangle,
            );
            imageops::replace(canvas, &tile, x, y);
        }
    }
    if let Some(done) = page {
        pages.push(done);
    }
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn solid(w: u32, h: u32, value: u8) -> Frame {
        Frame::from_pixel(w, h, Rgb([value, value, value]))
    }

    fn layout(cols: u32, rows: u32) -> MontageLayout {
        MontageLayout {
            tile_width: 4,
            tile_height: 3,
            cols,
            rows,
        }
    }

    #[test]
    fn empty_board_builds_no_pages() {
        let board = FrameBoard::new();
        assert!(build_montages(board.frames(), layout(2, 2)).is_empty());
    }

    #[test]
    fn one_over_capacity_spills_to_second_page() {
        let mut board = FrameBoard::new();
        for i in 0..5u8 {
            board.update(&format!("cam{}", i), solid(4, 3, i + 1));
        }
        let pages = build_montages(board.frames(), layout(2, 2));
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].dimensions(), (8, 6));
    }

    #[test]
    fn exact_capacity_fits_one_page() {
        let frames: Vec<Frame> = (0..4u8).map(|i| solid(4, 3, i)).collect();
        assert_eq!(build_montages(&frames, layout(2, 2)).len(), 1);
    }

    #[test]
    fn tiles_are_placed_row_major_and_resized() {
        let frames = vec![solid(4, 3, 10), solid(8, 6, 20), solid(2, 2, 30)];
        let pages = build_montages(&frames, layout(2, 2));
        assert_eq!(pages.len(), 1);

        let page = &pages[0];
        let near = |x: u32, y: u32, value: u8| page.get_pixel(x, y).0[0].abs_diff(value) <= 1;
        assert!(near(0, 0, 10));
        assert!(near(5, 1, 20));
        assert!(near(1, 4, 30));
        assert_eq!(*page.get_pixel(6, 4), Rgb([0, 0, 0]));
    }

    #[test]
    fn grid_uses_frame_size_unless_fixed() {
        let grid = MontageGrid {
            cols: 3,
            rows: 1,
            tile_size: None,
        };
        assert_eq!(grid.layout_for((640, 480)).tile_width, 640);

        let fixed = MontageGrid {
            tile_size: Some((320, 240)),
            ..grid
        };
        let layout = fixed.layout_for((640, 480));
        assert_eq!((layout.tile_width, layout.tile_height), (320, 240));
        assert_eq!(layout.capacity(), 3);
    }

    #[test]
    fn oversize_pages_are_not_rendered() {
        let huge = MontageLayout {
            tile_width: u32::MAX / 2,
            tile_height: 3,
            cols: 3,
            rows: 1,
        };
        assert_eq!(huge.canvas_size(), None);
        assert!(build_montages(&[solid(4, 3, 1)], huge).is_empty());

        let wide = MontageLayout {
            tile_width: MAX_MONTAGE_SIDE,
            tile_height: 1,
            cols: 2,
            rows: 1,
        };
        assert_eq!(wide.canvas_size(), None);

        let grid = MontageLayout {
            tile_width: 1,
            tile_height: 1,
            cols: u32::MAX,
            rows: u32::MAX,
        };
        assert!(grid.capacity() > 0);
        assert_eq!(layout(2, 2).canvas_size(), Some((8, 6)));
    }

    #[test]
    fn board_keeps_latest_frame_per_device() {
        let mut board = FrameBoard::new();
        board.update("cam1", solid(2, 2, 1));
        board.update("cam2", solid(2, 2, 2));
        board.update("cam1", solid(2, 2, 9));

        assert_eq!(board.len(), 2);
        assert_eq!(*board.get("cam1").unwrap().get_pixel(0, 0), Rgb([9, 9, 9]));
        assert_eq!(board.devices().collect::<Vec<_>>(), vec!["cam1", "cam2"]);
    }
}
