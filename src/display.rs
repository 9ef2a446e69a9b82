//! Montage sinks.
//!
//! Showing the dashboard to a person happens outside the hub. A sink receives
//! the composed pages after every frame.

use anyhow::{Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

pub trait MontageSink {
    fn show(&mut self, montages: &[RgbImage]) -> Result<()>;
}

/// Discards every page.
#[derive(Debug, Default)]
pub struct NullSink {
    shown: u64,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `show` was called.
    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl MontageSink for NullSink {
    fn show(&mut self, _montages: &[RgbImage]) -> Result<()> {
        self.shown += 1;
        Ok(())
    }
}

/// Writes page `i` to `<dir>/home_monitor_<i>.jpg`, replacing the previous
/// render of that page.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create dashboard directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn page_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("home_monitor_{}.jpg", index))
    }
}

impl MontageSink for DirectorySink {
    fn show(&mut self, montages: &[RgbImage]) -> Result<()> {
        for (i, montage) in montages.iter().enumerate() {
            let path = self.page_path(i);
            montage
                .save_with_format(&path, image::ImageFormat::Jpeg)
                .with_context(|| format!("write montage page {}", path.display()))?;
        }
        Ok(())
    }
}
