use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::annotate::DEFAULT_PALETTE_SIZE;
use crate::change::DEFAULT_CHANGE_INTERVAL;
use crate::montage::{MontageGrid, MAX_GRID_SIDE, MAX_MONTAGE_SIDE};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:5555";
const DEFAULT_PREDICT_URL: &str = "http://localhost:8000/api/predict";
const DEFAULT_DETECTIONS_URL: &str = "http://localhost:8000/api/detections";
const DEFAULT_TRACKED_CLASSES: [&str; 7] =
    ["dog", "person", "car", "cat", "bird", "bicycle", "motorbike"];
const DEFAULT_OUTPUT_DIR: &str = "dashboard";

#[derive(Debug, Deserialize, Default)]
struct HubConfigFile {
    listen_addr: Option<String>,
    predict_url: Option<String>,
    detections_url: Option<String>,
    tracked_classes: Option<Vec<String>>,
    change_interval_secs: Option<f64>,
    request_timeout_secs: Option<f64>,
    font_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    palette: Option<PaletteConfigFile>,
    montage: Option<MontageConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PaletteConfigFile {
    size: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MontageConfigFile {
    cols: Option<u32>,
    rows: Option<u32>,
    tile_width: Option<u32>,
    tile_height: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub listen_addr: String,
    pub predict_url: String,
    pub detections_url: String,
    pub tracked_classes: Vec<String>,
    pub change_interval: Duration,
    pub request_timeout: Option<Duration>,
    pub font_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub palette: PaletteSettings,
    pub montage: MontageSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaletteSettings {
    pub size: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MontageSettings {
    pub cols: Option<u32>,
    pub rows: Option<u32>,
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
}

/// Values given on the command line. They win over file and environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub montage_cols: Option<u32>,
    pub montage_rows: Option<u32>,
    pub listen_addr: Option<String>,
}

impl HubConfig {
    /// Load from `HUB_CONFIG` (JSON, or TOML for `.toml` files), then
    /// environment, then `cli`, and validate the result.
    pub fn load(cli: &CliOverrides) -> Result<Self> {
        let config_path = std::env::var("HUB_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.apply_cli(cli);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: HubConfigFile) -> Result<Self> {
        let palette = file.palette.unwrap_or_default();
        let montage = file.montage.unwrap_or_default();
        let change_interval = match file.change_interval_secs {
            Some(secs) => secs_to_duration("change_interval_secs", secs)?,
            None => DEFAULT_CHANGE_INTERVAL,
        };
        let request_timeout = file
            .request_timeout_secs
            .map(|secs| secs_to_duration("request_timeout_secs", secs))
            .transpose()?;
        Ok(Self {
            listen_addr: file
                .listen_addr
                .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string()),
            predict_url: file
                .predict_url
                .unwrap_or_else(|| DEFAULT_PREDICT_URL.to_string()),
            detections_url: file
                .detections_url
                .unwrap_or_else(|| DEFAULT_DETECTIONS_URL.to_string()),
            tracked_classes: file.tracked_classes.unwrap_or_else(|| {
                DEFAULT_TRACKED_CLASSES
                    .iter()
                    .map(|c| c.to_string())
                    .collect()
            }),
            change_interval,
            request_timeout,
            font_path: file.font_path,
            output_dir: file
                .output_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            palette: PaletteSettings {
                size: palette.size.unwrap_or(DEFAULT_PALETTE_SIZE),
                seed: palette.seed,
            },
            montage: MontageSettings {
                cols: montage.cols,
                rows: montage.rows,
                tile_width: montage.tile_width,
                tile_height: montage.tile_height,
            },
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var("HUB_LISTEN_ADDR") {
            if !addr.trim().is_empty() {
                self.listen_addr = addr;
            }
        }
        if let Ok(url) = std::env::var("HUB_PREDICT_URL") {
            if !url.trim().is_empty() {
                self.predict_url = url;
            }
        }
        if let Ok(url) = std::env::var("HUB_DETECTIONS_URL") {
            if !url.trim().is_empty() {
                self.detections_url = url;
            }
        }
        if let Ok(classes) = std::env::var("HUB_TRACKED_CLASSES") {
            let parsed = split_csv(&classes);
            if !parsed.is_empty() {
                self.tracked_classes = parsed;
            }
        }
        if let Ok(interval) = std::env::var("HUB_CHANGE_INTERVAL_SECS") {
            self.change_interval = parse_secs("HUB_CHANGE_INTERVAL_SECS", &interval)?;
        }
        if let Ok(timeout) = std::env::var("HUB_REQUEST_TIMEOUT_SECS") {
            self.request_timeout = Some(parse_secs("HUB_REQUEST_TIMEOUT_SECS", &timeout)?);
        }
        if let Ok(seed) = std::env::var("HUB_PALETTE_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("HUB_PALETTE_SEED must be an unsigned integer"))?;
            self.palette.seed = Some(seed);
        }
        if let Ok(path) = std::env::var("HUB_FONT_PATH") {
            if !path.trim().is_empty() {
                self.font_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(dir) = std::env::var("HUB_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
        Ok(())
    }

    fn apply_cli(&mut self, cli: &CliOverrides) {
        if let Some(cols) = cli.montage_cols {
            self.montage.cols = Some(cols);
        }
        if let Some(rows) = cli.montage_rows {
            self.montage.rows = Some(rows);
        }
        if let Some(addr) = &cli.listen_addr {
            self.listen_addr = addr.clone();
        }
    }

    fn validate(&mut self) -> Result<()> {
        self.montage_grid()?;

        for url in [&self.predict_url, &self.detections_url] {
            let parsed =
                url::Url::parse(url).map_err(|e| anyhow!("invalid service url {}: {}", url, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(anyhow!("service url {} must use http or https", url));
            }
        }

        self.tracked_classes = self
            .tracked_classes
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        self.tracked_classes.sort();
        self.tracked_classes.dedup();
        if self.tracked_classes.is_empty() {
            return Err(anyhow!("tracked_classes must name at least one class"));
        }

        if self.change_interval.is_zero() {
            return Err(anyhow!("change interval must be greater than zero"));
        }
        if self.palette.size == 0 {
            return Err(anyhow!("palette size must be at least 1"));
        }
        Ok(())
    }

    /// Grid dimensions are required; tile size is optional but all-or-nothing.
    pub fn montage_grid(&self) -> Result<MontageGrid> {
        let cols = self
            .montage
            .cols
            .ok_or_else(|| anyhow!("montage width (grid columns) is required"))?;
        let rows = self
            .montage
            .rows
            .ok_or_else(|| anyhow!("montage height (grid rows) is required"))?;
        if cols == 0 || rows == 0 {
            return Err(anyhow!("montage grid must be at least 1x1, got {}x{}", cols, rows));
        }
        if cols > MAX_GRID_SIDE || rows > MAX_GRID_SIDE {
            return Err(anyhow!(
                "montage grid {}x{} exceeds {} tiles per side",
                cols,
                rows,
                MAX_GRID_SIDE
            ));
        }
        let tile_size = match (self.montage.tile_width, self.montage.tile_height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            (None, None) => None,
            _ => {
                return Err(anyhow!(
                    "montage tile_width and tile_height must both be set and positive"
                ))
            }
        };
        let grid = MontageGrid {
            cols,
            rows,
            tile_size,
        };
        if let Some(size) = tile_size {
            if grid.layout_for(size).canvas_size().is_none() {
                return Err(anyhow!(
                    "montage of {}x{} tiles at {}x{} exceeds {} pixels per side",
                    cols,
                    rows,
                    size.0,
                    size.1,
                    MAX_MONTAGE_SIDE
                ));
            }
        }
        Ok(grid)
    }
}

fn read_config_file(path: &Path) -> Result<HubConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn parse_secs(var: &str, value: &str) -> Result<Duration> {
    let secs: f64 = value
        .trim()
        .parse()
        .map_err(|_| anyhow!("{} must be a number of seconds", var))?;
    secs_to_duration(var, secs)
}

fn secs_to_duration(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(anyhow!("{} must be greater than zero, got {}", name, secs));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| anyhow!("{} out of range: {}", name, e))
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> HubConfig {
        let mut cfg = HubConfig::from_file(HubConfigFile::default()).unwrap();
        cfg.montage.cols = Some(2);
        cfg.montage.rows = Some(2);
        cfg
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let mut cfg = base();
        cfg.validate().unwrap();
        assert_eq!(cfg.listen_addr, "0.0.0.0:5555");
        assert_eq!(cfg.change_interval, Duration::from_secs(5));
        assert_eq!(cfg.palette.size, 5);
        assert_eq!(cfg.tracked_classes.len(), 7);
        assert!(cfg.request_timeout.is_none());
    }

    #[test]
    fn missing_grid_is_fatal() {
        let mut cfg = HubConfig::from_file(HubConfigFile::default()).unwrap();
        assert!(cfg.validate().is_err());
        cfg.montage.cols = Some(3);
        cfg.montage.rows = Some(0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_tile_size_is_rejected() {
        let mut cfg = base();
        cfg.montage.tile_width = Some(320);
        assert!(cfg.validate().is_err());
        cfg.montage.tile_height = Some(240);
        assert_eq!(cfg.montage_grid().unwrap().tile_size, Some((320, 240)));
    }

    #[test]
    fn oversize_grid_is_rejected() {
        let mut cfg = base();
        cfg.montage.cols = Some(u32::MAX);
        cfg.montage.rows = Some(u32::MAX);
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.montage.cols = Some(MAX_GRID_SIDE);
        cfg.montage.tile_width = Some(u32::MAX / 2);
        cfg.montage.tile_height = Some(240);
        assert!(cfg.montage_grid().is_err());

        cfg.montage.tile_width = Some(MAX_MONTAGE_SIDE / MAX_GRID_SIDE);
        assert!(cfg.montage_grid().is_ok());
    }

    #[test]
    fn bad_values_are_rejected() {
        let mut cfg = base();
        cfg.palette.size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.tracked_classes = vec![" ".to_string()];
        assert!(cfg.validate().is_err());

        let mut cfg = base();
        cfg.predict_url = "ftp://example.com/predict".to_string();
        assert!(cfg.validate().is_err());

        assert!(parse_secs("X", "0").is_err());
        assert!(parse_secs("X", "abc").is_err());
        assert_eq!(parse_secs("X", "2.5").unwrap(), Duration::from_millis(2500));
        assert!(parse_secs("X", "1e300").is_err());
    }

    #[test]
    fn non_positive_file_durations_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.json");
        for body in [
            r#"{"change_interval_secs": -3, "montage": {"cols": 1, "rows": 1}}"#,
            r#"{"change_interval_secs": 0, "montage": {"cols": 1, "rows": 1}}"#,
            r#"{"request_timeout_secs": 0, "montage": {"cols": 1, "rows": 1}}"#,
            r#"{"request_timeout_secs": -0.5, "montage": {"cols": 1, "rows": 1}}"#,
        ] {
            std::fs::write(&path, body).unwrap();
            let err = HubConfig::from_file(read_config_file(&path).unwrap()).unwrap_err();
            assert!(err.to_string().contains("greater than zero"), "{}: {}", body, err);
        }

        std::fs::write(&path, r#"{"change_interval_secs": 0.5, "request_timeout_secs": 3}"#)
            .unwrap();
        let cfg = HubConfig::from_file(read_config_file(&path).unwrap()).unwrap();
        assert_eq!(cfg.change_interval, Duration::from_millis(500));
        assert_eq!(cfg.request_timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn toml_files_are_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hub.toml");
        std::fs::write(
            &path,
            "tracked_classes = [\"cat\"]\n[montage]\ncols = 1\nrows = 3\n",
        )
        .unwrap();

        let cfg = HubConfig::from_file(read_config_file(&path).unwrap()).unwrap();
        assert_eq!(cfg.tracked_classes, vec!["cat".to_string()]);
        assert_eq!(cfg.montage.rows, Some(3));
    }
}
