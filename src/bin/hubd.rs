//! hubd - multi-camera monitoring hub
//!
//! This daemon:
//! 1. Accepts frames from remote cameras and acknowledges each one
//! 2. Sends every frame to the prediction service
//! 3. Draws tracked objects and per-class counts onto the frame
//! 4. Persists a frame when the counts change (at most once per interval)
//! 5. Writes the latest frame of every camera into dashboard montage pages

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use camera_hub::{
    run, Annotator, CliOverrides, DirectorySink, Hub, HttpDetectionStore, HttpFrameHub,
    HttpPredictor, HubConfig, Palette,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Multi-camera monitoring hub")]
struct Args {
    /// Montage width in tiles (overrides config `montage.cols`).
    #[arg(short = 'W', long = "montage-w", alias = "montageW", env = "HUB_MONTAGE_W")]
    montage_w: Option<u32>,

    /// Montage height in tiles (overrides config `montage.rows`).
    #[arg(short = 'H', long = "montage-h", alias = "montageH", env = "HUB_MONTAGE_H")]
    montage_h: Option<u32>,

    /// Address to accept frames on (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Config file (JSON or TOML). Same as setting HUB_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if let Some(path) = &args.config {
        std::env::set_var("HUB_CONFIG", path);
    }
    let cfg = HubConfig::load(&CliOverrides {
        montage_cols: args.montage_w,
        montage_rows: args.montage_h,
        listen_addr: args.listen.clone(),
    })?;
    let grid = cfg.montage_grid()?;

    let palette = match cfg.palette.seed {
        Some(seed) => Palette::seeded(cfg.palette.size, seed)?,
        None => Palette::random(cfg.palette.size)?,
    };
    let mut annotator = Annotator::new(cfg.tracked_classes.clone(), palette);
    if let Some(path) = &cfg.font_path {
        annotator = annotator.with_font_file(path)?;
        log::info!("overlay font: {}", path.display());
    }

    let predictor = HttpPredictor::new(cfg.predict_url.clone(), cfg.request_timeout);
    let store = HttpDetectionStore::new(cfg.detections_url.clone(), cfg.request_timeout);
    let mut hub = Hub::new(
        predictor,
        store,
        annotator,
        cfg.change_interval,
        grid,
        Instant::now(),
    );

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .expect("error setting Ctrl-C handler");

    let mut transport = HttpFrameHub::bind(&cfg.listen_addr, stop.clone())?;
    let mut sink = DirectorySink::new(&cfg.output_dir)?;

    log::info!("detecting: {}...", cfg.tracked_classes.join(", "));
    log::info!(
        "hubd listening on {}; montage {}x{}; dashboard pages in {}",
        transport.local_addr(),
        grid.cols,
        grid.rows,
        sink.dir().display()
    );
    log::info!(
        "predict={} detections={} change_interval={:.1}s",
        cfg.predict_url,
        cfg.detections_url,
        cfg.change_interval.as_secs_f64()
    );

    let stats = run(&mut hub, &mut transport, &mut sink, &stop)?;
    log::info!(
        "shutdown: frames={} devices={} persisted={} prediction_failures={} persistence_failures={}",
        stats.frames,
        stats.devices,
        stats.persisted,
        stats.prediction_failures,
        stats.persistence_failures
    );
    Ok(())
}
