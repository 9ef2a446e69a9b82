//! Frame intake loop.
//!
//! Everything runs on the calling thread: receive, acknowledge, predict,
//! annotate, check for change, update the board, render. The loop is the only
//! writer of the liveness map, the count baseline and the frame board, so none
//! of them need locking. Running two loops over one `Hub` is not supported.
//!
//! Stopping is cooperative. The stop flag is read once per frame after the
//! montage has been handed to the sink; an in-flight remote call always
//! completes first.

use anyhow::Result;
use image::RgbImage;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::annotate::Annotator;
use crate::change::{ChangeDecision, ChangeDetector};
use crate::detect::Predictor;
use crate::display::MontageSink;
use crate::frame::Frame;
use crate::liveness::DeviceTracker;
use crate::montage::{build_montages, FrameBoard, MontageGrid};
use crate::storage::DetectionStore;
use crate::transport::{FrameHub, ACK_REPLY};

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// Counters reported when the loop stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub devices: usize,
    pub persisted: u64,
    pub prediction_failures: u64,
    pub persistence_failures: u64,
}

/// Per-frame pipeline state.
///
/// Object counts and the change baseline are process-wide: every device's
/// frame is compared against the same baseline.
pub struct Hub<P, S> {
    tracker: DeviceTracker,
    predictor: P,
    annotator: Annotator,
    gate: ChangeDetector,
    store: S,
    board: FrameBoard,
    grid: MontageGrid,
    stats: RunStats,
}

impl<P: Predictor, S: DetectionStore> Hub<P, S> {
    pub fn new(
        predictor: P,
        store: S,
        annotator: Annotator,
        change_interval: Duration,
        grid: MontageGrid,
        started: Instant,
    ) -> Self {
        let gate = ChangeDetector::new(change_interval, annotator.zero_counts(), started);
        Self {
            tracker: DeviceTracker::new(),
            predictor,
            annotator,
            gate,
            store,
            board: FrameBoard::new(),
            grid,
            stats: RunStats::default(),
        }
    }

    /// Run one received frame through the pipeline and return the montage
    /// pages to display.
    pub fn handle_frame(&mut self, device_id: &str, frame: Frame, now: Instant) -> Vec<RgbImage> {
        self.stats.frames += 1;
        self.tracker.record_activity(device_id, now);
        let frame_dims = frame.dimensions();

        let detections = match self.predictor.predict(&frame) {
            Ok(detections) => detections,
            Err(err) => {
                self.stats.prediction_failures += 1;
                log::error!(
                    "unable to retrieve predictions from {}: {}",
                    self.predictor.name(),
                    err
                );
                Vec::new()
            }
        };

        let (annotated, counts) = self.annotator.annotate(frame, &detections, device_id);

        match self.gate.evaluate(now, &counts) {
            ChangeDecision::Changed { detected } => self.persist(device_id, &annotated, &detected),
            ChangeDecision::Unchanged | ChangeDecision::Waiting => {}
        }

        self.board.update(device_id, annotated);
        build_montages(self.board.frames(), self.grid.layout_for(frame_dims))
    }

    fn persist(&mut self, device_id: &str, frame: &Frame, detected: &[String]) {
        match self.store.save(frame, detected) {
            Ok(()) => {
                self.stats.persisted += 1;
                log::info!(
                    "detections changed on {}; saved [{}]",
                    device_id,
                    detected.join(", ")
                );
            }
            Err(err) => {
                self.stats.persistence_failures += 1;
                log::error!("unable to save detections at {}: {}", self.store.name(), err);
            }
        }
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            devices: self.tracker.len(),
            ..self.stats
        }
    }

    pub fn tracker(&self) -> &DeviceTracker {
        &self.tracker
    }

    pub fn board(&self) -> &FrameBoard {
        &self.board
    }

    pub fn gate(&self) -> &ChangeDetector {
        &self.gate
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    pub fn predictor(&self) -> &P {
        &self.predictor
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

/// Receive frames until the transport closes or `stop` is set.
///
/// Only receive failures end the loop with an error. Remote service failures
/// are absorbed by the hub, and reply or display failures are logged.
pub fn run<P, S, H, D>(
    hub: &mut Hub<P, S>,
    transport: &mut H,
    sink: &mut D,
    stop: &AtomicBool,
) -> Result<RunStats>
where
    P: Predictor,
    S: DetectionStore,
    H: FrameHub,
    D: MontageSink,
{
    let mut last_health_log = Instant::now();
    while let Some(incoming) = transport.recv_frame()? {
        if let Err(err) = transport.send_reply(ACK_REPLY) {
            log::warn!(
                "failed to acknowledge frame from {}: {}",
                incoming.device_id,
                err
            );
        }

        let montages = hub.handle_frame(&incoming.device_id, incoming.frame, Instant::now());
        if let Err(err) = sink.show(&montages) {
            log::warn!("failed to display montage: {}", err);
        }

        if last_health_log.elapsed() >= HEALTH_LOG_INTERVAL {
            let stats = hub.stats();
            log::info!(
                "frames={} devices={} persisted={} prediction_failures={}",
                stats.frames,
                stats.devices,
                stats.persisted,
                stats.prediction_failures
            );
            last_health_log = Instant::now();
        }

        if stop.load(Ordering::SeqCst) {
            break;
        }
    }

    let stats = hub.stats();
    log::info!(
        "frame loop stopped after {} frames from {} devices",
        stats.frames,
        stats.devices
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::Palette;
    use crate::detect::{Detection, Point, StubPredictor};
    use crate::remote::ServiceError;
    use crate::storage::InMemoryDetectionStore;
    use image::Rgb;

    fn grid() -> MontageGrid {
        MontageGrid {
            cols: 2,
            rows: 1,
            tile_size: None,
        }
    }

    fn hub(predictor: StubPredictor, t0: Instant) -> Hub<StubPredictor, InMemoryDetectionStore> {
        let classes = ["dog", "person", "cat"].iter().map(|s| s.to_string());
        let palette = Palette::new(vec![Rgb([255, 255, 0])]).unwrap();
        Hub::new(
            predictor,
            InMemoryDetectionStore::new(),
            Annotator::new(classes, palette),
            Duration::from_secs(5),
            grid(),
            t0,
        )
    }

    fn dog() -> Detection {
        Detection::new("dog", Point::new(10, 5), Point::new(50, 40))
    }

    #[test]
    fn prediction_failure_counts_as_no_detections() {
        let t0 = Instant::now();
        let predictor = StubPredictor::new().then(Err(ServiceError::Transport("timed out".into())));
        let mut hub = hub(predictor, t0);

        let pages = hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_secs(1));

        assert_eq!(pages.len(), 1);
        assert_eq!(hub.stats().prediction_failures, 1);
        let board_frame = hub.board().get("cam1").unwrap();
        assert!(!board_frame.pixels().any(|p| *p == Rgb([255, 255, 0])));
    }

    #[test]
    fn change_is_persisted_once_per_window() {
        let t0 = Instant::now();
        let mut hub = hub(StubPredictor::always(vec![dog()]), t0);

        for ms in (6_000..10_000).step_by(250) {
            hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_millis(ms));
        }

        assert_eq!(hub.store().events().len(), 1);
        assert_eq!(hub.store().events()[0].detected, vec!["dog".to_string()]);
        assert_eq!(hub.stats().persisted, 1);
    }

    #[test]
    fn persisted_frame_is_annotated() {
        let t0 = Instant::now();
        let mut hub = hub(StubPredictor::always(vec![dog()]), t0);

        hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_secs(6));

        let saved = &hub.store().events()[0].frame;
        assert_eq!(*saved.get_pixel(50, 40), Rgb([255, 255, 0]));
    }

    #[test]
    fn failed_save_still_advances_baseline() {
        let t0 = Instant::now();
        let mut hub = hub(StubPredictor::always(vec![dog()]), t0);
        let mut store_failure = InMemoryDetectionStore::new();
        store_failure.fail_next(ServiceError::Status(503));
        hub.store = store_failure;

        hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_secs(6));
        hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_secs(12));

        assert_eq!(hub.store().attempts(), 1);
        assert!(hub.store().events().is_empty());
        assert_eq!(hub.stats().persistence_failures, 1);
        assert_eq!(hub.gate().baseline().get("dog"), Some(1));
    }

    #[test]
    fn devices_share_one_baseline() {
        let t0 = Instant::now();
        let predictor = StubPredictor::new()
            .then(Ok(vec![dog()]))
            .then(Ok(Vec::new()));
        let mut hub = hub(predictor, t0);

        hub.handle_frame("cam1", Frame::new(64, 48), t0 + Duration::from_secs(6));
        hub.handle_frame("cam2", Frame::new(64, 48), t0 + Duration::from_secs(12));

        let events = hub.store().events();
        assert_eq!(events.len(), 2);
        assert!(events[1].detected.is_empty());
    }

    #[test]
    fn board_grows_with_each_new_device() {
        let t0 = Instant::now();
        let mut hub = hub(StubPredictor::new(), t0);

        assert_eq!(hub.handle_frame("cam1", Frame::new(8, 6), t0).len(), 1);
        assert_eq!(hub.handle_frame("cam2", Frame::new(8, 6), t0).len(), 1);
        let pages = hub.handle_frame("cam3", Frame::new(8, 6), t0);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].dimensions(), (16, 6));
        hub.handle_frame("cam1", Frame::new(8, 6), t0);
        assert_eq!(hub.board().len(), 3);
        assert_eq!(hub.stats().devices, 3);
        assert_eq!(hub.stats().frames, 4);
    }
}
