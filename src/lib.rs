//! Camera Hub
//!
//! Central server for a set of remote cameras. Each camera pushes frames to
//! the hub; the hub acknowledges, asks a prediction service what is in the
//! frame, draws the tracked objects, persists a frame whenever the object
//! counts change, and tiles the latest frame of every camera into dashboard
//! pages.
//!
//! # Module Structure
//!
//! - `transport`: request/reply frame intake (HTTP hub, in-process hub)
//! - `liveness`: first-contact and last-seen tracking per device
//! - `detect`: prediction backends (remote HTTP, stub)
//! - `annotate`: boxes, labels, status overlays and per-class counts
//! - `change`: interval-gated change detection against a persisted baseline
//! - `storage`: detection event persistence (remote HTTP, in-memory)
//! - `montage`: latest-frame board and grid composition
//! - `display`: montage sinks
//! - `pipeline`: the single-threaded frame loop tying it together
//! - `config`: file, environment and CLI configuration

pub mod annotate;
pub mod change;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod liveness;
pub mod montage;
pub mod pipeline;
pub mod remote;
pub mod storage;
pub mod transport;

pub use annotate::{Annotator, ObjectCounts, Palette};
pub use change::{ChangeDecision, ChangeDetector};
pub use config::{CliOverrides, HubConfig};
pub use detect::{Detection, HttpPredictor, Point, Predictor, StubPredictor};
pub use display::{DirectorySink, MontageSink, NullSink};
pub use frame::{Frame, FramePayload};
pub use liveness::DeviceTracker;
pub use montage::{build_montages, FrameBoard, MontageGrid, MontageLayout};
pub use pipeline::{run, Hub, RunStats};
pub use remote::ServiceError;
pub use storage::{DetectionStore, HttpDetectionStore, InMemoryDetectionStore};
pub use transport::{ChannelFrameHub, FrameHub, HttpFrameHub, IncomingFrame, ACK_REPLY};
