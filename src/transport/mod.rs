//! Inbound frame transport.
//!
//! Devices push one frame per request and wait for an acknowledgement before
//! sending the next. The hub must reply before it does any work on the frame,
//! so a slow pipeline throttles every device evenly.
//!
//! - `HttpFrameHub`: HTTP/1.1 `POST /frames/<device_id>` with an encoded image body.
//! - `ChannelFrameHub`: in-process hub fed through an mpsc channel.

mod channel;
mod http;

pub use channel::{ChannelFrameHub, FrameSender};
pub use http::{validate_device_id, HttpFrameHub, MAX_FRAME_BYTES};

use anyhow::Result;

use crate::frame::Frame;

/// Fixed acknowledgement payload sent back for every accepted frame.
pub const ACK_REPLY: &[u8] = b"OK";

/// One frame as received from a device.
#[derive(Debug)]
pub struct IncomingFrame {
    pub device_id: String,
    pub frame: Frame,
}

pub trait FrameHub {
    /// Block until the next frame arrives.
    ///
    /// `Ok(None)` means the transport is closed or shutdown was requested.
    fn recv_frame(&mut self) -> Result<Option<IncomingFrame>>;

    /// Answer the request that delivered the last received frame.
    fn send_reply(&mut self, payload: &[u8]) -> Result<()>;
}
