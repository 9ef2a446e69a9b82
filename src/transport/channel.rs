use anyhow::{anyhow, Result};
use std::sync::mpsc::{self, Receiver, SendError, Sender};

use super::{FrameHub, IncomingFrame};
use crate::frame::Frame;

/// Producer half of a `ChannelFrameHub`. Dropping every sender closes the hub.
#[derive(Clone)]
pub struct FrameSender {
    tx: Sender<IncomingFrame>,
}

impl FrameSender {
    pub fn send(&self, device_id: &str, frame: Frame) -> Result<()> {
        self.tx
            .send(IncomingFrame {
                device_id: device_id.to_string(),
                frame,
            })
            .map_err(|SendError(incoming)| {
                anyhow!("frame hub closed; dropped frame from {}", incoming.device_id)
            })
    }
}

/// In-process frame hub. Replies are recorded instead of sent anywhere.
pub struct ChannelFrameHub {
    rx: Receiver<IncomingFrame>,
    awaiting_reply: bool,
    replies: Vec<Vec<u8>>,
}

impl ChannelFrameHub {
    pub fn new() -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel();
        (
            FrameSender { tx },
            Self {
                rx,
                awaiting_reply: false,
                replies: Vec::new(),
            },
        )
    }

    pub fn replies(&self) -> &[Vec<u8>] {
        &self.replies
    }
}

impl FrameHub for ChannelFrameHub {
    fn recv_frame(&mut self) -> Result<Option<IncomingFrame>> {
        if self.awaiting_reply {
            return Err(anyhow!("previous frame has not been acknowledged"));
        }
        match self.rx.recv() {
            Ok(incoming) => {
                self.awaiting_reply = true;
                Ok(Some(incoming))
            }
            Err(_) => Ok(None),
        }
    }

    fn send_reply(&mut self, payload: &[u8]) -> Result<()> {
        if !self.awaiting_reply {
            return Err(anyhow!("no pending frame to acknowledge"));
        }
        self.awaiting_reply = false;
        self.replies.push(payload.to_vec());
        Ok(())
    }
}
