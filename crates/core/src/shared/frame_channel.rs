use crossbeam_channel::{bounded, Receiver, Sender};

use crate::shared::frame::Frame;

/// Producer half of a [`FrameChannel`], handed to the capture session.
pub type FrameSender = Sender<Frame>;

/// Consumer half of a [`FrameChannel`], owned by the detection thread.
pub type FrameReceiver = Receiver<Frame>;

/// Single-slot hand-off buffer between capture and detection.
///
/// Capacity is exactly 1 by construction. While detection mode is active the
/// capture thread blocks on `send` until the previous frame has been
/// consumed, so no frame is ever silently dropped and the effective capture
/// rate is matched to detection throughput. This is a deliberate
/// rate-limiter, not an accidental constraint.
pub struct FrameChannel {
    sender: FrameSender,
    receiver: FrameReceiver,
}

impl FrameChannel {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self { sender, receiver }
    }

    /// A producer handle for attaching to a capture session.
    pub fn sender(&self) -> FrameSender {
        self.sender.clone()
    }

    /// Splits the channel into its two halves.
    pub fn split(self) -> (FrameSender, FrameReceiver) {
        (self.sender, self.receiver)
    }
}

impl Default for FrameChannel {
    fn default() -> Self {
        Self::new()
    }
}
