use core::fmt;

use crossbeam_channel::Sender;

use crate::frame::Frame;
use crate::session::Message;
use crate::types::Orientation;

/// Pull-based frame delivery.
///
/// The source produces a frame only after
/// [`request_next_frame`](FrameSource::request_next_frame) has been called,
/// and hands it to the [`FrameSink`] given to
/// [`start`](FrameSource::start). Delivery may happen on any thread.
pub trait FrameSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Start the source. Frames requested from now on go to `sink`.
    fn start(&mut self, sink: FrameSink) -> Result<(), Self::Error>;

    fn request_next_frame(&mut self);

    /// Whether the camera currently has focus.
    fn is_focused(&self) -> bool;

    /// Ask for an autofocus cycle.
    fn request_focus(&mut self);

    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Where a [`FrameSource`] delivers the frames it was asked for.
#[derive(Clone)]
pub struct FrameSink {
    tx: Sender<Message>,
}

impl FrameSink {
    pub(crate) fn new(tx: Sender<Message>) -> Self {
        Self { tx }
    }

    /// Hand a frame to the session. Returns `false` if the session is gone,
    /// in which case the frame is released immediately.
    pub fn deliver(&self, frame: Frame) -> bool {
        self.tx.send(Message::Frame(frame)).is_ok()
    }
}

impl fmt::Debug for FrameSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameSink").finish_non_exhaustive()
    }
}

/// Reports the physical orientation of the device.
pub trait OrientationSensor: Send + Sync + 'static {
    fn orientation(&self) -> Orientation;
}

/// An orientation sensor that never moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedOrientation(pub Orientation);

impl OrientationSensor for FixedOrientation {
    fn orientation(&self) -> Orientation {
        self.0
    }
}
