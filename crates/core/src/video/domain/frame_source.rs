use crate::shared::frame::Frame;

/// Produces successive frames from a camera or a file.
///
/// `Ok(None)` means the source is exhausted. An `Err` is a failed read of a
/// single frame; the caller decides whether to retry.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>>;

    /// Releases the device or file. Further reads return `Ok(None)`.
    fn release(&mut self);
}
