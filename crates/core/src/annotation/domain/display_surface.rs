use crate::shared::frame::Frame;

/// Receives every frame after annotation, once per loop iteration.
///
/// A failure from `show` ends the run; `close` is called exactly once when
/// the pipeline stops.
pub trait DisplaySurface: Send {
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>>;

    fn close(&mut self);
}
