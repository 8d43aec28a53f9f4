use crate::annotation::domain::display_surface::DisplaySurface;
use crate::shared::frame::Frame;

/// Discards frames. For batch runs where only the log and tally matter.
#[derive(Default)]
pub struct HeadlessDisplay {
    shown: usize,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> usize {
        self.shown
    }
}

impl DisplaySurface for HeadlessDisplay {
    fn show(&mut self, _frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.shown += 1;
        Ok(())
    }

    fn close(&mut self) {
        log::debug!("Headless display closed after {} frames", self.shown);
    }
}
