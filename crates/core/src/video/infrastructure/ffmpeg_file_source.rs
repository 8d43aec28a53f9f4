use std::path::Path;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

use super::ffmpeg_decoder::FfmpegDecoder;

/// Frames decoded from a video file, in file order.
pub struct FfmpegFileSource {
    decoder: Option<FfmpegDecoder>,
}

impl FfmpegFileSource {
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let decoder = FfmpegDecoder::open_file(path)?;
        log::info!("Reading frames from {}", path.display());
        Ok(Self {
            decoder: Some(decoder),
        })
    }
}

impl FrameSource for FfmpegFileSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        match self.decoder.as_mut() {
            Some(decoder) => decoder.next_frame(),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.decoder = None;
    }
}
