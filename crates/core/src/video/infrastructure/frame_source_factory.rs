use crate::video::domain::frame_source::FrameSource;
use crate::video::domain::video_source::VideoSource;

use super::camera_source::CameraSource;
use super::ffmpeg_file_source::FfmpegFileSource;
use super::resizing_frame_source::ResizingFrameSource;

#[derive(Clone, Copy, Debug)]
pub struct SourceOptions {
    pub resize_width: u32,
    pub mirror: bool,
    pub max_consecutive_read_errors: usize,
}

/// Opens the camera or file behind `source`, wrapped so frames come out
/// resized (and mirrored, if requested).
pub fn open_frame_source(
    source: &VideoSource,
    options: SourceOptions,
) -> Result<Box<dyn FrameSource>, Box<dyn std::error::Error>> {
    let inner: Box<dyn FrameSource> = match source {
        VideoSource::Device(index) => {
            log::info!("Opening camera {index}");
            Box::new(CameraSource::open(*index, options.max_consecutive_read_errors)?)
        }
        VideoSource::File(path) => Box::new(FfmpegFileSource::open(path)?),
    };
    Ok(Box::new(ResizingFrameSource::new(
        inner,
        options.resize_width,
        options.mirror,
    )?))
}
