use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;

/// Pull-based ffmpeg decoder producing RGB24 [`Frame`]s.
///
/// Owns the demuxer so it can live on a capture thread. The scaler is built
/// from the first decoded frame, since capture devices may only report their
/// pixel format once streaming starts.
pub struct FfmpegDecoder {
    ictx: Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: Option<ScalerState>,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

struct ScalerState {
    context: scaling::Context,
    format: ffmpeg_next::format::Pixel,
    width: u32,
    height: u32,
}

// Safety: FfmpegDecoder is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegDecoder {}

impl FfmpegDecoder {
    pub fn open_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        if !path.exists() {
            return Err(format!("video file not found: {}", path.display()).into());
        }
        let ictx = ffmpeg_next::format::input(path)?;
        Self::from_input(ictx)
    }

    /// Opens capture device `index` through the platform's capture backend.
    pub fn open_device(index: u32) -> Result<Self, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        ffmpeg_next::device::register_all();

        let (backend, url) = capture_device_url(index)?;
        let format = ffmpeg_next::device::input::video()
            .find(|f| f.name() == backend)
            .ok_or_else(|| format!("capture backend {backend} not available in this ffmpeg build"))?;

        let ctx = ffmpeg_next::format::open_with(
            &url,
            &ffmpeg_next::format::Format::Input(format),
            ffmpeg_next::Dictionary::new(),
        )?;
        match ctx {
            ffmpeg_next::format::context::Context::Input(ictx) => Self::from_input(ictx),
            _ => Err(format!("{url} did not open as an input device").into()),
        }
    }

    fn from_input(ictx: Input) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or("No video stream found")?;
        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        log::debug!(
            "Opened video stream {video_stream_index} ({}x{})",
            decoder.width(),
            decoder.height()
        );

        Ok(Self {
            ictx,
            decoder,
            scaler: None,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    /// Decodes the next frame. `Ok(None)` once the stream is drained.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        if self.done {
            return Ok(None);
        }

        if let Some(frame) = self.try_receive()? {
            return Ok(Some(frame));
        }

        if self.flushing {
            self.done = true;
            return Ok(None);
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(frame) = self.try_receive()? {
                    return Ok(Some(frame));
                }
                self.done = true;
                return Ok(None);
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            if let Err(e) = self.decoder.send_packet(&packet) {
                log::debug!("Skipping undecodable packet: {e}");
                continue;
            }

            if let Some(frame) = self.try_receive()? {
                return Ok(Some(frame));
            }
        }
    }

    fn try_receive(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return Ok(None);
        }

        let (width, height) = (decoded.width(), decoded.height());
        let scaler = self.scaler_for(decoded.format(), width, height)?;
        let mut rgb_frame = Video::empty();
        scaler.run(&decoded, &mut rgb_frame)?;

        let pixels = extract_rgb_pixels(&rgb_frame, width, height);
        let frame = Frame::new(pixels, width, height, 3, self.frame_index);
        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn scaler_for(
        &mut self,
        format: ffmpeg_next::format::Pixel,
        width: u32,
        height: u32,
    ) -> Result<&mut scaling::Context, ffmpeg_next::Error> {
        let stale = match &self.scaler {
            Some(s) => s.format != format || s.width != width || s.height != height,
            None => true,
        };
        if stale {
            let context = scaling::Context::get(
                format,
                width,
                height,
                ffmpeg_next::format::Pixel::RGB24,
                width,
                height,
                scaling::Flags::BILINEAR,
            )?;
            self.scaler = Some(ScalerState {
                context,
                format,
                width,
                height,
            });
        }
        match self.scaler.as_mut() {
            Some(s) => Ok(&mut s.context),
            None => Err(ffmpeg_next::Error::Bug),
        }
    }
}

/// Backend name and URL for capture device `index` on this platform.
fn capture_device_url(index: u32) -> Result<(&'static str, String), Box<dyn std::error::Error>> {
    if cfg!(target_os = "linux") {
        Ok(("video4linux2,v4l2", format!("/dev/video{index}")))
    } else if cfg!(target_os = "macos") {
        Ok(("avfoundation", format!("{index}")))
    } else {
        Err("camera capture is not supported on this platform; pass a video file".into())
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer,
/// dropping per-row stride padding.
fn extract_rgb_pixels(rgb_frame: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
