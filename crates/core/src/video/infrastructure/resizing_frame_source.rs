use image::imageops::{self, FilterType};
use image::RgbImage;

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

/// Decorator that scales every frame to a fixed width (aspect preserved)
/// and optionally mirrors it, so a camera preview reads like a mirror.
pub struct ResizingFrameSource {
    inner: Box<dyn FrameSource>,
    width: u32,
    mirror: bool,
}

impl ResizingFrameSource {
    pub fn new(inner: Box<dyn FrameSource>, width: u32, mirror: bool) -> Result<Self, &'static str> {
        if width == 0 {
            return Err("resize width must be > 0");
        }
        Ok(Self {
            inner,
            width,
            mirror,
        })
    }
}

impl FrameSource for ResizingFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        match self.inner.next_frame()? {
            Some(frame) => Ok(Some(resize_and_mirror(frame, self.width, self.mirror)?)),
            None => Ok(None),
        }
    }

    fn release(&mut self) {
        self.inner.release();
    }
}

pub fn resize_and_mirror(
    frame: Frame,
    width: u32,
    mirror: bool,
) -> Result<Frame, Box<dyn std::error::Error>> {
    if frame.channels() != 3 {
        return Err(format!("expected RGB frame, got {} channels", frame.channels()).into());
    }
    if frame.width() == width && !mirror {
        return Ok(frame);
    }

    let index = frame.index();
    let (src_w, src_h) = (frame.width(), frame.height());
    let mut image =
        RgbImage::from_raw(src_w, src_h, frame.into_data()).ok_or("frame buffer size mismatch")?;

    if src_w != width {
        let height = ((src_h as f64 * width as f64 / src_w as f64).round() as u32).max(1);
        image = imageops::resize(&image, width, height, FilterType::Triangle);
    }
    if mirror {
        imageops::flip_horizontal_in_place(&mut image);
    }

    let (w, h) = image.dimensions();
    Ok(Frame::new(image.into_raw(), w, h, 3, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    struct ScriptedSource {
        frames: VecDeque<Frame>,
        released: Arc<AtomicBool>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
            Ok(self.frames.pop_front())
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    fn gradient(w: u32, h: u32, index: usize) -> Frame {
        let mut data = Vec::new();
        for _y in 0..h {
            for x in 0..w {
                data.extend_from_slice(&[(x * 255 / (w - 1)) as u8, 0, 0]);
            }
        }
        Frame::new(data, w, h, 3, index)
    }

    #[test]
    fn test_resize_preserves_aspect_and_index() {
        let frame = resize_and_mirror(gradient(1200, 800, 9), 600, false).unwrap();
        assert_eq!((frame.width(), frame.height()), (600, 400));
        assert_eq!(frame.index(), 9);
    }

    #[test]
    fn test_mirror_flips_columns() {
        let frame = resize_and_mirror(gradient(4, 2, 0), 4, true).unwrap();
        let arr = frame.as_ndarray();
        assert_eq!(arr[[0, 0, 0]], 255);
        assert_eq!(arr[[0, 3, 0]], 0);
    }

    #[test]
    fn test_same_width_without_mirror_is_untouched() {
        let original = gradient(10, 5, 1);
        let frame = resize_and_mirror(original.clone(), 10, false).unwrap();
        assert_eq!(frame.data(), original.data());
    }

    #[test]
    fn test_decorator_passes_through_end_and_release() {
        let released = Arc::new(AtomicBool::new(false));
        let inner = ScriptedSource {
            frames: VecDeque::from(vec![gradient(20, 10, 0)]),
            released: Arc::clone(&released),
        };
        let mut source = ResizingFrameSource::new(Box::new(inner), 10, true).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width(), frame.height()), (10, 5));
        assert!(source.next_frame().unwrap().is_none());
        source.release();
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn test_zero_width_rejected() {
        let inner = ScriptedSource {
            frames: VecDeque::new(),
            released: Arc::new(AtomicBool::new(false)),
        };
        assert!(ResizingFrameSource::new(Box::new(inner), 0, false).is_err());
    }
}
