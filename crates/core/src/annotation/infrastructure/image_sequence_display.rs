use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::annotation::domain::display_surface::DisplaySurface;
use crate::shared::frame::Frame;

const LATEST_FRAME_NAME: &str = "latest.jpg";

/// Writes annotated frames to a directory.
///
/// By default only `latest.jpg` is kept, replaced atomically every frame so
/// an external viewer can poll it. With `keep_history` every frame is saved
/// as `frame_000123.jpg` instead.
pub struct ImageSequenceDisplay {
    output_dir: PathBuf,
    keep_history: bool,
    frames_written: usize,
}

impl ImageSequenceDisplay {
    pub fn new(output_dir: &Path, keep_history: bool) -> Result<Self, Box<dyn std::error::Error>> {
        fs::create_dir_all(output_dir).map_err(|e| {
            format!("failed to create output directory {}: {e}", output_dir.display())
        })?;
        log::info!("Writing annotated frames to {}", output_dir.display());
        Ok(Self {
            output_dir: output_dir.to_path_buf(),
            keep_history,
            frames_written: 0,
        })
    }

    pub fn frames_written(&self) -> usize {
        self.frames_written
    }

    fn target_path(&self, frame: &Frame) -> PathBuf {
        if self.keep_history {
            self.output_dir.join(format!("frame_{:06}.jpg", frame.index()))
        } else {
            self.output_dir.join(LATEST_FRAME_NAME)
        }
    }
}

impl DisplaySurface for ImageSequenceDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let image = RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("frame buffer size mismatch")?;

        let target = self.target_path(frame);
        // Same extension so the encoder is picked from the name.
        let temp = self.output_dir.join(".writing.jpg");
        image.save(&temp)?;
        fs::rename(&temp, &target)?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) {
        log::info!(
            "Display closed after {} frames ({})",
            self.frames_written,
            self.output_dir.display()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn gray(index: usize) -> Frame {
        Frame::new(vec![100u8; 8 * 6 * 3], 8, 6, 3, index)
    }

    #[test]
    fn test_latest_frame_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let mut display = ImageSequenceDisplay::new(tmp.path(), false).unwrap();
        display.show(&gray(0)).unwrap();
        display.show(&gray(1)).unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec![LATEST_FRAME_NAME.to_string()]);
        let saved = image::open(tmp.path().join(LATEST_FRAME_NAME)).unwrap();
        assert_eq!((saved.width(), saved.height()), (8, 6));
        assert_eq!(display.frames_written(), 2);
        display.close();
    }

    #[test]
    fn test_history_keeps_every_frame() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("frames");
        let mut display = ImageSequenceDisplay::new(&out, true).unwrap();
        display.show(&gray(3)).unwrap();
        display.show(&gray(4)).unwrap();
        assert!(out.join("frame_000003.jpg").exists());
        assert!(out.join("frame_000004.jpg").exists());
    }

    #[test]
    fn test_unwritable_directory_fails_show() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("gone");
        let mut display = ImageSequenceDisplay::new(&out, false).unwrap();
        fs::remove_dir_all(&out).unwrap();
        assert!(display.show(&gray(0)).is_err());
    }
}
