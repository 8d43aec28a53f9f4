use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::shared::frame::Frame;
use crate::video::domain::frame_source::FrameSource;

use super::ffmpeg_decoder::FfmpegDecoder;
use super::latest_frame_slot::{latest_slot, SlotReader, SlotWriter};

/// Live camera source.
///
/// A background thread keeps reading the device and overwrites a single
/// slot, so the consumer always gets the freshest frame and never falls
/// behind the camera. Skipped frames show up as gaps in `Frame::index`.
pub struct CameraSource {
    reader: Option<SlotReader<Frame>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Opens capture device `index` and starts capturing.
    ///
    /// Returns once the device is open, or with the open error.
    pub fn open(index: u32, max_consecutive_errors: usize) -> Result<Self, Box<dyn std::error::Error>> {
        Self::spawn(move || FfmpegDecoder::open_device(index), max_consecutive_errors)
    }

    fn spawn<F>(open: F, max_consecutive_errors: usize) -> Result<Self, Box<dyn std::error::Error>>
    where
        F: FnOnce() -> Result<FfmpegDecoder, Box<dyn std::error::Error>> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (writer, reader) = latest_slot();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);

        let thread_stop = Arc::clone(&stop);
        let handle = thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let decoder = match open() {
                    Ok(decoder) => {
                        let _ = ready_tx.send(Ok(()));
                        decoder
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                capture_loop(decoder, writer, &thread_stop, max_consecutive_errors);
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                log::info!("Camera capture started");
                Ok(Self {
                    reader: Some(reader),
                    stop,
                    handle: Some(handle),
                })
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(format!("failed to open camera: {message}").into())
            }
            Err(_) => {
                let _ = handle.join();
                Err("camera capture thread exited before opening the device".into())
            }
        }
    }
}

fn capture_loop(
    mut decoder: FfmpegDecoder,
    writer: SlotWriter<Frame>,
    stop: &AtomicBool,
    max_consecutive_errors: usize,
) {
    let mut consecutive_errors = 0;
    let mut dropped = 0usize;
    while !stop.load(Ordering::Relaxed) {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                consecutive_errors = 0;
                if writer.publish(frame) {
                    dropped += 1;
                }
            }
            Ok(None) => {
                log::info!("Camera stream ended");
                break;
            }
            Err(e) => {
                consecutive_errors += 1;
                log::warn!("Camera read failed ({consecutive_errors}/{max_consecutive_errors}): {e}");
                if consecutive_errors >= max_consecutive_errors {
                    log::error!("Giving up on camera after {consecutive_errors} consecutive errors");
                    break;
                }
            }
        }
    }
    log::debug!("Camera capture stopped ({dropped} frames skipped by the consumer)");
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Box<dyn std::error::Error>> {
        Ok(self.reader.as_ref().and_then(|r| r.take()))
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        self.reader = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Camera capture thread panicked");
            }
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
