use std::fs;
use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{ImageBuffer, Rgb};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, Overlay};
use crate::shared::frame::Frame;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const BOX_THICKNESS: u32 = 2;

/// Text baseline offsets below the face box, in pixels.
const LABEL_OFFSET: i32 = 20;
const CONFIDENCE_OFFSET: i32 = 37;
const WARNING_BASELINE: (i32, i32) = (0, 100);

pub const DEFAULT_FONT_SCALE: f32 = 18.0;

/// DejaVu Sans Mono, used unless another font is configured.
const DEFAULT_FONT: &[u8] = include_bytes!("../../../assets/DejaVuSansMono.ttf");

/// RGB view over a frame's pixel buffer.
type Canvas<'a> = ImageBuffer<Rgb<u8>, &'a mut [u8]>;

/// Draws recognition boxes, labels and warnings with `imageproc`.
pub struct ImageprocAnnotator {
    font: FontArc,
    scale: PxScale,
}

impl ImageprocAnnotator {
    /// Loads `font_path` as the label font, or the bundled font when `None`.
    pub fn new(font_path: Option<&Path>, font_scale: f32) -> Result<Self, Box<dyn std::error::Error>> {
        let font = match font_path {
            Some(path) => {
                let bytes = fs::read(path)
                    .map_err(|e| format!("failed to read font {}: {e}", path.display()))?;
                FontArc::try_from_vec(bytes)
                    .map_err(|e| format!("invalid font {}: {e}", path.display()))?
            }
            None => FontArc::try_from_slice(DEFAULT_FONT)
                .map_err(|e| format!("invalid bundled font: {e}"))?,
        };
        Ok(Self {
            font,
            scale: PxScale::from(font_scale),
        })
    }

    fn draw_text_at_baseline(&self, canvas: &mut Canvas<'_>, x: i32, baseline: i32, text: &str) {
        let top = baseline - self.scale.y.round() as i32;
        draw_text_mut(canvas, TEXT_COLOR, x, top, self.scale, &self.font, text);
    }
}

impl FrameAnnotator for ImageprocAnnotator {
    fn annotate(&self, frame: &mut Frame, overlays: &[Overlay]) -> Result<(), Box<dyn std::error::Error>> {
        if overlays.is_empty() {
            return Ok(());
        }
        if frame.channels() != 3 {
            return Err(format!("cannot annotate a {}-channel frame", frame.channels()).into());
        }
        let (width, height) = (frame.width(), frame.height());
        let mut canvas = Canvas::from_raw(width, height, frame.data_mut())
            .ok_or("frame buffer size mismatch")?;

        for overlay in overlays {
            match overlay {
                Overlay::FaceBox {
                    bbox,
                    label,
                    confidence,
                } => {
                    let bounds = bbox.clamp_to(width, height);
                    for t in 0..BOX_THICKNESS {
                        let inner_w = bounds.width().saturating_sub(2 * t);
                        let inner_h = bounds.height().saturating_sub(2 * t);
                        if inner_w > 0 && inner_h > 0 {
                            let rect = Rect::at((bounds.left + t) as i32, (bounds.top + t) as i32)
                                .of_size(inner_w, inner_h);
                            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
                        }
                    }
                    let x = bbox.left();
                    self.draw_text_at_baseline(&mut canvas, x, bbox.bottom() + LABEL_OFFSET, label);
                    let rounded = (confidence * 1000.0).round() / 1000.0;
                    self.draw_text_at_baseline(
                        &mut canvas,
                        x,
                        bbox.bottom() + CONFIDENCE_OFFSET,
                        &rounded.to_string(),
                    );
                }
                Overlay::Warning { text } => {
                    let (x, baseline) = WARNING_BASELINE;
                    self.draw_text_at_baseline(&mut canvas, x, baseline, text);
                }
            }
        }
        Ok(())
    }
}
