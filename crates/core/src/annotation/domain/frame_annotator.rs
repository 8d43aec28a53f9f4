use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Warning drawn when a frame holds more than one face.
pub const MULTIPLE_FACES_WARNING: &str = "Only one face";

/// Something to draw on a frame before display.
#[derive(Clone, Debug, PartialEq)]
pub enum Overlay {
    /// A confident recognition: box, identity, probability.
    FaceBox {
        bbox: BoundingBox,
        label: String,
        confidence: f64,
    },
    /// Free-standing status text near the top-left corner.
    Warning { text: String },
}

impl Overlay {
    pub fn multiple_faces() -> Self {
        Overlay::Warning {
            text: MULTIPLE_FACES_WARNING.to_string(),
        }
    }
}

/// Draws overlays onto a frame in place.
pub trait FrameAnnotator: Send {
    fn annotate(&self, frame: &mut Frame, overlays: &[Overlay]) -> Result<(), Box<dyn std::error::Error>>;
}
