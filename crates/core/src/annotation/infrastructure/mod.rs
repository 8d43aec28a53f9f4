pub mod headless_display;
pub mod image_sequence_display;
pub mod imageproc_annotator;
