pub mod camera_source;
pub mod ffmpeg_decoder;
pub mod ffmpeg_file_source;
pub mod frame_source_factory;
pub mod latest_frame_slot;
pub mod resizing_frame_source;
