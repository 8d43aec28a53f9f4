use ndarray::{ArrayView3, ArrayViewMut3};

/// A single captured frame: contiguous RGB bytes in row-major order.
///
/// `index` is the decode/capture sequence number. Gaps between consecutive
/// indices mean the source dropped frames.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    pub fn as_ndarray_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        ArrayViewMut3::from_shape(self.shape(), &mut self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Copies the pixels in `[left, right) x [top, bottom)` into a new frame.
    ///
    /// Bounds must already lie inside the frame; returns `None` when the
    /// rectangle is empty or out of range.
    pub fn crop(&self, left: u32, top: u32, right: u32, bottom: u32) -> Option<Frame> {
        if right <= left || bottom <= top || right > self.width || bottom > self.height {
            return None;
        }
        let channels = self.channels as usize;
        let row_bytes = (right - left) as usize * channels;
        let mut data = Vec::with_capacity(row_bytes * (bottom - top) as usize);
        for row in top..bottom {
            let start = (row as usize * self.width as usize + left as usize) * channels;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Some(Frame::new(
            data,
            right - left,
            bottom - top,
            self.channels,
            self.index,
        ))
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}
