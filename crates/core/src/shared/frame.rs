use ndarray::ArrayView3;

/// A single camera frame: contiguous RGB bytes in row-major order.
///
/// `index` increases monotonically per capture run, so consumers can verify
/// ordering and detect the start of a new run. Pixel format conversion
/// happens at device boundaries; everything downstream treats the data as
/// `height × width × channels` bytes.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: usize,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: usize, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            width as usize * height as usize * channels,
            "frame data length must be width * height * channels"
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

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// `(height, width, channels)` view over the pixel data.
    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(
            (self.height as usize, self.width as usize, self.channels),
            &self.data,
        )
        .expect("frame data length must match dimensions")
    }
}
