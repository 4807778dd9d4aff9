use std::thread;
use std::time::Duration;

use crate::capture::domain::camera_device::{CameraDevice, CaptureConfig, DeviceError};
use crate::shared::frame::Frame;
use crate::shared::resolution::Resolution;

const CHANNELS: usize = 3;

/// Deterministic in-memory camera for the demo binary and tests.
///
/// Produces RGB frames at a fixed interval. Each frame carries a vertical
/// luminance gradient, and the red channel of the top-left pixel encodes
/// `index % 256` so individual frames stay distinguishable downstream.
pub struct SyntheticCamera {
    frame_interval: Duration,
    resolution: Option<Resolution>,
    next_index: usize,
}

impl SyntheticCamera {
    pub fn new(frame_interval: Duration) -> Self {
        Self {
            frame_interval,
            resolution: None,
            next_index: 0,
        }
    }
}

impl CameraDevice for SyntheticCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), DeviceError> {
        self.resolution = Some(config.resolution);
        self.next_index = 0;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, DeviceError> {
        let Some(resolution) = self.resolution else {
            return Err("synthetic camera read before open".into());
        };
        thread::sleep(self.frame_interval);

        let width = resolution.width as usize;
        let height = resolution.height as usize;
        let mut data = vec![0u8; width * height * CHANNELS];
        for (row_index, row) in data.chunks_exact_mut(width * CHANNELS).enumerate() {
            let level = if height > 1 {
                (row_index * 255 / (height - 1)) as u8
            } else {
                0
            };
            row.fill(level);
        }
        data[0] = (self.next_index % 256) as u8;

        let frame = Frame::new(
            data,
            resolution.width,
            resolution.height,
            CHANNELS,
            self.next_index,
        );
        self.next_index += 1;
        Ok(Some(frame))
    }

    fn close(&mut self) {
        self.resolution = None;
    }
}
