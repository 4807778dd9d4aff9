pub mod bounding_box;
pub mod frame;
pub mod frame_channel;
pub mod point;
pub mod resolution;
