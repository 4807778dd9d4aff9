pub mod synthetic_camera;
