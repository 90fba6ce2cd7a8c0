//! Camera acquisition for the AR overlay. Frames are the presentation
//! layer's business; this crate only proves a camera exists and holds it.

pub mod camera;

pub use camera::{open, CameraConfig, CameraError, CameraHandle};
