pub mod overlay;
pub mod status;

pub use overlay::OverlayFrame;
pub use status::SessionStatus;
