//! Qibla compass core: reconciles a position stream and a compass-heading
//! stream into a bearing toward a fixed target.

pub mod bearing;
pub mod doctor;
pub mod engine;
pub mod error;
pub mod geo;
pub mod hub;
pub mod nmea;
pub mod source;
pub mod view;

pub use bearing::{compute_bearing, format_distance, BearingResult, HeadingSample, PositionSample};
pub use engine::{BearingEngine, Reading};
pub use hub::{HubEvent, SensorHub};
pub use error::BearingError;
pub use geo::{GeoPoint, Target};
pub use view::ViewState;
