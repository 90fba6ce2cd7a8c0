use thiserror::Error;

pub type Result<T> = std::result::Result<T, BearingError>;

/// Per-sample failures. A rejected sample is skipped; the session keeps going.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BearingError {
    #[error("invalid coordinate: lat={lat}, lon={lon}")]
    InvalidCoordinate { lat: f64, lon: f64 },

    #[error("invalid heading: {0}")]
    InvalidHeading(f64),
}
