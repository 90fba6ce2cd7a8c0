use serde::Serialize;
use time::OffsetDateTime;

use crate::error::{BearingError, Result};
use crate::geo::{haversine_m, initial_bearing_deg, GeoPoint, Target};

/// Half-width of the window in which the user counts as facing the target.
pub const FACING_THRESHOLD_DEG: f64 = 10.0;

#[derive(Debug, Clone, PartialEq)]
pub struct FixQuality {
    pub sats: u8,
    pub hdop: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSample {
    pub point: GeoPoint,
    pub quality: Option<FixQuality>,
    pub ts: OffsetDateTime,
}

impl PositionSample {
    pub fn new(point: GeoPoint) -> Self {
        Self { point, quality: None, ts: OffsetDateTime::now_utc() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum North {
    True,
    Magnetic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeadingSample {
    pub deg: f64,
    pub north: North,
    pub ts: OffsetDateTime,
}

impl HeadingSample {
    pub fn new(deg: f64) -> Self {
        Self { deg, north: North::True, ts: OffsetDateTime::now_utc() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BearingResult {
    pub target_bearing_deg: f64,
    pub relative_angle_deg: f64,
    pub is_facing_target: bool,
    pub distance_m: f64,
}

/// Reconciles where the device points with where the target lies.
///
/// Pure: the same inputs always produce the same output. Headings outside
/// [0, 360) are normalized; only non-finite headings are rejected.
pub fn compute_bearing(current: &PositionSample, heading: &HeadingSample, target: &Target) -> Result<BearingResult> {
    current.point.validate()?;
    target.point().validate()?;
    let heading_deg = normalize_heading(heading.deg)?;

    let target_bearing_deg = initial_bearing_deg(&current.point, target.point());
    let relative_angle_deg = relative_angle(target_bearing_deg, heading_deg);

    Ok(BearingResult {
        target_bearing_deg,
        relative_angle_deg,
        is_facing_target: is_facing(relative_angle_deg),
        distance_m: haversine_m(&current.point, target.point()),
    })
}

pub fn normalize_heading(deg: f64) -> Result<f64> {
    if !deg.is_finite() {
        return Err(BearingError::InvalidHeading(deg));
    }
    let d = deg.rem_euclid(360.0);
    Ok(if d >= 360.0 { 0.0 } else { d })
}

/// Signed offset from `heading_deg` to `bearing_deg` in (-180, 180]; positive
/// means the target is to the right. Both inputs must already be in [0, 360),
/// so a single correction pass suffices.
pub fn relative_angle(bearing_deg: f64, heading_deg: f64) -> f64 {
    let raw = bearing_deg - heading_deg;
    if raw > 180.0 {
        raw - 360.0
    } else if raw <= -180.0 {
        raw + 360.0
    } else {
        raw
    }
}

pub fn is_facing(relative_angle_deg: f64) -> bool {
    relative_angle_deg.abs() < FACING_THRESHOLD_DEG
}

/// Whole meters below 1 km, whole kilometers from there on.
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{} KM", (meters / 1000.0).round())
    } else {
        format!("{} m", meters.round())
    }
}
