//! Spherical-earth geometry: great-circle distance and initial bearing.

use serde::Serialize;

use crate::error::{BearingError, Result};

/// Mean earth radius used for every distance in this crate.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A validated latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    lat: f64,
    lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Result<Self> {
        let p = Self { lat, lon };
        if !p.is_valid() {
            return Err(BearingError::InvalidCoordinate { lat, lon });
        }
        Ok(p)
    }

    /// Only for compile-time constants that are known to be in range.
    pub const fn new_unchecked(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn lat(&self) -> f64 { self.lat }
    pub fn lon(&self) -> f64 { self.lon }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.is_valid() { Ok(()) } else { Err(BearingError::InvalidCoordinate { lat: self.lat, lon: self.lon }) }
    }
}

/// Where the compass should point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    name: String,
    point: GeoPoint,
}

pub const KAABA: GeoPoint = GeoPoint::new_unchecked(21.422652678125257, 39.82618098932749);
pub const KAABA_NAME: &str = "(Qibla) Al Kaaba";

impl Target {
    pub fn new(name: impl Into<String>, point: GeoPoint) -> Result<Self> {
        point.validate()?;
        Ok(Self { name: name.into(), point })
    }

    pub fn kaaba() -> Self {
        Self { name: KAABA_NAME.to_string(), point: KAABA }
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn point(&self) -> &GeoPoint { &self.point }
}

impl Default for Target {
    fn default() -> Self { Self::kaaba() }
}

pub fn haversine_m(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let dlat = (to.lat - from.lat).to_radians();
    let dlon = (to.lon - from.lon).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + from.lat.to_radians().cos() * to.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Forward azimuth from `from` to `to`, in degrees within [0, 360).
/// Coincident points yield 0.
pub fn initial_bearing_deg(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let phi1 = from.lat.to_radians();
    let phi2 = to.lat.to_radians();
    let dlon = (to.lon - from.lon).to_radians();

    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    normalize_bearing(y.atan2(x).to_degrees())
}

// atan2 output is already in (-180, 180]; one +360 correction is enough.
// A tiny negative value plus 360 can round to exactly 360.0, which folds to 0.
fn normalize_bearing(deg: f64) -> f64 {
    let d = if deg < 0.0 { deg + 360.0 } else { deg };
    if d >= 360.0 { d - 360.0 } else { d }
}
