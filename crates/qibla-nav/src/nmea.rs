use time::OffsetDateTime;
use tracing::debug;

use crate::bearing::{FixQuality, HeadingSample, North, PositionSample};
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Position,
    Heading,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Position(PositionSample),
    Heading(HeadingSample),
}

impl SensorEvent {
    pub fn kind(&self) -> StreamKind {
        match self {
            SensorEvent::Position(_) => StreamKind::Position,
            SensorEvent::Heading(_) => StreamKind::Heading,
        }
    }
}

/// Minimal NMEA 0183 parsing, one parser per input stream:
/// - GGA: satellites + hdop, attached to the next position
/// - RMC: lat/lon (only when status is A)
/// - HDT: true heading
/// - HDG: magnetic heading, corrected to true when deviation/variation are given
#[derive(Debug, Default)]
pub struct NmeaParser {
    last_quality: Option<FixQuality>,
}

impl NmeaParser {
    pub fn new() -> Self { Self::default() }

    pub fn parse_line(&mut self, line: &str) -> Option<SensorEvent> {
        let body = match strip_checksum(line.trim()) {
            Some(b) => b,
            None => {
                debug!(line, "nmea: bad framing or checksum");
                return None;
            }
        };
        let parts: Vec<&str> = body.split(',').collect();
        // Address field is talker (2 chars) + sentence type (3 chars).
        let kind = parts[0].get(2..5)?;

        match kind {
            "GGA" => {
                if parts.len() > 9 {
                    let sats: u8 = parts[7].parse().unwrap_or(0);
                    let hdop: f32 = parts[8].parse().unwrap_or(99.9);
                    self.last_quality = Some(FixQuality { sats, hdop });
                }
                None
            }
            "RMC" => {
                if parts.len() <= 6 || parts[2] != "A" { return None; }
                let lat = parse_deg_min(parts[3], parts[4])?;
                let lon = parse_deg_min(parts[5], parts[6])?;
                match GeoPoint::new(lat, lon) {
                    Ok(point) => Some(SensorEvent::Position(PositionSample {
                        point,
                        quality: self.last_quality.clone(),
                        ts: OffsetDateTime::now_utc(),
                    })),
                    Err(e) => {
                        debug!("nmea: {}", e);
                        None
                    }
                }
            }
            "HDT" => {
                let deg: f64 = parts.get(1)?.parse().ok()?;
                Some(SensorEvent::Heading(HeadingSample { deg, north: North::True, ts: OffsetDateTime::now_utc() }))
            }
            "HDG" => {
                let sensor: f64 = parts.get(1)?.parse().ok()?;
                let deviation = signed_field(parts.get(2), parts.get(3));
                let variation = signed_field(parts.get(4), parts.get(5));
                let magnetic = sensor + deviation.unwrap_or(0.0);
                let (deg, north) = match variation {
                    Some(v) => (magnetic + v, North::True),
                    None => (magnetic, North::Magnetic),
                };
                Some(SensorEvent::Heading(HeadingSample { deg, north, ts: OffsetDateTime::now_utc() }))
            }
            _ => None,
        }
    }
}

// "$...*hh" -> "...". A missing checksum is accepted; a wrong one is not.
fn strip_checksum(s: &str) -> Option<&str> {
    let s = s.strip_prefix('$')?;
    match s.split_once('*') {
        Some((body, cs)) => {
            let want = u8::from_str_radix(cs.get(..2)?, 16).ok()?;
            let got = body.bytes().fold(0u8, |acc, b| acc ^ b);
            (want == got).then_some(body)
        }
        None => Some(s),
    }
}

fn signed_field(value: Option<&&str>, hemi: Option<&&str>) -> Option<f64> {
    let v: f64 = value?.parse().ok()?;
    match *hemi? {
        "E" => Some(v),
        "W" => Some(-v),
        _ => None,
    }
}

fn parse_deg_min(v: &str, hemi: &str) -> Option<f64> {
    if v.is_empty() { return None; }
    // lat: ddmm.mmmm, lon: dddmm.mmmm
    let dot = v.find('.')?;
    let deg_len = if dot > 4 { 3 } else { 2 };
    let deg: f64 = v.get(..deg_len)?.parse().ok()?;
    let min: f64 = v.get(deg_len..)?.parse().ok()?;
    let mut out = deg + (min / 60.0);
    if hemi == "S" || hemi == "W" { out = -out; }
    Some(out)
}
