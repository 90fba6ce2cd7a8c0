use tracing::debug;

use crate::bearing::{compute_bearing, BearingResult, HeadingSample, North, PositionSample};
use crate::error::Result;
use crate::geo::{haversine_m, initial_bearing_deg, Target};

/// What the engine can say given the samples seen so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    /// No position yet: nothing to show.
    AwaitingPosition,
    /// Position known, compass silent. Bearing and distance are real; the
    /// relative angle is not.
    AwaitingHeading { target_bearing_deg: f64, distance_m: f64 },
    Ready(BearingResult),
}

impl Reading {
    pub fn result(&self) -> Option<&BearingResult> {
        match self {
            Reading::Ready(r) => Some(r),
            _ => None,
        }
    }

    pub fn distance_m(&self) -> Option<f64> {
        match self {
            Reading::AwaitingPosition => None,
            Reading::AwaitingHeading { distance_m, .. } => Some(*distance_m),
            Reading::Ready(r) => Some(r.distance_m),
        }
    }
}

/// Holds the latest sample of each stream and recomputes on every update.
///
/// Rejected samples are never cached, so one bad update cannot spoil the
/// ones that follow.
pub struct BearingEngine {
    target: Target,
    position: Option<PositionSample>,
    heading: Option<HeadingSample>,
    assume_north_when_missing: bool,
}

impl BearingEngine {
    pub fn new(target: Target) -> Self {
        Self { target, position: None, heading: None, assume_north_when_missing: false }
    }

    /// Treat "no compass reading yet" as 0 degrees (legacy behavior).
    pub fn assume_north_when_missing(mut self, yes: bool) -> Self {
        self.assume_north_when_missing = yes;
        self
    }

    pub fn target(&self) -> &Target { &self.target }
    pub fn position(&self) -> Option<&PositionSample> { self.position.as_ref() }
    pub fn heading(&self) -> Option<&HeadingSample> { self.heading.as_ref() }

    pub fn update_position(&mut self, sample: PositionSample) -> Result<Reading> {
        let reading = self.recompute(Some(&sample), None)?;
        self.position = Some(sample);
        Ok(reading)
    }

    pub fn update_heading(&mut self, sample: HeadingSample) -> Result<Reading> {
        let reading = self.recompute(None, Some(&sample))?;
        self.heading = Some(sample);
        Ok(reading)
    }

    pub fn reading(&self) -> Reading {
        // Cached samples were validated on the way in.
        self.recompute(None, None).unwrap_or(Reading::AwaitingPosition)
    }

    fn recompute(&self, position: Option<&PositionSample>, heading: Option<&HeadingSample>) -> Result<Reading> {
        let heading = heading.or(self.heading.as_ref());
        let fallback;
        let heading = match heading {
            Some(h) => Some(h),
            None if self.assume_north_when_missing => {
                fallback = HeadingSample { deg: 0.0, north: North::True, ts: time::OffsetDateTime::now_utc() };
                Some(&fallback)
            }
            None => None,
        };

        let Some(position) = position.or(self.position.as_ref()) else {
            // Still validate a lone heading so the caller learns it was bad.
            if let Some(h) = heading {
                crate::bearing::normalize_heading(h.deg)?;
            }
            return Ok(Reading::AwaitingPosition);
        };

        match heading {
            Some(h) => {
                let r = compute_bearing(position, h, &self.target)?;
                debug!(bearing = r.target_bearing_deg, relative = r.relative_angle_deg, facing = r.is_facing_target, "recomputed");
                Ok(Reading::Ready(r))
            }
            None => {
                position.point.validate()?;
                Ok(Reading::AwaitingHeading {
                    target_bearing_deg: initial_bearing_deg(&position.point, self.target.point()),
                    distance_m: haversine_m(&position.point, self.target.point()),
                })
            }
        }
    }
}
