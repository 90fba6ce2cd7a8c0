//! Maps a bearing result onto what the overlay should show. Animation and
//! layout stay with the presentation layer.

use serde::Serialize;

use crate::bearing::BearingResult;

/// Beyond this offset the target is outside the camera view.
pub const ON_SCREEN_LIMIT_DEG: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ViewState {
    OffScreenLeft,
    OffScreenRight,
    OnScreenAligned,
    OnScreenMisaligned,
}

impl ViewState {
    pub fn classify(r: &BearingResult) -> Self {
        let a = r.relative_angle_deg;
        if a.abs() > ON_SCREEN_LIMIT_DEG {
            if a > 0.0 { ViewState::OffScreenRight } else { ViewState::OffScreenLeft }
        } else if r.is_facing_target {
            ViewState::OnScreenAligned
        } else {
            ViewState::OnScreenMisaligned
        }
    }

    pub fn is_on_screen(&self) -> bool {
        matches!(self, ViewState::OnScreenAligned | ViewState::OnScreenMisaligned)
    }
}

/// Horizontal indicator offset from screen center, in the same unit as
/// `screen_width`. At +/-45 degrees the indicator touches the screen edge.
pub fn indicator_offset(relative_angle_deg: f64, screen_width: f64) -> f64 {
    relative_angle_deg * (screen_width / 90.0)
}

pub fn instruction(r: &BearingResult, target_name: &str) -> String {
    let deg = r.relative_angle_deg.abs().round();
    match ViewState::classify(r) {
        ViewState::OffScreenRight => format!("Turn right {}°", deg),
        ViewState::OffScreenLeft => format!("Turn left {}°", deg),
        ViewState::OnScreenAligned => format!("Facing {}", target_name),
        ViewState::OnScreenMisaligned => {
            let side = if r.relative_angle_deg > 0.0 { "right" } else { "left" };
            format!("Almost there, {}° {}", deg, side)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bearing::is_facing;

    fn with_angle(a: f64) -> BearingResult {
        BearingResult { target_bearing_deg: 0.0, relative_angle_deg: a, is_facing_target: is_facing(a), distance_m: 0.0 }
    }

    #[test]
    fn zone_boundaries() {
        assert_eq!(ViewState::classify(&with_angle(45.0)), ViewState::OnScreenMisaligned);
        assert_eq!(ViewState::classify(&with_angle(-45.0)), ViewState::OnScreenMisaligned);
        assert_eq!(ViewState::classify(&with_angle(45.01)), ViewState::OffScreenRight);
        assert_eq!(ViewState::classify(&with_angle(-45.01)), ViewState::OffScreenLeft);
        assert_eq!(ViewState::classify(&with_angle(10.0)), ViewState::OnScreenMisaligned);
        assert_eq!(ViewState::classify(&with_angle(9.99)), ViewState::OnScreenAligned);
        assert_eq!(ViewState::classify(&with_angle(180.0)), ViewState::OffScreenRight);
    }

    #[test]
    fn offset_reaches_edge_at_limit() {
        assert_eq!(indicator_offset(45.0, 1080.0), 540.0);
        assert_eq!(indicator_offset(-45.0, 1080.0), -540.0);
        assert_eq!(indicator_offset(0.0, 1080.0), 0.0);
    }

    #[test]
    fn instructions() {
        assert_eq!(instruction(&with_angle(61.095), "K"), "Turn right 61°");
        assert_eq!(instruction(&with_angle(-120.5), "K"), "Turn left 121°");
        assert_eq!(instruction(&with_angle(3.0), "K"), "Facing K");
        assert_eq!(instruction(&with_angle(-20.0), "K"), "Almost there, 20° left");
        assert!(ViewState::classify(&with_angle(30.0)).is_on_screen());
    }
}
