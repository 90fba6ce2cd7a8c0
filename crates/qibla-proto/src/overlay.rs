use serde::{Deserialize, Serialize};

use crate::status::SessionStatus;

/// Everything the presentation layer needs to redraw after one sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayFrame {
    pub ts_unix_ms: i64,
    pub status: SessionStatus,
    pub status_text: String,
    pub target: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub heading_deg: Option<f64>,
    pub target_bearing_deg: Option<f64>,
    pub relative_angle_deg: Option<f64>,
    pub facing: Option<bool>,
    pub distance: Option<String>,
    // Only set while a relative angle exists
    pub view: Option<String>,
    pub indicator_offset_px: Option<f64>,
    pub instruction: Option<String>,
}

impl OverlayFrame {
    pub fn new(ts_unix_ms: i64, status: SessionStatus, target: &str) -> Self {
        Self {
            ts_unix_ms,
            status_text: status.to_string(),
            status,
            target: target.to_string(),
            lat: None,
            lon: None,
            heading_deg: None,
            target_bearing_deg: None,
            relative_angle_deg: None,
            facing: None,
            distance: None,
            view: None,
            indicator_offset_px: None,
            instruction: None,
        }
    }

    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// One human-readable line: status, then whatever is known.
    pub fn to_text_line(&self) -> String {
        let mut out = self.status_text.clone();
        if let Some(b) = self.target_bearing_deg {
            out.push_str(&format!(" | {} {:.1}°", self.target, b));
        }
        if let Some(i) = &self.instruction {
            out.push_str(&format!(" | {}", i));
        } else if self.target_bearing_deg.is_some() {
            out.push_str(" | waiting for compass");
        }
        if let Some(d) = &self.distance {
            out.push_str(&format!(" | {}", d));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_line_grows_with_data() {
        let mut f = OverlayFrame::new(0, SessionStatus::ArReady, "(Qibla) Al Kaaba");
        assert_eq!(f.to_text_line(), "AR Ready…");

        f.target_bearing_deg = Some(61.095);
        f.distance = Some("98 KM".into());
        assert_eq!(f.to_text_line(), "AR Ready… | (Qibla) Al Kaaba 61.1° | waiting for compass | 98 KM");

        f.instruction = Some("Turn right 61°".into());
        assert_eq!(f.to_text_line(), "AR Ready… | (Qibla) Al Kaaba 61.1° | Turn right 61° | 98 KM");
    }

    #[test]
    fn json_line_roundtrips_status() {
        let f = OverlayFrame::new(1_700_000_000_000, SessionStatus::CameraInitializing, "K");
        let line = f.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        let back: OverlayFrame = serde_json::from_str(&line).unwrap();
        assert_eq!(back.status, SessionStatus::CameraInitializing);
        assert_eq!(back.status_text, "Camera is initializing…");
    }
}
