use std::fmt;

use serde::{Deserialize, Serialize};

/// The one status line. Whatever it says is the stage the session is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "detail")]
pub enum SessionStatus {
    Starting,
    CheckingPermissions,
    CameraInitializing,
    ArReady,
    PermissionDenied(String),
    Failed(String),
}

impl SessionStatus {
    /// Past the start-up sequence, for better or worse.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::PermissionDenied(_) | SessionStatus::Failed(_))
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Starting => f.write_str("Starting…"),
            SessionStatus::CheckingPermissions => f.write_str("Checking permissions…"),
            SessionStatus::CameraInitializing => f.write_str("Camera is initializing…"),
            SessionStatus::ArReady => f.write_str("AR Ready…"),
            SessionStatus::PermissionDenied(what) => write!(f, "Permission denied: {} (grant access in system settings)", what),
            SessionStatus::Failed(msg) => f.write_str(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_text() {
        assert_eq!(SessionStatus::Starting.to_string(), "Starting…");
        assert_eq!(SessionStatus::CheckingPermissions.to_string(), "Checking permissions…");
        assert_eq!(SessionStatus::CameraInitializing.to_string(), "Camera is initializing…");
        assert_eq!(SessionStatus::ArReady.to_string(), "AR Ready…");
        assert_eq!(SessionStatus::Failed("No camera available".into()).to_string(), "No camera available");
        assert!(SessionStatus::PermissionDenied("camera".into()).to_string().starts_with("Permission denied: camera"));
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionStatus::ArReady.is_terminal());
        assert!(SessionStatus::Failed("x".into()).is_terminal());
        assert!(SessionStatus::PermissionDenied("location".into()).is_terminal());
    }

    #[test]
    fn serializes_tagged() {
        let v = serde_json::to_value(SessionStatus::PermissionDenied("camera".into())).unwrap();
        assert_eq!(v, serde_json::json!({ "stage": "PermissionDenied", "detail": "camera" }));
        let v = serde_json::to_value(SessionStatus::ArReady).unwrap();
        assert_eq!(v, serde_json::json!({ "stage": "ArReady" }));
    }
}
