use std::io::ErrorKind;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

#[derive(Debug, Clone, serde::Deserialize)]
pub struct CameraConfig {
    pub mode: String,   // "v4l2" | "libcamera" | "none"
    pub device: String, // /dev/video0 (v4l2)
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CameraError {
    #[error("No camera available")]
    NoCameraAvailable,
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("Camera init failed: {0}")]
    CameraInitFailure(String),
}

/// An acquired camera. The device is released when the handle drops.
#[derive(Debug)]
pub struct CameraHandle {
    label: String,
    device: Option<std::fs::File>,
}

impl CameraHandle {
    pub fn label(&self) -> &str { &self.label }

    pub fn is_headless(&self) -> bool { self.label == "none" }

    pub fn holds_device(&self) -> bool { self.device.is_some() }
}

impl Drop for CameraHandle {
    fn drop(&mut self) {
        self.device.take();
        info!(camera = %self.label, "camera released");
    }
}

/// Checks that the device may be read without keeping it open.
pub fn check_permission(cfg: &CameraConfig) -> Result<(), CameraError> {
    if cfg.mode != "v4l2" { return Ok(()); }
    open_device(&cfg.device).map(drop)
}

pub async fn open(cfg: &CameraConfig) -> Result<CameraHandle, CameraError> {
    if cfg.mode != "none" && (cfg.width == 0 || cfg.height == 0 || cfg.fps == 0) {
        return Err(CameraError::CameraInitFailure(format!(
            "bad camera geometry {}x{}@{}", cfg.width, cfg.height, cfg.fps
        )));
    }
    match cfg.mode.as_str() {
        "v4l2" => {
            debug!(device = %cfg.device, "camera: open v4l2");
            let f = open_device(&cfg.device)?;
            Ok(CameraHandle { label: cfg.device.clone(), device: Some(f) })
        }
        "libcamera" => {
            list_libcamera_cameras().await?;
            Ok(CameraHandle { label: "libcamera".to_string(), device: None })
        }
        "none" => Ok(CameraHandle { label: "none".to_string(), device: None }),
        other => Err(CameraError::CameraInitFailure(format!("unknown camera.mode: {}", other))),
    }
}

fn open_device(path: &str) -> Result<std::fs::File, CameraError> {
    std::fs::OpenOptions::new().read(true).write(true).open(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CameraError::NoCameraAvailable,
        ErrorKind::PermissionDenied => CameraError::PermissionDenied(path.to_string()),
        _ => CameraError::CameraInitFailure(format!("open {}: {}", path, e)),
    })
}

// `libcamera-hello --list-cameras` prints the sensors it finds, or
// "No cameras available!" and still exits 0.
async fn list_libcamera_cameras() -> Result<(), CameraError> {
    debug!("camera: libcamera-hello --list-cameras");
    let out = Command::new("libcamera-hello")
        .arg("--list-cameras")
        .output()
        .await
        .map_err(|e| CameraError::CameraInitFailure(format!("run libcamera-hello: {}", e)))?;
    let text = format!("{}{}", String::from_utf8_lossy(&out.stdout), String::from_utf8_lossy(&out.stderr));
    if text.contains("No cameras available") {
        return Err(CameraError::NoCameraAvailable);
    }
    if !out.status.success() {
        return Err(CameraError::CameraInitFailure(format!("libcamera-hello exited with {}", out.status)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(mode: &str, device: &str) -> CameraConfig {
        CameraConfig { mode: mode.into(), device: device.into(), width: 1280, height: 720, fps: 30 }
    }

    #[tokio::test]
    async fn headless_camera() {
        let h = open(&cfg("none", "")).await.unwrap();
        assert!(h.is_headless());
        assert!(!h.holds_device());
    }

    #[tokio::test]
    async fn missing_device_is_no_camera() {
        let err = open(&cfg("v4l2", "/dev/qibla-no-such-video")).await.unwrap_err();
        assert_eq!(err, CameraError::NoCameraAvailable);
        assert_eq!(check_permission(&cfg("v4l2", "/dev/qibla-no-such-video")), Err(CameraError::NoCameraAvailable));
    }

    #[tokio::test]
    async fn unknown_mode_and_bad_geometry() {
        assert!(matches!(open(&cfg("webrtc", "")).await, Err(CameraError::CameraInitFailure(_))));
        let mut c = cfg("v4l2", "/dev/video0");
        c.fps = 0;
        assert!(matches!(open(&c).await, Err(CameraError::CameraInitFailure(_))));
    }

    #[test]
    fn non_v4l2_needs_no_device_permission() {
        assert!(check_permission(&cfg("libcamera", "")).is_ok());
    }
}
