use std::future::Future;
use std::io::{ErrorKind, Write};

use anyhow::{Context, Result};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use qibla_camera::{CameraConfig, CameraError, CameraHandle};
use qibla_nav::bearing::{format_distance, normalize_heading};
use qibla_nav::hub::{HubEvent, SensorHub};
use qibla_nav::nmea::{SensorEvent, StreamKind};
use qibla_nav::source::NmeaSource;
use qibla_nav::view::{indicator_offset, instruction, ViewState};
use qibla_nav::{BearingEngine, Reading};
use qibla_proto::{OverlayFrame, SessionStatus};

/// Start-up failures. Each one halts the session and stays on the status line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("No camera available")]
    NoCameraAvailable,
    #[error("Camera init failed: {0}")]
    CameraInitFailure(String),
    #[error("sensor unavailable: {0}")]
    SensorUnavailable(String),
}

impl SessionError {
    pub fn status(&self) -> SessionStatus {
        match self {
            SessionError::PermissionDenied(what) => SessionStatus::PermissionDenied(what.clone()),
            other => SessionStatus::Failed(other.to_string()),
        }
    }
}

impl From<CameraError> for SessionError {
    fn from(e: CameraError) -> Self {
        match e {
            CameraError::NoCameraAvailable => SessionError::NoCameraAvailable,
            CameraError::PermissionDenied(dev) => SessionError::PermissionDenied(format!("camera {}", dev)),
            CameraError::CameraInitFailure(msg) => SessionError::CameraInitFailure(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    Serial { dev: String, baud: u32 },
    File { path: String },
}

impl SourceSpec {
    fn path(&self) -> &str {
        match self {
            SourceSpec::Serial { dev, .. } => dev,
            SourceSpec::File { path } => path,
        }
    }

    fn open(&self) -> Result<NmeaSource> {
        match self {
            SourceSpec::Serial { dev, baud } => NmeaSource::serial(dev, *baud),
            SourceSpec::File { path } => NmeaSource::file(path),
        }
    }
}

/// What the session needs to acquire, resolved from config.
#[derive(Debug, Clone)]
pub struct StartPlan {
    pub location: SourceSpec,
    /// `None` when the location stream also carries headings.
    pub heading: Option<SourceSpec>,
    pub camera: Option<CameraConfig>,
}

/// Resources held while the session runs. Dropping this unsubscribes both
/// streams and releases the camera.
pub struct Running {
    pub hub: SensorHub,
    pub events: mpsc::Receiver<HubEvent>,
    pub camera: Option<CameraHandle>,
}

pub async fn check_read_access(what: &str, path: &str) -> Result<(), SessionError> {
    tokio::fs::File::open(path).await.map(drop).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => SessionError::PermissionDenied(format!("{} {}", what, path)),
        _ => SessionError::SensorUnavailable(format!("{} {}: {}", what, path, e)),
    })
}

pub struct FrameWriter<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(out: W, json: bool) -> Self { Self { out, json } }

    pub fn write(&mut self, frame: &OverlayFrame) -> Result<()> {
        let line = if self.json { frame.to_json_line().context("encode frame")? } else { frame.to_text_line() };
        writeln!(self.out, "{}", line).context("write frame")?;
        self.out.flush().context("flush frame")
    }

    pub fn into_inner(self) -> W { self.out }
}

/// Single consumer of both sensor streams. Every accepted sample triggers one
/// recompute and one frame.
pub struct Session<W: Write> {
    engine: BearingEngine,
    screen_width_px: f64,
    status: SessionStatus,
    out: FrameWriter<W>,
}

impl<W: Write> Session<W> {
    pub fn new(engine: BearingEngine, screen_width_px: u32, out: FrameWriter<W>) -> Self {
        Self { engine, screen_width_px: screen_width_px as f64, status: SessionStatus::Starting, out }
    }

    pub fn status(&self) -> &SessionStatus { &self.status }

    pub fn set_status(&mut self, status: SessionStatus) -> Result<()> {
        info!("status: {}", status);
        self.status = status;
        let frame = self.frame();
        self.out.write(&frame)
    }

    /// Walks the start-up stages. Anything acquired before a failure is
    /// dropped on the way out.
    pub async fn start(&mut self, plan: &StartPlan) -> Result<Running> {
        match self.acquire(plan).await {
            Ok(running) => {
                self.set_status(SessionStatus::ArReady)?;
                Ok(running)
            }
            Err(e) => {
                self.set_status(e.status())?;
                Err(e.into())
            }
        }
    }

    async fn acquire(&mut self, plan: &StartPlan) -> Result<Running, SessionError> {
        self.set_status(SessionStatus::CheckingPermissions).map_err(io_failure)?;
        check_read_access("location", plan.location.path()).await?;
        if let Some(h) = &plan.heading {
            check_read_access("heading", h.path()).await?;
        }
        if let Some(cam) = &plan.camera {
            qibla_camera::camera::check_permission(cam)?;
        }

        self.set_status(SessionStatus::CameraInitializing).map_err(io_failure)?;
        let camera = match &plan.camera {
            Some(cfg) => Some(qibla_camera::open(cfg).await?),
            None => None,
        };

        let (mut hub, events) = SensorHub::new(64);
        let open = |spec: &SourceSpec| spec.open().map_err(|e| SessionError::SensorUnavailable(format!("{:#}", e)));
        match &plan.heading {
            Some(h) => {
                hub.subscribe(&[StreamKind::Position], open(&plan.location)?);
                hub.subscribe(&[StreamKind::Heading], open(h)?);
            }
            None => hub.subscribe(&[StreamKind::Position, StreamKind::Heading], open(&plan.location)?),
        }

        Ok(Running { hub, events, camera })
    }

    pub fn on_event(&mut self, ev: SensorEvent) -> Result<()> {
        let res = match ev {
            SensorEvent::Position(p) => self.engine.update_position(p),
            SensorEvent::Heading(h) => self.engine.update_heading(h),
        };
        match res {
            Ok(_) => {
                let frame = self.frame();
                self.out.write(&frame)
            }
            Err(e) => {
                warn!("skipping sample: {}", e);
                Ok(())
            }
        }
    }

    /// Runs until a sensor stream ends, the hub goes away or `stop` resolves.
    /// A stream that ends on its own leaves the session failed.
    pub async fn pump(&mut self, events: &mut mpsc::Receiver<HubEvent>, stop: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(stop);
        loop {
            tokio::select! {
                ev = events.recv() => match ev {
                    Some(HubEvent::Sample(ev)) => self.on_event(ev)?,
                    Some(HubEvent::Ended { source, reason }) => {
                        warn!("sensor {} stopped: {}", source, reason);
                        let e = SessionError::SensorUnavailable(format!("{}: {}", source, reason));
                        self.set_status(e.status())?;
                        return Ok(());
                    }
                    None => {
                        info!("sensor streams ended");
                        return Ok(());
                    }
                },
                _ = &mut stop => {
                    info!("stop requested");
                    return Ok(());
                }
            }
        }
    }

    pub fn frame(&self) -> OverlayFrame {
        let now_ms = (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64;
        let target = self.engine.target().name();
        let mut f = OverlayFrame::new(now_ms, self.status.clone(), target);

        if let Some(p) = self.engine.position() {
            f.lat = Some(p.point.lat());
            f.lon = Some(p.point.lon());
        }
        f.heading_deg = self.engine.heading().and_then(|h| normalize_heading(h.deg).ok());

        match self.engine.reading() {
            Reading::AwaitingPosition => {}
            Reading::AwaitingHeading { target_bearing_deg, distance_m } => {
                f.target_bearing_deg = Some(target_bearing_deg);
                f.distance = Some(format_distance(distance_m));
            }
            Reading::Ready(r) => {
                let view = ViewState::classify(&r);
                f.target_bearing_deg = Some(r.target_bearing_deg);
                f.relative_angle_deg = Some(r.relative_angle_deg);
                f.facing = Some(r.is_facing_target);
                f.distance = Some(format_distance(r.distance_m));
                f.view = Some(format!("{:?}", view));
                if view.is_on_screen() {
                    f.indicator_offset_px = Some(indicator_offset(r.relative_angle_deg, self.screen_width_px));
                }
                f.instruction = Some(instruction(&r, target));
            }
        }
        f
    }

    pub fn into_writer(self) -> W { self.out.into_inner() }
}

fn io_failure(e: anyhow::Error) -> SessionError {
    SessionError::SensorUnavailable(format!("status output: {:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use qibla_nav::{GeoPoint, HeadingSample, PositionSample, Target};

    fn session(json: bool) -> Session<Vec<u8>> {
        Session::new(BearingEngine::new(Target::kaaba()), 1080, FrameWriter::new(Vec::new(), json))
    }

    fn lines(s: Session<Vec<u8>>) -> Vec<String> {
        String::from_utf8(s.into_writer()).unwrap().lines().map(str::to_string).collect()
    }

    fn at(lat: f64, lon: f64) -> SensorEvent {
        SensorEvent::Position(PositionSample::new(GeoPoint::new(lat, lon).unwrap()))
    }

    #[test]
    fn error_status_mapping() {
        assert_eq!(SessionError::from(CameraError::NoCameraAvailable).status(), SessionStatus::Failed("No camera available".into()));
        assert_eq!(
            SessionError::from(CameraError::PermissionDenied("/dev/video0".into())).status(),
            SessionStatus::PermissionDenied("camera /dev/video0".into())
        );
        assert!(matches!(
            SessionError::from(CameraError::CameraInitFailure("busy".into())).status(),
            SessionStatus::Failed(msg) if msg == "Camera init failed: busy"
        ));
    }

    #[tokio::test]
    async fn missing_sensor_device() {
        let err = check_read_access("location", "/nonexistent/ttyACM9").await.unwrap_err();
        assert!(matches!(err, SessionError::SensorUnavailable(_)));
    }

    #[test]
    fn frames_follow_readiness() {
        let mut s = session(false);
        s.set_status(SessionStatus::ArReady).unwrap();
        s.on_event(SensorEvent::Heading(HeadingSample::new(0.0))).unwrap();
        s.on_event(at(21.0, 39.0)).unwrap();
        s.on_event(SensorEvent::Heading(HeadingSample::new(40.0))).unwrap();

        let out = lines(s);
        assert_eq!(out.len(), 4);
        assert_eq!(out[0], "AR Ready…");
        assert_eq!(out[1], "AR Ready…");
        assert_eq!(out[2], "AR Ready… | (Qibla) Al Kaaba 61.1° | Turn right 61° | 98 KM");
        assert_eq!(out[3], "AR Ready… | (Qibla) Al Kaaba 61.1° | Almost there, 21° right | 98 KM");
    }

    #[test]
    fn heading_missing_shows_partial_frame() {
        let mut s = session(false);
        s.set_status(SessionStatus::ArReady).unwrap();
        s.on_event(at(21.0, 39.0)).unwrap();
        let f = s.frame();
        assert!(f.relative_angle_deg.is_none());
        assert_eq!(f.distance.as_deref(), Some("98 KM"));
        assert_eq!(lines(s)[1], "AR Ready… | (Qibla) Al Kaaba 61.1° | waiting for compass | 98 KM");
    }

    #[test]
    fn bad_sample_is_skipped() {
        let mut s = session(true);
        s.on_event(at(21.0, 39.0)).unwrap();
        s.on_event(SensorEvent::Position(PositionSample::new(GeoPoint::new_unchecked(f64::NAN, 0.0)))).unwrap();
        s.on_event(SensorEvent::Heading(HeadingSample::new(61.0))).unwrap();

        let out = lines(s);
        assert_eq!(out.len(), 2);
        let last: OverlayFrame = serde_json::from_str(&out[1]).unwrap();
        assert_eq!(last.facing, Some(true));
        assert_eq!(last.view.as_deref(), Some("OnScreenAligned"));
        assert_eq!(last.instruction.as_deref(), Some("Facing (Qibla) Al Kaaba"));
        let offset = last.indicator_offset_px.unwrap();
        assert!(offset > 0.0 && offset < 2.0 * 12.0);
    }

    #[tokio::test]
    async fn failed_start_reports_and_releases() {
        let mut s = session(false);
        let plan = StartPlan {
            location: SourceSpec::File { path: "/nonexistent/walk.nmea".into() },
            heading: None,
            camera: None,
        };
        assert!(s.start(&plan).await.is_err());
        assert!(s.status().is_terminal());
        let out = lines(s);
        assert_eq!(out[0], "Checking permissions…");
        assert!(out[1].starts_with("sensor unavailable: location /nonexistent/walk.nmea"));
    }

    #[test]
    fn published_heading_is_normalized() {
        let mut s = session(true);
        s.on_event(SensorEvent::Heading(HeadingSample::new(-3.0))).unwrap();
        assert_eq!(s.frame().heading_deg, Some(357.0));
        s.on_event(SensorEvent::Heading(HeadingSample::new(365.0))).unwrap();
        assert_eq!(s.frame().heading_deg, Some(5.0));
    }

    const WALK: &[u8] = b"$GNRMC,101500,A,2100.000,N,03900.000,E,0.0,0.0,181026,,*03\n$HEHDT,274.07,T*19\n";

    #[tokio::test]
    async fn pump_ends_when_stream_ends_with_hub_alive() {
        let (mut hub, mut rx) = SensorHub::new(8);
        hub.subscribe(&[StreamKind::Position, StreamKind::Heading], NmeaSource::reader(WALK, "walk"));

        let mut s = session(true);
        s.set_status(SessionStatus::ArReady).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), s.pump(&mut rx, std::future::pending()))
            .await
            .expect("pump should return once the stream ends")
            .unwrap();

        assert_eq!(s.status(), &SessionStatus::Failed("sensor unavailable: walk: stream ended".into()));
        assert_eq!(hub.active(), 1);

        let out = lines(s);
        assert_eq!(out.len(), 4);
        let last_sample: OverlayFrame = serde_json::from_str(&out[2]).unwrap();
        assert_eq!(last_sample.view.as_deref(), Some("OffScreenRight"));
        assert_eq!(last_sample.instruction.as_deref(), Some("Turn right 147°"));
        assert_eq!(last_sample.heading_deg, Some(274.07));
        let last: OverlayFrame = serde_json::from_str(&out[3]).unwrap();
        assert_eq!(last.status_text, "sensor unavailable: walk: stream ended");
        assert_eq!(last.instruction.as_deref(), Some("Turn right 147°"));
    }

    #[tokio::test]
    async fn pump_returns_on_stop() {
        let (_hub, mut rx) = SensorHub::new(8);
        let mut s = session(false);
        s.set_status(SessionStatus::ArReady).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(2), s.pump(&mut rx, async {}))
            .await
            .expect("stop should end the pump")
            .unwrap();
        assert_eq!(s.status(), &SessionStatus::ArReady);
        assert_eq!(lines(s), vec!["AR Ready…".to_string()]);
    }
}
