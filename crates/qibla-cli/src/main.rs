mod session;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use qibla_camera::CameraConfig;
use qibla_nav::{doctor, source, view};
use qibla_nav::{compute_bearing, format_distance, BearingEngine, GeoPoint, HeadingSample, PositionSample, Target};
use qibla_proto::SessionStatus;

use session::{FrameWriter, Session, SourceSpec, StartPlan};

#[derive(Debug, Parser)]
#[command(name = "qibla", version, about = "Qibla AR compass - bearing toward the Kaaba from live GNSS + compass")]
struct Cli {
    /// Required by `run` and `doctor`.
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate the configuration file.
    Doctor,
    /// One-shot bearing from a given position.
    Bearing {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        #[arg(long, allow_hyphen_values = true)]
        heading: Option<f64>,
    },
    /// Live session: read both sensor streams and print overlay frames.
    Run {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, serde::Deserialize)]
struct Config {
    target: Option<TargetCfg>,
    location: LocationCfg,
    heading: HeadingCfg,
    camera: Option<CameraConfig>,
    display: Option<DisplayCfg>,
}

#[derive(Debug, serde::Deserialize)]
struct TargetCfg { name: String, lat: f64, lon: f64 }

#[derive(Debug, serde::Deserialize)]
struct LocationCfg {
    source: String,
    nmea_device: Option<String>,
    nmea_file: Option<String>,
    baud: Option<u32>,
}

#[derive(Debug, serde::Deserialize)]
struct HeadingCfg {
    source: String,
    nmea_device: Option<String>,
    nmea_file: Option<String>,
    baud: Option<u32>,
    #[serde(default)]
    assume_north_when_missing: bool,
}

#[derive(Debug, serde::Deserialize)]
struct DisplayCfg { screen_width_px: u32 }

const DEFAULT_SCREEN_WIDTH_PX: u32 = 1080;

fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).context("read config")?;
    Ok(toml::from_str(&s).context("parse config toml")?)
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries frames; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Doctor => doctor_cmd(&load_config(cli.config.as_deref().context("--config is required")?)?)?,
        Command::Bearing { lat, lon, heading } => {
            let cfg = cli.config.as_deref().map(load_config).transpose()?;
            bearing_cmd(cfg.as_ref(), lat, lon, heading)?
        }
        Command::Run { json } => run(&load_config(cli.config.as_deref().context("--config is required")?)?, json).await?,
    }
    Ok(())
}

fn doctor_cmd(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    if let Some(t) = &cfg.target {
        doctor::check_target(&t.name, t.lat, t.lon)?;
    }
    let l = &cfg.location;
    doctor::check_nmea_source("location", &l.source, l.nmea_device.as_deref(), l.nmea_file.as_deref(), l.baud.unwrap_or(source::DEFAULT_BAUD))?;

    let h = &cfg.heading;
    if h.source == "location" {
        info!("doctor: heading shares the location stream");
    } else {
        doctor::check_nmea_source("heading", &h.source, h.nmea_device.as_deref(), h.nmea_file.as_deref(), h.baud.unwrap_or(source::DEFAULT_BAUD))?;
    }
    if h.assume_north_when_missing {
        info!("doctor: heading.assume_north_when_missing=true, missing compass reads as 0 degrees");
    }

    if let Some(cam) = &cfg.camera {
        anyhow::ensure!(["v4l2", "libcamera", "none"].contains(&cam.mode.as_str()), "unknown camera.mode: {}", cam.mode);
        if cam.mode == "v4l2" {
            anyhow::ensure!(!cam.device.is_empty(), "camera.device missing");
        }
        if cam.mode != "none" {
            anyhow::ensure!(cam.width > 0 && cam.height > 0 && cam.fps > 0, "camera geometry invalid");
        }
    }
    if let Some(d) = &cfg.display {
        doctor::check_screen_width(d.screen_width_px)?;
    }

    info!("doctor: OK");
    Ok(())
}

fn bearing_cmd(cfg: Option<&Config>, lat: f64, lon: f64, heading: Option<f64>) -> Result<()> {
    let target = match cfg {
        Some(c) => resolve_target(c)?,
        None => Target::kaaba(),
    };
    let here = PositionSample::new(GeoPoint::new(lat, lon)?);
    let r = compute_bearing(&here, &HeadingSample::new(heading.unwrap_or(0.0)), &target)?;

    println!("target: {}", target.name());
    println!("bearing: {:.2}°", r.target_bearing_deg);
    println!("distance: {}", format_distance(r.distance_m));
    if heading.is_some() {
        println!("relative: {:.2}°", r.relative_angle_deg);
        println!("facing: {}", r.is_facing_target);
        println!("{}", view::instruction(&r, target.name()));
    }
    Ok(())
}

fn resolve_target(cfg: &Config) -> Result<Target> {
    match &cfg.target {
        Some(t) => Ok(Target::new(t.name.clone(), GeoPoint::new(t.lat, t.lon).context("target")?)?),
        None => Ok(Target::kaaba()),
    }
}

fn source_spec(section: &str, kind: &str, device: Option<&String>, file: Option<&String>, baud: Option<u32>) -> Result<SourceSpec> {
    match kind {
        "nmea-serial" => Ok(SourceSpec::Serial {
            dev: device.with_context(|| format!("{}.nmea_device missing", section))?.clone(),
            baud: baud.unwrap_or(source::DEFAULT_BAUD),
        }),
        "nmea-file" => Ok(SourceSpec::File {
            path: file.with_context(|| format!("{}.nmea_file missing", section))?.clone(),
        }),
        other => anyhow::bail!("unknown {}.source: {}", section, other),
    }
}

fn start_plan(cfg: &Config) -> Result<StartPlan> {
    let l = &cfg.location;
    let location = source_spec("location", &l.source, l.nmea_device.as_ref(), l.nmea_file.as_ref(), l.baud)?;
    let h = &cfg.heading;
    let heading = match h.source.as_str() {
        "location" => None,
        s => Some(source_spec("heading", s, h.nmea_device.as_ref(), h.nmea_file.as_ref(), h.baud)?),
    };
    Ok(StartPlan { location, heading, camera: cfg.camera.clone() })
}

async fn run(cfg: &Config, json: bool) -> Result<()> {
    info!("run: starting");

    let engine = BearingEngine::new(resolve_target(cfg)?)
        .assume_north_when_missing(cfg.heading.assume_north_when_missing);
    let width = cfg.display.as_ref().map(|d| d.screen_width_px).unwrap_or(DEFAULT_SCREEN_WIDTH_PX);
    let plan = start_plan(cfg)?;

    let mut session = Session::new(engine, width, FrameWriter::new(std::io::stdout(), json));
    session.set_status(SessionStatus::Starting)?;

    let mut running = session.start(&plan).await?;
    if let Some(cam) = &running.camera {
        info!("run: camera {}", cam.label());
    }

    let stop = wait_for_stop(tokio::signal::ctrl_c());
    let res = session.pump(&mut running.events, stop).await;

    running.hub.shutdown();
    drop(running);
    info!("run: stopped");
    res?;
    if session.status().is_terminal() {
        anyhow::bail!("{}", session.status());
    }
    Ok(())
}

/// Resolves when the signal fires. If the handler cannot be installed the
/// session runs until its streams end instead of stopping at once.
async fn wait_for_stop(signal: impl std::future::Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!("ctrl-c handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}
