use anyhow::Result;

use crate::geo::GeoPoint;

pub fn check_target(name: &str, lat: f64, lon: f64) -> Result<()> {
    anyhow::ensure!(!name.trim().is_empty(), "target.name is empty");
    anyhow::ensure!(GeoPoint::new(lat, lon).is_ok(), "target coordinates invalid ({}, {})", lat, lon);
    Ok(())
}

/// `source` must name a transport whose companion field is set.
pub fn check_nmea_source(section: &str, source: &str, device: Option<&str>, file: Option<&str>, baud: u32) -> Result<()> {
    match source {
        "nmea-serial" => {
            anyhow::ensure!(device.map(|d| !d.is_empty()).unwrap_or(false), "{}.nmea_device missing", section);
            anyhow::ensure!(baud >= 4800, "{}.baud too low", section);
        }
        "nmea-file" => {
            anyhow::ensure!(file.map(|f| !f.is_empty()).unwrap_or(false), "{}.nmea_file missing", section);
        }
        other => anyhow::bail!("unknown {}.source: {}", section, other),
    }
    Ok(())
}

pub fn check_screen_width(px: u32) -> Result<()> {
    anyhow::ensure!(px >= 90, "display.screen_width_px too small");
    Ok(())
}
