use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::nmea::{NmeaParser, SensorEvent};

pub const DEFAULT_BAUD: u32 = 115200;

enum Input {
    Serial(BufReader<SerialStream>),
    /// Tailed: EOF means "wait for more", like a log being appended to.
    File(BufReader<File>),
    Reader(Box<dyn AsyncBufRead + Send + Unpin>),
}

/// A line-oriented NMEA stream with its own parser state.
pub struct NmeaSource {
    input: Input,
    parser: NmeaParser,
    label: String,
}

impl NmeaSource {
    pub fn serial(dev: &str, baud: u32) -> Result<Self> {
        let port = tokio_serial::new(dev, baud).open_native_async()
            .with_context(|| format!("open serial {}", dev))?;
        Ok(Self::with_input(Input::Serial(BufReader::new(port)), dev))
    }

    pub fn file(path: &str) -> Result<Self> {
        let f = std::fs::File::open(path).with_context(|| format!("open nmea file {}", path))?;
        let f = File::from_std(f);
        Ok(Self::with_input(Input::File(BufReader::new(f)), path))
    }

    /// Any buffered reader; the stream ends at EOF.
    pub fn reader(r: impl AsyncBufRead + Send + Unpin + 'static, label: &str) -> Self {
        Self::with_input(Input::Reader(Box::new(r)), label)
    }

    fn with_input(input: Input, label: &str) -> Self {
        Self { input, parser: NmeaParser::new(), label: label.to_string() }
    }

    pub fn label(&self) -> &str { &self.label }

    /// Next parsed event, or `None` once a non-tailed input is exhausted.
    pub async fn next_event(&mut self) -> Result<Option<SensorEvent>> {
        let mut line = String::new();
        loop {
            line.clear();
            let n = match &mut self.input {
                Input::Serial(r) => r.read_line(&mut line).await?,
                Input::File(r) => r.read_line(&mut line).await?,
                Input::Reader(r) => r.read_line(&mut line).await?,
            };
            if n == 0 {
                match self.input {
                    Input::Reader(_) => return Ok(None),
                    _ => {
                        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                        continue;
                    }
                }
            }
            if let Some(ev) = self.parser.parse_line(&line) {
                return Ok(Some(ev));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nmea::StreamKind;

    #[tokio::test]
    async fn reader_yields_events_then_ends() {
        let data: &'static [u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n\
garbage\r\n\
$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n\
$HEHDT,274.07,T*19\r\n";
        let mut src = NmeaSource::reader(data, "mem");
        assert_eq!(src.label(), "mem");
        assert_eq!(src.next_event().await.unwrap().unwrap().kind(), StreamKind::Position);
        assert_eq!(src.next_event().await.unwrap().unwrap().kind(), StreamKind::Heading);
        assert!(src.next_event().await.unwrap().is_none());
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = NmeaSource::file("/nonexistent/track.nmea").err().unwrap();
        assert!(format!("{:#}", err).contains("open nmea file"));
    }
}
