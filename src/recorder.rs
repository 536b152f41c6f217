use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Instant;

use anyhow::{Context, Result};

use crate::engine::ColorSink;
use crate::types::Sample;

const HEADER: &str = "Timestamp,Marker,Raw0,Raw1,Raw2,R,G,B";

/// Appends one CSV row per sample; timestamps are seconds since the
/// recorder was created.
pub struct DataRecorder<W: Write> {
    writer: W,
    start_time: Instant,
}

impl DataRecorder<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create recording {}", path.display()))?;
        log::info!("recording samples to {}", path.display());
        Self::new(BufWriter::new(file))
    }
}

impl<W: Write> DataRecorder<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writeln!(writer, "{HEADER}")?;
        Ok(Self {
            writer,
            start_time: Instant::now(),
        })
    }

    pub fn write_record(&mut self, sample: &Sample) -> Result<()> {
        let t = self.start_time.elapsed().as_secs_f64();
        let [raw0, raw1, raw2] = sample.record.readings;
        let [r, g, b] = sample.color.0;
        writeln!(
            self.writer,
            "{t:.4},{},{raw0},{raw1},{raw2},{r:.2},{g:.2},{b:.2}",
            sample.record.marker
        )?;
        Ok(())
    }
}

impl<W: Write> ColorSink for DataRecorder<W> {
    fn publish(&mut self, sample: &Sample) -> Result<()> {
        self.write_record(sample)
    }
}

impl<W: Write> Drop for DataRecorder<W> {
    fn drop(&mut self) {
        if let Err(e) = self.writer.flush() {
            log::warn!("failed to flush recording: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Normalizer;
    use std::fs;

    fn sample(line: &str) -> Sample {
        let record = crate::drivers::parse_record(line).unwrap();
        Sample {
            record,
            color: Normalizer::default().normalize(&record),
        }
    }

    #[test]
    fn writes_header_and_rows() {
        let mut buf = Vec::new();
        {
            let mut recorder = DataRecorder::new(&mut buf).unwrap();
            recorder.write_record(&sample("7,1385,1030,705")).unwrap();
        }
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some(HEADER));
        let row: Vec<&str> = lines.next().unwrap().split(',').collect();
        assert_eq!(&row[1..], ["7", "1385", "1030", "705", "127.50", "127.50", "127.50"]);
        assert!(row[0].parse::<f64>().is_ok());
    }

    #[test]
    fn file_is_flushed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("colors.csv");
        {
            let mut recorder = DataRecorder::create(&path).unwrap();
            recorder.publish(&sample("0,0,0,0")).unwrap();
        }
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().ends_with(",0,0,0,0,0.00,0.00,0.00"));
    }
}
