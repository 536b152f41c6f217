use crate::drivers::error::ReaderError;
use crate::drivers::normalizer::{parse_record, Normalizer};
use crate::drivers::source::LineSource;
use crate::types::{RawRecord, Sample};

/// Pulls one line per call from a source and turns it into a [`Sample`].
pub struct SamplePipeline<S: LineSource> {
    source: S,
    normalizer: Normalizer,
}

impl<S: LineSource> SamplePipeline<S> {
    pub fn new(source: S, normalizer: Normalizer) -> Self {
        Self { source, normalizer }
    }

    /// Reads and parses exactly one line without scaling it.
    pub fn next_record(&mut self) -> Result<RawRecord, ReaderError> {
        let line = self.source.next_line()?;
        parse_record(&line).map_err(|source| ReaderError::Parse { line, source })
    }

    pub fn pump_once(&mut self) -> Result<Sample, ReaderError> {
        let record = self.next_record()?;
        Ok(Sample {
            record,
            color: self.normalizer.normalize(&record),
        })
    }
}
