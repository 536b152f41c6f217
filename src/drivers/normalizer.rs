use crate::drivers::error::ParseError;
use crate::types::{NormalizedColor, RawRecord, ReferenceMaxima, CHANNELS, FULL_SCALE};

const FIELDS: usize = CHANNELS + 1;

/// Parses `marker,v0,v1,v2`. Surrounding whitespace on each field is ignored
/// and fields past the fourth are dropped.
pub fn parse_record(line: &str) -> Result<RawRecord, ParseError> {
    if !line.is_ascii() {
        return Err(ParseError::NonAscii);
    }
    let tokens: Vec<&str> = line
        .trim_end_matches(['\r', '\n'])
        .split(',')
        .collect();
    if tokens.len() < FIELDS {
        return Err(ParseError::TooFewFields {
            found: tokens.len(),
        });
    }
    let invalid = |index: usize| ParseError::InvalidInteger {
        index,
        token: tokens[index].to_string(),
    };
    let marker = tokens[0].trim().parse::<i64>().map_err(|_| invalid(0))?;
    let mut readings = [0u32; CHANNELS];
    for (channel, reading) in readings.iter_mut().enumerate() {
        let index = channel + 1;
        *reading = tokens[index].trim().parse().map_err(|_| invalid(index))?;
    }
    if tokens.len() > FIELDS {
        log::trace!("ignoring {} trailing field(s)", tokens.len() - FIELDS);
    }
    Ok(RawRecord { marker, readings })
}

/// Rescales raw readings against per-channel reference maxima.
#[derive(Clone, Copy, Debug, Default)]
pub struct Normalizer {
    maxima: ReferenceMaxima,
}

impl Normalizer {
    pub fn new(maxima: ReferenceMaxima) -> Self {
        Self { maxima }
    }

    pub fn normalize(&self, record: &RawRecord) -> NormalizedColor {
        let mut out = [0.0f64; CHANNELS];
        for (channel, value) in out.iter_mut().enumerate() {
            let reading = f64::from(record.readings[channel]);
            let maximum = f64::from(self.maxima.get(channel));
            *value = reading / maximum * FULL_SCALE;
        }
        NormalizedColor(out)
    }

    #[cfg(test)]
    pub fn normalize_line(&self, line: &str) -> Result<NormalizedColor, ParseError> {
        parse_record(line).map(|record| self.normalize(&record))
    }
}
