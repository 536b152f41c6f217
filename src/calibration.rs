use serde::Serialize;

use crate::types::{RawRecord, ReferenceMaxima, CHANNELS};

/// Running per-channel maximum over observed raw readings.
#[derive(Clone, Debug, Default)]
pub struct CalibrationTracker {
    maxima: [u32; CHANNELS],
    samples: usize,
}

/// What `calibrate` prints; pastes straight into the config file's
/// `calibration` section.
#[derive(Serialize, Debug, PartialEq, Eq)]
pub struct CalibrationReport {
    pub samples: usize,
    pub observed_maxima: [u32; CHANNELS],
    pub reference_maxima: Option<[u32; CHANNELS]>,
}

impl CalibrationTracker {
    pub fn observe(&mut self, record: &RawRecord) {
        for (max, &reading) in self.maxima.iter_mut().zip(&record.readings) {
            *max = (*max).max(reading);
        }
        self.samples += 1;
    }

    /// `None` until every channel has seen a non-zero reading.
    pub fn suggest(&self) -> Option<ReferenceMaxima> {
        ReferenceMaxima::new(self.maxima).ok()
    }

    pub fn report(&self) -> CalibrationReport {
        CalibrationReport {
            samples: self.samples,
            observed_maxima: self.maxima,
            reference_maxima: self.suggest().map(|m| m.as_array()),
        }
    }
}
