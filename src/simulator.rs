// src/simulator.rs
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::drivers::{LineSource, ReaderError};
use crate::types::{RawRecord, ReferenceMaxima, CHANNELS};

/// Fraction of a channel's range used as random jitter.
const JITTER: f64 = 0.01;

/// Stands in for the sensor board: emits `frame,r,g,b` lines whose channels
/// sweep slowly between zero and their reference maximum.
pub struct SimulatedSensor {
    frame: u64,
    phase: f64,
    maxima: ReferenceMaxima,
    period: Duration,
    rng: StdRng,
}

impl SimulatedSensor {
    pub fn new(maxima: ReferenceMaxima, period: Duration, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            frame: 0,
            phase: 0.0,
            maxima,
            period,
            rng,
        }
    }

    fn next_record(&mut self) -> RawRecord {
        self.phase += 0.1;
        let mut readings = [0u32; CHANNELS];
        for (i, reading) in readings.iter_mut().enumerate() {
            let max = f64::from(self.maxima.get(i));
            let wave = 0.5 + 0.5 * (self.phase * (i as f64 * 0.1 + 1.0)).sin();
            let noise = self.rng.gen_range(-JITTER..=JITTER);
            *reading = ((wave + noise) * max).clamp(0.0, max).round() as u32;
        }
        let record = RawRecord {
            marker: self.frame as i64,
            readings,
        };
        self.frame += 1;
        record
    }
}

impl LineSource for SimulatedSensor {
    fn next_line(&mut self) -> Result<String, ReaderError> {
        if !self.period.is_zero() {
            thread::sleep(self.period);
        }
        let RawRecord { marker, readings } = self.next_record();
        let [r, g, b] = readings;
        Ok(format!("{marker},{r},{g},{b}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::parse_record;

    fn sensor(seed: u64) -> SimulatedSensor {
        SimulatedSensor::new(ReferenceMaxima::DEFAULT, Duration::ZERO, Some(seed))
    }

    #[test]
    fn lines_parse_and_stay_in_range() {
        let mut sim = sensor(7);
        for frame in 0..200 {
            let record = parse_record(&sim.next_line().unwrap()).unwrap();
            assert_eq!(record.marker, frame);
            for (i, &reading) in record.readings.iter().enumerate() {
                assert!(reading <= ReferenceMaxima::DEFAULT.get(i));
            }
        }
    }

    #[test]
    fn same_seed_same_stream() {
        let (mut a, mut b) = (sensor(42), sensor(42));
        for _ in 0..20 {
            assert_eq!(a.next_line().unwrap(), b.next_line().unwrap());
        }
    }
}
