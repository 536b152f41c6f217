// src/config.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ReferenceMaxima, CHANNELS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unknown calibration profile {0:?}")]
    UnknownProfile(String),
    #[error("reference maximum for channel {channel} must be greater than zero")]
    ZeroMaximum { channel: usize },
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ParitySetting {
    #[default]
    None,
    Odd,
    Even,
}

impl From<ParitySetting> for serialport::Parity {
    fn from(value: ParitySetting) -> Self {
        match value {
            ParitySetting::None => serialport::Parity::None,
            ParitySetting::Odd => serialport::Parity::Odd,
            ParitySetting::Even => serialport::Parity::Even,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerialConfig {
    pub port: String,
    pub baud_rate: u32,
    pub parity: ParitySetting,
    pub data_bits: u8,
    pub stop_bits: u8,
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        let port = if cfg!(windows) { "COM10" } else { "/dev/ttyUSB0" };
        Self {
            port: port.to_string(),
            baud_rate: 19_200,
            parity: ParitySetting::None,
            data_bits: 8,
            stop_bits: 1,
            timeout_ms: 3_000,
        }
    }
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn serial_data_bits(&self) -> Result<serialport::DataBits, serialport::Error> {
        use serialport::DataBits;
        match self.data_bits {
            5 => Ok(DataBits::Five),
            6 => Ok(DataBits::Six),
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            n => Err(invalid_input(format!("unsupported data bits: {n}"))),
        }
    }

    pub fn serial_stop_bits(&self) -> Result<serialport::StopBits, serialport::Error> {
        use serialport::StopBits;
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            n => Err(invalid_input(format!("unsupported stop bits: {n}"))),
        }
    }
}

fn invalid_input(description: String) -> serialport::Error {
    serialport::Error::new(serialport::ErrorKind::InvalidInput, description)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CalibrationConfig {
    pub reference_maxima: [u32; CHANNELS],
    /// Named maxima sets, e.g. one per sensor board.
    pub profiles: BTreeMap<String, [u32; CHANNELS]>,
    pub active_profile: Option<String>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            reference_maxima: ReferenceMaxima::DEFAULT.as_array(),
            profiles: BTreeMap::new(),
            active_profile: None,
        }
    }
}

impl CalibrationConfig {
    /// The active profile wins over `reference_maxima`.
    pub fn resolve(&self) -> Result<ReferenceMaxima, ConfigError> {
        let maxima = match &self.active_profile {
            Some(name) => *self
                .profiles
                .get(name)
                .ok_or_else(|| ConfigError::UnknownProfile(name.clone()))?,
            None => self.reference_maxima,
        };
        ReferenceMaxima::new(maxima).map_err(|channel| ConfigError::ZeroMaximum { channel })
    }
}

pub const DEFAULT_FIELD_XPATH: &str = "//*[@id='app']/div[2]/main/div/div/div[2]/div/div[2]/div/div/div[2]/div/div[{index}]/div/div/div/div/div[1]/div/input";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FormConfig {
    pub webdriver_url: String,
    pub browser: String,
    pub page_url: String,
    /// XPath of one input; `{index}` is replaced by the 1-based channel.
    pub field_xpath: String,
    pub implicit_wait_ms: u64,
    pub settle_ms: u64,
    pub request_timeout_ms: u64,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            browser: "chrome".to_string(),
            page_url: "https://tuneform.com/tools/color/rgb-color-creator".to_string(),
            field_xpath: DEFAULT_FIELD_XPATH.to_string(),
            implicit_wait_ms: 15_000,
            settle_ms: 10_000,
            request_timeout_ms: 30_000,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    pub period_ms: u64,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            period_ms: 100,
            seed: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub calibration: CalibrationConfig,
    pub form: FormConfig,
    pub simulation: SimulationConfig,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_sensor_link() {
        let config = AppConfig::default();
        assert_eq!(config.serial.baud_rate, 19_200);
        assert_eq!(config.serial.parity, ParitySetting::None);
        assert_eq!(config.serial.timeout(), Duration::from_secs(3));
        assert_eq!(
            config.serial.serial_data_bits().unwrap(),
            serialport::DataBits::Eight
        );
        assert_eq!(
            config.serial.serial_stop_bits().unwrap(),
            serialport::StopBits::One
        );
        assert_eq!(
            config.calibration.resolve().unwrap(),
            ReferenceMaxima::DEFAULT
        );
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{ "serial": { "port": "/dev/ttyACM1", "parity": "even" } }"#,
        )
        .unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.parity, ParitySetting::Even);
        assert_eq!(config.serial.baud_rate, 19_200);
        assert_eq!(config.form, FormConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_json(r#"{ "serial": { "baud": 9600 } }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn active_profile_overrides_maxima() {
        let config = AppConfig::from_json(
            r#"{ "calibration": {
                    "profiles": { "bench": [7200, 3500, 2600] },
                    "active_profile": "bench" } }"#,
        )
        .unwrap();
        assert_eq!(
            config.calibration.resolve().unwrap().as_array(),
            [7200, 3500, 2600]
        );
    }

    #[test]
    fn bad_calibration_is_reported() {
        let mut calibration = CalibrationConfig {
            active_profile: Some("missing".into()),
            ..Default::default()
        };
        assert!(matches!(
            calibration.resolve(),
            Err(ConfigError::UnknownProfile(name)) if name == "missing"
        ));
        calibration.active_profile = None;
        calibration.reference_maxima = [1, 1, 0];
        assert!(matches!(
            calibration.resolve(),
            Err(ConfigError::ZeroMaximum { channel: 2 })
        ));
    }

    #[test]
    fn zero_in_profile_names_its_channel() {
        let calibration = CalibrationConfig {
            profiles: BTreeMap::from([("dim".to_string(), [7200, 0, 2600])]),
            active_profile: Some("dim".into()),
            ..Default::default()
        };
        assert!(matches!(
            calibration.resolve(),
            Err(ConfigError::ZeroMaximum { channel: 1 })
        ));
    }

    #[test]
    fn unsupported_framing_is_rejected() {
        let serial = SerialConfig {
            data_bits: 9,
            stop_bits: 3,
            ..Default::default()
        };
        assert!(serial.serial_data_bits().is_err());
        assert!(serial.serial_stop_bits().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "serial": {{ "timeout_ms": 500 }} }}"#).unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.serial.timeout(), Duration::from_millis(500));
    }
}
