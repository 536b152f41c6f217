use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, ParitySetting};
use crate::types::{ConnectionMode, CHANNELS};

/// Reads colour-sensor records from a serial port and rescales them to 0-255.
#[derive(Parser, Debug)]
#[command(name = "colorsense", version)]
pub struct Cli {
    /// JSON configuration file; flags below override it.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Serial device, e.g. /dev/ttyUSB0 or COM10.
    #[arg(short, long, global = true)]
    pub port: Option<String>,

    #[arg(short, long, global = true)]
    pub baud: Option<u32>,

    #[arg(long, global = true, value_enum)]
    pub parity: Option<ParitySetting>,

    /// Read timeout in milliseconds.
    #[arg(long, global = true)]
    pub timeout_ms: Option<u64>,

    /// Reference maxima as R,G,B; overrides any profile.
    #[arg(long, global = true, value_parser = parse_maxima)]
    pub maxima: Option<[u32; CHANNELS]>,

    /// Calibration profile from the config file.
    #[arg(long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Use the built-in synthetic sensor instead of a serial port.
    #[arg(long)]
    pub simulate: bool,

    /// Also append every sample to this CSV file.
    #[arg(long)]
    pub record: Option<PathBuf>,

    /// Stop after this many good samples.
    #[arg(long)]
    pub limit: Option<usize>,
}

impl RunArgs {
    pub fn mode(&self) -> ConnectionMode {
        if self.simulate {
            ConnectionMode::Simulation
        } else {
            ConnectionMode::Hardware
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print normalized colours until interrupted.
    Monitor(RunArgs),
    /// Print normalized colours and type them into a web form.
    Populate {
        #[command(flatten)]
        run: RunArgs,
        /// WebDriver server, e.g. a running chromedriver.
        #[arg(long)]
        webdriver: Option<String>,
        /// Page holding the three colour inputs.
        #[arg(long)]
        page: Option<String>,
    },
    /// Record per-channel maxima to derive reference maxima.
    Calibrate {
        #[arg(long)]
        simulate: bool,
        #[arg(long, default_value_t = 200)]
        samples: usize,
    },
    /// List serial ports.
    Ports,
}

fn parse_maxima(s: &str) -> Result<[u32; CHANNELS], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<u32>().map_err(|e| format!("{v:?}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    let maxima: [u32; CHANNELS] = values
        .try_into()
        .map_err(|v: Vec<u32>| format!("expected {CHANNELS} values, got {}", v.len()))?;
    if maxima.contains(&0) {
        return Err("reference maxima must be greater than zero".to_string());
    }
    Ok(maxima)
}

impl Cli {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(port) = &self.port {
            config.serial.port = port.clone();
        }
        if let Some(baud) = self.baud {
            config.serial.baud_rate = baud;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.serial.timeout_ms = timeout_ms;
        }
        if let Some(profile) = &self.profile {
            config.calibration.active_profile = Some(profile.clone());
        }
        if let Some(maxima) = self.maxima {
            config.calibration.reference_maxima = maxima;
            config.calibration.active_profile = None;
        }
        if let Command::Populate { webdriver, page, .. } = &self.command {
            if let Some(url) = webdriver {
                config.form.webdriver_url = url.clone();
            }
            if let Some(url) = page {
                config.form.page_url = url.clone();
            }
        }
    }
}
