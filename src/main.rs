// src/main.rs
mod calibration;
mod cli;
mod config;
mod drivers;
mod engine;
mod form;
mod recorder;
mod simulator;
mod types;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serialport::SerialPortType;

use crate::calibration::CalibrationTracker;
use crate::cli::{Cli, Command, RunArgs};
use crate::config::AppConfig;
use crate::drivers::{open_serial, LineSource, Normalizer, SamplePipeline};
use crate::engine::{ConsoleSink, Engine};
use crate::form::{FormError, FormPopulator, WebDriverFieldWriter};
use crate::recorder::DataRecorder;
use crate::simulator::SimulatedSensor;
use crate::types::{ConnectionMode, ReferenceMaxima};

fn open_source(
    config: &AppConfig,
    maxima: ReferenceMaxima,
    mode: ConnectionMode,
) -> Result<Box<dyn LineSource>> {
    match mode {
        ConnectionMode::Simulation => {
            log::info!("using simulated sensor");
            Ok(Box::new(SimulatedSensor::new(
                maxima,
                Duration::from_millis(config.simulation.period_ms),
                config.simulation.seed,
            )))
        }
        ConnectionMode::Hardware => Ok(Box::new(open_serial(&config.serial)?)),
    }
}

fn run(config: &AppConfig, args: &RunArgs, populate: bool) -> Result<()> {
    let maxima = config.calibration.resolve()?;
    log::info!("reference maxima {:?}", maxima.as_array());
    let shutdown = engine::install_shutdown_handler()?;
    let source = open_source(config, maxima, args.mode())?;

    let mut engine = Engine::new(SamplePipeline::new(source, Normalizer::new(maxima)));
    engine.add_sink(ConsoleSink::stdout());
    if populate {
        let writer = match WebDriverFieldWriter::connect(&config.form, &shutdown) {
            Err(FormError::Interrupted) => {
                log::info!("interrupted before the form was ready");
                return Ok(());
            }
            connected => connected
                .with_context(|| format!("failed to open {}", config.form.page_url))?,
        };
        engine.add_sink(FormPopulator::new(writer));
    }
    if let Some(path) = &args.record {
        engine.add_sink(DataRecorder::create(path)?);
    }
    engine.run(&shutdown, args.limit)?;
    Ok(())
}

fn calibrate(config: &AppConfig, simulate: bool, samples: usize) -> Result<()> {
    let maxima = config.calibration.resolve()?;
    let mode = if simulate {
        ConnectionMode::Simulation
    } else {
        ConnectionMode::Hardware
    };
    let shutdown = engine::install_shutdown_handler()?;
    let mut pipeline = SamplePipeline::new(open_source(config, maxima, mode)?, Normalizer::new(maxima));
    let mut tracker = CalibrationTracker::default();
    log::info!("sweep the sensor across its brightest targets; collecting {samples} samples");
    engine::drive(&mut pipeline, &shutdown, Some(samples), |sample| {
        tracker.observe(&sample.record);
        Ok(())
    })?;
    if tracker.suggest().is_none() {
        log::warn!("a channel never read above zero; no reference maxima suggested");
    }
    println!("{}", serde_json::to_string_pretty(&tracker.report())?);
    Ok(())
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("failed to enumerate serial ports")?;
    if ports.is_empty() {
        log::warn!("no serial ports found");
    }
    for port in ports {
        let kind = match port.port_type {
            SerialPortType::UsbPort(info) => format!(
                "usb {:04x}:{:04x} {}",
                info.vid,
                info.pid,
                info.product.unwrap_or_default()
            ),
            SerialPortType::PciPort => "pci".to_string(),
            SerialPortType::BluetoothPort => "bluetooth".to_string(),
            SerialPortType::Unknown => "unknown".to_string(),
        };
        println!("{}\t{}", port.port_name, kind);
    }
    Ok(())
}

// 入口函数
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => AppConfig::default(),
    };
    cli.apply(&mut config);

    match &cli.command {
        Command::Monitor(args) => run(&config, args, false),
        Command::Populate { run: args, .. } => run(&config, args, true),
        Command::Calibrate { simulate, samples } => calibrate(&config, *simulate, *samples),
        Command::Ports => list_ports(),
    }
}
