// src/engine.rs
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::drivers::{LineSource, ReaderError, SamplePipeline};
use crate::types::Sample;

/// Anything that consumes normalized samples: the console, the web form,
/// a CSV file.
pub trait ColorSink {
    fn publish(&mut self, sample: &Sample) -> Result<()>;
}

/// Prints one `(r, g, b)` line per sample.
pub struct ConsoleSink<W: Write> {
    out: W,
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ColorSink for ConsoleSink<W> {
    fn publish(&mut self, sample: &Sample) -> Result<()> {
        writeln!(self.out, "{}", sample.color)?;
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub samples: usize,
    pub malformed: usize,
    pub timeouts: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    EndOfStream,
    Limit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunReport {
    pub stats: RunStats,
    pub stop: StopReason,
}

/// Sets the returned flag on Ctrl-C so the loop can close the port itself.
pub fn install_shutdown_handler() -> Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = flag.clone();
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl-C handler")?;
    Ok(flag)
}

/// Reads samples until shutdown, end of stream, or `limit` good samples.
///
/// Malformed lines and read timeouts are logged and skipped. Any other read
/// error, and any error returned by `on_sample`, ends the run.
pub fn drive<S: LineSource>(
    pipeline: &mut SamplePipeline<S>,
    shutdown: &AtomicBool,
    limit: Option<usize>,
    mut on_sample: impl FnMut(&Sample) -> Result<()>,
) -> Result<RunReport> {
    let mut stats = RunStats::default();
    let stop = loop {
        if shutdown.load(Ordering::SeqCst) {
            break StopReason::Shutdown;
        }
        if limit.is_some_and(|n| stats.samples >= n) {
            break StopReason::Limit;
        }
        match pipeline.pump_once() {
            Ok(sample) => {
                stats.samples += 1;
                on_sample(&sample)?;
            }
            Err(ReaderError::EndOfStream) => break StopReason::EndOfStream,
            Err(ReaderError::Timeout(waited)) => {
                stats.timeouts += 1;
                log::debug!("no record within {waited:?}, retrying");
            }
            Err(e) if e.is_recoverable() => {
                stats.malformed += 1;
                log::warn!("skipping record: {e}");
            }
            Err(e) => return Err(e).context("sensor stream failed"),
        }
    };
    log::info!(
        "stopped ({stop:?}): {} samples, {} malformed, {} timeouts",
        stats.samples,
        stats.malformed,
        stats.timeouts
    );
    Ok(RunReport { stats, stop })
}

/// Owns the pipeline and fans each sample out to every sink in order.
pub struct Engine<'a, S: LineSource> {
    pipeline: SamplePipeline<S>,
    sinks: Vec<Box<dyn ColorSink + 'a>>,
}

impl<'a, S: LineSource> Engine<'a, S> {
    pub fn new(pipeline: SamplePipeline<S>) -> Self {
        Self {
            pipeline,
            sinks: Vec::new(),
        }
    }

    pub fn add_sink(&mut self, sink: impl ColorSink + 'a) {
        self.sinks.push(Box::new(sink));
    }

    pub fn run(&mut self, shutdown: &AtomicBool, limit: Option<usize>) -> Result<RunReport> {
        let Engine { pipeline, sinks } = self;
        drive(pipeline, shutdown, limit, |sample| {
            for sink in sinks.iter_mut() {
                sink.publish(sample)?;
            }
            Ok(())
        })
    }
}
