// src/drivers/mod.rs
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod source;

pub use error::{ParseError, ReaderError};
pub use normalizer::{parse_record, Normalizer};
pub use pipeline::SamplePipeline;
pub use source::{open_serial, LineReader, LineSource};
#[cfg(test)]
pub use source::ManualSource;
