//! Core pipeline orchestration for kindle-voz.
//!
//! Ties the crawler (fetch + extract) and delivery crates together with
//! chapter assembly, table of contents generation, and external conversion
//! into a single end-to-end [`Pipeline::run`].

pub mod assembler;
pub mod convert;
pub mod pipeline;
pub mod run;
pub mod sources;
pub mod toc;

pub use convert::{ConversionJob, Converter, EbookConvert};
pub use pipeline::{BookOptions, Pipeline, ProgressReporter, RunReport, SilentProgress};
pub use run::Run;
pub use sources::{load_locators, parse_locators};
