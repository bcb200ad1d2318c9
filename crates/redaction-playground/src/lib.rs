//! `redaction-playground` - Detect-and-redact core for PII redaction
//!
//! This library runs deterministic local pattern detection over text,
//! optionally augments it with a remote AI assist pass, merges both span
//! lists and renders a redacted copy of the input.
//!
//! Nothing is persisted: every run starts from the input text and ends with a
//! [`RedactionResult`].

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod assist;
pub mod cli;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod loader;
pub mod logging;
pub mod merge;
pub mod pipeline;
pub mod present;
pub mod render;
pub mod text;

pub use config::Config;
pub use detection::{Detection, Origin, Span};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use merge::{merge_detections, OverlapPolicy};
pub use pipeline::{AssistOutcome, Playground, RedactionResult, RunOptions};
pub use present::OutputFormat;
pub use render::render_redaction;
