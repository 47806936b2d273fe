//! Error kinds for the overlay.
//!
//! Only genuinely failing operations get an error type here. Outcomes that are
//! part of normal operation (an unavailable estimate, a selection miss, a queue
//! timeout) are modeled as plain values by their modules.

use crate::telemetry_form::FieldKey;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },
    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    BufferSize { expected: usize, actual: usize },
}

/// Recoverable telemetry-entry failures. The form is left unchanged.
#[derive(Debug, Error, PartialEq)]
pub enum FormError {
    #[error("no telemetry field is active")]
    NoActiveField,
    #[error("{field}: {text:?} is not a number")]
    InvalidNumber { field: FieldKey, text: String },
}

#[derive(Debug, Error, PartialEq)]
pub enum ModeError {
    #[error("no frame has been delivered yet")]
    NoFrame,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("composite of {width}x{height} cannot be allocated")]
    Allocation { width: u32, height: u32 },
    #[error("nothing to render: no effective frame")]
    NoFrame,
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("render surface was closed")]
    Closed,
    #[error("window backend failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("read: {0}")]
    Io(#[from] std::io::Error),
    #[error("empty file")]
    Empty,
    #[error("bad header: {0}")]
    Header(String),
    #[error("line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}
