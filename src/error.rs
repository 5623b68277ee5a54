//! Typed errors for the sampling, collection and aggregation stages.
//!
//! Transient extraction failures are not errors: they are recorded as failed
//! attempts and never surface here. Everything in this enum indicates misuse
//! or unusable input and ends the run.

use std::path::PathBuf;

use thiserror::Error;

use crate::graph::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("browser session is not open; call open() before collecting")]
    SessionClosed,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("required input not found: {}", .0.display())]
    MissingInput(PathBuf),

    #[error("no route from {from} to {to}")]
    NoRoute { from: NodeId, to: NodeId },

    #[error("node {0} not found in graph")]
    UnknownNode(NodeId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
