use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors surfaced to the operator (spec §7 "Setup errors" / "Socket errors").
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("run directory already exists: {0}")]
    RunDirExists(PathBuf),

    #[error("invalid scenario {0:?} (expected Best, Average, Worst, or Testing)")]
    InvalidScenario(String),

    #[error("missing required flag: {0}")]
    MissingFlag(&'static str),

    #[error("socket error: {0}")]
    Socket(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
