use std::{error::Error, fmt, io};

use rand_distr::NormalError;

/// The crate's result type.
pub type Result<T> = std::result::Result<T, OptimizeErr>;

/// Programming-contract violations surfaced by the optimizer.
///
/// Recoverable numerical conditions (degenerate curvature, exhausted line search, non finite
/// trial values) never show up here, they are reported through an `UpdateReport` instead.
#[derive(Debug)]
pub enum OptimizeErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidRank {
        rank: usize,
        workers: usize,
    },
    InvalidConfig(String),
    Unsupported(&'static str),
    WorkerPanicked {
        rank: usize,
    },
    Io(io::Error),
    Json(serde_json::Error),
    Distribution(NormalError),
}

impl fmt::Display for OptimizeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch {
                what,
                got,
                expected,
            } => write!(f, "size mismatch in {what}: got {got}, expected {expected}"),
            Self::InvalidRank { rank, workers } => {
                write!(f, "invalid rank {rank} for a pool of {workers} workers")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Unsupported(what) => write!(f, "unsupported operation: {what}"),
            Self::WorkerPanicked { rank } => write!(f, "worker {rank} panicked"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Distribution(e) => write!(f, "invalid distribution: {e}"),
        }
    }
}

impl Error for OptimizeErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::Distribution(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for OptimizeErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for OptimizeErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<NormalError> for OptimizeErr {
    fn from(value: NormalError) -> Self {
        Self::Distribution(value)
    }
}
