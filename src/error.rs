use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourseError {
    #[error("failed to read course file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse course data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("course defines no holes")]
    Empty,
    #[error("hole numbers must run 1..={expected_max} without gaps; hole {missing} is missing")]
    HoleGap { missing: u32, expected_max: u32 },
}

#[derive(Debug, Error)]
pub enum PathCacheError {
    #[error("path cache io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("path cache is not valid json: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("snapshot io error: {0}")]
    SnapshotIo(#[from] std::io::Error),
    #[error("snapshot serialization error: {0}")]
    SnapshotEncode(#[from] serde_json::Error),
}
