use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

use lunepack::archive::PayloadError;

/**
    Errors that may occur when building a standalone executable
*/
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to start the traced program: {0}")]
    TraceSpawn(#[source] io::Error),
    #[error("traced program was terminated before it could exit ({0})")]
    TraceCrashed(ExitStatus),
    #[error("traced program never started running, no trace was recorded")]
    TraceNotStarted,
    #[error("failed to read the trace report: {0}")]
    TraceReport(#[from] serde_json::Error),
    #[error("could not find resource '{}'", .0.display())]
    ResourceNotFound(PathBuf),
    #[error(
        "both '{}' and '{}' would be stored at '{path}'",
        .first.display(),
        .second.display()
    )]
    DuplicateArchivePath {
        path: String,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("path '{}' is not valid unicode", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("output path '{}' cannot be the same as the input path", .0.display())]
    SameInputOutput(PathBuf),
    #[error("failed to create archive: {0}")]
    Archive(#[from] PayloadError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type BuildResult<T, E = BuildError> = std::result::Result<T, E>;
