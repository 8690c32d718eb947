use std::{env::JoinPathsError, io, path::PathBuf};

use thiserror::Error;

/**
    Errors that may occur when launching the program
    embedded in a standalone executable.
*/
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("archive path '{0}' is not a valid relative path")]
    InvalidPath(String),
    #[error("failed to extend search path: {0}")]
    Environment(#[from] JoinPathsError),
    #[error("failed to start interpreter '{}': {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to wait for the program to exit: {0}")]
    Wait(#[source] io::Error),
}

pub type LaunchResult<T, E = LaunchError> = std::result::Result<T, E>;
