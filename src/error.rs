//! Error types for option resolution, device selection and executable handling.

use std::path::PathBuf;

use thiserror::Error;

use crate::runtime::RuntimeError;

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Every way a run can stop before producing a ready executable.
#[derive(Debug, Error)]
pub enum Error {
    /// `--help` was given. The usage text has already been printed.
    #[error("help requested")]
    UserRequestedHelp,
    #[error("invalid command line: {0}")]
    InvalidArgument(String),
    #[error("to save/load an executable you must set 'exe-name'")]
    MissingArtifactName,
    #[error("it is not possible to run profiling on a loaded executable")]
    IncompatibleOptions,
    #[error("no IPU hardware available with {num_ipus} IPU(s)")]
    NoDeviceAvailable { num_ipus: usize },
    #[error("failed to load executable '{}'", .path.display())]
    ArtifactLoadFailed {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },
    #[error("graph compilation failed")]
    CompilationFailed(#[source] RuntimeError),
    #[error("failed to save executable '{}'", .path.display())]
    ArtifactSaveFailed {
        path: PathBuf,
        #[source]
        source: RuntimeError,
    },
    #[error("failed to write profile '{}'", .path.display())]
    ProfileWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not read config file '{}'", .path.display())]
    ConfigFile {
        path: PathBuf,
        #[source]
        source: ConfigFileError,
    },
}

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Parse(#[from] toml::de::Error),
}
