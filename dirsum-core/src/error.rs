use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fatal failures. Each one aborts the operation in progress; verification
/// mismatches are never reported through this type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("path not usable: {path:?}: {reason}")]
    Path { path: PathBuf, reason: String },

    #[error("read {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest {path:?} is not readable as a manifest: {reason}")]
    Format { path: PathBuf, reason: String },

    #[error("no manifest found under {root:?} (looked for {tried})")]
    NotFound { root: PathBuf, tried: String },

    #[error("bad glob pattern {pattern:?}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
}

/// Process exit codes. 2 is left to the argument parser.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const VERIFY_FAILED: i32 = 1;
    pub const NOT_FOUND: i32 = 3;
    pub const RUNTIME: i32 = 4;
}

impl Error {
    pub(crate) fn path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Path { path: path.into(), reason: reason.into() }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Format { path: path.into(), reason: reason.into() }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NotFound { .. } => exit::NOT_FOUND,
            Error::Path { .. } | Error::Io { .. } | Error::Format { .. } | Error::Pattern { .. } => {
                exit::RUNTIME
            }
        }
    }
}

/// Errors from `walkdir` carry the path being visited when there is one.
impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(|p| p.to_path_buf()).unwrap_or_default();
        let source = e
            .into_io_error()
            .unwrap_or_else(|| std::io::Error::other("filesystem loop detected"));
        Error::io(path, source)
    }
}
