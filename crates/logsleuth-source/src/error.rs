use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised while reading a log file.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("log file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("permission denied reading {}", path.display())]
    PermissionDenied { path: PathBuf },

    #[error("log file {} shrank while being rewritten", path.display())]
    Truncated { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => SourceError::NotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => SourceError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => SourceError::Io {
                path: path.to_path_buf(),
                source: err,
            },
        }
    }

    /// The file this error refers to.
    pub fn path(&self) -> &Path {
        match self {
            SourceError::NotFound { path }
            | SourceError::PermissionDenied { path }
            | SourceError::Truncated { path }
            | SourceError::Io { path, .. } => path,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_io_kinds() {
        let path = Path::new("logs/app.log");

        let err = SourceError::from_io(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(err.is_not_found());
        assert_eq!(err.path(), path);

        let err = SourceError::from_io(path, io::Error::from(io::ErrorKind::PermissionDenied));
        assert!(matches!(err, SourceError::PermissionDenied { .. }));

        let err = SourceError::from_io(path, io::Error::from(io::ErrorKind::InvalidData));
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_display_mentions_path() {
        let err = SourceError::NotFound {
            path: PathBuf::from("consolidated_logs/latest.log"),
        };
        assert_eq!(
            err.to_string(),
            "log file not found: consolidated_logs/latest.log"
        );
    }
}
