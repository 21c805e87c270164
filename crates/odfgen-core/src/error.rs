//! Error types for odfgen.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Archive could not be opened, extracted or written.
    #[error("archive error: {0}")]
    Archive(String),

    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A document part is missing or malformed.
    #[error("format error: {0}")]
    Format(String),

    #[error("render error: {0}")]
    Render(String),

    /// An exporter or conversion backend failed.
    #[error("remote error: {0}")]
    Remote(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an I/O failure with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_names_path() {
        let err = Error::io(
            "/tmp/work/content.xml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/work/content.xml"));
        assert!(message.contains("denied"));
    }
}
