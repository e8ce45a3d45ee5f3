//! Crate-wide error composition.
//!
//! Each module that can fail defines its own `thiserror`-derived error enum close to
//! the code that produces it (see [`crate::download::Error`], [`crate::version::Error`],
//! [`crate::forge::Error`]). This module composes them into the single [`Error`] type
//! returned at the [`crate::launch::Launcher`] boundary.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("java executable not available: {0}")]
    JavaUnavailable(String),

    #[error("failed to resolve or parse version descriptor: {0}")]
    Version(#[from] crate::version::Error),

    #[error("download failed: {0}")]
    Download(#[from] crate::download::Error),

    #[error("failed to materialize libraries: {0}")]
    Library(#[from] crate::library::Error),

    #[error("failed to materialize natives: {0}")]
    Natives(#[from] crate::natives::Error),

    #[error("failed to materialize assets: {0}")]
    Assets(#[from] crate::assets::Error),

    #[error("forge overlay failed: {0}")]
    Forge(#[from] crate::forge::Error),

    #[error("argument synthesis failed: {0}")]
    Args(#[from] crate::args::Error),

    #[error("external installer at {path} exited with status {status:?}")]
    InstallerFailed { path: PathBuf, status: Option<i32> },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn game process: {0}")]
    Spawn(#[source] std::io::Error),
}

impl Error {
    pub(crate) fn new_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_io_carries_path_in_display() {
        let err = Error::new_io("/tmp/missing", std::io::Error::from(std::io::ErrorKind::NotFound));
        assert!(err.to_string().contains("/tmp/missing"));
    }

    #[test]
    fn installer_failed_reports_status() {
        let err = Error::InstallerFailed { path: PathBuf::from("installer.jar"), status: Some(1) };
        assert!(err.to_string().contains("installer.jar"));
        assert!(err.to_string().contains("Some(1)"));
    }
}
