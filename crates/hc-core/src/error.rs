use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading the host configuration tree
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("no configuration fragments found in {0:?}")]
    Empty(PathBuf),
}
