use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::contract::RemoteError;
use crate::progress::ProgressError;

/// Anything that aborts a command handler. Per-item remote failures are
/// counted in the run summary instead.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error("Cannot connect to API at {0}")]
    Unreachable(String),
    #[error("OPENROUTER_API_KEY environment variable not set")]
    MissingGenerator,
    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("Descriptions file not found: {}", .0.display())]
    DescriptionsMissing(PathBuf),
    #[error("descriptions file {}: {source}", path.display())]
    DescriptionsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("descriptions file {} is not valid JSON: {source}", path.display())]
    DescriptionsJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
