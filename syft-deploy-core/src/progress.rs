//! Resume bookkeeping: a small JSON file listing which items a batch run has
//! already handled, so a re-run with `--resume` can skip them.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum ProgressError {
    #[error("progress file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("progress file {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Names processed so far, grouped by outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub deployed: Vec<String>,
    pub updated: Vec<String>,
    pub failed: Vec<String>,
    pub fixed: Vec<String>,
    pub skipped: Vec<String>,
    pub in_progress: Option<String>,
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

impl Progress {
    /// Loads the file at `path`; a missing file is an empty record.
    pub fn load(path: &Path) -> Result<Self, ProgressError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No progress file, starting fresh");
                return Ok(Progress::default());
            }
            Err(source) => {
                return Err(ProgressError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let progress: Progress =
            serde_json::from_str(&text).map_err(|source| ProgressError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        info!(
            path = %path.display(),
            deployed = progress.deployed.len(),
            updated = progress.updated.len(),
            failed = progress.failed.len(),
            fixed = progress.fixed.len(),
            "Loaded progress"
        );
        Ok(progress)
    }

    /// Either the stored record (when resuming) or a fresh one.
    pub fn load_or_fresh(path: &Path, resume: bool) -> Result<Self, ProgressError> {
        if resume {
            Progress::load(path)
        } else {
            Ok(Progress::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ProgressError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ProgressError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        fs::write(path, json).map_err(|source| ProgressError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Saved progress");
        Ok(())
    }

    /// Removes the progress file. Missing is fine.
    pub fn clear(path: &Path) -> Result<bool, ProgressError> {
        match fs::remove_file(path) {
            Ok(()) => {
                info!(path = %path.display(), "Cleared progress file");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(ProgressError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn is_deployed(&self, name: &str) -> bool {
        self.deployed.iter().any(|n| n == name)
    }

    pub fn is_updated(&self, slug: &str) -> bool {
        self.updated.iter().any(|n| n == slug)
    }

    pub fn is_fixed(&self, slug: &str) -> bool {
        self.fixed.iter().any(|n| n == slug)
    }

    pub fn record_deployed(&mut self, name: &str) {
        push_unique(&mut self.deployed, name);
        self.failed.retain(|n| n != name);
    }

    pub fn record_updated(&mut self, slug: &str) {
        push_unique(&mut self.updated, slug);
        self.failed.retain(|n| n != slug);
    }

    pub fn record_fixed(&mut self, slug: &str) {
        push_unique(&mut self.fixed, slug);
        self.failed.retain(|n| n != slug);
    }

    pub fn record_failed(&mut self, name: &str) {
        push_unique(&mut self.failed, name);
    }

    pub fn set_in_progress(&mut self, name: Option<&str>) {
        self.in_progress = name.map(str::to_string);
    }
}
