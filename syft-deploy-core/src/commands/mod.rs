//! Command handlers, one per CLI verb.
//!
//! Each handler walks its work list sequentially, writes human-readable progress
//! to `out`, pauses between remote calls, and returns a [`RunSummary`]. Per-item
//! remote failures are counted, not propagated; only failures that make the whole
//! run meaningless (unreachable API, unreadable inputs) return an error.

pub mod delete;
pub mod deploy;
pub mod fix_names;
pub mod generate;
pub mod list;
pub mod publish;
pub mod update;

pub use delete::{delete, DeleteOptions};
pub use deploy::{deploy, DeployOptions};
pub use fix_names::{fix_names, FixNamesOptions};
pub use generate::{generate, GenerateOptions};
pub use list::{list, ListOptions};
pub use publish::{publish, PublishOptions};
pub use update::{update, UpdateOptions};

use std::io::Write;
use std::time::Duration;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub success: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_description: usize,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

pub(crate) const RULE_WIDTH: usize = 60;

pub(crate) fn banner<W: Write>(out: &mut W, title: &str) -> std::io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "{title}")?;
    writeln!(out, "{rule}")
}

/// The standard `SUMMARY` block shared by deploy and generate.
pub(crate) fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> std::io::Result<()> {
    writeln!(out)?;
    banner(out, "SUMMARY")?;
    writeln!(out, "Success:  {}", summary.success)?;
    writeln!(out, "Skipped:  {}", summary.skipped)?;
    writeln!(out, "Failed:   {}", summary.failed)
}

/// Truncates a work list; `0` means no limit.
pub(crate) fn apply_limit<T>(items: &mut Vec<T>, limit: usize) -> bool {
    if limit > 0 && items.len() > limit {
        items.truncate(limit);
        true
    } else {
        false
    }
}

/// Pause between remote calls to stay gentle with the API.
pub(crate) async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Whether a `--datasets/--endpoints` flag pair selects datasets and endpoints.
/// Neither flag selects both.
pub(crate) fn selection(datasets: bool, endpoints: bool) -> (bool, bool) {
    let neither = !datasets && !endpoints;
    (datasets || neither, endpoints || neither)
}
