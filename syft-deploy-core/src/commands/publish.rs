use std::io::Write;
use std::time::Duration;
use tracing::{error, info};

use super::{apply_limit, banner, pause, RunSummary};
use crate::contract::CatalogApi;
use crate::error::CommandError;

#[derive(Debug, Clone)]
pub struct PublishOptions {
    pub limit: usize,
    pub delay: Duration,
    pub dry_run: bool,
}

/// Publishes every endpoint that is unpublished or not yet on any marketplace.
///
/// Failing to list endpoints aborts the run.
pub async fn publish<A, W>(
    api: &A,
    opts: &PublishOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    banner(out, "PUBLISH ENDPOINTS")?;
    writeln!(out, "API: {}", api.base_url())?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    writeln!(out)?;

    let endpoints = api.list_endpoints().await.map_err(|e| {
        error!(error = %e, "Failed to list endpoints");
        e
    })?;

    let mut pending: Vec<String> = endpoints
        .into_iter()
        .filter(|ep| ep.needs_publish())
        .map(|ep| ep.slug)
        .collect();
    apply_limit(&mut pending, opts.limit);

    writeln!(out, "Found {} unpublished endpoints\n", pending.len())?;
    let mut summary = RunSummary::default();
    if pending.is_empty() {
        writeln!(out, "Nothing to publish")?;
        return Ok(summary);
    }

    let total = pending.len();
    for (i, slug) in pending.iter().enumerate() {
        if opts.dry_run {
            writeln!(out, "  [{}/{}] [DRY RUN] Would publish: {}", i + 1, total, slug)?;
            summary.success += 1;
            continue;
        }

        match api.publish_endpoint(slug).await {
            Ok(()) => {
                info!(endpoint = %slug, "Published");
                writeln!(out, "  [{}/{}] {}: Published", i + 1, total, slug)?;
                summary.success += 1;
            }
            Err(e) => {
                error!(endpoint = %slug, error = %e, "Publish failed");
                writeln!(out, "  [{}/{}] {}: Failed - {}", i + 1, total, slug, e)?;
                summary.failed += 1;
            }
        }
        pause(opts.delay).await;
    }

    writeln!(out, "\nPublished: {}, Failed: {}", summary.success, summary.failed)?;
    Ok(summary)
}
