use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{banner, pause, RunSummary};
use crate::contract::{CatalogApi, CreateOutcome, DeleteOutcome, Endpoint, NewEndpoint};
use crate::error::CommandError;
use crate::progress::Progress;

#[derive(Debug, Clone)]
pub struct FixNamesOptions {
    pub progress_file: PathBuf,
    pub delay: Duration,
    pub dry_run: bool,
}

/// Recreates endpoints whose display name contains a space, using the slug as
/// the new name. The API cannot rename, so each endpoint is deleted and created
/// again with the same slug and content.
pub async fn fix_names<A, W>(
    api: &A,
    opts: &FixNamesOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    banner(out, "FIX ENDPOINT NAMES")?;
    writeln!(out, "API: {}", api.base_url())?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    writeln!(out)?;

    if !opts.dry_run && !api.check_connection().await {
        error!(api = %api.base_url(), "API connection check failed");
        return Err(CommandError::Unreachable(api.base_url()));
    }

    let mut progress = Progress::load(&opts.progress_file)?;
    writeln!(
        out,
        "Progress: {} fixed, {} failed\n",
        progress.fixed.len(),
        progress.failed.len()
    )?;

    let endpoints = api.list_endpoints().await.map_err(|e| {
        error!(error = %e, "Failed to list endpoints");
        e
    })?;
    let with_spaces: Vec<Endpoint> = endpoints
        .into_iter()
        .filter(|ep| ep.name.contains(' '))
        .collect();
    writeln!(out, "Found {} endpoints with spaces in names", with_spaces.len())?;

    let mut summary = RunSummary::default();
    let pending: Vec<Endpoint> = with_spaces
        .into_iter()
        .filter(|ep| {
            let done = progress.is_fixed(&ep.slug);
            if done {
                summary.skipped += 1;
            }
            !done
        })
        .collect();

    if pending.is_empty() {
        writeln!(out, "All endpoints already fixed")?;
        return Ok(summary);
    }
    writeln!(out, "{}", "-".repeat(super::RULE_WIDTH))?;

    let total = pending.len();
    let mut failed_slugs = Vec::new();

    for (i, endpoint) in pending.iter().enumerate() {
        let slug = endpoint.slug.as_str();
        writeln!(out, "[{}/{}] {}", i + 1, total, slug)?;
        writeln!(out, "    Old name: '{}'", endpoint.name)?;
        writeln!(out, "    New name: '{}'", slug)?;

        if !opts.dry_run {
            progress.set_in_progress(Some(slug));
            progress.save(&opts.progress_file)?;
        }

        if fix_one(api, endpoint, opts, out).await? {
            writeln!(out, "    Fixed: {slug}")?;
            summary.success += 1;
            if !opts.dry_run {
                progress.record_fixed(slug);
            }
        } else {
            writeln!(out, "    Failed: {slug}")?;
            summary.failed += 1;
            failed_slugs.push(slug.to_string());
            if !opts.dry_run {
                progress.record_failed(slug);
            }
        }

        if !opts.dry_run {
            progress.set_in_progress(None);
            progress.save(&opts.progress_file)?;
            if i + 1 < total {
                pause(opts.delay).await;
            }
        }
    }

    writeln!(out)?;
    banner(out, "SUMMARY")?;
    writeln!(out, "Fixed:   {}", summary.success)?;
    writeln!(out, "Failed:  {}", summary.failed)?;
    writeln!(out, "Skipped: {}", summary.skipped)?;
    if !failed_slugs.is_empty() {
        writeln!(out, "\nFailed endpoints:")?;
        for slug in &failed_slugs {
            writeln!(out, "  - {slug}")?;
        }
    }
    if !opts.dry_run {
        writeln!(out, "\nProgress saved to: {}", opts.progress_file.display())?;
    }
    info!(?summary, "Fix names finished");
    Ok(summary)
}

fn recreated(endpoint: &Endpoint) -> NewEndpoint {
    NewEndpoint {
        name: endpoint.slug.clone(),
        slug: endpoint.slug.clone(),
        description: endpoint.description.clone(),
        summary: endpoint.summary.clone(),
        response_type: endpoint
            .response_type
            .clone()
            .unwrap_or_else(|| "both".to_string()),
        published: None,
        tags: endpoint.tags.clone(),
        dataset_id: endpoint.bound_dataset_id().cloned(),
        model: endpoint.model.clone(),
    }
}

async fn fix_one<A, W>(
    api: &A,
    endpoint: &Endpoint,
    opts: &FixNamesOptions,
    out: &mut W,
) -> Result<bool, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    let slug = endpoint.slug.as_str();
    let payload = recreated(endpoint);

    if opts.dry_run {
        writeln!(out, "    [DRY RUN] Would delete endpoint: {slug}")?;
        writeln!(out, "    [DRY RUN] Would create endpoint: {slug}")?;
        if endpoint.published {
            writeln!(out, "    [DRY RUN] Would publish to marketplace: {slug}")?;
        }
        return Ok(true);
    }

    write!(out, "    Deleting... ")?;
    match api.delete_endpoint(slug).await {
        Ok(DeleteOutcome::Deleted) | Ok(DeleteOutcome::NotFound) => writeln!(out, "ok")?,
        Err(e) => {
            error!(endpoint = %slug, error = %e, "Delete failed");
            writeln!(out, "failed: {e}")?;
            return Ok(false);
        }
    }
    pause(opts.delay).await;

    write!(out, "    Recreating... ")?;
    match api.create_endpoint(&payload).await {
        Ok(CreateOutcome::Created(_)) => writeln!(out, "ok")?,
        Ok(CreateOutcome::AlreadyExists) => writeln!(out, "ok (already exists)")?,
        Err(e) => {
            error!(endpoint = %slug, error = %e, "Recreate failed");
            writeln!(out, "failed: {e}")?;
            return Ok(false);
        }
    }
    info!(endpoint = %slug, "Recreated endpoint");

    if endpoint.published {
        pause(opts.delay).await;
        if let Err(e) = api.publish_endpoint(slug).await {
            warn!(endpoint = %slug, error = %e, "Republish failed");
            writeln!(out, "    Warning: created but publish failed: {e}")?;
        }
    }

    Ok(true)
}
