use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use super::{apply_limit, banner, pause, RunSummary};
use crate::contract::{CatalogApi, EndpointPatch};
use crate::describe::DescriptionCache;
use crate::error::CommandError;
use crate::progress::Progress;
use crate::slug::{display_name, render_template};

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Descriptions keyed by endpoint slug.
    pub descriptions: PathBuf,
    /// When set, the summary is re-rendered from the slug as well.
    pub summary_template: Option<String>,
    pub progress_file: PathBuf,
    pub resume: bool,
    pub limit: usize,
    pub delay: Duration,
    pub dry_run: bool,
}

/// Pushes descriptions from the descriptions file onto existing endpoints.
pub async fn update<A, W>(
    api: &A,
    opts: &UpdateOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    banner(out, "UPDATE ENDPOINT DESCRIPTIONS")?;
    writeln!(out, "API: {}", api.base_url())?;
    writeln!(out, "Descriptions: {}", opts.descriptions.display())?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    writeln!(out)?;

    if !opts.descriptions.exists() {
        return Err(CommandError::DescriptionsMissing(opts.descriptions.clone()));
    }
    let descriptions = DescriptionCache::load(&opts.descriptions)?;
    writeln!(out, "Loaded {} descriptions", descriptions.len())?;

    let mut progress = Progress::load_or_fresh(&opts.progress_file, opts.resume)?;

    let endpoints = api.list_endpoints().await.map_err(|e| {
        error!(error = %e, "Failed to list endpoints");
        e
    })?;
    let mut slugs: Vec<String> = endpoints.into_iter().map(|ep| ep.slug).collect();
    writeln!(out, "Found {} endpoints", slugs.len())?;
    if apply_limit(&mut slugs, opts.limit) {
        writeln!(out, "Limited to {}", opts.limit)?;
    }
    writeln!(out)?;

    let total = slugs.len();
    let mut summary = RunSummary::default();

    for (i, slug) in slugs.iter().enumerate() {
        writeln!(out, "[{}/{}] {}", i + 1, total, slug)?;

        if opts.resume && progress.is_updated(slug) {
            writeln!(out, "    Skipped (already updated)")?;
            summary.skipped += 1;
            continue;
        }

        let Some(description) = descriptions.get(slug) else {
            writeln!(out, "    No description for: {slug}")?;
            summary.no_description += 1;
            continue;
        };

        let patch = EndpointPatch {
            description: Some(description.to_string()),
            summary: opts
                .summary_template
                .as_deref()
                .map(|template| render_template(template, &display_name(slug))),
        };

        if opts.dry_run {
            writeln!(
                out,
                "    [DRY RUN] Would update ({} chars)",
                description.chars().count()
            )?;
            summary.success += 1;
            continue;
        }

        match api.update_endpoint(slug, &patch).await {
            Ok(()) => {
                info!(endpoint = %slug, "Updated description");
                writeln!(out, "    Updated")?;
                summary.success += 1;
                progress.record_updated(slug);
                progress.save(&opts.progress_file)?;
            }
            Err(e) => {
                error!(endpoint = %slug, error = %e, "Update failed");
                writeln!(out, "    Failed: {e}")?;
                summary.failed += 1;
            }
        }
        pause(opts.delay).await;
    }

    writeln!(
        out,
        "\nUpdated: {}, Skipped: {}, No description: {}, Failed: {}",
        summary.success, summary.skipped, summary.no_description, summary.failed
    )?;
    Ok(summary)
}
