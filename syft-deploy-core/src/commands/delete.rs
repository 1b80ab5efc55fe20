use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use super::{banner, pause, selection, RunSummary};
use crate::contract::{CatalogApi, DeleteOutcome};
use crate::error::CommandError;
use crate::progress::Progress;

#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub datasets: bool,
    pub endpoints: bool,
    pub progress_file: PathBuf,
    pub delay: Duration,
    pub dry_run: bool,
}

/// The header printed before the operator is asked to confirm.
pub fn write_delete_plan<W: Write>(
    base_url: &str,
    opts: &DeleteOptions,
    out: &mut W,
) -> std::io::Result<()> {
    let (delete_datasets, delete_endpoints) = selection(opts.datasets, opts.endpoints);
    banner(out, "DELETE RESOURCES")?;
    writeln!(out, "API: {base_url}")?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    writeln!(out, "Delete endpoints: {delete_endpoints}")?;
    writeln!(out, "Delete datasets: {delete_datasets}")?;
    writeln!(out)
}

/// Deletes every endpoint and/or dataset on the instance. Endpoints go first
/// since they reference datasets. The progress file is cleared afterwards.
///
/// Confirmation is the caller's job; see [`write_delete_plan`].
pub async fn delete<A, W>(
    api: &A,
    opts: &DeleteOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    let (delete_datasets, delete_endpoints) = selection(opts.datasets, opts.endpoints);
    let mut summary = RunSummary::default();

    if delete_endpoints {
        writeln!(out, "\nDeleting endpoints...")?;
        writeln!(out, "{}", "-".repeat(40))?;
        match api.list_endpoints().await {
            Ok(endpoints) => {
                let slugs: Vec<String> = endpoints.into_iter().map(|ep| ep.slug).collect();
                delete_each(api, Collection::Endpoints, &slugs, opts, out, &mut summary).await?;
                writeln!(out, "\nEndpoints: {} processed", slugs.len())?;
            }
            Err(e) => {
                error!(error = %e, "Failed to list endpoints for deletion");
                writeln!(out, "Error listing endpoints: {e}")?;
            }
        }
    }

    if delete_datasets {
        writeln!(out, "\nDeleting datasets...")?;
        writeln!(out, "{}", "-".repeat(40))?;
        match api.list_datasets().await {
            Ok(datasets) => {
                let names: Vec<String> = datasets.into_iter().map(|ds| ds.name).collect();
                delete_each(api, Collection::Datasets, &names, opts, out, &mut summary).await?;
                writeln!(out, "\nDatasets: {} processed", names.len())?;
            }
            Err(e) => {
                error!(error = %e, "Failed to list datasets for deletion");
                writeln!(out, "Error listing datasets: {e}")?;
            }
        }
    }

    if !opts.dry_run && Progress::clear(&opts.progress_file)? {
        writeln!(out, "\nProgress file cleared")?;
    }

    info!(?summary, "Delete finished");
    Ok(summary)
}

#[derive(Debug, Clone, Copy)]
enum Collection {
    Datasets,
    Endpoints,
}

async fn delete_each<A, W>(
    api: &A,
    collection: Collection,
    names: &[String],
    opts: &DeleteOptions,
    out: &mut W,
    summary: &mut RunSummary,
) -> Result<(), CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    let total = names.len();
    for (i, name) in names.iter().enumerate() {
        if opts.dry_run {
            writeln!(out, "  [{}/{}] [DRY RUN] Would delete: {}", i + 1, total, name)?;
            summary.success += 1;
            continue;
        }
        let result = match collection {
            Collection::Datasets => api.delete_dataset(name).await,
            Collection::Endpoints => api.delete_endpoint(name).await,
        };
        let status = match result {
            Ok(DeleteOutcome::Deleted) => {
                summary.success += 1;
                "Deleted".to_string()
            }
            Ok(DeleteOutcome::NotFound) => {
                summary.success += 1;
                "Deleted (not found)".to_string()
            }
            Err(e) => {
                error!(name = %name, error = %e, "Delete failed");
                summary.failed += 1;
                format!("Failed: {e}")
            }
        };
        writeln!(out, "  [{}/{}] {}: {}", i + 1, total, name, status)?;
        pause(opts.delay).await;
    }
    Ok(())
}
