use std::io::Write;
use tracing::{error, info};

use super::{banner, selection, RunSummary};
use crate::contract::CatalogApi;
use crate::error::CommandError;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub datasets: bool,
    pub endpoints: bool,
}

/// Prints the datasets and/or endpoints present on the instance.
///
/// A failure to list one collection is reported inline and does not stop the other.
pub async fn list<A, W>(api: &A, opts: &ListOptions, out: &mut W) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    let (show_datasets, show_endpoints) = selection(opts.datasets, opts.endpoints);
    let mut summary = RunSummary::default();

    if show_datasets {
        banner(out, "DATASETS")?;
        match api.list_datasets().await {
            Ok(datasets) => {
                info!(count = datasets.len(), "Listed datasets");
                writeln!(out, "Total: {}\n", datasets.len())?;
                for ds in &datasets {
                    writeln!(out, "  - {}", ds.name)?;
                }
                summary.success += datasets.len();
            }
            Err(e) => {
                error!(error = %e, "Failed to list datasets");
                writeln!(out, "Error: {e}")?;
                summary.failed += 1;
            }
        }
    }

    if show_endpoints {
        writeln!(out)?;
        banner(out, "ENDPOINTS")?;
        match api.list_endpoints().await {
            Ok(endpoints) => {
                let published = endpoints.iter().filter(|ep| ep.published).count();
                info!(count = endpoints.len(), published, "Listed endpoints");
                writeln!(
                    out,
                    "Total: {} ({} published)\n",
                    endpoints.len(),
                    published
                )?;
                for ep in &endpoints {
                    let status = if ep.published {
                        "published"
                    } else {
                        "unpublished"
                    };
                    writeln!(out, "  - {} ({})", ep.slug, status)?;
                }
                summary.success += endpoints.len();
            }
            Err(e) => {
                error!(error = %e, "Failed to list endpoints");
                writeln!(out, "Error: {e}")?;
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}
