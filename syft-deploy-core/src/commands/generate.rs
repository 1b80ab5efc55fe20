use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use super::{apply_limit, banner, pause, write_summary, RunSummary};
use crate::catalog;
use crate::contract::DescriptionGenerator;
use crate::describe::{DescriptionCache, PromptSettings};
use crate::error::CommandError;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub source_dir: PathBuf,
    /// Descriptions cache the generated texts are written to.
    pub output: PathBuf,
    pub prompts: PromptSettings,
    pub resume: bool,
    pub limit: usize,
    pub delay: Duration,
    pub dry_run: bool,
}

/// Generates a description for every dataset directory from its sample metadata.
///
/// Each generated text is stored in the descriptions cache (saved after every
/// dataset) and in the dataset's own description file.
pub async fn generate<W: Write>(
    generator: Option<&dyn DescriptionGenerator>,
    opts: &GenerateOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError> {
    banner(out, "GENERATE DESCRIPTIONS")?;
    writeln!(out, "Model: {}", opts.prompts.model)?;
    writeln!(out, "Source: {}", opts.source_dir.display())?;
    writeln!(out, "Output: {}", opts.output.display())?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    writeln!(out)?;

    if generator.is_none() && !opts.dry_run {
        return Err(CommandError::MissingGenerator);
    }

    let mut cache = if opts.resume {
        DescriptionCache::load_if_exists(&opts.output)?
    } else {
        DescriptionCache::default()
    };

    let mut datasets = catalog::discover_datasets(&opts.source_dir)?;
    writeln!(out, "Found {} datasets", datasets.len())?;
    if apply_limit(&mut datasets, opts.limit) {
        writeln!(out, "Limited to {}", opts.limit)?;
    }
    writeln!(out)?;

    let total = datasets.len();
    let mut summary = RunSummary::default();

    for (i, name) in datasets.iter().enumerate() {
        writeln!(out, "[{}/{}] {}", i + 1, total, name)?;

        if opts.resume && cache.contains(name) {
            writeln!(out, "    Already generated, skipping")?;
            summary.skipped += 1;
            continue;
        }

        let dataset_dir = opts.source_dir.join(name);
        let items = catalog::load_metadata(&dataset_dir)?;
        if items.is_empty() {
            writeln!(out, "    No metadata found, skipping")?;
            summary.failed += 1;
            continue;
        }
        writeln!(out, "    Found {} items", items.len())?;

        let Some(generator) = generator.filter(|_| !opts.dry_run) else {
            writeln!(out, "    [DRY RUN] Would generate description")?;
            summary.success += 1;
            continue;
        };

        let request = opts.prompts.request(name, &items);
        match generator.generate(&request).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(dataset = %name, chars = text.chars().count(), "Generated description");
                writeln!(out, "    Generated ({} chars)", text.chars().count())?;
                cache.insert(name.as_str(), text.as_str());
                cache.save(&opts.output)?;
                catalog::write_description_file(&dataset_dir, &text)?;
                writeln!(out, "    Wrote {}", catalog::DESCRIPTION_FILENAME)?;
                summary.success += 1;
            }
            Ok(_) => {
                error!(dataset = %name, "Generator returned an empty description");
                writeln!(out, "    Failed to generate")?;
                summary.failed += 1;
            }
            Err(e) => {
                error!(dataset = %name, error = %e, "Description generation failed");
                writeln!(out, "    API error {e}")?;
                writeln!(out, "    Failed to generate")?;
                summary.failed += 1;
            }
        }

        if i + 1 < total {
            pause(opts.delay).await;
        }
    }

    write_summary(out, &summary)?;
    if !opts.dry_run {
        writeln!(out, "\nDescriptions saved to: {}", opts.output.display())?;
    }
    info!(?summary, "Generate finished");
    Ok(summary)
}
