use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

use super::{apply_limit, banner, pause, write_summary, RunSummary};
use crate::catalog::{self, DEFAULT_SAMPLE_LIMIT, FALLBACK_FILE_TYPES};
use crate::contract::{
    CatalogApi, CreateOutcome, DescriptionGenerator, NewDataset, NewEndpoint, ResourceId,
};
use crate::describe::{
    resolve_description, DescriptionCache, DescriptionSource, PromptSettings, Resolver,
};
use crate::error::CommandError;
use crate::progress::Progress;
use crate::slug::{display_name, render_template, slugify, MAX_SLUG_LENGTH};

/// Settings for a deploy run. Templates substitute `{name}`.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    pub source_dir: PathBuf,
    /// Where the dataset directories are mounted inside the platform container.
    pub container_dir: String,
    pub name_template: String,
    pub slug_template: String,
    pub summary_template: String,
    pub tags: String,
    pub infer_tags: bool,
    pub response_type: String,
    pub publish: bool,
    /// Comma separated extensions; auto-detected when absent.
    pub file_types: Option<String>,
    pub descriptions: Option<PathBuf>,
    pub generate_missing: bool,
    pub prompts: PromptSettings,
    pub progress_file: PathBuf,
    pub resume: bool,
    pub limit: usize,
    pub delay: Duration,
    pub dry_run: bool,
}

impl DeployOptions {
    fn dataset_payload(&self, name: &str, file_types: &[String]) -> NewDataset {
        let tags = if self.infer_tags {
            catalog::infer_tags(name, &self.tags)
        } else {
            self.tags.clone()
        };
        NewDataset::local_file(
            slugify(&render_template(&self.name_template, name), MAX_SLUG_LENGTH),
            format!("{}/{}", self.container_dir.trim_end_matches('/'), name),
            name,
            file_types.to_vec(),
            render_template(&self.summary_template, &display_name(name)),
            tags,
        )
    }

    fn endpoint_payload(
        &self,
        name: &str,
        description: String,
        dataset_id: Option<ResourceId>,
    ) -> NewEndpoint {
        let slug = slugify(&render_template(&self.slug_template, name), MAX_SLUG_LENGTH);
        NewEndpoint {
            name: slug.clone(),
            slug,
            description,
            summary: render_template(&self.summary_template, &display_name(name)),
            response_type: self.response_type.clone(),
            published: Some(self.publish),
            tags: self.tags.clone(),
            dataset_id,
            model: None,
        }
    }
}

/// Outcome of provisioning one dataset.
enum Step {
    Done,
    Failed,
}

/// Creates a dataset and a bound endpoint for every dataset directory.
///
/// Already-existing datasets and endpoints count as success, and every finished
/// dataset is recorded in the progress file so `resume` can skip it next time.
pub async fn deploy<A, W>(
    api: &A,
    generator: Option<&dyn DescriptionGenerator>,
    opts: &DeployOptions,
    out: &mut W,
) -> Result<RunSummary, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    banner(out, "DEPLOY DATASETS")?;
    writeln!(out, "API: {}", api.base_url())?;
    writeln!(out, "Source: {}", opts.source_dir.display())?;
    writeln!(out, "Dry run: {}", opts.dry_run)?;
    if opts.generate_missing {
        writeln!(out, "Generate missing descriptions: enabled")?;
    }
    writeln!(out)?;

    if !opts.dry_run {
        if !api.check_connection().await {
            error!(api = %api.base_url(), "API connection check failed");
            return Err(CommandError::Unreachable(api.base_url()));
        }
        writeln!(out, "API connected\n")?;
    }

    let file_types = match opts.file_types.as_deref() {
        Some(raw) => catalog::parse_file_types(raw),
        None => {
            let detected = catalog::detect_file_types(&opts.source_dir, DEFAULT_SAMPLE_LIMIT)?;
            if detected.is_empty() {
                warn!("No file types detected, using fallback");
                writeln!(
                    out,
                    "Warning: No file types detected, using [{}]",
                    FALLBACK_FILE_TYPES.join(", ")
                )?;
                FALLBACK_FILE_TYPES.iter().map(|t| t.to_string()).collect()
            } else {
                writeln!(out, "Auto-detected file types: {}", detected.join(", "))?;
                detected
            }
        }
    };

    let cache = match &opts.descriptions {
        Some(path) => {
            let cache = DescriptionCache::load(path)?;
            writeln!(out, "Loaded {} descriptions from JSON", cache.len())?;
            cache
        }
        None => DescriptionCache::default(),
    };
    let resolver = Resolver {
        cache: &cache,
        generator,
        prompts: &opts.prompts,
        generate_missing: opts.generate_missing,
        dry_run: opts.dry_run,
    };

    let mut progress = Progress::load_or_fresh(&opts.progress_file, opts.resume)?;

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

        if opts.resume && progress.is_deployed(name) {
            writeln!(out, "    Skipped (already deployed)")?;
            summary.skipped += 1;
            continue;
        }

        match deploy_one(api, &resolver, opts, &file_types, name, out).await? {
            Step::Done => {
                summary.success += 1;
                if !opts.dry_run {
                    progress.record_deployed(name);
                    progress.save(&opts.progress_file)?;
                }
            }
            Step::Failed => {
                summary.failed += 1;
                progress.record_failed(name);
                progress.save(&opts.progress_file)?;
            }
        }
    }

    write_summary(out, &summary)?;
    info!(?summary, "Deploy finished");
    Ok(summary)
}

async fn deploy_one<A, W>(
    api: &A,
    resolver: &Resolver<'_>,
    opts: &DeployOptions,
    file_types: &[String],
    name: &str,
    out: &mut W,
) -> Result<Step, CommandError>
where
    A: CatalogApi + ?Sized,
    W: Write,
{
    let dataset_dir = opts.source_dir.join(name);

    let description = resolve_description(resolver, &dataset_dir, name, out).await?;
    if !description.text.is_empty() {
        let origin = match description.source {
            DescriptionSource::File => catalog::DESCRIPTION_FILENAME,
            DescriptionSource::Cache => "JSON",
            DescriptionSource::Generated => "generator",
            DescriptionSource::DryRun | DescriptionSource::Missing => "dry run",
        };
        writeln!(
            out,
            "    Description: {} chars (from {})",
            description.text.chars().count(),
            origin
        )?;
    }

    let dataset = opts.dataset_payload(name, file_types);
    let mut dataset_id = None;

    if opts.dry_run {
        writeln!(out, "    [DRY RUN] Would create dataset: {}", dataset.name)?;
    } else {
        info!(dataset = %dataset.name, "Creating dataset");
        let created = match api.create_dataset(&dataset).await {
            Ok(CreateOutcome::Created(ds)) => Ok(ds),
            Ok(CreateOutcome::AlreadyExists) => match api.get_dataset(&dataset.name).await {
                Ok(Some(ds)) => Ok(ds),
                Ok(None) => Err("Dataset exists but couldn't fetch".to_string()),
                Err(e) => Err(format!("Dataset exists but couldn't fetch: {e}")),
            },
            Err(e) => Err(e.to_string()),
        };
        match created {
            Ok(ds) => {
                writeln!(out, "    Dataset: {}", dataset.name)?;
                dataset_id = ds.id;
            }
            Err(msg) => {
                error!(dataset = %dataset.name, error = %msg, "Dataset creation failed");
                writeln!(out, "    Dataset failed: {msg}")?;
                return Ok(Step::Failed);
            }
        }
        pause(opts.delay).await;
    }

    let endpoint = opts.endpoint_payload(name, description.text, dataset_id);

    if opts.dry_run {
        writeln!(out, "    [DRY RUN] Would create endpoint: {}", endpoint.slug)?;
        if opts.publish {
            writeln!(
                out,
                "    [DRY RUN] Would publish to marketplace: {}",
                endpoint.slug
            )?;
        }
        return Ok(Step::Done);
    }

    info!(endpoint = %endpoint.slug, "Creating endpoint");
    match api.create_endpoint(&endpoint).await {
        Ok(CreateOutcome::Created(_)) => {
            writeln!(out, "    Endpoint: {}", endpoint.slug)?;
        }
        Ok(CreateOutcome::AlreadyExists) => {
            writeln!(out, "    Endpoint: {} (already exists)", endpoint.slug)?;
        }
        Err(e) => {
            error!(endpoint = %endpoint.slug, error = %e, "Endpoint creation failed");
            writeln!(out, "    Endpoint failed: {e}")?;
            return Ok(Step::Failed);
        }
    }
    pause(opts.delay).await;

    if opts.publish {
        match api.publish_endpoint(&endpoint.slug).await {
            Ok(()) => writeln!(out, "    Published to marketplace")?,
            Err(e) => {
                warn!(endpoint = %endpoint.slug, error = %e, "Publish failed");
                writeln!(out, "    Publish to marketplace failed: {e}")?;
            }
        }
        pause(opts.delay).await;
    }

    Ok(Step::Done)
}
