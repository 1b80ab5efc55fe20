/// # syft-deploy CLI Interface (Module)
///
/// Argument surface and the async [`run`] entrypoint. Everything here is glue:
/// flags are merged with the optional YAML defaults file, the HTTP clients are
/// constructed, and the matching handler from `syft_deploy_core::commands` is
/// invoked with stdout as its progress writer.
///
/// Exit codes: `deploy`, `generate` and `fix-names` return 1 when any item
/// failed. `list`, `delete`, `publish` and `update` return 0 unless the run
/// itself could not proceed, which surfaces as an error.
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use syft_deploy_core::commands::{
    self, DeleteOptions, DeployOptions, FixNamesOptions, GenerateOptions, ListOptions,
    PublishOptions, RunSummary, UpdateOptions,
};
use syft_deploy_core::contract::{CatalogApi, DescriptionGenerator};
use syft_deploy_core::describe::{PromptSettings, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT};

use crate::client::SpaceClient;
use crate::load_config::{
    load_optional_config, openrouter_api_key, CliConfig, Settings, DEFAULT_TEMPLATE,
};
use crate::openrouter::OpenRouterClient;

/// CLI for syft-deploy: bulk-manage datasets and endpoints on Syft Space.
#[derive(Parser, Debug)]
#[clap(
    name = "syft-deploy",
    version,
    about = "Deploy local dataset directories to Syft Space as datasets and published endpoints"
)]
pub struct Cli {
    /// YAML file with default values for command flags
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List datasets and endpoints
    List {
        /// List only datasets
        #[clap(long)]
        datasets: bool,
        /// List only endpoints
        #[clap(long)]
        endpoints: bool,
    },
    /// Create a dataset and endpoint for every dataset directory
    Deploy(DeployArgs),
    /// Delete datasets and/or endpoints
    Delete {
        /// Delete only datasets
        #[clap(long)]
        datasets: bool,
        /// Delete only endpoints
        #[clap(long)]
        endpoints: bool,
        /// Preview without making changes
        #[clap(long)]
        dry_run: bool,
        /// Skip confirmation
        #[clap(long, short = 'y')]
        yes: bool,
        /// Delay between API calls (seconds)
        #[clap(long, default_value_t = 0.3, value_parser = parse_delay)]
        delay: f64,
        #[clap(long)]
        progress_file: Option<PathBuf>,
    },
    /// Publish unpublished endpoints to all marketplaces
    Publish {
        #[clap(long)]
        dry_run: bool,
        /// Limit to N endpoints (0 = all)
        #[clap(long, default_value_t = 0)]
        limit: usize,
        #[clap(long, default_value_t = 0.3, value_parser = parse_delay)]
        delay: f64,
    },
    /// Update endpoint descriptions from a descriptions file
    Update {
        #[clap(long)]
        dry_run: bool,
        #[clap(long, default_value_t = 0)]
        limit: usize,
        /// Skip already updated endpoints
        #[clap(long)]
        resume: bool,
        #[clap(long, default_value_t = 0.5, value_parser = parse_delay)]
        delay: f64,
        /// JSON file mapping endpoint slug to description
        #[clap(long)]
        descriptions: Option<PathBuf>,
        /// Also rewrite the summary, `{name}` is the display name of the slug
        #[clap(long)]
        summary_template: Option<String>,
        #[clap(long)]
        progress_file: Option<PathBuf>,
    },
    /// Generate dataset descriptions with OpenRouter
    Generate(GenerateArgs),
    /// Recreate endpoints whose name contains spaces, using the slug as name
    FixNames {
        #[clap(long)]
        dry_run: bool,
        #[clap(long, default_value_t = 0.5, value_parser = parse_delay)]
        delay: f64,
        #[clap(long)]
        progress_file: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Directory whose subdirectories are the datasets
    #[clap(long)]
    pub source_dir: Option<PathBuf>,
    /// Path of the source directory inside the Syft Space container
    #[clap(long)]
    pub container_dir: Option<String>,
    /// Dataset name, `{name}` is the directory name
    #[clap(long)]
    pub name_template: Option<String>,
    /// Endpoint slug, `{name}` is the directory name
    #[clap(long)]
    pub slug_template: Option<String>,
    /// Summary, `{name}` is the display name of the directory
    #[clap(long)]
    pub summary_template: Option<String>,
    /// Comma separated tags
    #[clap(long)]
    pub tags: Option<String>,
    /// Add topic tags inferred from the directory name
    #[clap(long)]
    pub infer_tags: bool,
    #[clap(long)]
    pub response_type: Option<String>,
    /// Publish endpoints to all marketplaces after creating them
    #[clap(long)]
    pub publish: bool,
    /// Comma separated extensions to ingest (auto-detected when omitted)
    #[clap(long)]
    pub file_types: Option<String>,
    /// JSON file mapping dataset name to description
    #[clap(long)]
    pub descriptions: Option<PathBuf>,
    /// Generate descriptions for datasets that have none
    #[clap(long)]
    pub generate_missing: bool,
    #[clap(long)]
    pub model: Option<String>,
    #[clap(long)]
    pub progress_file: Option<PathBuf>,
    /// Skip already deployed datasets
    #[clap(long)]
    pub resume: bool,
    /// Limit to N datasets (0 = all)
    #[clap(long, default_value_t = 0)]
    pub limit: usize,
    #[clap(long, default_value_t = 0.5, value_parser = parse_delay)]
    pub delay: f64,
    /// Preview without making changes
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct GenerateArgs {
    #[clap(long)]
    pub source_dir: Option<PathBuf>,
    /// Descriptions file to write
    #[clap(long)]
    pub output: Option<PathBuf>,
    #[clap(long)]
    pub model: Option<String>,
    #[clap(long, conflicts_with = "system_prompt_file")]
    pub system_prompt: Option<String>,
    #[clap(long)]
    pub system_prompt_file: Option<PathBuf>,
    /// User prompt with `{name}` and `{samples}` placeholders
    #[clap(long)]
    pub user_prompt_template: Option<String>,
    /// Metadata field holding the item title
    #[clap(long, default_value = "title")]
    pub metadata_field: String,
    #[clap(long, default_value = "abstract")]
    pub abstract_field: String,
    /// Number of metadata items shown to the model
    #[clap(long, default_value_t = 5)]
    pub sample_count: usize,
    /// Keep descriptions already in the output file
    #[clap(long)]
    pub resume: bool,
    #[clap(long, default_value_t = 0)]
    pub limit: usize,
    #[clap(long, default_value_t = 1.5, value_parser = parse_delay)]
    pub delay: f64,
    #[clap(long)]
    pub dry_run: bool,
}

fn parse_delay(raw: &str) -> std::result::Result<f64, String> {
    let secs: f64 = raw
        .parse()
        .map_err(|_| format!("`{raw}` is not a number of seconds"))?;
    if secs.is_finite() && secs >= 0.0 {
        Ok(secs)
    } else {
        Err(format!("`{raw}` must be a non-negative number of seconds"))
    }
}

fn delay(secs: f64) -> Duration {
    Duration::from_secs_f64(secs)
}

fn exit_code(summary: &RunSummary) -> u8 {
    u8::from(summary.has_failures())
}

async fn space_client(config: &CliConfig) -> Result<SpaceClient> {
    let settings = Settings::from_env(config).await;
    SpaceClient::new(&settings.api_url, &settings.api_key)
        .context("Failed to construct Syft Space client")
}

fn description_generator() -> Result<Option<OpenRouterClient>> {
    openrouter_api_key()
        .map(|key| OpenRouterClient::new(&key))
        .transpose()
        .context("Failed to construct OpenRouter client")
}

fn source_dir(flag: Option<PathBuf>, config: &CliConfig) -> Result<PathBuf> {
    flag.or_else(|| config.defaults.source_dir.clone())
        .context("--source-dir is required (or set defaults.source_dir in the config file)")
}

fn template(flag: Option<String>, configured: &Option<String>) -> String {
    flag.or_else(|| configured.clone())
        .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string())
}

fn model(flag: Option<String>, config: &CliConfig) -> String {
    flag.or_else(|| config.defaults.model.clone())
        .unwrap_or_else(|| DEFAULT_MODEL.to_string())
}

/// Builds the handler options for `deploy`; flags win over the config file.
pub fn deploy_options(args: DeployArgs, config: &CliConfig) -> Result<DeployOptions> {
    let defaults = &config.defaults;
    Ok(DeployOptions {
        source_dir: source_dir(args.source_dir, config)?,
        container_dir: args.container_dir.unwrap_or_else(|| defaults.container_dir()),
        name_template: template(args.name_template, &defaults.name_template),
        slug_template: template(args.slug_template, &defaults.slug_template),
        summary_template: template(args.summary_template, &defaults.summary_template),
        tags: args
            .tags
            .or_else(|| defaults.tags.clone())
            .unwrap_or_default(),
        infer_tags: args.infer_tags,
        response_type: args.response_type.unwrap_or_else(|| defaults.response_type()),
        publish: args.publish,
        file_types: args.file_types,
        descriptions: args.descriptions.or_else(|| defaults.descriptions.clone()),
        generate_missing: args.generate_missing,
        prompts: PromptSettings {
            model: model(args.model, config),
            ..PromptSettings::default()
        },
        progress_file: args.progress_file.unwrap_or_else(|| defaults.progress_file()),
        resume: args.resume,
        limit: args.limit,
        delay: delay(args.delay),
        dry_run: args.dry_run,
    })
}

/// Builds the handler options for `generate`, reading the system prompt file if given.
pub fn generate_options(args: GenerateArgs, config: &CliConfig) -> Result<GenerateOptions> {
    let system_prompt = match (args.system_prompt, args.system_prompt_file) {
        (Some(prompt), _) => prompt,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("Failed to read system prompt file {}", path.display()))?,
        (None, None) => DEFAULT_SYSTEM_PROMPT.to_string(),
    };
    let defaults = PromptSettings::default();
    Ok(GenerateOptions {
        source_dir: source_dir(args.source_dir, config)?,
        output: args.output.unwrap_or_else(|| config.defaults.descriptions()),
        prompts: PromptSettings {
            model: model(args.model, config),
            system_prompt,
            user_prompt_template: args
                .user_prompt_template
                .unwrap_or(defaults.user_prompt_template),
            title_field: args.metadata_field,
            abstract_field: args.abstract_field,
            sample_count: args.sample_count,
        },
        resume: args.resume,
        limit: args.limit,
        delay: delay(args.delay),
        dry_run: args.dry_run,
    })
}

/// Asks for a typed `yes` on stdin.
fn confirmed<W: Write>(out: &mut W) -> Result<bool> {
    write!(out, "Are you sure? Type 'yes' to confirm: ")?;
    out.flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

/// Extracted async CLI logic entrypoint for integration tests and main().
/// Returns the process exit code.
pub async fn run(cli: Cli) -> Result<u8> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_optional_config(cli.config.as_deref())?;
    let mut out = io::stdout();

    let code = match cli.command {
        Commands::List {
            datasets,
            endpoints,
        } => {
            tracing::info!(command = "list", "Listing resources");
            let api = space_client(&config).await?;
            let opts = ListOptions {
                datasets,
                endpoints,
            };
            commands::list(&api, &opts, &mut out).await?;
            0
        }
        Commands::Deploy(args) => {
            let opts = deploy_options(args, &config)?;
            tracing::info!(command = "deploy", source = %opts.source_dir.display(), "Starting deploy");
            let api = space_client(&config).await?;
            let generator = if opts.generate_missing {
                description_generator()?
            } else {
                None
            };
            let generator = generator.as_ref().map(|g| g as &dyn DescriptionGenerator);
            let summary = commands::deploy(&api, generator, &opts, &mut out).await?;
            exit_code(&summary)
        }
        Commands::Delete {
            datasets,
            endpoints,
            dry_run,
            yes,
            delay: secs,
            progress_file,
        } => {
            let api = space_client(&config).await?;
            let opts = DeleteOptions {
                datasets,
                endpoints,
                progress_file: progress_file.unwrap_or_else(|| config.defaults.progress_file()),
                delay: delay(secs),
                dry_run,
            };
            commands::delete::write_delete_plan(&api.base_url(), &opts, &mut out)?;
            if !dry_run && !yes && !confirmed(&mut out)? {
                writeln!(out, "Aborted")?;
                tracing::info!(command = "delete", "Deletion aborted by operator");
                return Ok(0);
            }
            tracing::info!(command = "delete", "Deleting resources");
            commands::delete(&api, &opts, &mut out).await?;
            0
        }
        Commands::Publish {
            dry_run,
            limit,
            delay: secs,
        } => {
            tracing::info!(command = "publish", "Publishing endpoints");
            let api = space_client(&config).await?;
            let opts = PublishOptions {
                limit,
                delay: delay(secs),
                dry_run,
            };
            commands::publish(&api, &opts, &mut out).await?;
            0
        }
        Commands::Update {
            dry_run,
            limit,
            resume,
            delay: secs,
            descriptions,
            summary_template,
            progress_file,
        } => {
            tracing::info!(command = "update", "Updating endpoint descriptions");
            let api = space_client(&config).await?;
            let opts = UpdateOptions {
                descriptions: descriptions.unwrap_or_else(|| config.defaults.descriptions()),
                summary_template,
                progress_file: progress_file.unwrap_or_else(|| config.defaults.progress_file()),
                resume,
                limit,
                delay: delay(secs),
                dry_run,
            };
            commands::update(&api, &opts, &mut out).await?;
            0
        }
        Commands::Generate(args) => {
            let opts = generate_options(args, &config)?;
            tracing::info!(command = "generate", model = %opts.prompts.model, "Generating descriptions");
            let generator = description_generator()?;
            let generator = generator.as_ref().map(|g| g as &dyn DescriptionGenerator);
            let summary = commands::generate(generator, &opts, &mut out).await?;
            exit_code(&summary)
        }
        Commands::FixNames {
            dry_run,
            delay: secs,
            progress_file,
        } => {
            tracing::info!(command = "fix-names", "Fixing endpoint names");
            let api = space_client(&config).await?;
            let opts = FixNamesOptions {
                progress_file: progress_file.unwrap_or_else(|| PathBuf::from(FIX_NAMES_PROGRESS)),
                delay: delay(secs),
                dry_run,
            };
            let summary = commands::fix_names(&api, &opts, &mut out).await?;
            exit_code(&summary)
        }
    };

    out.flush()?;
    Ok(code)
}

/// fix-names keeps its own progress file so it never mixes with deploy state.
const FIX_NAMES_PROGRESS: &str = "fix_endpoint_names_progress.json";
