//! Description generation: turning a dataset's sample metadata into a prompt,
//! caching generated descriptions, and choosing where a dataset's description
//! comes from.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::{debug, error, info, warn};

use crate::catalog;
use crate::contract::{DescriptionGenerator, DescriptionRequest};
use crate::error::CommandError;

pub const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert who writes clear, authoritative descriptions of datasets.

Your task is to generate a comprehensive description of a dataset based on its name and sample content metadata.

Follow this structure:

1. Opening paragraph: Brief overview of what this dataset contains and its purpose
2. Key characteristics with bullet points: Scope, Format, Audience, Use cases
3. Typical content areas covered (bulleted list)
4. Additional context (if inferrable from the content)

Write in a professional, informative tone. Be specific about the content areas covered.";

pub const DEFAULT_USER_PROMPT_TEMPLATE: &str = "Generate a comprehensive description for this dataset:

**Dataset Name:** {name}

**Sample Content:**
{samples}

Generate the description following the structure provided. The dataset is named \"{name}\". Make the description detailed and specific to this dataset's content area.";

/// Placeholder reported in dry runs instead of calling the model.
pub const DRY_RUN_PLACEHOLDER: &str = "[would be generated]";

const ABSTRACT_LIMIT: usize = 300;

/// Everything needed to turn metadata into a [`DescriptionRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct PromptSettings {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt_template: String,
    pub title_field: String,
    pub abstract_field: String,
    pub sample_count: usize,
}

impl Default for PromptSettings {
    fn default() -> Self {
        PromptSettings {
            model: DEFAULT_MODEL.to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            user_prompt_template: DEFAULT_USER_PROMPT_TEMPLATE.to_string(),
            title_field: "title".to_string(),
            abstract_field: "abstract".to_string(),
            sample_count: 5,
        }
    }
}

impl PromptSettings {
    pub fn request(&self, name: &str, items: &[Value]) -> DescriptionRequest {
        let samples = format_samples(
            items,
            &self.title_field,
            &self.abstract_field,
            self.sample_count,
        );
        DescriptionRequest {
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            user_prompt: build_user_prompt(&self.user_prompt_template, name, &samples),
        }
    }
}

fn field_text(item: &Value, field: &str) -> Option<String> {
    match item.get(field)? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Numbered sample list for the prompt: title lines, each followed by its
/// abstract (cut to 300 characters) when there is one.
pub fn format_samples(
    items: &[Value],
    title_field: &str,
    abstract_field: &str,
    count: usize,
) -> String {
    let mut lines = Vec::new();
    for (i, item) in items.iter().take(count).enumerate() {
        let title = field_text(item, title_field).unwrap_or_else(|| "Untitled".to_string());
        lines.push(format!("{}. **{}**", i + 1, title));

        let abstract_text = field_text(item, abstract_field).unwrap_or_default();
        if !abstract_text.is_empty() {
            let shown = match abstract_text.char_indices().nth(ABSTRACT_LIMIT) {
                Some((idx, _)) => format!("{}...", &abstract_text[..idx]),
                None => abstract_text,
            };
            lines.push(format!("   Abstract: {shown}"));
        }
    }
    lines.join("\n")
}

pub fn build_user_prompt(template: &str, name: &str, samples: &str) -> String {
    template
        .replace("{name}", name)
        .replace("{samples}", samples)
}

/// Descriptions keyed by dataset name (or endpoint slug), persisted as JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptionCache {
    entries: BTreeMap<String, String>,
}

impl DescriptionCache {
    pub fn load(path: &Path) -> Result<Self, CommandError> {
        let text = fs::read_to_string(path).map_err(|source| CommandError::DescriptionsIo {
            path: path.to_path_buf(),
            source,
        })?;
        let entries: BTreeMap<String, String> =
            serde_json::from_str(&text).map_err(|source| CommandError::DescriptionsJson {
                path: path.to_path_buf(),
                source,
            })?;
        info!(path = %path.display(), count = entries.len(), "Loaded descriptions");
        Ok(DescriptionCache { entries })
    }

    /// Like [`DescriptionCache::load`], but a missing file is an empty cache.
    pub fn load_if_exists(path: &Path) -> Result<Self, CommandError> {
        match DescriptionCache::load(path) {
            Err(CommandError::DescriptionsIo { source, .. })
                if source.kind() == ErrorKind::NotFound =>
            {
                Ok(DescriptionCache::default())
            }
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), CommandError> {
        let json = serde_json::to_string_pretty(&self.entries).map_err(|source| {
            CommandError::DescriptionsJson {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, json).map_err(|source| CommandError::DescriptionsIo {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), count = self.entries.len(), "Saved descriptions");
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, description: impl Into<String>) {
        self.entries.insert(key.into(), description.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Where a resolved description came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    File,
    Cache,
    Generated,
    DryRun,
    Missing,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDescription {
    pub text: String,
    pub source: DescriptionSource,
}

impl ResolvedDescription {
    fn missing() -> Self {
        ResolvedDescription {
            text: String::new(),
            source: DescriptionSource::Missing,
        }
    }
}

/// Inputs to [`resolve_description`] besides the dataset itself.
pub struct Resolver<'a> {
    pub cache: &'a DescriptionCache,
    pub generator: Option<&'a dyn DescriptionGenerator>,
    pub prompts: &'a PromptSettings,
    pub generate_missing: bool,
    pub dry_run: bool,
}

/// Picks a dataset's description: the description file in its directory, then
/// the cache, then (with `generate_missing`) a freshly generated one, which is
/// written back to the description file. Falls back to an empty description.
pub async fn resolve_description<W: Write>(
    resolver: &Resolver<'_>,
    dataset_dir: &Path,
    name: &str,
    out: &mut W,
) -> Result<ResolvedDescription, CommandError> {
    if let Some(text) = catalog::read_description_file(dataset_dir)? {
        return Ok(ResolvedDescription {
            text,
            source: DescriptionSource::File,
        });
    }

    if let Some(text) = resolver.cache.get(name) {
        return Ok(ResolvedDescription {
            text: text.to_string(),
            source: DescriptionSource::Cache,
        });
    }

    if !resolver.generate_missing {
        return Ok(ResolvedDescription::missing());
    }

    let Some(generator) = resolver.generator else {
        writeln!(out, "    No OPENROUTER_API_KEY set, cannot generate description")?;
        warn!(dataset = name, "Description generation requested without an API key");
        return Ok(ResolvedDescription::missing());
    };

    let items = catalog::load_metadata(dataset_dir)?;
    if items.is_empty() {
        writeln!(out, "    No metadata to generate description from")?;
        return Ok(ResolvedDescription::missing());
    }

    if resolver.dry_run {
        writeln!(
            out,
            "    [DRY RUN] Would generate {}",
            catalog::DESCRIPTION_FILENAME
        )?;
        return Ok(ResolvedDescription {
            text: DRY_RUN_PLACEHOLDER.to_string(),
            source: DescriptionSource::DryRun,
        });
    }

    write!(out, "    Generating description... ")?;
    let request = resolver.prompts.request(name, &items);
    match generator.generate(&request).await {
        Ok(text) if !text.trim().is_empty() => {
            catalog::write_description_file(dataset_dir, &text)?;
            writeln!(
                out,
                "wrote {} ({} chars)",
                catalog::DESCRIPTION_FILENAME,
                text.chars().count()
            )?;
            Ok(ResolvedDescription {
                text,
                source: DescriptionSource::Generated,
            })
        }
        Ok(_) => {
            writeln!(out, "failed (empty response)")?;
            Ok(ResolvedDescription::missing())
        }
        Err(e) => {
            error!(dataset = name, error = %e, "Description generation failed");
            writeln!(out, "failed: {e}")?;
            Ok(ResolvedDescription::missing())
        }
    }
}
