//! Filesystem side of the catalog: every non-hidden subdirectory of the source
//! directory is one dataset.

use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Name of the per-dataset description file.
pub const DESCRIPTION_FILENAME: &str = "journal_description.md";

/// Number of directory entries inspected when guessing file types.
pub const DEFAULT_SAMPLE_LIMIT: usize = 100;

/// Used when no extension can be detected.
pub const FALLBACK_FILE_TYPES: &[&str] = &[".pdf", ".json"];

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CatalogError + '_ {
    move |source| CatalogError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Sorted names of the non-hidden subdirectories of `source_dir`.
pub fn discover_datasets(source_dir: &Path) -> Result<Vec<String>, CatalogError> {
    let mut names = Vec::new();
    for entry in fs::read_dir(source_dir).map_err(io_err(source_dir))? {
        let entry = entry.map_err(io_err(source_dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.path().is_dir() {
            continue;
        }
        names.push(name);
    }
    names.sort();
    info!(source_dir = %source_dir.display(), count = names.len(), "Discovered datasets");
    Ok(names)
}

/// Lowercased extensions (with the leading dot) found in the first dataset directory.
///
/// The walk stops after `sample_limit` entries so huge directories stay cheap.
pub fn detect_file_types(
    source_dir: &Path,
    sample_limit: usize,
) -> Result<Vec<String>, CatalogError> {
    let datasets = discover_datasets(source_dir)?;
    let Some(first) = datasets.first() else {
        return Ok(Vec::new());
    };

    let mut extensions = BTreeSet::new();
    let mut visited = 0usize;
    visit(
        &source_dir.join(first),
        sample_limit,
        &mut visited,
        &mut extensions,
    )?;
    debug!(dataset = %first, visited, ?extensions, "Detected file types");
    Ok(extensions.into_iter().collect())
}

fn visit(
    dir: &Path,
    limit: usize,
    visited: &mut usize,
    extensions: &mut BTreeSet<String>,
) -> Result<(), CatalogError> {
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        if *visited >= limit {
            return Ok(());
        }
        *visited += 1;
        let path = entry.map_err(io_err(dir))?.path();
        if path.is_dir() {
            visit(&path, limit, visited, extensions)?;
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            if !ext.is_empty() {
                extensions.insert(format!(".{}", ext.to_lowercase()));
            }
        }
    }
    Ok(())
}

/// Parses a comma separated `--file-types` value.
pub fn parse_file_types(raw: &str) -> Vec<String> {
    split_csv(raw)
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Metadata items from the first JSON file (by name) in a dataset directory.
///
/// An array yields its elements, any other document yields one item.
pub fn load_metadata(dataset_dir: &Path) -> Result<Vec<Value>, CatalogError> {
    let mut json_files: Vec<PathBuf> = fs::read_dir(dataset_dir)
        .map_err(io_err(dataset_dir))?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|e| e == "json"))
        .collect();
    json_files.sort();

    let Some(first) = json_files.first() else {
        debug!(dir = %dataset_dir.display(), "No metadata JSON in dataset directory");
        return Ok(Vec::new());
    };

    let text = fs::read_to_string(first).map_err(io_err(first))?;
    let doc: Value = serde_json::from_str(&text).map_err(|source| CatalogError::Json {
        path: first.clone(),
        source,
    })?;
    Ok(match doc {
        Value::Array(items) => items,
        other => vec![other],
    })
}

/// Contents of the description file, trimmed. `None` when the file is absent.
pub fn read_description_file(dataset_dir: &Path) -> Result<Option<String>, CatalogError> {
    let path = dataset_dir.join(DESCRIPTION_FILENAME);
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(&path).map_err(io_err(&path))?;
    Ok(Some(text.trim().to_string()))
}

pub fn write_description_file(dataset_dir: &Path, description: &str) -> Result<(), CatalogError> {
    let path = dataset_dir.join(DESCRIPTION_FILENAME);
    fs::write(&path, description).map_err(io_err(&path))?;
    info!(path = %path.display(), chars = description.chars().count(), "Wrote description file");
    Ok(())
}

/// Comma separated tags, extended with topic tags guessed from the dataset name.
pub fn infer_tags(name: &str, base_tags: &str) -> String {
    const TOPICS: &[(&[&str], &str)] = &[
        (&["law", "legal"], "law"),
        (&["medical", "health", "psych"], "health"),
        (&["economic", "finance"], "economics"),
        (&["politic", "government"], "politics"),
    ];

    let lower = name.to_lowercase();
    let mut tags = split_csv(base_tags);
    for (needles, tag) in TOPICS {
        if needles.iter().any(|n| lower.contains(n)) && !tags.iter().any(|t| t == tag) {
            tags.push((*tag).to_string());
        }
    }
    debug!(name, ?tags, "Inferred tags");
    tags.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_skips_hidden_and_plain_files() {
        let root = tempdir().unwrap();
        fs::create_dir(root.path().join("zeta")).unwrap();
        fs::create_dir(root.path().join("alpha")).unwrap();
        fs::create_dir(root.path().join(".cache")).unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();

        let names = discover_datasets(root.path()).unwrap();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn discover_fails_for_missing_directory() {
        let root = tempdir().unwrap();
        assert!(discover_datasets(&root.path().join("nope")).is_err());
    }

    #[test]
    fn detects_extensions_in_first_dataset_only() {
        let root = tempdir().unwrap();
        let first = root.path().join("a-journal");
        fs::create_dir_all(first.join("pdfs")).unwrap();
        fs::write(first.join("meta.JSON"), "[]").unwrap();
        fs::write(first.join("pdfs").join("one.pdf"), "").unwrap();
        fs::write(first.join("README"), "").unwrap();
        let second = root.path().join("b-journal");
        fs::create_dir(&second).unwrap();
        fs::write(second.join("x.csv"), "").unwrap();

        let types = detect_file_types(root.path(), DEFAULT_SAMPLE_LIMIT).unwrap();
        assert_eq!(types, vec![".json", ".pdf"]);
    }

    #[test]
    fn detection_on_empty_source_is_empty() {
        let root = tempdir().unwrap();
        assert!(detect_file_types(root.path(), 10).unwrap().is_empty());
    }

    #[test]
    fn detection_stops_after_sample_limit() {
        let root = tempdir().unwrap();
        let dataset = root.path().join("acta");
        fs::create_dir(&dataset).unwrap();
        for ext in ["pdf", "json", "csv", "txt", "md"] {
            fs::write(dataset.join(format!("item.{ext}")), "").unwrap();
        }

        assert_eq!(detect_file_types(root.path(), 2).unwrap().len(), 2);
        assert!(detect_file_types(root.path(), 0).unwrap().is_empty());
        assert_eq!(detect_file_types(root.path(), 100).unwrap().len(), 5);
    }

    #[test]
    fn file_type_list_is_trimmed() {
        assert_eq!(parse_file_types(" .pdf, .json ,"), vec![".pdf", ".json"]);
    }

    #[test]
    fn metadata_object_becomes_single_item() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.json"), r#"[{"title": "ignored"}]"#).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"title": "first"}"#).unwrap();

        let items = load_metadata(dir.path()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["title"], "first");
    }

    #[test]
    fn metadata_missing_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_metadata(dir.path()).unwrap().is_empty());
    }

    #[test]
    fn description_file_is_trimmed() {
        let dir = tempdir().unwrap();
        assert_eq!(read_description_file(dir.path()).unwrap(), None);
        write_description_file(dir.path(), "  About this journal.\n").unwrap();
        assert_eq!(
            read_description_file(dir.path()).unwrap().as_deref(),
            Some("About this journal.")
        );
    }

    #[test]
    fn tags_are_inferred_from_name() {
        assert_eq!(
            infer_tags("journal-of-health-economics", "cambridge,journal"),
            "cambridge,journal,health,economics"
        );
        assert_eq!(infer_tags("legal-studies", "law"), "law");
        assert_eq!(infer_tags("astronomy", ""), "");
    }
}
