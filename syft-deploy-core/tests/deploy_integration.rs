use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::tempdir;

use syft_deploy_core::commands::{deploy, DeployOptions};
use syft_deploy_core::contract::{
    CreateOutcome, Dataset, Endpoint, MockCatalogApi, MockDescriptionGenerator, RemoteError,
    ResourceId,
};
use syft_deploy_core::describe::PromptSettings;
use syft_deploy_core::error::CommandError;
use syft_deploy_core::progress::Progress;

fn make_dataset(root: &Path, name: &str, description: Option<&str>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("metadata.json"),
        r#"[{"title": "First Title", "abstract": "An abstract."}]"#,
    )
    .unwrap();
    if let Some(text) = description {
        fs::write(dir.join("journal_description.md"), text).unwrap();
    }
}

fn options(source: &Path, progress_file: &Path) -> DeployOptions {
    DeployOptions {
        source_dir: source.to_path_buf(),
        container_dir: "/root/datasets".to_string(),
        name_template: "{name}".to_string(),
        slug_template: "{name}".to_string(),
        summary_template: "{name}".to_string(),
        tags: "journal".to_string(),
        infer_tags: false,
        response_type: "both".to_string(),
        publish: false,
        file_types: Some(".pdf, .json".to_string()),
        descriptions: None,
        generate_missing: false,
        prompts: PromptSettings::default(),
        progress_file: progress_file.to_path_buf(),
        resume: false,
        limit: 0,
        delay: Duration::ZERO,
        dry_run: false,
    }
}

fn connected_api() -> MockCatalogApi {
    let mut api = MockCatalogApi::new();
    api.expect_base_url()
        .return_const("http://localhost:8080/api/v1".to_string());
    api.expect_check_connection().returning(|| true);
    api
}

fn dataset_with_id(name: &str, id: i64) -> Dataset {
    Dataset {
        id: Some(ResourceId::Int(id)),
        name: name.to_string(),
        ..Dataset::default()
    }
}

#[tokio::test]
async fn test_deploy_creates_dataset_and_endpoint_and_records_progress() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "journal-of-law", Some("A law journal."));

    let mut api = connected_api();
    api.expect_create_dataset()
        .withf(|payload| {
            payload.name == "journal-of-law"
                && payload.dtype == "local_file"
                && payload.configuration.file_paths[0].path == "/root/datasets/journal-of-law"
                && payload.configuration.ingest_file_type_options
                    == vec![".pdf".to_string(), ".json".to_string()]
                && payload.summary == "Journal Of Law"
        })
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(dataset_with_id("journal-of-law", 42))));
    api.expect_create_endpoint()
        .withf(|payload| {
            payload.slug == "journal-of-law"
                && payload.name == "journal-of-law"
                && payload.description == "A law journal."
                && payload.dataset_id == Some(ResourceId::Int(42))
        })
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let opts = options(source.path(), &progress_file);
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out)
        .await
        .expect("deploy should succeed");

    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 0);
    let progress = Progress::load(&progress_file).unwrap();
    assert_eq!(progress.deployed, vec!["journal-of-law".to_string()]);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[1/1] journal-of-law"));
    assert!(text.contains("Description: 14 chars (from journal_description.md)"));
    assert!(text.contains("Success:  1"));
}

#[tokio::test]
async fn test_deploy_fetches_existing_dataset_on_conflict() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "medical-review", None);

    let mut api = connected_api();
    api.expect_create_dataset()
        .returning(|_| Ok(CreateOutcome::AlreadyExists));
    api.expect_get_dataset()
        .withf(|name| name == "medical-review")
        .times(1)
        .returning(|name| Ok(Some(dataset_with_id(name, 7))));
    api.expect_create_endpoint()
        .withf(|payload| payload.dataset_id == Some(ResourceId::Int(7)))
        .returning(|_| Ok(CreateOutcome::AlreadyExists));

    let opts = options(source.path(), &progress_file);
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 1);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Endpoint: medical-review (already exists)"));
}

#[tokio::test]
async fn test_deploy_records_failures_and_continues() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "alpha", None);
    make_dataset(source.path(), "beta", None);

    let mut api = connected_api();
    api.expect_create_dataset().returning(|payload| {
        if payload.name == "alpha" {
            Err(RemoteError::status(500, "internal error"))
        } else {
            Ok(CreateOutcome::Created(dataset_with_id(&payload.name, 2)))
        }
    });
    api.expect_create_endpoint()
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let opts = options(source.path(), &progress_file);
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.has_failures());
    let progress = Progress::load(&progress_file).unwrap();
    assert_eq!(progress.failed, vec!["alpha".to_string()]);
    assert_eq!(progress.deployed, vec!["beta".to_string()]);

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Dataset failed: 500: internal error"));
}

#[tokio::test]
async fn test_deploy_resume_skips_deployed_datasets() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "alpha", None);
    make_dataset(source.path(), "beta", None);

    let mut done = Progress::default();
    done.record_deployed("alpha");
    done.save(&progress_file).unwrap();

    let mut api = connected_api();
    api.expect_create_dataset()
        .withf(|payload| payload.name == "beta")
        .times(1)
        .returning(|payload| Ok(CreateOutcome::Created(dataset_with_id(&payload.name, 3))));
    api.expect_create_endpoint()
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let mut opts = options(source.path(), &progress_file);
    opts.resume = true;
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success, 1);
    let progress = Progress::load(&progress_file).unwrap();
    assert_eq!(progress.deployed, vec!["alpha".to_string(), "beta".to_string()]);
}

#[tokio::test]
async fn test_deploy_dry_run_touches_nothing() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "alpha", None);

    // Only the base URL is read; any mutating call would panic on the mock.
    let mut api = MockCatalogApi::new();
    api.expect_base_url()
        .return_const("http://localhost:8080/api/v1".to_string());

    let mut opts = options(source.path(), &progress_file);
    opts.dry_run = true;
    opts.publish = true;
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 1);
    assert!(!progress_file.exists());
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("[DRY RUN] Would create dataset: alpha"));
    assert!(text.contains("[DRY RUN] Would create endpoint: alpha"));
    assert!(text.contains("[DRY RUN] Would publish to marketplace: alpha"));
}

#[tokio::test]
async fn test_deploy_fails_when_api_unreachable() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();

    let mut api = MockCatalogApi::new();
    api.expect_base_url()
        .return_const("http://localhost:9/api/v1".to_string());
    api.expect_check_connection().returning(|| false);

    let opts = options(source.path(), &state.path().join("progress.json"));
    let mut out = Vec::new();
    let err = deploy(&api, None, &opts, &mut out).await.unwrap_err();

    assert!(matches!(err, CommandError::Unreachable(_)));
    assert_eq!(
        err.to_string(),
        "Cannot connect to API at http://localhost:9/api/v1"
    );
}

#[tokio::test]
async fn test_deploy_generates_missing_description_and_publishes() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "alpha", None);

    let mut generator = MockDescriptionGenerator::new();
    generator
        .expect_generate()
        .withf(|req| req.user_prompt.contains("1. **First Title**"))
        .times(1)
        .returning(|_| Ok("Generated text.".to_string()));

    let mut api = connected_api();
    api.expect_create_dataset()
        .returning(|payload| Ok(CreateOutcome::Created(dataset_with_id(&payload.name, 1))));
    api.expect_create_endpoint()
        .withf(|payload| payload.description == "Generated text." && payload.published == Some(true))
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));
    api.expect_publish_endpoint()
        .withf(|slug| slug == "alpha")
        .times(1)
        .returning(|_| Err(RemoteError::status(502, "marketplace down")));

    let mut opts = options(source.path(), &progress_file);
    opts.generate_missing = true;
    opts.publish = true;
    let mut out = Vec::new();
    let summary = deploy(&api, Some(&generator), &opts, &mut out)
        .await
        .unwrap();

    // A failed publish is only a warning.
    assert_eq!(summary.success, 1);
    assert_eq!(
        fs::read_to_string(source.path().join("alpha/journal_description.md")).unwrap(),
        "Generated text."
    );
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Publish to marketplace failed: 502: marketplace down"));
}

#[tokio::test]
async fn test_deploy_prefers_description_cache_over_generation() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    let cache_file = state.path().join("descriptions.json");
    make_dataset(source.path(), "alpha", None);
    fs::write(&cache_file, r#"{"alpha": "From cache."}"#).unwrap();

    let mut api = connected_api();
    api.expect_create_dataset()
        .returning(|payload| Ok(CreateOutcome::Created(dataset_with_id(&payload.name, 1))));
    api.expect_create_endpoint()
        .withf(|payload| payload.description == "From cache.")
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let mut opts = options(source.path(), &progress_file);
    opts.descriptions = Some(cache_file);
    let mut out = Vec::new();
    deploy(&api, None, &opts, &mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Loaded 1 descriptions from JSON"));
    assert!(text.contains("(from JSON)"));
}

#[tokio::test]
async fn test_deploy_falls_back_to_default_file_types_when_none_detected() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    let dir = source.path().join("plain-archive");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("README"), "no extension").unwrap();

    let mut api = connected_api();
    api.expect_create_dataset()
        .withf(|payload| {
            payload.configuration.ingest_file_type_options
                == vec![".pdf".to_string(), ".json".to_string()]
        })
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(dataset_with_id("plain-archive", 3))));
    api.expect_create_endpoint()
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let mut opts = options(source.path(), &progress_file);
    opts.file_types = None;
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 1);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Warning: No file types detected, using [.pdf, .json]"));
}

#[tokio::test]
async fn test_deploy_fails_when_existing_dataset_cannot_be_fetched() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "vanished-journal", Some("Gone."));

    let mut api = connected_api();
    api.expect_create_dataset()
        .returning(|_| Ok(CreateOutcome::AlreadyExists));
    api.expect_get_dataset().times(1).returning(|_| Ok(None));
    api.expect_create_endpoint().never();

    let opts = options(source.path(), &progress_file);
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 0);
    assert_eq!(summary.failed, 1);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Dataset failed: Dataset exists but couldn't fetch"));
    let progress = Progress::load(&progress_file).unwrap();
    assert_eq!(progress.failed, vec!["vanished-journal".to_string()]);
}

#[tokio::test]
async fn test_deploy_inferred_tags_reach_dataset_only() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    make_dataset(source.path(), "legal-medical-review", Some("Law and medicine."));

    let mut api = connected_api();
    api.expect_create_dataset()
        .withf(|payload| payload.tags == "journal,law,health")
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(dataset_with_id("legal-medical-review", 9))));
    api.expect_create_endpoint()
        .withf(|payload| payload.tags == "journal")
        .times(1)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let mut opts = options(source.path(), &progress_file);
    opts.infer_tags = true;
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();
    assert_eq!(summary.success, 1);
}

#[tokio::test]
async fn test_deploy_limit_stops_after_first_datasets() {
    let source = tempdir().unwrap();
    let state = tempdir().unwrap();
    let progress_file = state.path().join("progress.json");
    for name in ["alpha", "beta", "gamma"] {
        make_dataset(source.path(), name, Some("Described."));
    }

    let mut api = connected_api();
    api.expect_create_dataset()
        .withf(|payload| payload.name == "alpha" || payload.name == "beta")
        .times(2)
        .returning(|payload| Ok(CreateOutcome::Created(dataset_with_id(&payload.name, 1))));
    api.expect_create_endpoint()
        .times(2)
        .returning(|_| Ok(CreateOutcome::Created(Endpoint::default())));

    let mut opts = options(source.path(), &progress_file);
    opts.limit = 2;
    let mut out = Vec::new();
    let summary = deploy(&api, None, &opts, &mut out).await.unwrap();

    assert_eq!(summary.success, 2);
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Found 3 datasets"));
    assert!(text.contains("Limited to 2"));
    assert!(!text.contains("gamma"));
    let progress = Progress::load(&progress_file).unwrap();
    assert_eq!(progress.deployed, vec!["alpha".to_string(), "beta".to_string()]);
}
