use std::path::Path;

use chart_studio::document::ChartMeta;
use chart_studio::service::{
    CreateChartRequest, NO_CHARTS_MESSAGE, community_feed, create_from_csv, parse_columns,
    parse_tags,
};
use chart_studio::upload::TempUpload;
use chart_studio::{AppError, ChartError, ChartStore, IngestError, MemoryChartStore};

fn request(kind: &str, columns: &[&str]) -> CreateChartRequest {
    CreateChartRequest {
        kind: kind.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        meta: ChartMeta::default(),
    }
}

fn staged_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

#[tokio::test]
async fn success_persists_and_removes_upload() {
    let uploads = tempfile::tempdir().unwrap();
    let store = MemoryChartStore::new();

    let upload = TempUpload::stage(
        uploads.path(),
        Some("weather.csv"),
        b"month,rain,sun\njan,10,3\nfeb,12,4\n",
    )
    .await
    .unwrap();
    let staged = upload.path_buf();
    assert!(staged.exists());

    let doc = create_from_csv(&store, "ada", upload, request("scatter", &["rain", "sun"]))
        .await
        .unwrap();

    assert!(!staged.exists());
    assert_eq!(staged_files(uploads.path()), 0);
    assert_eq!(doc.name, "weather");
    assert_eq!(doc.owner, "ada");
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get(&doc.id).await.unwrap(), Some(doc.clone()));
}

#[tokio::test]
async fn build_failure_removes_upload_and_stores_nothing() {
    let uploads = tempfile::tempdir().unwrap();
    let store = MemoryChartStore::new();

    let upload = TempUpload::stage(uploads.path(), Some("words.csv"), b"a,b\nx,y\n")
        .await
        .unwrap();
    let staged = upload.path_buf();

    let err = create_from_csv(&store, "ada", upload, request("scatter", &["a", "b"]))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AppError::Chart(ChartError::InsufficientColumns { required: 2, found: 0, .. })
    ));
    assert!(!staged.exists());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn validation_failure_removes_upload() {
    let uploads = tempfile::tempdir().unwrap();
    let store = MemoryChartStore::new();

    let upload = TempUpload::stage(uploads.path(), None, b"a\n1\n")
        .await
        .unwrap();
    let staged = upload.path_buf();

    let err = create_from_csv(&store, "ada", upload, request("pie", &["a"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Chart(ChartError::Validation(_))));
    assert!(!staged.exists());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn ingest_failure_removes_upload() {
    let uploads = tempfile::tempdir().unwrap();
    let store = MemoryChartStore::new();

    let upload = TempUpload::stage(uploads.path(), Some("empty.csv"), b"")
        .await
        .unwrap();
    let staged = upload.path_buf();

    let err = create_from_csv(&store, "ada", upload, request("bar", &["a"]))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Ingest(IngestError::MissingHeader)));
    assert!(!staged.exists());
}

#[test]
fn validate_trims_and_requires_columns() {
    let (kind, columns) = request("Line", &[" a ", "", "b"]).validate().unwrap();
    assert_eq!(kind.as_str(), "line");
    assert_eq!(columns, vec!["a", "b"]);

    let err = request("line", &["  "]).validate().unwrap_err();
    assert_eq!(
        err,
        ChartError::Validation("At least one column must be selected".to_string())
    );

    let err = request("", &["a"]).validate().unwrap_err();
    assert_eq!(err, ChartError::Validation("Chart type is required".to_string()));
}

#[test]
fn form_field_parsing() {
    assert_eq!(parse_columns(r#"["a","b"]"#).unwrap(), vec!["a", "b"]);
    assert!(matches!(parse_columns("a,b"), Err(ChartError::Validation(_))));

    assert_eq!(parse_tags(r#"["x"," y "]"#), vec!["x", "y"]);
    assert_eq!(parse_tags("x, y,,z"), vec!["x", "y", "z"]);
    assert!(parse_tags("").is_empty());
}

#[tokio::test]
async fn upload_display_stem() {
    let dir = tempfile::tempdir().unwrap();

    let upload = TempUpload::stage(dir.path(), Some("nested/rain fall.csv"), b"a\n")
        .await
        .unwrap();
    assert_eq!(upload.display_stem().as_deref(), Some("rain fall"));
    assert_eq!(upload.original_name(), Some("nested/rain fall.csv"));
    assert!(upload.path().extension().is_some_and(|e| e == "csv"));

    let anonymous = TempUpload::stage(dir.path(), None, b"a\n")
        .await
        .unwrap();
    assert_eq!(anonymous.display_stem(), None);
}

#[tokio::test]
async fn community_feed_of_empty_store_is_not_found() {
    let store = MemoryChartStore::new();
    let err = community_feed(&store, 12).await.unwrap_err();

    assert!(matches!(err, AppError::NotFound(_)));
    assert_eq!(err.to_string(), NO_CHARTS_MESSAGE);
}

#[tokio::test]
async fn community_feed_is_capped_at_size() {
    let uploads = tempfile::tempdir().unwrap();
    let store = MemoryChartStore::new();

    for _ in 0..15 {
        let upload = TempUpload::stage(uploads.path(), None, b"cat\nx\ny\n")
            .await
            .unwrap();
        create_from_csv(&store, "ada", upload, request("bar", &["cat"]))
            .await
            .unwrap();
    }

    assert_eq!(community_feed(&store, 12).await.unwrap().len(), 12);
}

#[tokio::test]
async fn staging_creates_missing_upload_dir() {
    let root = tempfile::tempdir().unwrap();
    let nested = root.path().join("public").join("temp");

    let upload = TempUpload::stage(&nested, Some("a.csv"), b"a\n1\n".to_vec())
        .await
        .unwrap();
    assert!(upload.path().starts_with(&nested));
    assert_eq!(std::fs::read(upload.path()).unwrap(), b"a\n1\n");

    drop(upload);
    assert_eq!(staged_files(&nested), 0);
}
