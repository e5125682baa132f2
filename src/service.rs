use log::info;

use crate::document::{ChartDocument, ChartMeta, UPLOAD_ORIGIN};
use crate::error::{AppError, ChartError};
use crate::graph::{ChartKind, build_chart};
use crate::ingest::{Dataset, read_csv_file};
use crate::store::ChartStore;
use crate::upload::TempUpload;

pub const NO_CHARTS_MESSAGE: &str = "No graphs found in the community feed.";

/// A create-chart request as received from a client
#[derive(Clone, Debug, Default)]
pub struct CreateChartRequest {
    /// Raw chart kind string, e.g. `"scatter"`
    pub kind: String,
    pub columns: Vec<String>,
    pub meta: ChartMeta,
}

impl CreateChartRequest {
    /// Check the kind and column selection before any I/O happens
    ///
    /// # Errors
    /// * `ChartError::Validation` for a missing or unsupported kind, or an empty selection
    pub fn validate(&self) -> Result<(ChartKind, Vec<String>), ChartError> {
        let kind: ChartKind = self.kind.parse()?;

        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        if columns.is_empty() {
            return Err(ChartError::Validation(
                "At least one column must be selected".to_string(),
            ));
        }

        Ok((kind, columns))
    }
}

/// Parse the `columns` form field: a JSON array of column names
///
/// # Errors
/// * `ChartError::Validation` if the value is not a JSON array of strings
pub fn parse_columns(raw: &str) -> Result<Vec<String>, ChartError> {
    serde_json::from_str(raw).map_err(|e| {
        ChartError::Validation(format!("Columns must be a JSON array of names: {e}"))
    })
}

/// Parse the optional `tags` form field
///
/// Accepts a JSON array or a comma-separated list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let tags: Vec<String> = serde_json::from_str(raw)
        .unwrap_or_else(|_| raw.split(',').map(str::to_string).collect());

    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Build and store a chart from an uploaded CSV
///
/// Runs Validate → Ingest → Build → Save. The upload is owned by this call
/// and dropped (deleting the staged file) however the call returns, and
/// nothing reaches the store unless every earlier step succeeded.
///
/// # Arguments
/// * `store` - Where the finished document goes
/// * `owner` - Id of the requesting user
/// * `upload` - Staged CSV file
/// * `request` - Kind, columns and descriptive fields
///
/// # Returns
/// * `Result<ChartDocument, AppError>` - The stored document
pub async fn create_from_csv(
    store: &dyn ChartStore,
    owner: &str,
    upload: TempUpload,
    request: CreateChartRequest,
) -> Result<ChartDocument, AppError> {
    let (kind, columns) = request.validate()?;
    let dataset = read_csv_file(upload.path()).await?;
    let source = upload.display_stem();

    create_from_dataset(
        store,
        owner,
        &dataset,
        kind,
        &columns,
        source.as_deref(),
        UPLOAD_ORIGIN,
        request.meta,
    )
    .await
}

/// Build and store a chart from rows that are already in memory
///
/// `origin` becomes the document's second tag, after the kind.
#[allow(clippy::too_many_arguments)]
pub async fn create_from_dataset(
    store: &dyn ChartStore,
    owner: &str,
    dataset: &Dataset,
    kind: ChartKind,
    columns: &[String],
    source: Option<&str>,
    origin: &str,
    meta: ChartMeta,
) -> Result<ChartDocument, AppError> {
    let chart = build_chart(dataset, kind, columns)?;
    let document = ChartDocument::assemble(owner, kind, columns, source, origin, chart, meta);

    store.save(&document).await?;
    info!(
        "Created {} chart {} for {} from {} rows",
        kind,
        document.id,
        owner,
        dataset.rows.len()
    );

    Ok(document)
}

/// Random sample for the community feed
///
/// # Errors
/// * `AppError::NotFound` if nothing is stored yet
pub async fn community_feed(
    store: &dyn ChartStore,
    size: usize,
) -> Result<Vec<ChartDocument>, AppError> {
    let documents = store.sample(size).await?;
    if documents.is_empty() {
        return Err(AppError::NotFound(NO_CHARTS_MESSAGE.to_string()));
    }
    Ok(documents)
}
