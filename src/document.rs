use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::graph::{BuiltChart, ChartKind};
use crate::plotly::{Layout, Trace};

pub const DEFAULT_NAME: &str = "Untitled Graph";

/// Origin tag for charts built from a user upload
pub const UPLOAD_ORIGIN: &str = "csv-upload";

/// Origin tag for charts built by the seed tool
pub const SEED_ORIGIN: &str = "seed";

/// The persisted unit: traces, layout and ownership metadata
///
/// Documents are created once by the chart service and never edited.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartDocument {
    pub id: String,
    pub name: String,
    pub description: String,
    pub data: Vec<Trace>,
    pub layout: Layout,
    /// Id of the owning user
    pub owner: String,
    pub kind: ChartKind,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied descriptive fields
#[derive(Clone, Debug, Default)]
pub struct ChartMeta {
    pub name: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl ChartDocument {
    /// Assemble a document for a freshly built chart
    ///
    /// # Arguments
    /// * `owner` - Owning user id
    /// * `kind` - Kind the chart was built as
    /// * `columns` - Columns the caller selected
    /// * `source` - Name of the dataset the rows came from, if known
    /// * `origin` - How the rows arrived, e.g. [`UPLOAD_ORIGIN`]; always tagged
    /// * `chart` - Built traces and layout
    /// * `meta` - Optional name, description and extra tags
    pub fn assemble(
        owner: &str,
        kind: ChartKind,
        columns: &[String],
        source: Option<&str>,
        origin: &str,
        chart: BuiltChart,
        meta: ChartMeta,
    ) -> Self {
        let name = non_blank(meta.name)
            .or_else(|| source.map(str::to_string))
            .unwrap_or_else(|| DEFAULT_NAME.to_string());

        let description = non_blank(meta.description).unwrap_or_else(|| {
            let mut text = format!("{} chart of {}", capitalize(kind.as_str()), columns.join(", "));
            if let Some(source) = source {
                text.push_str(&format!(" generated from {source}"));
            }
            text
        });

        let mut tags = vec![kind.to_string(), origin.to_string()];
        for tag in meta.tags {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        Self {
            id: Uuid::new_v4().to_string(),
            name,
            description,
            data: chart.data,
            layout: chart.layout,
            owner: owner.to_string(),
            kind,
            tags,
            created_at: Utc::now(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
