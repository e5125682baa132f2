use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classify::{is_numeric_column, numeric_columns, numeric_values};
use crate::error::ChartError;
use crate::ingest::{Dataset, RowRecord};
use crate::plotly::{
    Axis, BarTrace, ColorBar, Font, Layout, LineStyle, LineTrace, Margin, Marker, MarkerColor,
    ScatterTrace, Title, Trace,
};

/// Trace colors, cycled by position
pub const PALETTE: [&str; 5] = ["#e74c3c", "#3498db", "#2ecc71", "#f39c12", "#9b59b6"];

const GRID_COLOR: &str = "#ecf0f1";
const PLOT_BACKGROUND: &str = "#ffffff";
const PAPER_BACKGROUND: &str = "#ffffff";
const TITLE_COLOR: &str = "#2c3e50";
const HOVER_MODE: &str = "closest";

/// Chart kinds that can be built from CSV columns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    /// Two numeric columns against each other, optional third as color
    Scatter,

    /// One line per numeric column over the row index
    Line,

    /// Category against value, or category frequency
    Bar,
}

impl ChartKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Scatter => "scatter",
            ChartKind::Line => "line",
            ChartKind::Bar => "bar",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartKind {
    type Err = ChartError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Err(ChartError::Validation("Chart type is required".to_string())),
            "scatter" => Ok(ChartKind::Scatter),
            "line" => Ok(ChartKind::Line),
            "bar" => Ok(ChartKind::Bar),
            other => Err(ChartError::Validation(format!(
                "Unsupported chart type: {other} (expected scatter, line or bar)"
            ))),
        }
    }
}

/// Traces plus the layout that accompanies them
#[derive(Clone, Debug, PartialEq)]
pub struct BuiltChart {
    pub data: Vec<Trace>,
    pub layout: Layout,
}

/// Builds a chart from a dataset
///
/// This is the main entry point of the graph builder. It checks the column
/// selection against the header and delegates to the builder for `kind`.
///
/// # Arguments
/// * `dataset` - Ingested CSV rows
/// * `kind` - Chart kind to build
/// * `columns` - Selected column names, in caller order
///
/// # Returns
/// * `Result<BuiltChart, ChartError>` - Traces and layout, or the failed precondition
///
/// # Errors
/// * `ChartError::Validation` if the selection is empty or names an unknown column
/// * `ChartError::InsufficientColumns` if scatter has fewer than two numeric
///   columns or line has none
///
/// # Examples
/// ```
/// use chart_studio::graph::{ChartKind, build_chart};
/// use chart_studio::ingest::read_rows;
///
/// let data = read_rows("day,temp\nmon,12\ntue,14\n".as_bytes()).unwrap();
/// let chart = build_chart(&data, ChartKind::Line, &["temp".to_string()]).unwrap();
/// assert_eq!(chart.data.len(), 1);
/// ```
pub fn build_chart(
    dataset: &Dataset,
    kind: ChartKind,
    columns: &[String],
) -> Result<BuiltChart, ChartError> {
    validate_selection(dataset, columns)?;

    match kind {
        ChartKind::Scatter => build_scatter(&dataset.rows, columns),
        ChartKind::Line => build_line(&dataset.rows, columns),
        ChartKind::Bar => build_bar(&dataset.rows, columns),
    }
}

fn validate_selection(dataset: &Dataset, columns: &[String]) -> Result<(), ChartError> {
    if columns.is_empty() {
        return Err(ChartError::Validation(
            "At least one column must be selected".to_string(),
        ));
    }

    let missing: Vec<&str> = columns
        .iter()
        .filter(|c| !dataset.has_column(c))
        .map(String::as_str)
        .collect();

    if !missing.is_empty() {
        return Err(ChartError::Validation(format!(
            "Unknown column(s): {}",
            missing.join(", ")
        )));
    }

    Ok(())
}

/// Scatter plot of the first two numeric columns
///
/// A third numeric column, when selected, drives the marker colorscale.
/// Non-numeric selected columns are skipped, so `[label, a, b]` plots `b`
/// against `a`.
pub fn build_scatter(rows: &[RowRecord], columns: &[String]) -> Result<BuiltChart, ChartError> {
    let numeric = numeric_columns(rows, columns);
    if numeric.len() < 2 {
        return Err(ChartError::InsufficientColumns {
            kind: ChartKind::Scatter,
            required: 2,
            found: numeric.len(),
        });
    }

    let (x_col, y_col) = (numeric[0], numeric[1]);
    let color_col = numeric.get(2).copied();

    let x = numeric_values(rows, x_col);
    let y = numeric_values(rows, y_col);
    let color = color_col.map(|c| numeric_values(rows, c));

    let text = (0..rows.len())
        .map(|i| {
            let mut line = format!("{x_col}: {}<br>{y_col}: {}", x[i], y[i]);
            if let (Some(c), Some(values)) = (color_col, &color) {
                line.push_str(&format!("<br>{c}: {}", values[i]));
            }
            line
        })
        .collect();

    let marker = match (color_col, color) {
        (Some(c), Some(values)) => Marker {
            color: MarkerColor::Scale(values),
            size: Some(8.0),
            opacity: Some(0.7),
            colorscale: Some("Viridis".to_string()),
            showscale: Some(true),
            colorbar: Some(ColorBar {
                title: Title::plain(c),
            }),
        },
        _ => Marker {
            size: Some(8.0),
            opacity: Some(0.7),
            ..Marker::solid(PALETTE[1])
        },
    };

    let trace = Trace::Scatter(ScatterTrace {
        x,
        y,
        name: format!("{y_col}_vs_{x_col}"),
        text,
        hoverinfo: "text".to_string(),
        marker,
    });

    Ok(BuiltChart {
        data: vec![trace],
        layout: base_layout(&format!("{y_col} vs {x_col}"), x_col, y_col, false),
    })
}

/// One line per numeric column, plotted against the 0-based row index
pub fn build_line(rows: &[RowRecord], columns: &[String]) -> Result<BuiltChart, ChartError> {
    let numeric = numeric_columns(rows, columns);
    if numeric.is_empty() {
        return Err(ChartError::InsufficientColumns {
            kind: ChartKind::Line,
            required: 1,
            found: 0,
        });
    }

    let index: Vec<u64> = (0..rows.len() as u64).collect();

    let data = numeric
        .iter()
        .enumerate()
        .map(|(pos, column)| {
            let color = PALETTE[pos % PALETTE.len()];
            Trace::Line(LineTrace {
                x: index.clone(),
                y: numeric_values(rows, column),
                name: column.to_string(),
                line: LineStyle {
                    color: color.to_string(),
                    width: 2.0,
                },
                marker: Marker {
                    size: Some(4.0),
                    ..Marker::solid(color)
                },
            })
        })
        .collect();

    let y_title = match numeric.as_slice() {
        [only] => only.to_string(),
        _ => "Value".to_string(),
    };

    Ok(BuiltChart {
        data,
        layout: base_layout(
            &format!("Trend of {}", numeric.join(", ")),
            "Row Index",
            &y_title,
            true,
        ),
    })
}

/// Bar chart over the first selected column
///
/// With a second selected column that has any numeric value, draws one bar
/// per row (no aggregation). Otherwise counts occurrences of each category,
/// in first-seen order.
pub fn build_bar(rows: &[RowRecord], columns: &[String]) -> Result<BuiltChart, ChartError> {
    let category = columns.first().ok_or_else(|| {
        ChartError::Validation("Bar charts need a category column".to_string())
    })?;

    let categories = rows
        .iter()
        .map(|row| row.get(category).unwrap_or_default().to_string());

    let value_col = columns
        .get(1)
        .filter(|column| is_numeric_column(rows, column));

    let (trace, layout) = match value_col {
        Some(value_col) => {
            let trace = BarTrace {
                x: categories.collect(),
                y: numeric_values(rows, value_col),
                name: value_col.clone(),
                marker: Marker {
                    opacity: Some(0.8),
                    ..Marker::solid(PALETTE[1])
                },
                text: None,
                textposition: None,
            };
            let layout = base_layout(
                &format!("{value_col} by {category}"),
                category,
                value_col,
                false,
            );
            (trace, layout)
        }
        None => {
            let (labels, counts) = frequency_count(categories);
            let trace = BarTrace {
                text: Some(counts.iter().map(|c| c.to_string()).collect()),
                textposition: Some("auto".to_string()),
                x: labels,
                y: counts.iter().map(|&c| c as f64).collect(),
                name: format!("{category} count"),
                marker: Marker {
                    opacity: Some(0.8),
                    ..Marker::solid(PALETTE[1])
                },
            };
            let layout = base_layout(
                &format!("Distribution of {category}"),
                category,
                "Count",
                false,
            );
            (trace, layout)
        }
    };

    let mut layout = layout;
    layout.xaxis.axis_type = Some("category".to_string());

    Ok(BuiltChart {
        data: vec![Trace::Bar(trace)],
        layout,
    })
}

/// Counts each distinct value, keeping first-seen order
fn frequency_count(values: impl Iterator<Item = String>) -> (Vec<String>, Vec<u64>) {
    let mut labels: Vec<String> = Vec::new();
    let mut counts: Vec<u64> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for value in values {
        match positions.get(&value) {
            Some(&idx) => counts[idx] += 1,
            None => {
                positions.insert(value.clone(), labels.len());
                labels.push(value);
                counts.push(1);
            }
        }
    }

    (labels, counts)
}

fn base_layout(title: &str, x_title: &str, y_title: &str, showlegend: bool) -> Layout {
    let axis = |text: &str| Axis {
        title: Title::plain(text),
        gridcolor: GRID_COLOR.to_string(),
        zeroline: false,
        axis_type: None,
    };

    Layout {
        title: Title {
            text: title.to_string(),
            font: Some(Font {
                size: Some(20),
                color: Some(TITLE_COLOR.to_string()),
            }),
        },
        xaxis: axis(x_title),
        yaxis: axis(y_title),
        plot_bgcolor: PLOT_BACKGROUND.to_string(),
        paper_bgcolor: PAPER_BACKGROUND.to_string(),
        hovermode: HOVER_MODE.to_string(),
        showlegend,
        margin: Margin {
            l: 60,
            r: 30,
            t: 60,
            b: 60,
        },
        font: None,
    }
}
