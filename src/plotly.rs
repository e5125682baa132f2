//! Trace and layout types in Plotly's JSON shape.
//!
//! Scatter and line traces are both Plotly `"scatter"` traces and are told
//! apart by `mode`; bar traces are `"bar"`. [`Trace`] writes those tags
//! itself so the inner structs only carry their own fields.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

const SCATTER_MODE: &str = "markers";
const LINE_MODE: &str = "lines+markers";

/// One plottable series
#[derive(Clone, Debug, PartialEq)]
pub enum Trace {
    Scatter(ScatterTrace),
    Line(LineTrace),
    Bar(BarTrace),
}

impl Trace {
    pub fn name(&self) -> &str {
        match self {
            Trace::Scatter(t) => &t.name,
            Trace::Line(t) => &t.name,
            Trace::Bar(t) => &t.name,
        }
    }

    /// Number of plotted points (or bars)
    pub fn len(&self) -> usize {
        match self {
            Trace::Scatter(t) => t.x.len(),
            Trace::Line(t) => t.x.len(),
            Trace::Bar(t) => t.x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    #[serde(rename = "type")]
    trace_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    mode: Option<&'static str>,
    #[serde(flatten)]
    inner: &'a T,
}

impl Serialize for Trace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Trace::Scatter(inner) => Tagged {
                trace_type: "scatter",
                mode: Some(SCATTER_MODE),
                inner,
            }
            .serialize(serializer),
            Trace::Line(inner) => Tagged {
                trace_type: "scatter",
                mode: Some(LINE_MODE),
                inner,
            }
            .serialize(serializer),
            Trace::Bar(inner) => Tagged {
                trace_type: "bar",
                mode: None,
                inner,
            }
            .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Trace {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let trace_type = value.get("type").and_then(Value::as_str);
        let mode = value.get("mode").and_then(Value::as_str);

        match (trace_type, mode) {
            (Some("bar"), _) => BarTrace::deserialize(value)
                .map(Trace::Bar)
                .map_err(D::Error::custom),
            (Some("scatter"), Some(SCATTER_MODE)) => ScatterTrace::deserialize(value)
                .map(Trace::Scatter)
                .map_err(D::Error::custom),
            (Some("scatter"), Some(LINE_MODE)) => LineTrace::deserialize(value)
                .map(Trace::Line)
                .map_err(D::Error::custom),
            (t, m) => Err(D::Error::custom(format!(
                "unsupported trace type {t:?} with mode {m:?}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScatterTrace {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub name: String,
    /// Per-point hover text
    pub text: Vec<String>,
    pub hoverinfo: String,
    pub marker: Marker,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineTrace {
    /// 0-based row index
    pub x: Vec<u64>,
    pub y: Vec<f64>,
    pub name: String,
    pub line: LineStyle,
    pub marker: Marker,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BarTrace {
    /// Category labels
    pub x: Vec<String>,
    pub y: Vec<f64>,
    pub name: String,
    pub marker: Marker,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textposition: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub color: MarkerColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opacity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorscale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub showscale: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colorbar: Option<ColorBar>,
}

impl Marker {
    pub fn solid(color: &str) -> Self {
        Self {
            color: MarkerColor::Single(color.to_string()),
            size: None,
            opacity: None,
            colorscale: None,
            showscale: None,
            colorbar: None,
        }
    }
}

/// A single CSS color, or one numeric value per point mapped through a colorscale
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MarkerColor {
    Single(String),
    Scale(Vec<f64>),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColorBar {
    pub title: Title,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineStyle {
    pub color: String,
    pub width: f64,
}

/// Chart-wide presentation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub title: Title,
    pub xaxis: Axis,
    pub yaxis: Axis,
    pub plot_bgcolor: String,
    pub paper_bgcolor: String,
    pub hovermode: String,
    pub showlegend: bool,
    pub margin: Margin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Title {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

impl Title {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub title: Title,
    pub gridcolor: String,
    pub zeroline: bool,
    /// Plotly axis type, e.g. `"category"`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Margin {
    pub l: u32,
    pub r: u32,
    pub t: u32,
    pub b: u32,
}
