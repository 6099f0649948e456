//! Core record types: rows, corpus and reference items, projected points and plot groups.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};

/// A source record: field name to value, as uploaded by the client.
///
/// Any field an operation names (`field`, `label_field`, `category_field`) must
/// exist in the row; a missing one fails with [`PipelineError::MissingField`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Result<&Value> {
        self.0.get(field).ok_or_else(|| PipelineError::MissingField {
            field: field.to_string(),
        })
    }

    /// The field rendered as text. Strings are returned as-is, everything else
    /// (including `null`) as its JSON text, so `null` and `""` stay distinct.
    pub fn text(&self, field: &str) -> Result<String> {
        Ok(value_text(self.get(field)?))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for Row {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// How to embed text longer than the encoder's context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Encode as one unit; the encoder truncates.
    #[default]
    Truncate,
    /// Chunk, encode every chunk, and take the element-wise mean.
    Average,
}

impl OverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Truncate => "truncate",
            Self::Average => "average",
        }
    }
}

impl std::fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OverflowPolicy {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "truncate" => Ok(Self::Truncate),
            "average" => Ok(Self::Average),
            _ => Err(PipelineError::Configuration(format!(
                "unknown overflow policy: {s}. Supported: truncate, average"
            ))),
        }
    }
}

/// An embedded source row. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusItem {
    pub row: Row,
    pub embedding: Vec<f32>,
}

/// A labelled embedding in the reference set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceItem {
    pub label: String,
    pub embedding: Vec<f32>,
}

/// Low-dimensional coordinates for one corpus item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedPoint {
    pub coordinates: Vec<f32>,
    /// Index of the corpus item these coordinates were computed from.
    pub source_index: usize,
}

/// One display point: coordinates plus the wrapped hover label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotPoint {
    pub coordinates: Vec<f32>,
    pub label: String,
    pub source_index: usize,
}

/// Points sharing one category value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotGroup {
    /// `None` when the plot is not split by category.
    pub category: Option<String>,
    /// Hex marker color, e.g. `#3497a9`.
    pub color: String,
    pub points: Vec<PlotPoint>,
}

/// Everything an external renderer needs to draw the scatter plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotData {
    pub dimensions: usize,
    /// Color for text and hover labels.
    pub theme_color: String,
    pub groups: Vec<PlotGroup>,
}
