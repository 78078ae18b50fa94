//! Wire types exchanged with backends and returned by the engine.
//!
//! Field names follow the backends' JSON encoding (camelCase), so the same
//! types decode backend replies and feed the front-end encoders.

use serde::{Deserialize, Serialize};

/// One metric-path resolution result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobMatch {
    pub path: String,
    #[serde(default)]
    pub is_leaf: bool,
}

impl GlobMatch {
    pub fn new(path: impl Into<String>, is_leaf: bool) -> Self {
        Self {
            path: path.into(),
            is_leaf,
        }
    }
}

/// Backend reply to a find query.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GlobResponse {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub matches: Vec<GlobMatch>,
}

/// A single fetched series.
///
/// `values` and `is_absent` have the same length; a position flagged absent
/// carries no data regardless of the number stored in `values`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchResponse {
    pub name: String,
    pub start_time: i32,
    pub stop_time: i32,
    pub step_time: i32,
    #[serde(default)]
    pub values: Vec<f64>,
    #[serde(default)]
    pub is_absent: Vec<bool>,
}

impl FetchResponse {
    /// True when position `i` holds no recorded value.
    pub fn absent_at(&self, i: usize) -> bool {
        self.is_absent.get(i).copied().unwrap_or(true)
    }

    /// Values with absent points mapped to `None`.
    pub fn points(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| if self.absent_at(i) { None } else { Some(*v) })
            .collect()
    }
}

/// Backend reply to a render query.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MultiFetchResponse {
    #[serde(default)]
    pub metrics: Vec<FetchResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Retention {
    pub seconds_per_point: i32,
    pub number_of_points: i32,
}

/// Per-backend metadata about one metric.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerInfo {
    pub name: String,
    pub aggregation_method: String,
    pub max_retention: i32,
    pub x_files_factor: f32,
    pub retentions: Vec<Retention>,
}
