//! Response encoding.
//!
//! # Responsibilities
//! - Encode engine results in the front end wire formats (JSON and pickle)
//! - Map engine errors to HTTP status codes
//!
//! # Design Decisions
//! - An empty `format` means pickle, the graphite-web default
//! - Absent points are JSON `null` or pickle `None`, never zero
//! - The listing interval set is a fixed placeholder: "everything until now + 60s"
//! - Engine errors become 500 with a fixed message; details go to the log

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_pickle::SerOptions;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::http::request::BadRequest;
use crate::zipper::{FetchResponse, GlobMatch};

pub const CONTENT_TYPE_PICKLE: &str = "application/pickle";

/// Find listing format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindFormat {
    Json,
    /// graphite-web listing with leaf intervals.
    Pickle,
}

impl FindFormat {
    pub fn parse(format: &str) -> Option<Self> {
        match format {
            "json" => Some(Self::Json),
            "" | "pickle" => Some(Self::Pickle),
            _ => None,
        }
    }
}

/// Render encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderFormat {
    Json,
    Pickle,
}

impl RenderFormat {
    pub fn parse(format: &str) -> Option<Self> {
        match format {
            "json" => Some(Self::Json),
            "" | "pickle" => Some(Self::Pickle),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JsonMatch<'a> {
    pub path: &'a str,
    #[serde(rename = "isLeaf")]
    pub is_leaf: bool,
}

/// One graphite-web listing row.
#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ListingMatch<'a> {
    Current {
        path: &'a str,
        is_leaf: bool,
        intervals: [[i64; 2]; 1],
    },
    /// graphite-web 0.9 field names.
    Graphite09 {
        metric_path: &'a str,
        #[serde(rename = "isLeaf")]
        is_leaf: bool,
    },
}

pub fn encode_find_json(matches: &[GlobMatch]) -> Vec<JsonMatch<'_>> {
    matches
        .iter()
        .map(|m| JsonMatch {
            path: &m.path,
            is_leaf: m.is_leaf,
        })
        .collect()
}

pub fn encode_find_listing(matches: &[GlobMatch], graphite09: bool, now: i64) -> Vec<ListingMatch<'_>> {
    let intervals = [[0, now + 60]];
    matches
        .iter()
        .map(|m| {
            if graphite09 {
                ListingMatch::Graphite09 {
                    metric_path: &m.path,
                    is_leaf: m.is_leaf,
                }
            } else {
                ListingMatch::Current {
                    path: &m.path,
                    is_leaf: m.is_leaf,
                    intervals,
                }
            }
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RenderSeries<'a> {
    pub name: &'a str,
    pub start: i32,
    pub step: i32,
    pub end: i32,
    pub values: Vec<Option<f64>>,
}

pub fn encode_render(series: &[FetchResponse]) -> Vec<RenderSeries<'_>> {
    series
        .iter()
        .map(|s| RenderSeries {
            name: &s.name,
            start: s.start_time,
            step: s.step_time,
            end: s.stop_time,
            values: s.points(),
        })
        .collect()
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl IntoResponse for BadRequest {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.0).into_response()
    }
}

/// 500 with a fixed body; the cause is logged by the handler.
pub fn engine_failure(message: &'static str) -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
}

pub fn json<T: Serialize>(body: T) -> Response {
    Json(body).into_response()
}

pub fn pickle<T: Serialize>(body: &T) -> Response {
    match serde_pickle::to_vec(body, SerOptions::new()) {
        Ok(bytes) => ([(header::CONTENT_TYPE, CONTENT_TYPE_PICKLE)], bytes).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Pickle encoding failed");
            engine_failure("error marshaling data")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use serde_pickle::DeOptions;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Listed {
        path: String,
        is_leaf: bool,
        intervals: Vec<(i64, i64)>,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Pickled {
        name: String,
        start: i32,
        step: i32,
        end: i32,
        values: Vec<Option<f64>>,
    }

    fn sample() -> Vec<FetchResponse> {
        vec![FetchResponse {
            name: "m".into(),
            start_time: 0,
            stop_time: 120,
            step_time: 60,
            values: vec![0.0, 2.5],
            is_absent: vec![true, false],
        }]
    }

    #[test]
    fn test_formats() {
        assert_eq!(FindFormat::parse(""), Some(FindFormat::Pickle));
        assert_eq!(FindFormat::parse("pickle"), Some(FindFormat::Pickle));
        assert_eq!(FindFormat::parse("json"), Some(FindFormat::Json));
        assert_eq!(FindFormat::parse("protobuf"), None);
        assert_eq!(RenderFormat::parse(""), Some(RenderFormat::Pickle));
        assert_eq!(RenderFormat::parse("pickle"), Some(RenderFormat::Pickle));
        assert_eq!(RenderFormat::parse("carbonapi_v2_pb"), None);
    }

    #[test]
    fn test_find_json_shape() {
        let matches = vec![GlobMatch::new("a.b.c", true)];
        let value = serde_json::to_value(encode_find_json(&matches)).unwrap();
        assert_eq!(value, json!([{"path": "a.b.c", "isLeaf": true}]));
    }

    #[test]
    fn test_listing_carries_interval_placeholder() {
        let matches = vec![GlobMatch::new("a.b", false)];
        let value = serde_json::to_value(encode_find_listing(&matches, false, 1000)).unwrap();
        assert_eq!(
            value,
            json!([{"path": "a.b", "is_leaf": false, "intervals": [[0, 1060]]}])
        );

        let value = serde_json::to_value(encode_find_listing(&matches, true, 1000)).unwrap();
        assert_eq!(value, json!([{"metric_path": "a.b", "isLeaf": false}]));
    }

    #[test]
    fn test_listing_pickles() {
        let matches = vec![GlobMatch::new("a.b", true)];
        let bytes = serde_pickle::to_vec(&encode_find_listing(&matches, false, 1000), SerOptions::new()).unwrap();
        let decoded: Vec<Listed> = serde_pickle::from_slice(&bytes, DeOptions::new()).unwrap();
        assert_eq!(
            decoded,
            vec![Listed {
                path: "a.b".into(),
                is_leaf: true,
                intervals: vec![(0, 1060)],
            }]
        );
    }

    #[test]
    fn test_render_absent_is_null() {
        let series = sample();
        let value = serde_json::to_value(encode_render(&series)).unwrap();
        assert_eq!(
            value,
            json!([{"name": "m", "start": 0, "step": 60, "end": 120, "values": [null, 2.5]}])
        );
    }

    #[test]
    fn test_render_absent_is_pickle_none() {
        let series = sample();
        let bytes = serde_pickle::to_vec(&encode_render(&series), SerOptions::new()).unwrap();
        let decoded: Vec<Pickled> = serde_pickle::from_slice(&bytes, DeOptions::new()).unwrap();
        assert_eq!(
            decoded,
            vec![Pickled {
                name: "m".into(),
                start: 0,
                step: 60,
                end: 120,
                values: vec![None, Some(2.5)],
            }]
        );
    }
}
