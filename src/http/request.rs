//! Request parsing.
//!
//! # Responsibilities
//! - Read query-string parameters for each endpoint
//! - Validate the parameters the engine needs (non-empty, integer range)
//! - Expose the request ID set by the request-id layer
//!
//! # Design Decisions
//! - A repeated key keeps its first value, as graphite-web clients expect
//! - Every parameter is read as a string; validation produces the
//!   client-facing message
//! - Request ID added as early as possible for tracing

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName};
use std::collections::HashMap;
use std::convert::Infallible;

use crate::http::response::{FindFormat, RenderFormat};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Request ID assigned by the request-id layer, or `-`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
}

/// A rejected request: message sent back with 400.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadRequest(pub &'static str);

/// Decoded query string. A repeated key keeps its first value.
#[derive(Debug, Default, Clone)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    pub fn parse(raw: Option<&str>) -> Self {
        let mut values = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            values.entry(key.into_owned()).or_insert_with(|| value.into_owned());
        }
        Self(values)
    }

    /// Remove `key`, empty when absent.
    pub fn take(&mut self, key: &str) -> String {
        self.0.remove(key).unwrap_or_default()
    }
}

/// Extractor building `T` from the request's query string.
#[derive(Debug)]
pub struct FirstValue<T>(pub T);

impl<S, T> FromRequestParts<S> for FirstValue<T>
where
    S: Send + Sync,
    T: From<QueryParams>,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(T::from(QueryParams::parse(parts.uri.query()))))
    }
}

#[derive(Debug, Default)]
pub struct FindParams {
    pub query: String,
    pub format: String,
}

impl From<QueryParams> for FindParams {
    fn from(mut params: QueryParams) -> Self {
        Self {
            query: params.take("query"),
            format: params.take("format"),
        }
    }
}

impl FindParams {
    pub fn validate(&self) -> Result<FindFormat, BadRequest> {
        if self.query.is_empty() {
            return Err(BadRequest("empty query"));
        }
        FindFormat::parse(&self.format).ok_or(BadRequest("unsupported format"))
    }
}

#[derive(Debug, Default)]
pub struct RenderParams {
    pub target: String,
    pub from: String,
    pub until: String,
    pub format: String,
}

impl From<QueryParams> for RenderParams {
    fn from(mut params: QueryParams) -> Self {
        Self {
            target: params.take("target"),
            from: params.take("from"),
            until: params.take("until"),
            format: params.take("format"),
        }
    }
}

/// Validated render request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub target: String,
    pub from: i32,
    pub until: i32,
    pub format: RenderFormat,
}

impl RenderParams {
    pub fn validate(self) -> Result<RenderRequest, BadRequest> {
        let from = self.from.trim().parse::<i32>().map_err(|_| BadRequest("from is not a integer"))?;
        let until = self.until.trim().parse::<i32>().map_err(|_| BadRequest("until is not a integer"))?;
        if self.target.is_empty() {
            return Err(BadRequest("empty target"));
        }
        let format = RenderFormat::parse(&self.format).ok_or(BadRequest("unsupported format"))?;
        Ok(RenderRequest {
            target: self.target,
            from,
            until,
            format,
        })
    }
}

#[derive(Debug, Default)]
pub struct InfoParams {
    pub target: String,
    pub format: String,
}

impl From<QueryParams> for InfoParams {
    fn from(mut params: QueryParams) -> Self {
        Self {
            target: params.take("target"),
            format: params.take("format"),
        }
    }
}

impl InfoParams {
    /// Info is answered in JSON only.
    pub fn validate(&self) -> Result<(), BadRequest> {
        if self.target.is_empty() {
            return Err(BadRequest("info: empty target"));
        }
        match self.format.as_str() {
            "" | "json" => Ok(()),
            _ => Err(BadRequest("unsupported format")),
        }
    }
}
