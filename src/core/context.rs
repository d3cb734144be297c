//! Request-scoped identifiers rendered as log fields
//!
//! A [`RequestContext`] carries the identifiers that tie log lines of one
//! request together. Attach it to a call with [`Logger::info_ctx`] and
//! friends, or append [`RequestContext::fields`] to any field list.
//!
//! [`Logger::info_ctx`]: crate::Logger::info_ctx

use super::field::Field;
use serde::{Deserialize, Serialize};

pub const CORRELATION_ID_KEY: &str = "correlation_id";
pub const REQUEST_ID_KEY: &str = "request_id";
pub const USER_ID_KEY: &str = "user_id";
pub const TRACE_ID_KEY: &str = "trace_id";
pub const SPAN_ID_KEY: &str = "span_id";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    trace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    span_id: Option<String>,
}

/// Empty identifiers leave the previous value untouched
fn set_if_present(slot: &mut Option<String>, id: impl Into<String>) {
    let id = id.into();
    if !id.is_empty() {
        *slot = Some(id);
    }
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        set_if_present(&mut self.correlation_id, id);
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        set_if_present(&mut self.request_id, id);
        self
    }

    #[must_use]
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        set_if_present(&mut self.user_id, id);
        self
    }

    #[must_use]
    pub fn with_trace_id(mut self, id: impl Into<String>) -> Self {
        set_if_present(&mut self.trace_id, id);
        self
    }

    #[must_use]
    pub fn with_span_id(mut self, id: impl Into<String>) -> Self {
        set_if_present(&mut self.span_id, id);
        self
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// The identifiers that are set, as string fields in a fixed order
    pub fn fields(&self) -> Vec<Field> {
        [
            (CORRELATION_ID_KEY, &self.correlation_id),
            (REQUEST_ID_KEY, &self.request_id),
            (USER_ID_KEY, &self.user_id),
            (TRACE_ID_KEY, &self.trace_id),
            (SPAN_ID_KEY, &self.span_id),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| Field::string(key, v.as_str())))
        .collect()
    }
}
