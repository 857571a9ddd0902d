/**
 * Span: a timed, hierarchical unit of work belonging to a trace.
 *
 * A span is created open (no `end_timestamp`) and closed with `finish()`.
 * Open spans are still valid payload content; the serializer simply omits
 * their `timestamp` field.
 *
 * The derived `Serialize` impl *is* the wire form of a span inside a
 * transaction: absent optionals and empty maps are skipped entirely.
 */
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use super::ids;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Span {
    pub span_id: String,
    pub trace_id: String,

    /// Fractional seconds since the Unix epoch.
    pub start_timestamp: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,

    /// Set once by `finish()`. Serialized as `timestamp`.
    #[serde(rename = "timestamp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, Value>,
}

impl Span {
    /**
     * Starts a new root span: fresh trace id, fresh span id, started now.
     */
    pub fn new() -> Self {
        Self::in_trace(ids::trace_id())
    }

    /**
     * Starts a span inside an existing trace.
     */
    pub fn in_trace(trace_id: impl Into<String>) -> Self {
        Self {
            span_id: ids::span_id(),
            trace_id: trace_id.into(),
            start_timestamp: ids::epoch_seconds(),
            parent_span_id: None,
            end_timestamp: None,
            status: None,
            description: None,
            op: None,
            data: BTreeMap::new(),
            tags: BTreeMap::new(),
        }
    }

    /**
     * Starts a child span: same trace, `parent_span_id` pointing at `parent`.
     */
    pub fn child_of(parent: &Span) -> Self {
        let mut span = Self::in_trace(parent.trace_id.clone());
        span.parent_span_id = Some(parent.span_id.clone());
        span
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(key.into(), value.into());
    }

    pub fn set_tag(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.tags.insert(key.into(), value.into());
    }

    /**
     * Closes the span and returns its end timestamp.
     *
     * Only the first call records a time; later calls return the stored
     * value. The end is clamped so it is never earlier than the start,
     * even if the wall clock stepped backwards.
     */
    pub fn finish(&mut self) -> f64 {
        if let Some(end) = self.end_timestamp {
            return end;
        }
        let end = ids::epoch_seconds().max(self.start_timestamp);
        self.end_timestamp = Some(end);
        end
    }

    pub fn is_finished(&self) -> bool {
        self.end_timestamp.is_some()
    }

    /// Elapsed milliseconds, or `None` while the span is open.
    pub fn duration_ms(&self) -> Option<f64> {
        self.end_timestamp
            .map(|end| (end - self.start_timestamp) * 1000.0)
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::new()
    }
}
