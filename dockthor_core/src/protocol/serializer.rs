/**
 * Wire serializer: renders an `Event` into the JSON body the ingestion API
 * expects.
 *
 * The transform is pure: no I/O, no shared state, safe from any thread.
 * Optional fields are *absent* when they do not apply, never `null`.
 *
 * Always present:
 * `event_id`, `timestamp`, `level`, `platform`, `server_name`, `environment`,
 * `message`, `sdk`, `extra`, `tags`, `user`, `last_issued_at`, `status`.
 *
 * Conditional:
 * - `exception.values[0]` when the event carries an exception.
 * - `request` when a `RequestContext` is supplied.
 * - `transaction`, `sent_at`, `spans` and trace context when the event
 *   carries spans or a transaction name is given explicitly.
 *
 * Schema differences between ingestion versions are gated by
 * `SchemaVersion`; there is one transform, not one per version.
 */
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::constants::{
    HTTP_STATUS_TAG, INITIAL_STATUS, LEGACY_SDK_VERSION, SDK_NAME, SDK_VERSION,
};
use super::event::Event;
use super::ids;
use super::span::Span;
use crate::error::Result;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/**
 * Ingestion schema revision.
 *
 * | concern               | `V1`                      | `V2` (default)               |
 * |-----------------------|---------------------------|------------------------------|
 * | span status mirror    | `extra["http.status_code"]` | `tags["http.status_code"]` |
 * | trace context         | top-level `trace.data`    | `contexts.trace`             |
 * | `sdk.version`         | `"1.0.0"`                 | crate version                |
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaVersion {
    V1,
    #[default]
    V2,
}

/// HTTP request the event happened in. Missing parts serialize as `""` / `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub url: Option<String>,
    pub method: Option<String>,
    pub headers: BTreeMap<String, String>,
}

/**
 * The affected user. All fields optional; an all-`None` user serializes
 * as `{}`.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

// ---------------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct Serializer {
    version: SchemaVersion,
}

impl Serializer {
    pub fn new(version: SchemaVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /**
     * Renders `event` to JSON bytes.
     *
     * An `Err` here means the event itself is malformed (e.g. a non-finite
     * float in span data) and should be treated as a bug, not retried.
     */
    pub fn serialize(
        &self,
        event: &Event,
        transaction_name: Option<&str>,
        request: Option<&RequestContext>,
        user: Option<&User>,
    ) -> Result<Vec<u8>> {
        let value = self.to_value(event, transaction_name, request, user)?;
        Ok(serde_json::to_vec(&value)?)
    }

    /**
     * Same as `serialize`, stopping at the JSON tree.
     */
    pub fn to_value(
        &self,
        event: &Event,
        transaction_name: Option<&str>,
        request: Option<&RequestContext>,
        user: Option<&User>,
    ) -> Result<Value> {
        let issued_at = ids::iso_now();
        let mut tags = event.tags.clone();
        let mut extra = event.extra.clone();
        let mut out = Map::new();

        out.insert("event_id".into(), json!(event.event_id));
        out.insert("timestamp".into(), json!(event.timestamp));
        out.insert("level".into(), json!(event.level));
        out.insert("platform".into(), json!(event.platform));
        out.insert("server_name".into(), json!(event.server_name));
        out.insert("environment".into(), json!(event.environment));
        out.insert("message".into(), json!(event.message));
        out.insert(
            "sdk".into(),
            json!({ "name": SDK_NAME, "version": self.sdk_version() }),
        );
        out.insert(
            "user".into(),
            serde_json::to_value(user.cloned().unwrap_or_default())?,
        );
        out.insert("last_issued_at".into(), json!(issued_at));
        out.insert("status".into(), json!(INITIAL_STATUS));

        if let Some(exception) = &event.exception {
            let rendered = serde_json::to_value(exception)?;
            out.insert("exception".into(), json!({ "values": [rendered] }));
        }

        if let Some(request) = request {
            out.insert(
                "request".into(),
                json!({
                    "url": request.url.as_deref().unwrap_or(""),
                    "method": request.method.as_deref().unwrap_or(""),
                    "headers": request.headers,
                }),
            );
        }

        let transaction = transaction_name
            .map(str::to_string)
            .or_else(|| event.spans.as_ref().map(|_| event.message.clone()));

        if let Some(name) = transaction {
            let spans: &[Span] = event.spans.as_deref().unwrap_or(&[]);

            out.insert("transaction".into(), json!(name));
            out.insert("sent_at".into(), json!(issued_at));

            if let Some(status) = merged_status(spans) {
                match self.version {
                    SchemaVersion::V2 => {
                        tags.insert(HTTP_STATUS_TAG.to_string(), status.to_string());
                    }
                    SchemaVersion::V1 => {
                        extra.insert(HTTP_STATUS_TAG.to_string(), json!(status));
                    }
                }
            }

            let data = trace_data(spans.first());
            match self.version {
                SchemaVersion::V2 => {
                    let mut trace = Map::new();
                    if let Some(root) = spans.first() {
                        trace.insert("trace_id".into(), json!(root.trace_id));
                        trace.insert("span_id".into(), json!(root.span_id));
                        if let Some(op) = &root.op {
                            trace.insert("op".into(), json!(op));
                        }
                    }
                    trace.insert("data".into(), Value::Object(data));
                    out.insert("contexts".into(), json!({ "trace": trace }));
                }
                SchemaVersion::V1 => {
                    out.insert("trace".into(), json!({ "data": data }));
                }
            }

            out.insert("spans".into(), serde_json::to_value(spans)?);
        }

        out.insert("extra".into(), serde_json::to_value(extra)?);
        out.insert("tags".into(), serde_json::to_value(tags)?);

        Ok(Value::Object(out))
    }

    fn sdk_version(&self) -> &'static str {
        match self.version {
            SchemaVersion::V1 => LEGACY_SDK_VERSION,
            SchemaVersion::V2 => SDK_VERSION,
        }
    }
}

/**
 * Status to mirror into the event. Spans are walked in order and the last
 * one carrying a status wins.
 */
fn merged_status(spans: &[Span]) -> Option<&str> {
    let mut merged: Option<&str> = None;
    for status in spans.iter().filter_map(|s| s.status.as_deref()) {
        if let Some(previous) = merged.filter(|p| *p != status) {
            tracing::debug!(previous, status, "span statuses disagree, keeping the last one");
        }
        merged = Some(status);
    }
    merged
}

/// `url` and `method` of the root span's data, when present.
fn trace_data(root: Option<&Span>) -> Map<String, Value> {
    let mut data = Map::new();
    if let Some(root) = root {
        for key in ["url", "method"] {
            if let Some(value) = root.data.get(key) {
                data.insert(key.to_string(), value.clone());
            }
        }
    }
    data
}
