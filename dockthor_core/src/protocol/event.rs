/**
 * Event: the canonical record of one captured occurrence.
 *
 * There are three independent construction paths, one per category:
 *
 * | factory            | `exception` | `spans` | level            |
 * |--------------------|-------------|---------|------------------|
 * | `from_exception`   | `Some`      | `None`  | caller (error)   |
 * | `from_message`     | `None`      | `None`  | caller (info)    |
 * | `from_transaction` | `None`      | `Some`  | always `info`    |
 *
 * Every path stamps the same host metadata (see `metadata`) and a fresh
 * random event id. Construction never fails.
 */
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::constants::PLATFORM;
use super::exception::Exception;
use super::span::Span;
use super::stacktrace::{Frame, StacktraceExtractor};
use super::{ids, metadata};

// ---------------------------------------------------------------------------
// Level (severity)
// ---------------------------------------------------------------------------

/**
 * Severity level, serialized lowercase.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Fatal,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Exception payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionPayload {
    #[serde(rename = "type")]
    pub type_name: String,
    pub value: String,
    pub stacktrace: Stacktrace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stacktrace {
    pub frames: Vec<Frame>,
}

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Exception,
    Message,
    Transaction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event_id: String,
    /// ISO-8601 UTC, `Z` suffix.
    pub timestamp: String,
    pub level: Level,
    pub message: String,
    pub platform: String,
    pub server_name: String,
    pub environment: String,
    pub extra: BTreeMap<String, Value>,
    pub tags: BTreeMap<String, String>,
    pub exception: Option<ExceptionPayload>,
    /// Present only on transactions. Spans may still be open.
    pub spans: Option<Vec<Span>>,
}

impl Event {
    fn base(level: Level, message: String, environment: &str) -> Self {
        let host = metadata::host();

        let mut extra = BTreeMap::new();
        extra.insert("rust_version".to_string(), Value::from(host.rust_version.as_str()));
        extra.insert("cwd".to_string(), Value::from(host.cwd.as_str()));

        let mut tags = BTreeMap::new();
        tags.insert("os".to_string(), host.os_name.clone());
        tags.insert("release".to_string(), host.os_release.clone());

        Self {
            event_id: ids::event_id(),
            timestamp: ids::iso_now(),
            level,
            message,
            platform: PLATFORM.to_string(),
            server_name: host.hostname.clone(),
            environment: environment.to_string(),
            extra,
            tags,
            exception: None,
            spans: None,
        }
    }

    /**
     * Builds an exception event, classifying frames with the default
     * in-app predicate.
     */
    pub fn from_exception(exc: &Exception, level: Level, environment: &str) -> Self {
        Self::from_exception_with(&StacktraceExtractor::default(), exc, level, environment)
    }

    /**
     * Builds an exception event using `extractor` for the frame chain.
     *
     * Frames are fully extracted (symbols resolved, source files read)
     * before this returns.
     */
    pub fn from_exception_with(
        extractor: &StacktraceExtractor,
        exc: &Exception,
        level: Level,
        environment: &str,
    ) -> Self {
        let frames = extractor.extract(&exc.resolved_frames());

        let mut event = Self::base(level, exc.value.clone(), environment);
        if !exc.causes.is_empty() {
            event
                .extra
                .insert("error.causes".to_string(), Value::from(exc.causes.clone()));
        }
        event.exception = Some(ExceptionPayload {
            type_name: exc.type_name.clone(),
            value: exc.value.clone(),
            stacktrace: Stacktrace { frames },
        });
        event
    }

    /// Builds a plain message event. No stack walk, no file I/O.
    pub fn from_message(message: impl Into<String>, level: Level, environment: &str) -> Self {
        Self::base(level, message.into(), environment)
    }

    /**
     * Builds a transaction event named `name` carrying `spans` in the given
     * order. Level is always `info`.
     */
    pub fn from_transaction(name: impl Into<String>, spans: Vec<Span>, environment: &str) -> Self {
        let mut event = Self::base(Level::Info, name.into(), environment);
        event.spans = Some(spans);
        event
    }

    pub fn kind(&self) -> EventKind {
        match (&self.exception, &self.spans) {
            (Some(_), _) => EventKind::Exception,
            (None, Some(_)) => EventKind::Transaction,
            (None, None) => EventKind::Message,
        }
    }

    pub fn is_transaction(&self) -> bool {
        self.kind() == EventKind::Transaction
    }
}

// ---------------------------------------------------------------------------
// EventBuilder
// ---------------------------------------------------------------------------

/**
 * The per-client half of event construction: the environment name and the
 * stack-trace extractor. Shared by explicit captures and the worker.
 */
#[derive(Debug, Clone)]
pub struct EventBuilder {
    extractor: StacktraceExtractor,
    environment: String,
}

impl EventBuilder {
    pub fn new(extractor: StacktraceExtractor, environment: impl Into<String>) -> Self {
        Self {
            extractor,
            environment: environment.into(),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Error-level event for `exception`, frames extracted.
    pub fn exception(&self, exception: &Exception) -> Event {
        Event::from_exception_with(&self.extractor, exception, Level::Error, &self.environment)
    }

    pub fn message(&self, message: &str, level: Level) -> Event {
        Event::from_message(message, level, &self.environment)
    }

    pub fn transaction(&self, name: impl Into<String>, spans: Vec<Span>) -> Event {
        Event::from_transaction(name, spans, &self.environment)
    }
}
