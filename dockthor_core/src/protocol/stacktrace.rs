/**
 * Stack-trace extraction.
 *
 * Turns the raw frame chain of a captured error into wire `Frame`s:
 * resolves each frame's source file, cuts a window of context lines around
 * the faulting line, and classifies the frame as application or library
 * code.
 *
 * Extraction never fails. A frame whose source cannot be read (missing
 * file, permission denied, non-UTF-8 content, line out of range) is still
 * emitted, with empty context. The output has exactly one `Frame` per input
 * frame, in input order.
 */
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::metadata;

/// Number of source lines kept on each side of the faulting line.
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Path segments that mark code as coming from outside the application.
pub const VENDOR_MARKERS: &[&str] = &[
    "/.cargo/registry/",
    "/.cargo/git/",
    "/.rustup/toolchains/",
    "/rustc/",
    "/vendor/",
];

const UNKNOWN_FUNCTION: &str = "<unknown>";

// ---------------------------------------------------------------------------
// RawFrame: what a captured error carries
// ---------------------------------------------------------------------------

/**
 * One unprocessed frame of a call chain, as resolved from debug info.
 */
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawFrame {
    pub file: Option<String>,
    pub line: Option<u32>,
    pub function: Option<String>,
}

impl RawFrame {
    pub fn new(file: impl Into<String>, line: u32, function: impl Into<String>) -> Self {
        Self {
            file: Some(file.into()),
            line: Some(line),
            function: Some(function.into()),
        }
    }
}

/**
 * Converts a `backtrace::Backtrace` into raw frames, innermost first.
 *
 * Symbols with neither a file nor a function name (linker / runtime
 * trampolines) carry no information and are skipped.
 */
pub fn frames_from_backtrace(bt: &backtrace::Backtrace) -> Vec<RawFrame> {
    let mut frames = Vec::new();

    for frame in bt.frames() {
        for symbol in frame.symbols() {
            let function = symbol.name().map(|n| n.to_string());
            let file = symbol.filename().map(|p| p.display().to_string());

            if function.is_none() && file.is_none() {
                continue;
            }

            frames.push(RawFrame {
                file,
                line: symbol.lineno(),
                function,
            });
        }
    }

    frames
}

// ---------------------------------------------------------------------------
// Frame: the wire representation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    /// Path relative to the working directory when possible.
    pub filename: String,
    pub abs_path: String,
    pub lineno: u32,
    pub function: String,
    pub in_app: bool,
    pub pre_context: Vec<String>,
    pub context_line: String,
    pub post_context: Vec<String>,
    /// Reserved for local-variable capture; always empty.
    pub vars: BTreeMap<String, Value>,
}

// ---------------------------------------------------------------------------
// InAppFilter
// ---------------------------------------------------------------------------

/**
 * Predicate deciding whether a source path belongs to the application.
 *
 * The default treats any path containing one of `VENDOR_MARKERS` as library
 * code and everything else, including frames without a path, as
 * application code.
 */
#[derive(Clone)]
pub struct InAppFilter(Arc<dyn Fn(&str) -> bool + Send + Sync>);

impl InAppFilter {
    pub fn new(predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Library code is whatever contains one of `markers`.
    pub fn excluding(markers: Vec<String>) -> Self {
        Self::new(move |path| !markers.iter().any(|m| path.contains(m.as_str())))
    }

    pub fn is_in_app(&self, path: &str) -> bool {
        (self.0)(path)
    }
}

impl Default for InAppFilter {
    fn default() -> Self {
        Self::excluding(VENDOR_MARKERS.iter().map(|m| m.to_string()).collect())
    }
}

impl fmt::Debug for InAppFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InAppFilter(..)")
    }
}

// ---------------------------------------------------------------------------
// StacktraceExtractor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StacktraceExtractor {
    in_app: InAppFilter,
    context_lines: usize,
}

impl Default for StacktraceExtractor {
    fn default() -> Self {
        Self::new(InAppFilter::default())
    }
}

impl StacktraceExtractor {
    pub fn new(in_app: InAppFilter) -> Self {
        Self {
            in_app,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }

    pub fn with_context_lines(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /**
     * Resolves every raw frame into a wire `Frame`, preserving order.
     *
     * Each distinct source file is read at most once per call.
     */
    pub fn extract(&self, raw: &[RawFrame]) -> Vec<Frame> {
        let mut sources: HashMap<&str, Option<Rc<Vec<String>>>> = HashMap::new();
        let cwd = metadata::host().cwd.as_str();

        raw.iter()
            .map(|frame| {
                let abs_path = frame.file.as_deref().unwrap_or("");
                let lineno = frame.line.unwrap_or(0);

                let lines = if abs_path.is_empty() {
                    None
                } else {
                    sources
                        .entry(abs_path)
                        .or_insert_with(|| read_source(abs_path).map(Rc::new))
                        .clone()
                };

                let (pre_context, context_line, post_context) = match lines {
                    Some(lines) => context_window(&lines, lineno, self.context_lines),
                    None => (Vec::new(), String::new(), Vec::new()),
                };

                Frame {
                    filename: relative_to(abs_path, cwd),
                    abs_path: abs_path.to_string(),
                    lineno,
                    function: frame
                        .function
                        .clone()
                        .unwrap_or_else(|| UNKNOWN_FUNCTION.to_string()),
                    in_app: self.in_app.is_in_app(abs_path),
                    pre_context,
                    context_line,
                    post_context,
                    vars: BTreeMap::new(),
                }
            })
            .collect()
    }
}

fn read_source(path: &str) -> Option<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content.lines().map(str::to_string).collect()),
        Err(err) => {
            tracing::trace!(path, error = %err, "source unavailable, frame has no context");
            None
        }
    }
}

/**
 * Cuts `(pre, line, post)` around the 1-based `lineno`. Out-of-range line
 * numbers give an empty window.
 */
fn context_window(
    lines: &[String],
    lineno: u32,
    radius: usize,
) -> (Vec<String>, String, Vec<String>) {
    let Some(idx) = (lineno as usize).checked_sub(1).filter(|i| *i < lines.len()) else {
        return (Vec::new(), String::new(), Vec::new());
    };

    let pre = lines[idx.saturating_sub(radius)..idx].to_vec();
    let post_end = (idx + 1 + radius).min(lines.len());
    let post = lines[idx + 1..post_end].to_vec();

    (pre, lines[idx].clone(), post)
}

fn relative_to(path: &str, cwd: &str) -> String {
    if cwd.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(cwd) {
        Some(rest) if rest.len() > 1 && rest.starts_with(std::path::MAIN_SEPARATOR) => {
            rest[1..].to_string()
        }
        _ => path.to_string(),
    }
}
