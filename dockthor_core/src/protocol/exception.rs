/**
 * `Exception`: a captured error as the SDK sees it before extraction:
 * a type name, a message, the raw call chain and the `source()` causes.
 *
 * Rust errors carry no stack of their own, so the constructors capture a
 * backtrace at the capture site. Capturing only walks the stack; symbol
 * resolution is deferred to `resolve()`, which the delivery worker runs
 * off the caller's thread. Leading frames that belong to the capture
 * machinery itself (`backtrace::*`, `dockthor_core::*`) are dropped so the
 * chain starts at the caller.
 */
use std::any::Any;
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt::Display;

use backtrace::Backtrace;

use super::stacktrace::{frames_from_backtrace, RawFrame};

#[derive(Debug, Clone)]
pub struct Exception {
    pub type_name: String,
    pub value: String,
    pub frames: Vec<RawFrame>,
    /// Display strings of the `source()` chain, outermost first.
    pub causes: Vec<String>,

    /// Captured but not yet symbolized; replaces `frames` once resolved.
    unresolved: Option<Backtrace>,
}

impl Exception {
    /**
     * An exception with no frames. Useful when the caller already has a
     * chain (see `with_frames`) or none at all.
     */
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            value: value.into(),
            frames: Vec::new(),
            causes: Vec::new(),
            unresolved: None,
        }
    }

    /**
     * Captures `err` and its `source()` chain together with an unresolved
     * backtrace of the current thread.
     */
    pub fn from_error<E: StdError + ?Sized>(err: &E) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(cause.to_string());
            source = cause.source();
        }

        let mut exception = Self::from_display(err);
        exception.causes = causes;
        exception
    }

    /**
     * Captures anything printable as an error: `Box<dyn Error>`,
     * `anyhow::Error` and friends. No cause chain is recorded.
     */
    pub fn from_display<E: Display + ?Sized>(err: &E) -> Self {
        Self::new(short_type_name(std::any::type_name::<E>()), err.to_string())
            .with_unresolved(Backtrace::new_unresolved())
    }

    pub fn with_frames(mut self, frames: Vec<RawFrame>) -> Self {
        self.frames = frames;
        self.unresolved = None;
        self
    }

    /// Replaces the frame chain with `bt`, minus leading capture frames.
    pub fn with_backtrace(self, bt: &Backtrace) -> Self {
        let frames = strip_capture_frames(bt);
        self.with_frames(frames)
    }

    /**
     * Attaches a backtrace whose symbols are looked up later, by
     * `resolve()` or when the frames are first read.
     */
    pub fn with_unresolved(mut self, bt: Backtrace) -> Self {
        self.unresolved = Some(bt);
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.unresolved.is_none()
    }

    /// Symbolizes a pending backtrace into `frames`. Idempotent.
    pub fn resolve(&mut self) {
        if let Some(mut bt) = self.unresolved.take() {
            bt.resolve();
            self.frames = strip_capture_frames(&bt);
        }
    }

    /**
     * The frame chain, symbolizing a pending backtrace on the fly if
     * `resolve()` has not run yet.
     */
    pub fn resolved_frames(&self) -> Cow<'_, [RawFrame]> {
        match &self.unresolved {
            Some(bt) => {
                let mut bt = bt.clone();
                bt.resolve();
                Cow::Owned(strip_capture_frames(&bt))
            }
            None => Cow::Borrowed(&self.frames),
        }
    }
}

fn strip_capture_frames(bt: &Backtrace) -> Vec<RawFrame> {
    frames_from_backtrace(bt)
        .into_iter()
        .skip_while(is_capture_frame)
        .collect()
}

/**
 * Best-effort text of a panic payload: `&str` and `String` payloads are
 * recovered, anything else becomes `<unknown panic>`.
 */
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown panic>".to_string()
    }
}

fn is_capture_frame(frame: &RawFrame) -> bool {
    frame.function.as_deref().is_some_and(|name| {
        let name = name.trim_start_matches('<');
        name.starts_with("backtrace::") || name.starts_with("dockthor_core::")
    })
}

/**
 * Reduces a Rust type path to its bare name:
 * `core::num::error::ParseIntError` → `ParseIntError`,
 * `app::Wrapper<alloc::string::String>` → `Wrapper`,
 * `alloc::boxed::Box<dyn core::error::Error + Send>` → `Error`.
 */
pub fn short_type_name(full: &str) -> String {
    let mut name = full;
    for wrapper in ["alloc::boxed::Box<", "alloc::sync::Arc<", "&"] {
        name = name.strip_prefix(wrapper).unwrap_or(name);
    }
    let base = name
        .trim_start_matches("dyn ")
        .split(" + ")
        .next()
        .and_then(|s| s.split('<').next())
        .unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

#[cfg(test)]
mod tests {
    use std::fmt;

    use super::*;

    #[derive(Debug)]
    struct Outer(Inner);

    #[derive(Debug)]
    struct Inner;

    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("outer failed")
        }
    }

    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("inner cause")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    impl StdError for Inner {}

    #[test]
    fn from_error_records_type_value_and_causes() {
        let exc = Exception::from_error(&Outer(Inner));
        assert_eq!(exc.type_name, "Outer");
        assert_eq!(exc.value, "outer failed");
        assert_eq!(exc.causes, vec!["inner cause"]);
    }

    #[test]
    fn from_parse_error() {
        let err = "x".parse::<i32>().unwrap_err();
        let exc = Exception::from_error(&err);
        assert_eq!(exc.type_name, "ParseIntError");
        assert_eq!(exc.value, "invalid digit found in string");
        assert!(exc.causes.is_empty());
    }

    #[test]
    fn capture_frames_are_stripped() {
        let mut exc = Exception::from_error(&Inner);
        exc.resolve();
        assert!(exc.frames.first().map_or(true, |f| !is_capture_frame(f)));
    }

    #[test]
    fn capture_defers_symbol_resolution() {
        let mut exc = Exception::from_error(&Inner);
        assert!(!exc.is_resolved());
        assert!(exc.frames.is_empty());

        let on_the_fly = exc.resolved_frames().into_owned();
        assert!(!exc.is_resolved());

        exc.resolve();
        assert!(exc.is_resolved());
        assert_eq!(exc.frames, on_the_fly);

        exc.resolve();
        assert_eq!(exc.frames, on_the_fly);
    }

    #[test]
    fn explicit_frames_win_over_a_pending_backtrace() {
        let exc = Exception::from_error(&Inner).with_frames(vec![RawFrame::new("a.rs", 1, "f")]);
        assert!(exc.is_resolved());
        assert_eq!(exc.resolved_frames().len(), 1);
    }

    #[test]
    fn boxed_errors_are_captured_through_display() {
        let boxed: Box<dyn StdError + Send + Sync> = "disk full".into();
        let exc = Exception::from_display(&boxed);
        assert_eq!(exc.type_name, "Error");
        assert_eq!(exc.value, "disk full");
        assert!(exc.causes.is_empty());
    }

    #[test]
    fn panic_payload_text() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("static");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "static");
        assert_eq!(panic_message(other.as_ref()), "<unknown panic>");
    }

    #[test]
    fn short_names() {
        assert_eq!(short_type_name("core::num::error::ParseIntError"), "ParseIntError");
        assert_eq!(short_type_name("app::Wrapper<alloc::string::String>"), "Wrapper");
        assert_eq!(short_type_name("dyn core::error::Error"), "Error");
        assert_eq!(
            short_type_name("alloc::boxed::Box<dyn core::error::Error + core::marker::Send>"),
            "Error"
        );
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
