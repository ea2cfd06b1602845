//! Normalized, immutable call-stack snapshots.
//!
//! A raw backtrace frame records where execution currently is *inside* a
//! function. [`Trace::from_raw`] pairs that with the position of the frame
//! below it, so every [`Frame`] knows both where it is executing and where it
//! was called from.

// Symbol paths are split on ASCII delimiters only.
#![allow(clippy::string_slice)]

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::{Scalar, TraceError, Value};

/// Longest string argument shown in a signature before truncation.
pub const MAX_ARG_CHARS: usize = 16;

/// A file/line position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub file: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            line,
            column: None,
        }
    }

    pub fn with_column(mut self, column: u32) -> Self {
        self.column = Some(column);
        self
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// How a frame's function was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    /// Associated function on a type (`Type::f`).
    Static,
    /// Method call on a receiver (`Type.f`).
    Instance,
    /// Free function inside a module.
    Namespace,
    /// Free function at the crate root.
    Global,
}

impl FrameKind {
    const fn separator(self) -> &'static str {
        match self {
            Self::Instance => ".",
            _ => "::",
        }
    }
}

/// By-value summary of a call argument, captured when the frame is built.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Scalar(Scalar),
    Binary(usize),
    Array(usize),
    Object(String),
    Resource(String),
    Const(String),
}

impl From<&Value> for Arg {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Scalar(Scalar::Null),
            Value::Bool(b) => Self::Scalar(Scalar::Bool(*b)),
            Value::Int(n) => Self::Scalar(Scalar::Int(*n)),
            Value::Float(n) => Self::Scalar(Scalar::Float(*n)),
            Value::Str(s) => Self::Scalar(Scalar::Str(s.clone())),
            Value::Binary(bytes) => Self::Binary(bytes.len()),
            Value::Array(array) => Self::Array(array.try_borrow().map_or(0, |a| a.len())),
            Value::Object(object) => Self::Object(object.class_name().into_owned()),
            Value::Resource(resource) => Self::Resource(resource.kind().to_owned()),
            Value::Const { name, .. } => Self::Const(name.clone()),
        }
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(Scalar::Str(s)) => {
                let mut chars = s.chars();
                let head: String = chars.by_ref().take(MAX_ARG_CHARS).collect();
                if chars.next().is_some() {
                    write!(f, "'{head}…'")
                } else {
                    write!(f, "'{head}'")
                }
            }
            Self::Scalar(scalar) => write!(f, "{scalar}"),
            Self::Binary(len) => write!(f, "binary({len})"),
            Self::Array(len) => write!(f, "[{len}]"),
            Self::Object(class) => write!(f, "{class} Object"),
            Self::Resource(kind) => write!(f, "resource({kind})"),
            Self::Const(name) => f.write_str(name),
        }
    }
}

/// One frame of a [`Trace`].
#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    function: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    class_name: Option<String>,
    kind: FrameKind,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<Arg>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_site: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
}

impl Frame {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            namespace: None,
            class_name: None,
            kind: FrameKind::Global,
            args: Vec::new(),
            call_site: None,
            location: None,
        }
    }

    /// Parse a demangled symbol such as `app::db::Pool::get::h0123456789abcdef`.
    pub fn from_symbol(symbol: &str) -> Self {
        let (namespace, class_name, function, kind) = parse_symbol(symbol);
        Self {
            namespace,
            class_name,
            kind,
            ..Self::new(function)
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        if self.kind == FrameKind::Global {
            self.kind = FrameKind::Namespace;
        }
        self
    }

    pub fn on_class(mut self, class_name: impl Into<String>, kind: FrameKind) -> Self {
        self.class_name = Some(class_name.into());
        self.kind = kind;
        self
    }

    pub fn with_args(mut self, args: &[Value]) -> Self {
        self.args = args.iter().map(Arg::from).collect();
        self
    }

    pub fn called_from(mut self, call_site: Location) -> Self {
        self.call_site = Some(call_site);
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn class_name(&self) -> Option<&str> {
        self.class_name.as_deref()
    }

    pub fn kind(&self) -> FrameKind {
        self.kind
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Where this function was called from.
    pub fn call_site(&self) -> Option<&Location> {
        self.call_site.as_ref()
    }

    /// Where execution was inside this function.
    pub fn location(&self) -> Option<&Location> {
        self.location.as_ref()
    }

    /// Human-readable call, e.g. `app::Pool::get(2)` or, with `expand_args`,
    /// `app::Pool.get('primary', 2)`.
    pub fn signature(&self, expand_args: bool) -> String {
        let mut out = String::new();
        if let Some(namespace) = &self.namespace {
            out.push_str(namespace);
            out.push_str("::");
        }
        if let Some(class_name) = &self.class_name {
            out.push_str(class_name);
            out.push_str(self.kind.separator());
        }
        out.push_str(&self.function);
        out.push('(');
        if expand_args {
            let args: Vec<String> = self.args.iter().map(ToString::to_string).collect();
            out.push_str(&args.join(", "));
        } else if !self.args.is_empty() {
            out.push_str(&self.args.len().to_string());
        }
        out.push(')');
        out
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature(true))
    }
}

/// A frame as read from a backtrace, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub symbol: String,
    pub location: Option<Location>,
}

impl RawFrame {
    pub fn new(symbol: impl Into<String>, location: Option<Location>) -> Self {
        Self {
            symbol: symbol.into(),
            location,
        }
    }
}

/// Ordered frames, innermost first. Cheap to clone, never mutated.
#[derive(Debug, Clone)]
pub struct Trace {
    frames: Arc<[Frame]>,
}

impl Default for Trace {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl Trace {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: Arc::from(frames),
        }
    }

    /// Build from raw frames, dropping the `rewind` innermost ones.
    ///
    /// Frame `k` takes its location from `raw[rewind + k]` and its call site
    /// from `raw[rewind + k + 1]`.
    pub fn from_raw(raw: &[RawFrame], rewind: usize) -> Result<Self, TraceError> {
        if rewind > raw.len() {
            return Err(TraceError::RewindOutOfRange {
                rewind,
                depth: raw.len(),
            });
        }

        let frames = (rewind..raw.len())
            .map(|idx| {
                let mut frame = Frame::from_symbol(&raw[idx].symbol);
                frame.location = raw[idx].location.clone();
                frame.call_site = raw.get(idx + 1).and_then(|caller| caller.location.clone());
                frame
            })
            .collect();
        Ok(Self::new(frames))
    }

    /// Capture the current stack, starting at the caller of this function,
    /// then drop `rewind` more frames.
    #[inline(never)]
    pub fn capture(rewind: usize) -> Result<Self, TraceError> {
        let backtrace = Backtrace::force_capture();
        if !matches!(backtrace.status(), BacktraceStatus::Captured) {
            return Err(TraceError::Unavailable);
        }

        let raw = parse_backtrace(&format!("{backtrace:#}"));
        let skip = machinery_depth(&raw);
        Self::from_raw(&raw[skip..], rewind)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Frame> {
        self.frames.get(idx)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    /// Where the innermost remaining frame was executing.
    pub fn origin(&self) -> Option<&Location> {
        self.frames.first().and_then(Frame::location)
    }
}

impl Index<usize> for Trace {
    type Output = Frame;

    fn index(&self, idx: usize) -> &Frame {
        &self.frames[idx]
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.frames.iter()
    }
}

impl Serialize for Trace {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.frames.iter())
    }
}

/// Parse the alternate (`{:#}`) display form of a `std::backtrace::Backtrace`.
pub fn parse_backtrace(text: &str) -> Vec<RawFrame> {
    let mut frames: Vec<RawFrame> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(location) = line.strip_prefix("at ") {
            if let Some(last) = frames.last_mut() {
                if last.location.is_none() {
                    last.location = parse_location(location);
                }
            }
            continue;
        }

        frames.push(RawFrame::new(strip_frame_prefix(line), None));
    }
    frames
}

/// Frames belonging to the backtrace machinery and [`Trace::capture`] itself.
fn machinery_depth(raw: &[RawFrame]) -> usize {
    raw.iter()
        .position(|frame| frame.symbol.contains("Trace::capture"))
        .map_or_else(
            || {
                raw.iter()
                    .take_while(|frame| is_backtrace_internal(&frame.symbol))
                    .count()
            },
            |idx| idx + 1,
        )
}

fn is_backtrace_internal(symbol: &str) -> bool {
    symbol.starts_with("std::backtrace")
        || symbol.starts_with("backtrace::")
        || symbol.starts_with("<std::backtrace")
}

/// Drop `  12: ` and an optional `0x55d0c0 - ` instruction pointer.
fn strip_frame_prefix(line: &str) -> &str {
    let rest = match line.split_once(':') {
        Some((idx, rest)) if !idx.is_empty() && idx.chars().all(|c| c.is_ascii_digit()) => {
            rest.trim_start()
        }
        _ => line,
    };
    match rest.split_once(" - ") {
        Some((ip, symbol)) if ip.starts_with("0x") => symbol.trim(),
        _ => rest,
    }
}

fn parse_location(text: &str) -> Option<Location> {
    let (rest, last) = text.trim().rsplit_once(':')?;
    let last: u32 = last.parse().ok()?;
    if let Some((file, line)) = rest.rsplit_once(':') {
        if let Ok(line) = line.parse::<u32>() {
            return Some(Location::new(file, line).with_column(last));
        }
    }
    Some(Location::new(rest, last))
}

fn strip_hash(symbol: &str) -> &str {
    if let Some((head, hash)) = symbol.rsplit_once("::h") {
        if hash.len() == 16 && hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return head;
        }
    }
    symbol
}

/// Split on `::` outside of generic brackets. The `>` of a `->` return
/// arrow does not close a bracket.
fn split_path(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let mut parts = Vec::new();
    let mut depth = 0_i32;
    let mut start = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            b'<' => depth += 1,
            b'>' if idx == 0 || bytes[idx - 1] != b'-' => depth -= 1,
            b':' if depth == 0 && bytes.get(idx + 1) == Some(&b':') => {
                parts.push(&path[start..idx]);
                idx += 2;
                start = idx;
                continue;
            }
            _ => {}
        }
        idx += 1;
    }
    parts.push(&path[start..]);
    parts
}

fn is_closure(segment: &str) -> bool {
    segment.starts_with("{{") && segment.ends_with("}}")
}

fn starts_uppercase(segment: &str) -> bool {
    segment.chars().next().is_some_and(char::is_uppercase)
}

fn function_name(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| {
            if is_closure(s) {
                &s[1..s.len() - 1]
            } else {
                s
            }
        })
        .collect::<Vec<_>>()
        .join("::")
}

fn non_empty(segments: &[&str]) -> Option<String> {
    (!segments.is_empty()).then(|| segments.join("::"))
}

fn parse_symbol(symbol: &str) -> (Option<String>, Option<String>, String, FrameKind) {
    let symbol = strip_hash(symbol.trim());
    let segments = split_path(symbol);

    // `<app::Pool as Drop>::drop`
    if let Some(first) = segments
        .first()
        .filter(|s| segments.len() > 1 && s.starts_with('<') && s.ends_with('>'))
    {
        let inner = &first[1..first.len() - 1];
        let ty = inner.split(" as ").next().unwrap_or(inner);
        let ty_segments = split_path(ty);
        let (class, namespace) = ty_segments
            .split_last()
            .map_or((ty, &[][..]), |(last, rest)| (*last, rest));
        return (
            non_empty(namespace),
            Some(class.to_owned()),
            function_name(&segments[1..]),
            FrameKind::Static,
        );
    }

    let mut fn_idx = segments.len() - 1;
    while fn_idx > 0 && is_closure(segments[fn_idx]) {
        fn_idx -= 1;
    }
    let function = function_name(&segments[fn_idx..]);
    let head = &segments[..fn_idx];

    match head.iter().position(|s| starts_uppercase(s)) {
        Some(idx) => (
            non_empty(&head[..idx]),
            Some(head[idx..].join("::")),
            function,
            FrameKind::Static,
        ),
        None if !head.is_empty() => (non_empty(head), None, function, FrameKind::Namespace),
        None => (None, None, function, FrameKind::Global),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BACKTRACE: &str = "   0: std::backtrace_rs::backtrace::libunwind::trace
             at /rustc/abc/library/std/src/../../backtrace/src/backtrace/libunwind.rs:116:5
   1: std::backtrace::Backtrace::create
             at /rustc/abc/library/std/src/backtrace.rs:331:13
   2: peek::trace::Trace::capture
             at ./crates/peek/src/trace.rs:290:25
   3: app::handlers::load_user::h0123456789abcdef
             at ./src/handlers.rs:42:9
   4: app::main
             at ./src/main.rs:10:5
   5: core::ops::function::FnOnce::call_once
             at /rustc/abc/library/core/src/ops/function.rs:250:5
";

    fn raw(n: usize) -> Vec<RawFrame> {
        (0..n)
            .map(|i| {
                RawFrame::new(
                    format!("app::f{i}"),
                    Some(Location::new("src/lib.rs", 10 * (i as u32 + 1))),
                )
            })
            .collect()
    }

    #[test]
    fn test_parse_backtrace() {
        let frames = parse_backtrace(BACKTRACE);
        assert_eq!(frames.len(), 6);
        assert_eq!(frames[3].symbol, "app::handlers::load_user::h0123456789abcdef");
        assert_eq!(
            frames[3].location,
            Some(Location::new("./src/handlers.rs", 42).with_column(9))
        );
        assert_eq!(machinery_depth(&frames), 3);
    }

    #[test]
    fn test_instruction_pointer_prefix() {
        let frames = parse_backtrace("  7:     0x55d0c0de - app::run\n     at src/a.rs:3\n");
        assert_eq!(frames, vec![RawFrame::new("app::run", Some(Location::new("src/a.rs", 3)))]);
    }

    #[test]
    fn test_rewind_drops_exactly_n_frames() {
        let raw = raw(5);
        let trace = Trace::from_raw(&raw, 2).unwrap();

        assert_eq!(trace.len(), 3);
        assert_eq!(trace[0].function(), "f2");
        assert_eq!(trace[0].location(), raw[2].location.as_ref());
        assert_eq!(trace[0].call_site(), raw[3].location.as_ref());
        assert_eq!(trace.origin(), raw[2].location.as_ref());
        assert!(trace[2].call_site().is_none());
    }

    #[test]
    fn test_rewind_to_exact_depth_is_empty() {
        let trace = Trace::from_raw(&raw(3), 3).unwrap();
        assert!(trace.is_empty());
        assert!(trace.origin().is_none());
    }

    #[test]
    fn test_rewind_out_of_range() {
        let err = Trace::from_raw(&raw(3), 4).unwrap_err();
        assert!(matches!(
            err,
            TraceError::RewindOutOfRange { rewind: 4, depth: 3 }
        ));
    }

    #[test]
    #[should_panic(expected = "index out of bounds")]
    fn test_index_past_end_panics() {
        let trace = Trace::from_raw(&raw(2), 0).unwrap();
        let _ = &trace[2];
    }

    #[test]
    fn test_parse_symbols() {
        let frame = Frame::from_symbol("app::db::Pool::get::h0123456789abcdef");
        assert_eq!(frame.namespace(), Some("app::db"));
        assert_eq!(frame.class_name(), Some("Pool"));
        assert_eq!(frame.function(), "get");
        assert_eq!(frame.kind(), FrameKind::Static);

        let frame = Frame::from_symbol("<app::db::Pool as core::ops::Drop>::drop");
        assert_eq!(frame.namespace(), Some("app::db"));
        assert_eq!(frame.class_name(), Some("Pool"));
        assert_eq!(frame.function(), "drop");

        let frame = Frame::from_symbol("app::main::{{closure}}");
        assert_eq!(frame.namespace(), Some("app"));
        assert_eq!(frame.class_name(), None);
        assert_eq!(frame.function(), "main::{closure}");
        assert_eq!(frame.kind(), FrameKind::Namespace);

        let frame = Frame::from_symbol("alloc::vec::Vec<T,A>::push");
        assert_eq!(frame.class_name(), Some("Vec<T,A>"));

        let frame = Frame::from_symbol("<app::Cache<fn() -> u8> as core::ops::Drop>::drop");
        assert_eq!(frame.namespace(), Some("app"));
        assert_eq!(frame.class_name(), Some("Cache<fn() -> u8>"));
        assert_eq!(frame.function(), "drop");

        let frame = Frame::from_symbol("main");
        assert_eq!(frame.kind(), FrameKind::Global);
        assert_eq!(frame.signature(false), "main()");
    }

    #[test]
    fn test_split_path_ignores_return_arrows() {
        assert_eq!(
            split_path("app::Map<K, fn(K) -> V>::get::{{closure}}"),
            ["app", "Map<K, fn(K) -> V>", "get", "{{closure}}"]
        );
        assert_eq!(split_path("a->b::c"), ["a->b", "c"]);
    }

    #[test]
    fn test_signature_forms() {
        let frame = Frame::new("get")
            .in_namespace("app::db")
            .on_class("Pool", FrameKind::Instance)
            .with_args(&[
                Value::from("primary"),
                Value::Int(2),
                Value::list([Value::Null, Value::Null]),
                Value::from("a string that is far too long"),
            ]);

        assert_eq!(frame.signature(false), "app::db::Pool.get(4)");
        assert_eq!(
            frame.signature(true),
            "app::db::Pool.get('primary', 2, [2], 'a string that is…')"
        );
    }

    #[test]
    fn test_capture_skips_machinery() {
        match Trace::capture(0) {
            Ok(trace) => {
                assert!(!trace.is_empty());
                assert!(
                    trace
                        .iter()
                        .all(|frame| !frame.signature(false).contains("Backtrace::"))
                );
                assert!(
                    trace
                        .iter()
                        .any(|frame| frame.function().contains("test_capture_skips_machinery"))
                );
            }
            Err(err) => assert!(matches!(err, TraceError::Unavailable)),
        }
    }

    #[test]
    fn test_capture_rewind_past_depth() {
        let result = Trace::capture(100_000);
        assert!(matches!(
            result,
            Err(TraceError::RewindOutOfRange { .. } | TraceError::Unavailable)
        ));
    }
}
