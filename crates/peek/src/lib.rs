//! # peek
//!
//! Inspect runtime values, capture where they were dumped from and render
//! the result as HTML, ANSI terminal output or plain text.
//!
//! # Pipeline
//!
//! ```text
//! Value ──Inspector──▶ Entity tree ─┐
//! Trace::capture ──────────────────┼─▶ Dump ──Renderer──▶ Packet ──Transport──▶ sink
//! Stat (time, memory, location) ───┘
//! ```
//!
//! The [`Inspector`] tracks composite values by identity, so shared and
//! self-referential structures render once and are referenced afterwards.
//!
//! # Example
//!
//! ```
//! use peek::{Config, Context, MemoryTransport, Value};
//!
//! let memory = MemoryTransport::new();
//! let mut ctx = Context::new(Config::default()).with_transport(memory.clone());
//! ctx.dump(&[Value::list([Value::from("a"), Value::from("b")])], 0).unwrap();
//!
//! assert!(memory.bodies()[0].contains(r#"array(2) #array-1 ["a", "b"]"#));
//! ```

#[allow(unused_extern_crates)]
extern crate self as peek;

mod aliases;
mod config;
mod context;
mod dump;
mod entity;
mod error;
mod inspector;
mod registry;
pub mod render;
mod resource;
mod scalar;
mod stat;
mod trace;
mod traits;
mod transport;
mod value;

pub use aliases::PathAliases;
pub use config::{Config, DEFAULT_CONTEXT_LINES, Format};
pub use context::Context;
pub use dump::Dump;
pub use entity::{Entity, EntityId, EntityKind, EntityValue, Property, Visibility};
pub use error::{ConfigError, InspectError, PeekError, TraceError};
pub use inspector::Inspector;
pub use peek_derive::Inspectable;
pub use registry::{ClassInfo, ObjectInspectorFn, Registry, ResourceInspectorFn, TypeKind};
pub use render::{
    CliRenderer, HtmlRenderer, Packet, RenderOptions, Renderer, TextRenderer, render_entity,
    render_value, renderer_for,
};
pub use resource::FileStream;
pub use scalar::{Scalar, Segment, escape_control, format_float, segments};
pub use stat::{KIB, MIB, Severity, Stat, StatRenderFn, StatValue};
pub use trace::{Arg, Frame, FrameKind, Location, MAX_ARG_CHARS, RawFrame, Trace, parse_backtrace};
pub use traits::{Describe, ErrorObject, Field, Inspectable, Throwable};
pub use transport::{HttpTransport, MemoryTransport, Sent, SentKind, StdoutTransport, Transport};
pub use value::{
    Array, ArrayKey, ArrayRef, ObjectRef, Resource, ResourceRef, ToKey, ToValue, Value, is_dense,
};
