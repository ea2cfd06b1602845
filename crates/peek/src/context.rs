//! The dump entry point: inspect, capture, render and send in one call.

use std::sync::Arc;
use std::time::Instant;

use crate::render::{RenderOptions, renderer_for};
use crate::{
    Config, Dump, EntityValue, Inspectable, Inspector, Packet, PathAliases, PeekError, Registry,
    Stat, StdoutTransport, Trace, TraceError, Transport, Value,
};

/// Long-lived dumping state: configuration, registered inspectors, path
/// aliases and the output transport.
///
/// Dumps go out as non-final packets; an error dump ends the response and is
/// sent final.
pub struct Context {
    config: Config,
    registry: Arc<Registry>,
    aliases: PathAliases,
    started: Instant,
    transport: Box<dyn Transport>,
}

impl Context {
    /// A context with the default registry, writing to standard output.
    pub fn new(config: Config) -> Self {
        let aliases = config.aliases();
        Self {
            config,
            registry: Arc::new(Registry::with_defaults()),
            aliases,
            started: Instant::now(),
            transport: Box::new(StdoutTransport),
        }
    }

    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Box::new(transport);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn aliases(&self) -> &PathAliases {
        &self.aliases
    }

    pub fn add_alias(&mut self, name: impl Into<String>, prefix: impl Into<String>) -> &mut Self {
        self.aliases.insert(name, prefix);
        self
    }

    /// Inspect values in a single pass, so a value repeated across them is
    /// shown once and referenced afterwards.
    pub fn inspect(&self, values: &[Value]) -> Vec<EntityValue> {
        let mut inspector = Inspector::new(&self.registry);
        values.iter().map(|value| inspector.inspect(value)).collect()
    }

    /// Dump `values`. `rewind` drops that many frames above the caller from
    /// the captured trace.
    #[inline(never)]
    pub fn dump(&mut self, values: &[Value], rewind: usize) -> Result<Packet, PeekError> {
        let trace = self.capture(rewind)?;
        let entities = self.inspect(values);
        self.send_dump(trace, entities)
    }

    /// Like [`dump`](Self::dump) with a label on each value.
    #[inline(never)]
    pub fn dump_named(&mut self, values: &[(&str, Value)], rewind: usize) -> Result<Packet, PeekError> {
        let trace = self.capture(rewind)?;
        let mut inspector = Inspector::new(&self.registry);
        let entities = values
            .iter()
            .map(|(name, value)| inspector.inspect_named(name, value).into())
            .collect();
        self.send_dump(trace, entities)
    }

    /// Dump an error as the final packet of the response. The error carries
    /// its own trace, so none is captured here.
    pub fn dump_error(&mut self, error: impl Inspectable) -> Result<Packet, PeekError> {
        let entities = self.inspect(&[Value::object(error)]);
        let dump = self.build(Trace::default(), entities);
        let packet = self.render(&dump, true);
        self.transport.send_error(&packet, true)?;
        Ok(packet)
    }

    /// Deliver output the transport is still holding, for responses that end
    /// without an error.
    pub fn finish(&mut self) -> Result<(), PeekError> {
        self.transport.finish()?;
        Ok(())
    }

    /// Render with the configured format.
    pub fn render(&self, dump: &Dump, is_final: bool) -> Packet {
        let options = RenderOptions {
            aliases: self.aliases.clone(),
            ..RenderOptions::from(&self.config)
        };
        renderer_for(self.config.format, options).render(dump, is_final)
    }

    fn send_dump(&mut self, trace: Trace, entities: Vec<EntityValue>) -> Result<Packet, PeekError> {
        let dump = self.build(trace, entities);
        let packet = self.render(&dump, false);
        self.transport.send_dump(&packet, false)?;
        Ok(packet)
    }

    fn build(&self, trace: Trace, entities: Vec<EntityValue>) -> Dump {
        let count = entities
            .iter()
            .map(|value| match value {
                EntityValue::Entity(entity) => {
                    let mut count = 0;
                    entity.walk(&mut |_| count += 1);
                    count
                }
                EntityValue::Scalar(_) => 0,
            })
            .sum();

        let mut dump = Dump::new(trace);
        dump.set_stat(Stat::time(self.started.elapsed()));
        if let Some(memory) = Stat::current_memory() {
            dump.set_stat(memory);
        }
        if let Some(origin) = dump.trace().origin().cloned() {
            dump.set_stat(Stat::location(&origin, &self.aliases));
        }
        dump.set_stat(Stat::entities(count));
        for entity in entities {
            dump.push(entity);
        }
        dump
    }

    /// Trace starting at the caller of the public dump method, or an empty one
    /// when tracing is off or the platform cannot capture.
    #[inline(never)]
    fn capture(&self, rewind: usize) -> Result<Trace, PeekError> {
        if !self.config.dump_trace {
            return Ok(Trace::default());
        }
        match Trace::capture(rewind + 2) {
            Ok(trace) => Ok(trace),
            Err(TraceError::Unavailable) => {
                tracing::warn!("backtrace capture unavailable, dumping without a trace");
                Ok(Trace::default())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .field("aliases", &self.aliases)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorObject, Format, MemoryTransport, SentKind};

    fn quiet() -> Config {
        Config {
            dump_trace: false,
            ..Config::default()
        }
    }

    #[test]
    fn test_dump_sends_non_final() {
        let memory = MemoryTransport::new();
        let mut ctx = Context::new(quiet()).with_transport(memory.clone());

        let packet = ctx.dump(&[Value::Int(1), Value::from("two")], 0).unwrap();
        assert!(packet.body.contains("Entities: 0"));
        assert!(packet.body.ends_with("1\n\"two\"\n"));

        let sent = memory.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, SentKind::Dump);
        assert!(!sent[0].is_final);
        assert_eq!(sent[0].packet, packet);
    }

    #[test]
    fn test_values_share_one_pass() {
        let ctx = Context::new(quiet());
        let shared = Value::list([Value::Int(1)]);
        let entities = ctx.inspect(&[shared.clone(), shared]);
        let first = entities[0].as_entity().unwrap();
        let second = entities[1].as_entity().unwrap();
        assert_eq!(second.target(), Some(first.id()));
    }

    #[test]
    fn test_dump_named() {
        let memory = MemoryTransport::new();
        let mut ctx = Context::new(quiet()).with_transport(memory);
        let packet = ctx
            .dump_named(&[("list", Value::list([Value::Int(1)])), ("n", Value::Int(2))], 0)
            .unwrap();
        assert!(packet.body.contains("list = array(1) #array-1 [1]"));
        assert!(packet.body.contains("const n #const-2 2"));
    }

    #[test]
    fn test_dump_error_is_final() {
        let memory = MemoryTransport::new();
        let config = Config {
            format: Format::Html,
            ..quiet()
        };
        let mut ctx = Context::new(config).with_transport(memory.clone());
        ctx.dump_error(ErrorObject::new("app::Failure", "boom")).unwrap();

        let sent = memory.sent();
        assert_eq!(sent[0].kind, SentKind::Error);
        assert!(sent[0].is_final);
        assert!(sent[0].packet.body.starts_with("<!DOCTYPE html>"));
        assert!(sent[0].packet.body.contains("boom"));
    }

    #[test]
    fn test_rewind_past_depth_fails() {
        let mut ctx = Context::new(Config::default()).with_transport(MemoryTransport::new());
        match ctx.dump(&[Value::Null], 100_000) {
            Err(PeekError::Trace(TraceError::RewindOutOfRange { .. })) => {}
            // Platforms without backtraces fall back to an empty trace.
            Ok(packet) => assert!(!packet.body.contains("stack:")),
            Err(err) => panic!("unexpected error: {err}"),
        }
    }
}
