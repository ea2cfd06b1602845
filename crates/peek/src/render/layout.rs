//! Format-independent traversal shared by every renderer.

use crate::render::{Document, FrameView, Name, Packet, Renderer, Sections, highlight};
use crate::scalar::{Segment, segments};
use crate::value::is_dense;
use crate::{Dump, Entity, EntityKind, EntityValue, Scalar, Trace};

pub(crate) fn render_dump<R: Renderer + ?Sized>(r: &mut R, dump: &Dump, is_final: bool) -> Packet {
    let stats = dump.stats().iter().map(|stat| r.stat(stat)).collect();
    let entities = dump
        .entities()
        .iter()
        .map(|value| render_value(r, value))
        .collect();
    let stack = (!dump.trace().is_empty()).then(|| {
        let frames = render_trace(r, dump.trace());
        r.section(Sections::STACK, frames, false)
    });

    let body = r.document(
        Document {
            stats,
            entities,
            stack,
        },
        is_final,
    );
    Packet {
        body,
        content_type: r.content_type(),
    }
}

/// Render a slot value: a scalar or a nested entity.
pub fn render_value<R: Renderer + ?Sized>(r: &mut R, value: &EntityValue) -> String {
    match value {
        EntityValue::Scalar(scalar) => render_scalar(r, scalar),
        EntityValue::Entity(entity) => render_entity(r, entity),
    }
}

fn render_scalar<R: Renderer + ?Sized>(r: &mut R, scalar: &Scalar) -> String {
    match scalar {
        Scalar::Str(s) => render_string(r, s),
        other => r.scalar(other),
    }
}

fn render_line<R: Renderer + ?Sized>(r: &mut R, line: &str) -> String {
    segments(line)
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => r.text(text),
            Segment::Escape(escape) => r.escape(&escape),
        })
        .collect()
}

fn render_string<R: Renderer + ?Sized>(r: &mut R, s: &str) -> String {
    let lines = s.split('\n').map(|line| render_line(r, line)).collect();
    r.string(lines, s.chars().count())
}

/// Render an entity and everything below it.
pub fn render_entity<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> String {
    if entity.kind() == EntityKind::Reference {
        return r.reference(entity);
    }

    let label = header_label(r, entity);
    let header = r.header(entity, label);
    let sections = Sections::for_kind(entity.kind());
    let open = entity.is_open();

    r.enter(entity);
    let mut parts = Vec::new();
    for section in sections.iter() {
        if let Some(body) = render_section(r, entity, section) {
            parts.push(r.section(section, body, open));
        }
    }
    r.leave(entity);

    r.entity(entity, header, parts)
}

fn render_section<R: Renderer + ?Sized>(
    r: &mut R,
    entity: &Entity,
    section: Sections,
) -> Option<String> {
    if section == Sections::INFO {
        render_info(r, entity)
    } else if section == Sections::DEFINITION {
        let lines = highlight::lines(entity.definition()?);
        Some(r.source(&lines))
    } else if section == Sections::TEXT {
        let lines: Vec<String> = entity
            .text()?
            .split('\n')
            .map(|line| render_line(r, line))
            .collect();
        Some(lines.join("\n"))
    } else if section == Sections::META {
        render_meta(r, entity)
    } else if section == Sections::PROPERTIES {
        render_properties(r, entity)
    } else if section == Sections::VALUES {
        render_values(r, entity)
    } else if section == Sections::STACK {
        let trace = entity.stack_trace().filter(|trace| !trace.is_empty())?;
        Some(render_trace(r, trace))
    } else {
        None
    }
}

fn header_label<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> String {
    let kind = r.identifier(entity.kind().as_str(), Name::Kind);
    let class = |r: &mut R| {
        entity
            .class_name()
            .map(|class| format!(" {}", r.identifier(class, Name::Class)))
            .unwrap_or_default()
    };

    match entity.kind() {
        EntityKind::Array | EntityKind::Stack | EntityKind::Binary => {
            format!("{kind}({})", entity.length().unwrap_or(0))
        }
        EntityKind::Resource => format!(
            "{kind}({})",
            r.identifier(entity.class_name().unwrap_or("unknown"), Name::Class)
        ),
        EntityKind::Const => format!(
            "{kind} {}",
            r.identifier(entity.name().unwrap_or("?"), Name::Key)
        ),
        _ => format!("{kind}{}", class(r)),
    }
}

fn render_info<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> Option<String> {
    let mut rows = Vec::new();
    for (label, names) in [
        ("extends", entity.parent_classes()),
        ("implements", entity.interfaces()),
        ("uses", entity.traits()),
    ] {
        if names.is_empty() {
            continue;
        }
        let label = r.identifier(label, Name::Label);
        let names: Vec<String> = names
            .iter()
            .map(|name| r.identifier(name, Name::Class))
            .collect();
        rows.push((label, names.join(", ")));
    }

    if let Some(file) = entity.file() {
        let mut location = r.options().aliases.apply(file).into_owned();
        match (entity.start_line(), entity.end_line()) {
            (Some(start), Some(end)) => location.push_str(&format!(":{start}-{end}")),
            (Some(start), None) => location.push_str(&format!(":{start}")),
            _ => {}
        }
        let label = r.identifier("defined in", Name::Label);
        let value = render_line(r, &location);
        rows.push((label, value));
    }

    (!rows.is_empty()).then(|| r.block_list(rows))
}

fn render_meta<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> Option<String> {
    if entity.meta().is_empty() {
        return None;
    }
    let rows = entity
        .meta()
        .iter()
        .map(|(key, value)| (r.identifier(key, Name::Key), render_value(r, value)))
        .collect();
    Some(r.block_list(rows))
}

fn render_properties<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> Option<String> {
    if entity.properties().is_empty() {
        return None;
    }
    let rows = entity
        .properties()
        .iter()
        .map(|property| {
            (
                r.identifier(&property.name, Name::Property(property.visibility)),
                render_value(r, &property.value),
            )
        })
        .collect();
    Some(r.block_list(rows))
}

/// Dense `0..n` keys render inline, anything else as a keyed block.
fn render_values<R: Renderer + ?Sized>(r: &mut R, entity: &Entity) -> Option<String> {
    let values = entity.values();
    if values.is_empty() {
        return (entity.kind() == EntityKind::Array).then(|| r.inline_list(Vec::new()));
    }

    if !entity.show_value_keys() && values.len() == 1 {
        return Some(render_value(r, &values[0].1));
    }

    if !entity.show_value_keys() || is_dense(values.iter().map(|(key, _)| key.as_ref())) {
        let items = values.iter().map(|(_, value)| render_value(r, value)).collect();
        return Some(r.inline_list(items));
    }

    let rows = values
        .iter()
        .enumerate()
        .map(|(idx, (key, value))| {
            let key = key
                .as_ref()
                .map_or_else(|| idx.to_string(), ToString::to_string);
            (r.identifier(&key, Name::Key), render_value(r, value))
        })
        .collect();
    Some(r.block_list(rows))
}

fn render_trace<R: Renderer + ?Sized>(r: &mut R, trace: &Trace) -> String {
    let options = r.options().clone();
    let frames: Vec<String> = trace
        .iter()
        .enumerate()
        .map(|(index, frame)| {
            let location_text = |location: &crate::Location| {
                format!("{}:{}", options.aliases.apply(&location.file), location.line)
            };
            let excerpt = frame
                .location()
                .filter(|_| options.source_excerpts)
                .and_then(|location| {
                    let source = read_source(&location.file)?;
                    let lines = highlight::excerpt(
                        &source,
                        location.line as usize,
                        options.context_lines,
                    );
                    (!lines.is_empty()).then(|| r.source(&lines))
                });

            r.frame(FrameView {
                index,
                signature: frame.signature(options.expand_args),
                location: frame.location().map(&location_text),
                call_site: frame.call_site().map(&location_text),
                excerpt,
            })
        })
        .collect();
    frames.join("\n")
}

fn read_source(file: &str) -> Option<String> {
    match std::fs::read_to_string(file) {
        Ok(source) => Some(source),
        Err(err) => {
            tracing::trace!(file, error = %err, "source excerpt unavailable");
            None
        }
    }
}

/// Indent every non-empty line by two spaces.
pub(crate) fn indent(text: &str) -> String {
    text.lines()
        .map(|line| {
            if line.is_empty() {
                String::new()
            } else {
                format!("  {line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `header part` for a single one-line part, `header {` block `}` otherwise.
pub(crate) fn braced(header: String, parts: &[String], open: &str, close: &str) -> String {
    match parts {
        [] => header,
        [part] if !part.contains('\n') => format!("{header} {part}"),
        _ => format!("{header} {open}\n{}\n{close}", indent(&parts.join("\n"))),
    }
}

/// `[a, b]` when every item fits on one line, one item per line otherwise.
pub(crate) fn bracketed(items: &[String], open: &str, close: &str) -> String {
    if items.iter().any(|item| item.contains('\n')) {
        format!("{open}\n{}\n{close}", indent(&items.join(",\n")))
    } else {
        format!("{open}{}{close}", items.join(", "))
    }
}
