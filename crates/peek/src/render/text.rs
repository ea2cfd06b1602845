//! Plain text output, also the layout the CLI renderer mirrors.

use crate::render::layout::{braced, bracketed, indent};
use crate::render::{Document, ExcerptLine, FrameView, Name, RenderOptions, Renderer, Sections};
use crate::{Entity, EntityKind, Format, Scalar, Stat};

/// Plain text, no colour. Visibility shows as a `*` (protected) or `!`
/// (private) prefix on property names.
#[derive(Debug, Clone, Default)]
pub struct TextRenderer {
    options: RenderOptions,
}

impl TextRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }
}

impl Renderer for TextRenderer {
    fn format(&self) -> Format {
        Format::Text
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn scalar(&mut self, scalar: &Scalar) -> String {
        scalar.format().into_owned()
    }

    fn text(&mut self, text: &str) -> String {
        text.to_owned()
    }

    fn escape(&mut self, escape: &str) -> String {
        escape.to_owned()
    }

    fn string(&mut self, lines: Vec<String>, chars: usize) -> String {
        if lines.len() == 1 {
            format!("\"{}\"", lines[0])
        } else {
            format!("({chars}) \"{}\"", lines.join("\n"))
        }
    }

    fn identifier(&mut self, name: &str, role: Name) -> String {
        match role {
            Name::Property(visibility) => format!("{}{name}", visibility.prefix()),
            _ => name.to_owned(),
        }
    }

    fn header(&mut self, entity: &Entity, label: String) -> String {
        let name = entity
            .name()
            .filter(|_| entity.kind() != EntityKind::Const)
            .map(|name| format!("{name} = "))
            .unwrap_or_default();
        format!("{name}{label} #{}", entity.id())
    }

    fn section(&mut self, section: Sections, body: String, _open: bool) -> String {
        if section == Sections::STACK || section == Sections::DEFINITION {
            format!("{}:\n{}", section.title(), indent(&body))
        } else {
            body
        }
    }

    fn inline_list(&mut self, items: Vec<String>) -> String {
        bracketed(&items, "[", "]")
    }

    fn block_list(&mut self, rows: Vec<(String, String)>) -> String {
        rows.into_iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn reference(&mut self, entity: &Entity) -> String {
        match entity.class_name() {
            Some(class) => format!("ref {class} #{}", entity.id()),
            None => format!("ref #{}", entity.id()),
        }
    }

    fn entity(&mut self, _entity: &Entity, header: String, parts: Vec<String>) -> String {
        braced(header, &parts, "{", "}")
    }

    fn source(&mut self, lines: &[ExcerptLine<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                let text: String = line.tokens.iter().map(|token| token.text).collect();
                let marker = if line.current { '>' } else { ' ' };
                format!("{marker}{:>4} | {text}", line.number)
                    .trim_end()
                    .to_owned()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn frame(&mut self, frame: FrameView) -> String {
        let mut out = format!("#{} {}", frame.index, frame.signature);
        if let Some(location) = &frame.location {
            out.push_str(" at ");
            out.push_str(location);
        }
        if let Some(call_site) = frame.distinct_call_site() {
            out.push_str(" called from ");
            out.push_str(call_site);
        }
        if let Some(excerpt) = &frame.excerpt {
            out.push('\n');
            out.push_str(&indent(excerpt));
        }
        out
    }

    fn stat(&mut self, stat: &Stat) -> String {
        format!("{}: {}", stat.label(), stat.render_for(Format::Text.as_str()))
    }

    fn document(&mut self, document: Document, _is_final: bool) -> String {
        let mut blocks = Vec::new();
        if !document.stats.is_empty() {
            blocks.push(document.stats.join(" | "));
        }
        blocks.extend(document.entities);
        blocks.extend(document.stack);

        let mut out = blocks.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dump, Frame, Inspector, Location, Registry, Trace, Value, render_value};

    fn render(value: &Value) -> String {
        let registry = Registry::new();
        let entity = Inspector::new(&registry).inspect(value);
        render_value(&mut TextRenderer::default(), &entity)
    }

    #[test]
    fn test_scalar_forms() {
        assert_eq!(render(&Value::Null), "null");
        assert_eq!(render(&Value::Bool(true)), "true");
        assert_eq!(render(&Value::Bool(false)), "false");
        assert_eq!(render(&Value::Int(0)), "0");
        assert_eq!(render(&Value::Float(0.0)), "0.0");
        assert_eq!(render(&Value::Float(3.0)), "3.0");
        assert_eq!(render(&Value::from("abc")), "\"abc\"");
    }

    #[test]
    fn test_escapes_and_multiline() {
        assert_eq!(render(&Value::from("a\tb")), "\"a\\tb\"");
        assert_eq!(render(&Value::from("ab\ncd")), "(5) \"ab\ncd\"");
    }

    #[test]
    fn test_dense_list_is_inline() {
        let value = Value::list([Value::from("a"), Value::from("b"), Value::from("c")]);
        insta::assert_snapshot!(render(&value), @r#"array(3) #array-1 ["a", "b", "c"]"#);
    }

    #[test]
    fn test_sparse_keys_are_a_block() {
        let value = Value::assoc([
            (0, Value::from("a")),
            (2, Value::from("b")),
            (1, Value::from("c")),
        ]);
        insta::assert_snapshot!(render(&value), @r#"
        array(3) #array-1 {
          0: "a"
          2: "b"
          1: "c"
        }
        "#);
    }

    #[test]
    fn test_empty_array() {
        assert_eq!(render(&Value::array()), "array(0) #array-1 []");
    }

    #[test]
    fn test_self_reference() {
        let root = Value::array();
        if let Some(array) = root.as_array() {
            array.borrow_mut().push(root.clone());
        }
        assert_eq!(render(&root), "array(1) #array-1 [ref #array-1]");
        if let Some(array) = root.as_array() {
            *array.borrow_mut() = crate::Array::new();
        }
    }

    #[test]
    fn test_document_layout() {
        let mut dump = Dump::default();
        dump.set_stat(Stat::entities(2))
            .push(Scalar::Int(1))
            .push(Scalar::Str("two".into()));

        let packet = TextRenderer::default().render(&dump, true);
        assert_eq!(packet.content_type, "text/plain; charset=utf-8");
        assert_eq!(packet.body, "Entities: 2\n1\n\"two\"\n");
    }

    #[test]
    fn test_stack_shows_distinct_call_sites() {
        let trace = Trace::new(vec![
            Frame::new("load")
                .in_namespace("app")
                .at(Location::new("src/load.rs", 10))
                .called_from(Location::new("src/main.rs", 4)),
            Frame::new("main")
                .in_namespace("app")
                .at(Location::new("src/main.rs", 4))
                .called_from(Location::new("src/main.rs", 4)),
        ]);
        let mut renderer = TextRenderer::new(RenderOptions {
            source_excerpts: false,
            ..RenderOptions::default()
        });

        let packet = renderer.render(&Dump::new(trace), true);
        assert_eq!(
            packet.body,
            "stack:\n  #0 app::load() at src/load.rs:10 called from src/main.rs:4\n  #1 app::main() at src/main.rs:4\n"
        );
    }
}
