//! ANSI terminal output.
//!
//! Colours are applied with crossterm style commands. The renderer keeps a
//! stack of active styles: every painted span restores whatever style was
//! active around it, and entering an exception pushes red so its contents
//! read as part of the error until the matching leave.

use std::fmt::Write as _;

use crossterm::style::{Attribute, Color, SetAttribute, SetForegroundColor};
use smallvec::SmallVec;

use crate::render::highlight::{Role, Token, TokenKind};
use crate::render::layout::{braced, bracketed, indent};
use crate::render::{Document, ExcerptLine, FrameView, Name, RenderOptions, Renderer, Sections};
use crate::{Entity, EntityKind, Format, Scalar, Severity, Stat, Visibility};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Style {
    fg: Option<Color>,
    bold: bool,
    dim: bool,
}

impl Style {
    const PLAIN: Self = Self {
        fg: None,
        bold: false,
        dim: false,
    };

    const fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            bold: false,
            dim: false,
        }
    }

    const fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    const DIM: Self = Self {
        fg: None,
        bold: false,
        dim: true,
    };

    fn write_to(self, out: &mut String) {
        if self.bold {
            let _ = write!(out, "{}", SetAttribute(Attribute::Bold));
        }
        if self.dim {
            let _ = write!(out, "{}", SetAttribute(Attribute::Dim));
        }
        if let Some(color) = self.fg {
            let _ = write!(out, "{}", SetForegroundColor(color));
        }
    }
}

/// Coloured terminal output.
#[derive(Debug, Clone, Default)]
pub struct CliRenderer {
    options: RenderOptions,
    styles: SmallVec<[Style; 4]>,
}

impl CliRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self {
            options,
            styles: SmallVec::new(),
        }
    }

    fn current(&self) -> Style {
        self.styles.last().copied().unwrap_or(Style::PLAIN)
    }

    /// `text` in `style`, followed by a return to the enclosing style.
    fn paint(&self, style: Style, text: &str) -> String {
        if text.is_empty() {
            return String::new();
        }
        let mut out = String::new();
        style.write_to(&mut out);
        out.push_str(text);
        let _ = write!(out, "{}", SetAttribute(Attribute::Reset));
        self.current().write_to(&mut out);
        out
    }

    fn token(&self, token: &Token<'_>) -> String {
        let style = match token.kind {
            TokenKind::Keyword => Style::fg(Color::Magenta),
            TokenKind::String => Style::fg(Color::Green),
            TokenKind::Number => Style::fg(Color::Blue),
            TokenKind::Comment => Style::fg(Color::DarkGrey),
            TokenKind::Lifetime => Style::fg(Color::Yellow),
            TokenKind::Macro => Style::fg(Color::Cyan),
            TokenKind::Attribute => Style::fg(Color::DarkYellow),
            TokenKind::Ident if token.role == Role::Type => Style::fg(Color::Yellow),
            TokenKind::Ident if token.role == Role::Function => Style::fg(Color::Cyan),
            _ => return token.text.to_owned(),
        };
        self.paint(style, token.text)
    }
}

const fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Info => Color::Cyan,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    }
}

impl Renderer for CliRenderer {
    fn format(&self) -> Format {
        Format::Cli
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn scalar(&mut self, scalar: &Scalar) -> String {
        let style = match scalar {
            Scalar::Null | Scalar::Bool(_) => Style::fg(Color::Magenta),
            Scalar::Int(_) | Scalar::Float(_) => Style::fg(Color::Blue),
            Scalar::Str(_) => Style::fg(Color::Green),
        };
        self.paint(style, &scalar.format())
    }

    fn text(&mut self, text: &str) -> String {
        self.paint(Style::fg(Color::Green), text)
    }

    fn escape(&mut self, escape: &str) -> String {
        self.paint(Style::fg(Color::Cyan).bold(), escape)
    }

    fn string(&mut self, lines: Vec<String>, chars: usize) -> String {
        let quote = self.paint(Style::fg(Color::Green), "\"");
        if lines.len() == 1 {
            format!("{quote}{}{quote}", lines[0])
        } else {
            let badge = self.paint(Style::DIM, &format!("({chars})"));
            format!("{badge} {quote}{}{quote}", lines.join("\n"))
        }
    }

    fn identifier(&mut self, name: &str, role: Name) -> String {
        match role {
            Name::Kind => self.paint(Style::fg(Color::Cyan).bold(), name),
            Name::Class => self.paint(Style::fg(Color::Yellow), name),
            Name::Key => self.paint(Style::fg(Color::Blue), name),
            Name::Property(visibility) => {
                let prefix = self.paint(Style::DIM, visibility.prefix());
                let style = match visibility {
                    Visibility::Public => Style::fg(Color::White),
                    Visibility::Protected | Visibility::Private => Style::fg(Color::Grey),
                };
                format!("{prefix}{}", self.paint(style, name))
            }
            Name::Label => self.paint(Style::DIM, name),
            Name::Function => self.paint(Style::fg(Color::Cyan), name),
        }
    }

    fn header(&mut self, entity: &Entity, label: String) -> String {
        let name = match entity.name() {
            Some(name) if entity.kind() != EntityKind::Const => {
                format!("{} = ", self.paint(Style::PLAIN.bold(), name))
            }
            _ => String::new(),
        };
        let id = self.paint(Style::DIM, &format!("#{}", entity.id()));
        format!("{name}{label} {id}")
    }

    fn section(&mut self, section: Sections, body: String, _open: bool) -> String {
        if section == Sections::STACK || section == Sections::DEFINITION {
            let title = self.paint(Style::DIM, &format!("{}:", section.title()));
            format!("{title}\n{}", indent(&body))
        } else {
            body
        }
    }

    fn inline_list(&mut self, items: Vec<String>) -> String {
        bracketed(&items, "[", "]")
    }

    fn block_list(&mut self, rows: Vec<(String, String)>) -> String {
        let colon = self.paint(Style::DIM, ":");
        rows.into_iter()
            .map(|(key, value)| format!("{key}{colon} {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn reference(&mut self, entity: &Entity) -> String {
        let target = match entity.class_name() {
            Some(class) => format!("{} ", self.paint(Style::fg(Color::Yellow), class)),
            None => String::new(),
        };
        let word = self.paint(Style::DIM, "ref");
        let id = self.paint(Style::DIM, &format!("#{}", entity.id()));
        format!("{word} {target}{id}")
    }

    fn entity(&mut self, entity: &Entity, header: String, parts: Vec<String>) -> String {
        let mut out = braced(header, &parts, "{", "}");
        if entity.kind() == EntityKind::Exception {
            // `leave` already popped the red; drop it from the terminal too.
            let _ = write!(out, "{}", SetAttribute(Attribute::Reset));
            self.current().write_to(&mut out);
        }
        out
    }

    fn enter(&mut self, entity: &Entity) {
        if entity.kind() == EntityKind::Exception {
            self.styles.push(Style::fg(Color::Red));
        }
    }

    fn leave(&mut self, entity: &Entity) {
        if entity.kind() == EntityKind::Exception {
            self.styles.pop();
        }
    }

    fn source(&mut self, lines: &[ExcerptLine<'_>]) -> String {
        lines
            .iter()
            .map(|line| {
                let number = format!("{:>4}", line.number);
                let gutter = if line.current {
                    self.paint(Style::fg(Color::Red).bold(), &format!(">{number}"))
                } else {
                    self.paint(Style::DIM, &format!(" {number}"))
                };
                let code: String = line.tokens.iter().map(|token| self.token(token)).collect();
                format!("{gutter} {} {code}", self.paint(Style::DIM, "|"))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn frame(&mut self, frame: FrameView) -> String {
        let mut out = format!(
            "{} {}",
            self.paint(Style::DIM, &format!("#{}", frame.index)),
            self.paint(Style::fg(Color::Cyan), &frame.signature)
        );
        if let Some(location) = &frame.location {
            let _ = write!(out, " at {}", self.paint(Style::fg(Color::Blue), location));
        }
        if let Some(call_site) = frame.distinct_call_site() {
            let word = self.paint(Style::DIM, "called from");
            let _ = write!(out, " {word} {}", self.paint(Style::fg(Color::Blue), call_site));
        }
        if let Some(excerpt) = &frame.excerpt {
            out.push('\n');
            out.push_str(&indent(excerpt));
        }
        out
    }

    fn stat(&mut self, stat: &Stat) -> String {
        let label = self.paint(Style::DIM, &format!("{}:", stat.label()));
        let value = if stat.has_renderer(Format::Cli.as_str()) {
            stat.render_for(Format::Cli.as_str())
        } else {
            self.paint(
                Style::fg(severity_color(stat.severity())),
                &stat.value().to_string(),
            )
        };
        format!("{label} {value}")
    }

    fn document(&mut self, document: Document, _is_final: bool) -> String {
        let mut blocks = Vec::new();
        if !document.stats.is_empty() {
            let bar = self.paint(Style::DIM, " | ");
            blocks.push(document.stats.join(&bar));
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
    use crate::{Dump, ErrorObject, Inspector, Registry, TextRenderer, Value, render_value};

    /// Drop CSI sequences (`ESC [ ... final-byte`).
    fn strip_ansi(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\x1b' {
                if chars.next() == Some('[') {
                    for c in chars.by_ref() {
                        if ('@'..='~').contains(&c) {
                            break;
                        }
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }

    fn render_both(value: &Value) -> (String, String) {
        let registry = Registry::new();
        let entity = Inspector::new(&registry).inspect(value);
        let cli = render_value(&mut CliRenderer::default(), &entity);
        let text = render_value(&mut TextRenderer::default(), &entity);
        (cli, text)
    }

    #[test]
    fn test_same_layout_as_text() {
        let value = Value::assoc([
            ("name", Value::from("peek")),
            ("tags", Value::list([Value::Int(1), Value::Float(2.0)])),
            ("none", Value::Null),
        ]);
        let (cli, text) = render_both(&value);
        assert_ne!(cli, text);
        assert_eq!(strip_ansi(&cli), text);
    }

    #[test]
    fn test_paint_restores_outer_style() {
        let mut renderer = CliRenderer::default();
        renderer.styles.push(Style::fg(Color::Red));
        let painted = renderer.paint(Style::fg(Color::Blue), "x");

        let red = SetForegroundColor(Color::Red).to_string();
        let reset = SetAttribute(Attribute::Reset).to_string();
        assert!(painted.ends_with(&format!("{reset}{red}")));
    }

    #[test]
    fn test_style_stack_balanced_after_exception() {
        let registry = Registry::new();
        let error = Value::object(ErrorObject::new("app::Failure", "boom"));
        let value = Value::list([error, Value::Int(1)]);
        let entity = Inspector::new(&registry).inspect(&value);

        let mut renderer = CliRenderer::default();
        let out = render_value(&mut renderer, &entity);
        assert!(renderer.styles.is_empty());
        assert!(strip_ansi(&out).contains("boom"));

        // The sibling after the exception is painted without any red left over.
        let one = CliRenderer::default().paint(Style::fg(Color::Blue), "1");
        assert!(out.ends_with(&format!("{one}]")));

        // The exception ends with a reset before the separator.
        let reset = SetAttribute(Attribute::Reset).to_string();
        let red = SetForegroundColor(Color::Red).to_string();
        let (before, _) = out.rsplit_once(&format!(", {one}")).unwrap();
        assert!(before.ends_with(&reset));
        assert!(!before.ends_with(&red));
    }

    #[test]
    fn test_exception_inside_colored_parent_restores_parent() {
        let mut renderer = CliRenderer::default();
        renderer.styles.push(Style::fg(Color::Yellow));
        let registry = Registry::new();
        let error = Value::object(ErrorObject::new("app::Failure", "boom"));
        let entity = Inspector::new(&registry).inspect(&error);

        let out = render_value(&mut renderer, &entity);
        let reset = SetAttribute(Attribute::Reset).to_string();
        let yellow = SetForegroundColor(Color::Yellow).to_string();
        assert!(out.ends_with(&format!("{reset}{yellow}")));
        assert_eq!(renderer.styles.len(), 1);
    }

    #[test]
    fn test_frame_shows_call_site() {
        let mut renderer = CliRenderer::default();
        let out = renderer.frame(FrameView {
            index: 0,
            signature: "app::load()".to_owned(),
            location: Some("src/load.rs:10".to_owned()),
            call_site: Some("src/main.rs:4".to_owned()),
            excerpt: None,
        });
        assert_eq!(
            strip_ansi(&out),
            "#0 app::load() at src/load.rs:10 called from src/main.rs:4"
        );

        let same = renderer.frame(FrameView {
            index: 1,
            signature: "app::main()".to_owned(),
            location: Some("src/main.rs:4".to_owned()),
            call_site: Some("src/main.rs:4".to_owned()),
            excerpt: None,
        });
        assert_eq!(strip_ansi(&same), "#1 app::main() at src/main.rs:4");
    }

    #[test]
    fn test_stat_uses_severity_color() {
        let mut dump = Dump::default();
        dump.set_stat(Stat::memory(20 * crate::MIB));
        let packet = CliRenderer::default().render(&dump, true);

        let red = SetForegroundColor(Color::Red).to_string();
        assert!(packet.body.contains(&red));
        assert_eq!(strip_ansi(&packet.body), "Memory: 20.00 MiB\n");
    }
}
