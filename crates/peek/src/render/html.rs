//! HTML output.
//!
//! Final output is a standalone document. Output sent before the end of a
//! response is wrapped in a sandboxed `<iframe srcdoc>` so its styles and
//! markup cannot leak into the page around it.

use std::fmt::Write as _;

use crate::render::highlight::{Token, TokenKind};
use crate::render::{Document, ExcerptLine, FrameView, Name, RenderOptions, Renderer, Sections};
use crate::{Entity, EntityKind, Format, Scalar, Stat};

const STYLE: &str = "\
.peek-dump{font:13px/1.5 ui-monospace,Menlo,Consolas,monospace;color:#1f2328;background:#fff;padding:8px}
.peek-stats{display:flex;gap:12px;margin-bottom:8px;color:#57606a}
.peek-stat .peek-label{font-weight:600;margin-right:4px}
.peek-success{color:#1a7f37}.peek-info{color:#0969da}.peek-warning{color:#9a6700}.peek-danger{color:#cf222e}
.peek-entity{margin:2px 0}
.peek-exception>.peek-header{color:#cf222e}
.peek-id{color:#8c959f}.peek-name{font-weight:600}
.peek-kind{color:#0550ae;font-weight:600}.peek-class{color:#953800}
.peek-key{color:#0550ae}.peek-label{color:#57606a}
.peek-property.peek-protected::before{content:'*'}.peek-property.peek-private::before{content:'!'}
.peek-null,.peek-bool{color:#8250df}.peek-int,.peek-float{color:#0550ae}
.peek-string{color:#0a3069;white-space:pre-wrap}.peek-escape{color:#cf222e;font-weight:600}
.peek-badge{color:#8c959f;margin-right:4px}
.peek-inline{display:inline;list-style:none;margin:0;padding:0}
.peek-inline::before{content:'['}.peek-inline::after{content:']'}
.peek-inline>li{display:inline}.peek-inline>li+li::before{content:', '}
.peek-block{margin:0 0 0 16px;display:grid;grid-template-columns:max-content auto;column-gap:8px}
.peek-block>dd{margin:0}
.peek-section{margin-left:16px}.peek-section>summary{color:#57606a;cursor:pointer}
.peek-frames{margin:0;padding-left:24px}
.peek-location,.peek-call-site{color:#57606a}
.peek-source{margin:4px 0;padding:4px;background:#f6f8fa}
.peek-source .peek-current{background:#fff8c5}
.peek-lineno{display:inline-block;width:4em;color:#8c959f;user-select:none}
.tok-keyword{color:#cf222e}.tok-string{color:#0a3069}.tok-number{color:#0550ae}
.tok-comment{color:#6e7781;font-style:italic}.tok-lifetime{color:#953800}
.tok-macro{color:#8250df}.tok-attribute{color:#6e7781}
.role-function{color:#8250df}.role-type{color:#953800}.role-constant{color:#0550ae}
";

/// Escape text for element content and double-quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn span(class: &str, content: &str) -> String {
    format!("<span class=\"{class}\">{content}</span>")
}

#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    options: RenderOptions,
}

impl HtmlRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    fn token(token: &Token<'_>) -> String {
        let text = escape_html(token.text);
        if token.kind == TokenKind::Whitespace {
            return text;
        }
        let mut class = format!("tok-{}", token.kind.as_str());
        if let Some(role) = token.role.as_str() {
            let _ = write!(class, " role-{role}");
        }
        span(&class, &text)
    }
}

impl Renderer for HtmlRenderer {
    fn format(&self) -> Format {
        Format::Html
    }

    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn options(&self) -> &RenderOptions {
        &self.options
    }

    fn scalar(&mut self, scalar: &Scalar) -> String {
        span(
            &format!("peek-{}", scalar.type_name()),
            &escape_html(&scalar.format()),
        )
    }

    fn text(&mut self, text: &str) -> String {
        escape_html(text)
    }

    fn escape(&mut self, escape: &str) -> String {
        span("peek-escape", &escape_html(escape))
    }

    fn string(&mut self, lines: Vec<String>, chars: usize) -> String {
        if lines.len() == 1 {
            return span("peek-string", &format!("&quot;{}&quot;", lines[0]));
        }
        let lines: String = lines
            .iter()
            .map(|line| span("peek-line", line))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "{}{}",
            span("peek-badge", &format!("({chars})")),
            span("peek-string peek-multiline", &format!("&quot;{lines}&quot;"))
        )
    }

    fn identifier(&mut self, name: &str, role: Name) -> String {
        let name = escape_html(name);
        match role {
            Name::Kind => span("peek-kind", &name),
            Name::Class => span("peek-class", &name),
            Name::Key => span("peek-key", &name),
            Name::Property(visibility) => format!(
                "<span class=\"peek-property peek-{vis}\" title=\"{vis}\">{name}</span>",
                vis = visibility.as_str()
            ),
            Name::Label => span("peek-label", &name),
            Name::Function => span("peek-function", &name),
        }
    }

    fn header(&mut self, entity: &Entity, label: String) -> String {
        let name = match entity.name() {
            Some(name) if entity.kind() != EntityKind::Const => {
                format!("{} = ", span("peek-name", &escape_html(name)))
            }
            _ => String::new(),
        };
        format!(
            "{name}{label} {}",
            span("peek-id", &format!("#{}", entity.id()))
        )
    }

    fn section(&mut self, section: Sections, body: String, open: bool) -> String {
        let title = section.title();
        let body = if section == Sections::STACK {
            format!("<ol class=\"peek-frames\">{body}</ol>")
        } else {
            body
        };
        let open = if open { " open" } else { "" };
        format!(
            "<details class=\"peek-section peek-{title}\"{open}><summary>{title}</summary>{body}</details>"
        )
    }

    fn inline_list(&mut self, items: Vec<String>) -> String {
        let items: String = items
            .iter()
            .map(|item| format!("<li>{item}</li>"))
            .collect();
        format!("<ol class=\"peek-inline\">{items}</ol>")
    }

    fn block_list(&mut self, rows: Vec<(String, String)>) -> String {
        let rows: String = rows
            .iter()
            .map(|(key, value)| format!("<dt>{key}</dt><dd>{value}</dd>"))
            .collect();
        format!("<dl class=\"peek-block\">{rows}</dl>")
    }

    fn reference(&mut self, entity: &Entity) -> String {
        let class = entity
            .class_name()
            .map(|class| format!("{} ", span("peek-class", &escape_html(class))))
            .unwrap_or_default();
        format!(
            "<a class=\"peek-ref\" href=\"#{id}\">ref {class}#{id}</a>",
            id = entity.id()
        )
    }

    fn entity(&mut self, entity: &Entity, header: String, parts: Vec<String>) -> String {
        format!(
            "<div class=\"peek-entity peek-{kind}\" id=\"{id}\"><div class=\"peek-header\">{header}</div>{parts}</div>",
            kind = entity.kind().as_str(),
            id = entity.id(),
            parts = parts.concat()
        )
    }

    fn source(&mut self, lines: &[ExcerptLine<'_>]) -> String {
        let lines: String = lines
            .iter()
            .map(|line| {
                let class = if line.current {
                    "peek-line peek-current"
                } else {
                    "peek-line"
                };
                let code: String = line.tokens.iter().map(Self::token).collect();
                format!(
                    "<span class=\"{class}\">{}{code}</span>\n",
                    span("peek-lineno", &line.number.to_string())
                )
            })
            .collect();
        format!("<pre class=\"peek-source\"><code>{lines}</code></pre>")
    }

    fn frame(&mut self, frame: FrameView) -> String {
        let mut out = format!(
            "<li class=\"peek-frame\"><code>{}</code>",
            escape_html(&frame.signature)
        );
        if let Some(location) = &frame.location {
            let _ = write!(out, " {}", span("peek-location", &escape_html(location)));
        }
        if let Some(call_site) = frame.distinct_call_site() {
            let _ = write!(
                out,
                " {}",
                span("peek-call-site", &format!("called from {}", escape_html(call_site)))
            );
        }
        if let Some(excerpt) = &frame.excerpt {
            out.push_str(excerpt);
        }
        out.push_str("</li>");
        out
    }

    fn stat(&mut self, stat: &Stat) -> String {
        let value = if stat.has_renderer(Format::Html.as_str()) {
            stat.render_for(Format::Html.as_str())
        } else {
            escape_html(&stat.render_for(Format::Html.as_str()))
        };
        format!(
            "<span class=\"peek-stat peek-{severity}\" data-key=\"{key}\">{label}{value}</span>",
            severity = stat.severity().as_str(),
            key = escape_html(stat.key()),
            label = span("peek-label", &escape_html(stat.label())),
        )
    }

    fn document(&mut self, document: Document, is_final: bool) -> String {
        let mut body = String::from("<div class=\"peek-dump\">");
        if !document.stats.is_empty() {
            let _ = write!(
                body,
                "<div class=\"peek-stats\">{}</div>",
                document.stats.concat()
            );
        }
        for entity in &document.entities {
            body.push_str(entity);
        }
        if let Some(stack) = &document.stack {
            body.push_str(stack);
        }
        body.push_str("</div>");

        let page = format!(
            "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>peek</title><style>{STYLE}</style></head><body>{body}</body></html>\n"
        );
        if is_final {
            page
        } else {
            format!(
                "<iframe class=\"peek-iframe\" sandbox srcdoc=\"{}\" style=\"width:100%;border:0\"></iframe>\n",
                escape_html(&page)
            )
        }
    }
}
