//! Renderers turn a [`Dump`] into a [`Packet`].
//!
//! The traversal lives once in [`layout`]: it walks the entity tree, decides
//! which sections each entity shows and whether a list renders inline or as
//! a keyed block. A [`Renderer`] only supplies the leaf hooks that wrap
//! already-rendered pieces in format-specific markup.

mod cli;
pub mod highlight;
mod html;
mod layout;
mod text;

use bitflags::bitflags;
pub use cli::CliRenderer;
pub use highlight::ExcerptLine;
pub use html::{HtmlRenderer, escape_html};
pub use layout::{render_entity, render_value};
pub use text::TextRenderer;

use crate::{Config, Dump, Entity, EntityKind, Format, PathAliases, Scalar, Stat, Visibility};

/// Rendered output handed to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub body: String,
    pub content_type: &'static str,
}

bitflags! {
    /// Optional blocks an entity can show, in display order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Sections: u8 {
        const INFO = 1;
        const DEFINITION = 1 << 1;
        const TEXT = 1 << 2;
        const META = 1 << 3;
        const PROPERTIES = 1 << 4;
        const VALUES = 1 << 5;
        const STACK = 1 << 6;
    }
}

impl Sections {
    /// The blocks relevant to an entity kind, in display order.
    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Object => {
                Self::INFO | Self::META | Self::TEXT | Self::PROPERTIES | Self::VALUES
            }
            EntityKind::Array | EntityKind::Const => Self::VALUES,
            EntityKind::Resource => Self::META,
            EntityKind::Exception => Self::TEXT | Self::META | Self::PROPERTIES | Self::STACK,
            EntityKind::Class | EntityKind::Interface | EntityKind::Trait => {
                Self::INFO | Self::DEFINITION
            }
            EntityKind::Stack => Self::STACK,
            EntityKind::Binary => Self::TEXT,
            EntityKind::Reference => Self::empty(),
        }
    }

    /// Title of a single section flag.
    pub fn title(self) -> &'static str {
        if self == Self::INFO {
            "info"
        } else if self == Self::META {
            "meta"
        } else if self == Self::TEXT {
            "text"
        } else if self == Self::PROPERTIES {
            "properties"
        } else if self == Self::VALUES {
            "values"
        } else if self == Self::STACK {
            "stack"
        } else if self == Self::DEFINITION {
            "definition"
        } else {
            "section"
        }
    }
}

/// What kind of name an identifier hook is asked to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name {
    /// Entity kind word in a header: `array`, `object`, ...
    Kind,
    Class,
    Key,
    Property(Visibility),
    /// Fixed labels such as `extends` or `defined in`.
    Label,
    Function,
}

/// Pieces of a whole dump, each already rendered.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub stats: Vec<String>,
    pub entities: Vec<String>,
    pub stack: Option<String>,
}

/// A stack frame, pre-rendered by the layout.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub index: usize,
    pub signature: String,
    pub location: Option<String>,
    pub call_site: Option<String>,
    pub excerpt: Option<String>,
}

impl FrameView {
    /// The call site, unless it only repeats the frame's own location.
    pub fn distinct_call_site(&self) -> Option<&str> {
        self.call_site
            .as_deref()
            .filter(|call_site| self.location.as_deref() != Some(*call_site))
    }
}

/// Knobs shared by every renderer.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub expand_args: bool,
    pub source_excerpts: bool,
    pub context_lines: usize,
    pub aliases: PathAliases,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for RenderOptions {
    fn from(config: &Config) -> Self {
        Self {
            expand_args: config.expand_args,
            source_excerpts: config.source_excerpts,
            context_lines: config.context_lines,
            aliases: config.aliases(),
        }
    }
}

/// Format-specific leaf hooks. [`render`](Self::render) drives them.
pub trait Renderer {
    fn format(&self) -> Format;

    fn content_type(&self) -> &'static str;

    fn options(&self) -> &RenderOptions;

    /// `null`, booleans and numbers. Strings go through [`string`](Self::string).
    fn scalar(&mut self, scalar: &Scalar) -> String;

    /// Literal text inside a string line.
    fn text(&mut self, text: &str) -> String;

    /// A control character escape such as `\t`.
    fn escape(&mut self, escape: &str) -> String;

    /// A string from its rendered lines; `chars` is the character count.
    fn string(&mut self, lines: Vec<String>, chars: usize) -> String;

    fn identifier(&mut self, name: &str, role: Name) -> String;

    /// Entity header from the rendered label (`array(3)`, `object app::User`).
    fn header(&mut self, entity: &Entity, label: String) -> String;

    fn section(&mut self, section: Sections, body: String, open: bool) -> String;

    /// Sequential values, no keys.
    fn inline_list(&mut self, items: Vec<String>) -> String;

    /// Keyed rows.
    fn block_list(&mut self, rows: Vec<(String, String)>) -> String;

    /// A pointer back at an entity rendered earlier.
    fn reference(&mut self, entity: &Entity) -> String;

    /// Wrap a header and the entity's rendered sections.
    fn entity(&mut self, entity: &Entity, header: String, parts: Vec<String>) -> String;

    /// Called before an entity's sections are rendered.
    fn enter(&mut self, entity: &Entity) {
        let _ = entity;
    }

    /// Called after an entity's sections are rendered.
    fn leave(&mut self, entity: &Entity) {
        let _ = entity;
    }

    /// Highlighted source lines.
    fn source(&mut self, lines: &[ExcerptLine<'_>]) -> String;

    fn frame(&mut self, frame: FrameView) -> String;

    fn stat(&mut self, stat: &Stat) -> String;

    fn document(&mut self, document: Document, is_final: bool) -> String;

    /// Render a whole dump. `is_final` marks the last output of a response.
    fn render(&mut self, dump: &Dump, is_final: bool) -> Packet {
        layout::render_dump(self, dump, is_final)
    }
}

/// The renderer for a configured format.
pub fn renderer_for(format: Format, options: RenderOptions) -> Box<dyn Renderer> {
    match format {
        Format::Text => Box::new(TextRenderer::new(options)),
        Format::Cli => Box::new(CliRenderer::new(options)),
        Format::Html => Box::new(HtmlRenderer::new(options)),
    }
}
