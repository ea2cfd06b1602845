//! Output configuration, read from `PEEK_*` environment variables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, PathAliases};

/// Default number of source lines shown around a frame's line.
pub const DEFAULT_CONTEXT_LINES: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Text,
    Cli,
    Html,
}

impl Format {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Cli => "cli",
            Self::Html => "html",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "cli" | "ansi" => Ok(Self::Cli),
            "html" => Ok(Self::Html),
            _ => Err(ConfigError::InvalidFormat(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub format: Format,
    /// Source lines around a frame's line; clamped to `1..=30` when used.
    pub context_lines: usize,
    /// Alias name → path prefix.
    pub path_aliases: BTreeMap<String, String>,
    /// Show argument literals in frame signatures instead of a count.
    pub expand_args: bool,
    /// Read source files to show excerpts next to stack frames.
    pub source_excerpts: bool,
    /// Include the dump-time trace in every dump.
    pub dump_trace: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            format: Format::default(),
            context_lines: DEFAULT_CONTEXT_LINES,
            path_aliases: BTreeMap::new(),
            expand_args: true,
            source_excerpts: true,
            dump_trace: true,
        }
    }
}

impl Config {
    /// Defaults overridden by `PEEK_FORMAT`, `PEEK_CONTEXT_LINES`,
    /// `PEEK_PATH_ALIASES`, `PEEK_EXPAND_ARGS`, `PEEK_SOURCE_EXCERPTS` and
    /// `PEEK_DUMP_TRACE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(format) = lookup("PEEK_FORMAT") {
            config.format = format.parse()?;
        }
        if let Some(lines) = lookup("PEEK_CONTEXT_LINES") {
            config.context_lines =
                lines
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidNumber {
                        key: "PEEK_CONTEXT_LINES",
                        value: lines.clone(),
                    })?;
        }
        if let Some(aliases) = lookup("PEEK_PATH_ALIASES") {
            config.path_aliases = PathAliases::parse(&aliases)?
                .iter()
                .map(|(name, prefix)| (name.to_owned(), prefix.to_owned()))
                .collect();
        }
        if let Some(value) = lookup("PEEK_EXPAND_ARGS") {
            config.expand_args = parse_bool("PEEK_EXPAND_ARGS", &value)?;
        }
        if let Some(value) = lookup("PEEK_SOURCE_EXCERPTS") {
            config.source_excerpts = parse_bool("PEEK_SOURCE_EXCERPTS", &value)?;
        }
        if let Some(value) = lookup("PEEK_DUMP_TRACE") {
            config.dump_trace = parse_bool("PEEK_DUMP_TRACE", &value)?;
        }

        Ok(config)
    }

    pub fn aliases(&self) -> PathAliases {
        let mut aliases = PathAliases::new();
        for (name, prefix) in &self.path_aliases {
            aliases.insert(name, prefix);
        }
        aliases
    }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: value.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.format, Format::Text);
        assert_eq!(config.context_lines, 8);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PEEK_FORMAT", "HTML"),
            ("PEEK_CONTEXT_LINES", "3"),
            ("PEEK_PATH_ALIASES", "app=/srv/app"),
            ("PEEK_EXPAND_ARGS", "off"),
        ]))
        .unwrap();

        assert_eq!(config.format, Format::Html);
        assert_eq!(config.context_lines, 3);
        assert!(!config.expand_args);
        assert_eq!(config.aliases().apply("/srv/app/x.rs"), "app://x.rs");
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PEEK_FORMAT", "pdf")])),
            Err(ConfigError::InvalidFormat(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("PEEK_CONTEXT_LINES", "many")])),
            Err(ConfigError::InvalidNumber { key: "PEEK_CONTEXT_LINES", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("PEEK_EXPAND_ARGS", "maybe")])),
            Err(ConfigError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: Config = serde_json::from_str(r#"{"format": "cli"}"#).unwrap();
        assert_eq!(config.format, Format::Cli);
        assert!(config.source_excerpts);
    }
}
