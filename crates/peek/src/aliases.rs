//! Short `name://` forms for long filesystem paths.

use std::borrow::Cow;

use crate::ConfigError;

/// Name → path prefix table, matched longest prefix first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathAliases {
    // Sorted by prefix length, longest first.
    aliases: Vec<(String, String)>,
}

impl PathAliases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=/prefix;name=/prefix`.
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let mut aliases = Self::new();
        for entry in spec.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, prefix) = entry
                .split_once('=')
                .map(|(n, p)| (n.trim(), p.trim()))
                .filter(|(n, p)| !n.is_empty() && !p.is_empty())
                .ok_or_else(|| ConfigError::InvalidAlias(entry.to_owned()))?;
            aliases.insert(name, prefix);
        }
        Ok(aliases)
    }

    /// Add or replace an alias.
    pub fn insert(&mut self, name: impl Into<String>, prefix: impl Into<String>) -> &mut Self {
        let name = name.into();
        let prefix = prefix.into();
        self.aliases.retain(|(n, _)| *n != name);
        self.aliases.push((name, prefix));
        self.aliases.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        self
    }

    /// Rewrite `path` with the longest matching prefix, or return it as-is.
    pub fn apply<'a>(&self, path: &'a str) -> Cow<'a, str> {
        for (name, prefix) in &self.aliases {
            let Some(rest) = path.strip_prefix(prefix.as_str()) else {
                continue;
            };
            // `/srv/app` must not match `/srv/application`.
            if !(rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/')) {
                continue;
            }
            return Cow::Owned(format!("{name}://{}", rest.trim_start_matches('/')));
        }
        Cow::Borrowed(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(n, p)| (n.as_str(), p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}
