//! Parsing comma-separated marker lists.

use std::fmt;

use crate::GlitchError;
use crate::marker::Marker;

/// A parsed marker list: built-in markers plus namespace-qualified custom
/// ones. Both are sorted and deduplicated, so the same set written in any
/// order compares equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MarkerSpec {
    markers: Vec<Marker>,
    custom: Vec<String>,
}

impl MarkerSpec {
    /// Parse `"EInvalidArgument, ENotFound, Missing"`.
    ///
    /// Names that are not built-in markers become custom markers. An
    /// unqualified custom name is prefixed with `namespace`; one already
    /// containing `::` is kept as written. Empty entries are ignored.
    pub fn parse(list: &str, namespace: &str) -> Result<Self, GlitchError> {
        let mut set = Self::default();
        for name in list.split(',').map(str::trim).filter(|name| !name.is_empty()) {
            if let Some(marker) = Marker::from_name(name) {
                set.markers.push(marker);
                continue;
            }
            if !is_valid_name(name) {
                return Err(GlitchError::InvalidMarker {
                    name: name.to_owned(),
                });
            }
            set.custom.push(qualify(name, namespace));
        }
        set.markers.sort_unstable();
        set.markers.dedup();
        set.custom.sort_unstable();
        set.custom.dedup();
        Ok(set)
    }

    pub fn from_markers(markers: impl IntoIterator<Item = Marker>) -> Self {
        let mut markers: Vec<_> = markers.into_iter().collect();
        markers.sort_unstable();
        markers.dedup();
        Self {
            markers,
            custom: Vec::new(),
        }
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn custom(&self) -> &[String] {
        &self.custom
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.custom.is_empty()
    }

    /// The deepest built-in marker; ties go to the one declared first.
    pub fn most_specific(&self) -> Option<Marker> {
        self.markers
            .iter()
            .copied()
            .max_by(|a, b| a.depth().cmp(&b.depth()).then(b.cmp(a)))
    }
}

fn is_valid_name(name: &str) -> bool {
    name.split("::").all(|segment| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|c| c.is_alphabetic() || c == '_')
            && chars.all(|c| c.is_alphanumeric() || c == '_')
    })
}

fn qualify(name: &str, namespace: &str) -> String {
    if name.contains("::") || namespace.is_empty() {
        name.to_owned()
    } else {
        format!("{namespace}::{name}")
    }
}

impl fmt::Display for MarkerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names = self
            .markers
            .iter()
            .map(|marker| marker.as_str())
            .chain(self.custom.iter().map(String::as_str));
        if let Some(first) = names.next() {
            f.write_str(first)?;
            for name in names {
                write!(f, "+{name}")?;
            }
        }
        Ok(())
    }
}
