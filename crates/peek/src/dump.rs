use serde::Serialize;

use crate::{EntityValue, Stat, Trace};

/// Everything one render call needs: the trace at dump time, stats and the
/// inspected values in order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Dump {
    trace: Trace,
    stats: Vec<Stat>,
    entities: Vec<EntityValue>,
}

impl Dump {
    pub fn new(trace: Trace) -> Self {
        Self {
            trace,
            ..Self::default()
        }
    }

    pub fn trace(&self) -> &Trace {
        &self.trace
    }

    pub fn stats(&self) -> &[Stat] {
        &self.stats
    }

    pub fn stat(&self, key: &str) -> Option<&Stat> {
        self.stats.iter().find(|s| s.key() == key)
    }

    /// Add a stat, replacing any existing one with the same key in place.
    pub fn set_stat(&mut self, stat: Stat) -> &mut Self {
        if let Some(slot) = self.stats.iter_mut().find(|s| s.key() == stat.key()) {
            *slot = stat;
        } else {
            self.stats.push(stat);
        }
        self
    }

    pub fn push(&mut self, entity: impl Into<EntityValue>) -> &mut Self {
        self.entities.push(entity.into());
        self
    }

    pub fn entities(&self) -> &[EntityValue] {
        &self.entities
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
