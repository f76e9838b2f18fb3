//! sde-profile counters module.
//!
//! A [`CounterSchema`] fixes the ordered list of counter names once at startup;
//! every [`CounterSet`] is a vector of values laid out in that order.

use crate::config::{Count, Index, Map, REGION_OF_INTEREST};

/// Ordered vocabulary of counter names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSchema {
    names: Vec<String>,
    index: Map<String, Index>,
}

impl Default for CounterSchema {
    fn default() -> Self {
        Self::from_names(REGION_OF_INTEREST.iter().copied())
    }
}

impl CounterSchema {
    /// Creates the schema from names, ignoring repeated ones.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut schema = CounterSchema {
            names: Vec::new(),
            index: Map::new(),
        };
        for name in names {
            schema.push(name.as_ref());
        }
        schema
    }

    /// Creates the default region-of-interest schema extended with `extra` names.
    pub fn with_extra<S: AsRef<str>>(extra: &[S]) -> Self {
        let mut schema = Self::default();
        for name in extra {
            schema.push(name.as_ref());
        }
        schema
    }

    /// Parses a comma-separated list of extra counter names (`--items PUSH,POP`).
    pub fn parse_items(items: &str) -> Vec<String> {
        items
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }

    fn push(&mut self, name: &str) {
        if self.index.contains_key(name) {
            tracing::warn!("Counter '{}' is already in the schema, ignored", name);
            return;
        }
        self.index.insert(name.to_string(), self.names.len());
        self.names.push(name.to_string());
    }

    /// Returns the slot of a counter, if the name is known.
    pub fn position(&self, name: &str) -> Option<Index> {
        self.index.get(name).copied()
    }

    /// Returns the counter names in column order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Creates a counter set with all counters at zero.
    pub fn empty_set(&self) -> CounterSet {
        CounterSet {
            values: vec![0; self.names.len()],
        }
    }
}

/// Counter values of one row, ordered by the owning schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSet {
    values: Vec<Count>,
}

impl CounterSet {
    /// Overwrites the value of a counter (profiler lines are running totals).
    pub fn set(&mut self, slot: Index, value: Count) {
        self.values[slot] = value;
    }

    /// Returns the value of a counter.
    pub fn get(&self, slot: Index) -> Count {
        self.values[slot]
    }

    /// Adds every counter of `other` into this set.
    pub fn accumulate(&mut self, other: &CounterSet) {
        for (v, o) in self.values.iter_mut().zip(&other.values) {
            *v = v.saturating_add(*o);
        }
    }

    /// Resets all counters to zero.
    pub fn clear(&mut self) {
        self.values.iter_mut().for_each(|v| *v = 0);
    }

    pub fn values(&self) -> &[Count] {
        &self.values
    }
}

impl From<Vec<Count>> for CounterSet {
    fn from(values: Vec<Count>) -> Self {
        CounterSet { values }
    }
}
