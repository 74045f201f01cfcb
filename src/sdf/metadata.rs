//! String metadata authored on prim specs.
//!
//! Holds `kind` and free-form custom data. Entries keep insertion order so
//! serialized layers stay stable between runs.

use smallvec::SmallVec;

/// Prim metadata: ordered string pairs, usually just `kind`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MetaData {
    entries: SmallVec<[(String, String); 2]>,
}

impl MetaData {
    /// Model kind key.
    pub const KIND: &'static str = "kind";

    pub fn new() -> Self {
        Self::default()
    }

    /// Merge opinions given strongest first. The first opinion on a key wins;
    /// key order follows the weakest opinion that authored it.
    pub fn compose<'a>(opinions: impl DoubleEndedIterator<Item = &'a MetaData>) -> Self {
        let mut out = Self::new();
        for opinion in opinions.rev() {
            for (key, value) in opinion.iter() {
                out.set(key, value);
            }
        }
        out
    }

    /// Author a value, replacing any previous one in place.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in authored order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Model kind, if authored.
    pub fn kind(&self) -> Option<&str> {
        self.get(Self::KIND)
    }
}
