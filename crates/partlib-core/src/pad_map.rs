//! Pad to signal association of a device

use std::collections::BTreeMap;
use uuid::Uuid;

/// Maps package pads to component signals
///
/// Keys are unique. Iteration is in ascending pad UUID order, which is the
/// same as the lexicographic order of their hyphenated text form, so the
/// serialized form of a map never depends on insertion history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadSignalMap {
    entries: BTreeMap<Uuid, Uuid>,
}

impl PadSignalMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pair, handing the pad back if it is already mapped
    pub(crate) fn try_insert(&mut self, pad: Uuid, signal: Uuid) -> Result<(), Uuid> {
        if self.entries.contains_key(&pad) {
            return Err(pad);
        }
        self.entries.insert(pad, signal);
        Ok(())
    }

    pub(crate) fn remove(&mut self, pad: &Uuid) -> Option<Uuid> {
        self.entries.remove(pad)
    }

    pub fn contains_pad(&self, pad: &Uuid) -> bool {
        self.entries.contains_key(pad)
    }

    /// Signal realized by `pad`
    pub fn signal_of(&self, pad: &Uuid) -> Option<Uuid> {
        self.entries.get(pad).copied()
    }

    /// All pads connected to `signal`, in pad order
    pub fn pads_of(&self, signal: &Uuid) -> Vec<Uuid> {
        self.entries
            .iter()
            .filter(|(_, s)| *s == signal)
            .map(|(pad, _)| *pad)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `(pad, signal)` pairs in canonical pad order
    pub fn iter(&self) -> impl Iterator<Item = (Uuid, Uuid)> + '_ {
        self.entries.iter().map(|(pad, signal)| (*pad, *signal))
    }
}
