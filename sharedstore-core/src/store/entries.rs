/*
    entries.rs - Slot-stable entry table shared by both store roles

    Layout:
    - a Vec of slots, each either an Entry or vacant
    - new keys are appended after the last slot, vacant or not
    - removing a key vacates its slot; slots are never compacted

    The slot layout is part of what is replicated: a snapshot carries vacant
    slots as `null`, so `key(index)` answers the same on every context once
    they have converged.
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single key-value pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: String,
    pub value: Value,
}

impl Entry {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        Entry {
            key: key.into(),
            value,
        }
    }
}

/// The full slot sequence of a store, as sent in `updateStorage`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(Vec<Option<Entry>>);

impl Snapshot {
    pub fn from_slots(slots: Vec<Option<Entry>>) -> Self {
        Snapshot(slots)
    }

    pub fn slots(&self) -> &[Option<Entry>] {
        &self.0
    }

    /// Live entries in slot order
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.0.iter().flatten()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Ordered key-value table with stable slot positions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryTable {
    slots: Vec<Option<Entry>>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a snapshot
    ///
    /// Slot positions are kept. A key that appears twice is folded into its
    /// first slot with the later value, and the later slot is left vacant.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut table = EntryTable {
            slots: Vec::with_capacity(snapshot.0.len()),
        };

        for slot in snapshot.0 {
            match slot {
                Some(entry) => match table.position(&entry.key) {
                    Some(first) => {
                        if let Some(existing) = table.slots[first].as_mut() {
                            existing.value = entry.value;
                        }
                        table.slots.push(None);
                    }
                    None => table.slots.push(Some(entry)),
                },
                None => table.slots.push(None),
            }
        }

        table
    }

    /// Slot index holding `key`
    pub fn position(&self, key: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| matches!(slot, Some(entry) if entry.key == key))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.slots
            .iter()
            .flatten()
            .find(|entry| entry.key == key)
            .map(|entry| &entry.value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Insert or overwrite in place, returning the slot index used
    pub fn set(&mut self, key: &str, value: Value) -> usize {
        match self.position(key) {
            Some(index) => {
                self.slots[index] = Some(Entry::new(key, value));
                index
            }
            None => {
                self.slots.push(Some(Entry::new(key, value)));
                self.slots.len() - 1
            }
        }
    }

    /// Vacate the slot holding `key`
    pub fn remove(&mut self, key: &str) -> Option<Entry> {
        let index = self.position(key)?;
        self.slots[index].take()
    }

    /// Key stored at a slot index
    pub fn key(&self, index: usize) -> Option<&str> {
        self.slots
            .get(index)
            .and_then(|slot| slot.as_ref())
            .map(|entry| entry.key.as_str())
    }

    /// Live keys in slot order
    pub fn keys(&self) -> Vec<String> {
        self.slots.iter().flatten().map(|entry| entry.key.clone()).collect()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots, vacant ones included
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot(self.slots.clone())
    }
}
