//! The HPACK dynamic table: a FIFO of recently-seen header fields, evicted
//! oldest-first whenever adding an entry would exceed the table's size
//! limit (RFC 7541 §2.3.2, §4).

use std::collections::VecDeque;

/// Per-entry overhead RFC 7541 §4.1 mandates be added to `len(name) +
/// len(value)` when accounting against the size limit.
const ENTRY_OVERHEAD: usize = 32;

#[derive(Clone)]
struct Entry {
    name: Box<str>,
    value: Box<str>,
}

impl Entry {
    fn size(&self) -> usize {
        self.name.len() + self.value.len() + ENTRY_OVERHEAD
    }
}

/// A per-connection dynamic table, shared in spirit (not in code) by the
/// encoder and decoder sides of one HPACK context -- each side keeps its
/// own, kept in sync by both processing insertions/evictions identically.
pub struct DynamicTable {
    entries: VecDeque<Entry>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    /// The size a freshly constructed `HpackContext` starts with (resolves
    /// the Open Question in `spec.md` §9: the original leaves this
    /// unbounded; this crate starts at HTTP/2's own default
    /// `SETTINGS_HEADER_TABLE_SIZE`).
    pub const DEFAULT_MAX_SIZE: usize = 4096;

    /// Builds an empty table at [`DynamicTable::DEFAULT_MAX_SIZE`].
    pub fn new() -> DynamicTable {
        DynamicTable {
            entries: VecDeque::new(),
            size: 0,
            max_size: Self::DEFAULT_MAX_SIZE,
        }
    }

    /// The number of entries currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The combined accounted size (name + value + per-entry overhead) of
    /// every entry currently held.
    pub fn size(&self) -> usize {
        self.size
    }

    /// The table's current size limit.
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Applies a dynamic table size update (the representation type RFC
    /// 7541 §6.3 defines), evicting entries until the new, possibly
    /// smaller, limit is satisfied.
    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to_fit();
    }

    /// Inserts a new entry at the front (most-recently-added), evicting
    /// from the back until it fits. An entry larger than the table's
    /// entire capacity empties the table instead of being stored, per RFC
    /// 7541 §4.4.
    pub fn insert(&mut self, name: &str, value: &str) {
        let entry = Entry {
            name: name.into(),
            value: value.into(),
        };
        let entry_size = entry.size();
        if entry_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }
        self.size += entry_size;
        self.entries.push_front(entry);
        self.evict_to_fit();
    }

    /// Looks up a 0-based dynamic-table position (0 == most recently
    /// added), returning the name and value.
    pub fn get(&self, index: usize) -> Option<(&str, &str)> {
        self.entries
            .get(index)
            .map(|entry| (&*entry.name, &*entry.value))
    }

    /// Finds the lowest (most recent) dynamic-table position matching
    /// `name`, and separately one matching `name` and `value` exactly.
    pub fn find(&self, name: &str, value: &str) -> (Option<usize>, Option<usize>) {
        let mut name_only = None;
        for (i, entry) in self.entries.iter().enumerate() {
            if &*entry.name == name {
                if name_only.is_none() {
                    name_only = Some(i);
                }
                if &*entry.value == value {
                    return (name_only, Some(i));
                }
            }
        }
        (name_only, None)
    }

    fn evict_to_fit(&mut self) {
        while self.size > self.max_size {
            let Some(evicted) = self.entries.pop_back() else {
                break;
            };
            self.size -= evicted.size();
            log::trace!("evicted dynamic table entry {:?}, {} bytes freed", evicted.name, evicted.size());
        }
    }
}

impl Default for DynamicTable {
    fn default() -> DynamicTable {
        DynamicTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_round_trips() {
        let mut table = DynamicTable::new();
        table.insert("custom-key", "custom-value");
        assert_eq!(table.get(0), Some(("custom-key", "custom-value")));
    }

    #[test]
    fn eviction_is_fifo_oldest_first() {
        let mut table = DynamicTable::new();
        table.set_max_size(64);
        table.insert("a", "1"); // 2 + 32 = 34
        table.insert("b", "2"); // another 34, total 68 > 64, evicts "a"
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0), Some(("b", "2")));
    }

    #[test]
    fn shrinking_max_size_evicts_immediately() {
        let mut table = DynamicTable::new();
        table.insert("name", "value"); // 4 + 5 + 32 = 41
        table.set_max_size(10);
        assert!(table.is_empty());
    }

    #[test]
    fn entry_larger_than_table_empties_it() {
        let mut table = DynamicTable::new();
        table.set_max_size(10);
        table.insert("this-name-is-too-long", "for-the-table");
        assert!(table.is_empty());
    }
}
