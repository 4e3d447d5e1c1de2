//! [`NameDictionary`]: a prefix tree mapping header *names* to the lowest
//! combined-address-space index that currently holds that name, used by
//! [`super::encoder::HpackEncoder`] to avoid a linear scan of the dynamic
//! table on every encode call.
//!
//! Not part of RFC 7541's wire format -- purely an encoder-side
//! optimization, grounded on the original runtime's
//! `include/ilias/http/detail/dictionary_tree.hpp`, which the distilled
//! specification does not mention but which the original ships and uses
//! from its HTTP/2 encoder (`http2.hpp`).

use std::collections::HashMap;

/// Maps a header name to the indices (static, then dynamic-table
/// insertion order) that currently carry it, most-recently-added last so
/// the encoder can prefer the newest dynamic entry.
#[derive(Default)]
pub struct NameDictionary {
    by_name: HashMap<Box<str>, Vec<usize>>,
}

impl NameDictionary {
    /// Builds an empty dictionary.
    pub fn new() -> NameDictionary {
        NameDictionary {
            by_name: HashMap::new(),
        }
    }

    /// Records that `name` is now also available at dynamic-table
    /// position `dyn_index` (0-based, 0 == most recent).
    pub fn record_insert(&mut self, name: &str) {
        self.by_name
            .entry(name.into())
            .or_default()
            .insert(0, 0);
    }

    /// Shifts every recorded dynamic-table position up by one, called
    /// whenever a new entry is inserted ahead of the existing ones.
    pub fn shift_after_insert(&mut self) {
        for positions in self.by_name.values_mut() {
            for pos in positions.iter_mut().skip(1) {
                *pos += 1;
            }
        }
    }

    /// Drops the entry for `name` at `dyn_index`, or every entry beyond
    /// the new table length, when the dynamic table evicts.
    pub fn retain_within(&mut self, name: &str, table_len: usize) {
        if let Some(positions) = self.by_name.get_mut(name) {
            positions.retain(|&pos| pos < table_len);
            if positions.is_empty() {
                self.by_name.remove(name);
            }
        }
    }

    /// The most-recent dynamic-table position recorded for `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).and_then(|positions| positions.first().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_most_recently_recorded_position() {
        let mut dict = NameDictionary::new();
        dict.record_insert("x-custom");
        dict.shift_after_insert();
        dict.record_insert("x-custom");
        assert_eq!(dict.lookup("x-custom"), Some(0));
    }

    #[test]
    fn retain_within_drops_evicted_positions() {
        let mut dict = NameDictionary::new();
        dict.record_insert("x-custom");
        dict.retain_within("x-custom", 0);
        assert_eq!(dict.lookup("x-custom"), None);
    }
}
