//! Header block encoding.
//!
//! Picks the smallest representation RFC 7541 allows for each field:
//! `Indexed` when both name and value are already in a table, indexed
//! literal when only the name is, and falls back to a new-name literal
//! otherwise. Huffman-codes string literals whenever doing so is shorter
//! than sending them raw (`spec.md` §4.9).

use super::dynamic_table::DynamicTable;
use super::huffman;
use super::integer;
use super::name_dictionary::NameDictionary;
use super::static_table;

/// How a caller wants a given field indexed once encoded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Indexing {
    /// Add to the dynamic table after sending (RFC 7541 §6.2.1).
    Incremental,
    /// Send literally, without adding to the dynamic table (§6.2.2).
    WithoutIndexing,
    /// Send literally, and mark as never-indexed even by intermediaries
    /// (§6.2.3) -- for sensitive values such as cookies.
    NeverIndexed,
}

/// Encodes header blocks, maintaining a dynamic table and a
/// [`NameDictionary`] in lockstep with a matching [`super::decoder::HpackDecoder`]
/// on the other end of the connection.
pub struct HpackEncoder {
    table: DynamicTable,
    names: NameDictionary,
}

impl HpackEncoder {
    /// Builds an encoder with a fresh dynamic table at
    /// [`DynamicTable::DEFAULT_MAX_SIZE`].
    pub fn new() -> HpackEncoder {
        HpackEncoder {
            table: DynamicTable::new(),
            names: NameDictionary::new(),
        }
    }

    /// A read-only view of the dynamic table this encoder maintains.
    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.table
    }

    /// Sends a dynamic table size update ahead of the next field encoded.
    pub fn set_max_dynamic_table_size(&mut self, new_size: usize, out: &mut Vec<u8>) {
        out.push(0x20);
        integer::encode(new_size as u64, 5, out);
        self.table.set_max_size(new_size);
    }

    /// Appends the encoding of one header field to `out`.
    pub fn encode_field(&mut self, name: &str, value: &str, indexing: Indexing, out: &mut Vec<u8>) {
        let (name_idx, full_idx) = self.find(name, value);

        if let Some(index) = full_idx {
            out.push(0x80);
            integer::encode((index + 1) as u64, 7, out);
            return;
        }

        let (prefix_bits, leading) = match indexing {
            Indexing::Incremental => (6, 0x40),
            Indexing::WithoutIndexing => (4, 0x00),
            Indexing::NeverIndexed => (4, 0x10),
        };

        out.push(leading);
        match name_idx {
            Some(index) => integer::encode((index + 1) as u64, prefix_bits, out),
            None => {
                *out.last_mut().unwrap() |= 0;
                encode_string(name, out);
            }
        }
        encode_string(value, out);

        if indexing == Indexing::Incremental {
            self.names.shift_after_insert();
            self.table.insert(name, value);
            self.names.record_insert(name);
        }
    }

    /// Finds the combined-address-space index (1-based) for an exact
    /// name+value match, and separately for a name-only match, checking
    /// the static table, then the dynamic table.
    fn find(&self, name: &str, value: &str) -> (Option<usize>, Option<usize>) {
        let (static_name, static_full) = static_table::find(name, value);
        if static_full.is_some() {
            return (static_name.map(|i| i - 1), static_full.map(|i| i - 1));
        }
        let (dyn_name, dyn_full) = self.table.find(name, value);
        let base = static_table::STATIC_TABLE_LEN;
        let full = dyn_full.map(|i| base + i);
        let name_only = static_name
            .map(|i| i - 1)
            .or_else(|| dyn_name.map(|i| base + i));
        (name_only, full)
    }
}

impl Default for HpackEncoder {
    fn default() -> HpackEncoder {
        HpackEncoder::new()
    }
}

fn encode_string(s: &str, out: &mut Vec<u8>) {
    let raw_len = s.len();
    let huff_len = huffman::encoded_len(s.as_bytes());
    if huff_len < raw_len {
        out.push(0x80);
        integer::encode(huff_len as u64, 7, out);
        huffman::encode(s.as_bytes(), out);
    } else {
        out.push(0x00);
        integer::encode(raw_len as u64, 7, out);
        out.extend_from_slice(s.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::super::decoder::HpackDecoder;
    use super::*;

    #[test]
    fn encodes_static_indexed_field() {
        let mut encoder = HpackEncoder::new();
        let mut out = Vec::new();
        encoder.encode_field(":method", "GET", Indexing::Incremental, &mut out);
        assert_eq!(out, vec![0x82]);
    }

    #[test]
    fn round_trips_through_decoder_with_incremental_indexing() {
        let mut encoder = HpackEncoder::new();
        let mut decoder = HpackDecoder::new();
        let mut out = Vec::new();
        encoder.encode_field("x-custom", "value-one", Indexing::Incremental, &mut out);
        let fields = decoder.decode(&out).unwrap();
        assert_eq!(fields[0].name, "x-custom");
        assert_eq!(fields[0].value, "value-one");
        assert_eq!(decoder.dynamic_table().len(), 1);

        out.clear();
        encoder.encode_field("x-custom", "value-one", Indexing::Incremental, &mut out);
        let fields = decoder.decode(&out).unwrap();
        assert_eq!(fields[0].value, "value-one");
        // Second occurrence should be a 1-byte indexed reference, not a
        // fresh literal.
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn never_indexed_does_not_grow_dynamic_table() {
        let mut encoder = HpackEncoder::new();
        let mut out = Vec::new();
        encoder.encode_field("cookie", "secret", Indexing::NeverIndexed, &mut out);
        assert_eq!(encoder.dynamic_table().len(), 0);
    }
}
