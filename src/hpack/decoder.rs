//! Header block decoding: RFC 7541 §6's five representation types,
//! dispatched on the leading bits of each octet.

use crate::error::{Error, HpackErrorKind, Result};

use super::dynamic_table::DynamicTable;
use super::encoder::Indexing;
use super::huffman;
use super::integer;
use super::static_table;

/// One decoded header field, tagged with the representation it arrived in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
    /// How this field was represented on the wire. An indexed
    /// representation (full hit in the static or dynamic table) is
    /// reported as [`Indexing::Incremental`] since it carries no
    /// never-indexed marker of its own; what matters for
    /// `NeverIndexed`/`WithoutIndexing` is that the distinction between
    /// those two literal forms survives decoding; a forwarding
    /// intermediary must re-encode a `NeverIndexed` field the same way
    /// rather than silently promoting it to an indexable literal
    /// (RFC 7541 §6.2.3).
    pub representation: Indexing,
}

/// Decodes header blocks against a connection's dynamic table.
///
/// One `HpackDecoder` is kept per HTTP/2 connection direction; its
/// dynamic table accumulates entries across calls to
/// [`HpackDecoder::decode`] exactly as RFC 7541 requires.
pub struct HpackDecoder {
    table: DynamicTable,
}

impl HpackDecoder {
    /// Builds a decoder with a fresh dynamic table at
    /// [`DynamicTable::DEFAULT_MAX_SIZE`].
    pub fn new() -> HpackDecoder {
        HpackDecoder {
            table: DynamicTable::new(),
        }
    }

    /// A read-only view of the dynamic table this decoder maintains.
    pub fn dynamic_table(&self) -> &DynamicTable {
        &self.table
    }

    /// Decodes a full header block, returning every header field in wire
    /// order.
    pub fn decode(&mut self, block: &[u8]) -> Result<Vec<HeaderField>> {
        let mut fields = Vec::new();
        let mut pos = 0;
        while pos < block.len() {
            let consumed = self.decode_one(&block[pos..], &mut fields)?;
            pos += consumed;
        }
        Ok(fields)
    }

    fn decode_one(&mut self, buf: &[u8], fields: &mut Vec<HeaderField>) -> Result<usize> {
        let first = buf[0];
        if first & 0x80 != 0 {
            let (index, consumed) = integer::decode(buf, 7)?;
            let (name, value) = self.resolve_indexed(index as usize)?;
            fields.push(HeaderField {
                name,
                value,
                representation: Indexing::Incremental,
            });
            return Ok(consumed);
        }
        if first & 0x40 != 0 {
            return self.decode_literal(buf, 6, Indexing::Incremental, fields);
        }
        if first & 0x20 != 0 {
            let (new_size, consumed) = integer::decode(buf, 5)?;
            self.table.set_max_size(new_size as usize);
            return Ok(consumed);
        }
        if first & 0x10 != 0 {
            return self.decode_literal(buf, 4, Indexing::NeverIndexed, fields);
        }
        self.decode_literal(buf, 4, Indexing::WithoutIndexing, fields)
    }

    fn decode_literal(
        &mut self,
        buf: &[u8],
        prefix_bits: u8,
        representation: Indexing,
        fields: &mut Vec<HeaderField>,
    ) -> Result<usize> {
        let (index, mut consumed) = integer::decode(buf, prefix_bits)?;
        let name = if index == 0 {
            let (s, n) = decode_string(&buf[consumed..])?;
            consumed += n;
            s
        } else {
            self.resolve_indexed(index as usize)?.0
        };
        let (value, n) = decode_string(&buf[consumed..])?;
        consumed += n;
        if representation == Indexing::Incremental {
            self.table.insert(&name, &value);
        }
        fields.push(HeaderField {
            name,
            value,
            representation,
        });
        Ok(consumed)
    }

    fn resolve_indexed(&self, index: usize) -> Result<(String, String)> {
        if index == 0 {
            return Err(HpackErrorKind::InvalidIndex.into());
        }
        if let Some(entry) = static_table::lookup(index) {
            return Ok((entry.name.to_string(), entry.value.to_string()));
        }
        let dyn_index = index - static_table::STATIC_TABLE_LEN - 1;
        self.table
            .get(dyn_index)
            .map(|(n, v)| (n.to_string(), v.to_string()))
            .ok_or_else(|| Error::from(HpackErrorKind::IndexOutOfRange))
    }
}

impl Default for HpackDecoder {
    fn default() -> HpackDecoder {
        HpackDecoder::new()
    }
}

fn decode_string(buf: &[u8]) -> Result<(String, usize)> {
    if buf.is_empty() {
        return Err(HpackErrorKind::NeedMoreData.into());
    }
    let huffman_coded = buf[0] & 0x80 != 0;
    let (len, prefix_len) = integer::decode(buf, 7)?;
    let len = len as usize;
    let total = prefix_len + len;
    let body = buf
        .get(prefix_len..total)
        .ok_or(HpackErrorKind::NeedMoreData)?;
    let bytes = if huffman_coded {
        huffman::decode(body)?
    } else {
        body.to_vec()
    };
    let s = String::from_utf8(bytes).map_err(|_| HpackErrorKind::InvalidHuffmanEncodedData)?;
    Ok((s, total))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_indexed_static_field() {
        let mut decoder = HpackDecoder::new();
        // Index 2 == ":method: GET", indexed representation.
        let fields = decoder.decode(&[0x82]).unwrap();
        assert_eq!(fields[0].name, ":method");
        assert_eq!(fields[0].value, "GET");
    }

    #[test]
    fn decodes_literal_with_incremental_indexing_and_new_name() {
        let mut decoder = HpackDecoder::new();
        // 0x40 (literal, incremental indexing, new name), name "a" (1
        // byte, not huffman), value "b" (1 byte, not huffman).
        let block = [0x40, 0x01, b'a', 0x01, b'b'];
        let fields = decoder.decode(&block).unwrap();
        assert_eq!(fields[0].name, "a");
        assert_eq!(fields[0].value, "b");
        assert_eq!(decoder.dynamic_table().len(), 1);
    }

    #[test]
    fn never_indexed_and_without_indexing_decode_to_distinct_representations() {
        let mut decoder = HpackDecoder::new();
        // 0x10 (literal, never indexed, new name), name "cookie", value
        // "secret".
        let never_indexed = [0x10, 0x06, b'c', b'o', b'o', b'k', b'i', b'e', 0x06, b's', b'e', b'c', b'r', b'e', b't'];
        let fields = decoder.decode(&never_indexed).unwrap();
        assert_eq!(fields[0].representation, Indexing::NeverIndexed);
        assert_eq!(decoder.dynamic_table().len(), 0);

        // 0x00 (literal, without indexing, new name), name "x", value "y".
        let without_indexing = [0x00, 0x01, b'x', 0x01, b'y'];
        let fields = decoder.decode(&without_indexing).unwrap();
        assert_eq!(fields[0].representation, Indexing::WithoutIndexing);
        assert_eq!(decoder.dynamic_table().len(), 0);
    }

    #[test]
    fn decodes_dynamic_table_size_update() {
        let mut decoder = HpackDecoder::new();
        // 0x20 | 10 == size update to 10 (fits in 5-bit prefix).
        decoder.decode(&[0x2a]).unwrap();
        assert_eq!(decoder.dynamic_table().max_size(), 10);
    }

    #[test]
    fn rejects_out_of_range_index() {
        let mut decoder = HpackDecoder::new();
        assert!(decoder.decode(&[0xff, 0x00]).is_err());
    }
}
