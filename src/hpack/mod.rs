//! HPACK (RFC 7541) header compression: static and dynamic tables, the
//! integer and Huffman codecs, and block encoding/decoding.
//!
//! This module has no dependency on the runtime or reactor above it and
//! can be used standalone, matching `spec.md` §1's requirement that HPACK
//! serve as "the representative protocol core" independent of the rest of
//! the crate.

pub mod decoder;
pub mod dynamic_table;
pub mod encoder;
pub mod huffman;
pub mod integer;
pub mod name_dictionary;
pub mod static_table;

pub use decoder::{HeaderField, HpackDecoder};
pub use dynamic_table::DynamicTable;
pub use encoder::{HpackEncoder, Indexing};
pub use name_dictionary::NameDictionary;

/// A paired encoder and decoder for one side of an HTTP/2 connection.
///
/// Most callers want this rather than the encoder/decoder halves
/// separately: a connection encodes outgoing header blocks and decodes
/// incoming ones, and both directions need their own independent dynamic
/// table state.
pub struct HpackContext {
    pub encoder: HpackEncoder,
    pub decoder: HpackDecoder,
}

impl HpackContext {
    /// Builds a context with fresh encoder and decoder state.
    pub fn new() -> HpackContext {
        HpackContext {
            encoder: HpackEncoder::new(),
            decoder: HpackDecoder::new(),
        }
    }
}

impl Default for HpackContext {
    fn default() -> HpackContext {
        HpackContext::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_bundles_independent_encoder_and_decoder_tables() {
        let mut ctx = HpackContext::new();
        let mut out = Vec::new();
        ctx.encoder
            .encode_field("x-a", "1", Indexing::Incremental, &mut out);
        assert_eq!(ctx.encoder.dynamic_table().len(), 1);
        assert_eq!(ctx.decoder.dynamic_table().len(), 0);
        ctx.decoder.decode(&out).unwrap();
        assert_eq!(ctx.decoder.dynamic_table().len(), 1);
    }
}
