//! RFC 7541 Appendix C.3: three requests to `www.example.com`, decoded
//! without Huffman coding, checked against the wire bytes and the
//! resulting dynamic table sizes the RFC's worked example gives.

use coro_reactor::hpack::decoder::HeaderField;
use coro_reactor::hpack::encoder::Indexing;
use coro_reactor::HpackDecoder;

// Every header field decoded in this file arrives either fully indexed or
// as a literal with incremental indexing (RFC 7541 Appendix C.3's worked
// example never uses the without-indexing or never-indexed forms).
fn field(name: &str, value: &str) -> HeaderField {
    HeaderField {
        name: name.to_string(),
        value: value.to_string(),
        representation: Indexing::Incremental,
    }
}

#[test]
fn three_uncoded_requests_match_rfc_7541_appendix_c3() {
    let mut decoder = HpackDecoder::new();

    // C.3.1: :method: GET, :scheme: http, :path: /, :authority: www.example.com
    let first = [
        0x82, 0x86, 0x84, 0x41, 0x0f, 0x77, 0x77, 0x77, 0x2e, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c,
        0x65, 0x2e, 0x63, 0x6f, 0x6d,
    ];
    let fields = decoder.decode(&first).unwrap();
    assert_eq!(
        fields,
        vec![
            field(":method", "GET"),
            field(":scheme", "http"),
            field(":path", "/"),
            field(":authority", "www.example.com"),
        ]
    );
    assert_eq!(decoder.dynamic_table().len(), 1);
    assert_eq!(decoder.dynamic_table().size(), 57);

    // C.3.2: same three pseudo-headers (now via dynamic index 62),
    // cache-control: no-cache.
    let second = [
        0x82, 0x86, 0x84, 0xbe, 0x58, 0x08, 0x6e, 0x6f, 0x2d, 0x63, 0x61, 0x63, 0x68, 0x65,
    ];
    let fields = decoder.decode(&second).unwrap();
    assert_eq!(
        fields,
        vec![
            field(":method", "GET"),
            field(":scheme", "http"),
            field(":path", "/"),
            field(":authority", "www.example.com"),
            field("cache-control", "no-cache"),
        ]
    );
    assert_eq!(decoder.dynamic_table().len(), 2);
    assert_eq!(decoder.dynamic_table().size(), 110);

    // C.3.3: :scheme: https, :path: /index.html, :authority (indexed),
    // a brand new custom-key: custom-value pair.
    let third = [
        0x82, 0x87, 0x85, 0xbf, 0x40, 0x0a, 0x63, 0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x6b, 0x65,
        0x79, 0x0c, 0x63, 0x75, 0x73, 0x74, 0x6f, 0x6d, 0x2d, 0x76, 0x61, 0x6c, 0x75, 0x65,
    ];
    let fields = decoder.decode(&third).unwrap();
    assert_eq!(
        fields,
        vec![
            field(":method", "GET"),
            field(":scheme", "https"),
            field(":path", "/index.html"),
            field(":authority", "www.example.com"),
            field("custom-key", "custom-value"),
        ]
    );
    assert_eq!(decoder.dynamic_table().len(), 3);
    assert_eq!(decoder.dynamic_table().size(), 164);
}

#[test]
fn encoder_evicts_oldest_entry_once_a_constrained_table_overflows() {
    // Mirrors the shape of RFC 7541 C.5 (a response sequence under a
    // byte-constrained dynamic table) without depending on its exact wire
    // bytes: insert three same-size entries into a table sized for two,
    // and check the oldest -- not the newest -- is the one evicted.
    use coro_reactor::hpack::encoder::Indexing;
    use coro_reactor::HpackEncoder;

    let mut encoder = HpackEncoder::new();
    let mut out = Vec::new();
    encoder.set_max_dynamic_table_size(100, &mut out);
    assert_eq!(encoder.dynamic_table().max_size(), 100);

    // Each entry costs 1 + 1 + 32 = 34 bytes; three of them (102) exceed
    // the 100-byte limit, so the first ("a") must be evicted once the
    // third ("c") is inserted.
    out.clear();
    encoder.encode_field("a", "1", Indexing::Incremental, &mut out);
    encoder.encode_field("b", "1", Indexing::Incremental, &mut out);
    encoder.encode_field("c", "1", Indexing::Incremental, &mut out);

    let mut decoder = HpackDecoder::new();
    decoder.decode(&[0x3f, 0x45]).unwrap(); // size update to 100, prefix-5 encoded
    let fields = decoder.decode(&out).unwrap();
    assert_eq!(fields, vec![field("a", "1"), field("b", "1"), field("c", "1")]);

    assert_eq!(encoder.dynamic_table().len(), 2);
    assert_eq!(encoder.dynamic_table().size(), 68);
    assert_eq!(decoder.dynamic_table().len(), 2);
    assert_eq!(decoder.dynamic_table().size(), 68);
}
