//! The fixed 61-entry static table from RFC 7541 Appendix A.
//!
//! Indices 1..=61 address this table directly; the combined address space
//! used by field representations puts the dynamic table immediately after
//! it (`spec.md` §4.9).

/// One static-table entry: a header name, and its value if the name
/// always implies a fixed value (most don't, and pair an empty value with
/// a caller-supplied one).
pub struct StaticEntry {
    pub name: &'static str,
    pub value: &'static str,
}

/// The number of entries in the static table (RFC 7541 fixes this at 61).
pub const STATIC_TABLE_LEN: usize = 61;

/// The table itself, indexed `[0]` == HPACK index 1.
pub static STATIC_TABLE: [StaticEntry; STATIC_TABLE_LEN] = [
    StaticEntry { name: ":authority", value: "" },
    StaticEntry { name: ":method", value: "GET" },
    StaticEntry { name: ":method", value: "POST" },
    StaticEntry { name: ":path", value: "/" },
    StaticEntry { name: ":path", value: "/index.html" },
    StaticEntry { name: ":scheme", value: "http" },
    StaticEntry { name: ":scheme", value: "https" },
    StaticEntry { name: ":status", value: "200" },
    StaticEntry { name: ":status", value: "204" },
    StaticEntry { name: ":status", value: "206" },
    StaticEntry { name: ":status", value: "304" },
    StaticEntry { name: ":status", value: "400" },
    StaticEntry { name: ":status", value: "404" },
    StaticEntry { name: ":status", value: "500" },
    StaticEntry { name: "accept-charset", value: "" },
    StaticEntry { name: "accept-encoding", value: "gzip, deflate" },
    StaticEntry { name: "accept-language", value: "" },
    StaticEntry { name: "accept-ranges", value: "" },
    StaticEntry { name: "accept", value: "" },
    StaticEntry { name: "access-control-allow-origin", value: "" },
    StaticEntry { name: "age", value: "" },
    StaticEntry { name: "allow", value: "" },
    StaticEntry { name: "authorization", value: "" },
    StaticEntry { name: "cache-control", value: "" },
    StaticEntry { name: "content-disposition", value: "" },
    StaticEntry { name: "content-encoding", value: "" },
    StaticEntry { name: "content-language", value: "" },
    StaticEntry { name: "content-length", value: "" },
    StaticEntry { name: "content-location", value: "" },
    StaticEntry { name: "content-range", value: "" },
    StaticEntry { name: "content-type", value: "" },
    StaticEntry { name: "cookie", value: "" },
    StaticEntry { name: "date", value: "" },
    StaticEntry { name: "etag", value: "" },
    StaticEntry { name: "expect", value: "" },
    StaticEntry { name: "expires", value: "" },
    StaticEntry { name: "from", value: "" },
    StaticEntry { name: "host", value: "" },
    StaticEntry { name: "if-match", value: "" },
    StaticEntry { name: "if-modified-since", value: "" },
    StaticEntry { name: "if-none-match", value: "" },
    StaticEntry { name: "if-range", value: "" },
    StaticEntry { name: "if-unmodified-since", value: "" },
    StaticEntry { name: "last-modified", value: "" },
    StaticEntry { name: "link", value: "" },
    StaticEntry { name: "location", value: "" },
    StaticEntry { name: "max-forwards", value: "" },
    StaticEntry { name: "proxy-authenticate", value: "" },
    StaticEntry { name: "proxy-authorization", value: "" },
    StaticEntry { name: "range", value: "" },
    StaticEntry { name: "referer", value: "" },
    StaticEntry { name: "refresh", value: "" },
    StaticEntry { name: "retry-after", value: "" },
    StaticEntry { name: "server", value: "" },
    StaticEntry { name: "set-cookie", value: "" },
    StaticEntry { name: "strict-transport-security", value: "" },
    StaticEntry { name: "transfer-encoding", value: "" },
    StaticEntry { name: "user-agent", value: "" },
    StaticEntry { name: "vary", value: "" },
    StaticEntry { name: "via", value: "" },
    StaticEntry { name: "www-authenticate", value: "" },
];

/// Looks up a 1-based static table index, returning `None` if it is 0 or
/// past [`STATIC_TABLE_LEN`].
pub fn lookup(index: usize) -> Option<&'static StaticEntry> {
    index.checked_sub(1).and_then(|i| STATIC_TABLE.get(i))
}

/// Finds the lowest index whose name matches `name`, and separately
/// whether some index also matches `value` exactly -- callers prefer a
/// full name+value match (`Indexed`) over a name-only match
/// (`IncrementalIndexing`/`WithoutIndexing` with an indexed name).
pub fn find(name: &str, value: &str) -> (Option<usize>, Option<usize>) {
    let mut name_only = None;
    for (i, entry) in STATIC_TABLE.iter().enumerate() {
        if entry.name == name {
            if name_only.is_none() {
                name_only = Some(i + 1);
            }
            if entry.value == value {
                return (name_only, Some(i + 1));
            }
        }
    }
    (name_only, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_61_entries() {
        assert_eq!(STATIC_TABLE_LEN, 61);
    }

    #[test]
    fn index_1_is_authority() {
        assert_eq!(lookup(1).unwrap().name, ":authority");
    }

    #[test]
    fn index_0_and_past_end_are_none() {
        assert!(lookup(0).is_none());
        assert!(lookup(62).is_none());
    }

    #[test]
    fn find_prefers_exact_value_match() {
        let (name_idx, full_idx) = find(":method", "POST");
        assert_eq!(name_idx, Some(2));
        assert_eq!(full_idx, Some(3));
    }
}
