//! Uniform error surface shared by the runtime, the reactor backends and the
//! protocol cores.
//!
//! Everything in this crate returns [`Result<T>`] rather than relying on
//! panics or host-language exceptions. [`Error`] carries a canonical,
//! matchable [`ErrorKind`] plus (optionally) the platform error that produced
//! it, so callers can branch on portable semantics while still being able to
//! render the underlying OS diagnostic.

use std::fmt;
use std::io;

/// The crate-wide result alias. Nearly every public function in this crate
/// returns this type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Canonical, portable error kinds produced by the runtime, the reactor and
/// the HPACK codec.
///
/// Platform errors (a raw `errno` on Linux, a `GetLastError` code on
/// Windows) are wrapped rather than discarded -- see [`Error::raw_os_error`]
/// -- but are translated to one of these kinds for comparison, so that code
/// written against this crate never has to match on platform-specific
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The operation was cancelled through a [`StopToken`](crate::stop::StopToken).
    Canceled,
    /// A non-blocking operation could not complete immediately.
    WouldBlock,
    /// The remote peer aborted the connection.
    ConnectionAborted,
    /// The remote peer reset the connection.
    ConnectionReset,
    /// The remote peer refused the connection.
    ConnectionRefused,
    /// No route to the remote host exists.
    HostUnreachable,
    /// The operation exceeded its deadline.
    TimedOut,
    /// A caller-supplied argument was invalid.
    InvalidArgument,
    /// The backend does not implement this operation.
    OperationNotSupported,
    /// A read returned fewer bytes than expected before reaching EOF.
    UnexpectedEof,
    /// A write accepted zero bytes despite a non-empty buffer.
    WriteZero,
    /// A kernel-side buffer (e.g. AFD poll info) has no space left.
    NoBufferSpaceAvailable,
    /// All receivers (or all senders) of a channel have been dropped.
    ChannelBroken,
    /// A non-blocking channel receive found nothing to return.
    ChannelEmpty,
    /// A bounded channel send found no free slot.
    ChannelFull,
    /// An HPACK-specific failure; see [`ErrorKind::as_hpack`].
    Hpack(HpackErrorKind),
    /// Anything else, wrapping a raw OS error code with no closer portable
    /// match.
    Other,
}

/// HPACK decode/encode failures, matching RFC 7541's error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum HpackErrorKind {
    /// A static/dynamic table index of zero or out of the combined address
    /// space was referenced.
    InvalidIndex,
    /// An index was in range for the combined table but out of range for the
    /// addressed half.
    IndexOutOfRange,
    /// A variable-length integer would overflow the destination type.
    IntegerOverflow,
    /// The buffer ended before a representation could be fully parsed.
    NeedMoreData,
    /// A Huffman-coded string did not resolve to a legal code, or its final
    /// byte was not padding made of 1-bits.
    InvalidHuffmanEncodedData,
    /// A dynamic table size update exceeded the protocol-imposed hard cap.
    SizeOutOfLimit,
    /// `find_header_field` found no match in either table.
    FieldNotInTable,
    /// The leading bits of an octet did not match any known representation.
    UnknownFieldType,
}

impl ErrorKind {
    /// Returns the [`HpackErrorKind`] if this is [`ErrorKind::Hpack`].
    pub fn as_hpack(self) -> Option<HpackErrorKind> {
        match self {
            ErrorKind::Hpack(kind) => Some(kind),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::Canceled => "operation canceled",
            ErrorKind::WouldBlock => "operation would block",
            ErrorKind::ConnectionAborted => "connection aborted",
            ErrorKind::ConnectionReset => "connection reset",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::HostUnreachable => "host unreachable",
            ErrorKind::TimedOut => "timed out",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::OperationNotSupported => "operation not supported",
            ErrorKind::UnexpectedEof => "unexpected end of file",
            ErrorKind::WriteZero => "write returned zero bytes",
            ErrorKind::NoBufferSpaceAvailable => "no buffer space available",
            ErrorKind::ChannelBroken => "channel broken",
            ErrorKind::ChannelEmpty => "channel empty",
            ErrorKind::ChannelFull => "channel full",
            ErrorKind::Hpack(k) => return fmt::Display::fmt(k, f),
            ErrorKind::Other => "other error",
        };
        f.write_str(msg)
    }
}

impl fmt::Display for HpackErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            HpackErrorKind::InvalidIndex => "invalid HPACK index",
            HpackErrorKind::IndexOutOfRange => "HPACK index out of range",
            HpackErrorKind::IntegerOverflow => "HPACK integer overflow",
            HpackErrorKind::NeedMoreData => "HPACK block truncated",
            HpackErrorKind::InvalidHuffmanEncodedData => "invalid Huffman-encoded data",
            HpackErrorKind::SizeOutOfLimit => "HPACK dynamic table size out of limit",
            HpackErrorKind::FieldNotInTable => "header field not present in either table",
            HpackErrorKind::UnknownFieldType => "unknown HPACK header field type",
        };
        f.write_str(msg)
    }
}

/// The crate-wide error type.
///
/// An `Error` always has a portable [`ErrorKind`]; it may additionally carry
/// the platform error (an [`io::Error`]) that produced it, preserved for
/// diagnostic rendering (`{:?}`/`{}`) but never consulted for equality or
/// matching -- two `Error`s with the same `ErrorKind` compare equal
/// regardless of their platform detail, mirroring the "error category" /
/// "canonical kind" split in `spec.md` §3.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<io::Error>,
}

impl Error {
    /// Builds an error from a canonical kind with no platform detail.
    pub fn new(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    /// Builds an error from a canonical kind, preserving the platform error
    /// that produced it.
    pub fn with_source(kind: ErrorKind, source: io::Error) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    /// Translates a raw platform [`io::Error`] into a canonical `Error`,
    /// wrapping the original for diagnostics.
    pub fn from_io(err: io::Error) -> Error {
        let kind = match err.kind() {
            io::ErrorKind::WouldBlock => ErrorKind::WouldBlock,
            io::ErrorKind::ConnectionAborted => ErrorKind::ConnectionAborted,
            io::ErrorKind::ConnectionReset => ErrorKind::ConnectionReset,
            io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
            io::ErrorKind::HostUnreachable => ErrorKind::HostUnreachable,
            io::ErrorKind::TimedOut => ErrorKind::TimedOut,
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                ErrorKind::InvalidArgument
            }
            io::ErrorKind::UnexpectedEof => ErrorKind::UnexpectedEof,
            io::ErrorKind::WriteZero => ErrorKind::WriteZero,
            io::ErrorKind::Unsupported => ErrorKind::OperationNotSupported,
            io::ErrorKind::Interrupted => ErrorKind::Other,
            _ => ErrorKind::Other,
        };
        Error::with_source(kind, err)
    }

    /// The canonical kind of this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// `true` if this error is [`ErrorKind::Canceled`].
    pub fn is_canceled(&self) -> bool {
        self.kind == ErrorKind::Canceled
    }

    /// `true` if this error is [`ErrorKind::WouldBlock`].
    pub fn is_would_block(&self) -> bool {
        self.kind == ErrorKind::WouldBlock
    }

    /// The raw platform error code, if one was preserved.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.source.as_ref().and_then(io::Error::raw_os_error)
    }

    /// Convenience constructor for [`ErrorKind::Canceled`].
    pub fn canceled() -> Error {
        Error::new(ErrorKind::Canceled)
    }

    /// Convenience constructor for an HPACK failure.
    pub fn hpack(kind: HpackErrorKind) -> Error {
        Error::new(ErrorKind::Hpack(kind))
    }
}

impl PartialEq for Error {
    /// Two errors are equal if their canonical kinds match, regardless of
    /// platform detail -- this is the "translated to canonical kinds only
    /// when compared" rule from `spec.md` §7.
    fn eq(&self, other: &Error) -> bool {
        self.kind == other.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {}", self.kind, source),
            None => fmt::Display::fmt(&self.kind, f),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::from_io(err)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error::new(kind)
    }
}

impl From<HpackErrorKind> for Error {
    fn from(kind: HpackErrorKind) -> Error {
        Error::hpack(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_equality_ignores_platform_detail() {
        let a = Error::with_source(
            ErrorKind::WouldBlock,
            io::Error::from_raw_os_error(11),
        );
        let b = Error::new(ErrorKind::WouldBlock);
        assert_eq!(a, b);
        assert_ne!(a, Error::new(ErrorKind::TimedOut));
    }

    #[test]
    fn would_block_translates_from_io() {
        let err = Error::from(io::Error::from(io::ErrorKind::WouldBlock));
        assert!(err.is_would_block());
    }
}
