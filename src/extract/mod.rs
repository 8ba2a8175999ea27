pub mod feed;
pub mod obfuscated;
pub mod table;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

// Strict dotted-quad: each octet 0-255, no leading zeros
static IPV4_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)(\.(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)){3}$")
        .unwrap()
});

/// One harvested endpoint. Identity (and the stored line format) is the
/// literal `address:port` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRecord {
    pub address: String,
    pub port: String,
}

impl fmt::Display for ProxyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// The document shape one source publishes, resolved once when the source
/// list is loaded. Every shape maps to exactly one parsing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// address and port in fixed columns of an ordinary table
    PlainTable {
        row_sel: &'static str,
        ip_col: usize,
        port_col: usize,
    },
    /// port looked up from a CSS class on the address cell
    ClassPortTable,
    /// address rebuilt from style-gated spans; rows failing validation are dropped
    HiddenSpans,
    /// Proxy('<base64>') payload decoding to "address:port"
    Base64Call,
    /// str_rot13("...") payload: rot13 the letters, then base64, to get the address
    Rot13Base64,
    /// port published as a hex token inside a call-like wrapper
    HexPort,
    /// JSON array of endpoint objects, HTTP entries only
    JsonFeed,
    /// RSS item list with "address:port" titles
    RssFeed,
}

// Known source signatures, matched as substrings of the URL template.
const SIGNATURES: &[(&str, Shape)] = &[
    (
        "free-proxy-list.net",
        Shape::PlainTable {
            row_sel: "table.table-striped tbody tr",
            ip_col: 0,
            port_col: 1,
        },
    ),
    ("premproxy.com", Shape::ClassPortTable),
    ("hidemyass.com", Shape::HiddenSpans),
    ("proxy-list.org", Shape::Base64Call),
    ("cool-proxy.net", Shape::Rot13Base64),
    (
        "proxydb.net",
        Shape::PlainTable {
            row_sel: "div.table-responsive table tbody tr",
            ip_col: 0,
            port_col: 1,
        },
    ),
    ("proxyhttp.net", Shape::HexPort),
    ("hidester.com", Shape::JsonFeed),
    ("proxylists.net", Shape::RssFeed),
];

impl Shape {
    /// Match a URL template against the known source signatures.
    pub fn resolve(url: &str) -> Option<Shape> {
        SIGNATURES
            .iter()
            .find(|(sig, _)| url.contains(sig))
            .map(|(_, shape)| *shape)
    }
}

/// Run the adapter for `shape` over a fetched document body.
pub fn extract(shape: Shape, body: &str) -> Vec<ProxyRecord> {
    match shape {
        Shape::PlainTable {
            row_sel,
            ip_col,
            port_col,
        } => table::plain(body, row_sel, ip_col, port_col),
        Shape::ClassPortTable => table::class_port(body),
        Shape::HexPort => table::hex_port(body),
        Shape::HiddenSpans => obfuscated::hidden_spans(body),
        Shape::Base64Call => obfuscated::base64_call(body),
        Shape::Rot13Base64 => obfuscated::rot13_base64(body),
        Shape::JsonFeed => feed::json(body),
        Shape::RssFeed => feed::rss(body),
    }
}

pub fn is_valid_ipv4(address: &str) -> bool {
    IPV4_RE.is_match(address)
}

/// Log a validation warning for a malformed address. Whether the record is
/// then dropped or still emitted is the calling adapter's policy.
pub(crate) fn note_invalid(origin: &str, address: &str) {
    warn!("{}: address {:?} is not a valid IPv4", origin, address);
}
