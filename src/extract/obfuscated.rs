use std::collections::HashMap;
use std::sync::LazyLock;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;

use super::{is_valid_ipv4, note_invalid, ProxyRecord};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static STYLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("style").unwrap());

static STYLE_RULE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\.([A-Za-z0-9_-]+)\s*\{\s*display\s*:\s*(inline|none)").unwrap()
});
static B64_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_]\w*\('([A-Za-z0-9+/=]+)'\)").unwrap());
static ROT13_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"str_rot13\(["']([^"']+)["']\)"#).unwrap());

/// Addresses spread across spans whose visibility is decided by a `<style>`
/// block. Decoy digits are hidden with `display:none`; the real address is
/// the concatenation of unclassed text, visible-classed spans and spans
/// whose class name is purely numeric, in document order.
///
/// This is the one source where rows failing address validation are
/// dropped instead of passed through.
pub(super) fn hidden_spans(body: &str) -> Vec<ProxyRecord> {
    let doc = Html::parse_document(body);
    let visible = visibility_map(&doc);
    let mut out = Vec::new();

    for row in doc.select(&TR) {
        let mut cells = row.select(&TD);
        let (Some(addr_cell), Some(port_cell)) = (cells.next(), cells.next()) else {
            continue;
        };
        let address = reconstruct(addr_cell, &visible);
        let port = port_cell.text().collect::<String>().trim().to_string();
        if address.is_empty() || port.is_empty() {
            continue;
        }
        if !is_valid_ipv4(&address) {
            note_invalid("hidden-spans", &address);
            continue;
        }
        out.push(ProxyRecord { address, port });
    }
    out
}

// class -> visible, from every <style> block in the document
fn visibility_map(doc: &Html) -> HashMap<String, bool> {
    let mut map = HashMap::new();
    for style in doc.select(&STYLE) {
        let css: String = style.text().collect();
        for caps in STYLE_RULE_RE.captures_iter(&css) {
            map.insert(caps[1].to_string(), &caps[2] == "inline");
        }
    }
    map
}

// Walk the cell's direct children in order, keeping only visible fragments.
fn reconstruct(cell: ElementRef, visible: &HashMap<String, bool>) -> String {
    let mut address = String::new();
    for node in cell.children() {
        match node.value() {
            Node::Text(text) => address.push_str(text.trim()),
            Node::Element(el) if el.name() == "span" => {
                let keep = match el.attr("class") {
                    None => true,
                    Some(classes) => {
                        let class = classes.split_whitespace().next().unwrap_or("");
                        class.chars().all(|c| c.is_ascii_digit())
                            || visible.get(class).copied().unwrap_or(false)
                    }
                };
                if keep {
                    if let Some(span) = ElementRef::wrap(node) {
                        let text: String = span.text().collect();
                        address.push_str(text.trim());
                    }
                }
            }
            _ => {}
        }
    }
    address
}

/// `Proxy('<base64>')` tokens whose payload decodes to "address:port".
pub(super) fn base64_call(body: &str) -> Vec<ProxyRecord> {
    let mut out = Vec::new();
    for caps in B64_CALL_RE.captures_iter(body) {
        let Ok(bytes) = STANDARD.decode(&caps[1]) else {
            debug!("payload {:?} is not base64", &caps[1]);
            continue;
        };
        let Ok(text) = String::from_utf8(bytes) else {
            continue;
        };
        let Some((address, port)) = text.split_once(':') else {
            debug!("decoded payload {:?} has no port separator", text);
            continue;
        };
        if !is_valid_ipv4(address) {
            note_invalid("base64-call", address);
        }
        out.push(ProxyRecord {
            address: address.to_string(),
            port: port.to_string(),
        });
    }
    out
}

/// Rows whose address payload is rot13-transformed base64; the port sits in
/// plain text in the next column. Decoding runs rot13 first, base64 second,
/// exactly reversing the publisher's base64-then-rot13 encoding.
pub(super) fn rot13_base64(body: &str) -> Vec<ProxyRecord> {
    let doc = Html::parse_document(body);
    let mut out = Vec::new();

    for row in doc.select(&TR) {
        let html = row.html();
        let Some(caps) = ROT13_CALL_RE.captures(&html) else {
            continue;
        };
        let Ok(bytes) = STANDARD.decode(rot13(&caps[1]).as_bytes()) else {
            debug!("rot13 payload {:?} did not decode", &caps[1]);
            continue;
        };
        let Ok(address) = String::from_utf8(bytes) else {
            continue;
        };
        let port = row
            .select(&TD)
            .nth(1)
            .map(|c| c.text().collect::<String>().trim().to_string())
            .filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
        let Some(port) = port else {
            debug!("no plain port column next to {}", address);
            continue;
        };
        if !is_valid_ipv4(&address) {
            note_invalid("rot13-base64", &address);
        }
        out.push(ProxyRecord { address, port });
    }
    out
}

// ASCII letters rotated 13 places; digits and separators untouched.
fn rot13(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'a'..='z' => (((c as u8 - b'a' + 13) % 26) + b'a') as char,
            'A'..='Z' => (((c as u8 - b'A' + 13) % 26) + b'A') as char,
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_spans_reconstruction() {
        // .a visible, .b hidden, numeric class always visible, unclassed verbatim
        let body = r#"<html><head><style>
            .a{display:inline}
            .b{display:none}
        </style></head><body><table><tbody>
        <tr><td>19<span class="a">2</span><span class="b">9</span>.<span>168</span>.<span class="77">1</span><span class="b">0</span>.1</td><td>8080</td></tr>
        </tbody></table></body></html>"#;
        let records = hidden_spans(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "192.168.1.1:8080");
    }

    #[test]
    fn hidden_spans_drops_invalid_rows() {
        // decoys left visible produce a 5-octet monster; this source discards it
        let body = r#"<html><head><style>.v{display:inline}</style></head>
        <body><table><tbody>
        <tr><td>1.2<span class="v">.3.4.5</span>.6</td><td>80</td></tr>
        <tr><td>10.0<span class="v">.0</span>.1</td><td>3128</td></tr>
        </tbody></table></body></html>"#;
        let records = hidden_spans(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "10.0.0.1:3128");
    }

    #[test]
    fn hidden_spans_unknown_class_is_hidden() {
        let body = r#"<html><head><style>.v{display:inline}</style></head>
        <body><table><tbody>
        <tr><td>10.0<span class="nope">9</span><span class="v">.0</span>.1</td><td>80</td></tr>
        </tbody></table></body></html>"#;
        let records = hidden_spans(body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].address, "10.0.0.1");
    }

    #[test]
    fn base64_call_decodes_pairs() {
        let payload = STANDARD.encode("61.187.1.2:8080");
        let body = format!("<ul><li><script>Proxy('{}')</script></li></ul>", payload);
        let records = base64_call(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "61.187.1.2:8080");
    }

    #[test]
    fn base64_call_skips_junk_payloads() {
        let body = "<script>Proxy('notbase64!!!')</script><script>other('YWJj')</script>";
        // 'YWJj' decodes to "abc" which has no port separator
        assert!(base64_call(body).is_empty());
    }

    #[test]
    fn rot13_base64_round_trip() {
        // encode the way the publisher does: base64 first, then rot13
        let encoded = rot13(&STANDARD.encode("144.12.5.9"));
        let body = format!(
            r#"<table><tbody><tr>
            <td><script>document.write(Base64.decode(str_rot13("{}")))</script></td>
            <td>8118</td>
            </tr></tbody></table>"#,
            encoded
        );
        let records = rot13_base64(&body);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].to_string(), "144.12.5.9:8118");
    }

    #[test]
    fn rot13_leaves_digits_alone() {
        assert_eq!(rot13("vcn"), "ira");
        assert_eq!(rot13("ira"), "vcn");
        assert_eq!(rot13("abc123=/"), "nop123=/");
    }

    #[test]
    fn rot13_base64_needs_a_digit_port() {
        let encoded = rot13(&STANDARD.encode("144.12.5.9"));
        let body = format!(
            r#"<table><tbody><tr><td>str_rot13("{}")</td><td>n/a</td></tr></tbody></table>"#,
            encoded
        );
        assert!(rot13_base64(&body).is_empty());
    }
}
