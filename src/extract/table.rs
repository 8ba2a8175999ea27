use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use super::{is_valid_ipv4, note_invalid, ProxyRecord};

static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static PORT_SPAN: LazyLock<Selector> = LazyLock::new(|| Selector::parse("span[class]").unwrap());
static HEX_CALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+\('([0-9A-Fa-f]{1,4})'\)").unwrap());

// Fixed class -> port dictionary for sources that publish the port only as
// a CSS class on the address cell.
const PORT_CLASSES: &[(&str, &str)] = &[
    ("d60", "80"),
    ("e1a", "8080"),
    ("q2f", "3128"),
    ("x7b", "8118"),
    ("k4m", "1080"),
    ("s9c", "8000"),
];

/// Ordinary listing table: address and port are plain text in fixed columns.
pub(super) fn plain(body: &str, row_sel: &str, ip_col: usize, port_col: usize) -> Vec<ProxyRecord> {
    let Ok(rows) = Selector::parse(row_sel) else {
        return Vec::new();
    };
    let doc = Html::parse_document(body);
    let mut out = Vec::new();

    for row in doc.select(&rows) {
        let cells: Vec<String> = row.select(&TD).map(cell_text).collect();
        let (Some(address), Some(port)) = (cells.get(ip_col), cells.get(port_col)) else {
            debug!("table row with {} cells, expected address/port columns", cells.len());
            continue;
        };
        if address.is_empty() || port.is_empty() {
            continue;
        }
        if !is_valid_ipv4(address) {
            note_invalid("table", address);
        }
        out.push(ProxyRecord {
            address: address.clone(),
            port: port.clone(),
        });
    }
    out
}

/// Table whose port is encoded as a CSS class on the address cell. A row
/// whose class is missing from the dictionary yields no record.
pub(super) fn class_port(body: &str) -> Vec<ProxyRecord> {
    let doc = Html::parse_document(body);
    let mut out = Vec::new();

    for row in doc.select(&TR) {
        let Some(cell) = row.select(&TD).next() else {
            continue;
        };
        let address = cell_text(cell);
        if address.is_empty() {
            continue;
        }
        let port = cell
            .select(&PORT_SPAN)
            .next()
            .and_then(|span| span.value().attr("class"))
            .and_then(|classes| classes.split_whitespace().find_map(lookup_port));
        let Some(port) = port else {
            debug!("no port class recognized for {}", address);
            continue;
        };
        if !is_valid_ipv4(&address) {
            note_invalid("class-port table", &address);
        }
        out.push(ProxyRecord {
            address,
            port: port.to_string(),
        });
    }
    out
}

/// Table whose port sits as a hex token inside a call-like wrapper in its
/// own cell, e.g. `prx('1F90')` for 8080.
pub(super) fn hex_port(body: &str) -> Vec<ProxyRecord> {
    let doc = Html::parse_document(body);
    let mut out = Vec::new();

    for row in doc.select(&TR) {
        let mut cells = row.select(&TD);
        let (Some(addr_cell), Some(port_cell)) = (cells.next(), cells.next()) else {
            continue;
        };
        let address = cell_text(addr_cell);
        if address.is_empty() {
            continue;
        }
        let port = HEX_CALL_RE
            .captures(&port_cell.inner_html())
            .and_then(|c| u32::from_str_radix(&c[1], 16).ok());
        let Some(port) = port else {
            debug!("no hex port token for {}", address);
            continue;
        };
        if !is_valid_ipv4(&address) {
            note_invalid("hex-port table", &address);
        }
        out.push(ProxyRecord {
            address,
            port: port.to_string(),
        });
    }
    out
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn lookup_port(class: &str) -> Option<&'static str> {
    PORT_CLASSES
        .iter()
        .find(|(name, _)| *name == class)
        .map(|(_, port)| *port)
}
