use serde::Deserialize;
use tracing::{debug, warn};

use super::{is_valid_ipv4, note_invalid, ProxyRecord};

#[derive(Debug, Deserialize)]
struct FeedEntry {
    #[serde(alias = "IP", alias = "ip")]
    address: String,
    #[serde(alias = "PORT", alias = "port")]
    port: serde_json::Value,
    #[serde(rename = "type", default)]
    kind: String,
}

/// JSON array of endpoint objects. Only entries whose `type` is "HTTP" are
/// kept; addresses and ports are taken as published.
pub(super) fn json(body: &str) -> Vec<ProxyRecord> {
    let entries: Vec<FeedEntry> = match serde_json::from_str(body) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("feed body is not a JSON endpoint array: {}", e);
            return Vec::new();
        }
    };

    entries
        .into_iter()
        .filter(|e| e.kind == "HTTP")
        .filter_map(|e| {
            let port = match &e.port {
                serde_json::Value::Number(n) => n.to_string(),
                serde_json::Value::String(s) => s.clone(),
                other => {
                    debug!("unusable port value {:?} for {}", other, e.address);
                    return None;
                }
            };
            if !is_valid_ipv4(&e.address) {
                note_invalid("json-feed", &e.address);
            }
            Some(ProxyRecord {
                address: e.address,
                port,
            })
        })
        .collect()
}

/// RSS-style item list: each `<item><title>` holds "address:port"; the split
/// happens on the first colon.
pub(super) fn rss(body: &str) -> Vec<ProxyRecord> {
    let mut reader = quick_xml::Reader::from_str(body);
    let mut records = Vec::new();
    let mut in_item = false;
    let mut in_title = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => match e.name().as_ref() {
                b"item" => in_item = true,
                b"title" if in_item => in_title = true,
                _ => {}
            },
            Ok(quick_xml::events::Event::Text(e)) if in_title => {
                if let Ok(title) = e.unescape() {
                    push_title(title.trim(), &mut records);
                }
            }
            Ok(quick_xml::events::Event::End(e)) => match e.name().as_ref() {
                b"title" => in_title = false,
                b"item" => in_item = false,
                _ => {}
            },
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => {
                warn!("feed XML unreadable: {}", e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }
    records
}

fn push_title(title: &str, records: &mut Vec<ProxyRecord>) {
    let Some((address, port)) = title.split_once(':') else {
        debug!("item title {:?} has no port separator", title);
        return;
    };
    if !is_valid_ipv4(address) {
        note_invalid("rss-feed", address);
    }
    records.push(ProxyRecord {
        address: address.to_string(),
        port: port.to_string(),
    });
}
