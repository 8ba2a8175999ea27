use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::extract::Shape;

static HOST_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://(?:www\.)?([^/]+)").unwrap());

/// Built-in source catalog; overridable with --sources.
pub const DEFAULT_SOURCES: &str = "https://free-proxy-list.net/,\
    https://premproxy.com/list/ip-port/{page:01}.htm,\
    https://proxylist.hidemyass.com/{page},\
    https://proxy-list.org/english/index.php?p={page},\
    https://www.cool-proxy.net/proxies/http_proxy_list/page:{page},\
    http://proxydb.net/?protocol=http&offset={page:0-15},\
    http://www.proxyhttp.net/free-list/anonymous-server-hide-ip-address/{page:1/5},\
    https://hidester.com/proxydata/php/data.php?mykey=csv,\
    http://rss.proxylists.net/http.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// One configured source, immutable for the whole run. The extraction shape
/// is resolved here, once, never re-matched per fetch.
#[derive(Debug, Clone)]
pub struct SourceSpec {
    pub key: String,
    pub template: String,
    pub method: Method,
    /// Static form body for POST sources, parsed from the template's query
    /// string at load time.
    pub form: Vec<(String, String)>,
    pub shape: Option<Shape>,
}

/// Parse the comma-separated source list. Unknown sources are kept so a
/// typo shows up in the logs instead of silently vanishing; they fetch but
/// extract nothing.
pub fn parse_sources(raw: &str) -> Vec<SourceSpec> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_one)
        .collect()
}

fn parse_one(entry: &str) -> SourceSpec {
    let (method, template) = match entry.strip_prefix("POST:") {
        Some(rest) => (Method::Post, rest),
        None => (Method::Get, entry),
    };
    let key = HOST_RE
        .captures(template)
        .map(|c| c[1].to_string())
        .unwrap_or_else(|| template.to_string());
    let form = match method {
        Method::Post => parse_query(template),
        Method::Get => Vec::new(),
    };
    let shape = Shape::resolve(template);
    if shape.is_none() {
        warn!("{}: no extraction adapter registered for this source", key);
    }
    SourceSpec {
        key,
        template: template.to_string(),
        method,
        form,
        shape,
    }
}

fn parse_query(template: &str) -> Vec<(String, String)> {
    let Some((_, query)) = template.split_once('?') else {
        return Vec::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}
