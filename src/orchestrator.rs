use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};

use crate::extract;
use crate::pagination::Pager;
use crate::source::SourceSpec;
use crate::transport::Transport;

/// Counters for one full pass over the source list.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub sources: usize,
    pub sources_failed: usize,
    pub pages_fetched: usize,
    pub candidates: usize,
}

// Page cursors live here, one state per source per cycle, owned by the
// loop. Nothing outlives the cycle.
struct SourceState<'a> {
    spec: &'a SourceSpec,
    pager: Pager,
}

// Decision taken after each fetch+extract round.
enum Step {
    AdvancePage,
    AdvanceSource,
}

/// Drive every source in configured order, one fetch in flight at a time,
/// appending extracted records to `records`. Sources are independent: a
/// failing source is skipped, never retried within the cycle.
pub async fn run_cycle<T: Transport>(
    transport: &T,
    sources: &[SourceSpec],
    records: &mut Vec<String>,
) -> CycleStats {
    let mut stats = CycleStats {
        sources: sources.len(),
        ..Default::default()
    };

    let pb = ProgressBar::new(sources.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} sources")
            .unwrap()
            .progress_chars("=> "),
    );

    let mut states: Vec<SourceState> = sources
        .iter()
        .map(|spec| SourceState {
            spec,
            pager: Pager::new(&spec.template),
        })
        .collect();

    for state in &mut states {
        loop {
            if state.pager.exhausted() {
                // page ceiling reached: a synthetic empty page, no transport call
                debug!("{}: pagination exhausted", state.spec.key);
                break;
            }

            let url = state.pager.current_url();
            let outcome = transport.fetch(state.spec, &url).await;
            stats.pages_fetched += 1;
            debug!(
                "{}: {} -> {:?} in {}ms",
                state.spec.key, outcome.url, outcome.status, outcome.latency_ms
            );

            if !outcome.is_ok() {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| format!("status {:?}", outcome.status));
                warn!("{}: fetch failed ({}), skipping source", state.spec.key, reason);
                stats.sources_failed += 1;
                break;
            }

            let found = match state.spec.shape {
                Some(shape) => extract::extract(shape, &outcome.body),
                None => {
                    debug!("{}: no extraction adapter, nothing to do", state.spec.key);
                    Vec::new()
                }
            };
            stats.candidates += found.len();
            records.extend(found.iter().map(|r| r.to_string()));

            let step = if state.pager.single_shot() || found.is_empty() {
                Step::AdvanceSource
            } else {
                Step::AdvancePage
            };
            match step {
                Step::AdvanceSource => break,
                Step::AdvancePage => state.pager.advance(),
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "cycle complete: {} pages across {} sources ({} failed), {} candidates",
        stats.pages_fetched, stats.sources, stats.sources_failed, stats.candidates
    );
    stats
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;

    use super::*;
    use crate::source::parse_sources;
    use crate::store::RecordStore;
    use crate::transport::FetchOutcome;

    struct StubTransport {
        bodies: HashMap<String, String>,
        log: Mutex<Vec<String>>,
    }

    impl StubTransport {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                bodies: pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
                log: Mutex::new(Vec::new()),
            }
        }

        fn fetched(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Transport for StubTransport {
        async fn fetch(&self, _spec: &SourceSpec, url: &str) -> FetchOutcome {
            self.log.lock().unwrap().push(url.to_string());
            match self.bodies.get(url) {
                Some(body) => FetchOutcome {
                    url: url.to_string(),
                    status: Some(200),
                    body: body.clone(),
                    error: None,
                    latency_ms: 0,
                },
                None => FetchOutcome {
                    url: url.to_string(),
                    status: Some(404),
                    body: String::new(),
                    error: None,
                    latency_ms: 0,
                },
            }
        }
    }

    const TWO_ROW_TABLE: &str = r#"<table class="table-striped"><tbody>
        <tr><td>51.15.9.8</td><td>3128</td></tr>
        <tr><td>88.99.10.250</td><td>80</td></tr>
    </tbody></table>"#;

    fn page_of(pairs: &[&str]) -> String {
        pairs
            .iter()
            .map(|p| format!("<script>Proxy('{}')</script>", STANDARD.encode(p)))
            .collect()
    }

    #[tokio::test]
    async fn single_shot_source_fetches_once_then_advances() {
        let sources = parse_sources("https://free-proxy-list.net/,http://rss.proxylists.net/http.xml");
        let transport = StubTransport::new(&[
            ("https://free-proxy-list.net/", TWO_ROW_TABLE),
            (
                "http://rss.proxylists.net/http.xml",
                "<rss><channel><item><title>9.9.9.9:53</title></item></channel></rss>",
            ),
        ]);

        let mut records = Vec::new();
        let stats = run_cycle(&transport, &sources, &mut records).await;

        assert_eq!(
            transport.fetched(),
            vec![
                "https://free-proxy-list.net/".to_string(),
                "http://rss.proxylists.net/http.xml".to_string(),
            ]
        );
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(records.len(), 3);
        assert!(records.contains(&"51.15.9.8:3128".to_string()));
    }

    #[tokio::test]
    async fn sequential_source_refetches_until_empty_page() {
        let sources = parse_sources("https://proxy-list.org/english/index.php?p={page}");
        let page1 = page_of(&[
            "10.0.0.1:80",
            "10.0.0.2:80",
            "10.0.0.3:80",
            "10.0.0.4:80",
            "10.0.0.5:80",
        ]);
        let transport = StubTransport::new(&[
            ("https://proxy-list.org/english/index.php?p=1", page1.as_str()),
            ("https://proxy-list.org/english/index.php?p=2", "<html></html>"),
        ]);

        let mut records = Vec::new();
        let stats = run_cycle(&transport, &sources, &mut records).await;

        // exactly one refetch (page 2), then the source is done
        assert_eq!(transport.fetched().len(), 2);
        assert_eq!(stats.pages_fetched, 2);
        assert_eq!(records.len(), 5);

        // the harvested set deduplicates against the file's prior contents
        let dir = tempfile::tempdir().unwrap();
        let store = RecordStore::new(dir.path().join("out.txt").to_str().unwrap());
        std::fs::write(store.path(), "10.0.0.1:80\n10.0.0.2:80\n").unwrap();
        let report = store.flush(&records).unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.duplicates, 2);
    }

    #[tokio::test]
    async fn failed_source_is_skipped_not_fatal() {
        // first source 404s, second still runs
        let sources = parse_sources("https://free-proxy-list.net/,http://rss.proxylists.net/http.xml");
        let transport = StubTransport::new(&[(
            "http://rss.proxylists.net/http.xml",
            "<rss><channel><item><title>9.9.9.9:53</title></item></channel></rss>",
        )]);

        let mut records = Vec::new();
        let stats = run_cycle(&transport, &sources, &mut records).await;

        assert_eq!(stats.sources_failed, 1);
        assert_eq!(transport.fetched().len(), 2);
        assert_eq!(records, vec!["9.9.9.9:53".to_string()]);
    }

    #[tokio::test]
    async fn bounded_source_never_fetches_past_its_ceiling() {
        let template =
            "http://www.proxyhttp.net/free-list/anonymous-server-hide-ip-address/{page:1/5}";
        let sources = parse_sources(template);
        let row = |ip: &str| {
            format!(
                "<table><tbody><tr><td>{}</td><td><script>prx('1F90')</script></td></tr></tbody></table>",
                ip
            )
        };
        let pages: Vec<(String, String)> = (1..=5)
            .map(|n| {
                (
                    format!(
                        "http://www.proxyhttp.net/free-list/anonymous-server-hide-ip-address/{}",
                        n
                    ),
                    row(&format!("10.1.1.{}", n)),
                )
            })
            .collect();
        let pages_ref: Vec<(&str, &str)> = pages
            .iter()
            .map(|(u, b)| (u.as_str(), b.as_str()))
            .collect();
        let transport = StubTransport::new(&pages_ref);

        let mut records = Vec::new();
        let stats = run_cycle(&transport, &sources, &mut records).await;

        // every page up to the ceiling, none beyond, no sixth URL ever asked for
        assert_eq!(stats.pages_fetched, 5);
        assert_eq!(records.len(), 5);
        let fetched = transport.fetched();
        assert!(fetched.last().unwrap().ends_with("/5"));
        assert!(!fetched.iter().any(|u| u.ends_with("/6")));
    }

    #[tokio::test]
    async fn unknown_source_fetches_but_extracts_nothing() {
        let sources = parse_sources("https://example.org/proxies.html");
        let transport =
            StubTransport::new(&[("https://example.org/proxies.html", TWO_ROW_TABLE)]);

        let mut records = Vec::new();
        let stats = run_cycle(&transport, &sources, &mut records).await;

        assert_eq!(stats.pages_fetched, 1);
        assert_eq!(stats.candidates, 0);
        assert!(records.is_empty());
    }
}
