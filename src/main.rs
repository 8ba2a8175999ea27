mod extract;
mod orchestrator;
mod pagination;
mod source;
mod store;
mod transport;

use std::time::{Duration, Instant};

use clap::Parser;
use tracing::info;

use crate::store::RecordStore;
use crate::transport::HttpTransport;

#[derive(Parser)]
#[command(
    name = "proxy_harvester",
    about = "Harvest proxy endpoints from public listing pages into a deduplicated file"
)]
struct Cli {
    /// Comma-separated source URL templates; prefix an entry with POST: to
    /// send its query string as a form body
    #[arg(long)]
    sources: Option<String>,

    /// Output path; {date} expands to the run's DD-MM-YYYY stamp
    #[arg(short, long, default_value = "proxies-{date}.txt")]
    output: String,

    /// Re-run the full cycle every N minutes until interrupted
    #[arg(long)]
    interval: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "8")]
    timeout: u64,

    /// Log at debug level
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let raw = cli.sources.as_deref().unwrap_or(source::DEFAULT_SOURCES);
    let sources = source::parse_sources(raw);
    if sources.is_empty() {
        anyhow::bail!("no usable sources configured");
    }

    let transport = HttpTransport::new(Duration::from_secs(cli.timeout))?;
    let store = RecordStore::new(&cli.output);
    info!(
        "harvesting {} sources into {}",
        sources.len(),
        store.path().display()
    );

    loop {
        let t0 = Instant::now();

        // Fresh cursors and a fresh accumulator every cycle
        let mut records = Vec::new();
        let stats = orchestrator::run_cycle(&transport, &sources, &mut records).await;
        let report = store.flush(&records)?;

        println!(
            "Cycle done: {} pages over {} sources ({} failed), {} candidates -> {} stored ({} duplicates dropped) in {}",
            stats.pages_fetched,
            stats.sources,
            stats.sources_failed,
            stats.candidates,
            report.total,
            report.duplicates,
            format_duration(t0.elapsed()),
        );

        match cli.interval {
            Some(minutes) => {
                info!("next cycle in {} minute(s)", minutes);
                tokio::time::sleep(Duration::from_secs(minutes * 60)).await;
            }
            None => break,
        }
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
