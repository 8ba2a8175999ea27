use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// Where the harvested set lands. A `{date}` token in the template becomes
/// the run's DD-MM-YYYY stamp at construction time.
pub struct RecordStore {
    path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
pub struct FlushReport {
    pub total: usize,
    pub duplicates: usize,
}

impl RecordStore {
    pub fn new(template: &str) -> Self {
        let stamp = chrono::Local::now().format("%d-%m-%Y").to_string();
        Self {
            path: PathBuf::from(template.replace("{date}", &stamp)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge `new` with whatever the file already holds and rewrite it
    /// whole. New records keep their positions, prior lines follow, and the
    /// first occurrence of a key wins. Anything already on disk is trusted
    /// as-is and never re-validated.
    ///
    /// An unreadable or unwritable path is fatal for the run.
    pub fn flush(&self, new: &[String]) -> Result<FlushReport> {
        let prior = if self.path.exists() {
            fs::read_to_string(&self.path)
                .with_context(|| format!("reading {}", self.path.display()))?
        } else {
            String::new()
        };

        let mut merged: Vec<&str> = new.iter().map(String::as_str).collect();
        merged.extend(prior.lines().filter(|line| !line.trim().is_empty()));

        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for record in &merged {
            if seen.insert(*record) {
                kept.push(*record);
            }
        }
        let duplicates = merged.len() - kept.len();

        let contents = if kept.is_empty() {
            String::new()
        } else {
            kept.join("\n") + "\n"
        };
        fs::write(&self.path, contents)
            .with_context(|| format!("writing {}", self.path.display()))?;

        info!(
            "stored {} records at {} ({} duplicates dropped)",
            kept.len(),
            self.path.display(),
            duplicates
        );
        Ok(FlushReport {
            total: kept.len(),
            duplicates,
        })
    }
}
