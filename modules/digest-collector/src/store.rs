//! Result sinks: dated files under `data/news/`, or JSON on stdout.

use std::collections::HashSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use digest_common::{canonical_post_url, DigestError, QuoteMapping, ResultSet};

use crate::traits::ResultSink;

const DATA_SUBDIR: &str = "data/news";

#[derive(Serialize)]
struct QuotesFile<'a> {
    generated_at: String,
    window_hours: u32,
    mapping: &'a QuoteMapping,
}

/// Writes `YYYY-MM-DD.txt` (ranked URLs, one per line) and
/// `YYYY-MM-DD.quotes.json` per run, dated in the configured local offset.
/// Re-running on the same day replaces that day's files.
pub struct DatedFileSink {
    data_dir: PathBuf,
    offset: FixedOffset,
}

impl DatedFileSink {
    pub fn new(output_dir: impl AsRef<Path>, offset: FixedOffset) -> Self {
        Self {
            data_dir: output_dir.as_ref().join(DATA_SUBDIR),
            offset,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn date_label(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.offset).format("%Y-%m-%d").to_string()
    }

    pub fn urls_path(&self, date: &str) -> PathBuf {
        self.data_dir.join(format!("{date}.txt"))
    }

    pub fn quotes_path(&self, date: &str) -> PathBuf {
        self.data_dir.join(format!("{date}.quotes.json"))
    }

    /// URLs published on any day other than the one `run_time` falls on.
    pub fn load_published(&self, run_time: DateTime<Utc>) -> Result<HashSet<String>> {
        let today = self.date_label(run_time);
        let mut published = HashSet::new();

        let entries = match fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(published),
            Err(e) => return Err(e).with_context(|| format!("reading {}", self.data_dir.display())),
        };

        let mut days = 0;
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if stem == today || NaiveDate::parse_from_str(stem, "%Y-%m-%d").is_err() {
                continue;
            }

            let content = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            published.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| canonical_post_url(line).unwrap_or_else(|| line.to_string())),
            );
            days += 1;
        }

        info!(days, urls = published.len(), "Loaded published history");
        Ok(published)
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<(), DigestError> {
        let storage = |e: std::io::Error| DigestError::Storage(format!("{}: {e}", path.display()));

        let mut tmp = NamedTempFile::new_in(&self.data_dir).map_err(storage)?;
        tmp.write_all(content.as_bytes()).map_err(storage)?;
        if !content.ends_with('\n') {
            tmp.write_all(b"\n").map_err(storage)?;
        }
        tmp.persist(path).map_err(|e| storage(e.error))?;
        debug!(path = %path.display(), bytes = content.len(), "Wrote file");
        Ok(())
    }
}

#[async_trait]
impl ResultSink for DatedFileSink {
    async fn publish(&self, result: &ResultSet) -> Result<()> {
        if result.originals.is_empty() {
            warn!("No originals ranked, skipping file output");
            return Ok(());
        }

        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;
        let date = self.date_label(result.generated_at);

        let urls: Vec<&str> = result.urls().collect();
        let urls_path = self.urls_path(&date);
        self.write_atomic(&urls_path, &urls.join("\n"))?;
        info!(count = urls.len(), path = %urls_path.display(), "Saved ranked URLs");

        let quotes = QuotesFile {
            generated_at: result.generated_at.with_timezone(&self.offset).to_rfc3339(),
            window_hours: result.window_hours,
            mapping: &result.quotes,
        };
        let quotes_path = self.quotes_path(&date);
        self.write_atomic(&quotes_path, &serde_json::to_string_pretty(&quotes)?)?;
        info!(
            entries = result.quotes.len(),
            quotes = result.quotes.total_quotes(),
            path = %quotes_path.display(),
            "Saved quotes mapping"
        );

        Ok(())
    }
}

/// Prints the whole result as JSON.
pub struct StdoutSink;

#[async_trait]
impl ResultSink for StdoutSink {
    async fn publish(&self, result: &ResultSet) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(result)?);
        Ok(())
    }
}
