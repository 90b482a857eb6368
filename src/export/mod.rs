//! One-shot writers run after pagination has reached a terminal state.

use crate::engine::RunReport;
use crate::models::Record;
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::path::Path;

pub const CSV_FILE: &str = "property_basic_info.csv";
pub const URLS_FILE: &str = "property_urls.txt";
pub const JSON_FILE: &str = "properties.json";

/// CSV columns keep the portal's Spanish attribute names
#[derive(Serialize)]
struct CsvRow<'a> {
    url: &'a str,
    dormitorios: Option<u32>,
    banos: Option<u32>,
    superficie: Option<&'a str>,
    ubicacion: Option<&'a str>,
}

impl<'a> From<&'a Record> for CsvRow<'a> {
    fn from(record: &'a Record) -> Self {
        Self {
            url: &record.url,
            dormitorios: record.bedroom_count,
            banos: record.bathroom_count,
            superficie: record.surface_area.as_deref(),
            ubicacion: record.location.as_deref(),
        }
    }
}

pub fn to_csv(records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer
            .serialize(CsvRow::from(record))
            .context("Failed to serialize CSV row")?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

pub fn to_url_list(records: &[Record]) -> String {
    records.iter().map(|r| format!("{}\n", r.url)).collect()
}

pub fn to_json(report: &RunReport) -> Result<String> {
    let value = json!({
        "started_at": report.started_at,
        "finished_at": report.finished_at,
        "pages_visited": report.pages_visited,
        "rejected": report.rejected,
        "complete": report.is_done(),
        "stop_cause": report.failure().map(|f| f.to_string()),
        "records": report.records.records(),
    });
    serde_json::to_string_pretty(&value).context("Failed to serialize report")
}

async fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub async fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    write(path, to_csv(records)?).await
}

pub async fn write_urls(path: &Path, records: &[Record]) -> Result<()> {
    write(path, to_url_list(records)).await
}

pub async fn write_json(path: &Path, report: &RunReport) -> Result<()> {
    write(path, to_json(report)?).await
}
