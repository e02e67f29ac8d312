use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::models::ReportEntry;

const HEADER: &str = "hostname,deployment_id,status";

/// Destination for the ordered records of one rollout run
#[async_trait]
pub trait ReportSink: Send {
    async fn write_entries(&mut self, entries: &[ReportEntry]) -> Result<()>;
}

/// Collects entries in memory
#[async_trait]
impl ReportSink for Vec<ReportEntry> {
    async fn write_entries(&mut self, entries: &[ReportEntry]) -> Result<()> {
        self.extend_from_slice(entries);
        Ok(())
    }
}

/// Writes a comma delimited report with a header row, one record per device
pub struct CsvReportSink {
    path: PathBuf,
}

impl CsvReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReportSink for CsvReportSink {
    async fn write_entries(&mut self, entries: &[ReportEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, render(entries)).await?;
        tracing::info!("Wrote {} report records to {}", entries.len(), self.path.display());
        Ok(())
    }
}

pub fn render(entries: &[ReportEntry]) -> String {
    let mut out = String::with_capacity(HEADER.len() + 1 + entries.len() * 48);
    out.push_str(HEADER);
    out.push('\n');
    for entry in entries {
        out.push_str(&escape(&entry.hostname));
        out.push(',');
        out.push_str(&escape(entry.deployment_id.as_deref().unwrap_or_default()));
        out.push(',');
        out.push_str(entry.status.as_str());
        out.push('\n');
    }
    out
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
