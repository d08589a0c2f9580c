//! The observation log: one row per exposure, written as a table whose format
//! follows the output file's extension.

pub mod parse;
pub mod row;

pub use parse::load_log;
pub use row::LOG_COLUMNS;

use crate::record::ObservationRecord;
use crate::render::render_log_html;
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// csv, tsv/txt/tab, psv
    Delimited(u8),
    Json,
    Html,
}

impl LogFormat {
    pub fn from_path(path: &Path) -> Result<LogFormat> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        Ok(match ext.as_str() {
            "csv" => LogFormat::Delimited(b','),
            "tsv" | "txt" | "tab" => LogFormat::Delimited(b'\t'),
            "psv" => LogFormat::Delimited(b'|'),
            "json" => LogFormat::Json,
            "htm" | "html" => LogFormat::Html,
            _ => {
                return Err(Error::Config(format!(
                    "unknown log format for {} (expected .csv, .tsv, .txt, .tab, .psv, .json or .html)",
                    path.display()
                )));
            }
        })
    }
}

/// Write `records` to `path` in the format named by its extension.
pub fn write_log(records: &[ObservationRecord], path: &Path) -> Result<()> {
    match LogFormat::from_path(path)? {
        LogFormat::Delimited(delimiter) => {
            let mut w = csv::WriterBuilder::new()
                .delimiter(delimiter)
                .has_headers(false)
                .from_path(path)?;
            w.write_record(LOG_COLUMNS)?;
            for r in records {
                w.serialize(r)?;
            }
            w.flush()?;
        }
        LogFormat::Json => {
            let mut w = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(&mut w, records)?;
            w.flush()?;
        }
        LogFormat::Html => {
            let title = match records.first() {
                Some(r) => format!("{} observation log {}", r.instrument, r.ut_date),
                None => "Observation log".to_string(),
            };
            fs::write(path, render_log_html(records, &title)?)?;
        }
    }
    info!("wrote {} log rows to {}", records.len(), path.display());
    Ok(())
}
