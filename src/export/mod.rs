use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub mod csv_exporter;
pub mod json_exporter;
pub mod xlsx_exporter;
pub mod xml_exporter;

pub use csv_exporter::to_csv;
pub use json_exporter::to_json;
pub use xlsx_exporter::to_tsv;
pub use xml_exporter::to_xml;

use crate::config::ExportConfig;
use crate::error::{BurpError, BurpResult};
use crate::record::{value_to_text, Record};

/// Root element of XML exports
pub const XML_ROOT: &str = "scraped_data";

/// Export format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    /// Tab-separated text saved as `.xlsx`
    Excel,
    Xml,
    Json,
}

impl std::str::FromStr for ExportFormat {
    type Err = BurpError;

    fn from_str(s: &str) -> BurpResult<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "excel" | "xlsx" | "tsv" => Ok(ExportFormat::Excel),
            "xml" => Ok(ExportFormat::Xml),
            "json" => Ok(ExportFormat::Json),
            _ => Err(BurpError::UnsupportedFormat { format: s.to_string() }),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Excel => write!(f, "excel"),
            ExportFormat::Xml => write!(f, "xml"),
            ExportFormat::Json => write!(f, "json"),
        }
    }
}

impl ExportFormat {
    pub fn all() -> [ExportFormat; 4] {
        [ExportFormat::Csv, ExportFormat::Excel, ExportFormat::Xml, ExportFormat::Json]
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Excel => "xlsx",
            ExportFormat::Xml => "xml",
            ExportFormat::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Excel => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Xml => "application/xml",
            ExportFormat::Json => "application/json",
        }
    }
}

/// Which rows of a table an export covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportScope {
    All(usize),
    Selected(usize),
}

/// Export statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStats {
    pub format: ExportFormat,
    pub file_path: PathBuf,
    pub mime_type: String,
    pub record_count: usize,
    pub file_size_bytes: u64,
    pub export_duration_ms: u64,
    pub compressed: bool,
}

/// Renders results in the export formats and writes them to the output
/// directory
pub struct ExportManager {
    config: ExportConfig,
}

impl ExportManager {
    /// Create new export manager
    pub fn new(config: &ExportConfig) -> BurpResult<Self> {
        std::fs::create_dir_all(&config.output_directory)?;

        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn output_directory(&self) -> &Path {
        &self.config.output_directory
    }

    /// Render `data` in `format`.
    ///
    /// The tabular formats and XML use the `products` array when `data`
    /// carries one and `data` itself otherwise; JSON always serialises the
    /// whole value.
    pub fn render(data: &Value, format: ExportFormat) -> BurpResult<String> {
        let source = tabular_source(data);
        match format {
            ExportFormat::Csv => to_csv(&records_of(source)),
            ExportFormat::Excel => Ok(to_tsv(&records_of(source))),
            ExportFormat::Xml => Ok(to_xml(source, XML_ROOT)),
            ExportFormat::Json => to_json(data),
        }
    }

    /// Render and save `data`. Without `base_name` the file is called
    /// `burp_ai_export_<timestamp>`.
    pub async fn export(
        &self,
        data: &Value,
        format: ExportFormat,
        base_name: Option<&str>,
    ) -> BurpResult<ExportStats> {
        let start_time = std::time::Instant::now();
        let record_count = match tabular_source(data) {
            Value::Array(items) => items.len(),
            _ => 1,
        };

        let content = Self::render(data, format)?;
        let base_name = base_name
            .map(str::to_string)
            .unwrap_or_else(|| format!("burp_ai_export_{}", filename_timestamp()));
        let filename = format!("{}.{}", base_name, format.extension());

        info!("Exporting {} records as {} to {}", record_count, format, filename);

        let file_path = self.save(&content, &filename, format.mime_type()).await?;
        let file_size_bytes = tokio::fs::metadata(&file_path).await?.len();

        let stats = ExportStats {
            format,
            file_path,
            mime_type: format.mime_type().to_string(),
            record_count,
            file_size_bytes,
            export_duration_ms: start_time.elapsed().as_millis() as u64,
            compressed: self.config.compression_enabled,
        };

        info!(
            "Export completed: {} records in {}ms, file size: {} bytes",
            stats.record_count, stats.export_duration_ms, stats.file_size_bytes
        );

        Ok(stats)
    }

    /// Export table rows. The records are wrapped as `{products: [...]}` so
    /// every format sees the same shape as a fresh result.
    pub async fn export_records(
        &self,
        records: Vec<Record>,
        format: ExportFormat,
        base_name: &str,
    ) -> BurpResult<ExportStats> {
        if records.is_empty() {
            return Err(BurpError::NothingToExport {
                reason: "no rows to export".to_string(),
            });
        }

        let rows = records.into_iter().map(Value::Object).collect();
        let mut wrapper = serde_json::Map::new();
        wrapper.insert("products".to_string(), Value::Array(rows));

        self.export(&Value::Object(wrapper), format, Some(base_name))
            .await
    }

    /// Write `content` to `filename` in the output directory.
    ///
    /// The bytes go to a temporary file in the same directory which is then
    /// renamed into place, so readers never see a partial export. With
    /// compression enabled the file is gzipped and gets a `.gz` suffix.
    pub async fn save(&self, content: &str, filename: &str, mime_type: &str) -> BurpResult<PathBuf> {
        let filename = sanitize_filename(filename);
        if filename.is_empty() {
            return Err(BurpError::export("empty filename"));
        }

        let (bytes, filename) = if self.config.compression_enabled {
            (compress_data(content.as_bytes())?, format!("{}.gz", filename))
        } else {
            (content.as_bytes().to_vec(), filename)
        };

        let dir = &self.config.output_directory;
        std::fs::create_dir_all(dir)?;
        let target = dir.join(&filename);

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.flush()?;
        temp.persist(&target)
            .map_err(|e| BurpError::export(format!("failed to write {}: {}", target.display(), e)))?;

        debug!("Saved {} ({}, {} bytes)", target.display(), mime_type, bytes.len());
        Ok(target)
    }
}

/// Filename for a table export: `<prefix>_<all|selected>_<count>_<timestamp>`
pub fn export_filename(prefix: &str, scope: ExportScope) -> String {
    let prefix = slug(prefix);
    let (kind, count) = match scope {
        ExportScope::All(n) => ("all", n),
        ExportScope::Selected(n) => ("selected", n),
    };
    format!("{}_{}_{}_{}", prefix, kind, count, filename_timestamp())
}

/// UTC timestamp as `YYYY-MM-DDTHH-MM-SS`
pub fn filename_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Lowercase with whitespace runs turned into `_`
pub fn slug(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim_start_matches('.')
        .to_string()
}

/// `data.products` when present and non-null, else `data`
fn tabular_source(data: &Value) -> &Value {
    match data.get("products") {
        Some(products) if !products.is_null() => products,
        _ => data,
    }
}

/// Object elements of an array; anything else has no rows
fn records_of(source: &Value) -> Vec<Record> {
    match source {
        Value::Array(items) => {
            let records: Vec<Record> = items
                .iter()
                .filter_map(|item| item.as_object().cloned())
                .collect();
            if records.len() != items.len() {
                warn!("Skipped {} non-object rows in export", items.len() - records.len());
            }
            records
        }
        _ => Vec::new(),
    }
}

/// Cell text for the tabular formats; absent fields are empty
pub(crate) fn cell_text(record: &Record, header: &str) -> String {
    record.get(header).map(value_to_text).unwrap_or_default()
}

/// Compress data using gzip
fn compress_data(data: &[u8]) -> BurpResult<Vec<u8>> {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
