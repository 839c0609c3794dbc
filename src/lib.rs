//! burp.ai studio - a terminal dashboard for the burp.ai scraper backend
//!
//! This library provides:
//! - A client for the scraper backend (`/api/scrapers`, `/api/scrape`, `/api/health`)
//! - Record flattening and an interactive table with search, sort, pages and selection
//! - CSV, TSV, XML and JSON export
//! - Persisted session state, call history and usage analytics

pub mod analytics;
pub mod api;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod logging;
pub mod record;
pub mod session;
pub mod storage;
pub mod table;
pub mod views;

// Re-export main types for convenience
pub use crate::analytics::AnalyticsReport;
pub use crate::config::AppConfig;
pub use crate::core::BurpStudio;
pub use crate::error::{BurpError, BurpResult, ContextualError};
pub use crate::export::ExportFormat;
pub use crate::session::{Dashboard, ViewMode};
pub use crate::table::TableView;
