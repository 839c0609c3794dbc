//! Client side of the scraper backend's REST API

pub mod client;
pub mod types;

pub use client::ScraperClient;
pub use types::{
    HealthStatus, ParameterKind, ParameterSpec, ScrapeRequest, ScrapeResult, ScraperConfig, Summary,
};
