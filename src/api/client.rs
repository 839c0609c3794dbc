use reqwest::{header::HeaderMap, header::HeaderValue, Client, Response, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

use super::types::{
    HealthStatus, ScrapeEnvelope, ScrapeRequest, ScrapeResult, ScraperConfig, ScrapersEnvelope,
};
use crate::config::ApiConfig;
use crate::error::{BurpError, BurpResult};

/// HTTP client for the scraper backend
#[derive(Clone)]
pub struct ScraperClient {
    client: Client,
    base_url: Url,
}

impl ScraperClient {
    pub fn new(config: &ApiConfig) -> BurpResult<Self> {
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| BurpError::config(format!("invalid api.base_url {}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .default_headers(headers)
            .user_agent(concat!("burp-studio/", env!("CARGO_PKG_VERSION")))
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_nodelay(true);

        if let Some(seconds) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }

        let client = builder
            .build()
            .map_err(|e| BurpError::config(format!("failed to build HTTP client: {}", e)))?;

        info!("Scraper API client targeting {}", base_url);

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> BurpResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BurpError::config(format!("invalid endpoint {}: {}", path, e)))
    }

    /// `GET /api/scrapers`, in the order the backend lists them
    pub async fn fetch_scrapers(&self) -> BurpResult<Vec<ScraperConfig>> {
        let url = self.endpoint("api/scrapers")?;
        debug!("GET {}", url);

        let response = self.client.get(url).send().await?;
        let body = read_json(response).await?;
        let envelope: ScrapersEnvelope = serde_json::from_value(body)
            .map_err(|e| BurpError::api(None, format!("Malformed scraper list: {}", e)))?;

        let mut scrapers = Vec::with_capacity(envelope.scrapers.len());
        for (id, value) in envelope.scrapers {
            let mut config: ScraperConfig = serde_json::from_value(value)
                .map_err(|e| BurpError::api(None, format!("Malformed scraper {}: {}", id, e)))?;
            config.id = id;
            scrapers.push(config);
        }

        info!("Fetched {} scrapers", scrapers.len());
        Ok(scrapers)
    }

    /// `POST /api/scrape`. Non-2xx answers and `success: false` bodies are
    /// returned as [`BurpError::Api`] carrying the backend's message.
    pub async fn scrape(&self, request: &ScrapeRequest) -> BurpResult<ScrapeResult> {
        let url = self.endpoint("api/scrape")?;
        let start_time = Instant::now();
        debug!("POST {} scraper={}", url, request.scraper_id);

        let response = self.client.post(url).json(request).send().await?;
        let body = read_json(response).await?;

        let envelope: ScrapeEnvelope = serde_json::from_value(body)
            .map_err(|e| BurpError::api(None, format!("Malformed response: {}", e)))?;

        match envelope {
            ScrapeEnvelope {
                success: true,
                data: Some(data),
                ..
            } => {
                let result = ScrapeResult::from_value(data);
                info!(
                    "Scrape {} returned {} records in {}ms",
                    request.scraper_id,
                    result.record_count(),
                    start_time.elapsed().as_millis()
                );
                Ok(result)
            }
            ScrapeEnvelope { error, .. } => Err(BurpError::api(None, error.unwrap_or_default())),
        }
    }

    /// `GET /api/health`
    pub async fn health(&self) -> BurpResult<HealthStatus> {
        let url = self.endpoint("api/health")?;
        let response = self.client.get(url).send().await?;
        let body = read_json(response).await?;
        serde_json::from_value(body)
            .map_err(|e| BurpError::api(None, format!("Malformed health response: {}", e)))
    }
}

/// Body as JSON. Error statuses become [`BurpError::Api`] with the body's
/// `error` field when it has one.
async fn read_json(response: Response) -> BurpResult<Value> {
    let status = response.status();
    let text = response.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_default();
        warn!("Backend answered {}: {}", status, message);
        return Err(BurpError::api(Some(status.as_u16()), message));
    }

    serde_json::from_str(&text).map_err(|e| {
        BurpError::api(
            Some(status.as_u16()),
            format!("Malformed response ({}): {}", status_text(status), e),
        )
    })
}

fn status_text(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}


#[cfg(test)]
mod tests {
    use super::stub::serve;
    use super::*;
    use serde_json::json;

    fn client(base_url: &str) -> ScraperClient {
        ScraperClient::new(&ApiConfig {
            base_url: base_url.to_string(),
            request_timeout_seconds: Some(5),
            connect_timeout_seconds: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_scrapers_keeps_order_and_ids() {
        let body = json!({"scrapers": {
            "snapdeal": {"name": "Snapdeal", "script_path": "x.py", "parameters": []},
            "amazon": {"name": "Amazon", "parameters": [
                {"name": "search_term", "type": "text", "label": "Search Term", "required": true}
            ]}
        }})
        .to_string();
        let (base, server) = serve(vec![(200, body)]).await;

        let scrapers = client(&base).fetch_scrapers().await.unwrap();
        assert_eq!(scrapers.len(), 2);
        assert_eq!(scrapers[0].id, "snapdeal");
        assert_eq!(scrapers[1].id, "amazon");
        assert_eq!(scrapers[1].parameters[0].label, "Search Term");

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("GET /api/scrapers HTTP/1.1"));
    }

    #[tokio::test]
    async fn test_scrape_success() {
        let body = json!({"success": true, "data": {
            "search_term": "echo",
            "summary": {"total_products": 1},
            "products": [{"name": "Echo Dot", "price": "₹4,499"}],
            "scraper_used": "Amazon"
        }})
        .to_string();
        let (base, server) = serve(vec![(200, body)]).await;

        let mut parameters = serde_json::Map::new();
        parameters.insert("search_term".into(), json!("echo"));
        let request = ScrapeRequest {
            scraper_id: "amazon".into(),
            parameters,
        };

        let result = client(&base).scrape(&request).await.unwrap();
        assert_eq!(result.record_count(), 1);
        assert_eq!(result.scraper_used.as_deref(), Some("Amazon"));

        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("POST /api/scrape HTTP/1.1"));
        assert!(requests[0].contains(r#""scraper_id":"amazon""#));
    }

    #[tokio::test]
    async fn test_scrape_application_errors() {
        let (base, _server) = serve(vec![
            (400, json!({"error": "Parameter search_term is required"}).to_string()),
            (500, "<html>oops</html>".to_string()),
            (200, json!({"success": false, "error": "Blocked"}).to_string()),
            (200, json!({"success": false}).to_string()),
        ])
        .await;
        let client = client(&base);
        let request = ScrapeRequest {
            scraper_id: "amazon".into(),
            parameters: serde_json::Map::new(),
        };

        let err = client.scrape(&request).await.unwrap_err();
        assert!(matches!(err, BurpError::Api { status: Some(400), .. }));
        assert_eq!(err.user_message(), "Parameter search_term is required");

        let err = client.scrape(&request).await.unwrap_err();
        assert!(matches!(err, BurpError::Api { status: Some(500), .. }));
        assert_eq!(err.user_message(), "Network error occurred");

        let err = client.scrape(&request).await.unwrap_err();
        assert_eq!(err.user_message(), "Blocked");

        let err = client.scrape(&request).await.unwrap_err();
        assert!(matches!(err, BurpError::Api { status: None, .. }));
        assert_eq!(err.user_message(), "Scraping failed");
    }

    #[tokio::test]
    async fn test_scrape_keeps_payload_with_null_products() {
        let data = json!({"search_term": null, "products": null, "error_count": 3});
        let body = json!({"success": true, "data": data}).to_string();
        let (base, _server) = serve(vec![(200, body)]).await;
        let request = ScrapeRequest {
            scraper_id: "amazon".into(),
            parameters: serde_json::Map::new(),
        };

        let result = client(&base).scrape(&request).await.unwrap();
        assert_eq!(result.record_count(), 0);
        assert_eq!(result.to_value(), data);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = client(&base).health().await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(err.user_message(), "Network error occurred");
    }

    #[tokio::test]
    async fn test_health() {
        let body = json!({
            "status": "healthy",
            "timestamp": "2026-10-19T10:00:00",
            "available_scrapers": ["amazon", "flipkart"]
        })
        .to_string();
        let (base, _server) = serve(vec![(200, body)]).await;

        let health = client(&base).health().await.unwrap();
        assert!(health.is_healthy());
        assert_eq!(health.available_scrapers.len(), 2);
    }

    #[test]
    fn test_invalid_base_url() {
        let result = ScraperClient::new(&ApiConfig {
            base_url: "not a url".to_string(),
            request_timeout_seconds: None,
            connect_timeout_seconds: 1,
        });
        assert!(matches!(result, Err(BurpError::Configuration { .. })));
    }
}
