use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analytics::AnalyticsReport;
use crate::api::{HealthStatus, ScrapeRequest, ScrapeResult, ScraperClient};
use crate::config::AppConfig;
use crate::error::{BurpError, BurpResult, ContextualError, ErrorContext};
use crate::export::{export_filename, ExportFormat, ExportManager, ExportScope, ExportStats};
use crate::logging::{LogContext, RequestIdGenerator};
use crate::session::{Completion, Dashboard};
use crate::storage::{
    ApiCallLogEntry, CallHistory, KeyValueStore, NewWebsiteRequest, Preferences, RequestBoard,
    SqliteStore, Theme, UserAccount, UserProfile, WebsiteRequest,
};
use crate::table::TableView;
use crate::{log_error, log_info, log_warn};

/// Application core: backend client, persisted state and exports
pub struct BurpStudio {
    config: AppConfig,
    client: ScraperClient,
    store: Arc<dyn KeyValueStore>,
    history: CallHistory,
    preferences: Preferences,
    requests: RequestBoard,
    export_manager: ExportManager,
}

impl BurpStudio {
    /// Open the SQLite store named in the configuration and wire up every
    /// subsystem
    pub async fn new(config: AppConfig) -> BurpResult<Self> {
        info!("Initializing burp.ai studio");

        let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open(&config.storage.path).await?);
        info!("Store opened at {}", config.storage.path.display());

        Self::with_store(config, store)
    }

    /// Build on an existing store
    pub fn with_store(config: AppConfig, store: Arc<dyn KeyValueStore>) -> BurpResult<Self> {
        let client = ScraperClient::new(&config.api)?;
        debug!("Scraper client targets {}", client.base_url());

        let history = CallHistory::new(
            store.clone(),
            config.storage.history_limit,
            config.storage.max_write_attempts,
        );
        let preferences = Preferences::new(store.clone());
        let requests = RequestBoard::new(store.clone(), config.storage.max_write_attempts);
        let export_manager = ExportManager::new(&config.export)?;

        Ok(Self {
            config,
            client,
            store,
            history,
            preferences,
            requests,
            export_manager,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn client(&self) -> &ScraperClient {
        &self.client
    }

    pub fn store(&self) -> Arc<dyn KeyValueStore> {
        self.store.clone()
    }

    pub fn history(&self) -> &CallHistory {
        &self.history
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn export_manager(&self) -> &ExportManager {
        &self.export_manager
    }

    /// Bring a fresh dashboard up to the persisted state: stored account
    /// and theme
    pub async fn restore_session(&self, dashboard: &mut Dashboard) -> BurpResult<()> {
        let settings = self.preferences.settings().await?;
        dashboard.set_theme(settings.theme);

        if let Some(account) = self.preferences.user().await? {
            info!("Restoring session for {}", account.username);
            dashboard.restore(account);
        }
        Ok(())
    }

    pub async fn login(
        &self,
        dashboard: &mut Dashboard,
        username: &str,
        password: &str,
    ) -> BurpResult<UserAccount> {
        let account = dashboard.login(username, password)?;
        self.preferences.save_user(&account).await?;
        info!("User {} logged in", account.username);
        Ok(account)
    }

    pub async fn logout(&self, dashboard: &mut Dashboard) -> BurpResult<()> {
        dashboard.logout();
        self.preferences.clear_user().await?;
        info!("User logged out");
        Ok(())
    }

    /// Fetch the scraper catalogue into the dashboard
    pub async fn load_scrapers(&self, dashboard: &mut Dashboard) -> BurpResult<usize> {
        let scrapers = self.client.fetch_scrapers().await?;
        let count = scrapers.len();
        dashboard.set_scrapers(scrapers);
        info!("Loaded {} scrapers", count);
        Ok(count)
    }

    pub async fn health(&self) -> BurpResult<HealthStatus> {
        self.client.health().await
    }

    /// Run one scrape and record it in the call history, success or not.
    ///
    /// A failed history write is logged and does not change the outcome.
    pub async fn scrape(&self, request: &ScrapeRequest) -> BurpResult<ScrapeResult> {
        let request_id = RequestIdGenerator::generate();
        let start = Instant::now();
        let context = LogContext::new("core", "scrape")
            .with_request_id(&request_id)
            .with_scraper(&request.scraper_id);

        log_info!(context, "Scrape started");

        let outcome = self.client.scrape(request).await;

        let entry = match &outcome {
            Ok(result) => {
                let context = context
                    .clone()
                    .with_duration(start.elapsed())
                    .with_status("success")
                    .with_number_field("records", result.record_count() as i64);
                log_info!(context, "Scrape finished");
                ApiCallLogEntry::success(&request.scraper_id, request.parameters.clone())
            }
            Err(err) => {
                ApiCallLogEntry::failure(&request.scraper_id, request.parameters.clone(), err.user_message())
            }
        };

        if let Err(err) = self.history.append(entry).await {
            let context = context.clone().with_error_category(err.category());
            log_warn!(context, "Could not record call history");
        }

        outcome.map_err(|err| {
            let failure = ContextualError::new(
                err,
                ErrorContext::new("scrape", "core").with_request_id(&request_id),
            );
            let context = context
                .with_duration(start.elapsed())
                .with_status("failed")
                .with_error_category(failure.error.category());
            log_error!(context, failure, "Scrape failed");
            failure.error
        })
    }

    /// Submit the dashboard's current form and apply the outcome
    pub async fn submit(&self, dashboard: &mut Dashboard) -> BurpResult<Completion> {
        let (token, request) = dashboard.begin_submit()?;
        let outcome = self.scrape(&request).await;
        Ok(dashboard.complete(token, outcome))
    }

    pub async fn analytics(&self) -> BurpResult<AnalyticsReport> {
        let entries = self.history.list().await?;
        Ok(AnalyticsReport::from_history(&entries))
    }

    /// Write the analytics report as a JSON file
    pub async fn export_analytics(&self) -> BurpResult<ExportStats> {
        let report = self.analytics().await?;
        let data = serde_json::to_value(&report)?;
        let base_name = format!("burp_ai_analytics_{}", crate::export::filename_timestamp());
        self.export_manager
            .export(&data, ExportFormat::Json, Some(&base_name))
            .await
    }

    /// Export a whole result the way the dashboard's export menu does
    pub async fn export_result(
        &self,
        result: &ScrapeResult,
        format: ExportFormat,
        base_name: Option<&str>,
    ) -> BurpResult<ExportStats> {
        if result.products.is_empty() && format != ExportFormat::Json {
            return Err(BurpError::NothingToExport {
                reason: "the result has no records".to_string(),
            });
        }
        self.export_manager
            .export(&result.to_value(), format, base_name)
            .await
    }

    /// Export the filtered table, or only its selected rows
    pub async fn export_table(
        &self,
        view: &TableView,
        selected_only: bool,
        format: ExportFormat,
        prefix: &str,
    ) -> BurpResult<ExportStats> {
        let (records, scope) = if selected_only {
            let records = view.selected_records();
            let count = records.len();
            (records, ExportScope::Selected(count))
        } else {
            let records = view.all_records();
            let count = records.len();
            (records, ExportScope::All(count))
        };

        if records.is_empty() && selected_only {
            return Err(BurpError::NothingToExport {
                reason: "no rows are selected".to_string(),
            });
        }

        let base_name = export_filename(prefix, scope);
        self.export_manager
            .export_records(records, format, &base_name)
            .await
    }

    /// Persist the theme and apply it to the dashboard
    pub async fn set_theme(&self, dashboard: &mut Dashboard, theme: Theme) -> BurpResult<()> {
        let mut settings = self.preferences.settings().await?;
        settings.theme = theme;
        self.preferences.save_settings(&settings).await?;
        dashboard.set_theme(theme);
        Ok(())
    }

    pub async fn save_profile(&self, profile: &UserProfile) -> BurpResult<()> {
        if !profile.email.is_empty() && !profile.email.contains('@') {
            return Err(BurpError::validation("Please enter a valid email address"));
        }
        self.preferences.save_profile(profile).await
    }

    pub async fn request_website(&self, input: NewWebsiteRequest) -> BurpResult<WebsiteRequest> {
        let request = self.requests.submit(input).await?;
        info!("Website request {} submitted for {}", request.id, request.website_name);
        Ok(request)
    }

    pub async fn website_requests(&self) -> BurpResult<Vec<WebsiteRequest>> {
        self.requests.list().await
    }

    pub async fn clear_history(&self) -> BurpResult<()> {
        self.history.clear().await?;
        warn!("Call history cleared");
        Ok(())
    }
}
