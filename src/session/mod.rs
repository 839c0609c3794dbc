//! Dashboard state machine.
//!
//! `LoggedOut → Idle → ScraperChosen → Submitting → Succeeded | Failed`.
//! A result or error belongs to the submission that produced it: every
//! submission gets a [`RequestToken`] and only the latest one may complete.

use serde_json::{Map, Value};
use tracing::debug;

pub mod form;
pub mod placement;

pub use form::{parse_parameter, validate_parameters};
pub use placement::{dropdown_direction, DropdownDirection};

use crate::api::{ScrapeRequest, ScrapeResult, ScraperConfig};
use crate::error::{BurpError, BurpResult};
use crate::storage::{Theme, UserAccount};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggedOut,
    Idle,
    ScraperChosen,
    Submitting,
    Succeeded,
    Failed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::LoggedOut => "logged out",
            SessionState::Idle => "idle",
            SessionState::ScraperChosen => "scraper chosen",
            SessionState::Submitting => "submitting",
            SessionState::Succeeded => "succeeded",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// How a result is presented. Independent of the submission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Json,
    #[default]
    Formatted,
    Table,
}

impl std::str::FromStr for ViewMode {
    type Err = BurpError;

    fn from_str(s: &str) -> BurpResult<Self> {
        match s.to_lowercase().as_str() {
            "json" | "raw" => Ok(ViewMode::Json),
            "formatted" | "cards" => Ok(ViewMode::Formatted),
            "table" => Ok(ViewMode::Table),
            _ => Err(BurpError::validation(format!("Unknown view mode: {}", s))),
        }
    }
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Json => write!(f, "json"),
            ViewMode::Formatted => write!(f, "formatted"),
            ViewMode::Table => write!(f, "table"),
        }
    }
}

/// Identifies one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Result of handing an outcome to [`Dashboard::complete`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// Token was superseded or cancelled; the outcome was dropped
    Stale,
}

#[derive(Debug, Clone)]
pub struct Dashboard {
    state: SessionState,
    user: Option<UserAccount>,
    scrapers: Vec<ScraperConfig>,
    selected: Option<usize>,
    parameters: Map<String, Value>,
    result: Option<ScrapeResult>,
    error: Option<String>,
    view_mode: ViewMode,
    theme: Theme,
    last_token: u64,
    pending: Option<RequestToken>,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self {
            state: SessionState::LoggedOut,
            user: None,
            scrapers: Vec::new(),
            selected: None,
            parameters: Map::new(),
            result: None,
            error: None,
            view_mode: ViewMode::default(),
            theme: Theme::default(),
            last_token: 0,
            pending: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&UserAccount> {
        self.user.as_ref()
    }

    pub fn is_logged_in(&self) -> bool {
        self.user.is_some()
    }

    /// Local login: both fields must be non-blank
    pub fn login(&mut self, username: &str, password: &str) -> BurpResult<UserAccount> {
        if username.trim().is_empty() || password.trim().is_empty() {
            return Err(BurpError::validation("Please enter both username and password"));
        }

        let account = UserAccount::logged_in(username.trim());
        self.restore(account.clone());
        Ok(account)
    }

    /// Resume a session for a stored account
    pub fn restore(&mut self, account: UserAccount) {
        self.user = Some(account);
        self.state = SessionState::Idle;
    }

    /// Drop the user, selection, parameters, result and any pending request
    pub fn logout(&mut self) {
        self.user = None;
        self.selected = None;
        self.parameters.clear();
        self.result = None;
        self.error = None;
        self.pending = None;
        self.state = SessionState::LoggedOut;
    }

    pub fn set_scrapers(&mut self, scrapers: Vec<ScraperConfig>) {
        let selected_id = self.selected_scraper().map(|s| s.id.clone());
        self.scrapers = scrapers;
        self.selected = selected_id.and_then(|id| self.scrapers.iter().position(|s| s.id == id));
    }

    pub fn scrapers(&self) -> &[ScraperConfig] {
        &self.scrapers
    }

    pub fn selected_scraper(&self) -> Option<&ScraperConfig> {
        self.selected.and_then(|i| self.scrapers.get(i))
    }

    /// Choose a scraper, pre-filling defaults and clearing the last outcome.
    /// A pending request is superseded.
    pub fn select_scraper(&mut self, scraper_id: &str) -> BurpResult<&ScraperConfig> {
        self.require_login()?;

        let index = self
            .scrapers
            .iter()
            .position(|s| s.id == scraper_id)
            .ok_or_else(|| BurpError::UnknownScraper {
                scraper_id: scraper_id.to_string(),
            })?;

        if let Some(token) = self.pending.take() {
            debug!("Request {} superseded by scraper change", token.id());
        }

        self.selected = Some(index);
        self.parameters = self.scrapers[index].default_parameters();
        self.result = None;
        self.error = None;
        self.state = SessionState::ScraperChosen;

        Ok(&self.scrapers[index])
    }

    pub fn parameters(&self) -> &Map<String, Value> {
        &self.parameters
    }

    /// Set one parameter. After an outcome this returns to `ScraperChosen`.
    pub fn set_parameter(&mut self, name: &str, value: Value) -> BurpResult<()> {
        let config = self
            .selected_scraper()
            .ok_or_else(|| BurpError::invalid_state("no scraper selected"))?;

        if config.parameter(name).is_none() {
            return Err(BurpError::InvalidParameter {
                name: name.to_string(),
                reason: format!("not a parameter of {}", config.name),
            });
        }

        self.parameters.insert(name.to_string(), value);
        if matches!(self.state, SessionState::Succeeded | SessionState::Failed) {
            self.state = SessionState::ScraperChosen;
        }
        Ok(())
    }

    /// Parse typed text for a parameter and set it
    pub fn set_parameter_text(&mut self, name: &str, raw: &str) -> BurpResult<()> {
        let spec = self
            .selected_scraper()
            .and_then(|c| c.parameter(name))
            .ok_or_else(|| BurpError::InvalidParameter {
                name: name.to_string(),
                reason: "unknown parameter".to_string(),
            })?;
        let value = parse_parameter(spec, raw)?;
        self.set_parameter(name, value)
    }

    pub fn validate(&self) -> BurpResult<()> {
        let config = self
            .selected_scraper()
            .ok_or_else(|| BurpError::invalid_state("no scraper selected"))?;
        validate_parameters(config, &self.parameters)
    }

    /// Whether a submission would be accepted right now
    pub fn can_submit(&self) -> bool {
        self.state != SessionState::Submitting && self.selected.is_some() && self.validate().is_ok()
    }

    /// Start a submission. Refused while one is already running or when
    /// the parameters do not validate.
    pub fn begin_submit(&mut self) -> BurpResult<(RequestToken, ScrapeRequest)> {
        self.require_login()?;
        if self.state == SessionState::Submitting {
            return Err(BurpError::invalid_state("a scrape is already running"));
        }
        self.validate()?;

        let scraper_id = self
            .selected_scraper()
            .map(|s| s.id.clone())
            .ok_or_else(|| BurpError::invalid_state("no scraper selected"))?;

        self.last_token += 1;
        let token = RequestToken(self.last_token);
        self.pending = Some(token);
        self.result = None;
        self.error = None;
        self.state = SessionState::Submitting;

        Ok((
            token,
            ScrapeRequest {
                scraper_id,
                parameters: self.parameters.clone(),
            },
        ))
    }

    /// Deliver the outcome of a submission. Outcomes for anything but the
    /// pending token are dropped.
    pub fn complete(&mut self, token: RequestToken, outcome: BurpResult<ScrapeResult>) -> Completion {
        if self.pending != Some(token) {
            debug!("Dropping outcome of stale request {}", token.id());
            return Completion::Stale;
        }
        self.pending = None;

        match outcome {
            Ok(result) => {
                self.result = Some(result);
                self.state = SessionState::Succeeded;
            }
            Err(err) => {
                self.error = Some(err.user_message());
                self.state = SessionState::Failed;
            }
        }
        Completion::Applied
    }

    /// Abandon the pending submission, if any
    pub fn cancel(&mut self) -> Option<RequestToken> {
        let token = self.pending.take()?;
        self.state = SessionState::ScraperChosen;
        debug!("Request {} cancelled", token.id());
        Some(token)
    }

    pub fn pending(&self) -> Option<RequestToken> {
        self.pending
    }

    pub fn result(&self) -> Option<&ScrapeResult> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    fn require_login(&self) -> BurpResult<()> {
        if self.user.is_none() {
            return Err(BurpError::invalid_state("not logged in"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scrapers() -> Vec<ScraperConfig> {
        vec![
            serde_json::from_value(json!({
                "id": "amazon",
                "name": "Amazon",
                "parameters": [
                    {"name": "search_term", "type": "text", "required": true},
                    {"name": "max_pages", "type": "number", "default": 3, "min": 1, "max": 10, "required": true}
                ]
            }))
            .unwrap(),
            serde_json::from_value(json!({
                "id": "wikipedia",
                "name": "Wikipedia",
                "parameters": [
                    {"name": "search_term", "type": "text", "required": true},
                    {"name": "max_results", "type": "number", "default": 1}
                ]
            }))
            .unwrap(),
        ]
    }

    fn logged_in() -> Dashboard {
        let mut dashboard = Dashboard::new();
        dashboard.login("tharun", "secret").unwrap();
        dashboard.set_scrapers(scrapers());
        dashboard
    }

    fn ready() -> Dashboard {
        let mut dashboard = logged_in();
        dashboard.select_scraper("amazon").unwrap();
        dashboard.set_parameter("search_term", json!("laptop")).unwrap();
        dashboard
    }

    #[test]
    fn test_login_requires_both_fields() {
        let mut dashboard = Dashboard::new();
        assert!(dashboard.login("tharun", " ").is_err());
        assert_eq!(dashboard.state(), SessionState::LoggedOut);

        let account = dashboard.login("tharun", "pw").unwrap();
        assert!(account.is_logged_in);
        assert_eq!(dashboard.state(), SessionState::Idle);
    }

    #[test]
    fn test_select_prefills_defaults() {
        let mut dashboard = logged_in();
        assert!(matches!(
            dashboard.select_scraper("ebay"),
            Err(BurpError::UnknownScraper { .. })
        ));

        dashboard.select_scraper("amazon").unwrap();
        assert_eq!(dashboard.state(), SessionState::ScraperChosen);
        assert_eq!(dashboard.parameters().get("max_pages"), Some(&json!(3)));
        assert!(!dashboard.can_submit());
    }

    #[test]
    fn test_submit_success_flow() {
        let mut dashboard = ready();
        dashboard.set_view_mode(ViewMode::Table);

        let (token, request) = dashboard.begin_submit().unwrap();
        assert_eq!(request.scraper_id, "amazon");
        assert_eq!(request.parameters["search_term"], json!("laptop"));
        assert_eq!(dashboard.state(), SessionState::Submitting);

        assert_eq!(
            dashboard.complete(token, Ok(ScrapeResult::default())),
            Completion::Applied
        );
        assert_eq!(dashboard.state(), SessionState::Succeeded);
        assert!(dashboard.result().is_some());
        assert_eq!(dashboard.view_mode(), ViewMode::Table);

        dashboard.set_parameter("max_pages", json!(5)).unwrap();
        assert_eq!(dashboard.state(), SessionState::ScraperChosen);
    }

    #[test]
    fn test_failure_keeps_message() {
        let mut dashboard = ready();
        let (token, _) = dashboard.begin_submit().unwrap();
        dashboard.complete(token, Err(BurpError::network("connection refused")));

        assert_eq!(dashboard.state(), SessionState::Failed);
        assert_eq!(dashboard.error(), Some("Network error occurred"));
    }

    #[test]
    fn test_double_submit_is_refused() {
        let mut dashboard = ready();
        dashboard.begin_submit().unwrap();
        assert!(matches!(
            dashboard.begin_submit(),
            Err(BurpError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_validation_blocks_submit() {
        let mut dashboard = logged_in();
        dashboard.select_scraper("amazon").unwrap();
        assert!(matches!(
            dashboard.begin_submit(),
            Err(BurpError::MissingParameter { .. })
        ));
        assert_eq!(dashboard.state(), SessionState::ScraperChosen);

        dashboard.set_parameter_text("search_term", "laptop").unwrap();
        dashboard.set_parameter_text("max_pages", "50").unwrap();
        assert!(dashboard.begin_submit().is_err());
    }

    #[test]
    fn test_stale_tokens_are_ignored() {
        let mut dashboard = ready();
        let (first, _) = dashboard.begin_submit().unwrap();
        assert_eq!(dashboard.cancel(), Some(first));
        assert_eq!(dashboard.state(), SessionState::ScraperChosen);

        let (second, _) = dashboard.begin_submit().unwrap();
        assert_eq!(
            dashboard.complete(first, Ok(ScrapeResult::default())),
            Completion::Stale
        );
        assert_eq!(dashboard.state(), SessionState::Submitting);

        // switching scraper supersedes the pending request as well
        dashboard.select_scraper("wikipedia").unwrap();
        assert_eq!(
            dashboard.complete(second, Err(BurpError::network("late"))),
            Completion::Stale
        );
        assert!(dashboard.error().is_none());
    }

    #[test]
    fn test_logout_clears_everything() {
        let mut dashboard = ready();
        dashboard.begin_submit().unwrap();
        dashboard.logout();

        assert_eq!(dashboard.state(), SessionState::LoggedOut);
        assert!(dashboard.selected_scraper().is_none());
        assert!(dashboard.parameters().is_empty());
        assert!(dashboard.pending().is_none());
        assert!(dashboard.select_scraper("amazon").is_err());
    }

    #[test]
    fn test_unknown_parameter_is_rejected() {
        let mut dashboard = ready();
        assert!(dashboard.set_parameter("color", json!("red")).is_err());
    }
}
