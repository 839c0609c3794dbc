use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

use burp_studio::api::ScrapeResult;
use burp_studio::config::AppConfig;
use burp_studio::error::BurpResult;
use burp_studio::export::ExportFormat;
use burp_studio::logging::{LogContext, RequestIdGenerator};
use burp_studio::session::{Completion, Dashboard, RequestToken, SessionState, ViewMode};
use burp_studio::storage::Theme;
use burp_studio::table::{flatten_all, to_table, TableView};
use burp_studio::{views, BurpStudio};

const HELP: &str = "\
Commands:
  login <user> <password>     log in locally
  logout                      forget the account
  scrapers                    list scrapers
  use <scraper>               choose a scraper (fills in defaults)
  set <param> <value>         set a parameter
  params                      show the form
  run                         submit the scrape
  cancel                      abandon the running scrape
  view json|formatted|table   switch the result view
  search <text>               filter table rows (empty clears)
  sort <column>               sort the table; again to reverse
  page <n> | next | prev      move through table pages
  pagesize <n>                rows per page
  select <n>                  toggle a row on the page
  selectpage                  toggle every row on the page
  export <format> [selected]  csv, excel, xml or json
  theme black|white|grey      change the theme
  history | analytics         call history and statistics
  health                      check the backend
  quit";

type Outcome = (RequestToken, BurpResult<ScrapeResult>);

/// Interactive state around the dashboard: the table built from the
/// current result
struct App {
    studio: Arc<BurpStudio>,
    dashboard: Dashboard,
    table: Option<TableView>,
    completions: mpsc::UnboundedSender<Outcome>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().await?;
    config.ensure_directories().await?;
    burp_studio::logging::init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup")
        .with_request_id(RequestIdGenerator::generate())
        .with_string_field("version", env!("CARGO_PKG_VERSION"));
    burp_studio::log_info!(context, "burp.ai studio starting up");

    let studio = Arc::new(BurpStudio::new(config).await?);
    let (completions, mut outcomes) = mpsc::unbounded_channel();

    let mut app = App {
        studio: studio.clone(),
        dashboard: Dashboard::new(),
        table: None,
        completions,
    };
    studio.restore_session(&mut app.dashboard).await?;

    println!("burp.ai studio v{} - type `help` for commands", env!("CARGO_PKG_VERSION"));
    match app.dashboard.user() {
        Some(user) => {
            println!("Welcome back, {}.", user.name);
            app.refresh_scrapers().await;
        }
        None => println!("Please log in: login <user> <password>"),
    }
    app.prompt();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match app.handle(line.trim()).await {
                    Ok(true) => break,
                    Ok(false) => {}
                    Err(err) => println!("Error: {}", err),
                }
                app.prompt();
            }
            Some((token, outcome)) = outcomes.recv() => {
                app.finish(token, outcome);
                app.prompt();
            }
        }
    }

    info!("burp.ai studio shutting down");
    Ok(())
}

impl App {
    fn prompt(&self) {
        let state = self.dashboard.state();
        let scraper = self
            .dashboard
            .selected_scraper()
            .map(|s| s.id.as_str())
            .unwrap_or("-");
        print!("[{} {}] > ", state, scraper);
        let _ = std::io::stdout().flush();
    }

    async fn refresh_scrapers(&mut self) {
        match self.studio.load_scrapers(&mut self.dashboard).await {
            Ok(count) => println!("{} scrapers available.", count),
            Err(err) => {
                error!("Failed to load scrapers: {}", err);
                println!("Could not load scrapers: {}", err.user_message());
            }
        }
    }

    /// Run one command line. `Ok(true)` means quit.
    async fn handle(&mut self, line: &str) -> Result<bool> {
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "" => {}
            "help" => println!("{}", HELP),
            "quit" | "exit" => return Ok(true),
            "login" => {
                let (user, password) = rest.split_once(' ').unwrap_or((rest, ""));
                let account = self.studio.login(&mut self.dashboard, user, password).await?;
                println!("Logged in as {}.", account.name);
                self.refresh_scrapers().await;
            }
            "logout" => {
                self.studio.logout(&mut self.dashboard).await?;
                self.table = None;
                println!("Logged out.");
            }
            "scrapers" => {
                for scraper in self.dashboard.scrapers() {
                    println!("  {:<16} {}", scraper.id, scraper.name);
                }
            }
            "use" => {
                let scraper = self.dashboard.select_scraper(rest)?;
                println!("Using {}.", scraper.name);
                self.table = None;
                self.print_form();
            }
            "set" => {
                let (name, value) = rest.split_once(' ').unwrap_or((rest, ""));
                self.dashboard.set_parameter_text(name, value)?;
            }
            "params" => self.print_form(),
            "run" => self.submit()?,
            "cancel" => match self.dashboard.cancel() {
                Some(token) => println!("Request {} cancelled.", token.id()),
                None => println!("Nothing is running."),
            },
            "view" => {
                let mode: ViewMode = rest.parse()?;
                self.dashboard.set_view_mode(mode);
                self.show_result();
            }
            "search" => self.with_table(|table| table.set_query(rest)),
            "sort" => self.with_table(|table| table.sort_by(rest)),
            "page" => {
                let page: usize = rest.parse()?;
                self.with_table(|table| table.set_page(page));
            }
            "next" => self.with_table(TableView::next_page),
            "prev" => self.with_table(TableView::previous_page),
            "pagesize" => {
                let size: usize = rest.parse()?;
                if !self.studio.config().table.page_size_options.contains(&size) {
                    println!(
                        "Page size must be one of {:?}",
                        self.studio.config().table.page_size_options
                    );
                } else {
                    self.with_table(|table| table.set_page_size(size));
                }
            }
            "select" => {
                let row: usize = rest.parse()?;
                self.with_table(|table| table.toggle_row(row.saturating_sub(1)));
            }
            "selectpage" => self.with_table(TableView::toggle_select_page),
            "export" => self.export(rest).await?,
            "theme" => {
                let theme: Theme = rest.parse()?;
                self.studio.set_theme(&mut self.dashboard, theme).await?;
                println!("Theme set to {}.", theme);
            }
            "history" => {
                for entry in self.studio.history().list().await?.iter().rev().take(20) {
                    println!(
                        "  {} {:<16} {}",
                        entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        entry.scraper,
                        entry.error.as_deref().unwrap_or("ok")
                    );
                }
            }
            "analytics" => {
                let report = self.studio.analytics().await?;
                println!(
                    "{} calls, {} succeeded ({}), {} per active day",
                    report.total_calls,
                    report.successful_calls,
                    report.success_rate,
                    report.average_calls_per_day
                );
                if let Some(scraper) = report.most_used_scraper {
                    println!("Most used: {}", scraper);
                }
            }
            "health" => {
                let health = self.studio.health().await?;
                println!("{}: {}", health.status, health.available_scrapers.join(", "));
            }
            other => println!("Unknown command '{}'; type `help`.", other),
        }
        Ok(false)
    }

    fn print_form(&self) {
        let Some(scraper) = self.dashboard.selected_scraper() else {
            println!("No scraper selected.");
            return;
        };
        for spec in &scraper.parameters {
            let value = self
                .dashboard
                .parameters()
                .get(&spec.name)
                .map(burp_studio::record::value_to_text)
                .unwrap_or_default();
            let marker = if spec.required { "*" } else { " " };
            println!("  {}{:<20} = {}", marker, spec.display_label(), value);
        }
    }

    /// Start the scrape on a background task; the outcome comes back
    /// through the completion channel
    fn submit(&mut self) -> Result<()> {
        let (token, request) = self.dashboard.begin_submit()?;
        self.table = None;
        println!("Scraping with {}... (`cancel` to abandon)", request.scraper_id);

        let studio = self.studio.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let outcome = studio.scrape(&request).await;
            let _ = completions.send((token, outcome));
        });
        Ok(())
    }

    fn finish(&mut self, token: RequestToken, outcome: BurpResult<ScrapeResult>) {
        if self.dashboard.complete(token, outcome) == Completion::Stale {
            return;
        }
        match self.dashboard.state() {
            SessionState::Failed => {
                println!("\nScrape failed: {}", self.dashboard.error().unwrap_or("Scraping failed"));
            }
            _ => {
                println!();
                self.show_result();
            }
        }
    }

    fn show_result(&mut self) {
        if self.dashboard.view_mode() == ViewMode::Table {
            self.build_table();
        }
        let Some(result) = self.dashboard.result() else {
            println!("No result yet.");
            return;
        };

        match self.dashboard.view_mode() {
            ViewMode::Json => match views::render_json(result) {
                Ok(text) => println!("{}", text),
                Err(err) => println!("Error: {}", err),
            },
            ViewMode::Formatted => print!(
                "{}",
                views::render_formatted(result, self.studio.config().table.formatted_preview_limit)
            ),
            ViewMode::Table => {
                if let Some(table) = &self.table {
                    print!("{}", views::render_table(table));
                }
            }
        }
    }

    /// Switch to the table view and apply `change` to it
    fn with_table(&mut self, change: impl FnOnce(&mut TableView)) {
        self.dashboard.set_view_mode(ViewMode::Table);
        self.build_table();
        match &mut self.table {
            Some(table) => {
                change(table);
                print!("{}", views::render_table(table));
            }
            None => println!("No result to show as a table."),
        }
    }

    fn build_table(&mut self) {
        if self.table.is_some() {
            return;
        }
        if let Some(result) = self.dashboard.result() {
            self.table = Some(TableView::new(
                to_table(&flatten_all(&result.products)),
                self.studio.config().table.page_size,
            ));
        }
    }

    async fn export(&mut self, args: &str) -> Result<()> {
        let mut parts = args.split_whitespace();
        let format: ExportFormat = parts.next().unwrap_or("csv").parse()?;
        let selected_only = parts.next() == Some("selected");

        let stats = match (&self.table, self.dashboard.view_mode()) {
            (Some(table), ViewMode::Table) => {
                let prefix = self
                    .dashboard
                    .selected_scraper()
                    .map(|s| s.id.clone())
                    .unwrap_or_else(|| "burp_ai_table".to_string());
                self.studio
                    .export_table(table, selected_only, format, &prefix)
                    .await?
            }
            _ => {
                let result = self
                    .dashboard
                    .result()
                    .ok_or_else(|| anyhow::anyhow!("No result to export"))?;
                self.studio.export_result(result, format, None).await?
            }
        };

        println!(
            "Exported {} records to {} ({} bytes)",
            stats.record_count,
            stats.file_path.display(),
            stats.file_size_bytes
        );
        Ok(())
    }
}
