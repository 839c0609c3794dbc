use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use burp_studio::api::ScrapeResult;
use burp_studio::config::AppConfig;
use burp_studio::export::ExportFormat;
use burp_studio::session::{Completion, Dashboard, ViewMode};
use burp_studio::storage::{NewWebsiteRequest, Priority, Theme, UserProfile};
use burp_studio::table::{flatten_all, to_table, SortDirection, TableView};
use burp_studio::{views, BurpStudio};

#[derive(Parser)]
#[command(name = "burp-cli")]
#[command(about = "burp.ai scraper dashboard, command line interface")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose logging on stderr")]
    verbose: bool,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in locally; the password is checked for presence only
    Login {
        username: String,
        #[arg(short, long)]
        password: String,
    },

    /// Forget the stored account and profile
    Logout,

    /// List the scrapers the backend offers
    Scrapers,

    /// Check that the backend is up
    Health,

    /// Run a scraper
    Scrape {
        #[arg(help = "Scraper id, as listed by `scrapers`")]
        scraper: String,

        #[arg(short = 'p', long = "param", value_parser = parse_key_val, help = "Parameter as name=value")]
        params: Vec<(String, String)>,

        #[arg(long, default_value = "formatted", help = "json, formatted or table")]
        view: String,

        #[arg(short, long, help = "Export format: csv, excel, xml or json")]
        format: Option<String>,

        #[arg(short, long, help = "Export file name without extension")]
        output: Option<String>,

        #[arg(long, help = "Also write the raw result JSON to this path")]
        save: Option<PathBuf>,
    },

    /// Browse a saved result as a table
    Table {
        #[arg(help = "Result JSON written by `scrape --save` or a JSON export")]
        file: PathBuf,

        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, help = "Column to sort by")]
        sort: Option<String>,

        #[arg(long, help = "Sort descending")]
        desc: bool,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long)]
        page_size: Option<usize>,

        #[arg(long, value_delimiter = ',', help = "Row numbers on the page to select, from 1")]
        select: Vec<usize>,

        #[arg(long, help = "Select every row on the page")]
        select_page: bool,

        #[arg(short, long, help = "Export format for the table rows")]
        export: Option<String>,

        #[arg(long, help = "Export only the selected rows")]
        selected_only: bool,
    },

    /// Show the call history, newest first
    History {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Delete the call history
    ClearHistory,

    /// Usage statistics from the call history
    Analytics {
        #[arg(long, help = "Write the report as a JSON file")]
        export: bool,
    },

    /// Show or change settings
    Settings {
        #[arg(long)]
        theme: Option<String>,
        #[arg(long)]
        notifications: Option<bool>,
        #[arg(long)]
        auto_export: Option<bool>,
    },

    /// Show or change the profile
    Profile {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        dob: Option<String>,
    },

    /// Ask for a new website to be supported
    RequestSite {
        name: String,
        url: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        data_type: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "medium")]
        priority: String,
    },

    /// List submitted website requests
    Requests,
}

fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::load().await?,
    };
    if cli.verbose {
        config.logging.console_enabled = true;
        config.logging.level = "debug".to_string();
    }
    config.ensure_directories().await?;
    burp_studio::logging::init_logging(&config.logging)?;

    info!("burp.ai CLI v{}", env!("CARGO_PKG_VERSION"));

    let studio = BurpStudio::new(config).await?;
    let mut dashboard = Dashboard::new();
    studio.restore_session(&mut dashboard).await?;

    match cli.command {
        Commands::Login { username, password } => {
            let account = studio.login(&mut dashboard, &username, &password).await?;
            println!("Logged in as {}", account.username);
        }
        Commands::Logout => {
            studio.logout(&mut dashboard).await?;
            println!("Logged out.");
        }
        Commands::Scrapers => list_scrapers(&studio, &mut dashboard).await?,
        Commands::Health => {
            let health = studio.health().await?;
            println!("Backend: {}", health.status);
            if let Some(ref timestamp) = health.timestamp {
                println!("Checked at: {}", timestamp);
            }
            println!("Available scrapers: {}", health.available_scrapers.join(", "));
            if !health.is_healthy() {
                bail!("backend reports status '{}'", health.status);
            }
        }
        Commands::Scrape { scraper, params, view, format, output, save } => {
            let options = ScrapeOptions { view, format, output, save };
            execute_scrape(&studio, &mut dashboard, &scraper, params, options).await?;
        }
        Commands::Table {
            file,
            search,
            sort,
            desc,
            page,
            page_size,
            select,
            select_page,
            export,
            selected_only,
        } => {
            let page_size = page_size.unwrap_or(studio.config().table.page_size);
            let mut view = load_table(&file, page_size).await?;

            if let Some(query) = search {
                view.set_query(query);
            }
            if let Some(column) = sort {
                let direction = if desc { SortDirection::Desc } else { SortDirection::Asc };
                view.set_sort(&column, direction);
            }
            view.set_page(page);
            if select_page {
                view.toggle_select_page();
            }
            for row in select {
                view.toggle_row(row.saturating_sub(1));
            }

            print!("{}", views::render_table(&view));

            if let Some(format) = export {
                let format: ExportFormat = format.parse()?;
                let prefix = file
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "table".to_string());
                let stats = studio.export_table(&view, selected_only, format, &prefix).await?;
                println!(
                    "Exported {} rows to {}",
                    stats.record_count,
                    stats.file_path.display()
                );
            }
        }
        Commands::History { limit } => {
            let entries = studio.history().list().await?;
            println!("{:<20} {:<16} {:<8} Error", "Time", "Scraper", "Result");
            println!("{}", "-".repeat(70));
            for entry in entries.iter().rev().take(limit) {
                println!(
                    "{:<20} {:<16} {:<8} {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.scraper,
                    if entry.success { "ok" } else { "failed" },
                    entry.error.as_deref().unwrap_or("")
                );
            }
            println!("{} of {} calls shown", entries.len().min(limit), entries.len());
        }
        Commands::ClearHistory => {
            studio.clear_history().await?;
            println!("Call history cleared.");
        }
        Commands::Analytics { export } => {
            let report = studio.analytics().await?;
            print_analytics(&report);
            if export {
                let stats = studio.export_analytics().await?;
                println!("\nReport written to {}", stats.file_path.display());
            }
        }
        Commands::Settings { theme, notifications, auto_export } => {
            let mut settings = studio.preferences().settings().await?;
            if let Some(theme) = theme {
                let theme: Theme = theme.parse()?;
                studio.set_theme(&mut dashboard, theme).await?;
                settings.theme = theme;
            }
            if notifications.is_some() || auto_export.is_some() {
                settings.notifications = notifications.unwrap_or(settings.notifications);
                settings.auto_export = auto_export.unwrap_or(settings.auto_export);
                studio.preferences().save_settings(&settings).await?;
            }
            let palette = settings.theme.palette();
            println!("Theme: {} (text {}, background {})", settings.theme, palette.text, palette.background);
            println!("Notifications: {}", settings.notifications);
            println!("Auto export: {}", settings.auto_export);
        }
        Commands::Profile { name, email, dob } => {
            require_login(&dashboard)?;
            let mut profile: UserProfile = studio.preferences().profile().await?;
            if name.is_some() || email.is_some() || dob.is_some() {
                profile.name = name.unwrap_or(profile.name);
                profile.email = email.unwrap_or(profile.email);
                profile.dob = dob.unwrap_or(profile.dob);
                studio.save_profile(&profile).await?;
            }
            println!("Name: {}", profile.name);
            println!("Email: {}", profile.email);
            println!("Date of birth: {}", profile.dob);
        }
        Commands::RequestSite {
            name,
            url,
            email,
            data_type,
            description,
            priority,
        } => {
            let priority: Priority = priority.parse()?;
            let request = studio
                .request_website(NewWebsiteRequest {
                    website_name: name,
                    website_url: url,
                    data_type,
                    description,
                    email,
                    priority,
                })
                .await?;
            println!("Request #{} for {} submitted.", request.id, request.website_name);
        }
        Commands::Requests => {
            for request in studio.website_requests().await? {
                println!(
                    "#{} {} ({}) {:?} {:?}",
                    request.id, request.website_name, request.website_url, request.priority, request.status
                );
            }
        }
    }

    Ok(())
}

struct ScrapeOptions {
    view: String,
    format: Option<String>,
    output: Option<String>,
    save: Option<PathBuf>,
}

fn require_login(dashboard: &Dashboard) -> Result<()> {
    if !dashboard.is_logged_in() {
        bail!("Not logged in. Run `burp-cli login <username> --password <password>` first.");
    }
    Ok(())
}

async fn list_scrapers(studio: &BurpStudio, dashboard: &mut Dashboard) -> Result<()> {
    studio.load_scrapers(dashboard).await?;

    for scraper in dashboard.scrapers() {
        println!("{} ({})", scraper.name, scraper.id);
        for spec in &scraper.parameters {
            let mut line = format!("    {} [{:?}]", spec.display_label(), spec.kind);
            if spec.required {
                line.push_str(" required");
            }
            if let Some(default) = &spec.default {
                line.push_str(&format!(" default={}", default));
            }
            let options = spec.option_values();
            if !options.is_empty() {
                line.push_str(&format!(" one of {}", options.join("|")));
            }
            println!("{}", line);
        }
    }
    Ok(())
}

async fn execute_scrape(
    studio: &BurpStudio,
    dashboard: &mut Dashboard,
    scraper_id: &str,
    params: Vec<(String, String)>,
    options: ScrapeOptions,
) -> Result<()> {
    require_login(dashboard)?;
    let view_mode: ViewMode = options.view.parse()?;
    let format = options
        .format
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    studio.load_scrapers(dashboard).await?;
    dashboard.select_scraper(scraper_id)?;
    for (name, value) in &params {
        dashboard.set_parameter_text(name, value)?;
    }
    dashboard.set_view_mode(view_mode);

    let (token, request) = dashboard.begin_submit()?;
    info!("Submitting request {} to {}", token.id(), request.scraper_id);
    eprintln!("Scraping with {}... (Ctrl-C to cancel)", request.scraper_id);

    tokio::select! {
        outcome = studio.scrape(&request) => {
            if dashboard.complete(token, outcome) == Completion::Stale {
                warn!("Outcome arrived for a superseded request");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            dashboard.cancel();
            bail!("Scrape cancelled");
        }
    }

    if let Some(message) = dashboard.error() {
        bail!("{}", message);
    }
    let result = dashboard
        .result()
        .ok_or_else(|| anyhow!("the scrape finished without a result"))?;

    match dashboard.view_mode() {
        ViewMode::Json => println!("{}", views::render_json(result)?),
        ViewMode::Formatted => print!(
            "{}",
            views::render_formatted(result, studio.config().table.formatted_preview_limit)
        ),
        ViewMode::Table => {
            let view = TableView::new(
                to_table(&flatten_all(&result.products)),
                studio.config().table.page_size,
            );
            print!("{}", views::render_table(&view));
        }
    }

    if let Some(path) = &options.save {
        tokio::fs::write(path, views::render_json(result)?)
            .await
            .with_context(|| format!("writing {}", path.display()))?;
        eprintln!("Result saved to {}", path.display());
    }

    let settings = studio.preferences().settings().await?;
    let format = match format {
        Some(format) => Some(format),
        None if settings.auto_export => Some(studio.config().export.default_format.parse()?),
        None => None,
    };
    if let Some(format) = format {
        let stats = studio
            .export_result(result, format, options.output.as_deref())
            .await?;
        eprintln!(
            "Exported {} records as {} to {}",
            stats.record_count,
            format,
            stats.file_path.display()
        );
    }

    Ok(())
}

/// Read a saved result; a bare array of records is accepted too
async fn load_table(path: &PathBuf, page_size: usize) -> Result<TableView> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)?;
    let value = match value {
        Value::Array(items) => serde_json::json!({ "products": items }),
        other => other,
    };
    let result = ScrapeResult::from_value(value);

    Ok(TableView::new(to_table(&flatten_all(&result.products)), page_size))
}

fn print_analytics(report: &burp_studio::AnalyticsReport) {
    println!("Total calls:      {}", report.total_calls);
    println!("Successful:       {}", report.successful_calls);
    println!("Failed:           {}", report.failed_calls);
    println!("Success rate:     {}", report.success_rate);
    println!("Avg calls/day:    {}", report.average_calls_per_day);
    if let Some(scraper) = &report.most_used_scraper {
        println!("Most used:        {}", scraper);
    }
    if let Some(peak) = &report.peak_day {
        println!("Peak day:         {} ({} calls)", peak.label(), peak.count);
    }

    if !report.scraper_stats.is_empty() {
        println!("\nBy scraper:");
        for usage in &report.scraper_stats {
            println!("  {:<20} {}", usage.label, usage.count);
        }
    }
    if !report.recent_days.is_empty() {
        println!("\nRecent days:");
        for day in &report.recent_days {
            println!("  {:<20} {}", day.label(), "#".repeat(day.count.min(50)));
        }
    }
    if !report.monthly_stats.is_empty() {
        println!("\nBy month:");
        for month in &report.monthly_stats {
            println!("  {:<20} {}", month.label, month.count);
        }
    }
}
