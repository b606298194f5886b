use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabled::{Table, Tabled};
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::adapters::{resolve_endpoint, PageOrigin, WsConnector};
use crate::config::AppConfig;
use crate::domain::{AnalystKind, ReportLength, SessionPhase, TeamProgress};
use crate::error::{BoardError, Result};
use crate::report::{
    export_body, render_html, summarize_report, summarize_section, ExportDocument, ExportMeta,
    SummaryMode,
};
use crate::session::{SessionController, SessionSnapshot, SessionUpdate};

#[derive(Parser)]
#[command(name = "tradeboard")]
#[command(version = "0.1.0")]
#[command(about = "Drive and watch multi-agent trading analysis runs", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory
    #[arg(short, long, default_value = "config", global = true)]
    pub config: PathBuf,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an analysis run and follow it to the end (Ctrl-C stops it)
    Run {
        /// Ticker symbol (defaults to run.ticker)
        #[arg(short, long)]
        ticker: Option<String>,
        /// Analysis date, YYYY-MM-DD (defaults to today)
        #[arg(short, long)]
        date: Option<String>,
        /// Analysts to include, e.g. market,news
        #[arg(short, long, value_delimiter = ',')]
        analysts: Vec<String>,
        /// Debate rounds: 1 shallow, 3 medium, 5 deep
        #[arg(long)]
        depth: Option<u32>,
        /// short or long
        #[arg(long)]
        length: Option<String>,
        /// WebSocket URL, overrides backend.ws_url
        #[arg(long, env = "TRADEBOARD_WS_URL")]
        ws_url: Option<String>,
        /// Write the finished report as a paginated text file into this directory
        #[arg(long)]
        export_dir: Option<PathBuf>,
    },
    /// Condense a report file the way short mode displays it
    Summarize {
        file: PathBuf,
        /// Uncapped export summary instead of the live view
        #[arg(long)]
        full: bool,
        /// Recommendation label appended to a full summary
        #[arg(long)]
        recommendation: Option<String>,
        /// Render the result as HTML
        #[arg(long)]
        html: bool,
    },
    /// Build the paginated text export for a report file
    Export {
        file: PathBuf,
        #[arg(short, long)]
        ticker: String,
        #[arg(short, long)]
        date: String,
        /// short or long
        #[arg(long, default_value = "long")]
        length: String,
        #[arg(long)]
        recommendation: Option<String>,
        /// Output directory; prints to stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Show the backend endpoint that would be used
    Endpoint {
        /// Resolve from this page origin instead of the configuration
        #[arg(long)]
        origin: Option<String>,
    },
}

/// Output mode for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Table,
    Json,
}

impl OutputMode {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputMode::Json
        } else {
            OutputMode::Table
        }
    }
}

#[derive(Debug, Serialize, Tabled)]
pub struct TeamRow {
    pub team: String,
    pub progress: String,
    pub percent: String,
    pub agents: String,
}

impl From<&TeamProgress> for TeamRow {
    fn from(p: &TeamProgress) -> Self {
        Self {
            team: p.team.title().to_string(),
            progress: format!("{}/{}", p.completed, p.total),
            percent: format!("{}%", p.percent),
            agents: p
                .agents
                .iter()
                .map(|a| format!("{} ({})", a.name, a.status))
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Print a vec of Tabled + Serialize items in the chosen mode.
pub fn print_items<T: Tabled + Serialize>(items: &[T], mode: OutputMode) -> anyhow::Result<()> {
    match mode {
        OutputMode::Table => {
            if items.is_empty() {
                println!("(no results)");
            } else {
                let table = Table::new(items).to_string();
                println!("{table}");
            }
        }
        OutputMode::Json => {
            let json = serde_json::to_string_pretty(items)?;
            println!("{json}");
        }
    }
    Ok(())
}

pub fn print_snapshot(snapshot: &SessionSnapshot, mode: OutputMode) -> anyhow::Result<()> {
    let rows: Vec<TeamRow> = snapshot.teams.iter().map(TeamRow::from).collect();
    print_items(&rows, mode)?;

    if mode == OutputMode::Json {
        let json = serde_json::json!({
            "phase": snapshot.phase,
            "run_id": snapshot.run_id,
            "ticker": snapshot.ticker,
            "report_length": snapshot.report_length,
            "sections": snapshot.sections,
            "recommendation": snapshot.recommendation,
            "variant": snapshot.variant,
            "last_error": snapshot.last_error,
            "activity": snapshot.activity,
        });
        println!("{}", serde_json::to_string_pretty(&json)?);
        return Ok(());
    }

    for section in &snapshot.sections {
        println!("\n== {} ==\n{}", section.label, section.body);
    }
    if let Some(label) = &snapshot.recommendation {
        let variant = snapshot.variant.map(|v| v.as_str()).unwrap_or("neutral");
        println!("\nRECOMMENDATION: {} [{}]", label, variant);
    }
    if let Some(err) = &snapshot.last_error {
        println!("\n\x1b[31m✗ {}\x1b[0m", err);
    }
    Ok(())
}

fn today() -> String {
    chrono::Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Options for `tradeboard run`
pub struct RunArgs {
    pub ticker: Option<String>,
    pub date: Option<String>,
    pub analysts: Vec<String>,
    pub depth: Option<u32>,
    pub length: Option<String>,
    pub ws_url: Option<String>,
    pub export_dir: Option<PathBuf>,
}

/// Follow one run to the end. Returns the phase the session settled in.
pub async fn run_analysis(
    mut config: AppConfig,
    args: RunArgs,
    mode: OutputMode,
) -> Result<SessionPhase> {
    if let Some(url) = args.ws_url {
        config.backend.ws_url = Some(url);
    }
    if !args.analysts.is_empty() {
        config.run.analysts = args.analysts;
    }
    if let Some(depth) = args.depth {
        config.run.research_depth = depth;
    }
    if let Some(length) = args.length {
        config.run.report_length = length;
    }

    let date = args.date.unwrap_or_else(today);
    let request = config.run.request(args.ticker.as_deref(), &date)?;
    let connector = match config.backend.connect_timeout() {
        Some(limit) => WsConnector::with_connect_timeout(limit),
        None => WsConnector::new(),
    };

    let mut controller = SessionController::new(Arc::new(connector), config.session_settings()?);
    let updates = controller.subscribe();
    let printer = tokio::spawn(follow_updates(updates, mode));

    info!(
        "Requesting {} analysis of {} for {} with [{}]",
        request.report_length(),
        request.ticker(),
        request.analysis_date_iso(),
        request
            .analysts()
            .iter()
            .map(AnalystKind::label)
            .collect::<Vec<_>>()
            .join(", ")
    );

    if let Err(e) = controller.start(request).await {
        warn!("Run did not start: {}", e);
    } else {
        let interrupted = tokio::select! {
            _ = controller.run_until_settled() => false,
            _ = signal::ctrl_c() => true,
        };
        if interrupted {
            info!("Interrupted, stopping analysis");
            controller.stop();
        }
    }

    let snapshot = controller.snapshot();
    if let Some(dir) = args.export_dir.as_deref() {
        match controller.export(config.export) {
            Some(doc) => {
                let path = write_export(&doc, dir)?;
                info!("Report exported to {}", path.display());
            }
            None => warn!("No report to export"),
        }
    }

    drop(controller);
    let _ = printer.await;

    print_snapshot(&snapshot, mode)?;
    Ok(snapshot.phase)
}

async fn follow_updates(mut updates: mpsc::UnboundedReceiver<SessionUpdate>, mode: OutputMode) {
    if mode == OutputMode::Json {
        while updates.recv().await.is_some() {}
        return;
    }

    while let Some(update) = updates.recv().await {
        match update {
            SessionUpdate::Phase(t) => println!("[{}] {} -> {}", t.timestamp.format("%H:%M:%S"), t.from, t.to),
            SessionUpdate::Teams(progress) => {
                let line = progress
                    .iter()
                    .map(|p| format!("{} {}/{}", p.team.title(), p.completed, p.total))
                    .collect::<Vec<_>>()
                    .join(" | ");
                println!("  {}", line);
            }
            SessionUpdate::Report(sections) => {
                if let Some(last) = sections.last() {
                    println!("  report: {} section(s), latest '{}'", sections.len(), last.label);
                }
            }
            SessionUpdate::Recommendation(label) => println!("  recommendation: {}", label),
            SessionUpdate::Error(message) => println!("\x1b[31m  ✗ {}\x1b[0m", message),
        }
    }
}

fn write_export(doc: &ExportDocument, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(doc.file_name());
    std::fs::write(&path, doc.render_text())?;
    Ok(path)
}

pub fn summarize_file(
    file: &Path,
    full: bool,
    recommendation: Option<&str>,
    html: bool,
) -> Result<String> {
    let text = std::fs::read_to_string(file)?;
    let summary = if full {
        summarize_report(&text, recommendation)
    } else {
        summarize_section(&text, SummaryMode::Live)
    };
    Ok(if html { render_html(&summary) } else { summary })
}

pub fn export_file(
    file: &Path,
    meta: ExportMeta,
    recommendation: Option<&str>,
    config: &AppConfig,
    out: Option<&Path>,
) -> Result<Option<PathBuf>> {
    let text = std::fs::read_to_string(file)?;
    let body = export_body(&text, meta.report_length, recommendation);
    let doc = ExportDocument::build(&body, meta, config.export);
    match out {
        Some(dir) => write_export(&doc, dir).map(Some),
        None => {
            println!("{}", doc.render_text());
            Ok(None)
        }
    }
}

pub fn show_endpoint(config: &AppConfig, origin: Option<&str>) -> Result<String> {
    match origin {
        Some(origin) => Ok(resolve_endpoint(&PageOrigin::parse(origin)?)),
        None => config.backend.endpoint(),
    }
}

/// Parse a `short`/`long` flag value
pub fn parse_length(value: &str) -> Result<ReportLength> {
    ReportLength::try_from(value).map_err(|e| match e {
        BoardError::Validation(msg) => BoardError::Validation(format!("--length: {}", msg)),
        other => other,
    })
}
