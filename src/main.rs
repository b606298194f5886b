use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use tradeboard::cli::{self, Cli, Commands, OutputMode, RunArgs};
use tradeboard::config::AppConfig;
use tradeboard::domain::SessionPhase;
use tradeboard::error::Result;
use tradeboard::report::ExportMeta;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mode = OutputMode::from_json_flag(cli.json);

    let config = match AppConfig::load_from(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: failed to load config from {} ({}), using defaults", cli.config.display(), e);
            AppConfig::default_config()
        }
    };

    match cli.command {
        Commands::Run {
            ticker,
            date,
            analysts,
            depth,
            length,
            ws_url,
            export_dir,
        } => {
            init_logging(&config);
            if let Err(problems) = config.validate() {
                for problem in &problems {
                    error!("Invalid configuration: {}", problem);
                }
                std::process::exit(2);
            }

            let args = RunArgs {
                ticker,
                date,
                analysts,
                depth,
                length,
                ws_url,
                export_dir,
            };
            let phase = cli::run_analysis(config, args, mode).await?;
            if phase == SessionPhase::Errored {
                std::process::exit(1);
            }
        }
        Commands::Summarize {
            file,
            full,
            recommendation,
            html,
        } => {
            init_logging_simple();
            let summary = cli::summarize_file(&file, full, recommendation.as_deref(), html)?;
            println!("{}", summary);
        }
        Commands::Export {
            file,
            ticker,
            date,
            length,
            recommendation,
            out,
        } => {
            init_logging_simple();
            let meta = ExportMeta {
                ticker: ticker.trim().to_uppercase(),
                analysis_date: date,
                report_length: cli::parse_length(&length)?,
            };
            if let Some(path) =
                cli::export_file(&file, meta, recommendation.as_deref(), &config, out.as_deref())?
            {
                println!("Exported to {}", path.display());
            }
        }
        Commands::Endpoint { origin } => {
            init_logging_simple();
            println!("{}", cli::show_endpoint(&config, origin.as_deref())?);
        }
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("{},tradeboard=debug", config.logging.level))
    });

    // File logging only when TRADEBOARD_LOG_DIR is set and writable
    let log_dir = std::env::var("TRADEBOARD_LOG_DIR").ok();

    // `rolling::daily` panics if it cannot create the first file, so probe first
    let file_layer = log_dir.as_deref().and_then(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Could not create log directory {} ({}), file logging disabled",
                log_dir, e
            );
            return None;
        }
        let probe = std::path::Path::new(log_dir).join(".tradeboard_write_test");
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&probe)
        {
            Ok(_) => {
                let _ = std::fs::remove_file(&probe);

                let file_appender = tracing_appender::rolling::daily(log_dir, "tradeboard.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

                // Lives for the whole process
                Box::leak(Box::new(guard));

                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true),
                )
            }
            Err(e) => {
                eprintln!(
                    "Warning: Could not write to log directory {} ({}), file logging disabled",
                    log_dir, e
                );
                None
            }
        }
    });

    let file_logging_enabled = file_layer.is_some();

    if config.logging.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .init();
    }

    if let Some(dir) = log_dir.filter(|_| file_logging_enabled) {
        eprintln!("Logging to: {}/tradeboard.log", dir);
    }
}

fn init_logging_simple() {
    // Minimal logging for one-shot commands
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .try_init();
}
