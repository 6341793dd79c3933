use anyhow::{bail, Context};
use api_ingest::config::{Command, LogFormat};
use api_ingest::domain::ports::RecordSink;
use api_ingest::utils::error::ErrorSeverity;
use api_ingest::utils::{logger, validation::Validate};
use api_ingest::{
    ClientFactory, ClientIngestionRunner, CliConfig, FileSourceStore, IngestConfig, IngestError,
    IngestionScheduler, JsonLinesSink, LogSink, RunOutcome, StandardCron,
};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    match cli.log_format {
        LogFormat::Compact => logger::init_cli_logger(cli.verbose),
        LogFormat::Json => logger::init_json_logger(cli.verbose),
    }

    tracing::info!(config = %cli.config.display(), "Starting api-ingest CLI");

    if let Err(e) = execute(cli).await {
        let Some(err) = e.downcast_ref::<IngestError>() else {
            return Err(e);
        };

        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ {:#} (Category: {:?}, Severity: {:?})",
            e,
            err.category(),
            err.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", err.recovery_suggestion());

        eprintln!("❌ {}", err.user_friendly_message());
        eprintln!("💡 建議: {}", err.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match err.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

async fn execute(cli: CliConfig) -> anyhow::Result<()> {
    let config = IngestConfig::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    config.validate()?;

    match cli.command {
        Command::Validate => {
            println!(
                "✅ Configuration is valid: {} source(s), tick every {}s",
                config.sources.len(),
                config.scheduler.tick_interval_seconds
            );
        }
        Command::Run => {
            let scheduler = build_scheduler(&config, config.output_dir());
            let shutdown = CancellationToken::new();

            let signal_token = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("🛑 Ctrl-C received, finishing current work");
                    signal_token.cancel();
                }
            });

            scheduler.run(shutdown).await?;
        }
        Command::Tick => {
            let summary = build_scheduler(&config, config.output_dir())
                .tick(Utc::now())
                .await?;
            println!(
                "⏰ due={} succeeded={} failed={} disabled={}",
                summary.due, summary.succeeded, summary.failed, summary.disabled
            );
        }
        Command::Fetch { source_id, output } => {
            let output_dir = output.or_else(|| config.output_dir());
            let scheduler = build_scheduler(&config, output_dir);
            let (source, outcome) = scheduler.trigger(&source_id, Utc::now()).await?;

            match outcome {
                RunOutcome::Succeeded {
                    pages,
                    records,
                    elapsed,
                    max_pages_reached,
                } => {
                    println!(
                        "✅ {}: {} page(s), {} record(s) in {:.2}s",
                        source.display_name(),
                        pages,
                        records,
                        elapsed.as_secs_f64()
                    );
                    if max_pages_reached {
                        println!("🔶 Page limit reached, more data may be available");
                    }
                }
                RunOutcome::Failed { error } => {
                    bail!(
                        "{} failed ({} consecutive failure(s)): {}",
                        source.display_name(),
                        source.state.consecutive_failures,
                        error
                    );
                }
            }
        }
        Command::Test { source_id } => {
            let source = config
                .source(&source_id)
                .ok_or_else(|| IngestError::config(format!("Unknown source id: {}", source_id)))?;
            let client = ClientFactory::with_default_auth().client_for_source(source)?;

            if client.test_connection(source).await? {
                println!("✅ {} is reachable", source.display_name());
            } else {
                bail!("{} did not respond successfully", source.display_name());
            }
        }
    }

    Ok(())
}

fn build_scheduler(config: &IngestConfig, output_dir: Option<PathBuf>) -> IngestionScheduler {
    let sink: Arc<dyn RecordSink> = match output_dir {
        Some(dir) => Arc::new(JsonLinesSink::new(dir)),
        None => Arc::new(LogSink),
    };
    let runner = ClientIngestionRunner::new(ClientFactory::with_default_auth(), sink);
    let store = FileSourceStore::new(config.sources.clone(), config.state_path());

    IngestionScheduler::new(
        Arc::new(store),
        Arc::new(runner),
        Arc::new(StandardCron),
        config.scheduler_config(),
    )
}
