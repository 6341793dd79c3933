use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "api-ingest")]
#[command(about = "Scheduled REST/GraphQL ingestion with pagination and rate limiting")]
pub struct CliConfig {
    #[arg(long, short, default_value = "ingest.toml")]
    pub config: PathBuf,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// 持續排程直到 Ctrl-C
    Run,
    /// 只執行一次排程檢查
    Tick,
    /// 立即抓取指定來源
    Fetch {
        source_id: String,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// 測試來源的連線與認證
    Test { source_id: String },
    /// 只驗證設定檔
    Validate,
}
