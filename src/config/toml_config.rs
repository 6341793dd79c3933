use crate::core::cron::StandardCron;
use crate::core::scheduler::{SchedulerConfig, DEFAULT_MAX_CONSECUTIVE_FAILURES};
use crate::domain::model::{PaginationType, ProtocolType, Source};
use crate::domain::ports::CronEvaluator;
use crate::utils::error::{IngestError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

const DEFAULT_STATE_PATH: &str = "./state/sources.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub scheduler: SchedulerSection,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSection {
    pub tick_interval_seconds: u64,
    pub max_consecutive_failures: u32,
    pub state_path: Option<String>,
    /// 設定後成功的抓取結果寫成 JSONL
    pub output_dir: Option<String>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            tick_interval_seconds: 60,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
            state_path: None,
            output_dir: None,
        }
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("env pattern is valid"))
}

impl IngestConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IngestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${API_TOKEN})；未設定的變數保持原樣
    fn substitute_env_vars(content: &str) -> String {
        env_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_positive_number(
            "scheduler.tick_interval_seconds",
            self.scheduler.tick_interval_seconds,
            1,
        )?;
        validate_positive_number(
            "scheduler.max_consecutive_failures",
            self.scheduler.max_consecutive_failures as u64,
            1,
        )?;

        let mut seen = HashSet::new();
        for source in &self.sources {
            validate_non_empty_string("sources.id", &source.id)?;
            if !seen.insert(source.id.as_str()) {
                return Err(IngestError::InvalidConfigValueError {
                    field: "sources.id".to_string(),
                    value: source.id.clone(),
                    reason: "Source ids must be unique".to_string(),
                });
            }
            validate_source(source)?;
        }

        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            tick_interval: Duration::from_secs(self.scheduler.tick_interval_seconds),
            max_consecutive_failures: self.scheduler.max_consecutive_failures,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(
            self.scheduler
                .state_path
                .as_deref()
                .unwrap_or(DEFAULT_STATE_PATH),
        )
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        self.scheduler.output_dir.as_ref().map(PathBuf::from)
    }

    pub fn source(&self, source_id: &str) -> Option<&Source> {
        self.sources.iter().find(|source| source.id == source_id)
    }
}

fn validate_source(source: &Source) -> Result<()> {
    let field = |name: &str| format!("sources.{}.{}", source.id, name);

    validate_url(&field("endpoint"), &source.endpoint)?;
    let protocol: ProtocolType = source.protocol()?;

    let pagination = &source.pagination;
    validate_positive_number(&field("pagination.limit"), pagination.limit as u64, 1)?;
    validate_positive_number(&field("pagination.max_pages"), pagination.max_pages as u64, 1)?;

    if let Some(rate) = source.rate_limit_per_minute {
        validate_positive_number(&field("rate_limit_per_minute"), rate as u64, 1)?;
    }
    if let Some(timeout) = source.timeout_seconds {
        validate_positive_number(&field("timeout_seconds"), timeout, 1)?;
    }

    match protocol {
        ProtocolType::GraphQL => {
            let query = source
                .graphql_query
                .as_deref()
                .ok_or_else(|| IngestError::MissingConfigError {
                    field: field("graphql_query"),
                })?;
            validate_non_empty_string(&field("graphql_query"), query)?;

            if matches!(
                source.pagination_type,
                PaginationType::Page | PaginationType::LinkHeader
            ) {
                return Err(IngestError::UnsupportedPagination {
                    protocol: protocol.to_string(),
                    pagination: source.pagination_type.to_string(),
                });
            }
        }
        ProtocolType::Rest => {
            if source.pagination_type == PaginationType::Cursor && pagination.cursor_path.is_none() {
                return Err(IngestError::MissingConfigError {
                    field: field("pagination.cursor_path"),
                });
            }
        }
    }

    if let Some(schedule) = source.schedule.as_deref().filter(|s| !s.trim().is_empty()) {
        StandardCron.validate(schedule)?;
    }

    Ok(())
}

impl Validate for IngestConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
