use crate::domain::pagination::PaginationConfig;
use crate::utils::error::IngestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// 來源宣告的線路協定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolType {
    Rest,
    GraphQL,
}

impl FromStr for ProtocolType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REST" => Ok(ProtocolType::Rest),
            "GRAPHQL" => Ok(ProtocolType::GraphQL),
            _ => Err(IngestError::UnsupportedProtocol {
                protocol: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolType::Rest => write!(f, "REST"),
            ProtocolType::GraphQL => write!(f, "GRAPHQL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationType {
    #[default]
    None,
    Offset,
    Page,
    Cursor,
    #[serde(alias = "linkheader", alias = "link")]
    LinkHeader,
}

impl FromStr for PaginationType {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "none" | "" => Ok(PaginationType::None),
            "offset" => Ok(PaginationType::Offset),
            "page" => Ok(PaginationType::Page),
            "cursor" => Ok(PaginationType::Cursor),
            "linkheader" | "link" => Ok(PaginationType::LinkHeader),
            _ => Err(IngestError::InvalidConfigValueError {
                field: "pagination_type".to_string(),
                value: s.to_string(),
                reason: "Expected one of: none, offset, page, cursor, link_header".to_string(),
            }),
        }
    }
}

impl fmt::Display for PaginationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PaginationType::None => "none",
            PaginationType::Offset => "offset",
            PaginationType::Page => "page",
            PaginationType::Cursor => "cursor",
            PaginationType::LinkHeader => "link_header",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

/// 認證描述：對分頁引擎而言是不透明的，由 `AuthApplier` 解讀
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub auth_type: String,
    #[serde(default)]
    pub credentials: HashMap<String, String>,
}

/// 排程與失敗追蹤狀態，排程器每次執行後寫回
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceState {
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_successful_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_runs_count: u64,
}

/// 一個外部 API 來源的完整設定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_protocol_type")]
    pub protocol_type: String,
    pub endpoint: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub auth: Option<AuthConfig>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    #[serde(default)]
    pub graphql_query: Option<String>,
    #[serde(default)]
    pub graphql_variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub response_path: Option<String>,
    #[serde(default)]
    pub pagination_type: PaginationType,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub schedule: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub state: SourceState,
}

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

fn default_protocol_type() -> String {
    "REST".to_string()
}

fn default_enabled() -> bool {
    true
}

impl Source {
    pub fn new(id: impl Into<String>, protocol_type: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            protocol_type: protocol_type.into(),
            endpoint: endpoint.into(),
            method: HttpMethod::default(),
            auth: None,
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
            graphql_query: None,
            graphql_variables: serde_json::Map::new(),
            response_path: None,
            pagination_type: PaginationType::None,
            pagination: PaginationConfig::default(),
            rate_limit_per_minute: None,
            timeout_seconds: None,
            schedule: None,
            enabled: true,
            state: SourceState::default(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    pub fn protocol(&self) -> Result<ProtocolType, IngestError> {
        self.protocol_type.parse()
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECONDS))
    }

    /// 啟用、有排程，且下次執行時間未設定或已到期
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled
            && self.schedule.as_deref().is_some_and(|s| !s.trim().is_empty())
            && self.state.next_run_at.map_or(true, |next| next <= now)
    }
}
