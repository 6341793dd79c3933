use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Unsupported protocol type: '{protocol}' (expected REST or GRAPHQL)")]
    UnsupportedProtocol { protocol: String },

    #[error("Pagination type '{pagination}' is not supported for {protocol} sources")]
    UnsupportedPagination { protocol: String, pagination: String },

    #[error("Invalid cron expression '{expression}': {message}")]
    CronError { expression: String, message: String },

    #[error("Transport error{}: {message}", status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default())]
    TransportError { status: Option<u16>, message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Source state store error: {message}")]
    StoreError { message: String },

    #[error("Ingestion cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Transport,
    Protocol,
    Storage,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl IngestError {
    pub fn config(message: impl Into<String>) -> Self {
        IngestError::ConfigError {
            message: message.into(),
        }
    }

    pub fn transport(status: Option<u16>, message: impl Into<String>) -> Self {
        IngestError::TransportError {
            status,
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        IngestError::ProtocolError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            IngestError::ConfigError { .. }
            | IngestError::ConfigValidationError { .. }
            | IngestError::InvalidConfigValueError { .. }
            | IngestError::MissingConfigError { .. }
            | IngestError::UnsupportedProtocol { .. }
            | IngestError::UnsupportedPagination { .. }
            | IngestError::CronError { .. } => ErrorCategory::Configuration,
            IngestError::HttpError(_) | IngestError::TransportError { .. } => {
                ErrorCategory::Transport
            }
            IngestError::ProtocolError { .. } | IngestError::SerializationError(_) => {
                ErrorCategory::Protocol
            }
            IngestError::StoreError { .. } | IngestError::IoError(_) => ErrorCategory::Storage,
            IngestError::Cancelled => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Transport => ErrorSeverity::Medium,
            ErrorCategory::Protocol => ErrorSeverity::Medium,
            ErrorCategory::Storage => ErrorSeverity::Critical,
            ErrorCategory::System => ErrorSeverity::Low,
        }
    }

    /// 設定錯誤不重試；傳輸錯誤等待下一個排程週期
    pub fn is_fatal(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            IngestError::UnsupportedProtocol { .. } => {
                "Set protocol_type to either \"REST\" or \"GRAPHQL\""
            }
            IngestError::UnsupportedPagination { .. } => {
                "GraphQL sources support none, offset and cursor pagination only"
            }
            IngestError::MissingConfigError { .. } => {
                "Add the missing field to the source configuration"
            }
            IngestError::CronError { .. } => {
                "Use a standard 5-field cron expression, e.g. \"*/15 * * * *\""
            }
            IngestError::HttpError(_) | IngestError::TransportError { .. } => {
                "Check network connectivity, the endpoint URL and credentials; the source will be retried on its next schedule"
            }
            IngestError::ProtocolError { .. } => {
                "Inspect the upstream response; the query or response_path may be wrong"
            }
            IngestError::StoreError { .. } | IngestError::IoError(_) => {
                "Check that the state file location is writable"
            }
            IngestError::Cancelled => "Re-run the ingestion when ready",
            _ => "Review the configuration file and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Transport => format!("Could not reach the data source: {}", self),
            ErrorCategory::Protocol => format!("The data source returned an unusable response: {}", self),
            ErrorCategory::Storage => format!("Could not persist source state: {}", self),
            ErrorCategory::System => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
