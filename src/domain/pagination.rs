use serde::{Deserialize, Serialize};

/// 單次呼叫最多抓取的頁數，無論設定為何都不可超過
pub const SYSTEM_MAX_PAGES: u32 = 1000;

pub const DEFAULT_DELAY_MS: u64 = 1000;

/// 分頁策略參數
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// 每頁目標筆數
    pub limit: u32,
    pub max_pages: u32,
    /// 未設定每分鐘速率時使用的請求間隔
    pub delay_ms: u64,

    // Offset
    pub offset_param: String,
    pub limit_param: String,

    // Page
    pub page_param: String,
    pub start_page: u32,

    // Cursor (REST)
    pub cursor_param: String,
    pub cursor_path: Option<String>,

    // Cursor (GraphQL)
    pub page_info_path: Option<String>,
    pub first_variable: String,
    pub after_variable: String,

    // LinkHeader
    pub link_rel: String,

    pub stop_on_empty: bool,
    pub stop_on_partial: bool,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            max_pages: 100,
            delay_ms: DEFAULT_DELAY_MS,
            offset_param: "offset".to_string(),
            limit_param: "limit".to_string(),
            page_param: "page".to_string(),
            start_page: 1,
            cursor_param: "cursor".to_string(),
            cursor_path: None,
            page_info_path: None,
            first_variable: "first".to_string(),
            after_variable: "after".to_string(),
            link_rel: "next".to_string(),
            stop_on_empty: true,
            stop_on_partial: true,
        }
    }
}

impl PaginationConfig {
    /// `min(max_pages, SYSTEM_MAX_PAGES)`，至少一頁
    pub fn effective_max_pages(&self) -> usize {
        self.max_pages.clamp(1, SYSTEM_MAX_PAGES) as usize
    }

    /// Offset/Page 迴圈在抓完一頁後是否應該停止
    pub fn is_last_page(&self, record_count: usize) -> bool {
        (self.stop_on_empty && record_count == 0)
            || (self.stop_on_partial && record_count < self.limit as usize)
    }
}
