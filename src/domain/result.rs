use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// 單頁抓取結果
#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: String,
    pub records: Vec<serde_json::Value>,
    pub record_count: usize,
    pub response_size: usize,
    /// 回應標頭（名稱小寫），LinkHeader 分頁從這裡取下一頁網址
    pub headers: HashMap<String, String>,
    pub url: String,
}

impl FetchResult {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// 多頁彙整結果；建立後不再變動
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedFetchResult {
    pub pages: Vec<FetchResult>,
    pub total_pages: usize,
    pub total_records: usize,
    pub success: bool,
    pub error_message: Option<String>,
    pub total_elapsed: Duration,
    pub page_elapsed: Vec<Duration>,
    /// 達到頁數上限而停止，可能還有資料
    pub max_pages_reached: bool,
}

impl PaginatedFetchResult {
    pub fn records(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.pages.iter().flat_map(|page| page.records.iter())
    }

    pub fn last_page(&self) -> Option<&FetchResult> {
        self.pages.last()
    }
}
