//! 領域層：來源、分頁設定、抓取結果與 ports（介面）

pub mod model;
pub mod pagination;
pub mod ports;
pub mod result;
