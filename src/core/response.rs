//! 回應解析的共用工具：點號路徑取值、筆數計算、游標與 Link 標頭。

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use url::Url;

/// 依點號路徑（例如 `data.items` 或 `results.0.rows`）取出子樹。
/// 路徑為空時回傳整個值。
pub fn extract_path<'a>(value: &'a Value, path: Option<&str>) -> Option<&'a Value> {
    let path = match path.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => return Some(value),
    };

    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// 陣列取每個元素；單一物件算一筆；不存在或 null 算零筆
pub fn collect_records(value: Option<&Value>) -> Vec<Value> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(other) => vec![other.clone()],
    }
}

/// Relay edges：每個元素都有 `node` 時只保留 node
pub fn unwrap_relay_edges(records: Vec<Value>) -> Vec<Value> {
    let all_edges = !records.is_empty()
        && records
            .iter()
            .all(|r| r.as_object().is_some_and(|o| o.contains_key("node")));

    if !all_edges {
        return records;
    }

    records
        .into_iter()
        .map(|mut edge| edge.get_mut("node").map(Value::take).unwrap_or(Value::Null))
        .collect()
}

/// 游標值轉字串；null、空字串、false 視為沒有下一頁
pub fn cursor_value(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"<([^>]*)>((?:\s*;\s*(?:[^;,"]|"[^"]*")+)*)"#).expect("link header pattern is valid")
    })
}

fn rel_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?i)\brel\s*=\s*(?:"([^"]*)"|([^\s;,]+))"#).expect("rel pattern is valid")
    })
}

/// 從 `<URL>; rel="RELATION"` 格式的標頭找出指定 relation 的網址
pub fn parse_link_header(header: &str, rel: &str) -> Option<String> {
    link_pattern().captures_iter(header).find_map(|caps| {
        let url = caps.get(1)?.as_str().trim();
        let params = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let matches_rel = rel_pattern().captures_iter(params).any(|rel_caps| {
            rel_caps
                .get(1)
                .or_else(|| rel_caps.get(2))
                .map(|m| {
                    m.as_str()
                        .split_whitespace()
                        .any(|value| value.eq_ignore_ascii_case(rel))
                })
                .unwrap_or(false)
        });

        (matches_rel && !url.is_empty()).then(|| url.to_string())
    })
}

/// 相對網址以產生它的請求網址為基準解析
pub fn resolve_link(base: &str, link: &str) -> String {
    match Url::parse(link) {
        Ok(url) => url.to_string(),
        Err(_) => Url::parse(base)
            .and_then(|b| b.join(link))
            .map(|u| u.to_string())
            .unwrap_or_else(|_| link.to_string()),
    }
}

/// GraphQL 頂層 `errors` 陣列不為空時，回傳合併後的錯誤訊息
pub fn graphql_error_message(body: &Value) -> Option<String> {
    let errors = body.get("errors")?.as_array()?;
    if errors.is_empty() {
        return None;
    }

    let messages: Vec<String> = errors
        .iter()
        .map(|error| {
            error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string())
        })
        .collect();

    Some(messages.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_path() {
        let body = json!({
            "data": {"items": [{"id": 1}, {"id": 2}], "meta": {"next": "abc"}},
            "results": [{"rows": [1, 2, 3]}]
        });

        assert_eq!(extract_path(&body, None), Some(&body));
        assert_eq!(extract_path(&body, Some("")), Some(&body));
        assert_eq!(
            extract_path(&body, Some("data.meta.next")),
            Some(&json!("abc"))
        );
        assert_eq!(
            extract_path(&body, Some("results.0.rows")),
            Some(&json!([1, 2, 3]))
        );
        assert_eq!(extract_path(&body, Some("data.missing")), None);
        assert_eq!(extract_path(&body, Some("data.items.x")), None);
    }

    #[test]
    fn test_collect_records() {
        assert_eq!(collect_records(Some(&json!([1, 2, 3]))).len(), 3);
        assert_eq!(collect_records(Some(&json!({"id": 1}))).len(), 1);
        assert!(collect_records(Some(&Value::Null)).is_empty());
        assert!(collect_records(None).is_empty());
        assert!(collect_records(Some(&json!([]))).is_empty());
    }

    #[test]
    fn test_unwrap_relay_edges() {
        let edges = vec![
            json!({"cursor": "a", "node": {"id": 1}}),
            json!({"cursor": "b", "node": {"id": 2}}),
        ];
        assert_eq!(
            unwrap_relay_edges(edges),
            vec![json!({"id": 1}), json!({"id": 2})]
        );

        let plain = vec![json!({"id": 1}), json!({"node": 2})];
        assert_eq!(unwrap_relay_edges(plain.clone()), plain);
    }

    #[test]
    fn test_cursor_value() {
        assert_eq!(cursor_value(Some(&json!("abc"))), Some("abc".to_string()));
        assert_eq!(cursor_value(Some(&json!(42))), Some("42".to_string()));
        assert_eq!(cursor_value(Some(&json!(""))), None);
        assert_eq!(cursor_value(Some(&Value::Null)), None);
        assert_eq!(cursor_value(None), None);
    }

    #[test]
    fn test_parse_link_header() {
        let header = r#"<https://api.github.com/repos?page=2>; rel="next", <https://api.github.com/repos?page=9>; rel="last""#;
        assert_eq!(
            parse_link_header(header, "next"),
            Some("https://api.github.com/repos?page=2".to_string())
        );
        assert_eq!(
            parse_link_header(header, "last"),
            Some("https://api.github.com/repos?page=9".to_string())
        );
        assert_eq!(parse_link_header(header, "prev"), None);
    }

    #[test]
    fn test_parse_link_header_variants() {
        assert_eq!(
            parse_link_header("</items?page=3>; rel=next", "next"),
            Some("/items?page=3".to_string())
        );
        assert_eq!(
            parse_link_header(r#"<https://x.test/a?p=2>; title="more"; rel="next last""#, "last"),
            Some("https://x.test/a?p=2".to_string())
        );
        assert_eq!(
            parse_link_header(r#"<https://x.test/a?p=2>; REL="Next""#, "next"),
            Some("https://x.test/a?p=2".to_string())
        );
        assert_eq!(parse_link_header("", "next"), None);
    }

    #[test]
    fn test_parse_link_header_quoted_params_with_commas() {
        let header = r#"<https://x.test/p2>; title="a, b"; rel="next""#;
        assert_eq!(
            parse_link_header(header, "next"),
            Some("https://x.test/p2".to_string())
        );

        let header = r#"<https://x.test/p1>; title="first; page, one"; rel="prev", <https://x.test/p3>; rel="next""#;
        assert_eq!(
            parse_link_header(header, "next"),
            Some("https://x.test/p3".to_string())
        );
        assert_eq!(
            parse_link_header(header, "prev"),
            Some("https://x.test/p1".to_string())
        );
    }

    #[test]
    fn test_resolve_link() {
        assert_eq!(
            resolve_link("https://api.example.com/v1/items?page=1", "/v1/items?page=2"),
            "https://api.example.com/v1/items?page=2"
        );
        assert_eq!(
            resolve_link("https://api.example.com/v1/items", "https://cdn.example.com/p2"),
            "https://cdn.example.com/p2"
        );
    }

    #[test]
    fn test_graphql_error_message() {
        let body = json!({
            "data": {"users": null},
            "errors": [{"message": "rate limited"}, {"message": "field 'x' missing"}]
        });
        assert_eq!(
            graphql_error_message(&body),
            Some("rate limited; field 'x' missing".to_string())
        );
        assert_eq!(graphql_error_message(&json!({"data": {}, "errors": []})), None);
        assert_eq!(graphql_error_message(&json!({"data": {}})), None);
    }
}
