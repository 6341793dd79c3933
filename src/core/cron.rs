use crate::domain::ports::CronEvaluator;
use crate::utils::error::{IngestError, Result};
use chrono::{DateTime, Utc};
use ::cron::Schedule;
use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

const WEEKDAYS: [&str; 8] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

/// 標準 cron 評估器。
///
/// 5 欄位運算式（分 時 日 月 週）補上秒數 0；星期欄位的數字 0-7 轉成名稱，
/// 0 與 7 都代表星期日。日與星期兩個欄位都有限制時，任一符合即觸發。
/// 6/7 欄位運算式直接交給 `cron` crate。
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCron;

fn number_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\d+").expect("number pattern is valid"))
}

fn sunday_range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)-7(?:/(\d+))?$").expect("sunday range pattern is valid")
    })
}

/// `N-7` 與 `N-7/S` 展開成名稱清單；`cron` crate 的星期順序從 SUN 開始，不接受 `MON-SUN`
fn expand_sunday_range(item: &str) -> Option<String> {
    let caps = sunday_range_pattern().captures(item)?;
    let start: usize = caps[1].parse().ok()?;
    let step: usize = caps.get(2).map_or(Some(1), |m| m.as_str().parse().ok())?;
    if start > 7 || step == 0 {
        return None;
    }

    let mut days: Vec<usize> = (start..=7).step_by(step).map(|day| day % 7).collect();
    days.sort_unstable();
    days.dedup();
    Some(
        days.iter()
            .map(|day| WEEKDAYS[*day])
            .collect::<Vec<_>>()
            .join(","),
    )
}

fn weekday_names(field: &str) -> String {
    field
        .split(',')
        .map(|item| {
            if let Some(expanded) = expand_sunday_range(item) {
                return expanded;
            }
            // 步進值（*/2、1-5/2）的分母保持數字
            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };
            let base = number_pattern().replace_all(base, |caps: &regex::Captures| {
                caps[0]
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| WEEKDAYS.get(n))
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| caps[0].to_string())
            });
            match step {
                Some(step) => format!("{}/{}", base, step),
                None => base.into_owned(),
            }
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// `*` 開頭（含 `*/N`）或 `?` 視為未限制
fn is_restricted(field: &str) -> bool {
    !(field.starts_with('*') || field == "?")
}

impl StandardCron {
    pub fn normalize(expression: &str) -> String {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() == 5 {
            format!(
                "0 {} {} {} {} {}",
                fields[0],
                fields[1],
                fields[2],
                fields[3],
                weekday_names(fields[4])
            )
        } else {
            fields.join(" ")
        }
    }

    /// 5 欄位運算式的日與星期都有限制時拆成兩個排程（只限日、只限星期）
    pub fn parse(expression: &str) -> Result<Vec<Schedule>> {
        let normalized = Self::normalize(expression);
        let fields: Vec<&str> = normalized.split_whitespace().collect();

        let expressions = if expression.split_whitespace().count() == 5
            && is_restricted(fields[3])
            && is_restricted(fields[5])
        {
            let day_of_month = format!("{} {} {} {} {} *", fields[0], fields[1], fields[2], fields[3], fields[4]);
            let day_of_week = format!("{} {} {} * {} {}", fields[0], fields[1], fields[2], fields[4], fields[5]);
            vec![day_of_month, day_of_week]
        } else {
            vec![normalized]
        };

        expressions
            .iter()
            .map(|expr| {
                Schedule::from_str(expr).map_err(|e| IngestError::CronError {
                    expression: expression.to_string(),
                    message: e.to_string(),
                })
            })
            .collect()
    }
}

impl CronEvaluator for StandardCron {
    fn next_after(&self, expression: &str, after: DateTime<Utc>) -> Result<DateTime<Utc>> {
        Self::parse(expression)?
            .iter()
            .filter_map(|schedule| schedule.after(&after).next())
            .min()
            .ok_or_else(|| IngestError::CronError {
                expression: expression.to_string(),
                message: "expression never fires again".to_string(),
            })
    }
}
