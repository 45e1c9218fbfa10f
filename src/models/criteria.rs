//! 查询条件
//!
//! `SearchRequest` 是调用方提供的原始输入，`SearchCriteria` 是校验后的结果。
//! 不合法或缺失的条件在任何页面交互之前被拒绝。

use std::fmt::{self, Display};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// 门户使用的日期格式
pub const DATE_FORMAT: &str = "%Y/%m/%d";

static CASE_NUMBER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z0-9]{2}-[A-Z0-9]{5}$").expect("案号正则合法"));

/// 案号，例如 `AB-12345`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseNumber(String);

impl CaseNumber {
    pub fn parse(raw: &str) -> AppResult<Self> {
        if CASE_NUMBER_PATTERN.is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(AppError::invalid_input(format!("案号格式错误: {:?}", raw)))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CaseNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 公告日期分类
///
/// 门户上有两个互斥的单选按钮，语义不同，由调用方指定。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnouncementDateKind {
    /// 公告日期
    #[default]
    Publish,
    /// 公告通知日期
    Notice,
}

impl AnnouncementDateKind {
    pub fn parse(raw: &str) -> AppResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "publish" => Ok(Self::Publish),
            "notice" => Ok(Self::Notice),
            other => Err(AppError::invalid_input(format!(
                "未知的公告日期分类: {:?} (可选 publish / notice)",
                other
            ))),
        }
    }
}

/// 日期区间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub kind: AnnouncementDateKind,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate, kind: AnnouncementDateKind) -> AppResult<Self> {
        if start > end {
            return Err(AppError::invalid_input(format!(
                "起始日期 {} 晚于结束日期 {}",
                format_date(start),
                format_date(end)
            )));
        }
        Ok(Self { start, end, kind })
    }

    /// 起止均为同一天
    pub fn single_day(day: NaiveDate, kind: AnnouncementDateKind) -> Self {
        Self {
            start: day,
            end: day,
            kind,
        }
    }
}

/// 调用方提供的原始查询输入
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    pub case_number: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub date_kind: Option<String>,
}

/// 校验后的查询条件，每次查询只有一种模式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCriteria {
    ByCaseNumber(CaseNumber),
    ByDateRange(DateRange),
}

impl SearchCriteria {
    /// 校验原始输入
    ///
    /// 同时提供案号和日期时以案号为准；两者都没有则拒绝。
    pub fn from_request(request: &SearchRequest, today: NaiveDate) -> AppResult<Self> {
        if let Some(raw) = non_empty(&request.case_number) {
            return Ok(Self::ByCaseNumber(CaseNumber::parse(raw)?));
        }

        match (non_empty(&request.date_start), non_empty(&request.date_end)) {
            (None, None) => Err(AppError::invalid_input("未提供案号或日期区间")),
            (start, end) => {
                // 只给一端时视为单日查询
                let start_raw = start.or(end).unwrap_or_default();
                let end_raw = end.or(start).unwrap_or_default();
                let start = parse_date(start_raw, today)?;
                let end = parse_date(end_raw, today)?;
                let kind = match non_empty(&request.date_kind) {
                    Some(raw) => AnnouncementDateKind::parse(raw)?,
                    None => AnnouncementDateKind::default(),
                };
                Ok(Self::ByDateRange(DateRange::new(start, end, kind)?))
            }
        }
    }
}

impl Display for SearchCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchCriteria::ByCaseNumber(case) => write!(f, "案号 {}", case),
            SearchCriteria::ByDateRange(range) => write!(
                f,
                "日期 {} ~ {} ({:?})",
                format_date(range.start),
                format_date(range.end),
                range.kind
            ),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 解析 `YYYY/MM/DD`，也接受 `today`
pub fn parse_date(raw: &str, today: NaiveDate) -> AppResult<NaiveDate> {
    if raw.eq_ignore_ascii_case("today") {
        return Ok(today);
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|_| AppError::invalid_input(format!("日期格式错误 (需为 YYYY/MM/DD): {:?}", raw)))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// 本地时区的今天
pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}
