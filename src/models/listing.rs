//! 查询结果列表相关的数据结构

use std::collections::HashSet;
use std::fmt::{self, Display};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// 结果横幅的样式类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Success,
    Error,
}

/// 查询提交后出现的成功或错误横幅
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

/// 一次查询提交的分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResult {
    Success { rows_present: bool },
    NotFound { message: String },
    Unexpected { raw_page_state: String },
}

impl SearchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SearchResult::Success { .. })
    }
}

/// 当前在结果列表中的位置
///
/// 回到主画面后失效，重新查询时必须重新计算。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub current_page: u32,
    pub total_pages: u32,
}

impl PageCursor {
    pub fn is_last(&self) -> bool {
        self.current_page >= self.total_pages
    }
}

impl Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[第 {}/{} 页]", self.current_page, self.total_pages)
    }
}

static PAGE_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*/\s*(\d+)").expect("页码正则合法"));

/// 解析页码指示文字，例如 `第 2 / 5 頁`
///
/// 没有任何数据时门户显示 `0 / 0`，按单页处理。
pub fn parse_page_indicator(text: &str) -> Option<PageCursor> {
    let caps = PAGE_INDICATOR.captures(text)?;
    let current: u32 = caps.get(1)?.as_str().parse().ok()?;
    let total: u32 = caps.get(2)?.as_str().parse().ok()?;
    Some(PageCursor {
        current_page: current.max(1),
        total_pages: total.max(1),
    })
}

/// 行上的 CSS 类名中表示已勾选的标记
const SELECTED_ROW_CLASSES: [&str; 3] = ["selected", "checked", "row_checked"];

/// 勾选框旁标签中表示已勾选的文字
const SELECTED_LABEL_MARKERS: [&str; 2] = ["已選取", "已勾選"];

/// 页面上一个可勾选行的 DOM 快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSnapshot {
    /// 行标识：勾选框的 value 属性，其次是元素 id，都没有时为 `#序号`
    pub id: String,
    /// 原生 checked 属性
    pub checked: bool,
    /// 所在 `<tr>` 的 className
    #[serde(default)]
    pub row_class: String,
    /// 关联 `<label>` 的文字
    #[serde(default)]
    pub label: Option<String>,
}

impl RowSnapshot {
    /// 依次检查原生勾选、行样式、标签文字，任一为真即视为已勾选
    pub fn is_selected(&self) -> bool {
        if self.checked {
            return true;
        }
        if self
            .row_class
            .split_whitespace()
            .any(|class| SELECTED_ROW_CLASSES.contains(&class))
        {
            return true;
        }
        self.label
            .as_deref()
            .is_some_and(|label| SELECTED_LABEL_MARKERS.iter().any(|m| label.contains(m)))
    }
}

/// 单页的勾选状态，按 DOM 顺序保存
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionState {
    rows: Vec<(String, bool)>,
}

impl SelectionState {
    /// 行标识重复时无法区分要点击哪一行，按页面契约错误处理
    pub fn from_rows(rows: &[RowSnapshot]) -> AppResult<Self> {
        let mut seen = HashSet::new();
        for row in rows {
            if !seen.insert(row.id.as_str()) {
                return Err(AppError::contract(format!("勾选框标识重复: {:?}", row.id)));
            }
        }
        Ok(Self {
            rows: rows.iter().map(|row| (row.id.clone(), row.is_selected())).collect(),
        })
    }

    /// 尚未勾选的行
    pub fn unselected(&self) -> Vec<&str> {
        self.rows
            .iter()
            .filter(|(_, selected)| !*selected)
            .map(|(id, _)| id.as_str())
            .collect()
    }

    pub fn is_selected(&self, id: &str) -> Option<bool> {
        self.rows.iter().find(|(row_id, _)| row_id == id).map(|(_, selected)| *selected)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
