//! 查询流程 - 流程层
//!
//! 填写查询条件、提交、按横幅对结果分类。

use chrono::NaiveDate;
use tracing::{error, info};

use crate::error::AppResult;
use crate::models::{Banner, BannerKind, SearchCriteria, SearchRequest, SearchResult};
use crate::portal::selectors::{NOT_FOUND_TEXT, SUCCESS_TITLE};
use crate::portal::{DateField, Portal, QueryMode};
use crate::services::Diagnostics;

/// 按横幅类别与文字分类
///
/// 成功与错误横幅共用样式，先看类别再精确匹配文字。
pub fn classify_banner(banner: &Banner) -> SearchResult {
    let text = banner.text.trim();
    match banner.kind {
        BannerKind::Success if text == SUCCESS_TITLE => SearchResult::Success { rows_present: false },
        BannerKind::Error if text == NOT_FOUND_TEXT => SearchResult::NotFound {
            message: text.to_string(),
        },
        kind => SearchResult::Unexpected {
            raw_page_state: format!("{:?}: {}", kind, text),
        },
    }
}

/// 查询流程
pub struct SearchFlow {
    diagnostics: Diagnostics,
}

impl SearchFlow {
    pub fn new(diagnostics: Diagnostics) -> Self {
        Self { diagnostics }
    }

    /// 从原始输入开始查询，输入不合法时不触碰页面
    pub async fn perform_request<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        request: &SearchRequest,
        today: NaiveDate,
    ) -> AppResult<SearchResult> {
        let criteria = SearchCriteria::from_request(request, today)?;
        self.perform(portal, &criteria).await
    }

    /// 在查询主画面上执行一次查询
    ///
    /// # 参数
    /// - `portal`: 停在查询主画面的门户会话
    /// - `criteria`: 已校验的查询条件
    ///
    /// # 返回
    /// 按横幅分类的结果；`Unexpected` 不是错误，由调用方决定如何处理
    pub async fn perform<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        criteria: &SearchCriteria,
    ) -> AppResult<SearchResult> {
        info!("🔍 查询: {}", criteria);

        match criteria {
            SearchCriteria::ByDateRange(range) => {
                portal.select_query_mode(QueryMode::ByDate).await?;
                // 弹窗关闭后表单才算就绪
                portal.pick_date(DateField::Start, range.start).await?;
                portal.pick_date(DateField::End, range.end).await?;
                portal.select_date_kind(range.kind).await?;
            }
            SearchCriteria::ByCaseNumber(case_number) => {
                portal.select_query_mode(QueryMode::ByCaseNumber).await?;
                portal.enter_case_number(case_number).await?;
            }
        }

        portal.submit_search().await?;
        let banner = portal.result_banner().await?;

        let result = match classify_banner(&banner) {
            SearchResult::Success { .. } => {
                let rows_present = !portal.list_rows().await?.is_empty();
                info!("✓ 查询成功，本页{}可勾选资料", if rows_present { "有" } else { "无" });
                SearchResult::Success { rows_present }
            }
            SearchResult::NotFound { message } => {
                info!("查询无结果: {}", message);
                SearchResult::NotFound { message }
            }
            SearchResult::Unexpected { raw_page_state } => {
                error!("❌ 无法识别的查询结果: {}", raw_page_state);
                self.diagnostics.capture(portal, "unexpected_result").await;
                SearchResult::Unexpected { raw_page_state }
            }
        };

        Ok(result)
    }
}
