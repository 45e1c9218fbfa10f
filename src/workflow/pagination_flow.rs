//! 分页勾选流程 - 流程层
//!
//! 逐页勾选所有未勾选的行并保存。保存会让门户回到查询主画面，
//! 所以保存后要重新查询并跳到下一页；本页没有可勾选的行时直接翻页。
//! 每页只访问一次，页码严格递增。

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::{PageCursor, SearchCriteria, SelectionState};
use crate::portal::Portal;
use crate::services::Diagnostics;
use crate::workflow::retry::{with_retry, RetryPolicy};
use crate::workflow::search_flow::SearchFlow;

/// 分页处理的统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationReport {
    /// 按访问顺序记录的页码
    pub visited_pages: Vec<u32>,
    /// 执行过保存的页码
    pub saved_pages: Vec<u32>,
    /// 本次勾选的行数
    pub selected_rows: usize,
}

/// 分页勾选流程
pub struct PaginationFlow<'a> {
    search: &'a SearchFlow,
    diagnostics: Diagnostics,
    retry: RetryPolicy,
    row_settle_delay: Duration,
}

impl<'a> PaginationFlow<'a> {
    pub fn new(
        search: &'a SearchFlow,
        diagnostics: Diagnostics,
        retry: RetryPolicy,
        row_settle_delay: Duration,
    ) -> Self {
        Self {
            search,
            diagnostics,
            retry,
            row_settle_delay,
        }
    }

    /// 从当前结果页开始处理到最后一页，最后回到主画面
    ///
    /// `criteria` 用于保存后重新查询，必须与产生当前结果的查询一致。
    pub async fn run<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        criteria: &SearchCriteria,
    ) -> AppResult<PaginationReport> {
        let mut cursor = with_retry!(self.retry, "读取页码", portal.page_cursor())?;
        info!("📄 共 {} 页", cursor.total_pages);

        let mut report = PaginationReport::default();
        loop {
            let page = cursor.current_page;
            report.visited_pages.push(page);

            let selected = self.select_page(portal, cursor).await?;
            if selected > 0 {
                self.save_page(portal, cursor).await?;
                info!("{} ✓ 已保存 {} 行", cursor, selected);
                report.saved_pages.push(page);
                report.selected_rows += selected;
            }

            if cursor.is_last() {
                break;
            }

            let target = page + 1;
            let next = if selected > 0 {
                // 保存后已回到主画面，原有位置失效
                self.reenter_at(portal, criteria, target).await?
            } else {
                Some(self.advance_in_place(portal, cursor).await?)
            };

            match next {
                Some(next) => cursor = next,
                None => {
                    warn!("重新查询后结果少于 {} 页，提前结束", target);
                    break;
                }
            }
        }

        with_retry!(self.retry, "回主画面", portal.back_to_main())?;
        info!(
            "✅ 分页处理完成: 访问 {} 页，保存 {} 页，勾选 {} 行",
            report.visited_pages.len(),
            report.saved_pages.len(),
            report.selected_rows
        );
        Ok(report)
    }

    /// 勾选本页所有未勾选的行，返回勾选数量
    async fn select_page<P: Portal + ?Sized>(&self, portal: &mut P, cursor: PageCursor) -> AppResult<usize> {
        let rows = with_retry!(self.retry, "读取勾选框", portal.list_rows())?;
        let state = SelectionState::from_rows(&rows)?;
        let pending = state.unselected();
        info!("{} 共 {} 行，未勾选 {} 行", cursor, state.len(), pending.len());

        for id in &pending {
            // 点击会切换状态，不重试
            let outcome = portal.toggle_row(id).await?;
            debug!("{} 勾选 {}: {:?}", cursor, id, outcome);
            sleep(self.row_settle_delay).await;
        }

        Ok(pending.len())
    }

    /// 保存本页勾选
    ///
    /// 保存会离开结果列表，重复点击不安全：超时后若已回到主画面，视为保存成功。
    async fn save_page<P: Portal + ?Sized>(&self, portal: &mut P, cursor: PageCursor) -> AppResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match portal.save_selections().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if err.is_transient() && portal.on_query_form().await.unwrap_or(false) {
                warn!("{} 保存等待超时，但已回到主画面，视为已保存: {}", cursor, err);
                return Ok(());
            }
            if !self.retry.should_retry(attempt, &err) {
                return Err(err);
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                "{} 保存失败 (尝试 {}/{}): {}，{:?} 后重试",
                cursor, attempt, self.retry.max_attempts, err, delay
            );
            sleep(delay).await;
        }
    }

    /// 原地翻到下一页
    async fn advance_in_place<P: Portal + ?Sized>(&self, portal: &mut P, cursor: PageCursor) -> AppResult<PageCursor> {
        let target = cursor.current_page + 1;
        let mut attempt = 0;
        let mut click = true;
        loop {
            attempt += 1;
            let clicked = if click { portal.next_page().await } else { Ok(()) };
            // 点击超时不代表没有翻页，以页码为准
            let now = with_retry!(self.retry, "读取页码", portal.page_cursor())?;

            if now.current_page == target {
                debug!("{} → {}", cursor, now);
                return Ok(now);
            }

            let unchanged = now.current_page == cursor.current_page;
            match clicked {
                Err(e) if unchanged && self.retry.should_retry(attempt, &e) => {
                    warn!("{} 翻页失败 (尝试 {}/{}): {}", cursor, attempt, self.retry.max_attempts, e);
                    sleep(self.retry.delay_for(attempt)).await;
                    click = true;
                }
                Err(e) => return Err(e),
                // 点击已生效但页码还没更新，只重读不再点击
                Ok(()) if unchanged && attempt < self.retry.max_attempts => {
                    debug!("{} 页码尚未更新，稍后重读", cursor);
                    sleep(self.retry.delay_for(attempt)).await;
                    click = false;
                }
                Ok(()) => {
                    return Err(AppError::contract(format!(
                        "翻页后应在第 {} 页，实际为 {}",
                        target, now
                    )))
                }
            }
        }
    }

    /// 回到查询页重新查询，并跳到 `target` 页
    ///
    /// 返回 `None` 表示重新查询后总页数已不足 `target`。
    async fn reenter_at<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        criteria: &SearchCriteria,
        target: u32,
    ) -> AppResult<Option<PageCursor>> {
        let mut attempt = 0;
        let err = loop {
            attempt += 1;
            match self.try_reenter(portal, criteria, target).await {
                Ok(cursor) => return Ok(cursor),
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "[第 {} 页] 重新进入失败 (尝试 {}/{}): {}，{:?} 后重试",
                        target, attempt, self.retry.max_attempts, e, delay
                    );
                    sleep(delay).await;
                }
                Err(e) => break e,
            }
        };

        // 最后一次补救：重新载入页面，检查是否其实已经到达目标页
        warn!("[第 {} 页] 重新进入失败: {}，重新载入后检查", target, err);
        self.diagnostics.capture(portal, "reenter_failed").await;
        match self.reload_and_check(portal).await {
            Ok(cursor) if cursor.current_page == target => {
                info!("[第 {} 页] 重新载入后已在目标页，继续处理", target);
                Ok(Some(cursor))
            }
            Ok(cursor) => {
                warn!("[第 {} 页] 重新载入后位于 {}，放弃", target, cursor);
                Err(err)
            }
            Err(e) => {
                warn!("[第 {} 页] 重新载入失败: {}", target, e);
                Err(err)
            }
        }
    }

    async fn try_reenter<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        criteria: &SearchCriteria,
        target: u32,
    ) -> AppResult<Option<PageCursor>> {
        portal.open_bulletin().await?;

        let result = self.search.perform(portal, criteria).await?;
        if !result.is_success() {
            return Err(AppError::contract(format!("重新查询结果异常: {:?}", result)));
        }

        let fresh = portal.page_cursor().await?;
        debug!("重新查询后位于 {}", fresh);
        if fresh.total_pages < target {
            return Ok(None);
        }

        portal.jump_to_page(target).await?;
        let cursor = portal.page_cursor().await?;
        if cursor.current_page != target {
            return Err(AppError::contract(format!(
                "跳页后应在第 {} 页，实际为 {}",
                target, cursor
            )));
        }

        info!("{} 已重新进入", cursor);
        Ok(Some(cursor))
    }

    async fn reload_and_check<P: Portal + ?Sized>(&self, portal: &mut P) -> AppResult<PageCursor> {
        portal.reload().await?;
        portal.page_cursor().await
    }
}
