//! 基于 chromiumoxide 的门户实现
//!
//! 页面结构相关的细节（选择器、弹窗、对话框）全部在这里处理，
//! 流程层只通过 `Portal` 接口操作。

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::{EventJavascriptDialogOpening, HandleJavaScriptDialogParams};
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use chromiumoxide::Page;
use chrono::NaiveDate;
use futures::StreamExt;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::selectors::*;
use super::{DateField, DialogOutcome, Portal, PortalLauncher, QueryMode};
use crate::browser::{connect_to_browser, launch_browser, BrowserSession, LaunchOptions};
use crate::config::{Config, Timings};
use crate::error::{AppError, AppResult};
use crate::infrastructure::{guarded, JsExecutor};
use crate::models::{format_date, AnnouncementDateKind, Banner, CaseNumber, Credentials, PageCursor, RowSnapshot};

/// 轮询弹窗的间隔
const POPUP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// 列出与点击勾选框共用的行标识规则
///
/// 不读 `cb.value`：没有 value 属性时它固定是 "on"。
const ROW_KEY_JS: &str = r#"
    const rowKey = (cb, index) => cb.getAttribute('value') || cb.id || ('#' + index);
"#;

/// 真实门户会话
pub struct ChromePortal {
    session: BrowserSession,
    executor: JsExecutor,
    login_url: String,
    timings: Timings,
}

impl ChromePortal {
    pub fn new(session: BrowserSession, page: Page, login_url: impl Into<String>, timings: Timings) -> Self {
        Self {
            session,
            executor: JsExecutor::new(page),
            login_url: login_url.into(),
            timings,
        }
    }

    async fn page_ids(&self) -> AppResult<HashSet<TargetId>> {
        let pages = self.session.browser().pages().await?;
        Ok(pages.iter().map(|p| p.target_id().clone()).collect())
    }

    /// 等待点击后出现的新窗口
    async fn wait_for_popup(&self, before: &HashSet<TargetId>) -> AppResult<Page> {
        let limit = self.timings.popup_timeout;
        let deadline = Instant::now() + limit;
        loop {
            let pages = self.session.browser().pages().await?;
            if let Some(popup) = pages.into_iter().find(|p| !before.contains(p.target_id())) {
                debug!("日期弹窗已打开");
                return Ok(popup);
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout("日期弹窗打开", limit));
            }
            sleep(POPUP_POLL_INTERVAL).await;
        }
    }

    /// 等待弹窗关闭或隐藏
    async fn wait_for_popup_closed(&self, popup: &Page) -> AppResult<()> {
        let limit = self.timings.popup_timeout;
        let deadline = Instant::now() + limit;
        loop {
            let still_open = self.page_ids().await?.contains(popup.target_id());
            if !still_open {
                debug!("日期弹窗已关闭");
                return Ok(());
            }
            // 目标已断开时 evaluate 会失败，同样视为已关闭
            match popup.evaluate("document.visibilityState").await {
                Ok(result) => {
                    if result.into_value::<String>().ok().as_deref() == Some("hidden") {
                        debug!("日期弹窗已隐藏");
                        return Ok(());
                    }
                }
                Err(_) => return Ok(()),
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout("日期弹窗关闭", limit));
            }
            sleep(POPUP_POLL_INTERVAL).await;
        }
    }

    /// 在对话框保护下点击某个元素
    async fn click_guarded(&self, selector: &str) -> AppResult<DialogOutcome> {
        let element = self
            .executor
            .wait_for_selector(selector, self.timings.element_timeout)
            .await?;

        // 先订阅再点击，避免漏掉同步弹出的对话框
        let mut dialogs = self
            .executor
            .page()
            .event_listener::<EventJavascriptDialogOpening>()
            .await?
            .map(|event| event.message.clone());

        let page = self.executor.page().clone();
        let click = async {
            element.click().await?;
            Ok::<(), AppError>(())
        };
        guarded(click, &mut dialogs, self.timings.dialog_window, || async move {
            page.execute(HandleJavaScriptDialogParams::new(false)).await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl Portal for ChromePortal {
    async fn open_login_page(&mut self) -> AppResult<()> {
        info!("打开登录页");
        self.executor
            .goto(&self.login_url, self.timings.navigation_timeout)
            .await?;
        self.executor
            .wait_for_selector(CAPTCHA_IMAGE, self.timings.element_timeout)
            .await?;
        Ok(())
    }

    async fn refresh_captcha(&mut self) -> AppResult<bool> {
        match self.executor.find(CAPTCHA_REFRESH).await {
            Some(button) => {
                info!("刷新验证码");
                button.click().await?;
                Ok(true)
            }
            None => {
                debug!("页面上没有验证码刷新按钮");
                Ok(false)
            }
        }
    }

    async fn capture_captcha(&mut self) -> AppResult<Vec<u8>> {
        self.executor
            .element_screenshot(CAPTCHA_IMAGE, self.timings.element_timeout)
            .await
    }

    async fn fill_login_form(&mut self, credentials: &Credentials, captcha: &str) -> AppResult<()> {
        let limit = self.timings.element_timeout;
        self.executor.type_into(USERNAME_INPUT, &credentials.username, limit).await?;
        self.executor.type_into(PASSWORD_INPUT, &credentials.password, limit).await?;
        self.executor.type_into(CAPTCHA_INPUT, captcha, limit).await?;
        Ok(())
    }

    async fn submit_login(&mut self) -> AppResult<()> {
        let selector = if self.executor.find(LOGIN_SUBMIT).await.is_some() {
            LOGIN_SUBMIT
        } else if self.executor.find(LOGIN_SUBMIT_FALLBACK).await.is_some() {
            LOGIN_SUBMIT_FALLBACK
        } else {
            return Err(AppError::contract("无法找到登入按钮"));
        };

        info!("提交登录表单");
        self.executor
            .click_and_wait(selector, self.timings.navigation_timeout)
            .await
    }

    async fn menu_text(&mut self) -> AppResult<Option<String>> {
        self.executor
            .eval_as(format!(
                "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
                serde_json::to_string(MENU)?
            ))
            .await
    }

    async fn open_bulletin(&mut self) -> AppResult<()> {
        info!("进入标售公报");
        let menu_links = format!("{} a", MENU);
        let click = async {
            if !self.executor.click_by_text(&menu_links, BULLETIN_MENU_TEXT).await? {
                return Err(AppError::contract(format!("菜单中找不到 {}", BULLETIN_MENU_TEXT)));
            }
            Ok(())
        };
        self.executor
            .with_navigation(BULLETIN_MENU_TEXT, self.timings.navigation_timeout, click)
            .await?;
        self.executor
            .wait_for_selector(QUERY_FORM, self.timings.navigation_timeout)
            .await?;
        Ok(())
    }

    async fn select_query_mode(&mut self, mode: QueryMode) -> AppResult<()> {
        let selector = match mode {
            QueryMode::ByDate => QUERY_MODE_BY_DATE,
            QueryMode::ByCaseNumber => QUERY_MODE_BY_CASE,
        };
        self.executor.click(selector, self.timings.element_timeout).await
    }

    async fn pick_date(&mut self, field: DateField, date: NaiveDate) -> AppResult<()> {
        let trigger = match field {
            DateField::Start => START_DATE_PICKER,
            DateField::End => END_DATE_PICKER,
        };
        let date_text = format_date(date);
        debug!("选择日期 {:?}: {}", field, date_text);

        let before = self.page_ids().await?;
        self.executor.click(trigger, self.timings.element_timeout).await?;
        let popup = self.wait_for_popup(&before).await?;

        // 链接的 href 或 onclick 形如 setDate('2026/10/19')，参数必须完全相等；
        // 点击会关闭弹窗，所以延后到脚本返回之后执行
        let script = format!(
            r#"
            (() => {{
                const prefix = {prefix};
                const wanted = {date};
                const link = Array.from(document.querySelectorAll('a')).find((a) => {{
                    const action = (a.getAttribute('href') || '') + ' ' + (a.getAttribute('onclick') || '');
                    const start = action.indexOf(prefix);
                    if (start < 0) return false;
                    const rest = action.slice(start + prefix.length);
                    return rest.slice(0, rest.indexOf("'")) === wanted;
                }});
                if (!link) return false;
                setTimeout(() => link.click(), 0);
                return true;
            }})()
            "#,
            prefix = serde_json::to_string(DATE_ACTION_PREFIX)?,
            date = serde_json::to_string(&date_text)?,
        );
        let clicked: bool = popup.evaluate(script).await?.into_value()?;
        if !clicked {
            return Err(AppError::contract(format!("日期弹窗中找不到 {}", date_text)));
        }

        self.wait_for_popup_closed(&popup).await
    }

    async fn select_date_kind(&mut self, kind: AnnouncementDateKind) -> AppResult<()> {
        let selector = match kind {
            AnnouncementDateKind::Publish => DATE_KIND_PUBLISH,
            AnnouncementDateKind::Notice => DATE_KIND_NOTICE,
        };
        self.executor.click(selector, self.timings.element_timeout).await
    }

    async fn enter_case_number(&mut self, case_number: &CaseNumber) -> AppResult<()> {
        self.executor
            .type_into(CASE_NUMBER_INPUT, case_number.as_str(), self.timings.element_timeout)
            .await
    }

    async fn submit_search(&mut self) -> AppResult<()> {
        info!("提交查询");
        self.executor
            .click_and_wait(SEARCH_BUTTON, self.timings.navigation_timeout)
            .await?;
        self.executor
            .wait_for_selector(RESULT_AREA, self.timings.navigation_timeout)
            .await?;
        Ok(())
    }

    async fn result_banner(&mut self) -> AppResult<Banner> {
        self.executor
            .wait_for_selector(RESULT_BANNER, self.timings.element_timeout)
            .await?;

        let banner: Option<Banner> = self
            .executor
            .eval_as(format!(
                r#"
                (() => {{
                    const el = document.querySelector({selector});
                    if (!el) return null;
                    return {{
                        kind: el.classList.contains({success}) ? 'success' : 'error',
                        text: (el.innerText || '').trim(),
                    }};
                }})()
                "#,
                selector = serde_json::to_string(RESULT_BANNER)?,
                success = serde_json::to_string(SUCCESS_BANNER_CLASS)?,
            ))
            .await?;

        banner.ok_or_else(|| AppError::contract("结果横幅消失"))
    }

    async fn list_rows(&mut self) -> AppResult<Vec<RowSnapshot>> {
        self.executor
            .eval_as(format!(
                r#"
                (() => {{
                {row_key}
                return Array.from(document.querySelectorAll({selector})).map((cb, index) => {{
                    const row = cb.closest('tr');
                    let label = null;
                    if (cb.id) {{
                        const byFor = document.querySelector('label[for="' + CSS.escape(cb.id) + '"]');
                        if (byFor) label = byFor.innerText.trim();
                    }}
                    if (!label) {{
                        const wrapping = cb.closest('label');
                        if (wrapping) label = wrapping.innerText.trim();
                    }}
                    return {{
                        id: rowKey(cb, index),
                        checked: cb.checked,
                        rowClass: row ? row.className : '',
                        label,
                    }};
                }});
                }})()
                "#,
                row_key = ROW_KEY_JS,
                selector = serde_json::to_string(ROW_CHECKBOX)?,
            ))
            .await
    }

    async fn toggle_row(&mut self, row_id: &str) -> AppResult<DialogOutcome> {
        // 按同一规则给目标行打上标记，再用真实点击触发对话框
        let marked: bool = self
            .executor
            .eval_as(format!(
                r#"
                (() => {{
                {row_key}
                const wanted = {wanted};
                let found = false;
                document.querySelectorAll({selector}).forEach((cb, index) => {{
                    cb.removeAttribute({attr});
                    if (!found && rowKey(cb, index) === wanted) {{
                        cb.setAttribute({attr}, '1');
                        found = true;
                    }}
                }});
                return found;
                }})()
                "#,
                row_key = ROW_KEY_JS,
                wanted = serde_json::to_string(row_id)?,
                selector = serde_json::to_string(ROW_CHECKBOX)?,
                attr = serde_json::to_string(ROW_TARGET_ATTR)?,
            ))
            .await?;
        if !marked {
            return Err(AppError::contract(format!("找不到勾选框 {}", row_id)));
        }

        let selector = format!("{}[{}]", ROW_CHECKBOX, ROW_TARGET_ATTR);
        self.click_guarded(&selector).await
    }

    async fn save_selections(&mut self) -> AppResult<()> {
        info!("保存勾选");
        let outcome = self
            .executor
            .with_navigation(SAVE_BUTTON, self.timings.navigation_timeout, self.click_guarded(SAVE_BUTTON))
            .await?;
        debug!("保存: {:?}", outcome);
        Ok(())
    }

    async fn on_query_form(&mut self) -> AppResult<bool> {
        Ok(self.executor.find(QUERY_FORM).await.is_some())
    }

    async fn page_cursor(&mut self) -> AppResult<PageCursor> {
        let text: Option<String> = self
            .executor
            .eval_as(format!(
                "(() => {{ const el = document.querySelector({}); return el ? el.innerText : null; }})()",
                serde_json::to_string(PAGE_INDICATOR)?
            ))
            .await?;

        match text {
            Some(text) => crate::models::parse_page_indicator(&text)
                .ok_or_else(|| AppError::contract(format!("无法解析页码: {:?}", text))),
            None => {
                // 只有一页时门户不显示分页栏
                if self.executor.find(RESULT_AREA).await.is_none() {
                    return Err(AppError::contract("当前不在结果列表"));
                }
                debug!("没有分页栏，按单页处理");
                Ok(PageCursor {
                    current_page: 1,
                    total_pages: 1,
                })
            }
        }
    }

    async fn jump_to_page(&mut self, page: u32) -> AppResult<()> {
        debug!("跳到第 {} 页", page);
        self.executor
            .type_into(JUMP_INPUT, &page.to_string(), self.timings.element_timeout)
            .await?;
        self.executor
            .click_and_wait(JUMP_BUTTON, self.timings.navigation_timeout)
            .await
    }

    async fn next_page(&mut self) -> AppResult<()> {
        let click = async {
            if !self.executor.click_by_text("a", NEXT_PAGE_TEXT).await? {
                return Err(AppError::contract(format!("找不到 {}", NEXT_PAGE_TEXT)));
            }
            Ok(())
        };
        self.executor
            .with_navigation(NEXT_PAGE_TEXT, self.timings.navigation_timeout, click)
            .await
    }

    async fn back_to_main(&mut self) -> AppResult<()> {
        let click = async {
            if !self
                .executor
                .click_by_text(r#"a, input[type="button"]"#, BACK_TO_MAIN_TEXT)
                .await?
            {
                return Err(AppError::contract(format!("找不到 {}", BACK_TO_MAIN_TEXT)));
            }
            Ok(())
        };
        match self
            .executor
            .with_navigation(BACK_TO_MAIN_TEXT, self.timings.navigation_timeout, click)
            .await
        {
            // 保存后门户已自动回到主画面
            Err(AppError::Contract(_)) if self.executor.find(QUERY_FORM).await.is_some() => {
                debug!("已在主画面");
                Ok(())
            }
            other => other,
        }
    }

    async fn reload(&mut self) -> AppResult<()> {
        warn!("重新载入页面");
        self.executor.reload(self.timings.navigation_timeout).await
    }

    async fn screenshot(&mut self) -> AppResult<Vec<u8>> {
        self.executor.full_screenshot().await
    }

    async fn close(&mut self) -> AppResult<()> {
        self.session.close().await
    }
}

/// 按配置启动或连接浏览器
pub struct ChromeLauncher {
    options: LaunchOptions,
    debug_port: Option<u16>,
    login_url: String,
    timings: Timings,
}

impl ChromeLauncher {
    pub fn from_config(config: &Config) -> Self {
        Self {
            options: LaunchOptions {
                headless: config.headless,
                executable: config.chrome_path.clone(),
                request_timeout: config.timings.navigation_timeout,
            },
            debug_port: config.browser_debug_port,
            login_url: config.login_url.clone(),
            timings: config.timings.clone(),
        }
    }
}

#[async_trait]
impl PortalLauncher for ChromeLauncher {
    type Portal = ChromePortal;

    async fn open(&self) -> AppResult<ChromePortal> {
        let session = match self.debug_port {
            Some(port) => connect_to_browser(port).await?,
            None => launch_browser(&self.options).await?,
        };
        let page = session.new_page().await?;
        Ok(ChromePortal::new(session, page, self.login_url.clone(), self.timings.clone()))
    }
}
