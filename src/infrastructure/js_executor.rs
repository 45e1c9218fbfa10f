//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS / 点击 / 输入 / 等待"的能力

use std::future::Future;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, EventLoadEventFired};
use chromiumoxide::element::Element;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 轮询页面元素的间隔
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 所有等待都有上限，超时转换为 `AppError::Timeout`
/// - 不认识门户的业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// 脚本返回 `null` / `undefined` 时结果中没有 value，统一视为 `Null`。
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.value().cloned().unwrap_or(JsonValue::Null))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 导航并等待加载完成
    pub async fn goto(&self, url: &str, limit: Duration) -> AppResult<()> {
        debug!("导航到: {}", url);
        timeout(limit, self.page.goto(url))
            .await
            .map_err(|_| AppError::timeout(format!("导航到 {}", url), limit))??;
        Ok(())
    }

    /// 查找元素，不等待
    pub async fn find(&self, selector: &str) -> Option<Element> {
        self.page.find_element(selector).await.ok()
    }

    /// 轮询直到元素出现
    pub async fn wait_for_selector(&self, selector: &str, limit: Duration) -> AppResult<Element> {
        let deadline = Instant::now() + limit;
        loop {
            if let Ok(element) = self.page.find_element(selector).await {
                return Ok(element);
            }
            if Instant::now() >= deadline {
                return Err(AppError::timeout(format!("元素 {}", selector), limit));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn click(&self, selector: &str, limit: Duration) -> AppResult<()> {
        debug!("点击: {}", selector);
        let element = self.wait_for_selector(selector, limit).await?;
        element.click().await?;
        Ok(())
    }

    /// 点击并等待随之发生的导航
    pub async fn click_and_wait(&self, selector: &str, limit: Duration) -> AppResult<()> {
        let element = self.wait_for_selector(selector, limit).await?;
        debug!("点击并等待导航: {}", selector);
        self.with_navigation(selector, limit, async {
            element.click().await?;
            Ok(())
        })
        .await
    }

    /// 执行会触发导航的动作，并等待新页面的 load 事件
    ///
    /// 先订阅事件再执行 `trigger`，导航再快也不会漏掉。
    ///
    /// # 参数
    /// - `action`: 动作描述，用于超时错误
    /// - `limit`: 等待 load 事件的上限
    /// - `trigger`: 点击等动作；返回错误时不再等待导航
    ///
    /// # 返回
    /// `trigger` 的结果；超时返回 `AppError::Timeout`
    pub async fn with_navigation<T, F>(&self, action: &str, limit: Duration, trigger: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let mut loads = self.page.event_listener::<EventLoadEventFired>().await?;
        let value = trigger.await?;
        match timeout(limit, loads.next()).await {
            Ok(Some(_)) => Ok(value),
            Ok(None) => Err(AppError::contract(format!("{} 之后页面已关闭", action))),
            Err(_) => Err(AppError::timeout(format!("{} 之后的导航", action), limit)),
        }
    }

    /// 清空输入框后逐字输入
    pub async fn type_into(&self, selector: &str, text: &str, limit: Duration) -> AppResult<()> {
        let element = self.wait_for_selector(selector, limit).await?;
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); if (el) el.value = ''; }})()",
            serde_json::to_string(selector)?
        ))
        .await?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    /// 点击第一个文字包含 `text` 的元素，没有匹配时返回 `false`
    pub async fn click_by_text(&self, selector: &str, text: &str) -> AppResult<bool> {
        let js_code = format!(
            r#"
            (() => {{
                const elements = Array.from(document.querySelectorAll({}));
                const target = elements.find((el) => (el.textContent || el.value || '').includes({}));
                if (!target) return false;
                target.click();
                return true;
            }})()
            "#,
            serde_json::to_string(selector)?,
            serde_json::to_string(text)?
        );
        self.eval_as(js_code).await
    }

    /// 元素截图（PNG）
    pub async fn element_screenshot(&self, selector: &str, limit: Duration) -> AppResult<Vec<u8>> {
        let element = self.wait_for_selector(selector, limit).await?;
        Ok(element.screenshot(CaptureScreenshotFormat::Png).await?)
    }

    /// 整页截图（PNG）
    pub async fn full_screenshot(&self) -> AppResult<Vec<u8>> {
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .full_page(true)
            .build();
        Ok(self.page.screenshot(params).await?)
    }

    pub async fn reload(&self, limit: Duration) -> AppResult<()> {
        timeout(limit, self.page.reload())
            .await
            .map_err(|_| AppError::timeout("重新载入页面", limit))??;
        Ok(())
    }
}
