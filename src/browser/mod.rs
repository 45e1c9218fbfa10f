//! 浏览器驱动能力：启动或连接浏览器，持有浏览器句柄与事件处理任务

pub mod connection;
pub mod launcher;

use chromiumoxide::handler::Handler;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AppResult;

pub use connection::connect_to_browser;
pub use launcher::{launch_browser, resolve_executable, LaunchOptions};

/// 一个浏览器进程（或连接）的生命周期
///
/// drop 时中止事件处理任务；启动的子进程由驱动在 drop 时结束。
pub struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    /// 由本程序启动（而不是连接到现有浏览器）
    owned: bool,
    closed: bool,
}

impl BrowserSession {
    pub(crate) fn spawn(browser: Browser, mut handler: Handler, owned: bool) -> Self {
        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        Self {
            browser,
            handler_task,
            owned,
            closed: false,
        }
    }

    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    pub async fn new_page(&self) -> AppResult<Page> {
        Ok(self.browser.new_page("about:blank").await?)
    }

    /// 关闭浏览器，可重复调用
    pub async fn close(&mut self) -> AppResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if self.owned {
            info!("关闭浏览器");
            if let Err(e) = self.browser.close().await {
                warn!("关闭浏览器失败: {}", e);
            }
            if let Err(e) = self.browser.wait().await {
                warn!("等待浏览器进程退出失败: {}", e);
            }
        } else {
            debug!("断开与浏览器的连接");
        }

        self.handler_task.abort();
        Ok(())
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}
