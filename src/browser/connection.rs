use std::time::Duration;

use chromiumoxide::Browser;
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::BrowserSession;
use crate::error::{AppResult, BrowserError};

/// 连接到已在调试端口上运行的浏览器
///
/// 本地排查时先手动打开浏览器 (`--remote-debugging-port=PORT`)，
/// 可以直接观察每一步操作。断开时不会关闭该浏览器。
pub async fn connect_to_browser(port: u16) -> AppResult<BrowserSession> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed { port, source: e }
    })?;
    debug!("浏览器连接成功");

    let session = BrowserSession::spawn(browser, handler, false);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(session)
}
