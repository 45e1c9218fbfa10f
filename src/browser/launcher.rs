use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::{Browser, BrowserConfig};
use tokio::time::sleep;
use tracing::{debug, error, info};

use super::BrowserSession;
use crate::error::{AppResult, BrowserError};

/// 浏览器启动选项
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// CI 环境下使用无头模式，本地显示窗口
    pub headless: bool,
    /// 显式指定的浏览器路径（来自 `CHROME_PATH`）
    pub executable: Option<PathBuf>,
    /// CDP 请求超时
    pub request_timeout: Duration,
}

/// 各平台 Chrome 的默认安装路径
fn platform_default_chrome() -> Option<&'static str> {
    if cfg!(target_os = "macos") {
        Some("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome")
    } else if cfg!(target_os = "windows") {
        Some(r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe")
    } else if cfg!(target_os = "linux") {
        Some("/usr/bin/google-chrome")
    } else {
        None
    }
}

/// 解析浏览器路径：显式指定 > 平台默认路径（存在时）> 驱动自带
pub fn resolve_executable(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    platform_default_chrome()
        .map(PathBuf::from)
        .filter(|path| path.exists())
}

/// 启动浏览器并打开一个空白页面
pub async fn launch_browser(options: &LaunchOptions) -> AppResult<BrowserSession> {
    info!(
        "🚀 启动浏览器 ({})...",
        if options.headless { "无头模式" } else { "窗口模式" }
    );

    let mut builder = BrowserConfig::builder()
        .viewport(None)
        .request_timeout(options.request_timeout)
        .args(vec!["--no-sandbox", "--disable-setuid-sandbox"]);

    builder = if options.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };

    match resolve_executable(options.executable.as_deref()) {
        Some(path) => {
            info!("使用Chrome路径: {}", path.display());
            builder = builder.chrome_executable(path);
        }
        None => info!("未找到Chrome路径，使用驱动预设浏览器"),
    }

    let config = builder.build().map_err(|e| {
        error!("配置浏览器失败: {}", e);
        BrowserError::LaunchFailed(e)
    })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed(e.to_string())
    })?;
    debug!("浏览器启动成功");

    let session = BrowserSession::spawn(browser, handler, true);

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok(session)
}
