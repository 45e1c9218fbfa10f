//! 诊断输出服务 - 业务能力层
//!
//! 只负责截图与失败记录，不影响流程结果：写入失败只记日志。

use std::fmt::Display;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::portal::Portal;

/// 诊断输出
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// 截图目录，`None` 时不截图
    screenshots_dir: Option<PathBuf>,
    /// 失败记录文件
    failure_log: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(screenshots_dir: impl Into<PathBuf>, failure_log: impl Into<PathBuf>) -> Self {
        Self {
            screenshots_dir: Some(screenshots_dir.into()),
            failure_log: Some(failure_log.into()),
        }
    }

    /// 不产生任何文件
    pub fn disabled() -> Self {
        Self {
            screenshots_dir: None,
            failure_log: None,
        }
    }

    pub fn screenshots_dir(&self) -> Option<&Path> {
        self.screenshots_dir.as_deref()
    }

    /// 清空并重建截图目录
    pub async fn reset_screenshots(&self) -> AppResult<()> {
        let Some(dir) = &self.screenshots_dir else {
            return Ok(());
        };

        if fs::try_exists(dir).await.unwrap_or(false) {
            info!("清空截图目录");
            fs::remove_dir_all(dir).await?;
        } else {
            debug!("截图目录不存在，无需清空");
        }
        fs::create_dir_all(dir).await?;
        debug!("截图目录已就绪: {}", dir.display());
        Ok(())
    }

    /// 截取整页并保存为 `{name}_{毫秒时间戳}.png`
    pub async fn capture<P: Portal + ?Sized>(&self, portal: &mut P, name: &str) {
        let Some(dir) = &self.screenshots_dir else {
            return;
        };

        let png = match portal.screenshot().await {
            Ok(png) => png,
            Err(e) => {
                warn!("截图 {} 失败: {}", name, e);
                return;
            }
        };

        let path = dir.join(format!("{}_{}.png", name, chrono::Utc::now().timestamp_millis()));
        match fs::write(&path, png).await {
            Ok(()) => info!("截图已保存: {}", path.display()),
            Err(e) => warn!("保存截图 {} 失败: {}", path.display(), e),
        }
    }

    /// 追加一条失败记录，供人工排查
    pub async fn record_failure(&self, context: &str, err: &dyn Display) {
        let Some(path) = &self.failure_log else {
            return;
        };

        let line = format!(
            "[{}] {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            context,
            err
        );

        if let Err(e) = append_line(path, &line).await {
            warn!("写入失败记录 {} 失败: {}", path.display(), e);
        }
    }
}

async fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    // tokio 的写入在后台线程完成，进程随后可能直接退出
    file.flush().await
}
