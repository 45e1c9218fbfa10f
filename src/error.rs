//! 应用程序错误类型
//!
//! 分类对应流程的处理策略：
//! - 输入错误：在任何页面交互之前拒绝，不重试
//! - 瞬时错误（超时、CDP 通信失败）：有限次数重试
//! - 页面契约错误：当前操作致命，截图后向上传播
//! - 登录耗尽：整个流程致命

use std::time::Duration;

use thiserror::Error;

/// 应用程序错误
#[derive(Debug, Error)]
pub enum AppError {
    /// 调用方输入不合法（案号格式错误、缺少查询条件等）
    #[error("输入错误: {0}")]
    InvalidInput(String),

    /// 等待页面元素或导航超时
    #[error("等待 {action} 超时 ({after:?})")]
    Timeout { action: String, after: Duration },

    /// 浏览器驱动错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),

    /// 页面内容与预期不符（门户标记可能已变更）
    #[error("页面契约错误: {0}")]
    Contract(String),

    /// 登录重试次数耗尽
    #[error("登录失败: 已尝试 {attempts} 次")]
    AuthenticationExhausted { attempts: u32 },

    /// OCR 服务错误
    #[error("OCR错误: {0}")]
    Ocr(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    LaunchFailed(String),

    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed {
        port: u16,
        #[source]
        source: chromiumoxide::error::CdpError,
    },

    /// CDP 命令执行失败
    #[error("执行 CDP 命令失败: {0}")]
    Cdp(#[from] chromiumoxide::error::CdpError),

    /// 脚本返回值无法解析
    #[error("脚本返回值解析失败: {0}")]
    Script(#[from] serde_json::Error),
}

impl AppError {
    /// 是否属于可重试的瞬时错误
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Timeout { .. } | AppError::Browser(BrowserError::Cdp(_)))
    }

    pub fn timeout(action: impl Into<String>, after: Duration) -> Self {
        AppError::Timeout {
            action: action.into(),
            after,
        }
    }

    pub fn contract(message: impl Into<String>) -> Self {
        AppError::Contract(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        AppError::InvalidInput(message.into())
    }
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::Cdp(err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Browser(BrowserError::Script(err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(format!("TOML解析失败: {}", err))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Ocr(format!("请求失败: {}", err))
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Ocr(format!("图片处理失败: {}", err))
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
