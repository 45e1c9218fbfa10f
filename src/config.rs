//! 程序配置
//!
//! 优先级：环境变量 > 本地配置文件 (`config.local.toml`) > 内置默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{Credentials, SearchRequest};
use crate::workflow::RetryPolicy;

/// 本地配置文件的默认位置
pub const DEFAULT_LOCAL_CONFIG: &str = "config.local.toml";

/// 各类等待的时长
#[derive(Clone, Debug)]
pub struct Timings {
    /// 页面导航、慢速跳转
    pub navigation_timeout: Duration,
    /// 等待元素出现
    pub element_timeout: Duration,
    /// 日期选择弹窗的打开与关闭
    pub popup_timeout: Duration,
    /// 点击刷新后门户异步生成新验证码
    pub captcha_refresh_delay: Duration,
    /// OCR 提交后到结果可取之间
    pub ocr_settle_delay: Duration,
    /// 点击勾选框后等待原生对话框的窗口
    pub dialog_window: Duration,
    /// 两次勾选之间
    pub row_settle_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(30),
            element_timeout: Duration::from_secs(10),
            popup_timeout: Duration::from_secs(5),
            captcha_refresh_delay: Duration::from_millis(1000),
            ocr_settle_delay: Duration::from_millis(2000),
            dialog_window: Duration::from_secs(3),
            row_settle_delay: Duration::from_millis(500),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 登录页 URL
    pub login_url: String,
    pub username: String,
    pub password: String,
    // --- OCR 配置 ---
    pub azure_endpoint: String,
    pub azure_api_key: String,
    // --- 浏览器配置 ---
    /// 浏览器路径（未设置时使用平台默认路径）
    pub chrome_path: Option<PathBuf>,
    /// 是否使用无头模式（CI 环境自动开启）
    pub headless: bool,
    /// 设置后连接该调试端口上的浏览器，而不是启动新浏览器
    pub browser_debug_port: Option<u16>,
    // --- 输出 ---
    /// 截图目录，每次运行开始时清空
    pub screenshots_dir: PathBuf,
    /// 验证码中间图片的保存目录，未设置时不保存
    pub artifact_dir: Option<PathBuf>,
    /// 失败记录文件
    pub output_log_file: PathBuf,
    /// 是否显示详细日志
    pub verbose_logging: bool,
    // --- 流程 ---
    pub search: SearchRequest,
    pub timings: Timings,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            login_url: String::new(),
            username: String::new(),
            password: String::new(),
            azure_endpoint: String::new(),
            azure_api_key: String::new(),
            chrome_path: None,
            headless: false,
            browser_debug_port: None,
            screenshots_dir: PathBuf::from("screenshots"),
            artifact_dir: Some(PathBuf::from(".")),
            output_log_file: PathBuf::from("output.txt"),
            verbose_logging: false,
            search: SearchRequest {
                date_start: Some("today".to_string()),
                date_end: Some("today".to_string()),
                ..Default::default()
            },
            timings: Timings::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// 本地配置文件内容，所有字段可选
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    pub login_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub azure_endpoint: Option<String>,
    pub azure_api_key: Option<String>,
    pub chrome_path: Option<PathBuf>,
    pub headless: Option<bool>,
    pub browser_debug_port: Option<u16>,
    pub screenshots_dir: Option<PathBuf>,
    pub artifact_dir: Option<PathBuf>,
    pub output_log_file: Option<PathBuf>,
    pub verbose_logging: Option<bool>,
    pub search: Option<SearchRequest>,
}

impl LocalConfig {
    pub fn from_toml(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 读取本地配置文件，文件不存在时返回 `None`
    pub fn load(path: &Path) -> AppResult<Option<Self>> {
        if !path.exists() {
            debug!("本地配置文件不存在: {}", path.display());
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let local = Self::from_toml(&content)
            .map_err(|e| AppError::Config(format!("{} ({})", e, path.display())))?;
        info!("已加载本地配置: {}", path.display());
        Ok(Some(local))
    }
}

impl Config {
    /// 从本地文件与进程环境变量加载
    pub fn load() -> AppResult<Self> {
        let path = std::env::var("FPG_CONFIG_FILE").unwrap_or_else(|_| DEFAULT_LOCAL_CONFIG.to_string());
        let local = LocalConfig::load(Path::new(&path))?;
        Ok(Self::from_sources(local, |key| std::env::var(key).ok()))
    }

    /// 按优先级合并三层配置
    pub fn from_sources(local: Option<LocalConfig>, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(local) = local {
            config.apply_local(local);
        }

        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        if let Some(v) = env("LOGIN_URL") {
            config.login_url = v;
        }
        if let Some(v) = env("FPG_USERNAME") {
            config.username = v;
        }
        if let Some(v) = env("FPG_PASSWORD") {
            config.password = v;
        }
        if let Some(v) = env("AZURE_ENDPOINT") {
            config.azure_endpoint = v;
        }
        if let Some(v) = env("AZURE_API_KEY") {
            config.azure_api_key = v;
        }
        if let Some(v) = env("CHROME_PATH") {
            config.chrome_path = Some(PathBuf::from(v));
        }
        if env("GITHUB_ACTIONS").as_deref() == Some("true") || env("CI").as_deref() == Some("true") {
            config.headless = true;
        }
        if let Some(port) = env("BROWSER_DEBUG_PORT").and_then(|v| v.parse().ok()) {
            config.browser_debug_port = Some(port);
        }
        if let Some(v) = env("SCREENSHOTS_DIR") {
            config.screenshots_dir = PathBuf::from(v);
        }
        if let Some(v) = env("ARTIFACT_DIR") {
            config.artifact_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env("OUTPUT_LOG_FILE") {
            config.output_log_file = PathBuf::from(v);
        }
        if let Some(v) = env("VERBOSE_LOGGING").and_then(|v| v.parse().ok()) {
            config.verbose_logging = v;
        }

        // 案号与日期互斥：环境变量给出任一模式时覆盖整个查询条件
        let case_number = env("SEARCH_CASE_NUMBER");
        let date_start = env("SEARCH_DATE_START");
        let date_end = env("SEARCH_DATE_END");
        if case_number.is_some() || date_start.is_some() || date_end.is_some() {
            config.search = SearchRequest {
                case_number,
                date_start,
                date_end,
                date_kind: config.search.date_kind.take(),
            };
        }
        if let Some(v) = env("SEARCH_DATE_KIND") {
            config.search.date_kind = Some(v);
        }

        config
    }

    fn apply_local(&mut self, local: LocalConfig) {
        if let Some(v) = local.login_url {
            self.login_url = v;
        }
        if let Some(v) = local.username {
            self.username = v;
        }
        if let Some(v) = local.password {
            self.password = v;
        }
        if let Some(v) = local.azure_endpoint {
            self.azure_endpoint = v;
        }
        if let Some(v) = local.azure_api_key {
            self.azure_api_key = v;
        }
        if local.chrome_path.is_some() {
            self.chrome_path = local.chrome_path;
        }
        if let Some(v) = local.headless {
            self.headless = v;
        }
        if local.browser_debug_port.is_some() {
            self.browser_debug_port = local.browser_debug_port;
        }
        if let Some(v) = local.screenshots_dir {
            self.screenshots_dir = v;
        }
        if local.artifact_dir.is_some() {
            self.artifact_dir = local.artifact_dir;
        }
        if let Some(v) = local.output_log_file {
            self.output_log_file = v;
        }
        if let Some(v) = local.verbose_logging {
            self.verbose_logging = v;
        }
        if let Some(v) = local.search {
            self.search = v;
        }
    }

    /// 检查运行所需的必填项
    pub fn validate(&self) -> AppResult<()> {
        let required = [
            ("LOGIN_URL", &self.login_url),
            ("FPG_USERNAME", &self.username),
            ("FPG_PASSWORD", &self.password),
            ("AZURE_ENDPOINT", &self.azure_endpoint),
            ("AZURE_API_KEY", &self.azure_api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!("缺少必填配置: {}", missing.join(", "))))
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.username, &self.password)
    }
}
