//! 应用入口 - 编排层
//!
//! ## 职责
//!
//! 1. **输入校验**：查询条件在启动浏览器之前校验
//! 2. **资源管理**：每次运行只打开一个浏览器会话，任何退出路径都会释放
//! 3. **流程调度**：登录 → 查询 → 分页勾选
//! 4. **失败记录**：截图并写入失败记录文件

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::config::{Config, Timings};
use crate::error::{AppError, AppResult};
use crate::models::{today, Credentials, SearchCriteria, SearchRequest, SearchResult};
use crate::portal::{ChromeLauncher, Portal, PortalLauncher};
use crate::services::{cleanup_temp_files, AzureReadClient, CaptchaResolver, CaptchaSolver, Diagnostics};
use crate::utils::logging::{log_startup, print_final_stats};
use crate::workflow::retry::with_retry;
use crate::workflow::{LoginFlow, LoginReport, PaginationFlow, PaginationReport, RetryPolicy, SearchFlow};

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub login: LoginReport,
    pub search: SearchResult,
    /// 查询无结果时不进行分页处理
    pub pagination: Option<PaginationReport>,
}

/// 应用主结构
pub struct App<L> {
    launcher: L,
    resolver: Arc<dyn CaptchaResolver>,
    credentials: Credentials,
    request: SearchRequest,
    diagnostics: Diagnostics,
    timings: Timings,
    retry: RetryPolicy,
    /// 验证码中间图片所在目录，结束时清理
    artifact_dir: Option<PathBuf>,
}

impl App<ChromeLauncher> {
    /// 按配置组装真实浏览器与 OCR 后端
    pub fn from_config(config: &Config) -> AppResult<Self> {
        config.validate()?;

        let backend = AzureReadClient::new(&config.azure_endpoint, &config.azure_api_key)?;
        let mut solver = CaptchaSolver::new(backend, config.timings.ocr_settle_delay);
        if let Some(dir) = &config.artifact_dir {
            solver = solver.with_artifacts(dir);
        }

        Ok(App::new(
            ChromeLauncher::from_config(config),
            Arc::new(solver),
            config.credentials(),
            config.search.clone(),
        )
        .with_diagnostics(Diagnostics::new(&config.screenshots_dir, &config.output_log_file))
        .with_timings(config.timings.clone())
        .with_retry(config.retry)
        .with_artifact_dir(config.artifact_dir.clone()))
    }
}

impl<L: PortalLauncher> App<L> {
    pub fn new(
        launcher: L,
        resolver: Arc<dyn CaptchaResolver>,
        credentials: Credentials,
        request: SearchRequest,
    ) -> Self {
        Self {
            launcher,
            resolver,
            credentials,
            request,
            diagnostics: Diagnostics::disabled(),
            timings: Timings::default(),
            retry: RetryPolicy::default(),
            artifact_dir: None,
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: Diagnostics) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_timings(mut self, timings: Timings) -> Self {
        self.timings = timings;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_artifact_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.artifact_dir = dir;
        self
    }

    /// 运行完整流程，失败时写入失败记录
    ///
    /// # 返回
    /// - `Ok(RunReport)`: 登录、查询与分页（查询成功时）的统计
    /// - `Err`: 第一个致命错误；浏览器会话在返回前已释放
    pub async fn run(&self) -> AppResult<RunReport> {
        let result = self.run_session().await;
        if let Err(e) = &result {
            self.diagnostics.record_failure("标售公报处理", e).await;
        }
        result
    }

    async fn run_session(&self) -> AppResult<RunReport> {
        // 不合法的输入不应启动浏览器
        let criteria = SearchCriteria::from_request(&self.request, today())?;
        log_startup(&criteria);

        if let Err(e) = self.diagnostics.reset_screenshots().await {
            warn!("清空截图目录失败: {}", e);
        }

        let mut portal = self.launcher.open().await?;

        // panic 时同样先释放会话再继续展开
        let outcome = AssertUnwindSafe(self.drive(&mut portal, &criteria))
            .catch_unwind()
            .await;

        if let Ok(Err(e)) = &outcome {
            error!("❌ 处理过程中发生错误: {}", e);
            self.diagnostics.capture(&mut portal, "error_page").await;
        }
        self.release(&mut portal).await;

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }

    async fn drive(&self, portal: &mut L::Portal, criteria: &SearchCriteria) -> AppResult<RunReport> {
        let login = LoginFlow::new(
            self.resolver.clone(),
            self.credentials.clone(),
            self.diagnostics.clone(),
            self.timings.captcha_refresh_delay,
        )
        .run(portal)
        .await?;

        let search_flow = SearchFlow::new(self.diagnostics.clone());
        let search = with_retry!(
            self.retry,
            "查询",
            enter_and_search(portal, &search_flow, criteria)
        )?;

        let pagination = match &search {
            SearchResult::Success { .. } => {
                let flow = PaginationFlow::new(
                    &search_flow,
                    self.diagnostics.clone(),
                    self.retry,
                    self.timings.row_settle_delay,
                );
                Some(flow.run(portal, criteria).await?)
            }
            SearchResult::NotFound { message } => {
                info!("查无资料，流程结束: {}", message);
                None
            }
            SearchResult::Unexpected { raw_page_state } => {
                return Err(AppError::contract(format!("无法识别的查询结果: {}", raw_page_state)));
            }
        };

        let (visited, saved, selected) = pagination
            .as_ref()
            .map(|p| (p.visited_pages.len(), p.saved_pages.len(), p.selected_rows))
            .unwrap_or_default();
        print_final_stats(login.attempts, visited, saved, selected);

        Ok(RunReport {
            login,
            search,
            pagination,
        })
    }

    /// 关闭会话并清理临时文件，不会失败
    async fn release(&self, portal: &mut L::Portal) {
        if let Err(e) = portal.close().await {
            warn!("释放浏览器会话失败: {}", e);
        }
        if let Some(dir) = &self.artifact_dir {
            cleanup_temp_files(dir).await;
        }
    }
}

async fn enter_and_search<P: Portal + ?Sized>(
    portal: &mut P,
    search_flow: &SearchFlow,
    criteria: &SearchCriteria,
) -> AppResult<SearchResult> {
    portal.open_bulletin().await?;
    search_flow.perform(portal, criteria).await
}
