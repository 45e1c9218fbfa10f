//! 登录流程 - 流程层
//!
//! 状态：未开始 → 页面已载入 → 验证码已刷新 → 已提交 → {已登录 | 被拒绝}，
//! 被拒绝后重新载入登录页，最多尝试 `MAX_LOGIN_ATTEMPTS` 次。
//! 验证码识别失败时直接放弃本次尝试，不提交表单。

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};
use crate::models::Credentials;
use crate::portal::selectors::POST_LOGIN_MENU_LABELS;
use crate::portal::Portal;
use crate::services::{CaptchaResolver, Diagnostics};

pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

/// 登录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    NotStarted,
    PageLoaded,
    CaptchaRefreshed,
    CredentialsSubmitted,
    Authenticated,
    Rejected,
}

/// 单次尝试的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttemptOutcome {
    Authenticated,
    /// 验证码无法识别，未提交
    CaptchaUnreadable,
    /// 已提交但门户拒绝
    Rejected,
}

/// 登录结果统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoginReport {
    /// 成功时所用的尝试次数
    pub attempts: u32,
    /// 实际提交表单的次数
    pub submissions: u32,
}

/// 菜单中同时出现三个登录后标签才算登录成功
///
/// 登录失败时门户同样会导航回登录页的某个变体，不能只看导航结果。
pub fn is_authenticated(menu_text: Option<&str>) -> bool {
    menu_text.is_some_and(|text| POST_LOGIN_MENU_LABELS.iter().all(|label| text.contains(label)))
}

/// 登录流程
pub struct LoginFlow {
    resolver: Arc<dyn CaptchaResolver>,
    credentials: Credentials,
    diagnostics: Diagnostics,
    refresh_delay: Duration,
    max_attempts: u32,
}

impl LoginFlow {
    pub fn new(
        resolver: Arc<dyn CaptchaResolver>,
        credentials: Credentials,
        diagnostics: Diagnostics,
        refresh_delay: Duration,
    ) -> Self {
        Self {
            resolver,
            credentials,
            diagnostics,
            refresh_delay,
            max_attempts: MAX_LOGIN_ATTEMPTS,
        }
    }

    /// 登录，成功后会话停留在登录后的首页
    ///
    /// # 参数
    /// - `portal`: 已打开的门户会话
    ///
    /// # 返回
    /// 成功时返回尝试与提交次数；五次都失败时返回 `AuthenticationExhausted`。
    /// 载入登录页超时与提交后超时一样只消耗一次尝试。
    pub async fn run<P: Portal + ?Sized>(&self, portal: &mut P) -> AppResult<LoginReport> {
        let mut state = LoginState::NotStarted;
        let mut page_ready = false;
        let mut submissions = 0;

        for attempt in 1..=self.max_attempts {
            info!("[登录 {}/{}] 开始登录", attempt, self.max_attempts);

            let result = self
                .attempt_on_fresh_page(portal, &mut state, &mut page_ready, &mut submissions)
                .await;
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(e) if e.is_transient() => {
                    warn!("[登录 {}/{}] 本次尝试出错: {}", attempt, self.max_attempts, e);
                    advance(&mut state, LoginState::Rejected);
                    AttemptOutcome::Rejected
                }
                Err(e) => return Err(e),
            };

            match outcome {
                AttemptOutcome::Authenticated => {
                    info!("[登录 {}/{}] ✅ 登录成功", attempt, self.max_attempts);
                    return Ok(LoginReport {
                        attempts: attempt,
                        submissions,
                    });
                }
                // 未提交，页面仍可用
                AttemptOutcome::CaptchaUnreadable => continue,
                AttemptOutcome::Rejected => {
                    // 提交失败后会话状态不可信，下次尝试前重新载入登录页
                    info!("[登录 {}/{}] 登录失败", attempt, self.max_attempts);
                    page_ready = false;
                }
            }
        }

        Err(AppError::AuthenticationExhausted {
            attempts: self.max_attempts,
        })
    }

    async fn attempt_on_fresh_page<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        state: &mut LoginState,
        page_ready: &mut bool,
        submissions: &mut u32,
    ) -> AppResult<AttemptOutcome> {
        if !*page_ready {
            self.load_login_page(portal, state).await?;
            *page_ready = true;
        }
        self.attempt(portal, state, submissions).await
    }

    async fn load_login_page<P: Portal + ?Sized>(&self, portal: &mut P, state: &mut LoginState) -> AppResult<()> {
        portal.open_login_page().await?;
        self.diagnostics.capture(portal, "login_page").await;
        advance(state, LoginState::PageLoaded);
        Ok(())
    }

    async fn attempt<P: Portal + ?Sized>(
        &self,
        portal: &mut P,
        state: &mut LoginState,
        submissions: &mut u32,
    ) -> AppResult<AttemptOutcome> {
        if portal.refresh_captcha().await? {
            // 门户异步生成新图片
            sleep(self.refresh_delay).await;
        }
        advance(state, LoginState::CaptchaRefreshed);

        let image = portal.capture_captcha().await?;
        let resolution = self.resolver.resolve(&image).await;
        let Some(code) = resolution.usable_code() else {
            info!("验证码无效，放弃本次尝试: {:?}", resolution);
            return Ok(AttemptOutcome::CaptchaUnreadable);
        };

        debug!("填写登录表单");
        portal.fill_login_form(&self.credentials, code).await?;
        self.diagnostics.capture(portal, "before_login").await;

        *submissions += 1;
        portal.submit_login().await?;
        advance(state, LoginState::CredentialsSubmitted);
        self.diagnostics.capture(portal, "after_login").await;

        let menu = portal.menu_text().await?;
        if is_authenticated(menu.as_deref()) {
            advance(state, LoginState::Authenticated);
            Ok(AttemptOutcome::Authenticated)
        } else {
            advance(state, LoginState::Rejected);
            Ok(AttemptOutcome::Rejected)
        }
    }
}

fn advance(state: &mut LoginState, next: LoginState) {
    debug!("登录状态: {:?} → {:?}", state, next);
    *state = next;
}
