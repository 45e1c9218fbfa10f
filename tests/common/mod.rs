//! 流程测试用的脚本化门户
//!
//! 状态保存在共享的 `PortalState` 中，测试结束后可以检查操作记录。

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use fpg_bulletin::config::Timings;
use fpg_bulletin::error::{AppError, AppResult};
use fpg_bulletin::models::{
    format_date, AnnouncementDateKind, Banner, BannerKind, CaseNumber, Credentials, PageCursor, RowSnapshot,
};
use fpg_bulletin::portal::selectors::{NOT_FOUND_TEXT, POST_LOGIN_MENU_LABELS, SUCCESS_TITLE};
use fpg_bulletin::portal::{DateField, DialogOutcome, Portal, PortalLauncher, QueryMode};
use fpg_bulletin::services::{CaptchaResolution, CaptchaResolver};
use fpg_bulletin::workflow::RetryPolicy;

/// 门户当前所在画面
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Blank,
    Login,
    Home,
    QueryForm,
    Results { page: u32 },
}

/// 门户的预设内容
#[derive(Debug, Clone)]
pub struct PortalScript {
    /// 正确的验证码
    pub captcha_answer: String,
    /// 查询成功时的结果，每页一组行 id
    pub pages: Vec<Vec<&'static str>>,
    /// 这些行一开始就是已勾选状态
    pub preselected: Vec<&'static str>,
    /// 查询后显示的横幅
    pub banner: Banner,
    /// 跳页总是超时，但页面实际已经跳过去
    pub jump_times_out_but_lands: bool,
    /// 保存总是超时，但勾选实际已保存并回到主画面
    pub save_times_out_but_lands: bool,
    /// 点击下一页后第一次读取页码仍是旧页码
    pub next_page_lands_late: bool,
    /// 下列操作第一次调用时返回超时
    pub fail_once: Vec<&'static str>,
}

impl PortalScript {
    pub fn listing(pages: Vec<Vec<&'static str>>) -> Self {
        Self {
            captcha_answer: "1234".to_string(),
            pages,
            preselected: Vec::new(),
            banner: success_banner(),
            jump_times_out_but_lands: false,
            save_times_out_but_lands: false,
            next_page_lands_late: false,
            fail_once: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        Self {
            banner: Banner {
                kind: BannerKind::Error,
                text: NOT_FOUND_TEXT.to_string(),
            },
            ..Self::listing(vec![])
        }
    }

    fn total_pages(&self) -> u32 {
        (self.pages.len() as u32).max(1)
    }
}

pub fn success_banner() -> Banner {
    Banner {
        kind: BannerKind::Success,
        text: SUCCESS_TITLE.to_string(),
    }
}

/// 门户运行状态与操作记录
#[derive(Debug)]
pub struct PortalState {
    pub script: PortalScript,
    pub screen: Screen,
    pub typed_captcha: Option<String>,
    pub authenticated: bool,
    pub submissions: u32,
    /// 已保存的勾选
    pub saved: HashSet<String>,
    /// 本页已点击但未保存的勾选
    pub pending: HashSet<String>,
    pub events: Vec<String>,
    pub closes: u32,
    failed_once: HashSet<&'static str>,
    /// 尚未反映到页码上的翻页
    stale_cursor_reads: u32,
}

impl PortalState {
    fn new(script: PortalScript) -> Self {
        let saved = script.preselected.iter().map(|id| id.to_string()).collect();
        Self {
            script,
            screen: Screen::Blank,
            typed_captcha: None,
            authenticated: false,
            submissions: 0,
            saved,
            pending: HashSet::new(),
            events: Vec::new(),
            closes: 0,
            failed_once: HashSet::new(),
            stale_cursor_reads: 0,
        }
    }

    fn record(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    /// 脚本指定的操作第一次调用时超时
    fn maybe_fail(&mut self, op: &'static str) -> AppResult<()> {
        if self.script.fail_once.contains(&op) && self.failed_once.insert(op) {
            self.record(format!("timeout:{}", op));
            return Err(AppError::timeout(op, Duration::from_millis(1)));
        }
        Ok(())
    }

    fn current_page(&self) -> AppResult<u32> {
        match self.screen {
            Screen::Results { page } => Ok(page),
            other => Err(AppError::contract(format!("当前不在结果列表: {:?}", other))),
        }
    }

    fn require_form(&self) -> AppResult<()> {
        if self.screen == Screen::QueryForm {
            Ok(())
        } else {
            Err(AppError::contract(format!("当前不在查询主画面: {:?}", self.screen)))
        }
    }
}

/// 脚本化门户
pub struct FakePortal {
    state: Arc<Mutex<PortalState>>,
}

impl FakePortal {
    fn with<T>(&self, f: impl FnOnce(&mut PortalState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait]
impl Portal for FakePortal {
    async fn open_login_page(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.maybe_fail("open_login")?;
            s.record("open_login");
            s.screen = Screen::Login;
            s.typed_captcha = None;
            Ok(())
        })
    }

    async fn refresh_captcha(&mut self) -> AppResult<bool> {
        self.with(|s| {
            s.record("refresh_captcha");
            Ok(true)
        })
    }

    async fn capture_captcha(&mut self) -> AppResult<Vec<u8>> {
        Ok(b"captcha".to_vec())
    }

    async fn fill_login_form(&mut self, _credentials: &Credentials, captcha: &str) -> AppResult<()> {
        self.with(|s| {
            s.typed_captcha = Some(captcha.to_string());
            Ok(())
        })
    }

    async fn submit_login(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.maybe_fail("submit_login")?;
            s.submissions += 1;
            s.record("submit_login");
            if s.typed_captcha.as_deref() == Some(s.script.captcha_answer.as_str()) {
                s.authenticated = true;
                s.screen = Screen::Home;
            }
            Ok(())
        })
    }

    async fn menu_text(&mut self) -> AppResult<Option<String>> {
        self.with(|s| Ok(s.authenticated.then(|| POST_LOGIN_MENU_LABELS.join(" "))))
    }

    async fn open_bulletin(&mut self) -> AppResult<()> {
        self.with(|s| {
            if !s.authenticated {
                return Err(AppError::contract("未登录"));
            }
            s.record("open_bulletin");
            s.screen = Screen::QueryForm;
            Ok(())
        })
    }

    async fn select_query_mode(&mut self, mode: QueryMode) -> AppResult<()> {
        self.with(|s| {
            s.require_form()?;
            s.record(format!("mode:{:?}", mode));
            Ok(())
        })
    }

    async fn pick_date(&mut self, field: DateField, date: NaiveDate) -> AppResult<()> {
        self.with(|s| {
            s.require_form()?;
            s.record(format!("pick_date:{:?}:{}", field, format_date(date)));
            Ok(())
        })
    }

    async fn select_date_kind(&mut self, kind: AnnouncementDateKind) -> AppResult<()> {
        self.with(|s| {
            s.record(format!("date_kind:{:?}", kind));
            Ok(())
        })
    }

    async fn enter_case_number(&mut self, case_number: &CaseNumber) -> AppResult<()> {
        self.with(|s| {
            s.require_form()?;
            s.record(format!("case:{}", case_number));
            Ok(())
        })
    }

    async fn submit_search(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.require_form()?;
            s.maybe_fail("submit_search")?;
            s.record("submit_search");
            s.screen = Screen::Results { page: 1 };
            s.pending.clear();
            Ok(())
        })
    }

    async fn result_banner(&mut self) -> AppResult<Banner> {
        self.with(|s| {
            s.current_page()?;
            Ok(s.script.banner.clone())
        })
    }

    async fn list_rows(&mut self) -> AppResult<Vec<RowSnapshot>> {
        self.with(|s| {
            let page = s.current_page()?;
            s.maybe_fail("list_rows")?;
            let ids = s.script.pages.get(page as usize - 1).cloned().unwrap_or_default();
            Ok(ids
                .into_iter()
                .map(|id| RowSnapshot {
                    id: id.to_string(),
                    checked: s.saved.contains(id) || s.pending.contains(id),
                    row_class: String::new(),
                    label: None,
                })
                .collect())
        })
    }

    async fn toggle_row(&mut self, row_id: &str) -> AppResult<DialogOutcome> {
        self.with(|s| {
            let page = s.current_page()?;
            s.record(format!("toggle:{}:{}", page, row_id));
            if !s.pending.remove(row_id) {
                s.pending.insert(row_id.to_string());
            }
            Ok(DialogOutcome::Dismissed {
                message: "確定勾選?".to_string(),
            })
        })
    }

    async fn save_selections(&mut self) -> AppResult<()> {
        self.with(|s| {
            let page = s.current_page()?;
            s.record(format!("save:{}", page));
            let pending: Vec<String> = s.pending.drain().collect();
            s.saved.extend(pending);
            // 保存后门户回到查询主画面
            s.screen = Screen::QueryForm;
            if s.script.save_times_out_but_lands {
                return Err(AppError::timeout("保存", Duration::from_millis(1)));
            }
            Ok(())
        })
    }

    async fn on_query_form(&mut self) -> AppResult<bool> {
        self.with(|s| Ok(s.screen == Screen::QueryForm))
    }

    async fn page_cursor(&mut self) -> AppResult<PageCursor> {
        self.with(|s| {
            let page = s.current_page()?;
            s.maybe_fail("page_cursor")?;
            let page = if s.stale_cursor_reads > 0 {
                s.stale_cursor_reads -= 1;
                page - 1
            } else {
                page
            };
            Ok(PageCursor {
                current_page: page,
                total_pages: s.script.total_pages(),
            })
        })
    }

    async fn jump_to_page(&mut self, page: u32) -> AppResult<()> {
        self.with(|s| {
            s.current_page()?;
            s.record(format!("jump:{}", page));
            s.screen = Screen::Results { page };
            s.pending.clear();
            if s.script.jump_times_out_but_lands {
                return Err(AppError::timeout("跳页", Duration::from_millis(1)));
            }
            Ok(())
        })
    }

    async fn next_page(&mut self) -> AppResult<()> {
        self.with(|s| {
            let page = s.current_page()?;
            s.maybe_fail("next_page")?;
            s.record(format!("next:{}", page + 1));
            s.screen = Screen::Results { page: page + 1 };
            s.pending.clear();
            if s.script.next_page_lands_late {
                s.stale_cursor_reads = 1;
            }
            Ok(())
        })
    }

    async fn back_to_main(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.record("back_to_main");
            s.screen = Screen::QueryForm;
            Ok(())
        })
    }

    async fn reload(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.record("reload");
            Ok(())
        })
    }

    async fn screenshot(&mut self) -> AppResult<Vec<u8>> {
        Ok(Vec::new())
    }

    async fn close(&mut self) -> AppResult<()> {
        self.with(|s| {
            s.closes += 1;
            Ok(())
        })
    }
}

/// 统计会话打开次数的启动器，克隆后共享同一份状态
#[derive(Clone)]
pub struct FakeLauncher {
    pub state: Arc<Mutex<PortalState>>,
    pub opens: Arc<AtomicUsize>,
}

impl FakeLauncher {
    pub fn new(script: PortalScript) -> Self {
        Self {
            state: Arc::new(Mutex::new(PortalState::new(script))),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn portal(&self) -> FakePortal {
        FakePortal {
            state: self.state.clone(),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.state.lock().unwrap().closes
    }

    pub fn submissions(&self) -> u32 {
        self.state.lock().unwrap().submissions
    }
}

#[async_trait]
impl PortalLauncher for FakeLauncher {
    type Portal = FakePortal;

    async fn open(&self) -> AppResult<FakePortal> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(self.portal())
    }
}

/// 按顺序返回预设结果的验证码识别，用完后一直返回最后一个
pub struct ScriptedResolver {
    answers: Mutex<VecDeque<CaptchaResolution>>,
    last: CaptchaResolution,
    pub calls: AtomicUsize,
}

impl ScriptedResolver {
    pub fn new(answers: Vec<CaptchaResolution>) -> Arc<Self> {
        let last = answers.last().cloned().unwrap_or(CaptchaResolution::Failure);
        Arc::new(Self {
            answers: Mutex::new(answers.into()),
            last,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(answer: CaptchaResolution) -> Arc<Self> {
        Self::new(vec![answer])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptchaResolver for ScriptedResolver {
    async fn resolve(&self, _image: &[u8]) -> CaptchaResolution {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.last.clone())
    }
}

pub fn solved(code: &str) -> CaptchaResolution {
    CaptchaResolution::Solved(code.to_string())
}

/// 所有等待为零的时序
pub fn instant_timings() -> Timings {
    Timings {
        navigation_timeout: Duration::from_millis(50),
        element_timeout: Duration::from_millis(50),
        popup_timeout: Duration::from_millis(50),
        captcha_refresh_delay: Duration::ZERO,
        ocr_settle_delay: Duration::ZERO,
        dialog_window: Duration::ZERO,
        row_settle_delay: Duration::ZERO,
    }
}

pub fn instant_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        step: Duration::ZERO,
    }
}

pub fn credentials() -> Credentials {
    Credentials::new("tester", "secret")
}

/// 事件中以 `prefix` 开头的部分
pub fn events_with(events: &[String], prefix: &str) -> Vec<String> {
    events.iter().filter(|e| e.starts_with(prefix)).cloned().collect()
}
