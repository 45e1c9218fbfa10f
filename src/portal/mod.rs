//! 门户适配层
//!
//! 把脆弱的页面选择器收拢在一个窄接口后面：
//! - `Portal` 是流程层唯一能看到的页面能力
//! - `ChromePortal` 是针对真实门户的 chromiumoxide 实现
//! - 测试中用脚本化的替身实现同一接口
//!
//! 所有方法都取 `&mut self`：一个会话同一时刻只被一个操作使用。

pub mod chrome;
pub mod selectors;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::AppResult;
use crate::models::{AnnouncementDateKind, Banner, CaseNumber, Credentials, PageCursor, RowSnapshot};

pub use chrome::{ChromeLauncher, ChromePortal};

/// 查询表单的输入模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    ByDate,
    ByCaseNumber,
}

/// 日期选择器对应的输入框
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Start,
    End,
}

/// 点击勾选框后原生对话框的观察结果，两种都视为正常
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Dismissed { message: String },
    NoDialog,
}

/// 门户页面能力
#[async_trait]
pub trait Portal: Send {
    // ---------- 登录页 ----------

    /// 导航到登录页并等待加载完成
    async fn open_login_page(&mut self) -> AppResult<()>;

    /// 点击验证码刷新按钮；页面上没有该按钮时返回 `false`
    async fn refresh_captcha(&mut self) -> AppResult<bool>;

    /// 截取验证码图片区域
    async fn capture_captcha(&mut self) -> AppResult<Vec<u8>>;

    async fn fill_login_form(&mut self, credentials: &Credentials, captcha: &str) -> AppResult<()>;

    /// 点击登录并等待导航完成
    async fn submit_login(&mut self) -> AppResult<()>;

    /// 登录后菜单区域的文字，不存在时为 `None`
    async fn menu_text(&mut self) -> AppResult<Option<String>>;

    // ---------- 查询表单 ----------

    /// 进入标售公报查询主画面
    async fn open_bulletin(&mut self) -> AppResult<()>;

    async fn select_query_mode(&mut self, mode: QueryMode) -> AppResult<()>;

    /// 打开日期选择弹窗，点击目标日期，等待弹窗关闭
    async fn pick_date(&mut self, field: DateField, date: NaiveDate) -> AppResult<()>;

    async fn select_date_kind(&mut self, kind: AnnouncementDateKind) -> AppResult<()>;

    async fn enter_case_number(&mut self, case_number: &CaseNumber) -> AppResult<()>;

    /// 点击查询并等待结果区域出现，超时视为失败
    async fn submit_search(&mut self) -> AppResult<()>;

    // ---------- 结果列表 ----------

    /// 等待成功或错误横幅出现并读取
    async fn result_banner(&mut self) -> AppResult<Banner>;

    /// 当前页的可勾选行，不跨页访问
    async fn list_rows(&mut self) -> AppResult<Vec<RowSnapshot>>;

    /// 在对话框自动关闭保护下点击一行的勾选框
    async fn toggle_row(&mut self, row_id: &str) -> AppResult<DialogOutcome>;

    /// 提交当前页的勾选，成功后门户回到查询主画面
    async fn save_selections(&mut self) -> AppResult<()>;

    /// 当前是否停在查询主画面
    async fn on_query_form(&mut self) -> AppResult<bool>;

    async fn page_cursor(&mut self) -> AppResult<PageCursor>;

    /// 在跳页输入框填入页码并点击前往
    async fn jump_to_page(&mut self, page: u32) -> AppResult<()>;

    async fn next_page(&mut self) -> AppResult<()>;

    async fn back_to_main(&mut self) -> AppResult<()>;

    async fn reload(&mut self) -> AppResult<()>;

    // ---------- 会话 ----------

    /// 整页截图（PNG）
    async fn screenshot(&mut self) -> AppResult<Vec<u8>>;

    /// 释放浏览器会话，可重复调用
    async fn close(&mut self) -> AppResult<()>;
}

/// 打开一个新的门户会话
#[async_trait]
pub trait PortalLauncher: Send + Sync {
    type Portal: Portal;

    async fn open(&self) -> AppResult<Self::Portal>;
}
