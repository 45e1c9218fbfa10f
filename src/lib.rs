//! # FPG Bulletin
//!
//! 政府采购标售公报门户的自动化：验证码登录、按日期或案号查询、逐页勾选并保存
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接浏览器，管理会话生命周期
//! - `infrastructure/` - `JsExecutor` 持有 Page，只暴露执行 / 点击 / 等待能力；对话框保护
//!
//! ### ② 门户适配层（Portal）
//! - `portal/` - `Portal` 接口与选择器，`ChromePortal` 是唯一认识页面结构的实现
//!
//! ### ③ 业务能力层（Services）
//! - `CaptchaSolver` - 验证码图片 → 4 位数字
//! - `AzureReadClient` - OCR 后端
//! - `Diagnostics` - 截图与失败记录
//!
//! ### ④ 流程层（Workflow）
//! - `LoginFlow` - 有限次数的验证码登录
//! - `SearchFlow` - 查询与结果分类
//! - `PaginationFlow` - 逐页勾选、保存、重新进入
//!
//! ### ⑤ 编排层（Orchestration）
//! - `orchestrator::App` - 校验输入、持有唯一会话、调度流程、确保释放
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod portal;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{SearchCriteria, SearchRequest, SearchResult};
pub use orchestrator::{App, RunReport};
pub use portal::{Portal, PortalLauncher};
