//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的资源与流程调度。
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (一次运行，一个浏览器会话)
//!     ↓
//! workflow (LoginFlow → SearchFlow → PaginationFlow)
//!     ↓
//! portal (Portal 接口，ChromePortal 实现)   services (验证码识别 / 诊断输出)
//!     ↓
//! infrastructure (JsExecutor / 对话框保护)
//! ```
//!
//! ## 设计原则
//!
//! 1. **资源隔离**：只有编排层打开和关闭浏览器会话
//! 2. **向下依赖**：编排层 → workflow → portal / services → infrastructure
//! 3. **无页面细节**：只做调度和统计，不认识任何选择器

pub mod app;

pub use app::{App, RunReport};
