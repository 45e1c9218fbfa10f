//! 日志工具模块
//!
//! 初始化 tracing 订阅者，并提供启动与结束时的日志输出

use std::path::Path;
use std::sync::OnceLock;

use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::error::AppResult;
use crate::models::SearchCriteria;

/// 配置加载后用来调整日志级别
static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn build_filter(verbose: bool) -> EnvFilter {
    let default_level = if verbose { "fpg_bulletin=debug,info" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 初始化日志订阅者
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info。
/// 可以在读取配置之前调用，之后再用 [`set_verbose`] 调整。
///
/// # 参数
/// - `verbose`: 是否输出本 crate 的 debug 日志
pub fn init(verbose: bool) {
    let (filter, handle) = reload::Layer::new(build_filter(verbose));

    // 重复初始化（例如测试中）时忽略
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
    if installed.is_ok() {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// 按配置重新设置日志级别，未初始化时什么也不做
pub fn set_verbose(verbose: bool) {
    if let Some(handle) = FILTER_HANDLE.get() {
        if let Err(e) = handle.reload(build_filter(verbose)) {
            warn!("调整日志级别失败: {}", e);
        }
    }
}

/// 初始化失败记录文件
pub fn init_log_file(log_file_path: &Path) -> AppResult<()> {
    let log_header = format!(
        "{}\n标售公报处理日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    std::fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(criteria: &SearchCriteria) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 标售公报自动勾选");
    info!("🔍 查询条件: {}", criteria);
    info!("{}", "=".repeat(60));
}

/// 打印最终统计信息
pub fn print_final_stats(login_attempts: u32, visited_pages: usize, saved_pages: usize, selected_rows: usize) {
    info!("\n{}", "=".repeat(60));
    info!("📊 处理完成统计");
    info!("完成时间: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("{}", "=".repeat(60));
    info!("🔐 登录尝试: {} 次", login_attempts);
    info!("📄 访问页数: {}", visited_pages);
    info!("💾 保存页数: {}", saved_pages);
    info!("✅ 勾选行数: {}", selected_rows);
    info!("{}", "=".repeat(60));
}
