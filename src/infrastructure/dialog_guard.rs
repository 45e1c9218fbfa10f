//! 原生对话框保护
//!
//! 勾选框的点击会同步弹出 confirm/alert，而对话框打开期间页面会阻塞，
//! 点击命令本身也不会返回。所以点击必须与"等待对话框"并发执行：
//! 观察到对话框就关闭它，窗口期内没有出现就当作没有对话框。
//! 每次操作只消费一个事件，不会对同一次点击重复关闭。

use std::future::Future;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::error::AppResult;
use crate::portal::DialogOutcome;

/// 在 `window` 内等待第一个对话框事件并用 `dismiss` 关闭
pub async fn race_dialog<S, D, DF>(events: &mut S, window: Duration, dismiss: D) -> AppResult<DialogOutcome>
where
    S: Stream<Item = String> + Unpin,
    D: FnOnce() -> DF,
    DF: Future<Output = AppResult<()>>,
{
    match timeout(window, events.next()).await {
        Ok(Some(message)) => {
            info!("检测到弹出视窗，正在关闭: {}", message);
            dismiss().await?;
            Ok(DialogOutcome::Dismissed { message })
        }
        Ok(None) => {
            debug!("对话框事件流已结束");
            Ok(DialogOutcome::NoDialog)
        }
        Err(_) => {
            debug!("{:?} 内未出现对话框", window);
            Ok(DialogOutcome::NoDialog)
        }
    }
}

/// 并发执行 `action` 与对话框等待，两者都完成后返回
pub async fn guarded<A, S, D, DF>(
    action: A,
    events: &mut S,
    window: Duration,
    dismiss: D,
) -> AppResult<DialogOutcome>
where
    A: Future<Output = AppResult<()>>,
    S: Stream<Item = String> + Unpin,
    D: FnOnce() -> DF,
    DF: Future<Output = AppResult<()>>,
{
    let (action_result, outcome) = tokio::join!(action, race_dialog(events, window, dismiss));
    action_result?;
    outcome
}
