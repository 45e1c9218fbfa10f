pub mod dialog_guard;
pub mod js_executor;

pub use dialog_guard::{guarded, race_dialog};
pub use js_executor::JsExecutor;
