pub mod login_flow;
pub mod pagination_flow;
pub mod retry;
pub mod search_flow;

pub use login_flow::{is_authenticated, LoginFlow, LoginReport, LoginState, MAX_LOGIN_ATTEMPTS};
pub use pagination_flow::{PaginationFlow, PaginationReport};
pub use retry::RetryPolicy;
pub use search_flow::{classify_banner, SearchFlow};
