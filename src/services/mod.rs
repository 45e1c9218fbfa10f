pub mod captcha_service;
pub mod diagnostics;
pub mod ocr_client;

pub use captcha_service::{cleanup_temp_files, CaptchaResolution, CaptchaResolver, CaptchaSolver};
pub use diagnostics::Diagnostics;
pub use ocr_client::{AzureReadClient, OcrBackend};
