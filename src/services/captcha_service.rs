//! 验证码识别服务 - 业务能力层
//!
//! 把 OCR 调用包装成 `resolve(image) -> 4 位数字 | Failure`：
//! 1. 图片等比缩放到固定画布（白底居中）
//! 2. 提交 OCR，等待固定时长后取结果
//! 3. 去掉非数字字符，校验恰好 4 位
//!
//! 任何错误都转换为 `Failure`，不向调用方抛出。

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::error::AppResult;
use crate::services::ocr_client::OcrBackend;

/// OCR 对输入尺寸敏感，统一缩放到该画布
pub const CAPTCHA_CANVAS_WIDTH: u32 = 200;
pub const CAPTCHA_CANVAS_HEIGHT: u32 = 100;

const ORIGINAL_FILE: &str = "captcha_original.png";
const RESIZED_FILE: &str = "captcha_resized.png";

/// 识别结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptchaResolution {
    Solved(String),
    Failure,
}

impl CaptchaResolution {
    /// 只有恰好 4 位数字才可用于提交
    pub fn usable_code(&self) -> Option<&str> {
        match self {
            CaptchaResolution::Solved(code) if is_valid_captcha(code) => Some(code),
            _ => None,
        }
    }
}

/// 验证码识别能力
#[async_trait]
pub trait CaptchaResolver: Send + Sync {
    async fn resolve(&self, image: &[u8]) -> CaptchaResolution;
}

pub fn is_valid_captcha(text: &str) -> bool {
    text.len() == 4 && text.chars().all(|c| c.is_ascii_digit())
}

/// 去掉所有非数字字符后校验
pub fn process_captcha_text(text: &str) -> CaptchaResolution {
    let cleaned: String = text.chars().filter(|c| c.is_ascii_digit()).collect();
    if is_valid_captcha(&cleaned) {
        CaptchaResolution::Solved(cleaned)
    } else {
        CaptchaResolution::Failure
    }
}

/// 等比缩放到固定画布，空白处填白色，输出 PNG
pub fn normalize_image(bytes: &[u8]) -> AppResult<Vec<u8>> {
    let original = image::load_from_memory(bytes)?;
    let fitted = original
        .resize(CAPTCHA_CANVAS_WIDTH, CAPTCHA_CANVAS_HEIGHT, FilterType::Lanczos3)
        .to_rgba8();

    let mut canvas = RgbaImage::from_pixel(
        CAPTCHA_CANVAS_WIDTH,
        CAPTCHA_CANVAS_HEIGHT,
        Rgba([255, 255, 255, 255]),
    );
    let x = (CAPTCHA_CANVAS_WIDTH - fitted.width()) / 2;
    let y = (CAPTCHA_CANVAS_HEIGHT - fitted.height()) / 2;
    imageops::overlay(&mut canvas, &fitted, i64::from(x), i64::from(y));

    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(canvas).write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}

/// 基于 OCR 后端的验证码识别
pub struct CaptchaSolver<B> {
    backend: B,
    settle_delay: Duration,
    /// 中间图片的保存目录，`None` 时不保存
    artifact_dir: Option<PathBuf>,
}

impl<B: OcrBackend> CaptchaSolver<B> {
    pub fn new(backend: B, settle_delay: Duration) -> Self {
        Self {
            backend,
            settle_delay,
            artifact_dir: None,
        }
    }

    /// 保存原图与缩放后的图片，便于排查识别失败
    pub fn with_artifacts(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    async fn try_resolve(&self, image: &[u8]) -> AppResult<String> {
        self.persist(ORIGINAL_FILE, image).await;
        let resized = normalize_image(image)?;
        self.persist(RESIZED_FILE, &resized).await;

        let operation = self.backend.submit(resized).await?;
        // 后端是最终一致的，提交后需要等待分析完成
        sleep(self.settle_delay).await;
        let result = self.backend.fetch(&operation).await?;
        result.text()
    }

    async fn persist(&self, name: &str, bytes: &[u8]) {
        if let Some(dir) = &self.artifact_dir {
            let path = dir.join(name);
            if let Err(e) = tokio::fs::write(&path, bytes).await {
                warn!("保存验证码图片失败 {}: {}", path.display(), e);
            }
        }
    }
}

#[async_trait]
impl<B: OcrBackend> CaptchaResolver for CaptchaSolver<B> {
    async fn resolve(&self, image: &[u8]) -> CaptchaResolution {
        match self.try_resolve(image).await {
            Ok(text) => {
                debug!("OCR 原始文字: {:?}", text);
                let resolution = process_captcha_text(&text);
                if resolution == CaptchaResolution::Failure {
                    info!("验证码文字不是 4 位数字: {:?}", text);
                }
                resolution
            }
            Err(e) => {
                warn!("解析验证码时发生错误: {}", e);
                CaptchaResolution::Failure
            }
        }
    }
}

/// 删除验证码中间图片，文件不存在时忽略
pub async fn cleanup_temp_files(dir: &Path) {
    for name in [ORIGINAL_FILE, RESIZED_FILE] {
        let path = dir.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => debug!("已删除 {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("删除 {} 失败: {}", path.display(), e),
        }
    }
}
