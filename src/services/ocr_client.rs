//! OCR 后端 - 业务能力层
//!
//! Azure Computer Vision Read API：先提交图片拿到操作地址，
//! 分析完成后再到该地址取结果。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{AppError, AppResult};

const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";
const OPERATION_LOCATION_HEADER: &str = "operation-location";
const READ_ANALYZE_PATH: &str = "vision/v3.2/read/analyze";

/// Read API 的分析结果
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadOperation {
    pub status: String,
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    #[serde(default)]
    pub read_results: Vec<ReadPage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadPage {
    #[serde(default)]
    pub lines: Vec<ReadLine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReadLine {
    pub text: String,
}

impl ReadOperation {
    /// 取出第一页的所有文字行，以空格连接
    pub fn text(&self) -> AppResult<String> {
        if self.status != "succeeded" {
            return Err(AppError::Ocr(format!("分析失败或未完成。状态: {}", self.status)));
        }

        let lines = self
            .analyze_result
            .as_ref()
            .and_then(|result| result.read_results.first())
            .map(|page| page.lines.as_slice())
            .unwrap_or_default();

        if lines.is_empty() {
            return Err(AppError::Ocr("分析结果中未找到文字行".to_string()));
        }

        Ok(lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// OCR 后端
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// 提交图片，返回操作句柄
    async fn submit(&self, image: Vec<u8>) -> AppResult<String>;

    /// 获取操作结果
    async fn fetch(&self, operation: &str) -> AppResult<ReadOperation>;
}

/// Azure Read API 客户端
pub struct AzureReadClient {
    http: reqwest::Client,
    analyze_url: String,
    api_key: String,
}

impl AzureReadClient {
    pub fn new(endpoint: &str, api_key: &str) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let endpoint = if endpoint.ends_with('/') {
            endpoint.to_string()
        } else {
            format!("{}/", endpoint)
        };

        Ok(Self {
            http,
            analyze_url: format!("{}{}", endpoint, READ_ANALYZE_PATH),
            api_key: api_key.to_string(),
        })
    }

    pub fn analyze_url(&self) -> &str {
        &self.analyze_url
    }
}

#[async_trait]
impl OcrBackend for AzureReadClient {
    async fn submit(&self, image: Vec<u8>) -> AppResult<String> {
        debug!("提交验证码图片: {} 字节", image.len());

        let response = self
            .http
            .post(&self.analyze_url)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(image)
            .send()
            .await?;

        if response.status() != StatusCode::ACCEPTED {
            return Err(AppError::Ocr(format!("未预期的响应状态: {}", response.status())));
        }

        response
            .headers()
            .get(OPERATION_LOCATION_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| AppError::Ocr("未收到 operation-location 标头".to_string()))
    }

    async fn fetch(&self, operation: &str) -> AppResult<ReadOperation> {
        let result = self
            .http
            .get(operation)
            .header(SUBSCRIPTION_KEY_HEADER, &self.api_key)
            .send()
            .await?
            .json::<ReadOperation>()
            .await?;

        debug!("OCR 分析状态: {}", result.status);
        Ok(result)
    }
}
