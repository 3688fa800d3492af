//! 外部 URL 信誉检查
//!
//! ingestion 的可选前置探测。只有明确标记恶意才拒绝；服务出错时
//! fail-open（由调用方记日志放行）。

use std::time::Duration;

use async_trait::async_trait;
use tracing::trace;

/// 扫描结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    Clean,
    /// 带原因的恶意标记
    Flagged(String),
}

#[async_trait]
pub trait UrlScanner: Send + Sync {
    /// Err 表示服务不可用（调用方 fail-open），Flagged 才是拒绝
    async fn scan(&self, url: &str) -> anyhow::Result<ScanVerdict>;
}

/// HTTP API 扫描器
///
/// `api_url_template` 使用 `{url}` 作为占位符，目标 URL 会被转义。
/// 预期响应: `{"malicious": bool, "reason": "..."}`
pub struct HttpScanner {
    client: reqwest::Client,
    api_url_template: String,
}

impl HttpScanner {
    pub fn new(api_url_template: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(3))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url_template: api_url_template.to_string(),
        }
    }
}

#[async_trait]
impl UrlScanner for HttpScanner {
    async fn scan(&self, url: &str) -> anyhow::Result<ScanVerdict> {
        let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
        let api_url = self.api_url_template.replace("{url}", &encoded);

        let resp = self.client.get(&api_url).send().await?;
        let json: serde_json::Value = resp.json().await?;

        if json["malicious"].as_bool().unwrap_or(false) {
            let reason = json["reason"]
                .as_str()
                .unwrap_or("flagged by reputation service")
                .to_string();
            return Ok(ScanVerdict::Flagged(reason));
        }

        trace!("Reputation scan clean: {}", url);
        Ok(ScanVerdict::Clean)
    }
}
