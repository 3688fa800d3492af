//! 命中事件富化
//!
//! 地理与 UA 两路可插拔 provider。两者都是尽力而为：查不到就留空，
//! 永远不让富化失败影响重定向或事件发布。

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace, warn};
use woothee::parser::Parser;

/// 地理位置信息
#[derive(Debug, Clone, Default)]
pub struct GeoInfo {
    /// ISO 3166-1 alpha-2 国家代码 (e.g., "CN", "US")
    pub country: Option<String>,
    /// 城市名称
    pub city: Option<String>,
}

/// GeoIP 查询 trait
#[async_trait]
pub trait GeoIpLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo>;

    /// provider 名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 关闭地理富化时的空实现
pub struct NullGeoProvider;

#[async_trait]
impl GeoIpLookup for NullGeoProvider {
    async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
        None
    }

    fn name(&self) -> &'static str {
        "null"
    }
}

/// 外部 API GeoIP Provider
///
/// `api_url_template` 使用 `{ip}` 作为占位符，
/// 例如: `http://ip-api.com/json/{ip}?fields=countryCode,city`
pub struct ExternalGeoProvider {
    client: reqwest::Client,
    api_url_template: String,
}

impl ExternalGeoProvider {
    pub fn new(api_url_template: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap_or_default();

        Self {
            client,
            api_url_template: api_url_template.to_string(),
        }
    }
}

#[async_trait]
impl GeoIpLookup for ExternalGeoProvider {
    async fn lookup(&self, ip: &str) -> Option<GeoInfo> {
        let url = self.api_url_template.replace("{ip}", ip);

        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("GeoIP API request failed for {}: {}", ip, e);
                return None;
            }
        };

        let json: serde_json::Value = match resp.json().await {
            Ok(j) => j,
            Err(e) => {
                warn!("GeoIP API response parse failed for {}: {}", ip, e);
                return None;
            }
        };

        let country = json["countryCode"]
            .as_str()
            .or_else(|| json["country_code"].as_str())
            .map(String::from);
        let city = json["city"].as_str().map(String::from);

        trace!("GeoIP lookup {} -> {:?}/{:?}", ip, country, city);
        Some(GeoInfo { country, city })
    }

    fn name(&self) -> &'static str {
        "external-api"
    }
}

/// 按配置选择 provider
pub fn build_geo_provider(api_url: &str) -> Box<dyn GeoIpLookup> {
    if api_url.is_empty() {
        debug!("GeoIP: disabled (no API configured)");
        Box::new(NullGeoProvider)
    } else {
        debug!("GeoIP: using external API provider");
        Box::new(ExternalGeoProvider::new(api_url))
    }
}

/// 解析后的 UA 分类
#[derive(Debug, Clone, Default)]
pub struct UaInfo {
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
}

/// 使用 woothee 解析 UserAgent
///
/// woothee 的 category 映射到 device_type：pc → desktop，
/// smartphone → mobile，crawler → bot，其余归 unknown。
pub fn parse_user_agent(ua: &str) -> UaInfo {
    if ua.is_empty() {
        return UaInfo::default();
    }

    let parser = Parser::new();
    let Some(result) = parser.parse(ua) else {
        return UaInfo::default();
    };

    let device_type = match result.category {
        "pc" => Some("desktop".to_string()),
        "smartphone" => Some("mobile".to_string()),
        "mobilephone" => Some("mobile".to_string()),
        "appliance" => Some("tablet".to_string()),
        "crawler" => Some("bot".to_string()),
        _ => None,
    };

    let browser = match result.name {
        "UNKNOWN" | "" => None,
        name => Some(name.to_string()),
    };

    let os = match result.os {
        "UNKNOWN" | "" => None,
        os => Some(os.to_string()),
    };

    UaInfo {
        device_type,
        browser,
        os,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_desktop_chrome() {
        let ua = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                  (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
        let info = parse_user_agent(ua);
        assert_eq!(info.device_type.as_deref(), Some("desktop"));
        assert_eq!(info.browser.as_deref(), Some("Chrome"));
        assert!(info.os.is_some());
    }

    #[test]
    fn test_parse_bot() {
        let ua = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
        let info = parse_user_agent(ua);
        assert_eq!(info.device_type.as_deref(), Some("bot"));
    }

    #[test]
    fn test_parse_garbage() {
        // 解析失败时全部留空，由存储层填 unknown
        let info = parse_user_agent("definitely-not-a-real-agent");
        assert!(info.device_type.is_none());
    }

    #[test]
    fn test_empty_ua() {
        let info = parse_user_agent("");
        assert!(info.device_type.is_none());
        assert!(info.browser.is_none());
        assert!(info.os.is_none());
    }

    #[tokio::test]
    async fn test_null_provider() {
        let provider = NullGeoProvider;
        assert!(provider.lookup("8.8.8.8").await.is_none());
    }
}
