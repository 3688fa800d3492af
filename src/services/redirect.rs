//! 重定向分发器
//!
//! code 解析、目标校验、状态码选择与异步记账。步骤 6 的副作用
//! （计数 + 事件发布）在独立任务里执行，与响应完全隔离：HTTP 请求
//! 被取消也不影响已调度的后台任务。

use std::net::IpAddr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{error, trace};
use url::{Host, Url};

use crate::analytics::enrich::{GeoIpLookup, parse_user_agent};
use crate::errors::Result;
use crate::events::{HitEvent, HitEventBus};
use crate::services::url_service::UrlService;
use crate::utils::ip::{is_forbidden_ipv4, is_private_or_local};
use crate::utils::is_valid_code;

/// 禁止的目标主机名（环回别名）
const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

/// 可疑 TLD 集合
///
/// 策略而非安全边界：这些域名大量用于一次性恶意跳转。
const SUSPICIOUS_TLDS: &[&str] = &[".tk", ".ml", ".ga", ".cf"];

/// 稳定大站允许 301 永久重定向；其余用 302 保留换目标的余地
const PERMANENT_REDIRECT_HOSTS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "github.com",
    "gitlab.com",
    "twitter.com",
    "x.com",
    "facebook.com",
    "instagram.com",
    "linkedin.com",
    "medium.com",
    "stackoverflow.com",
];

/// 一次重定向请求携带的客户端上下文
#[derive(Debug, Clone, Default)]
pub struct RedirectContext {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub referrer: Option<String>,
}

/// 解析结果（HTTP 层翻译成响应）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// 执行重定向；permanent 决定 301/302
    Redirect { location: String, permanent: bool },
    InvalidCode,
    NotFound,
    Gone,
    /// 开放重定向防护拒绝
    InvalidTarget,
}

pub struct RedirectDispatcher {
    url_service: Arc<UrlService>,
    bus: Arc<dyn HitEventBus>,
    geo: Arc<dyn GeoIpLookup>,
}

impl RedirectDispatcher {
    pub fn new(
        url_service: Arc<UrlService>,
        bus: Arc<dyn HitEventBus>,
        geo: Arc<dyn GeoIpLookup>,
    ) -> Self {
        Self {
            url_service,
            bus,
            geo,
        }
    }

    /// 同步部分：解析 code 并决定响应
    pub async fn resolve(&self, code: &str) -> Result<RedirectOutcome> {
        if !is_valid_code(code) {
            trace!("Invalid code rejected: {}", code);
            return Ok(RedirectOutcome::InvalidCode);
        }

        let Some(target) = self.url_service.resolve(code).await? else {
            return Ok(RedirectOutcome::NotFound);
        };

        if target.is_expired() {
            return Ok(RedirectOutcome::Gone);
        }

        if !is_safe_redirect_target(&target.original) {
            // 安全级别日志：存量数据里出现了被策略禁止的目标
            error!(
                "Open-redirect guard rejected target for '{}': {}",
                code, target.original
            );
            return Ok(RedirectOutcome::InvalidTarget);
        }

        Ok(RedirectOutcome::Redirect {
            permanent: is_permanent_host(&target.original),
            location: target.original,
        })
    }

    /// 异步部分：计数 + 富化 + 事件发布，永不阻塞/失败响应
    pub fn record_hit(&self, code: &str, ctx: RedirectContext) {
        let url_service = Arc::clone(&self.url_service);
        let bus = Arc::clone(&self.bus);
        let geo = Arc::clone(&self.geo);
        let code = code.to_string();

        tokio::spawn(async move {
            url_service.increment_hit_count(&code, 1).await;

            // ip / user_agent 是 HitEvent 必填字段；缺了只记计数
            let (Some(ip), Some(user_agent)) = (ctx.ip, ctx.user_agent) else {
                trace!("Skipping hit event for '{}': missing client context", code);
                return;
            };

            let ua_info = parse_user_agent(&user_agent);

            // 私有/本地 IP 不查 GeoIP
            let geo_info = match ip.parse::<IpAddr>() {
                Ok(addr) if is_private_or_local(&addr) => None,
                _ => geo.lookup(&ip).await,
            };

            let event = HitEvent {
                code,
                timestamp: Utc::now(),
                ip,
                user_agent,
                referrer: ctx.referrer,
                country: geo_info.as_ref().and_then(|g| g.country.clone()),
                city: geo_info.as_ref().and_then(|g| g.city.clone()),
                device_type: ua_info.device_type,
                browser: ua_info.browser,
                os: ua_info.os,
            };

            bus.publish(event).await;
        });
    }
}

/// 开放重定向防护
///
/// scheme 必须是 http/https，主机不能是环回或私有网段的 IPv4 字面量，
/// TLD 不在可疑集合里。
pub fn is_safe_redirect_target(original: &str) -> bool {
    let Ok(url) = Url::parse(original) else {
        return false;
    };

    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }

    let Some(host) = url.host() else {
        return false;
    };

    match host {
        Host::Domain(domain) => {
            let domain = domain.to_ascii_lowercase();
            if LOOPBACK_HOSTS.contains(&domain.as_str()) {
                return false;
            }
            if SUSPICIOUS_TLDS.iter().any(|tld| domain.ends_with(tld)) {
                return false;
            }
            // 域名伪装成 IPv4 字面量的情况由 url 解析器归类为 Ipv4
            true
        }
        Host::Ipv4(addr) => !is_forbidden_ipv4(&addr),
        Host::Ipv6(addr) => !is_private_or_local(&IpAddr::V6(addr)),
    }
}

/// 有效主机（去掉 www. 前缀）在稳定站点名单里则给 301
pub fn is_permanent_host(original: &str) -> bool {
    let Ok(url) = Url::parse(original) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    let host = host.to_ascii_lowercase();
    let effective = host.strip_prefix("www.").unwrap_or(&host);
    PERMANENT_REDIRECT_HOSTS.contains(&effective)
}
