//! IP 地址处理工具
//!
//! 提供统一的客户端 IP 提取功能，以及开放重定向防护需要的
//! 私有/保留地址段判断。

use std::net::{IpAddr, Ipv4Addr};

use actix_web::HttpRequest;

/// 检查 IPv4 是否落在禁止作为重定向目标的地址段
///
/// 覆盖：10/8、172.16/12、192.168/16、169.254/16、127/8
pub fn is_forbidden_ipv4(ip: &Ipv4Addr) -> bool {
    ip.is_private() || ip.is_loopback() || ip.is_link_local()
}

/// 检查 IP 是否为私有地址或 localhost
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_ipv4(v4),
        IpAddr::V6(v6) => {
            // IPv6 私有地址：
            // - fc00::/7 (ULA, RFC 4193)
            // - fe80::/10 (Link-local)
            // - ::1 (Loopback)
            v6.is_loopback()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// 从 HttpRequest 提取真实客户端 IP
///
/// 优先 X-Forwarded-For（取第一个，即原始客户端 IP），其次 X-Real-IP，
/// 最后回退到连接 peer 地址。
pub fn extract_client_ip(req: &HttpRequest) -> Option<String> {
    extract_forwarded_ip(req.headers()).or_else(|| {
        req.connection_info()
            .peer_addr()
            .map(|addr| addr.to_string())
    })
}

/// 从 HeaderMap 提取转发的 IP
pub fn extract_forwarded_ip(headers: &actix_web::http::header::HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        })
}
