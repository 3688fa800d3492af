//! URL 规范化模块
//!
//! 从 original 生成 normalized（仅用于去重的稳定键）：
//! - host 小写，路径大小写保持
//! - 剥离 scheme 默认端口（http:80 / https:443）
//! - 路径末尾斜杠去除（根路径 `/` 除外）
//! - 丢弃营销追踪参数，其余 query 参数按原顺序保留
//! - 丢弃 fragment 与空 query（见 DESIGN.md 的决策记录）
//! - 解析失败时原样返回（非法输入由 ingestion 层单独拒绝）

use url::Url;

/// 追踪参数集合：这些参数不改变目标页面，只携带营销噪音
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "msclkid",
    "dclid",
    "source",
    "medium",
    "campaign",
];

/// 判断 query 参数名是否属于追踪集合
fn is_tracking_param(name: &str) -> bool {
    TRACKING_PARAMS.contains(&name)
}

/// 规范化 URL
///
/// 幂等：normalize(normalize(u)) == normalize(u)
pub fn normalize_url(original: &str) -> String {
    let Ok(url) = Url::parse(original.trim()) else {
        return original.to_string();
    };

    let Some(host) = url.host_str() else {
        return original.to_string();
    };

    let scheme = url.scheme().to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    let mut normalized = format!("{}://", scheme);

    // userinfo 原样保留
    if !url.username().is_empty() {
        normalized.push_str(url.username());
        if let Some(password) = url.password() {
            normalized.push(':');
            normalized.push_str(password);
        }
        normalized.push('@');
    }

    normalized.push_str(&host);

    // Url::port() 对默认端口返回 None，非默认端口保留
    if let Some(port) = url.port() {
        normalized.push_str(&format!(":{}", port));
    }

    // 路径：去掉末尾斜杠，根路径除外
    let mut path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    normalized.push_str(&path);

    // query：按原顺序保留非追踪参数，参数文本不重编码
    if let Some(query) = url.query() {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| {
                if pair.is_empty() {
                    return false;
                }
                let name = pair.split('=').next().unwrap_or(pair);
                !is_tracking_param(name)
            })
            .collect();

        if !kept.is_empty() {
            normalized.push('?');
            normalized.push_str(&kept.join("&"));
        }
    }

    // fragment 丢弃

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_lowercased_path_kept() {
        assert_eq!(
            normalize_url("https://Example.COM/Some/Path"),
            "https://example.com/Some/Path"
        );
    }

    #[test]
    fn test_default_ports_stripped() {
        assert_eq!(
            normalize_url("http://example.com:80/page/"),
            "http://example.com/page"
        );
        assert_eq!(
            normalize_url("https://example.com:443/"),
            "https://example.com/"
        );
        // 非默认端口保留
        assert_eq!(
            normalize_url("http://example.com:8080/page"),
            "http://example.com:8080/page"
        );
    }

    #[test]
    fn test_trailing_slash() {
        assert_eq!(
            normalize_url("https://example.com/path/"),
            "https://example.com/path"
        );
        // 根路径保留斜杠
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
        assert_eq!(normalize_url("https://example.com"), "https://example.com/");
    }

    #[test]
    fn test_tracking_params_dropped_order_preserved() {
        assert_eq!(
            normalize_url("https://Example.COM/path?utm_source=x&a=1"),
            "https://example.com/path?a=1"
        );
        assert_eq!(
            normalize_url("https://example.com/path/?a=1&utm_medium=y"),
            "https://example.com/path?a=1"
        );
        assert_eq!(
            normalize_url("https://example.com/p?b=2&a=1&gclid=xyz&c=3"),
            "https://example.com/p?b=2&a=1&c=3"
        );
    }

    #[test]
    fn test_empty_query_and_fragment_dropped() {
        assert_eq!(
            normalize_url("https://example.com/p?utm_source=x"),
            "https://example.com/p"
        );
        assert_eq!(normalize_url("https://example.com/p?"), "https://example.com/p");
        assert_eq!(
            normalize_url("https://example.com/p#section"),
            "https://example.com/p"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "https://Example.COM/path?utm_source=x&a=1",
            "http://example.com:80/page/",
            "https://example.com:443/",
            "https://example.com/p?b=2&a=1&gclid=xyz#frag",
            "https://user:pw@example.com:9443/x/",
        ];
        for input in inputs {
            let once = normalize_url(input);
            assert_eq!(normalize_url(&once), once, "not idempotent for {}", input);
        }
    }

    #[test]
    fn test_tracking_removal_commutes() {
        // 先手工去掉追踪参数再 normalize == 直接 normalize
        let with_noise = "https://example.com/path?utm_campaign=c&a=1&fbclid=f";
        let without_noise = "https://example.com/path?a=1";
        assert_eq!(normalize_url(with_noise), normalize_url(without_noise));
    }

    #[test]
    fn test_unparsable_returned_verbatim() {
        assert_eq!(normalize_url("not a url"), "not a url");
        assert_eq!(normalize_url("://nope"), "://nope");
    }
}
