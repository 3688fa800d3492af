//! URL 验证模块
//!
//! ingestion 入口的合法性门槛：长度、scheme、可解析性。

use url::Url;

use crate::errors::{HoplinkError, Result};

/// 验证待缩短的 URL
///
/// 检查项目：
/// 1. URL 非空
/// 2. 长度 ≤ max_length
/// 3. scheme 必须是 http 或 https
/// 4. URL 格式有效
pub fn validate_url(url: &str, max_length: usize) -> Result<()> {
    let url = url.trim();

    if url.is_empty() {
        return Err(HoplinkError::invalid_url("URL cannot be empty"));
    }

    if url.len() > max_length {
        return Err(HoplinkError::url_too_long(format!(
            "URL exceeds {} characters",
            max_length
        )));
    }

    let parsed = Url::parse(url)
        .map_err(|e| HoplinkError::invalid_url(format!("Invalid URL format: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(HoplinkError::invalid_url(format!(
                "Invalid scheme: {}. Only http and https are allowed",
                other
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(HoplinkError::invalid_url("URL has no host"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(validate_url("http://example.com", 2048).is_ok());
        assert!(validate_url("https://example.com/path?query=1", 2048).is_ok());
        assert!(validate_url("https://example.com:8443/x", 2048).is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("ftp://example.com", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("javascript:alert(1)", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("mailto:a@b.com", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_length_limit() {
        let long_url = format!("https://example.com/{}", "a".repeat(3000));
        assert!(matches!(
            validate_url(&long_url, 2048),
            Err(HoplinkError::UrlTooLong(_))
        ));
    }

    #[test]
    fn test_empty_and_garbage() {
        assert!(matches!(
            validate_url("", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("   ", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
        assert!(matches!(
            validate_url("not a url", 2048),
            Err(HoplinkError::InvalidUrl(_))
        ));
    }
}
