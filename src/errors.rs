use std::fmt;

use actix_web::http::StatusCode;

/// 定义错误类型的宏
///
/// 自动生成：
/// - enum 定义
/// - code() 方法
/// - kind() 方法
/// - status() 方法（HTTP 状态映射）
macro_rules! define_hoplink_errors {
    ($(
        $variant:ident($code:literal, $kind:literal, $status:expr)
    ),* $(,)?) => {
        #[derive(Debug, Clone)]
        pub enum HoplinkError {
            $($variant(String),)*
        }

        impl HoplinkError {
            /// 获取错误代码（对客户端可见）
            pub fn code(&self) -> &'static str {
                match self {
                    $(HoplinkError::$variant(_) => $code,)*
                }
            }

            /// 获取错误分类名称
            pub fn kind(&self) -> &'static str {
                match self {
                    $(HoplinkError::$variant(_) => $kind,)*
                }
            }

            /// 获取 HTTP 状态码
            pub fn status(&self) -> StatusCode {
                match self {
                    $(HoplinkError::$variant(_) => $status,)*
                }
            }

            /// 获取错误详情
            pub fn message(&self) -> &str {
                match self {
                    $(HoplinkError::$variant(msg) => msg,)*
                }
            }
        }
    };
}

define_hoplink_errors! {
    InvalidUrl("INVALID_URL", "VALIDATION", StatusCode::BAD_REQUEST),
    UrlTooLong("URL_TOO_LONG", "VALIDATION", StatusCode::BAD_REQUEST),
    AliasInvalid("ALIAS_INVALID", "VALIDATION", StatusCode::BAD_REQUEST),
    ExpiryInPast("EXPIRY_IN_PAST", "VALIDATION", StatusCode::BAD_REQUEST),
    InvalidCode("INVALID_CODE", "VALIDATION", StatusCode::BAD_REQUEST),
    InvalidRedirect("INVALID_REDIRECT", "VALIDATION", StatusCode::BAD_REQUEST),
    InvalidQuery("INVALID_QUERY", "VALIDATION", StatusCode::BAD_REQUEST),
    NotFound("NOT_FOUND", "NOT_FOUND", StatusCode::NOT_FOUND),
    Gone("GONE", "GONE", StatusCode::GONE),
    AliasTaken("ALIAS_TAKEN", "CONFLICT", StatusCode::BAD_REQUEST),
    UrlBlocked("URL_BLOCKED", "BLOCKED", StatusCode::BAD_REQUEST),
    Unauthorized("UNAUTHORIZED", "UNAUTHORIZED", StatusCode::UNAUTHORIZED),
    RateLimited("RATE_LIMITED", "RATE_LIMITED", StatusCode::TOO_MANY_REQUESTS),
    DependencyUnavailable("DEPENDENCY_UNAVAILABLE", "DEPENDENCY_UNAVAILABLE", StatusCode::SERVICE_UNAVAILABLE),
    Internal("INTERNAL", "INTERNAL", StatusCode::INTERNAL_SERVER_ERROR),
}

impl fmt::Display for HoplinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for HoplinkError {}

// 便捷的构造函数
impl HoplinkError {
    pub fn invalid_url<T: Into<String>>(msg: T) -> Self {
        HoplinkError::InvalidUrl(msg.into())
    }

    pub fn url_too_long<T: Into<String>>(msg: T) -> Self {
        HoplinkError::UrlTooLong(msg.into())
    }

    pub fn alias_invalid<T: Into<String>>(msg: T) -> Self {
        HoplinkError::AliasInvalid(msg.into())
    }

    pub fn alias_taken<T: Into<String>>(msg: T) -> Self {
        HoplinkError::AliasTaken(msg.into())
    }

    pub fn expiry_in_past<T: Into<String>>(msg: T) -> Self {
        HoplinkError::ExpiryInPast(msg.into())
    }

    pub fn invalid_code<T: Into<String>>(msg: T) -> Self {
        HoplinkError::InvalidCode(msg.into())
    }

    pub fn invalid_redirect<T: Into<String>>(msg: T) -> Self {
        HoplinkError::InvalidRedirect(msg.into())
    }

    pub fn invalid_query<T: Into<String>>(msg: T) -> Self {
        HoplinkError::InvalidQuery(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        HoplinkError::NotFound(msg.into())
    }

    pub fn gone<T: Into<String>>(msg: T) -> Self {
        HoplinkError::Gone(msg.into())
    }

    pub fn url_blocked<T: Into<String>>(msg: T) -> Self {
        HoplinkError::UrlBlocked(msg.into())
    }

    pub fn unauthorized<T: Into<String>>(msg: T) -> Self {
        HoplinkError::Unauthorized(msg.into())
    }

    pub fn rate_limited<T: Into<String>>(msg: T) -> Self {
        HoplinkError::RateLimited(msg.into())
    }

    pub fn dependency_unavailable<T: Into<String>>(msg: T) -> Self {
        HoplinkError::DependencyUnavailable(msg.into())
    }

    pub fn internal<T: Into<String>>(msg: T) -> Self {
        HoplinkError::Internal(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<sea_orm::DbErr> for HoplinkError {
    fn from(err: sea_orm::DbErr) -> Self {
        match err {
            sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => {
                HoplinkError::DependencyUnavailable(err.to_string())
            }
            other => HoplinkError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for HoplinkError {
    fn from(err: serde_json::Error) -> Self {
        HoplinkError::Internal(err.to_string())
    }
}

impl From<chrono::ParseError> for HoplinkError {
    fn from(err: chrono::ParseError) -> Self {
        HoplinkError::InvalidQuery(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, HoplinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            HoplinkError::alias_taken("x").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(HoplinkError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(HoplinkError::gone("x").status(), StatusCode::GONE);
        assert_eq!(
            HoplinkError::rate_limited("x").status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            HoplinkError::dependency_unavailable("x").status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_db_error_classification() {
        let err: HoplinkError = sea_orm::DbErr::Conn(sea_orm::RuntimeErr::Internal(
            "connection refused".to_string(),
        ))
        .into();
        assert_eq!(err.code(), "DEPENDENCY_UNAVAILABLE");

        let err: HoplinkError =
            sea_orm::DbErr::Custom("constraint violated".to_string()).into();
        assert_eq!(err.code(), "INTERNAL");
    }
}
