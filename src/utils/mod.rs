pub mod ip;
pub mod normalizer;
pub mod url_validator;

/// 短码字符集：与生成、校验、别名规则共用
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789_-";

/// 短码最大长度
pub const MAX_CODE_LEN: usize = 50;

/// 短码最小长度
pub const MIN_CODE_LEN: usize = 3;

/// 验证短码格式：长度在 [3, 50]，字符集 [A-Za-z0-9_-]
///
/// 这个函数被多处使用：
/// - `redirect.rs`: 拒绝非法短码的 HTTP 请求
/// - `code_allocator.rs`: 自定义别名校验
#[inline]
pub fn is_valid_code(code: &str) -> bool {
    code.len() >= MIN_CODE_LEN
        && code.len() <= MAX_CODE_LEN
        && code
            .bytes()
            .all(|b| matches!(b, b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'_' | b'-'))
}

/// 生成指定长度的随机短码
pub fn generate_random_code(length: usize) -> String {
    use rand::Rng;
    use std::iter;

    let mut rng = rand::rng();

    iter::repeat_with(|| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .take(length)
        .collect()
}

/// 访客哈希：SHA-256("{ip}:{user_agent}") 的前 16 个 hex 字符
///
/// 刻意不可逆，只用于集合成员判断，不是 PII 令牌。
pub fn visitor_hash(ip: &str, user_agent: &str) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(format!("{}:{}", ip, user_agent).as_bytes());
    digest
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}
