//! 短码分配器
//!
//! 两种模式：随机生成（碰撞重试）与自定义别名（格式 + 占用校验）。
//! 碰撞探测必须打到权威存储，不能只看缓存。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::{HoplinkError, Result};
use crate::storage::SeaOrmStorage;
use crate::utils::{generate_random_code, is_valid_code};

/// 随机码的最大碰撞重试次数；之后加长一次
const MAX_COLLISION_RETRIES: usize = 10;

pub struct CodeAllocator {
    storage: Arc<SeaOrmStorage>,
    default_length: usize,
    alias_min_length: usize,
    alias_max_length: usize,
}

impl CodeAllocator {
    pub fn new(
        storage: Arc<SeaOrmStorage>,
        default_length: usize,
        alias_min_length: usize,
        alias_max_length: usize,
    ) -> Self {
        Self {
            storage,
            default_length,
            alias_min_length,
            alias_max_length,
        }
    }

    /// 分配短码：有别名走校验，没有走随机生成
    pub async fn allocate(&self, custom_alias: Option<&str>) -> Result<String> {
        match custom_alias {
            Some(alias) if !alias.is_empty() => self.validate_alias(alias).await,
            _ => self.generate().await,
        }
    }

    /// 校验自定义别名：字符集 [A-Za-z0-9_-]，长度在配置区间，未被占用
    async fn validate_alias(&self, alias: &str) -> Result<String> {
        if alias.len() < self.alias_min_length || alias.len() > self.alias_max_length {
            return Err(HoplinkError::alias_invalid(format!(
                "Alias length must be between {} and {} characters",
                self.alias_min_length, self.alias_max_length
            )));
        }

        if !is_valid_code(alias) {
            return Err(HoplinkError::alias_invalid(
                "Alias may only contain letters, digits, underscore and dash",
            ));
        }

        if self.storage.find_by_code(alias).await?.is_some() {
            return Err(HoplinkError::alias_taken(format!(
                "Alias '{}' is already in use",
                alias
            )));
        }

        Ok(alias.to_string())
    }

    /// 随机生成：默认长度试 10 次，仍碰撞则加长 2 再试一次
    async fn generate(&self) -> Result<String> {
        for attempt in 0..MAX_COLLISION_RETRIES {
            let code = generate_random_code(self.default_length);
            if self.storage.find_by_code(&code).await?.is_none() {
                if attempt > 0 {
                    debug!("Code allocated after {} collision(s)", attempt);
                }
                return Ok(code);
            }
        }

        // 碰撞过多说明当前长度的命名空间已经拥挤
        warn!(
            "Code allocation hit {} collisions at length {}, retrying with length {}",
            MAX_COLLISION_RETRIES,
            self.default_length,
            self.default_length + 2
        );

        let code = generate_random_code(self.default_length + 2);
        if self.storage.find_by_code(&code).await?.is_none() {
            return Ok(code);
        }

        Err(HoplinkError::internal(
            "Unable to allocate a unique code, namespace exhausted",
        ))
    }
}
