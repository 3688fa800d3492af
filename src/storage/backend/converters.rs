//! 实体模型与业务结构体之间的转换

use sea_orm::ActiveValue::Set;
use tracing::warn;

use crate::storage::UrlRecord;
use migration::entities::url_record;

/// 数据库模型 → UrlRecord
pub fn model_to_record(model: url_record::Model) -> UrlRecord {
    let metadata = model.metadata.as_deref().and_then(|raw| {
        serde_json::from_str(raw)
            .map_err(|e| {
                warn!("Failed to parse metadata for {}: {}", model.code, e);
                e
            })
            .ok()
    });

    UrlRecord {
        id: model.id,
        code: model.code,
        original: model.original,
        normalized: model.normalized,
        hit_count: model.hit_count,
        custom_alias: model.custom_alias,
        expires_at: model.expires_at,
        created_at: model.created_at,
        updated_at: model.updated_at,
        creator_ip: model.creator_ip,
        creator_user_agent: model.creator_user_agent,
        metadata,
    }
}

/// UrlRecord → 插入用 ActiveModel
pub fn record_to_active_model(record: &UrlRecord) -> url_record::ActiveModel {
    let metadata = record
        .metadata
        .as_ref()
        .and_then(|m| serde_json::to_string(m).ok());

    url_record::ActiveModel {
        id: Set(record.id.clone()),
        code: Set(record.code.clone()),
        original: Set(record.original.clone()),
        normalized: Set(record.normalized.clone()),
        hit_count: Set(record.hit_count),
        custom_alias: Set(record.custom_alias.clone()),
        expires_at: Set(record.expires_at),
        created_at: Set(record.created_at),
        updated_at: Set(record.updated_at),
        creator_ip: Set(record.creator_ip.clone()),
        creator_user_agent: Set(record.creator_user_agent.clone()),
        metadata: Set(metadata),
    }
}
