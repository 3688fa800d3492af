pub mod backend;
pub mod models;

pub use backend::SeaOrmStorage;
pub use models::{
    CachedTarget, InsertOutcome, SortField, SortOrder, StatusFilter, UniqueField, UrlFilter,
    UrlRecord, UrlStats,
};
