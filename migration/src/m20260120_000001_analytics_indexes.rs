//! 分析查询辅助索引
//!
//! retention 任务按时间桶扫描删除，dashboard 查询按 code 扫描，
//! 这里补充对应的非唯一索引。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_hits_by_minute_bucket")
                    .table(HitsByMinute::Table)
                    .col(HitsByMinute::MinuteBucket)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_unique_visitors_date")
                    .table(UniqueVisitors::Table)
                    .col(UniqueVisitors::VisitDate)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_hits_by_hour_bucket")
                    .table(HitsByHour::Table)
                    .col(HitsByHour::HourBucket)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_hits_by_hour_bucket").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_unique_visitors_date").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_hits_by_minute_bucket").to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum HitsByHour {
    #[sea_orm(iden = "hits_by_hour")]
    Table,
    HourBucket,
}

#[derive(DeriveIden)]
enum HitsByMinute {
    #[sea_orm(iden = "hits_by_minute")]
    Table,
    MinuteBucket,
}

#[derive(DeriveIden)]
enum UniqueVisitors {
    #[sea_orm(iden = "unique_visitors")]
    Table,
    VisitDate,
}
