//! 分析计数表
//!
//! 七张按 code 分区的累加计数表，计数列只做交换律累加（upsert 累加 /
//! min-max / insert-ignore），消费端可以安全重试。

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // hits_by_hour
        manager
            .create_table(
                Table::create()
                    .table(HitsByHour::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HitsByHour::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(HitsByHour::Code).string_len(50).not_null())
                    .col(
                        ColumnDef::new(HitsByHour::HourBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HitsByHour::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_hits_by_hour_code_bucket")
                    .table(HitsByHour::Table)
                    .col(HitsByHour::Code)
                    .col(HitsByHour::HourBucket)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // hits_by_minute
        manager
            .create_table(
                Table::create()
                    .table(HitsByMinute::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(HitsByMinute::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(HitsByMinute::Code)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HitsByMinute::MinuteBucket)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(HitsByMinute::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_hits_by_minute_code_bucket")
                    .table(HitsByMinute::Table)
                    .col(HitsByMinute::Code)
                    .col(HitsByMinute::MinuteBucket)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // referrer_stats
        manager
            .create_table(
                Table::create()
                    .table(ReferrerStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReferrerStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ReferrerStats::Code)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(ReferrerStats::Referrer).text().not_null())
                    .col(
                        ColumnDef::new(ReferrerStats::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_referrer_stats_code_referrer")
                    .table(ReferrerStats::Table)
                    .col(ReferrerStats::Code)
                    .col(ReferrerStats::Referrer)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // geo_stats
        manager
            .create_table(
                Table::create()
                    .table(GeoStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(GeoStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(GeoStats::Code).string_len(50).not_null())
                    .col(ColumnDef::new(GeoStats::Country).string_len(8).not_null())
                    .col(
                        ColumnDef::new(GeoStats::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_geo_stats_code_country")
                    .table(GeoStats::Table)
                    .col(GeoStats::Code)
                    .col(GeoStats::Country)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // device_stats
        manager
            .create_table(
                Table::create()
                    .table(DeviceStats::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DeviceStats::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(DeviceStats::Code).string_len(50).not_null())
                    .col(
                        ColumnDef::new(DeviceStats::DeviceType)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(DeviceStats::Browser)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(ColumnDef::new(DeviceStats::Os).string_len(64).not_null())
                    .col(
                        ColumnDef::new(DeviceStats::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_device_stats_dims")
                    .table(DeviceStats::Table)
                    .col(DeviceStats::Code)
                    .col(DeviceStats::DeviceType)
                    .col(DeviceStats::Browser)
                    .col(DeviceStats::Os)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // access_times
        manager
            .create_table(
                Table::create()
                    .table(AccessTimes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessTimes::Code)
                            .string_len(50)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(AccessTimes::FirstAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(AccessTimes::LastAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // unique_visitors
        manager
            .create_table(
                Table::create()
                    .table(UniqueVisitors::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(UniqueVisitors::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(UniqueVisitors::Code)
                            .string_len(50)
                            .not_null(),
                    )
                    .col(ColumnDef::new(UniqueVisitors::VisitDate).date().not_null())
                    .col(
                        ColumnDef::new(UniqueVisitors::VisitorHash)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(UniqueVisitors::SeenAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_unique_visitors_member")
                    .table(UniqueVisitors::Table)
                    .col(UniqueVisitors::Code)
                    .col(UniqueVisitors::VisitDate)
                    .col(UniqueVisitors::VisitorHash)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for table in [
            Table::drop().table(UniqueVisitors::Table).to_owned(),
            Table::drop().table(AccessTimes::Table).to_owned(),
            Table::drop().table(DeviceStats::Table).to_owned(),
            Table::drop().table(GeoStats::Table).to_owned(),
            Table::drop().table(ReferrerStats::Table).to_owned(),
            Table::drop().table(HitsByMinute::Table).to_owned(),
            Table::drop().table(HitsByHour::Table).to_owned(),
        ] {
            manager.drop_table(table).await?;
        }
        Ok(())
    }
}

#[derive(DeriveIden)]
enum HitsByHour {
    #[sea_orm(iden = "hits_by_hour")]
    Table,
    Id,
    Code,
    HourBucket,
    HitCount,
}

#[derive(DeriveIden)]
enum HitsByMinute {
    #[sea_orm(iden = "hits_by_minute")]
    Table,
    Id,
    Code,
    MinuteBucket,
    HitCount,
}

#[derive(DeriveIden)]
enum ReferrerStats {
    #[sea_orm(iden = "referrer_stats")]
    Table,
    Id,
    Code,
    Referrer,
    HitCount,
}

#[derive(DeriveIden)]
enum GeoStats {
    #[sea_orm(iden = "geo_stats")]
    Table,
    Id,
    Code,
    Country,
    HitCount,
}

#[derive(DeriveIden)]
enum DeviceStats {
    #[sea_orm(iden = "device_stats")]
    Table,
    Id,
    Code,
    DeviceType,
    Browser,
    Os,
    HitCount,
}

#[derive(DeriveIden)]
enum AccessTimes {
    #[sea_orm(iden = "access_times")]
    Table,
    Code,
    FirstAt,
    LastAt,
}

#[derive(DeriveIden)]
enum UniqueVisitors {
    #[sea_orm(iden = "unique_visitors")]
    Table,
    Id,
    Code,
    VisitDate,
    VisitorHash,
    SeenAt,
}
