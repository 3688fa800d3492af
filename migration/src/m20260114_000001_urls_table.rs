use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // 创建 urls 表
        manager
            .create_table(
                Table::create()
                    .table(Urls::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Urls::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Urls::Code).string_len(50).not_null())
                    .col(ColumnDef::new(Urls::Original).text().not_null())
                    .col(ColumnDef::new(Urls::Normalized).text().not_null())
                    .col(
                        ColumnDef::new(Urls::HitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Urls::CustomAlias).string_len(50).null())
                    .col(
                        ColumnDef::new(Urls::ExpiresAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Urls::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Urls::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Urls::CreatorIp).string_len(45).null())
                    .col(ColumnDef::new(Urls::CreatorUserAgent).text().null())
                    .col(ColumnDef::new(Urls::Metadata).text().null())
                    .to_owned(),
            )
            .await?;

        // code 唯一索引（重定向主查询路径）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_urls_code")
                    .table(Urls::Table)
                    .col(Urls::Code)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // normalized 唯一索引（去重查询路径）
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("uidx_urls_normalized")
                    .table(Urls::Table)
                    .col(Urls::Normalized)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_urls_created_at")
                    .table(Urls::Table)
                    .col(Urls::CreatedAt)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_urls_expires_at")
                    .table(Urls::Table)
                    .col(Urls::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(Index::drop().name("idx_urls_expires_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("idx_urls_created_at").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uidx_urls_normalized").to_owned())
            .await?;
        manager
            .drop_index(Index::drop().name("uidx_urls_code").to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Urls::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Urls {
    Table,
    Id,
    Code,
    Original,
    Normalized,
    HitCount,
    CustomAlias,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
    CreatorIp,
    CreatorUserAgent,
    Metadata,
}
