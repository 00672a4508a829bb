use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_catalog_tables::Migration),
            Box::new(m20250301_000002_create_order_tables::Migration),
            Box::new(m20250301_000003_create_draft_tables::Migration),
            Box::new(m20250301_000004_create_movement_tables::Migration),
        ]
    }
}

// Migration implementations

mod m20250301_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SupplierContacts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SupplierContacts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SupplierContacts::TenantId).uuid().not_null())
                        .col(ColumnDef::new(SupplierContacts::Name).string().not_null())
                        .col(ColumnDef::new(SupplierContacts::ManagerName).string().null())
                        .col(ColumnDef::new(SupplierContacts::Phone).string().null())
                        .col(ColumnDef::new(SupplierContacts::Email).string().null())
                        .col(ColumnDef::new(SupplierContacts::RemoteManagerId).uuid().null())
                        .col(ColumnDef::new(SupplierContacts::RemoteTenantId).uuid().null())
                        .col(ColumnDef::new(SupplierContacts::BaseUrl).string().null())
                        .col(
                            ColumnDef::new(SupplierContacts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SupplierContacts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Brand).string().null())
                        .col(ColumnDef::new(Products::Unit).string().null())
                        .col(
                            ColumnDef::new(Products::Stock)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Batches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Batches::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Batches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Batches::LotNumber).string().not_null())
                        .col(
                            ColumnDef::new(Batches::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Batches::ExpiryDate).date().null())
                        .col(ColumnDef::new(Batches::StorageLocation).string().null())
                        .col(
                            ColumnDef::new(Batches::UnitCost)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Batches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Batches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_batches_product_id")
                        .table(Batches::Table)
                        .col(Batches::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_tenant_id")
                        .table(Products::Table)
                        .col(Products::TenantId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SupplierContacts::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum SupplierContacts {
        Table,
        Id,
        TenantId,
        Name,
        ManagerName,
        Phone,
        Email,
        RemoteManagerId,
        RemoteTenantId,
        BaseUrl,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        TenantId,
        Name,
        Brand,
        Unit,
        Stock,
        UnitPrice,
        SupplierId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Batches {
        Table,
        Id,
        TenantId,
        ProductId,
        LotNumber,
        Quantity,
        ExpiryDate,
        StorageLocation,
        UnitCost,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000002_create_order_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000002_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::TenantId).uuid().not_null())
                        .col(ColumnDef::new(Orders::OrderNumber).string().not_null())
                        .col(ColumnDef::new(Orders::Status).string().not_null())
                        .col(ColumnDef::new(Orders::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Orders::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Orders::Adjustments).text().null())
                        .col(ColumnDef::new(Orders::Memo).string().null())
                        .col(ColumnDef::new(Orders::CreatedBy).string().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_tenant_number")
                        .table(Orders::Table)
                        .col(Orders::TenantId)
                        .col(Orders::OrderNumber)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_orders_status")
                        .table(Orders::Table)
                        .col(Orders::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::BatchId).uuid().null())
                        .col(ColumnDef::new(OrderItems::ProductName).string().not_null())
                        .col(ColumnDef::new(OrderItems::Brand).string().null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(OrderItems::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::TotalPrice).decimal().not_null())
                        .col(ColumnDef::new(OrderItems::Memo).string().null())
                        .col(
                            ColumnDef::new(OrderItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_items_order_id")
                        .table(OrderItems::Table)
                        .col(OrderItems::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(RejectedOrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(RejectedOrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RejectedOrderLines::TenantId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RejectedOrderLines::OrderId).uuid().not_null())
                        .col(
                            ColumnDef::new(RejectedOrderLines::OrderNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RejectedOrderLines::SupplierName)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RejectedOrderLines::ManagerName)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(RejectedOrderLines::ProductName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(RejectedOrderLines::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(RejectedOrderLines::Reason).string().null())
                        .col(
                            ColumnDef::new(RejectedOrderLines::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(RejectedOrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        TenantId,
        OrderNumber,
        Status,
        SupplierId,
        TotalAmount,
        ConfirmedAt,
        Adjustments,
        Memo,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        BatchId,
        ProductName,
        Brand,
        Quantity,
        UnitPrice,
        TotalPrice,
        Memo,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum RejectedOrderLines {
        Table,
        Id,
        TenantId,
        OrderId,
        OrderNumber,
        SupplierName,
        ManagerName,
        ProductName,
        Quantity,
        Reason,
        CreatedAt,
    }
}

mod m20250301_000003_create_draft_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000003_create_draft_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OrderDrafts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderDrafts::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderDrafts::TenantId).uuid().not_null())
                        .col(ColumnDef::new(OrderDrafts::SessionId).string().not_null())
                        .col(
                            ColumnDef::new(OrderDrafts::TotalAmount)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(OrderDrafts::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderDrafts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderDrafts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // One draft per (tenant, session)
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_drafts_tenant_session")
                        .table(OrderDrafts::Table)
                        .col(OrderDrafts::TenantId)
                        .col(OrderDrafts::SessionId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderDraftItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderDraftItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderDraftItems::DraftId).uuid().not_null())
                        .col(ColumnDef::new(OrderDraftItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderDraftItems::BatchId).uuid().null())
                        .col(
                            ColumnDef::new(OrderDraftItems::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderDraftItems::UnitPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderDraftItems::TotalPrice)
                                .decimal()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderDraftItems::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(OrderDraftItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(OrderDraftItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_order_draft_items_draft_id")
                        .table(OrderDraftItems::Table)
                        .col(OrderDraftItems::DraftId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderDraftItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderDrafts::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum OrderDrafts {
        Table,
        Id,
        TenantId,
        SessionId,
        TotalAmount,
        ExpiresAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderDraftItems {
        Table,
        Id,
        DraftId,
        ProductId,
        BatchId,
        Quantity,
        UnitPrice,
        TotalPrice,
        SupplierId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250301_000004_create_movement_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250301_000004_create_movement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OutboundTxs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OutboundTxs::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OutboundTxs::TenantId).uuid().not_null())
                        .col(ColumnDef::new(OutboundTxs::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OutboundTxs::BatchId).uuid().not_null())
                        .col(ColumnDef::new(OutboundTxs::Quantity).integer().not_null())
                        .col(ColumnDef::new(OutboundTxs::Kind).string().not_null())
                        .col(ColumnDef::new(OutboundTxs::ManagerName).string().null())
                        .col(ColumnDef::new(OutboundTxs::PatientName).string().null())
                        .col(ColumnDef::new(OutboundTxs::ChartNo).string().null())
                        .col(ColumnDef::new(OutboundTxs::PackageName).string().null())
                        .col(
                            ColumnDef::new(OutboundTxs::IsDamaged)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(OutboundTxs::IsDefective)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(ColumnDef::new(OutboundTxs::Memo).string().null())
                        .col(
                            ColumnDef::new(OutboundTxs::CreatedAt)
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
                        .name("idx_outbound_txs_tenant_created")
                        .table(OutboundTxs::Table)
                        .col(OutboundTxs::TenantId)
                        .col(OutboundTxs::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnOrders::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnOrders::TenantId).uuid().not_null())
                        .col(ColumnDef::new(ReturnOrders::ReturnNo).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::OrderId).uuid().null())
                        .col(ColumnDef::new(ReturnOrders::SupplierId).uuid().null())
                        .col(ColumnDef::new(ReturnOrders::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ReturnOrders::BatchId).uuid().null())
                        .col(ColumnDef::new(ReturnOrders::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ReturnOrders::UnitPrice)
                                .decimal()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(ReturnOrders::Status).string().not_null())
                        .col(ColumnDef::new(ReturnOrders::Reason).string().null())
                        .col(
                            ColumnDef::new(ReturnOrders::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_orders_return_no")
                        .table(ReturnOrders::Table)
                        .col(ReturnOrders::ReturnNo)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnOrders::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OutboundTxs::Table).to_owned())
                .await?;
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum OutboundTxs {
        Table,
        Id,
        TenantId,
        ProductId,
        BatchId,
        Quantity,
        Kind,
        ManagerName,
        PatientName,
        ChartNo,
        PackageName,
        IsDamaged,
        IsDefective,
        Memo,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ReturnOrders {
        Table,
        Id,
        TenantId,
        ReturnNo,
        OrderId,
        SupplierId,
        ProductId,
        BatchId,
        Quantity,
        UnitPrice,
        Status,
        Reason,
        CompletedAt,
        CreatedAt,
        UpdatedAt,
    }
}
