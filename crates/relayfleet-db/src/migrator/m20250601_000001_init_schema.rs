//! Consolidated initial schema migration

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create tenant_accounts table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(TenantAccount::Table)
                    .if_not_exists()
                    .col(string_len(TenantAccount::Code, 64).primary_key())
                    .col(string_len(TenantAccount::Name, 255).not_null())
                    .col(
                        decimal_len(TenantAccount::Balance, 20, 4)
                            .not_null()
                            .default("0"),
                    )
                    .col(big_integer(TenantAccount::Version).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(TenantAccount::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(TenantAccount::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create nodes table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Node::Table)
                    .if_not_exists()
                    .col(string_len(Node::Code, 64).primary_key())
                    .col(uuid(Node::Key).not_null())
                    .col(string_len(Node::Name, 255).not_null())
                    .col(string_len(Node::Remark, 255).null())
                    .col(boolean(Node::Web).not_null().default(false))
                    .col(boolean(Node::Tunnel).not_null().default(false))
                    .col(boolean(Node::Forward).not_null().default(false))
                    .col(boolean(Node::Proxy).not_null().default(false))
                    .col(boolean(Node::P2p).not_null().default(false))
                    .col(string_len(Node::Address, 255).not_null())
                    .col(string_len(Node::Protocol, 32).not_null())
                    .col(string_len(Node::Domain, 255).null())
                    .col(string_len(Node::DenyDomainPrefix, 1024).null())
                    .col(string_len(Node::Rules, 1024).null())
                    .col(string_len(Node::ForwardPortRange, 32).null())
                    .col(integer(Node::LimitResetIndex).not_null().default(1))
                    .col(integer(Node::LimitTotal).not_null().default(0))
                    .col(integer(Node::LimitKind).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Node::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Node::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Create clients table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Client::Table)
                    .if_not_exists()
                    .col(string_len(Client::Code, 64).primary_key())
                    .col(string_len(Client::TenantCode, 64).not_null())
                    .col(string_len(Client::Name, 255).not_null())
                    .col(
                        timestamp_with_time_zone(Client::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_clients_tenant_code")
                            .from(Client::Table, Client::TenantCode)
                            .to(TenantAccount::Table, TenantAccount::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_clients_tenant_code")
                    .table(Client::Table)
                    .col(Client::TenantCode)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 4. Create plans table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Plan::Table)
                    .if_not_exists()
                    .col(string_len(Plan::Code, 64).primary_key())
                    .col(string_len(Plan::NodeCode, 64).not_null())
                    .col(string_len(Plan::Name, 255).not_null())
                    .col(string_len(Plan::ChargingType, 32).not_null())
                    .col(integer(Plan::CycleDays).not_null().default(0))
                    .col(decimal_len(Plan::Price, 20, 4).not_null().default("0"))
                    .col(integer(Plan::Limiter).not_null().default(0))
                    .col(
                        timestamp_with_time_zone(Plan::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_plans_node_code")
                            .from(Plan::Table, Plan::NodeCode)
                            .to(Node::Table, Node::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_plans_node_code")
                    .table(Plan::Table)
                    .col(Plan::NodeCode)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 5. Create node_domains table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(NodeDomain::Table)
                    .if_not_exists()
                    .col(string_len(NodeDomain::NodeCode, 64).not_null())
                    .col(string_len(NodeDomain::Prefix, 64).not_null())
                    .col(
                        timestamp_with_time_zone(NodeDomain::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .col(NodeDomain::NodeCode)
                            .col(NodeDomain::Prefix),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_node_domains_node_code")
                            .from(NodeDomain::Table, NodeDomain::NodeCode)
                            .to(Node::Table, Node::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 6. Create node_ports table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(NodePort::Table)
                    .if_not_exists()
                    .col(string_len(NodePort::NodeCode, 64).not_null())
                    .col(integer(NodePort::Port).not_null())
                    .col(string_len(NodePort::AllocationCode, 64).null())
                    .col(
                        timestamp_with_time_zone(NodePort::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(Index::create().col(NodePort::NodeCode).col(NodePort::Port))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_node_ports_node_code")
                            .from(NodePort::Table, NodePort::NodeCode)
                            .to(Node::Table, Node::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 7. Create allocations table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Allocation::Table)
                    .if_not_exists()
                    .col(string_len(Allocation::Code, 64).primary_key())
                    .col(string_len(Allocation::Kind, 32).not_null())
                    .col(string_len(Allocation::Name, 255).not_null())
                    .col(string_len(Allocation::TargetIp, 64).not_null())
                    .col(string_len(Allocation::TargetPort, 16).not_null())
                    .col(boolean(Allocation::TargetHttps).not_null().default(false))
                    .col(string_len(Allocation::DomainPrefix, 64).null())
                    .col(integer_null(Allocation::Port))
                    .col(string_len(Allocation::NodeCode, 64).not_null())
                    .col(string_len(Allocation::ClientCode, 64).not_null())
                    .col(string_len(Allocation::TenantCode, 64).not_null())
                    .col(string_len(Allocation::ChargingType, 32).not_null())
                    .col(integer(Allocation::CycleDays).not_null().default(0))
                    .col(
                        decimal_len(Allocation::Price, 20, 4)
                            .not_null()
                            .default("0"),
                    )
                    .col(integer(Allocation::Limiter).not_null().default(0))
                    .col(text_null(Allocation::Matchers))
                    .col(timestamp_with_time_zone_null(Allocation::ExpiresAt))
                    .col(
                        timestamp_with_time_zone(Allocation::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Allocation::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allocations_node_code")
                            .from(Allocation::Table, Allocation::NodeCode)
                            .to(Node::Table, Node::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allocations_client_code")
                            .from(Allocation::Table, Allocation::ClientCode)
                            .to(Client::Table, Client::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_allocations_tenant_code")
                            .from(Allocation::Table, Allocation::TenantCode)
                            .to(TenantAccount::Table, TenantAccount::Code)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_allocations_node_code")
                    .table(Allocation::Table)
                    .col(Allocation::NodeCode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_allocations_tenant_code")
                    .table(Allocation::Table)
                    .col(Allocation::TenantCode)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_allocations_client_code")
                    .table(Allocation::Table)
                    .col(Allocation::ClientCode)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 8. Create credentials table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Credential::Table)
                    .if_not_exists()
                    .col(uuid(Credential::Id).primary_key())
                    .col(string_len(Credential::TunnelType, 32).not_null())
                    .col(string_len(Credential::TunnelCode, 64).not_null())
                    .col(string_len(Credential::Username, 64).not_null())
                    .col(string_len(Credential::Password, 64).not_null())
                    .col(
                        timestamp_with_time_zone(Credential::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_credentials_tunnel")
                    .table(Credential::Table)
                    .col(Credential::TunnelType)
                    .col(Credential::TunnelCode)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_credentials_username")
                    .table(Credential::Table)
                    .col(Credential::Username)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 9. Create admission_policies table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(AdmissionPolicy::Table)
                    .if_not_exists()
                    .col(string_len(AdmissionPolicy::Code, 64).primary_key())
                    .col(boolean(AdmissionPolicy::Enabled).not_null().default(false))
                    .col(text(AdmissionPolicy::AllowList).not_null())
                    .col(
                        timestamp_with_time_zone(AdmissionPolicy::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(AdmissionPolicy::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AdmissionPolicy::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Credential::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Allocation::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NodePort::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(NodeDomain::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plan::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Client::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Node::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TenantAccount::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum TenantAccount {
    #[sea_orm(iden = "tenant_accounts")]
    Table,
    Code,
    Name,
    Balance,
    Version,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Node {
    #[sea_orm(iden = "nodes")]
    Table,
    Code,
    Key,
    Name,
    Remark,
    Web,
    Tunnel,
    Forward,
    Proxy,
    P2p,
    Address,
    Protocol,
    Domain,
    DenyDomainPrefix,
    Rules,
    ForwardPortRange,
    LimitResetIndex,
    LimitTotal,
    LimitKind,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Client {
    #[sea_orm(iden = "clients")]
    Table,
    Code,
    TenantCode,
    Name,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Plan {
    #[sea_orm(iden = "plans")]
    Table,
    Code,
    NodeCode,
    Name,
    ChargingType,
    CycleDays,
    Price,
    Limiter,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NodeDomain {
    #[sea_orm(iden = "node_domains")]
    Table,
    NodeCode,
    Prefix,
    CreatedAt,
}

#[derive(DeriveIden)]
enum NodePort {
    #[sea_orm(iden = "node_ports")]
    Table,
    NodeCode,
    Port,
    AllocationCode,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Allocation {
    #[sea_orm(iden = "allocations")]
    Table,
    Code,
    Kind,
    Name,
    TargetIp,
    TargetPort,
    TargetHttps,
    DomainPrefix,
    Port,
    NodeCode,
    ClientCode,
    TenantCode,
    ChargingType,
    CycleDays,
    Price,
    Limiter,
    Matchers,
    ExpiresAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Credential {
    #[sea_orm(iden = "credentials")]
    Table,
    Id,
    TunnelType,
    TunnelCode,
    Username,
    Password,
    CreatedAt,
}

#[derive(DeriveIden)]
enum AdmissionPolicy {
    #[sea_orm(iden = "admission_policies")]
    Table,
    Code,
    Enabled,
    AllowList,
    CreatedAt,
    UpdatedAt,
}
