use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Nodes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Nodes::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string(Nodes::Kind))
                    .col(string_null(Nodes::Name))
                    .col(
                        ColumnDef::new(Nodes::Enabled)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(big_integer(Nodes::CreatedAt))
                    .to_owned(),
            )
            .await?;

        // Namespace and account lookup by name
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_nodes_kind_name")
                    .table(Nodes::Table)
                    .col(Nodes::Kind)
                    .col(Nodes::Name)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Edges::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Edges::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(string(Edges::FromId))
                    .col(string(Edges::ToId))
                    .col(string(Edges::Label))
                    .col(string_null(Edges::Permission))
                    .col(big_integer_null(Edges::Inherit))
                    .col(big_integer(Edges::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edges_from")
                            .from(Edges::Table, Edges::FromId)
                            .to(Nodes::Table, Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_edges_to")
                            .from(Edges::Table, Edges::ToId)
                            .to(Nodes::Table, Nodes::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Every traversal step is an (from_id, label) scan
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_edges_from_label")
                    .table(Edges::Table)
                    .col(Edges::FromId)
                    .col(Edges::Label)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Edges::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Nodes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Nodes {
    Table,
    Id,
    Kind,
    Name,
    Enabled,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Edges {
    Table,
    Id,
    FromId,
    ToId,
    Label,
    Permission,
    Inherit,
    CreatedAt,
}
