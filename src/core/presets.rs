//! Built-in demo schema

use crate::core::auto_layout::auto_layout;
use crate::core::data_type::DataType;
use crate::core::schema::{Column, ForeignKeyReference, Index, ReferentialAction, SchemaModel, Table};

pub const DEMO_SCHEMA_NAME: &str = "Demo schema";

/// Users, posts and comments with laid-out positions and FK auto-indexes
pub fn demo_schema() -> SchemaModel {
    let users = Table::new("users")
        .add_column(Column::new("id", DataType::Integer).primary_key().auto_increment())
        .add_column(Column::new("username", DataType::varchar(255)).not_null().unique())
        .add_column(Column::new("email", DataType::varchar(255)).not_null().unique())
        .add_column(
            Column::new("created_at", DataType::Timestamp)
                .not_null()
                .with_default("CURRENT_TIMESTAMP"),
        );

    let posts = Table::new("posts")
        .add_column(Column::new("id", DataType::Integer).primary_key().auto_increment())
        .add_column(
            Column::new("user_id", DataType::Integer)
                .not_null()
                .references(ForeignKeyReference::new("users", "id").on_delete(ReferentialAction::Cascade)),
        )
        .add_column(Column::new("title", DataType::varchar(255)).not_null())
        .add_column(Column::new("content", DataType::Text))
        .add_column(Column::new("created_at", DataType::Timestamp).not_null())
        .with_index(Index::fk_auto("posts", "user_id"));

    let comments = Table::new("comments")
        .add_column(Column::new("id", DataType::Integer).primary_key().auto_increment())
        .add_column(
            Column::new("post_id", DataType::Integer)
                .not_null()
                .references(ForeignKeyReference::new("posts", "id").on_delete(ReferentialAction::Cascade)),
        )
        .add_column(
            Column::new("user_id", DataType::Integer)
                .not_null()
                .references(ForeignKeyReference::new("users", "id").on_delete(ReferentialAction::Cascade)),
        )
        .add_column(Column::new("content", DataType::Text).not_null())
        .add_column(Column::new("created_at", DataType::Timestamp).not_null())
        .with_index(Index::fk_auto("comments", "post_id"))
        .with_index(Index::fk_auto("comments", "user_id"));

    let mut model = SchemaModel::new(DEMO_SCHEMA_NAME)
        .with_description("A small blog: users write posts and comment on them");
    model.tables = vec![users, posts, comments];
    auto_layout(&mut model);
    model
}
