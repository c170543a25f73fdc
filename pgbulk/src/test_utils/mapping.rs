use std::sync::Arc;

use crate::types::{ColumnMapping, TableMapping, ValueKind};

/// Entity used across tests, stored in `users (id bigint primary key, email text unique not null,
/// name text, score integer not null)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleUser {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub score: i32,
}

impl SampleUser {
    pub fn new(id: i64, email: &str, name: Option<&str>, score: i32) -> SampleUser {
        Self {
            id,
            email: email.to_string(),
            name: name.map(str::to_string),
            score,
        }
    }
}

/// DDL creating the relation [`sample_user_mapping`] targets, inside `schema`.
pub fn sample_user_table_ddl(schema: &str) -> String {
    format!(
        "create table {schema}.users (
            id bigint primary key,
            email text not null unique,
            name text,
            score integer not null
        )"
    )
}

/// Maps [`SampleUser`] onto `public.users`.
pub fn sample_user_mapping() -> Arc<TableMapping<SampleUser>> {
    sample_user_mapping_in("public")
}

/// Maps [`SampleUser`] onto `users` in `schema`.
pub fn sample_user_mapping_in(schema: &str) -> Arc<TableMapping<SampleUser>> {
    let mapping = TableMapping::builder("users")
        .schema(schema)
        .column(ColumnMapping::new("id", ValueKind::I64, |u: &SampleUser| u.id).identifier())
        .column(
            ColumnMapping::new("email", ValueKind::String, |u: &SampleUser| u.email.clone())
                .not_null(),
        )
        .column(ColumnMapping::new("name", ValueKind::String, |u: &SampleUser| {
            u.name.clone()
        }))
        .column(ColumnMapping::new("score", ValueKind::I32, |u: &SampleUser| u.score).not_null())
        .build()
        .expect("sample mapping is valid");

    Arc::new(mapping)
}
