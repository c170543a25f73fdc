use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use postgres::identifier::validate_identifier;
use postgres::types::TableName;

use crate::bail;
use crate::error::{BulkResult, ErrorKind};
use crate::types::{TypeKey, Value};

/// Function extracting a column value from an entity.
pub type Extractor<T> = Arc<dyn Fn(&T) -> BulkResult<Value> + Send + Sync>;

/// Describes how one column of a target relation is read from an entity.
pub struct ColumnMapping<T> {
    name: String,
    declared_type: TypeKey,
    extractor: Extractor<T>,
    identifier: bool,
    nullable: bool,
}

impl<T> ColumnMapping<T> {
    /// Creates a nullable, non-identifier column with an infallible extractor.
    pub fn new<K, F, V>(name: impl Into<String>, declared_type: K, extract: F) -> Self
    where
        K: Into<TypeKey>,
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        Self::try_new(name, declared_type, move |entity| Ok(extract(entity).into()))
    }

    /// Creates a column whose extractor can fail.
    pub fn try_new<K, F>(name: impl Into<String>, declared_type: K, extract: F) -> Self
    where
        K: Into<TypeKey>,
        F: Fn(&T) -> BulkResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            extractor: Arc::new(extract),
            identifier: false,
            nullable: true,
        }
    }

    /// Marks the column as part of the entity identifier. Identifier columns are never null.
    pub fn identifier(mut self) -> Self {
        self.identifier = true;
        self.nullable = false;
        self
    }

    /// Rejects null values for this column while encoding.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> &TypeKey {
        &self.declared_type
    }

    pub fn is_identifier(&self) -> bool {
        self.identifier
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Reads this column's value from `entity`.
    pub fn extract(&self, entity: &T) -> BulkResult<Value> {
        (self.extractor)(entity)
    }
}

impl<T> Clone for ColumnMapping<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            declared_type: self.declared_type.clone(),
            extractor: Arc::clone(&self.extractor),
            identifier: self.identifier,
            nullable: self.nullable,
        }
    }
}

impl<T> fmt::Debug for ColumnMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMapping")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("identifier", &self.identifier)
            .field("nullable", &self.nullable)
            .finish_non_exhaustive()
    }
}

/// Immutable description of a target relation and how entities map onto its columns.
///
/// Built once per entity shape with [`TableMapping::builder`] and shared behind an [`Arc`].
pub struct TableMapping<T> {
    table_name: TableName,
    columns: Vec<ColumnMapping<T>>,
    identifier_columns: Vec<String>,
    non_identifier_columns: Vec<String>,
}

impl<T> TableMapping<T> {
    pub fn builder(table: impl Into<String>) -> TableMappingBuilder<T> {
        TableMappingBuilder {
            schema: None,
            table: table.into(),
            columns: Vec::new(),
        }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }

    pub fn columns(&self) -> &[ColumnMapping<T>] {
        &self.columns
    }

    /// Returns all column names in mapping order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name())
    }

    pub fn identifier_columns(&self) -> &[String] {
        &self.identifier_columns
    }

    pub fn non_identifier_columns(&self) -> &[String] {
        &self.non_identifier_columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name() == name)
    }
}

impl<T> fmt::Debug for TableMapping<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableMapping")
            .field("table_name", &self.table_name)
            .field("columns", &self.columns)
            .finish()
    }
}

/// Builder for [`TableMapping`].
pub struct TableMappingBuilder<T> {
    schema: Option<String>,
    table: String,
    columns: Vec<ColumnMapping<T>>,
}

impl<T> TableMappingBuilder<T> {
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn column(mut self, column: ColumnMapping<T>) -> Self {
        self.columns.push(column);
        self
    }

    /// Validates every name and builds the mapping.
    pub fn build(self) -> BulkResult<TableMapping<T>> {
        if let Some(schema) = &self.schema {
            validate_identifier(schema)?;
        }
        validate_identifier(&self.table)?;

        if self.columns.is_empty() {
            bail!(
                ErrorKind::InvalidMapping,
                "Table mapping has no columns",
                format!("Table '{}' must map at least one column", self.table)
            );
        }

        let mut seen = HashSet::with_capacity(self.columns.len());
        for column in &self.columns {
            validate_identifier(column.name())?;

            if !seen.insert(column.name()) {
                bail!(
                    ErrorKind::InvalidMapping,
                    "Duplicate column in table mapping",
                    format!(
                        "Column '{}' is mapped more than once in table '{}'",
                        column.name(),
                        self.table
                    )
                );
            }
        }

        let (identifier_columns, non_identifier_columns): (Vec<_>, Vec<_>) = self
            .columns
            .iter()
            .partition(|column| column.is_identifier());

        Ok(TableMapping {
            table_name: TableName::new(self.schema, self.table),
            identifier_columns: identifier_columns
                .into_iter()
                .map(|column| column.name().to_string())
                .collect(),
            non_identifier_columns: non_identifier_columns
                .into_iter()
                .map(|column| column.name().to_string())
                .collect(),
            columns: self.columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueKind;

    struct User {
        id: i64,
        name: Option<String>,
    }

    fn user_columns() -> TableMappingBuilder<User> {
        TableMapping::builder("users")
            .schema("public")
            .column(ColumnMapping::new("id", ValueKind::I64, |u: &User| u.id).identifier())
            .column(ColumnMapping::new("name", ValueKind::String, |u: &User| {
                u.name.clone()
            }))
    }

    #[test]
    fn partitions_identifier_columns() {
        let mapping = user_columns().build().unwrap();

        assert_eq!(mapping.table_name().to_string(), "public.users");
        assert_eq!(mapping.identifier_columns(), ["id".to_string()]);
        assert_eq!(mapping.non_identifier_columns(), ["name".to_string()]);
        assert!(!mapping.columns()[0].is_nullable());
        assert!(mapping.columns()[1].is_nullable());
    }

    #[test]
    fn extracts_values() {
        let mapping = user_columns().build().unwrap();
        let user = User { id: 4, name: None };

        assert!(matches!(mapping.columns()[0].extract(&user), Ok(Value::I64(4))));
        assert!(matches!(mapping.columns()[1].extract(&user), Ok(Value::Null)));
    }

    #[test]
    fn rejects_empty_mapping() {
        let err = TableMapping::<User>::builder("users").build().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidMapping);
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = user_columns()
            .column(ColumnMapping::new("name", ValueKind::String, |_: &User| "x"))
            .build()
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidMapping);
    }

    #[test]
    fn rejects_unsafe_names() {
        let err = TableMapping::builder("users; drop table users")
            .column(ColumnMapping::new("id", ValueKind::I64, |u: &User| u.id))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);

        let err = user_columns()
            .column(ColumnMapping::new("bad name", ValueKind::I64, |u: &User| u.id))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidIdentifier);
    }
}
