use std::fmt;

use crate::identifier::{IdentifierError, quote_identifier};

/// A Postgres relation name with an optional schema.
///
/// Without a schema the name resolves through the session's `search_path`.
#[derive(Debug, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct TableName {
    /// The schema containing the relation, if qualified.
    pub schema: Option<String>,
    /// The relation name within the schema.
    pub name: String,
}

impl TableName {
    pub fn new(schema: Option<String>, name: String) -> TableName {
        Self { schema, name }
    }

    /// Creates an unqualified name.
    pub fn unqualified(name: impl Into<String>) -> TableName {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    /// Returns a copy of this name using `schema` instead of its own.
    pub fn with_schema(&self, schema: impl Into<String>) -> TableName {
        Self {
            schema: Some(schema.into()),
            name: self.name.clone(),
        }
    }

    /// Returns the validated, quoted form, `"schema"."name"` or `"name"`.
    pub fn as_quoted_identifier(&self) -> Result<String, IdentifierError> {
        let quoted_name = quote_identifier(&self.name)?;

        match &self.schema {
            Some(schema) => {
                let quoted_schema = quote_identifier(schema)?;
                Ok(format!("{quoted_schema}.{quoted_name}"))
            }
            None => Ok(quoted_name),
        }
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{schema}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_qualified_names() {
        let name = TableName::new(Some("public".to_string()), "users".to_string());

        assert_eq!(name.as_quoted_identifier().unwrap(), "\"public\".\"users\"");
        assert_eq!(name.to_string(), "public.users");
    }

    #[test]
    fn quotes_unqualified_names() {
        let name = TableName::unqualified("users");

        assert_eq!(name.as_quoted_identifier().unwrap(), "\"users\"");
        assert_eq!(name.to_string(), "users");
    }

    #[test]
    fn schema_override_replaces_schema() {
        let name = TableName::new(Some("public".to_string()), "users".to_string());

        assert_eq!(
            name.with_schema("archive").as_quoted_identifier().unwrap(),
            "\"archive\".\"users\""
        );
    }

    #[test]
    fn invalid_schema_is_rejected() {
        let name = TableName::new(Some("pub lic".to_string()), "users".to_string());

        assert!(name.as_quoted_identifier().is_err());
    }
}
