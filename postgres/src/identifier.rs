use thiserror::Error;

/// Maximum length of a Postgres identifier in bytes.
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Error returned when a name cannot be used as an identifier in generated SQL.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Identifier must not be empty")]
    Empty,

    #[error("Identifier `{0}` is longer than 63 characters")]
    TooLong(String),

    #[error(
        "Identifier `{0}` must start with a letter or underscore and contain only letters, digits and underscores"
    )]
    InvalidCharacters(String),
}

/// Checks that `name` is a plain identifier.
///
/// A plain identifier starts with an ASCII letter or underscore, continues with ASCII letters,
/// digits or underscores and is at most [`MAX_IDENTIFIER_LENGTH`] bytes long.
pub fn validate_identifier(name: &str) -> Result<(), IdentifierError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(IdentifierError::Empty);
    };

    if !(first.is_ascii_alphabetic() || first == '_')
        || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(IdentifierError::InvalidCharacters(name.to_string()));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(IdentifierError::TooLong(name.to_string()));
    }

    Ok(())
}

/// Validates `name` and wraps it in double quotes.
pub fn quote_identifier(name: &str) -> Result<String, IdentifierError> {
    validate_identifier(name)?;

    Ok(format!("\"{name}\""))
}

/// Validates and quotes every name, joining them with a bare comma.
pub fn quote_identifiers<I, S>(names: I) -> Result<String, IdentifierError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let quoted = names
        .into_iter()
        .map(|name| quote_identifier(name.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(quoted.join(","))
}
