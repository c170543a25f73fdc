use uuid::Uuid;

use crate::identifier::{IdentifierError, MAX_IDENTIFIER_LENGTH, validate_identifier};

/// Suffix appended to a staging name to name its index.
pub const STAGING_INDEX_SUFFIX: &str = "_ix";

/// Maximum length of a generated staging name, leaving room for [`STAGING_INDEX_SUFFIX`].
pub const MAX_STAGING_NAME_LENGTH: usize = MAX_IDENTIFIER_LENGTH - STAGING_INDEX_SUFFIX.len();

/// Number of random hex characters closing every staging name.
const STAGING_SUFFIX_LENGTH: usize = 8;

/// Generates a staging relation name for `table`.
///
/// The name is `<prefix><table>_<8 hex chars>`. The table part is shortened when needed so the
/// whole name stays within [`MAX_STAGING_NAME_LENGTH`].
pub fn staging_table_name(prefix: &str, table: &str) -> Result<String, IdentifierError> {
    validate_identifier(table)?;

    let suffix = Uuid::new_v4().simple().to_string();
    let suffix = &suffix[..STAGING_SUFFIX_LENGTH];

    let available = MAX_STAGING_NAME_LENGTH.saturating_sub(prefix.len() + 1 + STAGING_SUFFIX_LENGTH);
    let table = &table[..table.len().min(available)];

    let name = format!("{prefix}{table}_{suffix}");
    validate_identifier(&name)?;

    Ok(name)
}

/// Returns the name of the index built on a staging relation.
pub fn staging_index_name(staging_name: &str) -> String {
    format!("{staging_name}{STAGING_INDEX_SUFFIX}")
}
