//! Set based statements moving staged rows into the target relation.

use config::shared::ConflictMode;
use postgres::identifier::{quote_identifier, quote_identifiers};
use postgres::types::TableName;
use tracing::debug;

use crate::bail;
use crate::bulk_error;
use crate::config::ImportConfig;
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::session::BulkSession;
use crate::types::TableMapping;

/// Columns a plain update matches and refreshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub match_columns: Vec<String>,
    pub refresh_columns: Vec<String>,
}

impl UpdatePlan {
    /// Resolves the plan for `mapping`.
    ///
    /// Match columns default to the identifier columns, refresh columns to every non-identifier
    /// column. Configured columns must be mapped.
    pub fn resolve<T>(mapping: &TableMapping<T>, config: &ImportConfig) -> BulkResult<UpdatePlan> {
        let match_columns = if config.match_columns().is_empty() {
            mapping.identifier_columns().to_vec()
        } else {
            ensure_mapped(mapping, config.match_columns(), "match")?;
            config.match_columns().to_vec()
        };

        if match_columns.is_empty() {
            bail!(
                ErrorKind::InvalidMapping,
                "No columns to match rows on",
                format!(
                    "Table '{}' has no identifier columns and no match columns are configured",
                    mapping.table_name()
                )
            );
        }

        let refresh_columns = if config.update_columns().is_empty() {
            mapping.non_identifier_columns().to_vec()
        } else {
            ensure_mapped(mapping, config.update_columns(), "update")?;
            config.update_columns().to_vec()
        };

        if refresh_columns.is_empty() {
            bail!(
                ErrorKind::InvalidMapping,
                "No columns to update",
                format!(
                    "Table '{}' maps only identifier columns and no update columns are configured",
                    mapping.table_name()
                )
            );
        }

        Ok(UpdatePlan {
            match_columns,
            refresh_columns,
        })
    }
}

/// Columns an upsert inserts, detects conflicts on and refreshes on conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertPlan {
    pub mode: ConflictMode,
    pub columns: Vec<String>,
    pub detect_columns: Vec<String>,
    pub refresh_columns: Vec<String>,
}

impl UpsertPlan {
    /// Resolves the plan for `mapping`.
    ///
    /// Detect columns default to the identifier columns. `replace_all` refreshes every
    /// non-identifier column, `replace_specified` the configured update columns.
    pub fn resolve<T>(mapping: &TableMapping<T>, config: &ImportConfig) -> BulkResult<UpsertPlan> {
        let mode = config.conflict_mode();

        let detect_columns = if config.conflict_columns().is_empty() {
            mapping.identifier_columns().to_vec()
        } else {
            ensure_mapped(mapping, config.conflict_columns(), "conflict")?;
            config.conflict_columns().to_vec()
        };

        let refresh_columns = match mode {
            ConflictMode::Fail | ConflictMode::Skip => Vec::new(),
            ConflictMode::ReplaceAll => mapping.non_identifier_columns().to_vec(),
            ConflictMode::ReplaceSpecified => {
                ensure_mapped(mapping, config.update_columns(), "update")?;
                config.update_columns().to_vec()
            }
        };

        if mode.refreshes_rows() {
            if detect_columns.is_empty() {
                bail!(
                    ErrorKind::InvalidMapping,
                    "No columns to detect conflicts on",
                    format!("Conflict mode '{mode}' needs conflict columns")
                );
            }

            if refresh_columns.is_empty() {
                bail!(
                    ErrorKind::InvalidMapping,
                    "No columns to refresh on conflict",
                    format!(
                        "Conflict mode '{mode}' on table '{}' has no column to refresh",
                        mapping.table_name()
                    )
                );
            }
        }

        Ok(UpsertPlan {
            mode,
            columns: mapping.column_names().map(str::to_string).collect(),
            detect_columns,
            refresh_columns,
        })
    }
}

fn ensure_mapped<T>(mapping: &TableMapping<T>, columns: &[String], role: &str) -> BulkResult<()> {
    if let Some(column) = columns.iter().find(|column| !mapping.has_column(column)) {
        bail!(
            ErrorKind::InvalidMapping,
            "Configured column is not mapped",
            format!(
                "The {role} column '{column}' is not mapped for table '{}'",
                mapping.table_name()
            )
        );
    }

    Ok(())
}

/// Builds `UPDATE <target> AS t SET "c"=s."c",... FROM "<staging>" AS s WHERE t."m"=s."m" AND ...`.
pub fn update_statement(target: &TableName, staging: &str, plan: &UpdatePlan) -> BulkResult<String> {
    let target = target.as_quoted_identifier()?;
    let staging = quote_identifier(staging)?;

    let assignments = plan
        .refresh_columns
        .iter()
        .map(|column| quote_identifier(column).map(|quoted| format!("{quoted}=s.{quoted}")))
        .collect::<Result<Vec<_>, _>>()?
        .join(",");

    let conditions = plan
        .match_columns
        .iter()
        .map(|column| quote_identifier(column).map(|quoted| format!("t.{quoted}=s.{quoted}")))
        .collect::<Result<Vec<_>, _>>()?
        .join(" AND ");

    Ok(format!(
        "UPDATE {target} AS t SET {assignments} FROM {staging} AS s WHERE {conditions}"
    ))
}

/// Builds `INSERT INTO <target> (<cols>) SELECT <cols> FROM "<staging>"` followed by the conflict
/// clause of the plan's mode.
pub fn upsert_statement(target: &TableName, staging: &str, plan: &UpsertPlan) -> BulkResult<String> {
    let target = target.as_quoted_identifier()?;
    let staging = quote_identifier(staging)?;
    let columns = quote_identifiers(&plan.columns)?;

    let mut statement = format!("INSERT INTO {target} ({columns}) SELECT {columns} FROM {staging}");

    match plan.mode {
        ConflictMode::Fail => {}
        ConflictMode::Skip => {
            if plan.detect_columns.is_empty() {
                statement.push_str(" ON CONFLICT DO NOTHING");
            } else {
                let detect = quote_identifiers(&plan.detect_columns)?;
                statement.push_str(&format!(" ON CONFLICT ({detect}) DO NOTHING"));
            }
        }
        ConflictMode::ReplaceAll | ConflictMode::ReplaceSpecified => {
            let detect = quote_identifiers(&plan.detect_columns)?;
            let assignments = plan
                .refresh_columns
                .iter()
                .map(|column| {
                    quote_identifier(column).map(|quoted| format!("{quoted}=EXCLUDED.{quoted}"))
                })
                .collect::<Result<Vec<_>, _>>()?
                .join(",");

            statement.push_str(&format!(
                " ON CONFLICT ({detect}) DO UPDATE SET {assignments}"
            ));
        }
    }

    Ok(statement)
}

/// Runs reconciliation statements, wrapping failures with the target relation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOperationExecutor;

impl SetOperationExecutor {
    /// Updates target rows from the staging relation and returns the affected row count.
    ///
    /// Every matched row counts, whether or not its values changed.
    pub async fn update<S: BulkSession>(
        &self,
        session: &mut S,
        target: &TableName,
        staging: &str,
        plan: &UpdatePlan,
    ) -> BulkResult<u64> {
        let statement = update_statement(target, staging, plan)?;
        self.run(session, target, &statement, "update").await
    }

    /// Inserts staged rows applying the conflict mode and returns the inserted plus updated
    /// row count.
    pub async fn upsert<S: BulkSession>(
        &self,
        session: &mut S,
        target: &TableName,
        staging: &str,
        plan: &UpsertPlan,
    ) -> BulkResult<u64> {
        let statement = upsert_statement(target, staging, plan)?;
        self.run(session, target, &statement, "upsert").await
    }

    async fn run<S: BulkSession>(
        &self,
        session: &mut S,
        target: &TableName,
        statement: &str,
        operation: &str,
    ) -> BulkResult<u64> {
        debug!(%target, %statement, "running {operation}");

        session
            .execute(statement)
            .await
            .map_err(|err| reconciliation_error(target, operation, err))
    }
}

fn reconciliation_error(target: &TableName, operation: &str, err: BulkError) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        ErrorKind::ReconciliationFailed,
        "Reconciliation statement failed",
        format!("The {operation} of '{target}' failed: {cause}"),
        source: err
    )
}
