use crate::bulk_error;
use crate::error::{BulkResult, ErrorKind};
use crate::load::PipeReader;
use crate::session::{BulkSession, CopyOutcome};

/// Prefix of the query used to discover `NOT NULL` columns of a staging relation.
const NOT_NULL_QUERY_PREFIX: &str = "SELECT column_name FROM information_schema.columns";

/// A `COPY` received by a [`MemorySession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCopy {
    pub statement: String,
    /// Raw csv payload.
    pub payload: String,
    /// Parsed csv records.
    pub records: Vec<Vec<String>>,
}

/// In-memory [`BulkSession`] recording everything it is asked to run.
///
/// `INSERT` and `UPDATE` statements report as many affected rows as the last completed copy
/// loaded, unless configured otherwise.
#[derive(Debug)]
pub struct MemorySession {
    statements: Vec<String>,
    copies: Vec<RecordedCopy>,
    aborted_copies: usize,
    failing_prefixes: Vec<String>,
    not_null_columns: Vec<String>,
    affected_rows: Option<u64>,
    copy_supported: bool,
}

impl Default for MemorySession {
    fn default() -> Self {
        Self::new()
    }
}

impl MemorySession {
    pub fn new() -> MemorySession {
        Self {
            statements: Vec::new(),
            copies: Vec::new(),
            aborted_copies: 0,
            failing_prefixes: Vec::new(),
            not_null_columns: Vec::new(),
            affected_rows: None,
            copy_supported: true,
        }
    }

    /// Makes every statement or query starting with `prefix` fail.
    pub fn fail_statements_starting_with(mut self, prefix: &str) -> Self {
        self.failing_prefixes.push(prefix.to_string());
        self
    }

    /// Columns reported as `NOT NULL` for any staging relation.
    pub fn with_not_null_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_null_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Fixes the row count reported by every `INSERT` and `UPDATE`.
    pub fn with_affected_rows(mut self, rows: u64) -> Self {
        self.affected_rows = Some(rows);
        self
    }

    /// Makes the session refuse `COPY FROM STDIN`.
    pub fn without_copy_support(mut self) -> Self {
        self.copy_supported = false;
        self
    }

    /// Every statement, query and copy statement received, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.clone()
    }

    pub fn copies(&self) -> &[RecordedCopy] {
        &self.copies
    }

    pub fn aborted_copies(&self) -> usize {
        self.aborted_copies
    }

    fn record(&mut self, statement: &str) -> BulkResult<()> {
        self.statements.push(statement.to_string());

        if self
            .failing_prefixes
            .iter()
            .any(|prefix| statement.starts_with(prefix.as_str()))
        {
            return Err(bulk_error!(
                ErrorKind::QueryFailed,
                "Statement failed",
                format!("Injected failure for: {statement}")
            ));
        }

        Ok(())
    }
}

impl BulkSession for MemorySession {
    fn supports_copy(&self) -> bool {
        self.copy_supported
    }

    async fn execute(&mut self, statement: &str) -> BulkResult<u64> {
        self.record(statement)?;

        if statement.starts_with("INSERT") || statement.starts_with("UPDATE") {
            let last_copy_rows = self
                .copies
                .last()
                .map(|copy| copy.records.len() as u64)
                .unwrap_or(0);
            return Ok(self.affected_rows.unwrap_or(last_copy_rows));
        }

        Ok(0)
    }

    async fn query_column(&mut self, query: &str) -> BulkResult<Vec<String>> {
        self.record(query)?;

        if query.starts_with(NOT_NULL_QUERY_PREFIX) {
            return Ok(self.not_null_columns.clone());
        }

        Ok(Vec::new())
    }

    async fn copy_in(&mut self, statement: &str, mut reader: PipeReader) -> BulkResult<CopyOutcome> {
        self.record(statement)?;

        let Some(payload) = reader.read_to_end().await else {
            self.aborted_copies += 1;
            return Ok(CopyOutcome::Aborted);
        };

        let payload = String::from_utf8(payload.to_vec()).map_err(|err| {
            bulk_error!(ErrorKind::InvalidData, "Copy payload is not UTF-8", err)
        })?;
        let records = parse_records(&payload)?;

        let rows = records.len() as u64;
        self.copies.push(RecordedCopy {
            statement: statement.to_string(),
            payload,
            records,
        });

        Ok(CopyOutcome::Completed(rows))
    }
}

/// Splits a `COPY` csv payload into records.
///
/// An empty line is a record holding one empty field, as `COPY` reads it. The `csv` reader would
/// skip it.
fn parse_records(payload: &str) -> BulkResult<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut start = 0;
    let mut quoted = false;

    for (index, byte) in payload.bytes().enumerate() {
        match byte {
            b'"' => quoted = !quoted,
            b'\n' if !quoted => {
                records.push(parse_record(&payload[start..index])?);
                start = index + 1;
            }
            _ => {}
        }
    }
    if start < payload.len() {
        records.push(parse_record(&payload[start..])?);
    }

    Ok(records)
}

fn parse_record(line: &str) -> BulkResult<Vec<String>> {
    if line.is_empty() {
        return Ok(vec![String::new()]);
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(line.as_bytes());
    let mut record = csv::StringRecord::new();
    reader.read_record(&mut record)?;

    Ok(record.iter().map(str::to_string).collect())
}
