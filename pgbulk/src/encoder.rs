//! Row encoding of entities into CSV records for `COPY ... FROM STDIN WITH (FORMAT csv)`.

use std::io;
use std::sync::Arc;

use config::shared::NullMode;

use crate::bulk_error;
use crate::codec::CodecRegistry;
use crate::error::{BulkError, BulkResult, ErrorKind};
use crate::types::{ColumnMapping, TableMapping};

/// Creates a CSV writer producing records in the layout `COPY` expects.
///
/// No header, `\n` terminated records, fields quoted only when they contain a delimiter, quote or
/// line break.
fn csv_writer<W: io::Write>(inner: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(inner)
}

/// Writes CSV records for `COPY` into `W`.
///
/// A record made of a single empty field is written as a bare `\n`. The `csv` crate quotes such
/// a field as `""`, which `COPY` reads as an empty string instead of a null.
pub struct RecordWriter<W: io::Write> {
    csv: Option<csv::Writer<W>>,
}

impl<W: io::Write> RecordWriter<W> {
    pub fn new(inner: W) -> RecordWriter<W> {
        Self {
            csv: Some(csv_writer(inner)),
        }
    }

    pub fn write_record(&mut self, fields: &[String]) -> BulkResult<()> {
        if let [field] = fields {
            if field.is_empty() {
                self.with_inner(|inner| inner.write_all(b"\n"))??;
                return Ok(());
            }
        }

        self.csv_mut()?.write_record(fields)?;

        Ok(())
    }

    /// Pushes records buffered by the CSV layer into the inner writer.
    pub fn flush(&mut self) -> BulkResult<()> {
        self.csv_mut()?.flush()?;

        Ok(())
    }

    /// Returns the inner writer. Records may still be buffered in front of it.
    pub fn get_ref(&self) -> BulkResult<&W> {
        match &self.csv {
            Some(csv) => Ok(csv.get_ref()),
            None => Err(unusable()),
        }
    }

    /// Flushes every buffered record and runs `f` on the inner writer.
    pub fn with_inner<R>(&mut self, f: impl FnOnce(&mut W) -> R) -> BulkResult<R> {
        let csv = self.csv.take().ok_or_else(unusable)?;
        let mut inner = csv.into_inner().map_err(|err| err.into_error())?;

        let result = f(&mut inner);
        self.csv = Some(csv_writer(inner));

        Ok(result)
    }

    /// Flushes every buffered record and returns the inner writer.
    pub fn into_inner(mut self) -> BulkResult<W> {
        let csv = self.csv.take().ok_or_else(unusable)?;

        Ok(csv.into_inner().map_err(|err| err.into_error())?)
    }

    fn csv_mut(&mut self) -> BulkResult<&mut csv::Writer<W>> {
        self.csv.as_mut().ok_or_else(unusable)
    }
}

fn unusable() -> BulkError {
    bulk_error!(
        ErrorKind::EncodingFailed,
        "Record writer is unusable after an earlier write failure"
    )
}

/// Encodes entities one record at a time, in input order.
///
/// Nothing but the current record is buffered by the encoder itself.
pub struct RowEncoder<T> {
    mapping: Arc<TableMapping<T>>,
    registry: Arc<CodecRegistry>,
    null_mode: NullMode,
    tokens: Vec<String>,
    rows: u64,
}

impl<T> RowEncoder<T> {
    pub fn new(
        mapping: Arc<TableMapping<T>>,
        registry: Arc<CodecRegistry>,
        null_mode: NullMode,
    ) -> RowEncoder<T> {
        let tokens = vec![String::new(); mapping.columns().len()];

        Self {
            mapping,
            registry,
            null_mode,
            tokens,
            rows: 0,
        }
    }

    /// Number of records written so far.
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// Writes the record for `entity`.
    pub fn encode<W: io::Write>(
        &mut self,
        entity: &T,
        writer: &mut RecordWriter<W>,
    ) -> BulkResult<()> {
        for (column, token) in self.mapping.columns().iter().zip(self.tokens.iter_mut()) {
            token.clear();

            let value = column
                .extract(entity)
                .map_err(|err| column_error(&self.mapping, self.rows, column, err))?;

            if value.is_null() && !column.is_nullable() {
                return Err(null_violation(&self.mapping, self.rows, column));
            }

            self.registry
                .encode_into(&value, self.null_mode, token)
                .map_err(|err| column_error(&self.mapping, self.rows, column, err))?;
        }

        writer.write_record(&self.tokens)?;
        self.rows += 1;

        Ok(())
    }

    /// Writes a record for every entity and returns the total number of records written.
    pub fn encode_all<I, W>(&mut self, entities: I, writer: &mut RecordWriter<W>) -> BulkResult<u64>
    where
        I: IntoIterator<Item = T>,
        W: io::Write,
    {
        for entity in entities {
            self.encode(&entity, writer)?;
        }
        writer.flush()?;

        Ok(self.rows)
    }
}

fn null_violation<T>(mapping: &TableMapping<T>, row: u64, column: &ColumnMapping<T>) -> BulkError {
    let reason = if column.is_identifier() {
        "identifier"
    } else {
        "non-nullable"
    };

    bulk_error!(
        ErrorKind::EncodingFailed,
        "Null value in a column that does not accept nulls",
        format!(
            "Row {row} has a null {reason} column '{}' ({}) for table '{}'",
            column.name(),
            column.declared_type(),
            mapping.table_name()
        )
    )
}

fn column_error<T>(
    mapping: &TableMapping<T>,
    row: u64,
    column: &ColumnMapping<T>,
    err: BulkError,
) -> BulkError {
    let cause = err.detail().unwrap_or(err.description()).to_string();

    bulk_error!(
        ErrorKind::EncodingFailed,
        "Column value could not be encoded",
        format!(
            "Row {row}, column '{}' ({}) of table '{}': {cause}",
            column.name(),
            column.declared_type(),
            mapping.table_name()
        ),
        source: err
    )
}
