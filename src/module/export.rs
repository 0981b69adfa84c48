//! CSV encoding of listing rows, one record per chunk.

use crate::error::AppError;
use crate::format::to_text;
use crate::schema::TableSchema;
use crate::service::{Row, RowStream};
use futures::stream::{self, BoxStream, StreamExt};

/// Encoded CSV chunks: the header first, then one chunk per row.
pub type CsvStream = BoxStream<'static, Result<Vec<u8>, AppError>>;

const FORMULA_PREFIXES: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

/// Prefix spreadsheet-formula triggers with a single quote.
pub fn neutralize(cell: String) -> String {
    if cell.starts_with(FORMULA_PREFIXES) {
        format!("'{}", cell)
    } else {
        cell
    }
}

pub fn encode_record<I, S>(cells: I) -> Result<Vec<u8>, AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer
        .write_record(cells)
        .map_err(|e| AppError::Export(format!("failed to write CSV record: {}", e)))?;
    writer
        .into_inner()
        .map_err(|e| AppError::Export(format!("failed to flush CSV record: {}", e)))
}

fn encode_row(columns: &[String], row: &Row) -> Result<Vec<u8>, AppError> {
    encode_record(
        columns
            .iter()
            .map(|c| neutralize(row.get(c).map(to_text).unwrap_or_default())),
    )
}

/// Header of column labels followed by `rows`, columns in declared order.
pub fn csv_stream(schema: &TableSchema, rows: RowStream) -> Result<CsvStream, AppError> {
    let header = encode_record(schema.labels().into_iter().map(|l| neutralize(l.to_string())))?;
    let columns: Vec<String> = schema.columns.iter().map(|c| c.name.clone()).collect();
    let body = rows.map(move |row| row.and_then(|r| encode_row(&columns, &r)));
    Ok(stream::once(async move { Ok(header) }).chain(body).boxed())
}
