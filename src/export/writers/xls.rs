//! Spreadsheet writer for export operations
//!
//! The workbook container can only be serialized once it is complete, so
//! rows are accumulated in an in-memory worksheet and the whole workbook is
//! written to the sink on finalize. Memory grows with the result set.
//!
//! Integers beyond 2^53 are stored as text cells so no digits are lost.

use async_trait::async_trait;
use rust_xlsxwriter::{Workbook, Worksheet};
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::error::{ExecutionError, Result};
use crate::model::{FieldValue, ProjectedRow};

use super::super::schema::ColumnSchema;
use super::{FormatWriter, flush_sink, write_bytes};

/// Writer for single-sheet spreadsheet workbooks
pub struct XlsWriter<W> {
    sink: W,
    sheet_name: String,
    worksheet: Option<Worksheet>,
    /// Next worksheet row; row 0 is the header
    next_row: u32,
    written: u64,
    bytes: u64,
}

impl<W> XlsWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Create a new spreadsheet writer
    ///
    /// # Arguments
    /// * `sink` - Output byte sink, written once on finalize
    /// * `sheet_name` - Name of the single worksheet
    pub fn new(sink: W, sheet_name: &str) -> Self {
        Self {
            sink,
            sheet_name: sheet_name.to_string(),
            worksheet: Some(Worksheet::new()),
            next_row: 1,
            written: 0,
            bytes: 0,
        }
    }

    /// Recover the sink
    pub fn into_inner(self) -> W {
        self.sink
    }

    fn worksheet(&mut self) -> Result<&mut Worksheet> {
        self.worksheet.as_mut().ok_or_else(|| {
            ExecutionError::Spreadsheet("workbook already finalized".to_string()).into()
        })
    }

    fn column(index: usize) -> Result<u16> {
        u16::try_from(index).map_err(|_| {
            ExecutionError::Spreadsheet(format!("column {index} exceeds the sheet width")).into()
        })
    }

    fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &FieldValue) -> Result<()> {
        match value {
            FieldValue::Number(n) => match exact_f64(n) {
                Some(f) => {
                    sheet.write_number(row, col, f)?;
                }
                None => {
                    sheet.write_string(row, col, n.to_string())?;
                }
            },
            FieldValue::String(s) => {
                sheet.write_string(row, col, s)?;
            }
            FieldValue::Bool(b) => {
                sheet.write_string(row, col, b.to_string())?;
            }
            // blank cell
            FieldValue::Null => {}
        }
        Ok(())
    }
}

/// Largest integer magnitude a spreadsheet number cell holds exactly
const MAX_EXACT_INT: u64 = 1 << 53;

/// Numeric cell value, or None when the number would lose precision
fn exact_f64(n: &serde_json::Number) -> Option<f64> {
    if let Some(i) = n.as_i64() {
        return (i.unsigned_abs() <= MAX_EXACT_INT).then_some(i as f64);
    }
    if let Some(u) = n.as_u64() {
        return (u <= MAX_EXACT_INT).then_some(u as f64);
    }
    n.as_f64()
}

#[async_trait]
impl<W> FormatWriter for XlsWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_header(&mut self, schema: &ColumnSchema) -> Result<()> {
        let sheet_name = self.sheet_name.clone();
        let sheet = self.worksheet()?;
        sheet.set_name(&sheet_name)?;
        for (i, name) in schema.iter().enumerate() {
            sheet.write_string(0, Self::column(i)?, name)?;
        }
        debug!("Wrote spreadsheet header: {} columns", schema.len());
        Ok(())
    }

    async fn write_row(&mut self, row: &ProjectedRow) -> Result<()> {
        let row_index = self.next_row;
        let sheet = self.worksheet()?;
        for (i, value) in row.values.iter().enumerate() {
            Self::write_cell(sheet, row_index, Self::column(i)?, value)?;
        }
        self.next_row += 1;
        self.written += 1;
        Ok(())
    }

    async fn finalize(&mut self) -> Result<()> {
        let Some(sheet) = self.worksheet.take() else {
            return Ok(());
        };

        let buffer = {
            let mut workbook = Workbook::new();
            workbook.push_worksheet(sheet);
            workbook.save_to_buffer()?
        };

        write_bytes(&mut self.sink, &buffer).await?;
        flush_sink(&mut self.sink).await?;
        self.bytes = buffer.len() as u64;
        info!(
            "Serialized spreadsheet: {} rows, {} bytes",
            self.written, self.bytes
        );
        Ok(())
    }

    fn rows_written(&self) -> u64 {
        self.written
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}
