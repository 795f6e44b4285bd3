//! Data row stream assembly.
//!
//! [`RowWriter`] accumulates the `DataRow` frames of one query response in
//! a single buffer, against a fixed column count. Each
//! [`add_row`](RowWriter::add_row) opens a frame with a placeholder length
//! that is patched when the row closes; typed writes append text-format
//! column values. The finished buffer is written to the socket as-is,
//! between `RowDescription` and `CommandComplete`.

use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SqlError;

/// Accumulates a `DataRow` stream against a fixed field schema.
///
/// Every row must receive exactly as many column writes as the schema has
/// fields; a mismatch is a host programming error and surfaces as an
/// `ERROR`-severity [`SqlError`] when the next row opens or the writer is
/// finished.
#[derive(Debug)]
pub struct RowWriter {
    num_fields: usize,
    num_rows: u64,
    buf: BytesMut,
    /// Position of the open row's length field, if a row is open.
    open_row: Option<usize>,
    /// Columns written to the open row so far.
    columns: usize,
}

impl RowWriter {
    /// Creates a writer for a schema of `num_fields` columns.
    pub fn new(num_fields: usize) -> Self {
        Self {
            num_fields,
            num_rows: 0,
            buf: BytesMut::new(),
            open_row: None,
            columns: 0,
        }
    }

    /// Number of columns each row must carry.
    pub fn num_fields(&self) -> usize {
        self.num_fields
    }

    /// Number of rows opened so far.
    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Opens the next `DataRow` and returns its column writer.
    ///
    /// Closes the previous row first, failing if it did not receive
    /// exactly [`num_fields`](Self::num_fields) columns.
    pub fn add_row(&mut self) -> Result<Row<'_>, SqlError> {
        self.close_row()?;

        self.buf.put_u8(b'D');
        self.open_row = Some(self.buf.len());
        self.buf.put_i32(0); // patched when the row closes
        self.buf.put_i16(self.num_fields as i16);
        self.columns = 0;
        self.num_rows += 1;

        Ok(Row { writer: self })
    }

    /// Checks the open row's column count and patches its length field.
    fn close_row(&mut self) -> Result<(), SqlError> {
        let Some(len_pos) = self.open_row.take() else {
            return Ok(());
        };

        if self.columns != self.num_fields {
            return Err(SqlError::internal(format!(
                "column count mismatch: row has {} columns, schema has {}",
                self.columns, self.num_fields
            )));
        }

        let len = (self.buf.len() - len_pos) as i32;
        self.buf[len_pos..][..4].copy_from_slice(&len.to_be_bytes());
        Ok(())
    }

    /// Closes the last row and returns the serialized `DataRow` stream
    /// together with the row count.
    pub fn finish(mut self) -> Result<(Bytes, u64), SqlError> {
        self.close_row()?;
        Ok((self.buf.freeze(), self.num_rows))
    }
}

/// Column writer scoped to one open row.
#[derive(Debug)]
pub struct Row<'a> {
    writer: &'a mut RowWriter,
}

impl Row<'_> {
    /// Appends one text-format column value.
    fn put_column(&mut self, value: &[u8]) -> Result<(), SqlError> {
        self.reserve_column()?;
        self.writer.buf.put_i32(value.len() as i32);
        self.writer.buf.put_slice(value);
        Ok(())
    }

    fn reserve_column(&mut self) -> Result<(), SqlError> {
        if self.writer.columns == self.writer.num_fields {
            return Err(SqlError::internal(format!(
                "column count mismatch: row already has {} columns",
                self.writer.num_fields
            )));
        }
        self.writer.columns += 1;
        Ok(())
    }

    /// Writes a SQL NULL (length -1, no payload).
    pub fn write_null(&mut self) -> Result<(), SqlError> {
        self.reserve_column()?;
        self.writer.buf.put_i32(-1);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) -> Result<(), SqlError> {
        self.put_column(if value { &b"true"[..] } else { &b"false"[..] })
    }

    pub fn write_int2(&mut self, value: i16) -> Result<(), SqlError> {
        self.put_column(value.to_string().as_bytes())
    }

    pub fn write_int4(&mut self, value: i32) -> Result<(), SqlError> {
        self.put_column(value.to_string().as_bytes())
    }

    pub fn write_int8(&mut self, value: i64) -> Result<(), SqlError> {
        self.put_column(value.to_string().as_bytes())
    }

    pub fn write_float4(&mut self, value: f32) -> Result<(), SqlError> {
        self.put_column(value.to_string().as_bytes())
    }

    pub fn write_float8(&mut self, value: f64) -> Result<(), SqlError> {
        self.put_column(value.to_string().as_bytes())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), SqlError> {
        self.put_column(value.as_bytes())
    }

    /// Writes a bytea column in the `\x`-prefixed hex text format.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<(), SqlError> {
        let mut text = String::with_capacity(2 + value.len() * 2);
        text.push_str("\\x");
        for byte in value {
            let _ = write!(text, "{byte:02x}");
        }
        self.put_column(text.as_bytes())
    }
}
