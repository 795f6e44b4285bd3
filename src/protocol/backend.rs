use bytes::{BufMut, BytesMut};
use std::io;
use tokio_util::codec::Encoder;

use crate::error::SqlError;
use crate::protocol::codec::{PostgresCodec, StartupCodec, put_cstring};
use crate::protocol::types::{ErrorFieldCode, FormatCode};
use crate::statement::Field;

/// SQL State codes for error responses.
///
/// References:
/// - <https://www.postgresql.org/docs/current/errcodes-appendix.html>
pub mod sql_state {
    /// Connection exception (generic)
    pub const CONNECTION_EXCEPTION: &str = "08000";
    /// Protocol violation
    pub const PROTOCOL_VIOLATION: &str = "08P01";
    /// Feature not supported
    pub const FEATURE_NOT_SUPPORTED: &str = "0A000";
    /// Internal error
    pub const INTERNAL_ERROR: &str = "XX000";
}

/// Messages sent by the backend (server) to the client.
#[derive(Debug)]
pub enum BackendMessage {
    /// 'R' - Authentication response (AuthenticationOk)
    AuthenticationOk,
    /// 'S' - Parameter status notification
    ParameterStatus { name: String, value: String },
    /// 'Z' - Ready for query
    ReadyForQuery { status: TransactionStatus },
    /// 'E' - Error response
    ErrorResponse { fields: Vec<ErrorField> },
    /// 'T' - Row description (column metadata)
    RowDescription { fields: Vec<FieldDescription> },
    /// 'D' - Data row
    DataRow { values: Vec<DataValue> },
    /// 'C' - Command complete
    CommandComplete { tag: String },
    /// The single untagged byte 'N' answering SSLRequest/GSSENCRequest
    SslResponse,
}

impl BackendMessage {
    /// Returns the message type byte.
    ///
    /// `SslResponse` has none: it is the only backend reply emitted outside
    /// the tag-and-length framing.
    fn ty(&self) -> Option<u8> {
        match self {
            BackendMessage::AuthenticationOk => Some(b'R'),
            BackendMessage::ParameterStatus { .. } => Some(b'S'),
            BackendMessage::ReadyForQuery { .. } => Some(b'Z'),
            BackendMessage::ErrorResponse { .. } => Some(b'E'),
            BackendMessage::RowDescription { .. } => Some(b'T'),
            BackendMessage::DataRow { .. } => Some(b'D'),
            BackendMessage::CommandComplete { .. } => Some(b'C'),
            BackendMessage::SslResponse => None,
        }
    }

    /// Encodes this message into the given BytesMut buffer.
    pub fn encode(&self, dst: &mut BytesMut) {
        let Some(tag) = self.ty() else {
            dst.put_u8(b'N');
            return;
        };
        dst.put_u8(tag);

        let len_pos = dst.len();
        dst.put_i32(0); // patched below

        self.encode_body(dst);

        let total_len = (dst.len() - len_pos) as i32;
        dst[len_pos..][..4].copy_from_slice(&total_len.to_be_bytes());
    }

    /// Encodes the body of this message into the given BytesMut buffer.
    fn encode_body(&self, dst: &mut BytesMut) {
        match self {
            BackendMessage::AuthenticationOk => {
                dst.put_i32(0); // auth type 0 = Ok
            }
            BackendMessage::ParameterStatus { name, value } => {
                put_cstring(dst, name);
                put_cstring(dst, value);
            }
            BackendMessage::ReadyForQuery { status } => {
                dst.put_u8(status.as_byte());
            }
            BackendMessage::ErrorResponse { fields } => {
                for field in fields {
                    field.encode(dst);
                }
                dst.put_u8(0); // terminator
            }
            BackendMessage::RowDescription { fields } => {
                dst.put_i16(fields.len() as i16);
                for field in fields {
                    field.encode(dst);
                }
            }
            BackendMessage::DataRow { values } => {
                dst.put_i16(values.len() as i16);
                for value in values {
                    value.encode(dst);
                }
            }
            BackendMessage::CommandComplete { tag } => {
                put_cstring(dst, tag);
            }
            BackendMessage::SslResponse => unreachable!("encoded without framing"),
        }
    }
}

impl Encoder<BackendMessage> for StartupCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}

impl Encoder<BackendMessage> for PostgresCodec {
    type Error = io::Error;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), Self::Error> {
        msg.encode(dst);
        Ok(())
    }
}

/// Transaction status indicator for ReadyForQuery message.
///
/// This engine has no transaction tracking and always reports `Idle`;
/// the other variants exist for hosts that grow transaction semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// 'I' - Idle (not in a transaction block)
    Idle,
    /// 'T' - In a transaction block
    InTransaction,
    /// 'E' - In a failed transaction block
    Failed,
}

impl TransactionStatus {
    fn as_byte(self) -> u8 {
        match self {
            TransactionStatus::Idle => b'I',
            TransactionStatus::InTransaction => b'T',
            TransactionStatus::Failed => b'E',
        }
    }
}

/// Error/Notice field.
#[derive(Debug)]
pub struct ErrorField {
    pub code: ErrorFieldCode,
    pub value: String,
}

impl ErrorField {
    /// Creates a new error field.
    pub fn new(code: ErrorFieldCode, value: impl Into<String>) -> Self {
        Self {
            code,
            value: value.into(),
        }
    }

    /// Encodes this error field into the given BytesMut buffer.
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(self.code.as_u8());
        put_cstring(dst, &self.value);
    }
}

impl From<&SqlError> for BackendMessage {
    fn from(error: &SqlError) -> Self {
        let severity = error.severity().as_str();
        BackendMessage::ErrorResponse {
            fields: vec![
                ErrorField::new(ErrorFieldCode::Severity, severity),
                ErrorField::new(ErrorFieldCode::SeverityNonLocalized, severity),
                ErrorField::new(ErrorFieldCode::SqlState, error.sqlstate()),
                ErrorField::new(ErrorFieldCode::Message, error.message()),
            ],
        }
    }
}

/// A single column value in a data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// SQL NULL value (encoded as length -1)
    Null,
    /// Non-NULL value (encoded as length + data bytes)
    Data(Vec<u8>),
}

impl DataValue {
    /// Encodes this data value into the given BytesMut buffer.
    fn encode(&self, dst: &mut BytesMut) {
        match self {
            DataValue::Null => dst.put_i32(-1),
            DataValue::Data(bytes) => {
                dst.put_i32(bytes.len() as i32);
                dst.put_slice(bytes);
            }
        }
    }
}

/// Field description for RowDescription message.
#[derive(Debug, Clone)]
pub struct FieldDescription {
    /// Column name
    pub name: String,
    /// Table OID (0 if not from a table)
    pub table_oid: i32,
    /// Column attribute number (0 if not from a table)
    pub column_id: i16,
    /// Data type OID
    pub type_oid: i32,
    /// Data type size (-1 for variable length)
    pub type_size: i16,
    /// Type modifier (-1 if not applicable)
    pub type_modifier: i32,
    /// Format code
    pub format_code: FormatCode,
}

impl FieldDescription {
    /// Encodes this field description into the given BytesMut buffer.
    fn encode(&self, dst: &mut BytesMut) {
        put_cstring(dst, &self.name);
        dst.put_i32(self.table_oid);
        dst.put_i16(self.column_id);
        dst.put_i32(self.type_oid);
        dst.put_i16(self.type_size);
        dst.put_i32(self.type_modifier);
        dst.put_i16(self.format_code.as_i16());
    }
}

impl From<&Field> for FieldDescription {
    fn from(field: &Field) -> Self {
        FieldDescription {
            name: field.name.clone(),
            table_oid: 0,
            column_id: 0,
            type_oid: field.ty.oid(),
            type_size: field.ty.type_size(),
            type_modifier: -1,
            format_code: FormatCode::Text,
        }
    }
}
