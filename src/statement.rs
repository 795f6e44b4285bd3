//! Prepared statements produced by the host's query handler.
//!
//! The engine hands every incoming SQL string to a host-supplied
//! [`ParseHandler`]; the returned [`PreparedStatement`] declares the result
//! schema and a [`RowHandler`] that produces the rows. The engine owns
//! everything below that boundary.

use crate::error::SqlError;
use crate::protocol::Type;
use crate::row::RowWriter;

/// A single column of a result schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name as presented to the client.
    pub name: String,
    /// Column data type.
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Parameter values bound to a statement execution.
///
/// Always empty on the simple-query path; the slot exists so row handlers
/// keep their shape if a host adds extended-query support.
pub type Values = Vec<Option<Vec<u8>>>;

/// Produces the rows of a statement, one [`RowWriter::add_row`] per row.
pub type RowHandler = Box<dyn FnMut(&mut RowWriter, &Values) -> Result<(), SqlError> + Send>;

/// Turns a SQL string into a [`PreparedStatement`].
///
/// Invoked once per `Query` message on the owning session. The SQL text is
/// opaque to the engine and handed over verbatim.
pub type ParseHandler = Box<dyn FnMut(&str) -> Result<PreparedStatement, SqlError> + Send>;

/// A statement ready for execution: a result schema plus a row producer.
pub struct PreparedStatement {
    /// Ordered result schema, sent as `RowDescription`.
    pub fields: Vec<Field>,
    /// Row producer, driven once per execution.
    pub handler: RowHandler,
}

impl PreparedStatement {
    pub fn new(fields: Vec<Field>, handler: RowHandler) -> Self {
        Self { fields, handler }
    }
}

impl std::fmt::Debug for PreparedStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}
