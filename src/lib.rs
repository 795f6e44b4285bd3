//! Embeddable PostgreSQL wire-protocol server engine.
//!
//! `pgconduit` speaks the PostgreSQL v3.0 frontend/backend protocol well
//! enough for standard clients (`psql`, libpq, JDBC, asyncpg) to connect
//! through the trust path and run simple queries. The host supplies a
//! query handler mapping SQL text to a [`PreparedStatement`] (a field
//! schema plus a row producer), and the engine owns everything below:
//! connection lifecycle, startup negotiation, message framing, typed row
//! encoding, error responses, and concurrent sessions on a shared runtime.
//!
//! ```no_run
//! use pgconduit::{Field, ParseHandler, PreparedStatement, Server, Session, Type};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind("127.0.0.1:15432", |_session: &Session| -> ParseHandler {
//!         Box::new(|_sql| {
//!             Ok(PreparedStatement::new(
//!                 vec![Field::new("n", Type::Int4)],
//!                 Box::new(|writer, _values| {
//!                     writer.add_row()?.write_int4(42)?;
//!                     Ok(())
//!                 }),
//!             ))
//!         })
//!     })
//!     .await?;
//!     server.serve().await
//! }
//! ```

pub mod error;
pub mod protocol;
pub mod row;
pub mod server;
pub mod session;
pub mod statement;

mod util;

pub use error::{Severity, SqlError};
pub use protocol::Type;
pub use row::{Row, RowWriter};
pub use server::{HandlerFactory, Server};
pub use session::{Session, SessionError, SessionId};
pub use statement::{Field, ParseHandler, PreparedStatement, RowHandler, Values};
