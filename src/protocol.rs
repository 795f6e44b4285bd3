//! PostgreSQL wire protocol implementation.
//!
//! This module implements the server side of the PostgreSQL v3.0 wire
//! protocol: framing, startup-phase negotiation messages, and the Simple
//! Query message set understood by standard clients (`psql`, libpq, JDBC,
//! asyncpg).
//!
//! ## Architecture
//!
//! ```text
//! +----------+                           +-----------+
//! |  Client  |  --- FrontendMessage -->  |  Session  |
//! |  (psql)  |  <-- BackendMessage  ---  | (pgconduit)|
//! +----------+                           +-----------+
//!               ^                   ^
//!               |   PostgresCodec   |
//!               +-------------------+
//! ```
//!
//! ## Terminology
//!
//! - **FrontendMessage**: Messages from client to server (Query, Terminate, ...)
//! - **StartupMessage**: Untagged frontend messages of the connection handshake
//!   (SSLRequest, GSSENCRequest, CancelRequest, Startup)
//! - **BackendMessage**: Messages from server to client (RowDescription, DataRow, ...)
//! - **Codec**: Framing and serialization for the wire protocol

pub mod backend;
pub mod codec;
pub mod error;
pub mod frontend;
pub mod types;

pub use backend::{
    BackendMessage, DataValue, ErrorField, FieldDescription, TransactionStatus, sql_state,
};
pub use codec::{PostgresCodec, StartupCodec};
pub use error::ProtocolError;
pub use frontend::{FrontendMessage, StartupMessage, StartupParameters};
pub use types::{ErrorFieldCode, FormatCode, Type, type_oid};
