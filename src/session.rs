//! Protocol session driving one client connection.
//!
//! A [`Session`] owns one accepted socket and runs it through the protocol
//! state machine: startup negotiation (SSL/GSSAPI rejection, trust-path
//! authentication, parameter reporting), then the query/ready cycle until
//! the peer terminates or a fatal error tears the session down. Incoming
//! SQL is dispatched to the host's [`ParseHandler`]; recoverable failures
//! become `ErrorResponse` + `ReadyForQuery` so the client can continue.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info};

use crate::error::{Severity, SqlError};
use crate::protocol::{
    BackendMessage, FieldDescription, FrontendMessage, PostgresCodec, ProtocolError, StartupCodec,
    StartupMessage, TransactionStatus, sql_state,
};
use crate::row::RowWriter;
use crate::statement::{ParseHandler, Values};
use crate::util::{duration_string, quote_query};

/// Identifies a session within its server; assigned on accept, starting at 1.
pub type SessionId = i32;

/// Process-wide query counter, used only for log correlation.
static QUERY_ID: AtomicI64 = AtomicI64::new(0);

/// Parameter statuses reported to every client on startup completion.
const SERVER_STATUS: [(&str, &str); 5] = [
    ("server_version", "14"),
    ("server_encoding", "UTF-8"),
    ("client_encoding", "UTF-8"),
    ("DateStyle", "ISO"),
    ("TimeZone", "UTC"),
];

/// Errors that terminate a session.
///
/// Recoverable failures (handler errors below `FATAL`, malformed payloads
/// on aligned frames) never surface here; the session reports them to the
/// client and keeps serving.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("protocol error: {0}")]
    Protocol(ProtocolError),
    /// The host handler raised a `FATAL` or `PANIC` error.
    #[error("fatal error: {0}")]
    Fatal(SqlError),
}

impl From<ProtocolError> for SessionError {
    fn from(error: ProtocolError) -> Self {
        match error {
            ProtocolError::Io(e) => SessionError::Io(e),
            other => SessionError::Protocol(other),
        }
    }
}

/// Failure of a single query, before routing.
enum QueryFailure {
    /// The handler (or the row writer) failed; severity decides recovery.
    Sql(SqlError),
    /// The session itself failed; always terminal.
    Session(SessionError),
}

impl From<SqlError> for QueryFailure {
    fn from(error: SqlError) -> Self {
        QueryFailure::Sql(error)
    }
}

impl From<std::io::Error> for QueryFailure {
    fn from(error: std::io::Error) -> Self {
        QueryFailure::Session(SessionError::Io(error))
    }
}

/// One client connection, from accept to close.
pub struct Session {
    id: SessionId,
    framed: Option<Framed<TcpStream, StartupCodec>>,
    handler: Option<ParseHandler>,
}

impl Session {
    /// Creates a session in the pre-startup state.
    pub fn new(id: SessionId, socket: TcpStream) -> Self {
        Self {
            id,
            framed: Some(Framed::new(socket, StartupCodec::new())),
            handler: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Installs the host's query handler. Queries arriving without one
    /// draw an internal error response.
    pub fn set_handler(&mut self, handler: ParseHandler) {
        self.handler = Some(handler);
    }

    /// Drives the session until the peer terminates, the socket closes,
    /// or a fatal error occurs.
    pub async fn start(mut self) -> Result<(), SessionError> {
        let Some(framed) = self.framed.take() else {
            return Ok(());
        };

        match self.negotiate(framed).await? {
            Some(mut framed) => self.serve_queries(&mut framed).await,
            None => Ok(()),
        }
    }

    /// Runs the startup phase: answers SSL/GSSAPI probes with `'N'` and
    /// keeps reading until a v3.0 StartupMessage completes the handshake.
    ///
    /// Returns `None` when the connection ends without reaching the query
    /// phase (peer gone, or a CancelRequest connection).
    async fn negotiate(
        &mut self,
        mut framed: Framed<TcpStream, StartupCodec>,
    ) -> Result<Option<Framed<TcpStream, PostgresCodec>>, SessionError> {
        loop {
            let message = match framed.next().await {
                None => {
                    debug!(session = self.id, "peer closed before startup");
                    return Ok(None);
                }
                Some(Ok(message)) => message,
                Some(Err(error)) => {
                    // Best effort: tell the client why before closing.
                    let fatal = SqlError::new(error.to_string())
                        .with_sqlstate(sql_state::PROTOCOL_VIOLATION)
                        .with_severity(Severity::Fatal);
                    let _ = framed.send(BackendMessage::from(&fatal)).await;
                    return Err(error.into());
                }
            };

            match message {
                StartupMessage::SslRequest | StartupMessage::GssEncRequest => {
                    debug!(session = self.id, "rejecting encryption request");
                    framed.send(BackendMessage::SslResponse).await?;
                }
                StartupMessage::CancelRequest { process_id, .. } => {
                    // Cancellation is not supported; the request arrives on
                    // a connection of its own, which simply ends here.
                    debug!(session = self.id, pid = process_id, "ignoring cancel request");
                    return Ok(None);
                }
                StartupMessage::Startup { parameters, .. } => {
                    info!(
                        session = self.id,
                        user = %parameters.user,
                        database = parameters.database.as_deref(),
                        "startup complete"
                    );

                    framed.send(BackendMessage::AuthenticationOk).await?;
                    for (name, value) in SERVER_STATUS {
                        framed
                            .send(BackendMessage::ParameterStatus {
                                name: name.to_string(),
                                value: value.to_string(),
                            })
                            .await?;
                    }
                    framed
                        .send(BackendMessage::ReadyForQuery {
                            status: TransactionStatus::Idle,
                        })
                        .await?;

                    return Ok(Some(framed.map_codec(StartupCodec::ready)));
                }
            }
        }
    }

    /// The post-startup read loop: one frontend message per iteration.
    async fn serve_queries(
        &mut self,
        framed: &mut Framed<TcpStream, PostgresCodec>,
    ) -> Result<(), SessionError> {
        loop {
            let message = match framed.next().await {
                None => {
                    debug!(session = self.id, "peer closed the connection");
                    return Ok(());
                }
                Some(message) => message.map_err(SessionError::from)?,
            };

            match message {
                FrontendMessage::Query(sql) => self.handle_query(framed, &sql).await?,
                FrontendMessage::Terminate => {
                    debug!(session = self.id, "terminated by client");
                    return Ok(());
                }
                FrontendMessage::Malformed(error) => {
                    debug!(session = self.id, "malformed frame: {error}");
                    self.recover(framed, &SqlError::from(error)).await?;
                }
                FrontendMessage::Unknown(tag) => {
                    // Unregistered tag: the frame is already consumed, so
                    // skipping keeps the stream aligned.
                    debug!(session = self.id, tag, "skipping unrecognized message");
                }
                unsupported => {
                    let error = SqlError::feature_not_supported(format!(
                        "{} message is not supported",
                        unsupported.name()
                    ));
                    self.recover(framed, &error).await?;
                }
            }
        }
    }

    /// Runs one query through the host handler, routing failures by
    /// severity and logging start/end with a process-wide query id.
    async fn handle_query(
        &mut self,
        framed: &mut Framed<TcpStream, PostgresCodec>,
        sql: &str,
    ) -> Result<(), SessionError> {
        let query_id = QUERY_ID.fetch_add(1, Ordering::Relaxed) + 1;
        let started = Instant::now();
        info!(
            session = self.id,
            query = query_id,
            "executing query {}",
            quote_query(sql)
        );

        let result = match self.run_query(framed, sql).await {
            Ok(()) => Ok(()),
            Err(QueryFailure::Sql(error)) => {
                info!(
                    session = self.id,
                    query = query_id,
                    "query failed, error = {error}"
                );
                if error.severity().is_terminal() {
                    // Fatal and panic close the socket with no response.
                    Err(SessionError::Fatal(error))
                } else {
                    self.recover(framed, &error).await
                }
            }
            Err(QueryFailure::Session(error)) => Err(error),
        };

        info!(
            session = self.id,
            query = query_id,
            "query done, elapsed = {}",
            duration_string(started.elapsed())
        );
        result
    }

    /// The response sequence of a successful query:
    /// `RowDescription`, the `DataRow` stream, `CommandComplete`,
    /// `ReadyForQuery`, strictly in that order.
    async fn run_query(
        &mut self,
        framed: &mut Framed<TcpStream, PostgresCodec>,
        sql: &str,
    ) -> Result<(), QueryFailure> {
        let handler = self
            .handler
            .as_mut()
            .ok_or_else(|| SqlError::internal("no query handler installed"))?;
        let statement = handler(sql)?;

        let fields = statement.fields.iter().map(FieldDescription::from).collect();
        framed
            .send(BackendMessage::RowDescription { fields })
            .await?;

        let mut writer = RowWriter::new(statement.fields.len());
        let mut produce = statement.handler;
        produce(&mut writer, &Values::new())?;
        let (rows, num_rows) = writer.finish()?;

        // The writer's buffer is already a framed DataRow stream.
        framed.get_mut().write_all(&rows).await?;

        framed
            .send(BackendMessage::CommandComplete {
                tag: format!("SELECT {num_rows}"),
            })
            .await?;
        framed
            .send(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;
        Ok(())
    }

    /// Reports a recoverable error and re-arms the query cycle.
    async fn recover(
        &mut self,
        framed: &mut Framed<TcpStream, PostgresCodec>,
        error: &SqlError,
    ) -> Result<(), SessionError> {
        framed.send(BackendMessage::from(error)).await?;
        framed
            .send(BackendMessage::ReadyForQuery {
                status: TransactionStatus::Idle,
            })
            .await?;
        Ok(())
    }
}
