//! Host-facing error taxonomy.
//!
//! [`SqlError`] is the error currency between the host's query handler and
//! the protocol engine: the session turns it into an `ErrorResponse` on the
//! wire, and its [`Severity`] decides whether the session survives.

use thiserror::Error;

use crate::protocol::{ProtocolError, sql_state};

/// PostgreSQL error severity levels.
///
/// Only `Error`, `Fatal`, and `Panic` drive protocol behavior: `Fatal` and
/// `Panic` terminate the session, everything else recovers to the next
/// query cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Fatal,
    Panic,
    Warning,
    Notice,
    Debug,
    Info,
    Log,
}

impl Severity {
    /// The severity text carried in the `S` / `V` error fields.
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Fatal => "FATAL",
            Severity::Panic => "PANIC",
            Severity::Warning => "WARNING",
            Severity::Notice => "NOTICE",
            Severity::Debug => "DEBUG",
            Severity::Info => "INFO",
            Severity::Log => "LOG",
        }
    }

    /// Whether an error of this severity terminates the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, Severity::Fatal | Severity::Panic)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A SQL-level error visible to the client as an `ErrorResponse`.
///
/// Defaults to severity [`Severity::Error`] and sqlstate `08000`
/// (connection exception); both can be overridden builder-style:
///
/// ```rust
/// use pgconduit::{Severity, SqlError};
///
/// let err = SqlError::new("relation does not exist").with_sqlstate("42P01");
/// let fatal = SqlError::new("shutting down").with_severity(Severity::Fatal);
/// ```
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct SqlError {
    message: String,
    sqlstate: String,
    severity: Severity,
}

impl SqlError {
    /// Creates an `ERROR`-severity error with the default sqlstate.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sqlstate: sql_state::CONNECTION_EXCEPTION.to_string(),
            severity: Severity::Error,
        }
    }

    /// Creates an `ERROR` with sqlstate `0A000` (feature not supported).
    pub fn feature_not_supported(message: impl Into<String>) -> Self {
        Self::new(message).with_sqlstate(sql_state::FEATURE_NOT_SUPPORTED)
    }

    /// Creates an `ERROR` with sqlstate `XX000` (internal error).
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(message).with_sqlstate(sql_state::INTERNAL_ERROR)
    }

    /// Sets the 5-character SQLSTATE classification code.
    pub fn with_sqlstate(mut self, sqlstate: impl Into<String>) -> Self {
        self.sqlstate = sqlstate.into();
        self
    }

    /// Sets the severity level.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Primary human-readable error message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// SQLSTATE classification code.
    pub fn sqlstate(&self) -> &str {
        &self.sqlstate
    }

    /// Severity level.
    pub fn severity(&self) -> Severity {
        self.severity
    }
}

impl From<ProtocolError> for SqlError {
    /// Client-visible rendering of a protocol violation (sqlstate `08P01`).
    fn from(error: ProtocolError) -> Self {
        SqlError::new(error.to_string()).with_sqlstate(sql_state::PROTOCOL_VIOLATION)
    }
}
