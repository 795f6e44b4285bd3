use thiserror::Error;

/// Protocol framing and parsing errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame violated the wire format (bad length, missing terminator,
    /// trailing garbage).
    #[error("invalid message")]
    InvalidMessage,
    /// A cstring carried bytes that are not valid UTF-8.
    #[error("invalid UTF-8 in message")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    /// The startup frame announced a protocol version this engine does not
    /// speak.
    #[error("unsupported protocol version: {0}")]
    UnsupportedProtocolVersion(i32),
    /// A required startup parameter was missing.
    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),
    /// The declared frame length exceeds the configured maximum.
    #[error("message of {0} bytes exceeds the maximum message size")]
    MessageTooLarge(usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
