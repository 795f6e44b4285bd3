use bytes::{Buf, BufMut, BytesMut};

use crate::protocol::ProtocolError;

/// Maximum message size in bytes (16 MB).
/// PostgreSQL allows up to 1 GB; 16 MB is a reasonable default for an
/// embedded engine.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Read a null-terminated string from a message body.
/// Returns `InvalidMessage` if no null terminator is present and
/// `InvalidUtf8` if the bytes are not valid UTF-8.
pub fn get_cstring(src: &mut BytesMut) -> Result<String, ProtocolError> {
    let Some(null_pos) = src.iter().position(|&b| b == 0) else {
        return Err(ProtocolError::InvalidMessage);
    };

    let bytes = src.split_to(null_pos);
    src.advance(1);
    Ok(String::from_utf8(bytes.to_vec())?)
}

/// Write a null-terminated string to a message buffer.
pub fn put_cstring(dst: &mut BytesMut, s: &str) {
    dst.put_slice(s.as_bytes());
    dst.put_u8(0);
}

/// Codec for the query phase of the PostgreSQL protocol.
/// Decodes `FrontendMessage` (frontend.rs) and encodes `BackendMessage`
/// (backend.rs).
pub struct PostgresCodec {
    pub(crate) max_message_size: usize,
}

impl PostgresCodec {
    /// Creates a new PostgresCodec with the default maximum message size.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for PostgresCodec {
    fn default() -> Self {
        Self::new()
    }
}

/// Codec for the startup phase of the PostgreSQL protocol.
/// Startup frames carry no tag byte; the first frame discriminates
/// SSLRequest / GSSENCRequest / CancelRequest / StartupMessage by the
/// 4-byte version code leading the payload.
pub struct StartupCodec {
    pub(crate) max_message_size: usize,
}

impl StartupCodec {
    /// Creates a new StartupCodec with the default maximum message size.
    pub fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    /// Transitions to the query phase codec after successful startup.
    pub fn ready(self) -> PostgresCodec {
        PostgresCodec {
            max_message_size: self.max_message_size,
        }
    }
}

impl Default for StartupCodec {
    fn default() -> Self {
        Self::new()
    }
}
