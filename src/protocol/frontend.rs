use std::collections::HashMap;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::protocol::ProtocolError;
use crate::protocol::codec::{PostgresCodec, StartupCodec, get_cstring};

/// SSLRequest magic number
pub const SSL_REQUEST_CODE: i32 = (1234 << 16) | 5679; // 80877103

/// GSSENCRequest magic number
pub const GSSENC_REQUEST_CODE: i32 = (1234 << 16) | 5680; // 80877104

/// CancelRequest magic number
pub const CANCEL_REQUEST_CODE: i32 = (1234 << 16) | 5678; // 80877102

/// Messages sent by the frontend (client) during the startup phase.
///
/// Startup frames carry no tag byte; the variant is discriminated by the
/// 4-byte version code at the head of the payload.
#[derive(Debug)]
pub enum StartupMessage {
    /// SSLRequest - client wants to negotiate SSL
    SslRequest,
    /// GSSENCRequest - client wants GSSAPI encryption
    GssEncRequest,
    /// CancelRequest - client wants to cancel a query
    CancelRequest { process_id: i32, secret_key: i32 },
    /// StartupMessage - normal connection startup
    Startup {
        protocol_version: i32,
        parameters: StartupParameters,
    },
}

/// Startup parameters from the client
#[derive(Debug, Clone, Default)]
pub struct StartupParameters {
    pub user: String,
    pub database: Option<String>,
    pub application_name: Option<String>,
    pub client_encoding: Option<String>,
    pub other: HashMap<String, String>,
}

impl StartupParameters {
    /// Parses the `key\0value\0` sequence following the version code.
    /// The sequence is terminated by an empty key.
    fn parse(src: &mut BytesMut) -> Result<Self, ProtocolError> {
        let mut params = StartupParameters::default();

        while !src.is_empty() {
            let name = get_cstring(src)?;

            // Empty name signals end of parameters
            if name.is_empty() {
                break;
            }

            let value = get_cstring(src)?;

            match name.as_str() {
                "user" => params.user = value,
                "database" => params.database = Some(value),
                "application_name" => params.application_name = Some(value),
                "client_encoding" => params.client_encoding = Some(value),
                _ => {
                    params.other.insert(name, value);
                }
            }
        }

        if params.user.is_empty() {
            return Err(ProtocolError::MissingParameter("user"));
        }

        Ok(params)
    }
}

impl Decoder for StartupCodec {
    type Item = StartupMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StartupMessage>, ProtocolError> {
        if src.len() < 4 {
            return Ok(None);
        }

        // Length includes the 4-byte length field itself; minimum is
        // length + version code.
        let len = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if len < 8 {
            return Err(ProtocolError::InvalidMessage);
        }
        let len = len as usize;
        if len > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge(len));
        }

        if src.len() < len {
            src.reserve(len - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(len);
        frame.advance(4);
        let code = frame.get_i32();

        let message = match code {
            SSL_REQUEST_CODE if frame.is_empty() => StartupMessage::SslRequest,
            GSSENC_REQUEST_CODE if frame.is_empty() => StartupMessage::GssEncRequest,
            CANCEL_REQUEST_CODE if frame.len() == 8 => StartupMessage::CancelRequest {
                process_id: frame.get_i32(),
                secret_key: frame.get_i32(),
            },
            SSL_REQUEST_CODE | GSSENC_REQUEST_CODE | CANCEL_REQUEST_CODE => {
                return Err(ProtocolError::InvalidMessage);
            }
            version if (version >> 16) == 3 => StartupMessage::Startup {
                protocol_version: version,
                parameters: StartupParameters::parse(&mut frame)?,
            },
            other => return Err(ProtocolError::UnsupportedProtocolVersion(other)),
        };

        Ok(Some(message))
    }
}

/// Messages sent by the frontend (client) during the query phase.
///
/// Only the Simple Query path (`Query`, `Terminate`) is executed by this
/// engine. The extended-query and authentication-response tags decode to
/// unit variants so the session can answer them uniformly; tags outside
/// the registry decode to [`Unknown`](FrontendMessage::Unknown) and are
/// skipped, which keeps the stream aligned for future protocol additions.
#[derive(Debug)]
pub enum FrontendMessage {
    /// 'Q' - Simple query, carrying the SQL text
    Query(String),
    /// 'X' - Terminate
    Terminate,
    /// 'P' - Parse (extended query)
    Parse,
    /// 'B' - Bind (extended query)
    Bind,
    /// 'D' - Describe (extended query)
    Describe,
    /// 'E' - Execute (extended query)
    Execute,
    /// 'S' - Sync (extended query)
    Sync,
    /// 'H' - Flush (extended query)
    Flush,
    /// 'C' - Close (extended query)
    Close,
    /// 'f' - CopyFail
    CopyFail,
    /// 'F' - FunctionCall
    FunctionCall,
    /// 'p' - authentication response family (password, GSS, SASL initial,
    /// SASL continuation all share this tag)
    AuthResponse,
    /// A tag outside the message registry; consumed and skipped.
    Unknown(u8),
    /// A registered tag whose payload failed to parse. The frame was
    /// consumed whole, so the stream remains aligned and the session can
    /// report the error and keep reading.
    Malformed(ProtocolError),
}

impl FrontendMessage {
    /// Human-readable message name for error responses and logs.
    pub fn name(&self) -> &'static str {
        match self {
            FrontendMessage::Query(_) => "Query",
            FrontendMessage::Terminate => "Terminate",
            FrontendMessage::Parse => "Parse",
            FrontendMessage::Bind => "Bind",
            FrontendMessage::Describe => "Describe",
            FrontendMessage::Execute => "Execute",
            FrontendMessage::Sync => "Sync",
            FrontendMessage::Flush => "Flush",
            FrontendMessage::Close => "Close",
            FrontendMessage::CopyFail => "CopyFail",
            FrontendMessage::FunctionCall => "FunctionCall",
            FrontendMessage::AuthResponse => "authentication response",
            FrontendMessage::Unknown(_) => "unknown",
            FrontendMessage::Malformed(_) => "malformed",
        }
    }
}

impl Decoder for PostgresCodec {
    type Item = FrontendMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrontendMessage>, ProtocolError> {
        // Tag byte plus the 4-byte length, which includes itself but not
        // the tag.
        if src.len() < 5 {
            return Ok(None);
        }

        let tag = src[0];
        let len = i32::from_be_bytes([src[1], src[2], src[3], src[4]]);
        if len < 4 {
            return Err(ProtocolError::InvalidMessage);
        }
        let total = 1 + len as usize;
        if total > self.max_message_size {
            return Err(ProtocolError::MessageTooLarge(total));
        }

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let mut frame = src.split_to(total);
        frame.advance(5);

        let message = match tag {
            b'Q' => match get_cstring(&mut frame) {
                Ok(sql) => FrontendMessage::Query(sql),
                Err(e) => FrontendMessage::Malformed(e),
            },
            b'X' => FrontendMessage::Terminate,
            b'P' => FrontendMessage::Parse,
            b'B' => FrontendMessage::Bind,
            b'D' => FrontendMessage::Describe,
            b'E' => FrontendMessage::Execute,
            b'S' => FrontendMessage::Sync,
            b'H' => FrontendMessage::Flush,
            b'C' => FrontendMessage::Close,
            b'f' => FrontendMessage::CopyFail,
            b'F' => FrontendMessage::FunctionCall,
            b'p' => FrontendMessage::AuthResponse,
            other => FrontendMessage::Unknown(other),
        };

        Ok(Some(message))
    }
}
