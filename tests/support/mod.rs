//! Test utilities: a spawned server and a minimal PostgreSQL wire client.

use std::collections::HashMap;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;

use pgconduit::{HandlerFactory, Server};

/// A server running on an ephemeral port for the duration of a test.
///
/// The accept loop is aborted when the server is dropped.
pub struct TestServer {
    port: u16,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start<F: HandlerFactory>(factory: F) -> Self {
        let server = Server::bind("127.0.0.1:0", factory).await.unwrap();
        let port = server.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let _ = server.serve().await;
        });
        Self { port, handle }
    }

    pub async fn connect(&self) -> WireClient {
        WireClient {
            stream: TcpStream::connect(("127.0.0.1", self.port)).await.unwrap(),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A parsed backend message: tag byte plus body, without the length field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub tag: u8,
    pub body: Vec<u8>,
}

/// A hand-rolled frontend, enough to exercise the server byte-for-byte.
pub struct WireClient {
    stream: TcpStream,
}

impl WireClient {
    pub async fn send_ssl_request(&mut self) {
        let mut frame = Vec::new();
        frame.extend_from_slice(&8i32.to_be_bytes());
        frame.extend_from_slice(&80877103i32.to_be_bytes());
        self.stream.write_all(&frame).await.unwrap();
    }

    pub async fn send_startup(&mut self) {
        let body = b"user\0postgres\0database\0demo\0\0";
        let mut frame = Vec::new();
        frame.extend_from_slice(&((4 + 4 + body.len()) as i32).to_be_bytes());
        frame.extend_from_slice(&196608i32.to_be_bytes());
        frame.extend_from_slice(body);
        self.stream.write_all(&frame).await.unwrap();
    }

    /// Sends one tagged frame with the standard length framing.
    pub async fn send_message(&mut self, tag: u8, body: &[u8]) {
        let mut frame = vec![tag];
        frame.extend_from_slice(&((4 + body.len()) as i32).to_be_bytes());
        frame.extend_from_slice(body);
        self.stream.write_all(&frame).await.unwrap();
    }

    pub async fn send_query(&mut self, sql: &str) {
        let mut body = sql.as_bytes().to_vec();
        body.push(0);
        self.send_message(b'Q', &body).await;
    }

    pub async fn send_terminate(&mut self) {
        self.send_message(b'X', &[]).await;
    }

    pub async fn read_byte(&mut self) -> u8 {
        self.stream.read_u8().await.unwrap()
    }

    /// Reads one tagged backend message, checking that the length field
    /// covers exactly the body plus itself.
    pub async fn read_message(&mut self) -> Message {
        let tag = self.stream.read_u8().await.unwrap();
        let len = self.stream.read_i32().await.unwrap();
        assert!(len >= 4, "length field must include itself");
        let mut body = vec![0u8; (len - 4) as usize];
        self.stream.read_exact(&mut body).await.unwrap();
        Message { tag, body }
    }

    /// Reads messages until (and including) ReadyForQuery.
    pub async fn read_until_ready(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        loop {
            let message = self.read_message().await;
            let ready = message.tag == b'Z';
            messages.push(message);
            if ready {
                return messages;
            }
        }
    }

    /// Performs the trust-path handshake and returns the startup messages.
    pub async fn handshake(&mut self) -> Vec<Message> {
        self.send_startup().await;
        self.read_until_ready().await
    }

    /// Reads until EOF; returns whatever bytes were still pending.
    pub async fn read_to_eof(&mut self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.stream.read_to_end(&mut buf).await.unwrap();
        buf
    }
}

/// Splits a DataRow body into its column values (None = SQL NULL).
pub fn data_row_columns(body: &[u8]) -> Vec<Option<Vec<u8>>> {
    let count = i16::from_be_bytes([body[0], body[1]]) as usize;
    let mut columns = Vec::with_capacity(count);
    let mut pos = 2;
    for _ in 0..count {
        let len = i32::from_be_bytes(body[pos..pos + 4].try_into().unwrap());
        pos += 4;
        if len < 0 {
            columns.push(None);
        } else {
            columns.push(Some(body[pos..pos + len as usize].to_vec()));
            pos += len as usize;
        }
    }
    assert_eq!(pos, body.len(), "DataRow body not fully consumed");
    columns
}

/// Collects the fields of an ErrorResponse body into code → value pairs.
pub fn error_fields(body: &[u8]) -> HashMap<u8, String> {
    let mut fields = HashMap::new();
    let mut pos = 0;
    while body[pos] != 0 {
        let code = body[pos];
        pos += 1;
        let end = pos + body[pos..].iter().position(|&b| b == 0).unwrap();
        fields.insert(code, String::from_utf8(body[pos..end].to_vec()).unwrap());
        pos = end + 1;
    }
    fields
}

/// Splits a ParameterStatus body into its (name, value) pair.
pub fn parameter_status(body: &[u8]) -> (String, String) {
    let mut parts = body.split(|&b| b == 0);
    let name = String::from_utf8(parts.next().unwrap().to_vec()).unwrap();
    let value = String::from_utf8(parts.next().unwrap().to_vec()).unwrap();
    (name, value)
}
