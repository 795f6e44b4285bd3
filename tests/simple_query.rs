//! End-to-end protocol tests over real sockets.
//!
//! Each test spawns a [`support::TestServer`] with an in-process handler
//! and drives it with a raw wire client, asserting on the exact message
//! sequences a PostgreSQL client would observe.

mod support;

use support::{TestServer, data_row_columns, error_fields, parameter_status};

use pgconduit::{
    Field, ParseHandler, PreparedStatement, Session, Severity, SqlError, Type,
};

/// Factory serving the static `(name, address, age)` table with `rows` rows.
fn table_factory(rows: i64) -> impl Fn(&Session) -> ParseHandler + Send + Sync + 'static {
    move |_session: &Session| -> ParseHandler {
        Box::new(move |_sql| {
            Ok(PreparedStatement::new(
                vec![
                    Field::new("name", Type::Text),
                    Field::new("address", Type::Text),
                    Field::new("age", Type::Int8),
                ],
                Box::new(move |writer, _values| {
                    for i in 1..=rows {
                        let mut row = writer.add_row()?;
                        row.write_string("kharista")?;
                        row.write_string("indonesia")?;
                        row.write_int8(i)?;
                    }
                    Ok(())
                }),
            ))
        })
    }
}

#[tokio::test]
async fn test_startup_sequence() {
    let server = TestServer::start(table_factory(3)).await;
    let mut client = server.connect().await;

    let messages = client.handshake().await;
    assert_eq!(messages.len(), 7);

    // AuthenticationOk first
    assert_eq!(messages[0].tag, b'R');
    assert_eq!(messages[0].body, [0, 0, 0, 0]);

    // Five ParameterStatus messages, in unspecified order
    let mut statuses: Vec<(String, String)> = messages[1..6]
        .iter()
        .map(|m| {
            assert_eq!(m.tag, b'S');
            parameter_status(&m.body)
        })
        .collect();
    statuses.sort();
    let mut expected = vec![
        ("server_version".to_string(), "14".to_string()),
        ("server_encoding".to_string(), "UTF-8".to_string()),
        ("client_encoding".to_string(), "UTF-8".to_string()),
        ("DateStyle".to_string(), "ISO".to_string()),
        ("TimeZone".to_string(), "UTC".to_string()),
    ];
    expected.sort();
    assert_eq!(statuses, expected);

    // ReadyForQuery, idle
    assert_eq!(messages[6].tag, b'Z');
    assert_eq!(messages[6].body, [b'I']);
}

#[tokio::test]
async fn test_ssl_request_rejected_with_single_byte() {
    let server = TestServer::start(table_factory(3)).await;
    let mut client = server.connect().await;

    client.send_ssl_request().await;
    assert_eq!(client.read_byte().await, b'N');

    // The session is still pre-startup: a normal startup completes.
    let messages = client.handshake().await;
    assert_eq!(messages[0].tag, b'R');
    assert_eq!(messages.last().unwrap().tag, b'Z');
}

#[tokio::test]
async fn test_simple_query_golden() {
    let server = TestServer::start(table_factory(3)).await;
    let mut client = server.connect().await;
    client.handshake().await;

    client.send_query("SELECT * FROM people").await;
    let messages = client.read_until_ready().await;

    let tags: Vec<u8> = messages.iter().map(|m| m.tag).collect();
    assert_eq!(tags, [b'T', b'D', b'D', b'D', b'C', b'Z']);

    // RowDescription declares three fields
    let field_count = i16::from_be_bytes([messages[0].body[0], messages[0].body[1]]);
    assert_eq!(field_count, 3);

    // Each DataRow carries three columns; age counts 1..=3 in text
    for (i, message) in messages[1..4].iter().enumerate() {
        let columns = data_row_columns(&message.body);
        assert_eq!(columns.len(), 3);
        assert_eq!(columns[0].as_deref(), Some(&b"kharista"[..]));
        assert_eq!(columns[1].as_deref(), Some(&b"indonesia"[..]));
        assert_eq!(columns[2].as_deref(), Some((i + 1).to_string().as_bytes()));
    }

    assert_eq!(messages[4].body, b"SELECT 3\0");
    assert_eq!(messages[5].body, [b'I']);

    // Re-issuing the same query yields identical bytes
    client.send_query("SELECT * FROM people").await;
    let again = client.read_until_ready().await;
    assert_eq!(again, messages);
}

#[tokio::test]
async fn test_terminate_closes_session() {
    let server = TestServer::start(table_factory(2)).await;
    let mut client = server.connect().await;
    client.handshake().await;

    client.send_query("SELECT 1").await;
    client.read_until_ready().await;

    client.send_terminate().await;
    assert!(client.read_to_eof().await.is_empty());
}

#[tokio::test]
async fn test_unsupported_message_draws_error_and_recovers() {
    let server = TestServer::start(table_factory(1)).await;
    let mut client = server.connect().await;
    client.handshake().await;

    // Bind with an empty payload: answered, not hung up on
    client.send_message(b'B', &[]).await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].tag, b'E');
    let fields = error_fields(&messages[0].body);
    assert_eq!(fields[&b'C'], "0A000");
    assert!(fields[&b'M'].contains("Bind"));
    assert_eq!(messages[1].tag, b'Z');

    // The stream is still aligned
    client.send_query("SELECT 1").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages[0].tag, b'T');
}

#[tokio::test]
async fn test_unknown_tag_skipped_silently() {
    let server = TestServer::start(table_factory(1)).await;
    let mut client = server.connect().await;
    client.handshake().await;

    // A tag outside the registry is consumed without any response
    client.send_message(b'~', b"junk").await;
    client.send_query("SELECT 1").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages[0].tag, b'T');
}

#[tokio::test]
async fn test_handler_error_recovery() {
    // Fails the first query of each session, succeeds afterwards.
    let factory = |_session: &Session| -> ParseHandler {
        let mut calls = 0u32;
        Box::new(move |_sql| {
            calls += 1;
            if calls == 1 {
                return Err(SqlError::new("boom").with_sqlstate("42000"));
            }
            Ok(PreparedStatement::new(
                vec![Field::new("n", Type::Int4)],
                Box::new(|writer, _values| {
                    writer.add_row()?.write_int4(7)?;
                    Ok(())
                }),
            ))
        })
    };
    let server = TestServer::start(factory).await;
    let mut client = server.connect().await;
    client.handshake().await;

    client.send_query("SELECT boom").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages.len(), 2, "exactly one ErrorResponse then ReadyForQuery");
    assert_eq!(messages[0].tag, b'E');
    let fields = error_fields(&messages[0].body);
    assert_eq!(fields[&b'S'], "ERROR");
    assert_eq!(fields[&b'C'], "42000");
    assert_eq!(fields[&b'M'], "boom");
    assert_eq!(messages[1].tag, b'Z');
    assert_eq!(messages[1].body, [b'I']);

    // The next query proceeds normally
    client.send_query("SELECT n").await;
    let messages = client.read_until_ready().await;
    let tags: Vec<u8> = messages.iter().map(|m| m.tag).collect();
    assert_eq!(tags, [b'T', b'D', b'C', b'Z']);
    assert_eq!(
        data_row_columns(&messages[1].body)[0].as_deref(),
        Some(&b"7"[..])
    );
}

#[tokio::test]
async fn test_row_width_mismatch_reported_to_client() {
    // Writes 2 columns against a 3-field schema.
    let factory = |_session: &Session| -> ParseHandler {
        Box::new(|_sql| {
            Ok(PreparedStatement::new(
                vec![
                    Field::new("a", Type::Text),
                    Field::new("b", Type::Text),
                    Field::new("c", Type::Text),
                ],
                Box::new(|writer, _values| {
                    let mut row = writer.add_row()?;
                    row.write_string("x")?;
                    row.write_string("y")?;
                    Ok(())
                }),
            ))
        })
    };
    let server = TestServer::start(factory).await;
    let mut client = server.connect().await;
    client.handshake().await;

    client.send_query("SELECT *").await;
    let messages = client.read_until_ready().await;

    // RowDescription was already on the wire; the width violation turns
    // into an ErrorResponse instead of a row stream.
    let tags: Vec<u8> = messages.iter().map(|m| m.tag).collect();
    assert_eq!(tags, [b'T', b'E', b'Z']);
    let fields = error_fields(&messages[1].body);
    assert_eq!(fields[&b'S'], "ERROR");
    assert!(fields[&b'M'].contains("column count mismatch"));

    // Session survives
    client.send_query("SELECT *").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages.last().unwrap().tag, b'Z');
}

#[tokio::test]
async fn test_fatal_error_closes_without_response() {
    let factory = |_session: &Session| -> ParseHandler {
        Box::new(|_sql| Err(SqlError::new("going away").with_severity(Severity::Fatal)))
    };
    let server = TestServer::start(factory).await;
    let mut client = server.connect().await;
    client.handshake().await;

    client.send_query("SELECT 1").await;
    assert!(client.read_to_eof().await.is_empty());
}

#[tokio::test]
async fn test_malformed_query_payload_recovers() {
    let server = TestServer::start(table_factory(1)).await;
    let mut client = server.connect().await;
    client.handshake().await;

    // Query body missing its null terminator
    client.send_message(b'Q', b"SELECT 1").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages[0].tag, b'E');
    assert_eq!(error_fields(&messages[0].body)[&b'C'], "08P01");
    assert_eq!(messages.last().unwrap().tag, b'Z');

    // Framing was preserved
    client.send_query("SELECT 1").await;
    let messages = client.read_until_ready().await;
    assert_eq!(messages[0].tag, b'T');
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let server = TestServer::start(table_factory(2)).await;

    let mut first = server.connect().await;
    let mut second = server.connect().await;
    first.handshake().await;
    second.handshake().await;

    // Interleave queries across the two sessions
    first.send_query("SELECT 1").await;
    second.send_query("SELECT 2").await;
    let from_first = first.read_until_ready().await;
    let from_second = second.read_until_ready().await;

    assert_eq!(from_first.last().unwrap().tag, b'Z');
    assert_eq!(from_second.last().unwrap().tag, b'Z');
    assert_eq!(from_first, from_second);

    // Closing one session does not disturb the other
    first.send_terminate().await;
    assert!(first.read_to_eof().await.is_empty());

    second.send_query("SELECT 3").await;
    assert_eq!(second.read_until_ready().await.last().unwrap().tag, b'Z');
}
