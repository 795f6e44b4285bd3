//! Demo server showcasing the pgconduit library.
//!
//! Serves a static three-column table to any PostgreSQL client:
//!
//! ```text
//! $ pgconduit --port 15432 --rows 3 &
//! $ psql -h 127.0.0.1 -p 15432 -c 'SELECT 1'
//!      name   |  address  | age
//!   ----------+-----------+-----
//!    kharista | indonesia |   1
//!    ...
//! ```

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use pgconduit::{Field, ParseHandler, PreparedStatement, Server, Session, Type};

#[derive(Debug, Parser)]
#[command(name = "pgconduit", about = "Demo server for the pgconduit library")]
struct Options {
    /// Host to listen on
    #[arg(long, short = 'H', default_value = "127.0.0.1")]
    host: String,
    /// Port to listen on
    #[arg(long, short = 'P', default_value_t = 15432)]
    port: u16,
    /// Number of rows served per query
    #[arg(long, short = 'n', default_value_t = 1000)]
    rows: i64,
}

/// Every query returns the same `(name, address, age)` rows, whatever its
/// SQL text says.
fn demo_handler(rows: i64) -> ParseHandler {
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

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = Options::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = format!("{}:{}", options.host, options.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");

    let rows = options.rows;
    let server = Server::new(listener, move |_session: &Session| demo_handler(rows));
    server.serve().await?;
    Ok(())
}
