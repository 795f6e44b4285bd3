//! TCP server binding sessions to the host's query handler.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use tokio::net::{TcpListener, ToSocketAddrs};
use tracing::{debug, error, info};

use crate::session::Session;
use crate::statement::ParseHandler;

/// Produces a [`ParseHandler`] for each accepted session.
///
/// The factory runs before the session starts, so the host can capture
/// per-session state (the session id, connection-scoped caches) inside the
/// returned handler.
pub trait HandlerFactory: Send + Sync + 'static {
    fn create(&self, session: &Session) -> ParseHandler;
}

impl<F> HandlerFactory for F
where
    F: Fn(&Session) -> ParseHandler + Send + Sync + 'static,
{
    fn create(&self, session: &Session) -> ParseHandler {
        self(session)
    }
}

/// TCP server implementing the PostgreSQL wire protocol.
///
/// Accepts connections in a loop, assigns each a monotonically increasing
/// [`SessionId`](crate::session::SessionId) starting at 1, and spawns one
/// task per session. Admission control (connection limits, timeouts) is
/// left to the host.
pub struct Server<F> {
    listener: TcpListener,
    next_session_id: AtomicI32,
    factory: Arc<F>,
}

impl<F: HandlerFactory> Server<F> {
    /// Creates a new server from an already-bound listener.
    pub fn new(listener: TcpListener, factory: F) -> Self {
        Self {
            listener,
            next_session_id: AtomicI32::new(1),
            factory: Arc::new(factory),
        }
    }

    /// Binds a listener to `addr` and creates a server on it.
    pub async fn bind(addr: impl ToSocketAddrs, factory: F) -> io::Result<Self> {
        Ok(Self::new(TcpListener::bind(addr).await?, factory))
    }

    /// The address the server is listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Starts accepting connections and serving clients.
    pub async fn serve(self) -> io::Result<()> {
        loop {
            let (socket, peer_addr) = self.listener.accept().await?;
            let id = self.next_session_id.fetch_add(1, Ordering::SeqCst);
            let factory = Arc::clone(&self.factory);

            info!(session = id, peer = %peer_addr, "accepted connection");

            tokio::spawn(async move {
                let mut session = Session::new(id, socket);
                session.set_handler(factory.create(&session));
                if let Err(e) = session.start().await {
                    error!(session = id, "session error: {e}");
                }
                debug!(session = id, "session closed");
            });
        }
    }
}
