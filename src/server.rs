//! TCP listener for the data service.
//!
//! Accepts connections and spawns one task per connection, so a slow client
//! never holds up `accept`.

use crate::config::Config;
use crate::handler::handle_connection;
use crate::storage::Store;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Server instance
pub struct Server {
    config: Config,
    listener: TcpListener,
    store: Arc<Store>,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket and create the seeded store
    pub async fn bind(config: Config) -> io::Result<Self> {
        let addr = tokio::net::lookup_host(&config.listen)
            .await?
            .next()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("could not resolve listen address: {}", config.listen),
                )
            })?;

        let listener = TcpListener::from_std(create_listener(addr)?)?;
        let store = Store::new(config.seed.clone());
        info!(address = %listener.local_addr()?, "Server listening");

        Ok(Server {
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            config,
            listener,
            store,
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Get a reference to the storage for testing
    #[cfg(test)]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already accepted keep running to completion.
    pub async fn run_until<F>(self, shutdown: F) -> io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            // Wait for a connection slot
            let permit = tokio::select! {
                _ = &mut shutdown => break,
                permit = self.connection_limit.clone().acquire_owned() => {
                    permit.map_err(io::Error::other)?
                }
            };

            let accepted = tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "New connection");
                    let store = Arc::clone(&self.store);
                    let max_request_size = self.config.max_request_size;
                    let deadline = self.config.connection_timeout;

                    tokio::spawn(async move {
                        serve(stream, peer, &store, max_request_size, deadline).await;
                        drop(permit);
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }

        info!(entries = self.store.len(), "Server shutting down");
        Ok(())
    }

    /// Accept connections until the process receives Ctrl-C
    pub async fn run_until_ctrl_c(self) -> io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to install Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        })
        .await
    }
}

/// Run one connection to completion under the configured deadline
async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    store: &Store,
    max_request_size: usize,
    deadline: Option<Duration>,
) {
    let peer_label = peer.to_string();
    let handling = handle_connection(stream, store, max_request_size, &peer_label);

    let result = match deadline {
        Some(limit) => match tokio::time::timeout(limit, handling).await {
            Ok(result) => result,
            Err(_) => {
                warn!(%peer, timeout_secs = limit.as_secs(), "Connection timed out");
                return;
            }
        },
        None => handling.await,
    };

    if let Err(e) = result {
        debug!(%peer, error = %e, "Connection error");
    }
}

/// Create a TCP listener with SO_REUSEADDR so the server can restart quickly
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        socket2::Domain::for_address(addr),
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
