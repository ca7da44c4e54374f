//! Per-connection request handling.
//!
//! Each connection carries exactly one request: read once, parse, dispatch
//! to the store, write one response, shut the write half down.

use crate::protocol::{Method, Parser, Request, Response};
use crate::storage::{Store, StoreResult};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, trace};

/// Handle a single client connection.
///
/// Reads at most `max_request_size` bytes. A peer that closes before sending
/// anything gets no reply. I/O errors are returned to the caller; nothing
/// partial is retried.
pub async fn handle_connection<S>(
    mut stream: S,
    store: &Store,
    max_request_size: usize,
    peer: &str,
) -> std::io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(max_request_size);

    let n = (&mut stream)
        .take(max_request_size as u64)
        .read_buf(&mut buffer)
        .await?;
    if n == 0 {
        trace!(peer, "Connection closed before request");
        return Ok(());
    }

    let response = match Parser::parse(&buffer) {
        Ok(request) => {
            let response = execute_request(&request, store);
            info!(
                peer,
                method = request.method.as_str(),
                key = %request.key,
                status = response.status.code(),
                "Handled request"
            );
            response
        }
        Err(err) => {
            let response = Response::from(&err);
            info!(
                peer,
                request_line = %request_line(&buffer),
                status = response.status.code(),
                error = %err,
                "Rejected request"
            );
            response
        }
    };

    stream.write_all(&response.to_bytes()).await?;
    stream.flush().await?;
    stream.shutdown().await?;

    Ok(())
}

/// Run a validated request against the store
pub fn execute_request(request: &Request, store: &Store) -> Response {
    let Request { method, key, body } = request;

    match method {
        Method::Get => match store.get(key) {
            Some(value) => Response::ok(value),
            None => Response::not_found(format!("Could not find key: {}", key)),
        },

        Method::Put => match store.create(key, body) {
            StoreResult::Stored => Response::ok(format!("Set key: {} = {}", key, body)),
            StoreResult::Exists(existing) => Response::bad_request(format!(
                "Cannot overwrite key: {} = {}. Key: {} already has {}",
                key, body, key, existing
            )),
            other => unexpected(other),
        },

        Method::Post => match store.update(key, body) {
            StoreResult::Stored => Response::ok(format!("Updated key: {} = {}", key, body)),
            StoreResult::NotFound => Response::bad_request(format!(
                "Cannot overwrite key: {} = {}. Key does not exist.",
                key, body
            )),
            other => unexpected(other),
        },

        Method::Delete => match store.delete(key) {
            StoreResult::Deleted => Response::ok(format!("Successfully deleted key: {}", key)),
            StoreResult::NotFound => {
                Response::not_found(format!("Could not find key for deletion: {}", key))
            }
            other => unexpected(other),
        },
    }
}

fn unexpected(result: StoreResult) -> Response {
    Response::bad_request(format!("Unexpected store result: {:?}", result))
}

/// First line of a raw request, for logging rejected input
fn request_line(buffer: &[u8]) -> String {
    let text = String::from_utf8_lossy(buffer);
    text.trim().lines().next().unwrap_or_default().to_string()
}
