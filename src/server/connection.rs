// Connection handling module
// Accepts single TCP connections and serves them over HTTP/1.1

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::signal::SignalHandler;
use crate::config;
use crate::handler;
use crate::logger;

/// Accept and process a connection, checking limits and logging.
///
/// # Arguments
///
/// * `stream` - The TCP stream to handle
/// * `peer_addr` - The peer's socket address
/// * `state` - Shared application state
/// * `conn_counter` - Active connection counter
/// * `signals` - Shutdown notification; open connections close when it fires
pub fn accept_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: &Arc<config::AppState>,
    conn_counter: &Arc<AtomicUsize>,
    signals: &Arc<SignalHandler>,
) {
    // Increment counter first, then check limit (prevents race condition)
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            // Exceeded limit: rollback counter and reject
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_connection_accepted(&peer_addr);

    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
        Arc::clone(signals),
    );
}

/// Serve one connection in a spawned task.
///
/// Keep-alive follows `performance.keep_alive_timeout`; the whole connection
/// is bounded by the larger of the read and write timeouts. The counter is
/// decremented when the connection ends, however it ends. On shutdown the
/// connection finishes its in-flight request and closes instead of idling
/// in keep-alive.
fn handle_connection(
    stream: tokio::net::TcpStream,
    peer_addr: std::net::SocketAddr,
    state: Arc<config::AppState>,
    conn_counter: Arc<AtomicUsize>,
    signals: Arc<SignalHandler>,
) {
    tokio::task::spawn_local(async move {
        let io = TokioIo::new(stream);

        let keep_alive_timeout = state.config.performance.keep_alive_timeout;
        let timeout_duration = std::time::Duration::from_secs(std::cmp::max(
            state.config.performance.read_timeout,
            state.config.performance.write_timeout,
        ));

        let mut builder = http1::Builder::new();
        builder.keep_alive(keep_alive_timeout > 0);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&state), peer_addr)),
        );
        tokio::pin!(conn);

        let drain = signals.drain.notified();
        tokio::pin!(drain);
        drain.as_mut().enable();
        let mut closing = signals.shutdown_requested.load(Ordering::SeqCst);
        if closing {
            conn.as_mut().graceful_shutdown();
        }

        let served = async {
            loop {
                tokio::select! {
                    result = conn.as_mut() => break result,
                    () = drain.as_mut(), if !closing => {
                        conn.as_mut().graceful_shutdown();
                        closing = true;
                    }
                }
            }
        };

        match tokio::time::timeout(timeout_duration, served).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => logger::log_connection_error(&err),
            Err(_) => {
                logger::log_warning(&format!(
                    "Connection from {peer_addr} timed out after {} seconds",
                    timeout_duration.as_secs()
                ));
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppState, Config};
    use crate::convert;
    use crate::server::create_reusable_listener;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    fn test_state(max_connections: Option<u64>) -> Arc<AppState> {
        let mut cfg = Config::load_from("does/not/exist/config").expect("default config");
        cfg.logging.access_log = false;
        cfg.performance.max_connections = max_connections;
        let converter = convert::from_config(&cfg.converter);
        Arc::new(AppState::new(&cfg, converter))
    }

    /// Read until the 405 JSON body of one response has arrived
    async fn read_one_response(client: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        while !String::from_utf8_lossy(&raw).ends_with(r#"requests allowed"}"#) {
            let n = client.read(&mut buf).await.expect("read response");
            assert_ne!(n, 0, "connection closed before the response completed");
            raw.extend_from_slice(&buf[..n]);
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    #[tokio::test]
    async fn test_idle_keep_alive_connection_closes_on_shutdown() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let listener = create_reusable_listener("127.0.0.1:0".parse().expect("addr"))
                    .expect("bind");
                let addr = listener.local_addr().expect("local addr");
                let state = test_state(None);
                let counter = Arc::new(AtomicUsize::new(0));
                let signals = Arc::new(SignalHandler::new());

                let (server_counter, server_signals) = (Arc::clone(&counter), Arc::clone(&signals));
                tokio::task::spawn_local(async move {
                    if let Ok((stream, peer)) = listener.accept().await {
                        accept_connection(stream, peer, &state, &server_counter, &server_signals);
                    }
                });

                let mut client = TcpStream::connect(addr).await.expect("connect");
                client
                    .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
                    .await
                    .expect("send request");
                let first = read_one_response(&mut client).await;
                assert!(first.starts_with("HTTP/1.1 405"), "unexpected response: {first}");
                assert_eq!(counter.load(Ordering::SeqCst), 1);

                signals.request_shutdown("test");

                // Keep-alive would hold the socket for read_timeout; shutdown closes it now
                let mut rest = Vec::new();
                tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
                    .await
                    .expect("connection closed after shutdown")
                    .expect("clean close");

                tokio::time::timeout(Duration::from_secs(5), async {
                    while counter.load(Ordering::SeqCst) != 0 {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                })
                .await
                .expect("connection counter released");
            })
            .await;
    }

    #[tokio::test]
    async fn test_connection_over_limit_is_dropped() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let listener = create_reusable_listener("127.0.0.1:0".parse().expect("addr"))
                    .expect("bind");
                let addr = listener.local_addr().expect("local addr");
                let state = test_state(Some(1));
                // One connection already counted against the limit
                let counter = Arc::new(AtomicUsize::new(1));
                let signals = Arc::new(SignalHandler::new());

                let server_counter = Arc::clone(&counter);
                tokio::task::spawn_local(async move {
                    if let Ok((stream, peer)) = listener.accept().await {
                        accept_connection(stream, peer, &state, &server_counter, &signals);
                    }
                });

                let mut client = TcpStream::connect(addr).await.expect("connect");
                let mut rest = Vec::new();
                let read = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest))
                    .await
                    .expect("rejected connection closes");
                assert!(read.map_or(true, |n| n == 0));
                assert_eq!(counter.load(Ordering::SeqCst), 1);
            })
            .await;
    }
}
