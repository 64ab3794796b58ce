//! HTTP serving with graceful shutdown.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

use crate::error::{ApiError, ApiResult};

/// Serve `app` until `signal` resolves, then stop accepting connections and
/// let in-flight requests finish before returning.
pub async fn serve_until<F>(listener: TcpListener, app: Router, signal: F) -> ApiResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app)
        .with_graceful_shutdown(signal)
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves,
/// so the server keeps running rather than shutting down at once.
pub async fn ctrl_c_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_millis(100)).await;
        "done"
    }

    #[tokio::test]
    async fn test_in_flight_request_finishes_after_signal() -> std::io::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = Router::new().route("/slow", get(slow));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_until(listener, app, async {
            let _ = stop_rx.await;
        }));

        let mut stream = TcpStream::connect(addr).await?;
        stream
            .write_all(b"GET /slow HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await?;

        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = stop_tx.send(());

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        assert!(response.starts_with("HTTP/1.1 200"), "got {}", response);
        assert!(response.ends_with("done"));

        let result = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .expect("server stops after draining")
            .expect("server task");
        assert!(result.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_server_stops_when_signal_resolves() -> std::io::Result<()> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            serve_until(listener, Router::new(), async {}),
        )
        .await
        .expect("immediate signal stops the server");
        assert!(result.is_ok());
        Ok(())
    }
}
