//! HTTP health endpoint.
//!
//! A single `GET /health` answering a static `{"status":"ok"}` — no
//! state, no parameters. Raw TCP + manual HTTP keeps a web framework out
//! of the dependency tree for one fixed route.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::error::{Result, TokkiError};

/// Body served on the health route.
const HEALTH_BODY: &str = "{\"status\":\"ok\"}";

/// Serve `GET /health` on `port` until the task is dropped.
pub async fn serve(port: u16) -> Result<()> {
    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .map_err(|e| TokkiError::Provider(format!("health server bind failed: {}", e)))?;
    info!(port, "health endpoint listening");

    loop {
        let (mut stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!("health accept failed: {}", e);
                continue;
            }
        };
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = match stream.read(&mut buf).await {
                Ok(n) => n,
                Err(e) => {
                    debug!(%peer, "health read failed: {}", e);
                    return;
                }
            };
            let request = String::from_utf8_lossy(&buf[..n]);
            let request_line = request.lines().next().unwrap_or_default();
            let response = respond(request_line);
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                debug!(%peer, "health write failed: {}", e);
            }
        });
    }
}

/// Build the raw HTTP response for one request line.
fn respond(request_line: &str) -> String {
    match route(request_line) {
        Some(body) => http_response("200 OK", body),
        None => http_response("404 Not Found", "{\"error\":\"not found\"}"),
    }
}

/// The route table: exactly one route.
fn route(request_line: &str) -> Option<&'static str> {
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    if method == "GET" && (path == "/health" || path == "/health/") {
        Some(HEALTH_BODY)
    } else {
        None
    }
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_route_matches() {
        assert_eq!(route("GET /health HTTP/1.1"), Some(HEALTH_BODY));
        assert_eq!(route("GET /health/ HTTP/1.1"), Some(HEALTH_BODY));
    }

    #[test]
    fn test_other_routes_miss() {
        assert!(route("GET / HTTP/1.1").is_none());
        assert!(route("POST /health HTTP/1.1").is_none());
        assert!(route("GET /metrics HTTP/1.1").is_none());
        assert!(route("").is_none());
    }

    #[test]
    fn test_response_has_content_length() {
        let response = respond("GET /health HTTP/1.1");
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"), "{response}");
        assert!(response.contains("Content-Length: 15"), "{response}");
        assert!(response.ends_with(HEALTH_BODY), "{response}");
    }

    #[test]
    fn test_unknown_route_is_404() {
        let response = respond("GET /nope HTTP/1.1");
        assert!(response.starts_with("HTTP/1.1 404"), "{response}");
    }

    #[tokio::test]
    async fn test_serve_answers_health_over_tcp() {
        use tokio::net::TcpStream;

        // Grab a free port, release it, then start the server on it.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let server = tokio::spawn(serve(port));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.contains("200 OK"), "{response}");
        assert!(response.contains(HEALTH_BODY), "{response}");

        server.abort();
    }
}
