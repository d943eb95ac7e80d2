//! Dashboard fetcher.
//!
//! Issues a GET against a Codis dashboard endpoint and decodes the body into
//! an untyped JSON tree. Both `http://` and `https://` URIs are accepted;
//! TLS trusts the Mozilla root store. Transport failures, non-2xx responses
//! and invalid JSON all surface as [`ScrapeError`].

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use tracing::debug;

use crate::error::ScrapeError;

/// Source of stats documents, one per endpoint URI.
pub trait Fetch: Send + Sync {
    fn fetch(&self, uri: &str) -> impl Future<Output = Result<Value, ScrapeError>> + Send;
}

/// HTTP(S) fetcher backed by a pooled hyper client.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self, ScrapeError> {
        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = rustls::ClientConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .map_err(|e| ScrapeError::Tls(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Ok(Self { client, timeout })
    }

    async fn get(&self, uri: &str) -> Result<Bytes, ScrapeError> {
        let parsed: http::Uri = uri
            .parse()
            .map_err(|e| ScrapeError::Transport(format!("invalid uri {uri}: {e}")))?;
        if !matches!(parsed.scheme_str(), Some("http" | "https")) {
            return Err(ScrapeError::Transport(format!(
                "unsupported scheme in {uri}, expected http or https"
            )));
        }

        let req = http::Request::builder()
            .method(http::Method::GET)
            .uri(parsed)
            .header(http::header::ACCEPT, "application/json")
            .header(
                http::header::USER_AGENT,
                concat!("codis-exporter/", env!("CARGO_PKG_VERSION")),
            )
            .body(Empty::<Bytes>::new())
            .map_err(|e| ScrapeError::Transport(e.to_string()))?;

        let resp = self.client.request(req).await.map_err(|e| {
            debug!(error = %e, %uri, "codis request failed");
            ScrapeError::Transport(e.to_string())
        })?;

        if !resp.status().is_success() {
            debug!(status = %resp.status(), %uri, "codis endpoint returned non-2xx");
            return Err(ScrapeError::Status(resp.status()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ScrapeError::Transport(format!("reading body: {e}")))?
            .to_bytes();
        Ok(body)
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, ScrapeError> {
        let body = match tokio::time::timeout(self.timeout, self.get(uri)).await {
            Ok(body) => body?,
            Err(_) => {
                debug!(%uri, "codis request timed out");
                return Err(ScrapeError::Transport(format!(
                    "request timed out after {:?}",
                    self.timeout
                )));
            }
        };
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn dashboard() -> Router {
        Router::new()
            .route("/topom", get(|| async { r#"{"stats":{"closed":false}}"# }))
            .route("/broken", get(|| async { "<html>not json</html>" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    "{}"
                }),
            )
    }

    #[tokio::test]
    async fn fetch_decodes_json() {
        let addr = serve(dashboard()).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let doc = fetcher.fetch(&format!("http://{addr}/topom")).await.unwrap();
        assert_eq!(doc["stats"]["closed"], Value::Bool(false));
    }

    #[tokio::test]
    async fn invalid_body_is_decode_error() {
        let addr = serve(dashboard()).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&format!("http://{addr}/broken")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Decode(_)), "got {err}");
        assert!(err.is_fetch());
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let addr = serve(dashboard()).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();

        let err = fetcher.fetch(&format!("http://{addr}/missing")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Status(StatusCode::NOT_FOUND)), "got {err}");
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        // Bind and drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let fetcher = HttpFetcher::new(Duration::from_secs(5)).unwrap();
        let err = fetcher.fetch(&format!("http://{addr}/topom")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)), "got {err}");
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let addr = serve(dashboard()).await;
        let fetcher = HttpFetcher::new(Duration::from_millis(100)).unwrap();

        let err = fetcher.fetch(&format!("http://{addr}/slow")).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got {err}");
    }

    #[tokio::test]
    async fn tls_against_plain_server_fails() {
        let addr = serve(dashboard()).await;
        let fetcher = HttpFetcher::new(Duration::from_secs(2)).unwrap();

        let err = fetcher.fetch(&format!("https://{addr}/topom")).await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)), "got {err}");
    }

    #[tokio::test]
    async fn rejects_unsupported_scheme() {
        let fetcher = HttpFetcher::new(Duration::from_secs(1)).unwrap();

        let err = fetcher.fetch("ftp://dashboard:18080/topom").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)));

        let err = fetcher.fetch("not a uri").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Transport(_)));
    }
}
