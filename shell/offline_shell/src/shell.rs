//! Request interception for the restaurant site.
//!
//! The shell goes straight from installed to active and from then on
//! answers every request with the network's own response.

use axum::{
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use reqwest::{redirect, Client, Url};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Reserved for an offline cache. Nothing is stored under it yet.
pub const CACHE_NAME: &str = "gff-v2";

/// An installed shell. There is no waiting state: the only move is `activate`.
pub struct InstalledShell {
    client: Client,
    upstream: String,
}

/// A shell that controls every request routed to it.
pub struct ActiveShell {
    client: Client,
    upstream: String,
}

pub fn install(upstream: &str) -> anyhow::Result<InstalledShell> {
    let parsed = Url::parse(upstream)
        .map_err(|e| anyhow::anyhow!("invalid --upstream '{upstream}': {e}"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        anyhow::bail!("invalid --upstream '{upstream}': expected http or https");
    }

    // Redirects go back to the page untouched, like any other response.
    let client = Client::builder().redirect(redirect::Policy::none()).build()?;

    info!(cache = CACHE_NAME, "offline shell installed");
    Ok(InstalledShell {
        client,
        upstream: parsed.as_str().trim_end_matches('/').to_string(),
    })
}

impl InstalledShell {
    /// Claims all clients at once; no reload needed.
    pub fn activate(self) -> Arc<ActiveShell> {
        info!("offline shell activated");
        Arc::new(ActiveShell {
            client: self.client,
            upstream: self.upstream,
        })
    }
}

impl ActiveShell {
    pub fn router(self: Arc<Self>) -> Router {
        Router::new().fallback(intercept).with_state(self)
    }

    fn target(&self, uri: &Uri) -> String {
        let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
        format!("{}{}", self.upstream, path_and_query)
    }

    /// Sends `req` to the network and streams its response back unchanged.
    pub async fn forward(&self, req: Request) -> Response {
        let (parts, body) = req.into_parts();
        let target = self.target(&parts.uri);

        let mut headers = parts.headers;
        strip_hop_by_hop(&mut headers);
        headers.remove(header::HOST);
        headers.remove(header::CONTENT_LENGTH);

        debug!("{} {target}", parts.method);
        let mut outgoing = self.client.request(parts.method, &target).headers(headers);
        if body.size_hint().exact() != Some(0) {
            outgoing = outgoing.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }
        let upstream = match outgoing.send().await {
            Ok(res) => res,
            Err(err) => {
                error!("fetch {target} failed: {err}");
                return StatusCode::BAD_GATEWAY.into_response();
            }
        };

        let status = upstream.status();
        let mut headers = upstream.headers().clone();
        strip_hop_by_hop(&mut headers);

        let mut res = Response::new(Body::from_stream(upstream.bytes_stream()));
        *res.status_mut() = status;
        *res.headers_mut() = headers;
        res
    }
}

async fn intercept(State(shell): State<Arc<ActiveShell>>, req: Request) -> Response {
    shell.forward(req).await
}

/// Connection-level headers belong to one hop and are never forwarded.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in [
        header::CONNECTION,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
    headers.remove("keep-alive");
}
