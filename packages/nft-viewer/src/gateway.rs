//! IPFS gateway fanout: reference → candidate URLs, JSON fetch with per-attempt
//! timeout and ordered fallback.

use serde_json::Value;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, warn};

use crate::metrics::METRICS;

pub const IPFS_SCHEME: &str = "ipfs://";

/// Whether `uri` is a decentralized-storage reference.
pub fn is_ipfs(uri: &str) -> bool {
    uri.starts_with(IPFS_SCHEME)
}

/// Gateway list plus the HTTP client used to reach it.
#[derive(Clone)]
pub struct Gateway {
    http: reqwest::Client,
    gateways: Vec<String>,
    timeout: Duration,
}

impl Gateway {
    pub fn new(gateways: Vec<String>, timeout: Duration) -> Result<Self, crate::Error> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| crate::Error::Config(format!("HTTP client build failed: {e}")))?;
        Ok(Self {
            http,
            gateways,
            timeout,
        })
    }

    pub fn gateways(&self) -> &[String] {
        &self.gateways
    }

    /// One URL per gateway, reference path appended verbatim, in priority order.
    /// Non-IPFS strings map to themselves.
    pub fn candidates(&self, uri: &str) -> Vec<String> {
        match uri.strip_prefix(IPFS_SCHEME) {
            Some(path) => self.gateways.iter().map(|g| format!("{g}{path}")).collect(),
            None => vec![uri.to_string()],
        }
    }

    /// First candidate only; load failures are the display layer's concern.
    pub fn image_url(&self, uri: &str) -> String {
        self.candidates(uri).into_iter().next().unwrap_or_default()
    }

    /// Fetch JSON through each candidate in turn until one answers.
    pub async fn fetch_json(&self, reference: &str) -> Result<Value, crate::Error> {
        for url in self.candidates(reference) {
            match self.fetch_url_json(&url).await {
                Ok(v) => {
                    debug!(url = %url, "Metadata fetched");
                    return Ok(v);
                }
                Err(e) => {
                    METRICS
                        .gateway_attempt_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(url = %url, error = %e, "Gateway attempt failed");
                }
            }
        }
        Err(crate::Error::AllGatewaysFailed(reference.to_string()))
    }

    /// Single GET with the attempt timeout covering connect, status, and body.
    pub async fn fetch_url_json(&self, url: &str) -> Result<Value, crate::Error> {
        let attempt = async {
            let response = self
                .http
                .get(url)
                .header(reqwest::header::CACHE_CONTROL, "no-store")
                .send()
                .await
                .map_err(|e| crate::Error::Http(format!("request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(crate::Error::Http(format!("HTTP {status}")));
            }

            response
                .json::<Value>()
                .await
                .map_err(|e| crate::Error::Http(format!("invalid JSON body: {e}")))
        };

        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| crate::Error::Http(format!("timeout after {}ms", self.timeout.as_millis())))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::serve;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    fn gateway(gateways: Vec<String>) -> Gateway {
        Gateway::new(gateways, Duration::from_millis(300)).unwrap()
    }

    #[test]
    fn test_candidates_follow_gateway_order() {
        let g = gateway(vec!["https://g1/ipfs/".into(), "https://g2/ipfs/".into()]);
        assert_eq!(
            g.candidates("ipfs://X/1.json"),
            vec!["https://g1/ipfs/X/1.json", "https://g2/ipfs/X/1.json"]
        );
    }

    #[test]
    fn test_non_ipfs_maps_to_itself() {
        let g = gateway(vec!["https://g1/ipfs/".into()]);
        assert_eq!(
            g.candidates("https://meta.example/1.json"),
            vec!["https://meta.example/1.json"]
        );
    }

    #[test]
    fn test_image_url_uses_first_gateway() {
        let g = gateway(vec!["https://g1/ipfs/".into(), "https://g2/ipfs/".into()]);
        assert_eq!(g.image_url("ipfs://Y"), "https://g1/ipfs/Y");
        assert_eq!(gateway(vec![]).image_url("ipfs://Y"), "");
    }

    #[tokio::test]
    async fn test_timeout_falls_back_to_next_gateway() {
        let slow = Router::new().route(
            "/ipfs/X",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({ "from": "g1" }))
            }),
        );
        let fast = Router::new().route("/ipfs/X", get(|| async { Json(json!({ "from": "g2" })) }));
        let g1 = serve(slow).await;
        let g2 = serve(fast).await;

        let g = gateway(vec![format!("{g1}/ipfs/"), format!("{g2}/ipfs/")]);
        let body = g.fetch_json("ipfs://X").await.unwrap();
        assert_eq!(body, json!({ "from": "g2" }));
    }

    #[tokio::test]
    async fn test_non_2xx_falls_back() {
        let broken = Router::new().route("/ipfs/X", get(|| async { StatusCode::BAD_GATEWAY }));
        let ok = Router::new().route("/ipfs/X", get(|| async { Json(json!({ "ok": true })) }));
        let g1 = serve(broken).await;
        let g2 = serve(ok).await;

        let g = gateway(vec![format!("{g1}/ipfs/"), format!("{g2}/ipfs/")]);
        assert_eq!(g.fetch_json("ipfs://X").await.unwrap(), json!({ "ok": true }));
    }

    #[tokio::test]
    async fn test_all_gateways_failed_carries_reference() {
        let broken = Router::new().route("/ipfs/X", get(|| async { StatusCode::NOT_FOUND }));
        let g1 = serve(broken).await;

        let g = gateway(vec![format!("{g1}/ipfs/"), "http://127.0.0.1:9/ipfs/".into()]);
        assert_eq!(
            g.fetch_json("ipfs://X").await,
            Err(crate::Error::AllGatewaysFailed("ipfs://X".into()))
        );
    }

    #[tokio::test]
    async fn test_plain_url_rejects_non_json() {
        let app = Router::new().route("/meta", get(|| async { "not json" }));
        let base = serve(app).await;
        let g = gateway(vec![]);
        assert!(matches!(
            g.fetch_url_json(&format!("{base}/meta")).await,
            Err(crate::Error::Http(_))
        ));
    }
}
