//! Per-token metadata retrieval and normalization into display records.

use alloy_primitives::U256;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use std::sync::atomic::Ordering;
use tracing::{debug, warn};

use crate::concurrency::map_with_concurrency;
use crate::contract::CollectionReader;
use crate::gateway::{is_ipfs, Gateway};
use crate::metrics::METRICS;

pub const INLINE_JSON_PREFIX: &str = "data:application/json;base64,";
pub const DEFAULT_METADATA_CONCURRENCY: usize = 10;

/// One NFT held by the queried address, ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnedToken {
    pub token_id: String,
    pub name: String,
    /// Resolved image URL; empty when the document has none.
    pub image: String,
    /// Unmodified metadata document; `None` when none could be retrieved.
    pub raw: Option<Value>,
}

/// Decode a `data:application/json;base64,` token URI.
pub fn decode_inline(uri: &str) -> Option<Value> {
    let encoded = uri.strip_prefix(INLINE_JSON_PREFIX)?;
    let bytes = B64.decode(encoded.trim()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

pub struct MetadataFetcher {
    gateway: Gateway,
    default_collection_name: String,
    concurrency: usize,
}

impl MetadataFetcher {
    pub fn new(gateway: Gateway, default_collection_name: impl Into<String>) -> Self {
        Self {
            gateway,
            default_collection_name: default_collection_name.into(),
            concurrency: DEFAULT_METADATA_CONCURRENCY,
        }
    }

    /// Cap on tokens fetched at once by `fetch_all`.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Build the display record for `token_id`.
    ///
    /// Read and fetch failures degrade to a fallback name and empty image;
    /// only an id that is not a decimal uint256 is an error.
    pub async fn fetch(
        &self,
        reader: &dyn CollectionReader,
        token_id: &str,
        collection_name: Option<&str>,
    ) -> Result<OwnedToken, crate::Error> {
        let id = U256::from_str(token_id)
            .map_err(|e| crate::Error::Contract(format!("invalid token id {token_id}: {e}")))?;

        let uri = match reader.token_uri(id).await {
            Ok(uri) => uri,
            Err(e) => {
                debug!(token_id, error = %e, "tokenURI read failed");
                String::new()
            }
        };

        let doc = self.load_document(token_id, &uri).await;
        let (name, image) = self.normalize(token_id, doc.as_ref(), collection_name);

        Ok(OwnedToken {
            token_id: token_id.to_string(),
            name,
            image,
            raw: doc,
        })
    }

    /// Fetch tokens with at most `concurrency` in flight; failed tokens are
    /// dropped, order kept.
    pub async fn fetch_all(
        &self,
        reader: &dyn CollectionReader,
        token_ids: &[String],
        collection_name: Option<&str>,
    ) -> Vec<OwnedToken> {
        let results = map_with_concurrency(token_ids.iter(), self.concurrency, |id| async move {
            (id, self.fetch(reader, id, collection_name).await)
        })
        .await;

        results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(token) => Some(token),
                Err(e) => {
                    warn!(token_id = %id, error = %e, "Dropping token from display list");
                    None
                }
            })
            .collect()
    }

    async fn load_document(&self, token_id: &str, uri: &str) -> Option<Value> {
        if uri.is_empty() {
            return None;
        }
        if uri.starts_with(INLINE_JSON_PREFIX) {
            let doc = decode_inline(uri);
            if doc.is_none() {
                debug!(token_id, "Inline metadata is not valid base64 JSON");
            }
            return doc;
        }

        let fetched = if is_ipfs(uri) {
            self.gateway.fetch_json(uri).await
        } else {
            self.gateway.fetch_url_json(uri).await
        };
        match fetched {
            Ok(doc) => Some(doc),
            Err(e) => {
                METRICS.metadata_failures.fetch_add(1, Ordering::Relaxed);
                warn!(token_id, uri, error = %e, "metadata fetch failed");
                None
            }
        }
    }

    fn normalize(
        &self,
        token_id: &str,
        doc: Option<&Value>,
        collection_name: Option<&str>,
    ) -> (String, String) {
        let text = |key: &str| {
            doc.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
        };

        let image = match text("image").or_else(|| text("image_url")) {
            Some(uri) if is_ipfs(uri) => self.gateway.image_url(uri),
            Some(uri) => uri.to_string(),
            None => String::new(),
        };

        let name = doc
            .and_then(|d| d.get("name"))
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| {
                let collection = collection_name
                    .filter(|c| !c.is_empty())
                    .unwrap_or(&self.default_collection_name);
                format!("{collection} #{token_id}")
            });

        (name, image)
    }
}
