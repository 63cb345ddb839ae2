//! Batched thumbnail token endpoint.
//!
//! One POST resolves fetch tokens for up to a batch of thumbnails in a
//! volume. The response is reconciled against the request: per-thumbnail
//! errors become typed failures, response entries for thumbnails we never
//! asked about are logged and dropped, and requested thumbnails the host
//! stayed silent about come back as not-found failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use blockvault_core::ports::http::{HttpClientPort, JsonRequest};
use blockvault_core::ports::thumbnail_api::{ThumbnailApiPort, ThumbnailToken, ThumbnailTokenBatch};
use blockvault_core::{DownloadError, DriveConfig, ThumbnailUid};

use crate::url::{base_url, thumbnail_batch_url};

#[derive(Debug, Deserialize)]
struct TokensPayload {
    #[serde(rename = "Thumbnails", default)]
    thumbnails: Vec<TokenEntry>,
    #[serde(rename = "Errors", default)]
    errors: Vec<ErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct TokenEntry {
    #[serde(rename = "ThumbnailID")]
    thumbnail_id: String,
    #[serde(rename = "BareURL")]
    bare_url: String,
    #[serde(rename = "Token")]
    token: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    #[serde(rename = "ThumbnailID")]
    thumbnail_id: String,
    #[serde(rename = "Error")]
    error: String,
}

/// Thumbnail token lookups against the Drive endpoint.
pub struct ThumbnailTokenClient {
    http: Arc<dyn HttpClientPort>,
    base: Url,
}

impl ThumbnailTokenClient {
    /// Create the client for the configured host.
    pub fn new(http: Arc<dyn HttpClientPort>, config: &DriveConfig) -> Result<Self, DownloadError> {
        Ok(Self {
            http,
            base: base_url(config)?,
        })
    }
}

#[async_trait]
impl ThumbnailApiPort for ThumbnailTokenClient {
    async fn get_thumbnail_tokens(
        &self,
        volume_id: &str,
        uids: &[ThumbnailUid],
    ) -> Result<ThumbnailTokenBatch, DownloadError> {
        let ids: Vec<&str> = uids.iter().map(ThumbnailUid::thumbnail_id).collect();
        let url = thumbnail_batch_url(&self.base, volume_id);
        let request = JsonRequest::post(url, json!({ "ThumbnailIDs": ids }));

        let body = self.http.fetch_json(request).await?;
        let payload: TokensPayload = serde_json::from_value(body).map_err(|err| {
            DownloadError::transport(format!("malformed thumbnail token response: {err}"))
        })?;

        let mut by_id: HashMap<&str, &ThumbnailUid> = uids
            .iter()
            .map(|uid| (uid.thumbnail_id(), uid))
            .collect();

        let mut batch = ThumbnailTokenBatch::default();
        for entry in payload.thumbnails {
            let Some(uid) = by_id.remove(entry.thumbnail_id.as_str()) else {
                tracing::warn!(
                    thumbnail_id = entry.thumbnail_id,
                    "token response references an unknown thumbnail, dropping"
                );
                continue;
            };
            batch.tokens.push(ThumbnailToken {
                uid: uid.clone(),
                bare_url: entry.bare_url,
                token: entry.token,
            });
        }
        for entry in payload.errors {
            let Some(uid) = by_id.remove(entry.thumbnail_id.as_str()) else {
                tracing::warn!(
                    thumbnail_id = entry.thumbnail_id,
                    "token error references an unknown thumbnail, dropping"
                );
                continue;
            };
            batch
                .failures
                .push((uid.clone(), DownloadError::transport(entry.error)));
        }
        for uid in by_id.into_values() {
            batch.failures.push((
                uid.clone(),
                DownloadError::validation(format!("thumbnail {uid} not found")),
            ));
        }

        Ok(batch)
    }
}
