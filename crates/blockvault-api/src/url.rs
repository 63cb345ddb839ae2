//! URL construction helpers for the Drive API.
//!
//! Pure functions so every endpoint path lives in one place.

use blockvault_core::{DownloadError, DriveConfig, RevisionUid};
use url::Url;

/// Resolve the configured storage host into a base URL.
///
/// The configuration carries a bare host (`drive-api.proton.me`); a scheme
/// is accepted too so tests can point at plain-HTTP fixtures.
pub(crate) fn base_url(config: &DriveConfig) -> Result<Url, DownloadError> {
    let raw = if config.base_url.contains("://") {
        config.base_url.clone()
    } else {
        format!("https://{}", config.base_url)
    };
    Url::parse(&raw).map_err(|err| {
        DownloadError::validation(format!("invalid base URL '{}': {err}", config.base_url))
    })
}

/// Build the paginated revision listing URL.
pub(crate) fn revision_listing_url(
    base: &Url,
    uid: &RevisionUid,
    page_size: u32,
    from_block_index: u64,
) -> Url {
    let mut url = base.clone();
    url.set_path(&format!(
        "/drive/v2/volumes/{}/files/{}/revisions/{}",
        uid.volume_id(),
        uid.node_id(),
        uid.revision_id()
    ));
    url.set_query(Some(&format!(
        "PageSize={page_size}&FromBlockIndex={from_block_index}"
    )));
    url
}

/// Build the batched thumbnail token URL for one volume.
pub(crate) fn thumbnail_batch_url(base: &Url, volume_id: &str) -> Url {
    let mut url = base.clone();
    url.set_path(&format!("/drive/volumes/{volume_id}/thumbnails"));
    url
}
