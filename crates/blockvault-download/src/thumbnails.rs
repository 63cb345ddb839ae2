//! Thumbnail batcher.
//!
//! Resolves a list of node UIDs to decrypted thumbnail bytes in three
//! stages: node lookup, batched token fetch, and a capped pool of
//! fetch-and-decrypt tasks. Stages talk through channels and a `JoinSet`;
//! no stage shares mutable state with another.
//!
//! Every input node UID produces exactly one result. A UID listed twice is
//! resolved and fetched once but still yields one result per occurrence.
//! Order follows completion, not the input.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use blockvault_core::{
    ActiveRevision, BlockFetcherPort, CryptoServicePort, DownloadError, NodeLookup,
    NodesServicePort, NodeType, NodeUid, ThumbnailApiPort, ThumbnailToken, ThumbnailType,
    ThumbnailUid,
};

/// Upper bound on thumbnails resolved or decrypted at once.
pub const MAX_CONCURRENT_THUMBNAILS: usize = 10;

/// Retries on top of the initial attempt, per thumbnail.
pub const MAX_THUMBNAIL_ATTEMPTS: u32 = 2;

/// Per-node outcome of a thumbnail iteration.
#[derive(Debug)]
pub struct ThumbnailResult {
    /// The node this result is for.
    pub node_uid: NodeUid,
    /// The decrypted thumbnail, or why it could not be produced.
    pub outcome: Result<Vec<u8>, DownloadError>,
}

/// Ports the batcher consumes.
#[derive(Clone)]
pub(crate) struct ThumbnailDeps {
    pub nodes: Arc<dyn NodesServicePort>,
    pub thumbnail_api: Arc<dyn ThumbnailApiPort>,
    pub fetcher: Arc<dyn BlockFetcherPort>,
    pub crypto: Arc<dyn CryptoServicePort>,
}

/// Start the batcher and return its result stream.
pub(crate) fn iterate_thumbnails(
    deps: ThumbnailDeps,
    node_uids: Vec<NodeUid>,
    kind: ThumbnailType,
    cancel: CancellationToken,
) -> ReceiverStream<ThumbnailResult> {
    let (out_tx, out_rx) = mpsc::channel(MAX_CONCURRENT_THUMBNAILS);
    tokio::spawn(drive(deps, node_uids, kind, cancel, out_tx));
    ReceiverStream::new(out_rx)
}

async fn drive(
    deps: ThumbnailDeps,
    node_uids: Vec<NodeUid>,
    kind: ThumbnailType,
    cancel: CancellationToken,
    out: mpsc::Sender<ThumbnailResult>,
) {
    // Repeated input UIDs go through the stages once; every emission fans
    // out to one result per occurrence.
    let mut multiplicity: HashMap<NodeUid, usize> = HashMap::new();
    let mut unique: Vec<NodeUid> = Vec::new();
    for node_uid in node_uids {
        let count = multiplicity.entry(node_uid.clone()).or_insert(0);
        if *count == 0 {
            unique.push(node_uid);
        }
        *count += 1;
    }

    // Stage 1: resolve each node UID to its thumbnail UID of the requested
    // kind. Resolution failures produce their result here and drop out.
    let lookups = match deps.nodes.iterate_nodes(&unique, cancel.clone()).await {
        Ok(lookups) => lookups,
        Err(err) => {
            for node_uid in unique {
                emit(&out, &multiplicity, node_uid, Err(err.clone())).await;
            }
            return;
        }
    };
    let mut by_uid: HashMap<NodeUid, NodeLookup> = lookups
        .into_iter()
        .map(|lookup| (lookup.uid().clone(), lookup))
        .collect();

    let mut resolved: Vec<(NodeUid, ThumbnailUid)> = Vec::new();
    for node_uid in unique {
        match resolve_one(by_uid.remove(&node_uid), &node_uid, kind) {
            Ok(thumbnail_uid) => resolved.push((node_uid, thumbnail_uid)),
            Err(err) => emit(&out, &multiplicity, node_uid, Err(err)).await,
        }
    }

    // Stages 2 and 3: per-volume token batches feeding a capped decrypt
    // pool. Results flush to the consumer whenever the pool is full.
    let mut tasks: JoinSet<ThumbnailResult> = JoinSet::new();
    for (volume_id, entries) in group_by_volume(resolved) {
        for batch in entries.chunks(MAX_CONCURRENT_THUMBNAILS) {
            let thumbnail_uids: Vec<ThumbnailUid> =
                batch.iter().map(|(_, thumb)| thumb.clone()).collect();
            let node_by_thumb: HashMap<&ThumbnailUid, &NodeUid> =
                batch.iter().map(|(node, thumb)| (thumb, node)).collect();

            let tokens = match deps
                .thumbnail_api
                .get_thumbnail_tokens(&volume_id, &thumbnail_uids)
                .await
            {
                Ok(tokens) => tokens,
                Err(err) => {
                    for (node_uid, _) in batch {
                        emit(&out, &multiplicity, node_uid.clone(), Err(err.clone())).await;
                    }
                    continue;
                }
            };

            for (thumbnail_uid, err) in tokens.failures {
                if let Some(node_uid) = node_by_thumb.get(&thumbnail_uid) {
                    emit(&out, &multiplicity, (*node_uid).clone(), Err(err)).await;
                }
            }

            for token in tokens.tokens {
                let Some(node_uid) = node_by_thumb.get(&token.uid) else {
                    continue;
                };
                while tasks.len() >= MAX_CONCURRENT_THUMBNAILS {
                    forward_one(&mut tasks, &out, &multiplicity).await;
                }
                tasks.spawn(fetch_and_decrypt(
                    deps.clone(),
                    (*node_uid).clone(),
                    token,
                    cancel.clone(),
                ));
            }
        }
    }

    while !tasks.is_empty() {
        forward_one(&mut tasks, &out, &multiplicity).await;
    }
}

/// Send one result per occurrence of `node_uid` in the original input.
async fn emit(
    out: &mpsc::Sender<ThumbnailResult>,
    multiplicity: &HashMap<NodeUid, usize>,
    node_uid: NodeUid,
    outcome: Result<Vec<u8>, DownloadError>,
) {
    let occurrences = multiplicity.get(&node_uid).copied().unwrap_or(1);
    for _ in 1..occurrences {
        // A dropped receiver just means the consumer stopped listening.
        let _ = out
            .send(ThumbnailResult {
                node_uid: node_uid.clone(),
                outcome: outcome.clone(),
            })
            .await;
    }
    let _ = out.send(ThumbnailResult { node_uid, outcome }).await;
}

async fn forward_one(
    tasks: &mut JoinSet<ThumbnailResult>,
    out: &mpsc::Sender<ThumbnailResult>,
    multiplicity: &HashMap<NodeUid, usize>,
) {
    match tasks.join_next().await {
        Some(Ok(result)) => {
            emit(out, multiplicity, result.node_uid, result.outcome).await;
        }
        Some(Err(join_err)) => {
            tracing::error!(%join_err, "thumbnail task panicked");
        }
        None => {}
    }
}

fn resolve_one(
    lookup: Option<NodeLookup>,
    node_uid: &NodeUid,
    kind: ThumbnailType,
) -> Result<ThumbnailUid, DownloadError> {
    let node = match lookup {
        Some(NodeLookup::Found(node)) => node,
        Some(NodeLookup::Missing(_)) | None => {
            return Err(DownloadError::validation(format!(
                "node {node_uid} not found"
            )));
        }
    };
    if node.node_type != NodeType::File {
        return Err(DownloadError::validation(format!(
            "node {node_uid} is not a file"
        )));
    }
    let revision = match node.active_revision {
        Some(ActiveRevision::Ready(revision)) => revision,
        Some(ActiveRevision::Degraded { message }) => {
            return Err(DownloadError::validation(format!(
                "active revision of {node_uid} unavailable: {message}"
            )));
        }
        None => {
            return Err(DownloadError::validation(format!(
                "node {node_uid} has no active revision"
            )));
        }
    };
    revision
        .thumbnail_of(kind)
        .map(|thumbnail| thumbnail.uid.clone())
        .ok_or_else(|| {
            DownloadError::validation(format!(
                "node {node_uid} has no {} thumbnail",
                kind.as_str()
            ))
        })
}

fn group_by_volume(
    resolved: Vec<(NodeUid, ThumbnailUid)>,
) -> Vec<(String, Vec<(NodeUid, ThumbnailUid)>)> {
    let mut order: Vec<String> = Vec::new();
    let mut grouped: HashMap<String, Vec<(NodeUid, ThumbnailUid)>> = HashMap::new();
    for (node_uid, thumbnail_uid) in resolved {
        let volume_id = thumbnail_uid.volume_id().to_string();
        if !grouped.contains_key(&volume_id) {
            order.push(volume_id.clone());
        }
        grouped.entry(volume_id).or_default().push((node_uid, thumbnail_uid));
    }
    order
        .into_iter()
        .filter_map(|volume_id| {
            let entries = grouped.remove(&volume_id)?;
            Some((volume_id, entries))
        })
        .collect()
}

/// Fetch a thumbnail's session key and ciphertext concurrently, then
/// decrypt, retrying the whole chain.
async fn fetch_and_decrypt(
    deps: ThumbnailDeps,
    node_uid: NodeUid,
    token: ThumbnailToken,
    cancel: CancellationToken,
) -> ThumbnailResult {
    let mut attempts = 0u32;
    loop {
        match attempt(&deps, &node_uid, &token, &cancel).await {
            Ok(bytes) => {
                return ThumbnailResult {
                    node_uid,
                    outcome: Ok(bytes),
                };
            }
            Err(err) if err.is_cancelled() || attempts >= MAX_THUMBNAIL_ATTEMPTS => {
                return ThumbnailResult {
                    node_uid,
                    outcome: Err(err),
                };
            }
            Err(err) => {
                attempts += 1;
                tracing::warn!(
                    node = %node_uid,
                    %err,
                    attempt = attempts,
                    "thumbnail attempt failed, retrying"
                );
            }
        }
    }
}

async fn attempt(
    deps: &ThumbnailDeps,
    node_uid: &NodeUid,
    token: &ThumbnailToken,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, DownloadError> {
    let (keys, ciphertext) = tokio::try_join!(
        deps.nodes.get_node_keys(node_uid),
        deps.fetcher
            .fetch_block(&token.bare_url, &token.token, None, cancel.clone()),
    )?;
    let session_key = keys.content_session_key.ok_or_else(|| {
        DownloadError::validation(format!("node {node_uid} has no content key session key"))
    })?;
    deps.crypto.decrypt_thumbnail(ciphertext, &session_key).await
}
