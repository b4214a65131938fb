//! Sync engine - reconciles the local tree with the server
//!
//! The [`SyncEngine`] runs one cycle per [`SyncEngine::sync`] call. Callers
//! arriving while a cycle is running do not start another: they wait for
//! the running one and receive a clone of its result.
//!
//! ## Sync Flow
//!
//! ```text
//! prune ──→ pull ──→ diff ──→ merge ──→ push ──→ commit ──→ gc
//!  │          │        │        │         │
//!  │   PullingRemote Diffing ResolvingConflicts PushingLocal
//!  │                                      │
//!  └──────────── OldVersionIncorrect ─────┘  (bounded restarts)
//! ```
//!
//! 1. Forget base and local files the server no longer shares with us.
//! 2. Fetch metadata newer than the cursor, verify signatures and download
//!    every changed document that is not stored yet.
//! 3. Classify files changed on both sides.
//! 4. Replay local changes on top of the pulled tree, resolving conflicts,
//!    then repair whatever the combination made invalid.
//! 5. Upload missing chunks, then every change in one atomic upsert.
//! 6. Make the accepted metadata the new base, purge tombstones and drop
//!    content nothing references any more.
//!
//! If the server becomes unreachable (or the account runs out of space)
//! during the push, the merged state is committed locally so the pull is
//! not repeated, and nothing is partially pushed.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Instant;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use strongbox_conflict::{
    Conflict, ConflictDetector, ConflictKind, ConflictNamer, ConflictResolver, FileChanges,
    Resolution, Side,
};
use strongbox_core::config::Config;
use strongbox_core::domain::{
    decrypt_document, encrypt_document, Account, ChangeLog, ChangeRecord, Chunk, ChunkHash,
    ChunkerConfig, DocumentHash, FileId, FileMetadata, FileTree, FileType, LazyTree,
    NameComponents, ServerMeta, SyncState, SyncStatus, ValidationFailure, WorkUnit,
};
use strongbox_core::ports::{
    IContentStore, DocumentUpload, EndpointError, FileDiff, IMetadataStore, IServerApi, ServerError,
    SyncCommit,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::progress::{ProgressCallback, ProgressReporter};
use crate::snapshot::Snapshot;
use crate::SyncError;

/// Result of a completed sync cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Remote files newer than their local base
    pub files_pulled: usize,
    /// Files accepted by the server
    pub files_pushed: usize,
    pub documents_downloaded: usize,
    pub chunks_uploaded: usize,
    /// Files forgotten because the server no longer shares them
    pub files_pruned: usize,
    pub conflicts_resolved: usize,
    /// 1, plus one per restart after a stale push
    pub attempts: u32,
    pub duration_ms: u64,
}

type Outcome = Result<SyncResult, SyncError>;
type Resolutions = HashMap<FileId, Vec<(Conflict, Resolution)>>;

/// Why an attempt stopped before committing
enum Abort {
    /// The server moved on while this attempt ran; start over
    Stale,
    Failed(SyncError),
}

impl From<ServerError> for Abort {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Endpoint(EndpointError::OldVersionIncorrect)
            | ServerError::Endpoint(EndpointError::DocumentNotFound) => Abort::Stale,
            other => Abort::Failed(other.into()),
        }
    }
}

impl From<SyncError> for Abort {
    fn from(err: SyncError) -> Self {
        Abort::Failed(err)
    }
}

impl From<anyhow::Error> for Abort {
    fn from(err: anyhow::Error) -> Self {
        Abort::Failed(err.into())
    }
}

/// Server state fetched by one pull
struct Pulled {
    as_of: u64,
    /// Files newer than their base copy
    files: HashMap<FileId, ServerMeta>,
}

/// Local changes replayed on the pulled tree
struct Merge {
    tree: LazyTree,
    /// Server copy of every file, base overlaid with the pull
    remote: HashMap<FileId, ServerMeta>,
    /// Files removed from the tree because they lost their parent
    dropped: Vec<FileId>,
    records: Vec<ChangeRecord>,
}

/// What a push sends
#[derive(Default)]
struct Outbound {
    diffs: Vec<FileDiff>,
    documents: Vec<DocumentUpload>,
    /// Unsigned copies of the pushed records
    local: Vec<FileMetadata>,
}

/// Bidirectional synchronization engine
///
/// ## Dependencies
///
/// - `server`: Remote metadata, documents and chunks
/// - `metadata`: Base and local metadata, change log and cursor
/// - `content`: Local chunks and document manifests
pub struct SyncEngine {
    server: Arc<dyn IServerApi>,
    metadata: Arc<dyn IMetadataStore>,
    content: Arc<dyn IContentStore>,
    max_merge_attempts: u32,
    parallel_transfers: usize,
    /// Chunking for conflicted copies re-encrypted during a merge
    chunker: ChunkerConfig,
    /// Serializes syncs with local tree mutations
    tree_lock: Arc<Mutex<()>>,
    state: watch::Sender<SyncState>,
    in_flight: StdMutex<Option<watch::Receiver<Option<Outcome>>>>,
    cycles: AtomicU64,
}

impl SyncEngine {
    /// Creates a new `SyncEngine` with the given dependencies
    ///
    /// # Arguments
    /// * `server` - Remote server (IServerApi)
    /// * `metadata` - Metadata persistence (IMetadataStore)
    /// * `content` - Chunk and manifest persistence (IContentStore)
    /// * `config` - Application configuration for sync and chunking settings
    pub fn new(
        server: Arc<dyn IServerApi>,
        metadata: Arc<dyn IMetadataStore>,
        content: Arc<dyn IContentStore>,
        config: &Config,
    ) -> Self {
        Self {
            server,
            metadata,
            content,
            max_merge_attempts: config.sync.max_merge_attempts.max(1),
            parallel_transfers: config.sync.parallel_transfers.max(1),
            chunker: config.storage.chunker(),
            tree_lock: Arc::new(Mutex::new(())),
            state: watch::channel(SyncState::Idle).0,
            in_flight: StdMutex::new(None),
            cycles: AtomicU64::new(0),
        }
    }

    /// Shares `lock` with code that mutates the local tree
    pub fn with_tree_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.tree_lock = lock;
        self
    }

    /// Lock held for the whole of a sync cycle
    pub fn tree_lock(&self) -> Arc<Mutex<()>> {
        self.tree_lock.clone()
    }

    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receives every phase change
    pub fn subscribe_state(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Sync cycles started by this engine, joined calls not counted
    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    // ========================================================================
    // SyncEngine::sync()
    // ========================================================================

    /// Performs a full synchronization cycle
    ///
    /// `progress` is called after every file-level step of this cycle. A
    /// caller that joins a running cycle gets its result but no progress.
    ///
    /// # Errors
    /// - [`SyncError::ServerUnreachable`] if the network failed; merged
    ///   state is kept and the next sync resumes from it
    /// - [`SyncError::ClientUpdateRequired`] if the server refuses this
    ///   client; never retried
    /// - [`SyncError::OutOfSpace`] if the push would exceed the data cap
    pub async fn sync(&self, progress: Option<ProgressCallback>) -> Result<SyncResult, SyncError> {
        let (sender, mut waiter) = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(running) => (None, running.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    *slot = Some(receiver.clone());
                    (Some(sender), receiver)
                }
            }
        };

        let Some(sender) = sender else {
            debug!("Sync already in flight, waiting for its result");
            return match waiter.wait_for(Option::is_some).await {
                Ok(outcome) => (*outcome).clone().unwrap_or(Err(SyncError::Interrupted)),
                Err(_) => Err(SyncError::Interrupted),
            };
        };

        let _in_flight = InFlight { engine: self };
        let outcome = self.run(progress).await;
        sender.send_replace(Some(outcome.clone()));
        outcome
    }

    #[tracing::instrument(skip_all)]
    async fn run(&self, progress: Option<ProgressCallback>) -> Outcome {
        let started = Instant::now();
        let _tree = self.tree_lock.lock().await;
        let account = self
            .metadata
            .get_account()
            .await?
            .ok_or(SyncError::NoAccount)?;
        self.cycles.fetch_add(1, Ordering::SeqCst);
        info!(username = %account.username(), "Starting sync cycle");

        let mut reporter = ProgressReporter::new(progress);
        let mut result = SyncResult::default();
        let outcome = loop {
            result.attempts += 1;
            match self.attempt(&account, &mut reporter, &mut result).await {
                Ok(()) => break Ok(()),
                Err(Abort::Stale) if result.attempts < self.max_merge_attempts => {
                    info!(attempt = result.attempts, "Server changed during sync, starting over");
                    if self.state() != SyncState::PushingLocal {
                        self.reset_state();
                    }
                }
                Err(Abort::Stale) => break Err(SyncError::MergeAttemptsExhausted(result.attempts)),
                Err(Abort::Failed(err)) => break Err(err),
            }
        };
        self.reset_state();

        match outcome {
            Ok(()) => {
                reporter.finish("Sync complete");
                result.duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    pulled = result.files_pulled,
                    pushed = result.files_pushed,
                    conflicts = result.conflicts_resolved,
                    duration_ms = result.duration_ms,
                    "Sync cycle completed"
                );
                Ok(result)
            }
            Err(err) => {
                warn!(error = %err, attempts = result.attempts, "Sync cycle failed");
                Err(err)
            }
        }
    }

    async fn attempt(
        &self,
        account: &Account,
        reporter: &mut ProgressReporter,
        result: &mut SyncResult,
    ) -> Result<(), Abort> {
        self.enter(SyncState::PullingRemote)?;
        let mut snapshot = Snapshot::load(self.metadata.as_ref()).await?;
        let pruned = self.prune(account, &mut snapshot).await?;
        let pulled = self.pull(account, &snapshot, reporter, result).await?;
        result.files_pruned = pruned.len();
        result.files_pulled = pulled.files.len();

        self.enter(SyncState::Diffing)?;
        let resolutions = diff(&snapshot, &pulled)?;
        result.conflicts_resolved = resolutions.values().map(Vec::len).sum();

        self.enter(SyncState::ResolvingConflicts)?;
        let merge = self.merge(account, &snapshot, &pulled, &resolutions).await?;
        reporter.step(None, "Merged changes");

        self.enter(SyncState::PushingLocal)?;
        let outbound = self.prepare_push(account, &merge).await?;
        reporter.grow(outbound.diffs.len());

        match self.push(account, &outbound, result).await {
            Ok(accepted) => {
                for meta in &accepted {
                    reporter.step(Some(meta.id()), "Pushed change");
                }
                result.files_pushed = accepted.len();
                self.commit(pruned, &pulled, merge, accepted).await?;
                Ok(())
            }
            Err(Abort::Failed(err))
                if matches!(err, SyncError::ServerUnreachable | SyncError::OutOfSpace) =>
            {
                self.retain(&snapshot, pruned, &pulled, merge, outbound).await?;
                Err(Abort::Failed(err))
            }
            Err(abort) => Err(abort),
        }
    }

    // ========================================================================
    // State machine
    // ========================================================================

    fn enter(&self, next: SyncState) -> Result<(), SyncError> {
        let mut refused = None;
        self.state.send_if_modified(|state| match state.transition_to(next) {
            Ok(()) => true,
            Err(err) => {
                refused = Some(err);
                false
            }
        });
        match refused {
            Some(err) => Err(err.into()),
            None => {
                debug!(state = %next, "Sync phase");
                Ok(())
            }
        }
    }

    fn reset_state(&self) {
        self.state.send_if_modified(|state| {
            let changed = !state.is_idle();
            *state = SyncState::Idle;
            changed
        });
    }

    // ========================================================================
    // Prune and pull
    // ========================================================================

    /// Forgets files the server no longer knows or no longer shares
    async fn prune(&self, account: &Account, snapshot: &mut Snapshot) -> Result<Vec<FileId>, Abort> {
        let known: HashSet<FileId> = self.server.get_file_ids(account).await?.into_iter().collect();
        let mut pruned: Vec<FileId> = snapshot
            .base
            .keys()
            .filter(|id| !known.contains(id))
            .copied()
            .collect();
        pruned.sort();

        for id in &pruned {
            snapshot.base.remove(id);
            snapshot.local.remove(id);
        }
        snapshot.changes.retain(|r| !pruned.contains(&r.file_id));
        if !pruned.is_empty() {
            info!(count = pruned.len(), "Pruned files the server no longer shares");
        }
        Ok(pruned)
    }

    #[tracing::instrument(skip_all, fields(since = snapshot.cursor))]
    async fn pull(
        &self,
        account: &Account,
        snapshot: &Snapshot,
        reporter: &mut ProgressReporter,
        result: &mut SyncResult,
    ) -> Result<Pulled, Abort> {
        let updates = self.server.get_updates(account, snapshot.cursor).await?;

        let mut files = HashMap::new();
        for meta in updates.files {
            let id = meta.id();
            meta.file.verify().map_err(|e| {
                SyncError::Unexpected(format!("file {id} carries an invalid signature: {e}"))
            })?;
            let known = snapshot.base.get(&id).map(|b| b.metadata_version);
            if known.is_some_and(|version| version >= meta.metadata_version) {
                continue;
            }
            files.insert(id, meta);
        }
        reporter.step(None, "Pulled metadata");

        let mut needed = Vec::new();
        for meta in files.values() {
            let file = meta.meta();
            let Some(hash) = file.document_hash.as_ref().filter(|_| !file.deleted) else {
                continue;
            };
            if self.content.get_manifest(file.id, hash).await?.is_none() {
                needed.push((file.id, hash.clone(), file.document_size));
            }
        }
        needed.sort();
        reporter.grow(needed.len());

        let mut transfers = stream::iter(needed)
            .map(|(id, hash, size)| self.download(account, id, hash, size))
            .buffer_unordered(self.parallel_transfers);
        while let Some(done) = transfers.next().await {
            let id = done?;
            result.documents_downloaded += 1;
            reporter.step(Some(id), "Downloaded document");
        }

        info!(
            files = files.len(),
            documents = result.documents_downloaded,
            as_of = updates.as_of,
            "Pulled remote changes"
        );
        Ok(Pulled {
            as_of: updates.as_of,
            files,
        })
    }

    /// Fetches one document version and whichever of its chunks are missing
    ///
    /// `size` is the signed plaintext size; the manifest's own size is not
    /// covered by its hash.
    async fn download(
        &self,
        account: &Account,
        id: FileId,
        hash: DocumentHash,
        size: Option<u64>,
    ) -> Result<FileId, Abort> {
        let manifest = self.server.get_document(account, id, &hash).await?;
        if manifest.hash() != hash {
            return Err(SyncError::Unexpected(format!("manifest of {id} does not match its hash")).into());
        }
        if size.is_some_and(|size| size != manifest.size) {
            return Err(SyncError::Unexpected(format!("manifest of {id} does not match its signed size")).into());
        }

        let missing = self.content.missing_chunks(&manifest.chunks).await?;
        if !missing.is_empty() {
            let chunks = self.server.get_chunks(account, missing.clone()).await?;
            if let Some(bad) = chunks.iter().find(|c| !c.is_intact()) {
                return Err(SyncError::Unexpected(format!("chunk {} is corrupted", bad.hash)).into());
            }
            let received: HashSet<&ChunkHash> = chunks.iter().map(|c| &c.hash).collect();
            if let Some(absent) = missing.iter().find(|h| !received.contains(h)) {
                return Err(SyncError::Unexpected(format!("server did not return chunk {absent}")).into());
            }
            self.content.put_chunks(&chunks).await?;
        }

        self.content.put_manifest(id, &hash, &manifest).await?;
        debug!(%id, chunks = manifest.chunks.len(), "Downloaded document");
        Ok(id)
    }

    // ========================================================================
    // Merge
    // ========================================================================

    /// Replays local changes on the pulled tree
    ///
    /// Files changed only here are taken as they are. Files changed on both
    /// sides are rebuilt from the remote copy by re-applying each local
    /// change that survives conflict resolution. Whatever the combination
    /// breaks (cycles, name clashes, links) is repaired afterwards.
    #[tracing::instrument(skip_all)]
    async fn merge(
        &self,
        account: &Account,
        snapshot: &Snapshot,
        pulled: &Pulled,
        resolutions: &Resolutions,
    ) -> Result<Merge, SyncError> {
        let mut remote = snapshot.base.clone();
        remote.extend(pulled.files.iter().map(|(id, meta)| (*id, meta.clone())));
        let versions = remote
            .values()
            .map(|m| (m.id(), (m.metadata_version, m.content_version)))
            .collect();
        let tree = FileTree::new(remote.values().map(|m| m.meta().clone()));
        let mut merged = LazyTree::new(account.clone(), tree).with_versions(versions);
        let mut local_tree = snapshot.local_tree(account);

        // cache keys while the parent chains are intact; a merged move may
        // close a cycle that has to be undone by key
        let remote_ids: Vec<FileId> = merged.tree().all().map(|f| f.id).collect();
        for id in &remote_ids {
            if let Err(err) = merged.decrypt_key(id) {
                debug!(%id, error = %err, "Key not available before merge");
            }
        }

        let mut ids: Vec<FileId> = snapshot.local.keys().copied().collect();
        ids.sort();
        let mut created = HashSet::new();
        let mut changed: HashSet<FileId> = ids.iter().copied().collect();
        let mut resurrect = Vec::new();
        // locally moved files and the parent the server has for them
        let mut unmoves: HashMap<FileId, FileId> = HashMap::new();

        // new files first, so moves into new folders find them
        for id in &ids {
            if snapshot.base.contains_key(id) {
                continue;
            }
            let meta = snapshot.local[id].clone();
            if !meta.deleted {
                resurrect.push(*id);
            }
            merged.stage_unvalidated(meta);
            created.insert(*id);
        }

        for id in &ids {
            let (Some(base), Some(local)) = (snapshot.base.get(id), snapshot.local.get(id)) else {
                continue;
            };
            let base = base.meta();
            let Some(remote) = pulled.files.get(id).map(ServerMeta::meta) else {
                if local.parent != base.parent {
                    unmoves.insert(*id, base.parent);
                }
                merged.stage_unvalidated(local.clone());
                continue;
            };

            let ours = FileChanges::between(Some(base), local);
            let theirs = FileChanges::between(Some(base), remote);
            let resolved = resolutions.get(id).map(Vec::as_slice).unwrap_or_default();
            let remote_wins = |kind: ConflictKind| {
                resolved
                    .iter()
                    .any(|(c, r)| c.kind == kind && *r == Resolution::KeepRemote)
            };

            if ours.deleted {
                if theirs.edited {
                    resurrect.push(*id);
                } else {
                    merged.delete_unvalidated(id)?;
                }
                continue;
            }
            if theirs.deleted {
                if !ours.edited {
                    // a delete beats moves and renames
                    continue;
                }
                resurrect.push(*id);
            }

            if ours.renamed && !remote_wins(ConflictKind::Rename) {
                let name = local_tree.name(id)?;
                merged.rename_unvalidated(id, &name)?;
            }
            if ours.moved
                && !remote_wins(ConflictKind::Move)
                && merged.maybe_find(&local.parent).is_some()
            {
                merged.move_unvalidated(id, &local.parent)?;
                unmoves.insert(*id, remote.parent);
            }
            if ours.edited {
                let edit = resolved
                    .iter()
                    .find(|(c, _)| c.kind == ConflictKind::Edit)
                    .map(|(_, r)| *r);
                if let Some(copy) = self.merge_edit(&mut merged, local, remote, edit).await? {
                    changed.insert(copy);
                    created.insert(copy);
                }
            }
            if ours.shares_changed {
                let mut meta = merged.find(id)?.clone();
                merge_access_keys(base, local, &mut meta);
                merged.stage_unvalidated(meta);
            }
        }

        for id in resurrect {
            if merged.maybe_find(&id).is_some() && merged.is_deleted(&id) {
                debug!(%id, "Edit wins over delete, restoring file");
                merged.undelete_unvalidated(&id)?;
            }
        }

        let mut dropped = Vec::new();
        repair(&mut merged, &created, &changed, &mut unmoves, &mut dropped)?;

        let records = merged.take_changes();
        Ok(Merge {
            tree: merged,
            remote,
            dropped,
            records,
        })
    }

    /// Applies a local content change, keeping a copy of the losing version
    async fn merge_edit(
        &self,
        merged: &mut LazyTree,
        local: &FileMetadata,
        remote: &FileMetadata,
        resolution: Option<Resolution>,
    ) -> Result<Option<FileId>, SyncError> {
        let id = local.id;
        let copy = match (resolution, &local.document_hash, &remote.document_hash) {
            (Some(Resolution::KeepBoth { copy_of: Side::Local }), Some(hash), _) => {
                // the remote edit is newer and stays in the file
                return self.conflicted_copy(merged, &id, hash).await.map(Some);
            }
            (Some(Resolution::KeepBoth { copy_of: Side::Remote }), _, Some(hash)) => {
                Some(self.conflicted_copy(merged, &id, hash).await?)
            }
            _ => None,
        };
        if let Some(hash) = &local.document_hash {
            merged.update_document_unvalidated(&id, hash.clone(), local.document_size.unwrap_or(0))?;
        }
        Ok(copy)
    }

    /// Stores one version of `id` as a new document next to it
    async fn conflicted_copy(
        &self,
        merged: &mut LazyTree,
        id: &FileId,
        hash: &DocumentHash,
    ) -> Result<FileId, SyncError> {
        let manifest = self
            .content
            .get_manifest(*id, hash)
            .await?
            .ok_or_else(|| SyncError::Unexpected(format!("content of {id} is not stored locally")))?;
        let chunks: HashMap<ChunkHash, Chunk> = self
            .content
            .get_chunks(&manifest.chunks)
            .await?
            .into_iter()
            .map(|c| (c.hash.clone(), c))
            .collect();
        let content = decrypt_document(&merged.decrypt_key(id)?, &manifest, &chunks)?;

        // share roots have no parent here; the copy goes next to the link
        let parent = match merged.resolved_parent(id) {
            Some(parent) => parent,
            None => merged.root()?,
        };
        let name = merged.name(id)?;
        let taken = sibling_names(merged, &parent)?;
        let copy_name = ConflictNamer::generate_unique(&name, |n| taken.contains(n));
        let copy = merged.create_unvalidated(FileId::new(), &copy_name, &parent, FileType::Document)?;

        let encrypted = encrypt_document(&merged.decrypt_key(&copy)?, &content, &self.chunker)?;
        let copy_hash = encrypted.hash();
        self.content.put_chunks(&encrypted.chunks).await?;
        self.content
            .put_manifest(copy, &copy_hash, &encrypted.manifest)
            .await?;
        merged.update_document_unvalidated(&copy, copy_hash, encrypted.manifest.size)?;

        info!(%id, %copy, "Kept both versions of a concurrently edited document");
        Ok(copy)
    }

    // ========================================================================
    // Push
    // ========================================================================

    async fn prepare_push(&self, account: &Account, merge: &Merge) -> Result<Outbound, SyncError> {
        let mut outbound = Outbound::default();
        for meta in merge.tree.staged() {
            let id = meta.id;
            let remote = merge.remote.get(&id);
            match remote {
                // created and deleted before it ever reached the server
                None if merge.tree.is_deleted(&id) => continue,
                Some(remote) if remote.meta() == &meta => continue,
                _ => {}
            }

            if let Some(hash) = &meta.document_hash {
                let remote_hash = remote.and_then(|r| r.meta().document_hash.as_ref());
                if remote_hash != Some(hash) {
                    let manifest = self.content.get_manifest(id, hash).await?.ok_or_else(|| {
                        SyncError::Unexpected(format!("content of {id} is not stored locally"))
                    })?;
                    outbound.documents.push(DocumentUpload {
                        id,
                        hash: hash.clone(),
                        manifest,
                    });
                }
            }

            outbound.diffs.push(FileDiff {
                base_version: remote.map(|r| r.metadata_version),
                new: meta.clone().sign(account),
            });
            outbound.local.push(meta);
        }
        Ok(outbound)
    }

    #[tracing::instrument(skip_all, fields(files = outbound.diffs.len(), documents = outbound.documents.len()))]
    async fn push(
        &self,
        account: &Account,
        outbound: &Outbound,
        result: &mut SyncResult,
    ) -> Result<Vec<ServerMeta>, Abort> {
        if outbound.diffs.is_empty() {
            return Ok(Vec::new());
        }

        let mut hashes: Vec<ChunkHash> = outbound
            .documents
            .iter()
            .flat_map(|d| d.manifest.chunks.iter().cloned())
            .collect();
        hashes.sort();
        hashes.dedup();
        let missing = self.server.missing_chunks(account, hashes).await?;
        if !missing.is_empty() {
            let chunks = self.content.get_chunks(&missing).await?;
            result.chunks_uploaded += chunks.len();
            self.server.put_chunks(account, chunks).await?;
        }

        let accepted = self
            .server
            .upsert(account, outbound.diffs.clone(), outbound.documents.clone())
            .await?;
        debug!(accepted = accepted.len(), "Server accepted changes");
        Ok(accepted)
    }

    // ========================================================================
    // Commit
    // ========================================================================

    async fn commit(
        &self,
        pruned: Vec<FileId>,
        pulled: &Pulled,
        merge: Merge,
        accepted: Vec<ServerMeta>,
    ) -> Result<(), SyncError> {
        let mut base = merge.remote;
        let mut upserts = pulled.files.clone();
        for meta in accepted {
            base.insert(meta.id(), meta.clone());
            upserts.insert(meta.id(), meta);
        }

        // tombstones the server has confirmed, with everything under them
        let tree = FileTree::new(base.values().map(|m| m.meta().clone()));
        let mut removed: Vec<FileId> = base.keys().filter(|id| tree.is_deleted(id)).copied().collect();
        removed.extend(pruned);
        removed.extend(merge.dropped);
        removed.sort();
        removed.dedup();
        for id in &removed {
            base.remove(id);
            upserts.remove(id);
        }

        let keep: Vec<(FileId, DocumentHash)> = base
            .values()
            .filter_map(|m| m.meta().document_hash.clone().map(|hash| (m.id(), hash)))
            .collect();

        self.metadata
            .commit_sync(SyncCommit {
                base_upserts: upserts.into_values().collect(),
                removed,
                local: Vec::new(),
                changes: Vec::new(),
                cursor: pulled.as_of,
                last_synced: Some(chrono::Utc::now().timestamp_millis()),
            })
            .await?;

        let stats = self.content.gc(&keep).await?;
        debug!(
            manifests = stats.manifests_removed,
            chunks = stats.chunks_removed,
            "Collected unreferenced content"
        );
        Ok(())
    }

    /// Keeps the pull and the merge when the push could not go through
    async fn retain(
        &self,
        snapshot: &Snapshot,
        pruned: Vec<FileId>,
        pulled: &Pulled,
        merge: Merge,
        outbound: Outbound,
    ) -> Result<(), SyncError> {
        let pending: HashSet<FileId> = outbound.local.iter().map(|m| m.id).collect();
        let mut log = ChangeLog::new(snapshot.changes.clone());
        log.extend(merge.records);
        let changes = log
            .collapsed()
            .into_iter()
            .filter(|r| pending.contains(&r.file_id))
            .collect();

        let mut removed = pruned;
        removed.extend(merge.dropped);
        self.metadata
            .commit_sync(SyncCommit {
                base_upserts: pulled.files.values().cloned().collect(),
                removed,
                local: outbound.local,
                changes,
                cursor: pulled.as_of,
                last_synced: None,
            })
            .await?;
        info!(pending = pending.len(), "Kept merged changes for the next sync");
        Ok(())
    }

    // ========================================================================
    // Work estimate
    // ========================================================================

    /// Local and server changes the next sync would process
    ///
    /// Reads the store and the server without changing either.
    #[tracing::instrument(skip(self))]
    pub async fn calculate_work(&self) -> Result<SyncStatus, SyncError> {
        let (account, snapshot) = {
            let _tree = self.tree_lock.lock().await;
            let account = self
                .metadata
                .get_account()
                .await?
                .ok_or(SyncError::NoAccount)?;
            (account, Snapshot::load(self.metadata.as_ref()).await?)
        };

        let pushable = |id: &FileId| {
            let Some(local) = snapshot.local.get(id) else {
                return false;
            };
            match snapshot.base.get(id) {
                Some(base) => base.meta() != local,
                None => !local.deleted,
            }
        };
        let mut local_ids: Vec<FileId> = ChangeLog::new(snapshot.changes.clone())
            .changed_ids()
            .into_iter()
            .filter(|id| pushable(id))
            .collect();
        let mut unlogged: Vec<FileId> = snapshot
            .local
            .keys()
            .filter(|id| !local_ids.contains(id) && pushable(id))
            .copied()
            .collect();
        unlogged.sort();
        local_ids.extend(unlogged);

        let updates = self.server.get_updates(&account, snapshot.cursor).await?;
        let mut work_units: Vec<WorkUnit> = local_ids.into_iter().map(WorkUnit::LocalChange).collect();
        let mut seen = HashSet::new();
        for meta in &updates.files {
            let id = meta.id();
            let base = snapshot.base.get(&id);
            if base.is_some_and(|b| b.metadata_version >= meta.metadata_version) {
                continue;
            }
            if meta.meta().deleted && base.is_none() && !snapshot.local.contains_key(&id) {
                continue;
            }
            if seen.insert(id) {
                work_units.push(WorkUnit::ServerChange(id));
            }
        }

        Ok(SyncStatus {
            work_units,
            latest_server_ts: updates.as_of,
        })
    }
}

/// Clears the in-flight slot even if the running sync is dropped
struct InFlight<'a> {
    engine: &'a SyncEngine,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        *self
            .engine
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.engine.reset_state();
    }
}

// ============================================================================
// Merge helpers
// ============================================================================

/// Resolutions for every file changed on both sides
fn diff(snapshot: &Snapshot, pulled: &Pulled) -> Result<Resolutions, SyncError> {
    let mut resolutions = HashMap::new();
    for (id, local) in &snapshot.local {
        let (Some(base), Some(remote)) = (snapshot.base.get(id), pulled.files.get(id)) else {
            continue;
        };
        let detection = ConflictDetector::detect(Some(base.meta()), local, remote.meta())?;
        if !detection.conflicts().is_empty() {
            resolutions.insert(*id, ConflictResolver::resolve_all(detection.conflicts()));
        }
    }
    debug!(conflicted = resolutions.len(), "Diffed local and remote changes");
    Ok(resolutions)
}

/// Applies grants and revocations made locally to `target`
fn merge_access_keys(base: &FileMetadata, local: &FileMetadata, target: &mut FileMetadata) {
    let same_grant = |a: &strongbox_core::domain::UserAccessKey,
                      b: &strongbox_core::domain::UserAccessKey| {
        a.encrypted_for == b.encrypted_for && a.encrypted_key == b.encrypted_key
    };

    for revoked in local.user_access_keys.iter().filter(|k| k.deleted) {
        let was_live = base
            .user_access_keys
            .iter()
            .any(|b| !b.deleted && same_grant(b, revoked));
        if !was_live {
            continue;
        }
        for key in target
            .user_access_keys
            .iter_mut()
            .filter(|k| !k.deleted && same_grant(k, revoked))
        {
            key.deleted = true;
        }
    }

    for granted in local
        .user_access_keys
        .iter()
        .filter(|k| !k.deleted && !base.user_access_keys.contains(k))
    {
        if target.user_access_keys.contains(granted) {
            continue;
        }
        for key in target
            .user_access_keys
            .iter_mut()
            .filter(|k| !k.deleted && k.encrypted_for == granted.encrypted_for)
        {
            key.deleted = true;
        }
        target.user_access_keys.push(granted.clone());
    }
}

/// Names of the live children of `parent`
fn sibling_names(tree: &mut LazyTree, parent: &FileId) -> Result<HashSet<String>, SyncError> {
    let children: Vec<FileId> = tree
        .tree()
        .children(parent)
        .into_iter()
        .filter(|c| !tree.is_deleted(c))
        .collect();
    children
        .iter()
        .map(|c| tree.name(c).map_err(SyncError::from))
        .collect()
}

/// The file to change when repairing: new files first, then changed ones
fn pick(ids: impl IntoIterator<Item = FileId>, created: &HashSet<FileId>, changed: &HashSet<FileId>) -> Option<FileId> {
    let mut ids: Vec<FileId> = ids.into_iter().collect();
    ids.sort();
    ids.iter()
        .find(|id| created.contains(id))
        .or_else(|| ids.iter().find(|id| changed.contains(id)))
        .copied()
}

/// Puts a locally moved file back where the server has it
fn undo_move(
    merged: &mut LazyTree,
    unmoves: &mut HashMap<FileId, FileId>,
    id: &FileId,
) -> Option<Result<(), SyncError>> {
    let parent = unmoves.remove(id)?;
    debug!(%id, %parent, "Undoing local move");
    Some(merged.move_unvalidated(id, &parent).map_err(SyncError::from))
}

/// Resolves validation failures the merge introduced, one at a time
fn repair(
    merged: &mut LazyTree,
    created: &HashSet<FileId>,
    changed: &HashSet<FileId>,
    unmoves: &mut HashMap<FileId, FileId>,
    dropped: &mut Vec<FileId>,
) -> Result<(), SyncError> {
    let me = merged.account().username().clone();
    let limit = merged.tree().len() * 2 + 8;

    for _ in 0..limit {
        let failure = match merged.validate() {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };
        debug!(%failure, "Repairing merged tree");
        let unrepairable = || SyncError::Unexpected(format!("merged tree is invalid: {failure}"));

        match &failure {
            ValidationFailure::Cycle(ids) => {
                let moved: Vec<FileId> = ids.iter().filter(|id| unmoves.contains_key(*id)).copied().collect();
                let id = pick(moved.iter().copied(), created, changed)
                    .or_else(|| moved.iter().min().copied())
                    .ok_or_else(unrepairable)?;
                undo_move(merged, unmoves, &id).ok_or_else(unrepairable)??;
            }
            ValidationFailure::FileWithDifferentOwnerParent(id) => {
                undo_move(merged, unmoves, id).ok_or_else(unrepairable)??;
            }
            ValidationFailure::PathConflict(ids) => {
                let id = pick(ids.iter().copied(), created, changed).ok_or_else(unrepairable)?;
                let name = merged.name(&id)?;
                let parent = merged.find(&id)?.parent;
                let taken = sibling_names(merged, &parent)?;
                let renamed = NameComponents::from(&name).next_in(|n| taken.contains(n));
                debug!(%id, from = %name, to = %renamed, "Renaming to avoid a name clash");
                merged.rename_unvalidated(&id, &renamed)?;
            }
            ValidationFailure::SharedLink { link, .. }
            | ValidationFailure::OwnedLink(link)
            | ValidationFailure::BrokenLink(link) => {
                if merged.find(link)?.owner != me {
                    return Err(unrepairable());
                }
                debug!(%link, "Deleting invalid link");
                merged.delete_unvalidated(link)?;
            }
            ValidationFailure::DuplicateLink { target } => {
                let links: Vec<FileId> = merged
                    .tree()
                    .all()
                    .filter(|f| f.link_target() == Some(*target) && f.owner == me)
                    .map(|f| f.id)
                    .filter(|id| !merged.is_deleted(id))
                    .collect();
                let link = pick(links, created, changed).ok_or_else(unrepairable)?;
                debug!(%link, "Deleting duplicate link");
                merged.delete_unvalidated(&link)?;
            }
            ValidationFailure::Orphan(id) => {
                debug!(%id, "Dropping file whose parent is gone");
                merged.remove_unvalidated(id);
                dropped.push(*id);
            }
            _ => return Err(unrepairable()),
        }
    }
    Err(SyncError::Unexpected("merged tree could not be repaired".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strongbox_core::domain::{ShareMode, Username};

    fn user(name: &str) -> Account {
        Account::generate(Username::new(name).unwrap(), "mem://")
    }

    /// Alice's tree with one folder, returned as the base copy of that folder
    fn shared_folder() -> (LazyTree, FileId) {
        let alice = user("alice");
        let root = LazyTree::create_root(&alice).unwrap();
        let mut tree = LazyTree::new(alice, FileTree::new([root.clone()]));
        let folder = tree.create("team", &root.id, FileType::Folder).unwrap();
        (tree, folder)
    }

    fn grant(tree: &mut LazyTree, id: &FileId, name: &str) -> FileMetadata {
        let other = user(name);
        tree.add_share(id, other.username(), other.public_keys(), ShareMode::Write)
            .unwrap();
        tree.find(id).unwrap().clone()
    }

    fn live_grantees(meta: &FileMetadata) -> Vec<String> {
        let mut names: Vec<String> = meta
            .user_access_keys
            .iter()
            .filter(|k| !k.deleted)
            .map(|k| k.encrypted_for.to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_grants_from_both_sides_survive() {
        let (tree, folder) = shared_folder();
        let base = tree.find(&folder).unwrap().clone();

        let mut local_tree = LazyTree::new(tree.account().clone(), tree.tree().clone());
        let local = grant(&mut local_tree, &folder, "bob");
        let mut remote_tree = LazyTree::new(tree.account().clone(), tree.tree().clone());
        let mut target = grant(&mut remote_tree, &folder, "carol");

        merge_access_keys(&base, &local, &mut target);
        assert_eq!(live_grantees(&target), vec!["bob", "carol"]);
    }

    #[test]
    fn test_local_revocation_applies_to_remote_copy() {
        let (mut tree, folder) = shared_folder();
        let base = grant(&mut tree, &folder, "bob");
        let bob = Username::new("bob").unwrap();

        let mut local_tree = LazyTree::new(tree.account().clone(), tree.tree().clone());
        local_tree.delete_share(&folder, Some(&bob)).unwrap();
        let local = local_tree.find(&folder).unwrap().clone();

        let mut remote_tree = LazyTree::new(tree.account().clone(), tree.tree().clone());
        let mut target = grant(&mut remote_tree, &folder, "carol");

        merge_access_keys(&base, &local, &mut target);
        assert_eq!(live_grantees(&target), vec!["carol"]);
    }

    #[test]
    fn test_pick_prefers_created_then_changed() {
        let (a, b, c) = (FileId::new(), FileId::new(), FileId::new());
        let created: HashSet<FileId> = [c].into_iter().collect();
        let changed: HashSet<FileId> = [b, c].into_iter().collect();

        assert_eq!(pick([a, b, c], &created, &changed), Some(c));
        assert_eq!(pick([a, b], &created, &changed), Some(b));
        assert_eq!(pick([a], &created, &changed), None);
    }

    #[test]
    fn test_stale_push_restarts() {
        let stale = Abort::from(ServerError::Endpoint(EndpointError::OldVersionIncorrect));
        assert!(matches!(stale, Abort::Stale));
        let fatal = Abort::from(ServerError::ClientUpdateRequired);
        assert!(matches!(fatal, Abort::Failed(SyncError::ClientUpdateRequired)));
    }
}
