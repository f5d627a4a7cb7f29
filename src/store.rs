//! Versioned artifact store backed by a git working copy.
//!
//! The store owns the working copy's full lifecycle: clone/repair on
//! initialization, atomic commit-and-publish for every content change,
//! revision bookkeeping in side-car metadata, and on-demand retrieval of
//! large binary payloads. Every mutating operation runs under the
//! repository mutex; read operations go straight to the working copy.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    CertificateCheckStatus, Cred, FetchOptions, Oid, PushOptions, RemoteCallbacks, Repository,
    ResetType, Signature, Sort,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifact::{self, ArtifactEntry, ArtifactMeta, LinkTarget};
use crate::checkout::CheckoutRegistry;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::fsio;
use crate::lfs;
use crate::repair::{SystemRepairer, WorkingCopyRepairer};
use crate::repo_lock::RepoMutex;
use crate::revision::{self, Revision, RevisionKind};
use crate::validate;

/// Bounded attempts at bringing up a usable working copy
const INIT_ATTEMPTS: u32 = 3;

/// Result of a publish transaction. `commit_id` is `None` when nothing was
/// staged and the publish degenerated to a successful no-op.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub commit_id: Option<String>,
}

impl PublishOutcome {
    pub fn committed(&self) -> bool {
        self.commit_id.is_some()
    }
}

/// One entry of an artifact's version history.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub commit_id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    /// Revision recorded in side-car metadata at that commit, when the
    /// metadata blob existed and parsed.
    pub revision: Option<String>,
}

/// A commit in the activity feed.
#[derive(Debug, Clone, Serialize)]
pub struct CommitInfo {
    pub commit_id: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub files: Vec<String>,
}

/// The versioned store over one working copy.
pub struct VersionedStore {
    work_dir: PathBuf,
    remote_url: String,
    token: Option<String>,
    branch: String,
    allow_insecure: bool,
    allowed_extensions: Vec<String>,
    mutex: RepoMutex,
    repairer: Box<dyn WorkingCopyRepairer>,
}

impl std::fmt::Debug for VersionedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedStore")
            .field("work_dir", &self.work_dir)
            .field("remote_url", &self.remote_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("branch", &self.branch)
            .field("allow_insecure", &self.allow_insecure)
            .field("allowed_extensions", &self.allowed_extensions)
            .finish_non_exhaustive()
    }
}

impl VersionedStore {
    /// Open (cloning and repairing as needed) the store described by the
    /// configuration. Returns only once the working copy is usable.
    pub fn open(config: &Config) -> Result<VersionedStore> {
        Self::with_repairer(config, Box::new(SystemRepairer))
    }

    /// Open with a custom repairer; the initialization state machine is
    /// exercised through this seam in tests.
    pub fn with_repairer(
        config: &Config,
        repairer: Box<dyn WorkingCopyRepairer>,
    ) -> Result<VersionedStore> {
        let work_dir = config.store.resolved_work_dir()?;
        let mutex = RepoMutex::new(marker_path(&work_dir))
            .acquire_timeout(Duration::from_secs(config.locks.acquire_timeout_secs))
            .stale_after(Duration::from_secs(config.locks.stale_after_secs));

        let store = VersionedStore {
            work_dir,
            remote_url: config.remote.authenticated_url(),
            token: config.remote.token.clone(),
            branch: config.remote.branch.clone(),
            allow_insecure: config.remote.allow_insecure_ssl,
            allowed_extensions: config.store.allowed_extensions.clone(),
            mutex,
            repairer,
        };

        store.initialize()?;
        Ok(store)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// The checkout registry rooted in this working copy.
    pub fn registry(&self) -> CheckoutRegistry {
        CheckoutRegistry::new(&self.work_dir)
    }

    // =========================================================================
    // Initialization / repair state machine
    // =========================================================================

    /// Uninitialized -> Cloning -> Ready, with Corrupted recovered by the
    /// repairer. Exhausting the attempt budget is fatal: the store reports
    /// unavailable rather than proceeding on a broken copy.
    fn initialize(&self) -> Result<()> {
        let mut last_detail = String::new();

        for attempt in 1..=INIT_ATTEMPTS {
            match self.open_or_clone() {
                Ok(repo) => match self.verify_remote(&repo) {
                    Ok(()) => {
                        lfs::configure_on_demand(&repo)?;
                        info!(work_dir = %self.work_dir.display(), "working copy ready");
                        return Ok(());
                    }
                    Err(err) => last_detail = err.to_string(),
                },
                Err(err) => last_detail = err.to_string(),
            }

            warn!(attempt, detail = %last_detail, "working copy unusable, repairing");
            self.repair();
        }

        Err(Error::CorruptedWorkingCopy {
            path: self.work_dir.clone(),
            attempts: INIT_ATTEMPTS,
            detail: last_detail,
        })
    }

    fn open_or_clone(&self) -> Result<Repository> {
        if self.work_dir.join(".git").exists() {
            debug!(work_dir = %self.work_dir.display(), "opening existing working copy");
            return Ok(Repository::open(&self.work_dir)?);
        }

        info!(work_dir = %self.work_dir.display(), "cloning working copy");
        if let Some(parent) = self.work_dir.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(self.callbacks());

        let mut builder = RepoBuilder::new();
        builder.branch(&self.branch);
        builder.fetch_options(fetch);

        Ok(builder.clone(&self.remote_url, &self.work_dir)?)
    }

    /// Ready requires a verified origin; stale connection parameters (a
    /// rotated token, a moved project) are rewritten in place.
    fn verify_remote(&self, repo: &Repository) -> Result<()> {
        let remote = repo.find_remote("origin").map_err(|_| {
            Error::OperationFailed("working copy has no origin remote".to_string())
        })?;

        if remote.url() != Some(self.remote_url.as_str()) {
            repo.remote_set_url("origin", &self.remote_url)?;
        }
        Ok(())
    }

    fn repair(&self) {
        self.repairer.terminate_helpers(&self.work_dir);
        if let Err(err) = self.repairer.remove_stale_git_locks(&self.work_dir) {
            warn!(%err, "could not remove stale git locks");
        }
        if let Err(err) = self.repairer.force_remove_dir(&self.work_dir) {
            warn!(%err, "could not remove working copy for re-clone");
        }
    }

    // =========================================================================
    // Path resolution and plain content access
    // =========================================================================

    /// Resolve a logical filename to its tracked path by basename.
    ///
    /// First tracked match wins; additional matches are logged, not
    /// resolved (ambiguity needs product input, see DESIGN.md).
    pub fn find_path(&self, filename: &str) -> Result<Option<String>> {
        let repo = self.repo()?;
        let index = repo.index()?;

        let mut matches: Vec<String> = Vec::new();
        for entry in index.iter() {
            let path = String::from_utf8_lossy(&entry.path).into_owned();
            if artifact::is_internal(&path) {
                continue;
            }
            let basename = Path::new(&path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default();
            if basename == filename {
                matches.push(path);
            }
        }

        if matches.len() > 1 {
            warn!(
                filename,
                winner = %matches[0],
                losers = matches.len() - 1,
                "ambiguous basename, first tracked match wins"
            );
        }

        Ok(matches.into_iter().next())
    }

    pub fn get_content(&self, rel_path: &str) -> Result<Vec<u8>> {
        fs::read(self.abs(rel_path)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::NotFound(rel_path.to_string()),
            _ => Error::Io(e),
        })
    }

    /// Write artifact content into the working copy (upload path). The
    /// change only becomes durable through a subsequent publish.
    pub fn save_content(&self, rel_path: &str, content: &[u8]) -> Result<()> {
        validate::validate_content_signature(rel_path, content)?;
        let _guard = self.mutex.acquire()?;
        self.write_file(rel_path, content)
    }

    /// Side-car metadata for an artifact; absent or unparseable records
    /// read as a fresh default.
    pub fn load_meta(&self, rel_path: &str) -> Result<ArtifactMeta> {
        let path = self.abs(&artifact::meta_path(rel_path));
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ArtifactMeta::default()),
            Err(e) => return Err(Error::Io(e)),
        };

        match serde_json::from_slice(&raw) {
            Ok(meta) => Ok(meta),
            Err(err) => {
                warn!(path = %path.display(), %err, "unparseable metadata treated as absent");
                Ok(ArtifactMeta::default())
            }
        }
    }

    // =========================================================================
    // Publish transaction
    // =========================================================================

    /// Commit the given paths (additions for files on disk, removals for
    /// files that are gone) and push to the remote, all under the
    /// repository mutex. Nothing staged is a successful no-op. On any
    /// failure the working copy is resynchronized to the remote's last
    /// known-good state before the error is reported.
    pub fn commit_and_push(
        &self,
        paths: &[String],
        message: &str,
        author: &str,
    ) -> Result<PublishOutcome> {
        let _guard = self.mutex.acquire()?;
        self.publish_locked(paths, message, author)
    }

    fn publish_locked(
        &self,
        paths: &[String],
        message: &str,
        author: &str,
    ) -> Result<PublishOutcome> {
        let repo = self.repo()?;

        // The local commit is never undone on failure; the working copy is
        // resynchronized to the remote's last known-good state instead, so
        // it cannot diverge silently. Compensating actions (e.g. restoring
        // a released checkout) are the caller's job.
        match self.stage_commit_push(&repo, paths, message, author) {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                warn!(%err, "publish failed, resynchronizing working copy to remote");
                if let Err(sync_err) = self.resync(&repo) {
                    warn!(%sync_err, "resynchronization after failed publish also failed");
                }
                Err(Error::PublishFailed(err.to_string()))
            }
        }
    }

    fn stage_commit_push(
        &self,
        repo: &Repository,
        paths: &[String],
        message: &str,
        author: &str,
    ) -> Result<PublishOutcome> {
        let mut index = repo.index()?;

        for rel in paths {
            if self.abs(rel).exists() {
                index.add_path(Path::new(rel))?;
            } else if let Err(err) = index.remove_path(Path::new(rel)) {
                if err.code() != git2::ErrorCode::NotFound {
                    return Err(Error::Git(err));
                }
            }
        }
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = repo.find_tree(tree_id)?;

        let parent = match repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => None,
            Err(e) => return Err(Error::Git(e)),
        };

        let unchanged = match &parent {
            Some(parent) => {
                let diff = repo.diff_tree_to_tree(Some(&parent.tree()?), Some(&tree), None)?;
                diff.deltas().count() == 0
            }
            None => tree.len() == 0,
        };
        if unchanged {
            debug!(message, "publish is a no-op, nothing staged");
            return Ok(PublishOutcome { commit_id: None });
        }

        let signature = Signature::now(author, &format!("{author}@pdm.local"))?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)?;

        self.push(repo).map_err(Error::Git)?;
        info!(commit = %oid, message, "published");

        Ok(PublishOutcome {
            commit_id: Some(oid.to_string()),
        })
    }

    fn push(&self, repo: &Repository) -> std::result::Result<(), git2::Error> {
        let mut remote = repo.find_remote("origin")?;

        // Ref-update rejections arrive through the callback, not the
        // push() return value.
        let rejection: Arc<StdMutex<Option<String>>> = Arc::new(StdMutex::new(None));
        let mut callbacks = self.callbacks();
        {
            let rejection = Arc::clone(&rejection);
            callbacks.push_update_reference(move |refname, status| {
                if let Some(message) = status {
                    if let Ok(mut slot) = rejection.lock() {
                        *slot = Some(format!("{refname}: {message}"));
                    }
                }
                Ok(())
            });
        }

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}", branch = self.branch);
        remote.push(&[refspec.as_str()], Some(&mut options))?;

        let rejected = rejection.lock().ok().and_then(|mut slot| slot.take());
        match rejected {
            Some(message) => Err(git2::Error::from_str(&message)),
            None => Ok(()),
        }
    }

    fn resync(&self, repo: &Repository) -> Result<()> {
        let mut remote = repo.find_remote("origin")?;
        let mut options = FetchOptions::new();
        options.remote_callbacks(self.callbacks());
        // Explicit refspec so the remote-tracking ref moves even when the
        // fetch bypasses the configured refspecs.
        let refspec = format!(
            "+refs/heads/{branch}:refs/remotes/origin/{branch}",
            branch = self.branch
        );
        remote.fetch(&[refspec.as_str()], Some(&mut options), None)?;

        let target = repo.revparse_single(&format!("refs/remotes/origin/{}", self.branch))?;
        repo.reset(&target, ResetType::Hard, None)?;
        debug!(commit = %target.id(), "working copy reset to remote state");
        Ok(())
    }

    /// Fetch the remote and hard-reset the working copy to it.
    pub fn pull_latest(&self) -> Result<()> {
        let _guard = self.mutex.acquire()?;
        self.resync(&self.repo()?)
    }

    // =========================================================================
    // Check-in orchestration
    // =========================================================================

    /// Write new content, bump the side-car revision, and publish both in
    /// one commit so readers never observe content and revision apart.
    pub fn checkin(
        &self,
        rel_path: &str,
        content: &[u8],
        message: &str,
        kind: RevisionKind,
        author: &str,
        explicit_major: Option<&str>,
    ) -> Result<Revision> {
        validate::validate_content_signature(rel_path, content)?;

        let _guard = self.mutex.acquire()?;

        let mut meta = self.load_meta(rel_path)?;
        let next = revision::increment(Some(&meta.revision), kind, explicit_major);

        self.write_file(rel_path, content)?;

        meta.revision = next.to_string();
        meta.author = author.to_string();
        if meta.created_at.is_none() {
            meta.created_at = Some(Utc::now());
        }
        let meta_rel = artifact::meta_path(rel_path);
        self.write_file(&meta_rel, &serde_json::to_vec_pretty(&meta)?)?;

        let full_message = format!("REV {next}: {message}");
        self.publish_locked(&[rel_path.to_string(), meta_rel], &full_message, author)?;

        Ok(next)
    }

    /// Remove an artifact and its side-car record in one deletion commit.
    pub fn delete_artifact_and_metadata(
        &self,
        rel_path: &str,
        author: &str,
    ) -> Result<PublishOutcome> {
        let _guard = self.mutex.acquire()?;

        let meta_rel = artifact::meta_path(rel_path);
        for rel in [rel_path, meta_rel.as_str()] {
            match fs::remove_file(self.abs(rel)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(Error::Io(e)),
            }
        }

        self.publish_locked(
            &[rel_path.to_string(), meta_rel],
            &format!("DELETE: {rel_path} by {author}"),
            author,
        )
    }

    /// Discard local modifications to an artifact and its metadata,
    /// restoring the committed state (a downloaded LFS payload reverts to
    /// its pointer).
    pub fn revert_local_changes(&self, rel_path: &str) -> Result<()> {
        let _guard = self.mutex.acquire()?;
        let repo = self.repo()?;

        let meta_rel = artifact::meta_path(rel_path);
        let mut checkout = CheckoutBuilder::new();
        checkout.force();
        checkout.path(rel_path);
        checkout.path(meta_rel.as_str());
        repo.checkout_head(Some(&mut checkout))?;
        Ok(())
    }

    // =========================================================================
    // Large objects
    // =========================================================================

    pub fn is_pointer(&self, rel_path: &str) -> Result<bool> {
        lfs::is_pointer(&self.abs(rel_path))
    }

    /// Materialize and return full content for an artifact, pulling it
    /// from LFS when only the pointer is present.
    pub fn download_content(&self, rel_path: &str) -> Result<Vec<u8>> {
        let abs = self.abs(rel_path);
        if !abs.exists() {
            return Err(Error::NotFound(rel_path.to_string()));
        }

        if lfs::is_pointer(&abs)? {
            let _guard = self.mutex.acquire()?;
            lfs::pull_file(&self.work_dir, rel_path, self.allow_insecure)?;
        }

        self.get_content(rel_path)
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Raw content of an artifact as of an arbitrary historical commit.
    pub fn content_at_commit(&self, rel_path: &str, commit_hash: &str) -> Result<Vec<u8>> {
        let repo = self.repo()?;

        let oid = Oid::from_str(commit_hash)
            .map_err(|_| Error::NotFound(format!("commit {commit_hash}")))?;
        let commit = repo
            .find_commit(oid)
            .map_err(|_| Error::NotFound(format!("commit {commit_hash}")))?;

        let entry = commit
            .tree()?
            .get_path(Path::new(rel_path))
            .map_err(|_| Error::NotFound(format!("{rel_path} at {commit_hash}")))?;
        let blob = repo.find_blob(entry.id())?;
        Ok(blob.content().to_vec())
    }

    /// Commits touching the artifact or its side-car metadata, newest
    /// first, each paired with the revision recorded at that point.
    pub fn file_history(&self, rel_path: &str, limit: usize) -> Result<Vec<HistoryEntry>> {
        let repo = self.repo()?;
        let meta_rel = artifact::meta_path(rel_path);

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut entries = Vec::new();
        for oid in revwalk {
            if entries.len() >= limit {
                break;
            }
            let oid = oid?;
            let commit = repo.find_commit(oid)?;

            if !commit_touches(&commit, &[rel_path, meta_rel.as_str()])? {
                continue;
            }

            entries.push(HistoryEntry {
                commit_id: oid.to_string(),
                author: commit.author().name().unwrap_or("unknown").to_string(),
                timestamp: commit_time(&commit),
                message: commit.summary().unwrap_or_default().to_string(),
                revision: recorded_revision(&repo, &commit, &meta_rel),
            });
        }

        Ok(entries)
    }

    /// The most recent commits on the tracked branch, for activity feeds.
    pub fn recent_commits(&self, limit: usize) -> Result<Vec<CommitInfo>> {
        let repo = self.repo()?;

        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk.take(limit) {
            let oid = oid?;
            let commit = repo.find_commit(oid)?;

            let parent_tree = commit.parent(0).and_then(|p| p.tree()).ok();
            let diff =
                repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&commit.tree()?), None)?;
            let files = diff
                .deltas()
                .filter_map(|delta| delta.new_file().path().map(|p| p.display().to_string()))
                .collect();

            commits.push(CommitInfo {
                commit_id: oid.to_string(),
                author: commit.author().name().unwrap_or("unknown").to_string(),
                timestamp: commit_time(&commit),
                message: commit.summary().unwrap_or_default().to_string(),
                files,
            });
        }

        Ok(commits)
    }

    // =========================================================================
    // Listing and links
    // =========================================================================

    /// All tracked artifacts with metadata, checkout state, and link
    /// resolution. Dangling links are skipped, not surfaced as errors.
    pub fn list_files(&self, registry: &CheckoutRegistry) -> Result<Vec<ArtifactEntry>> {
        let repo = self.repo()?;
        let index = repo.index()?;

        let mut entries = Vec::new();
        for tracked in index.iter() {
            let rel = String::from_utf8_lossy(&tracked.path).into_owned();
            if artifact::is_internal(&rel) {
                continue;
            }
            if !self
                .allowed_extensions
                .iter()
                .any(|ext| rel.ends_with(ext.as_str()))
            {
                continue;
            }

            if artifact::is_link(&rel) {
                if let Some(entry) = self.link_entry(&rel, registry)? {
                    entries.push(entry);
                }
            } else {
                entries.push(self.artifact_entry(&rel, registry)?);
            }
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    /// Create a named alias for an existing master artifact. The master
    /// must exist now; link resolution tolerates it disappearing later.
    pub fn create_link(&self, link_name: &str, master_rel: &str, author: &str) -> Result<String> {
        validate::validate_link_name(link_name)?;

        let _guard = self.mutex.acquire()?;

        if !self.abs(master_rel).exists() {
            return Err(Error::NotFound(format!("master artifact {master_rel}")));
        }

        let rel = format!("{link_name}.{}", artifact::LINK_EXT);
        if self.abs(&rel).exists() {
            return Err(Error::InvalidArgument(format!(
                "link {link_name} already exists"
            )));
        }

        let body = serde_json::to_vec_pretty(&LinkTarget {
            master: master_rel.to_string(),
        })?;
        self.write_file(&rel, &body)?;
        self.publish_locked(
            &[rel.clone()],
            &format!("LINK: {link_name} -> {master_rel} by {author}"),
            author,
        )?;

        Ok(rel)
    }

    /// Extensions accepted for uploads and check-ins.
    pub fn allowed_extensions(&self) -> &[String] {
        &self.allowed_extensions
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.work_dir)?)
    }

    fn abs(&self, rel_path: &str) -> PathBuf {
        self.work_dir.join(rel_path)
    }

    fn write_file(&self, rel_path: &str, content: &[u8]) -> Result<()> {
        fsio::write_atomic(self.abs(rel_path), content)
    }

    fn callbacks(&self) -> RemoteCallbacks<'static> {
        let mut callbacks = RemoteCallbacks::new();

        let token = self.token.clone();
        callbacks.credentials(move |_url, username, _allowed| match &token {
            Some(token) => Cred::userpass_plaintext(username.unwrap_or("oauth2"), token),
            None => Cred::default(),
        });

        if self.allow_insecure {
            callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
        }

        callbacks
    }

    fn artifact_entry(&self, rel: &str, registry: &CheckoutRegistry) -> Result<ArtifactEntry> {
        let abs = self.abs(rel);
        let fs_meta = fs::metadata(&abs).ok();
        let size = fs_meta.as_ref().map(|m| m.len()).unwrap_or(0);
        let modified_at = fs_meta
            .and_then(|m| m.modified().ok())
            .map(DateTime::<Utc>::from);

        let side_car = if self.abs(&artifact::meta_path(rel)).exists() {
            Some(self.load_meta(rel)?)
        } else {
            None
        };
        let checkout = registry.get(rel)?;

        let filename = basename(rel);
        let stem = Path::new(&filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        Ok(ArtifactEntry {
            filename,
            path: rel.to_string(),
            size,
            modified_at,
            is_pointer: lfs::is_pointer(&abs).unwrap_or(false),
            is_link: false,
            master: None,
            description: side_car
                .as_ref()
                .map(|m| m.description.clone())
                .filter(|d| !d.is_empty()),
            revision: side_car.map(|m| m.revision),
            locked_by: checkout.as_ref().map(|c| c.user.clone()),
            locked_at: checkout.map(|c| c.locked_at),
            group: artifact::group_of(&stem),
            subgroup: artifact::subgroup_of(&stem),
        })
    }

    fn link_entry(&self, rel: &str, registry: &CheckoutRegistry) -> Result<Option<ArtifactEntry>> {
        let raw = match fs::read(self.abs(rel)) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(link = rel, %err, "unreadable link skipped");
                return Ok(None);
            }
        };
        let target: LinkTarget = match serde_json::from_slice(&raw) {
            Ok(target) => target,
            Err(err) => {
                warn!(link = rel, %err, "unparseable link skipped");
                return Ok(None);
            }
        };

        if !self.abs(&target.master).exists() {
            warn!(link = rel, master = %target.master, "dangling link skipped");
            return Ok(None);
        }

        // The link borrows everything but its name from its master.
        let mut entry = self.artifact_entry(&target.master, registry)?;
        let stem = Path::new(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();

        entry.filename = basename(rel);
        entry.path = rel.to_string();
        entry.is_link = true;
        entry.master = Some(target.master);
        entry.group = artifact::group_of(&stem);
        entry.subgroup = artifact::subgroup_of(&stem);

        Ok(Some(entry))
    }
}

fn marker_path(work_dir: &Path) -> PathBuf {
    let name = work_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "repo".to_string());
    work_dir.with_file_name(format!("{name}.repo.lock"))
}

fn basename(rel: &str) -> String {
    Path::new(rel)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(rel)
        .to_string()
}

/// Whether the commit changed any of the given paths relative to its first
/// parent. The root commit touches whatever it introduces.
fn commit_touches(commit: &git2::Commit, paths: &[&str]) -> Result<bool> {
    let tree = commit.tree()?;
    let parent_tree = match commit.parent(0) {
        Ok(parent) => Some(parent.tree()?),
        Err(_) => None,
    };

    for rel in paths {
        let now = tree.get_path(Path::new(rel)).ok().map(|e| e.id());
        let before = parent_tree
            .as_ref()
            .and_then(|t| t.get_path(Path::new(rel)).ok().map(|e| e.id()));
        if now != before {
            return Ok(true);
        }
    }
    Ok(false)
}

fn recorded_revision(repo: &Repository, commit: &git2::Commit, meta_rel: &str) -> Option<String> {
    let entry = commit.tree().ok()?.get_path(Path::new(meta_rel)).ok()?;
    let blob = repo.find_blob(entry.id()).ok()?;
    let meta: ArtifactMeta = serde_json::from_slice(blob.content()).ok()?;
    Some(meta.revision)
}

fn commit_time(commit: &git2::Commit) -> DateTime<Utc> {
    Utc.timestamp_opt(commit.time().seconds(), 0)
        .single()
        .unwrap_or_else(Utc::now)
}
