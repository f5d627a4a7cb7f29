#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use git2::{IndexAddOption, Oid, Repository, Signature};
use pdm::config::Config;
use pdm::store::VersionedStore;
use tempfile::TempDir;

pub const SEED_MCAM: &str = "1234567.mcam";
pub const SEED_VNC: &str = "7654321_AB123.vnc";

/// Minimal valid `.mcam` payload: the HDF signature plus a tag.
pub fn mcam_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = b"\x89HDF\r\n\x1a\n".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}

/// A seeded bare "remote" plus a seed clone for simulating other writers.
pub struct TestEnv {
    root: TempDir,
    remote_path: PathBuf,
    seed_path: PathBuf,
}

impl TestEnv {
    pub fn new() -> Result<TestEnv> {
        let root = tempfile::tempdir()?;
        let remote_path = root.path().join("remote.git");
        let remote = Repository::init_bare(&remote_path)?;
        remote.set_head("refs/heads/main")?;

        let seed_path = root.path().join("seed");
        let seed = Repository::init(&seed_path)?;
        seed.set_head("refs/heads/main")?;
        set_identity(&seed)?;
        seed.remote("origin", &remote_path.display().to_string())?;
        drop(seed);

        let env = TestEnv {
            root,
            remote_path,
            seed_path,
        };

        env.write_seed_file(SEED_MCAM, &mcam_bytes("seed"))?;
        env.write_seed_file(SEED_VNC, b"vnc fixture")?;
        env.write_seed_file(
            "7654321_AB123.vnc.meta.json",
            br#"{"description":"Fixture part","revision":"2.3","author":"seed"}"#,
        )?;
        env.write_seed_file("1234567_ABC123.link", br#"{"master":"1234567.mcam"}"#)?;
        env.write_seed_file("9999999.link", br#"{"master":"gone.mcam"}"#)?;
        env.commit_and_push_seed("seed artifacts")?;

        Ok(env)
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn remote_path(&self) -> &Path {
        &self.remote_path
    }

    /// Configuration pointing a named working copy at the test remote.
    pub fn config(&self, name: &str) -> Config {
        let mut config = Config::default();
        config.remote.base_url = self.remote_path.display().to_string();
        config.store.work_dir = Some(self.root.path().join(name));
        config
    }

    pub fn store(&self, name: &str) -> VersionedStore {
        VersionedStore::open(&self.config(name)).expect("store should open")
    }

    pub fn write_seed_file(&self, rel: &str, contents: &[u8]) -> Result<()> {
        let path = self.seed_path.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Commit everything in the seed clone and push it to the remote.
    pub fn commit_and_push_seed(&self, message: &str) -> Result<Oid> {
        let seed = Repository::open(&self.seed_path)?;
        let mut index = seed.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = seed.find_tree(tree_id)?;
        let sig = Signature::now("seed", "seed@example.com")?;

        let parent = seed
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| seed.find_commit(oid).ok());

        let oid = match parent {
            Some(parent) => seed.commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?,
            None => seed.commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        let mut origin = seed.find_remote("origin")?;
        origin.push(&["refs/heads/main:refs/heads/main"], None)?;

        Ok(oid)
    }

    /// Advance the remote from a second writer, so any other clone's next
    /// push is no longer a fast-forward.
    pub fn diverge_remote(&self, rel: &str, contents: &[u8], message: &str) -> Result<Oid> {
        let seed = Repository::open(&self.seed_path)?;
        {
            let mut origin = seed.find_remote("origin")?;
            origin.fetch(&[] as &[&str], None, None)?;
        }
        let target = seed.revparse_single("refs/remotes/origin/main")?;
        seed.reset(&target, git2::ResetType::Hard, None)?;
        drop(target);
        drop(seed);

        self.write_seed_file(rel, contents)?;
        self.commit_and_push_seed(message)
    }

    pub fn remote_head(&self) -> Oid {
        let remote = Repository::open(&self.remote_path).unwrap();
        remote.refname_to_id("refs/heads/main").unwrap()
    }

    pub fn remote_head_message(&self) -> String {
        let remote = Repository::open(&self.remote_path).unwrap();
        let commit = remote.find_commit(self.remote_head()).unwrap();
        commit.message().unwrap_or_default().to_string()
    }

    /// All blob paths in the remote's head tree.
    pub fn remote_paths(&self) -> Vec<String> {
        let remote = Repository::open(&self.remote_path).unwrap();
        let commit = remote.find_commit(self.remote_head()).unwrap();
        let tree = commit.tree().unwrap();

        let mut paths = Vec::new();
        tree.walk(git2::TreeWalkMode::PreOrder, |prefix, entry| {
            if entry.kind() == Some(git2::ObjectType::Blob) {
                paths.push(format!("{}{}", prefix, entry.name().unwrap_or_default()));
            }
            git2::TreeWalkResult::Ok
        })
        .unwrap();
        paths
    }

    pub fn remote_blob(&self, rel: &str) -> Option<Vec<u8>> {
        let remote = Repository::open(&self.remote_path).ok()?;
        let commit = remote.find_commit(self.remote_head()).ok()?;
        let entry = commit.tree().ok()?.get_path(Path::new(rel)).ok()?;
        let blob = remote.find_blob(entry.id()).ok()?;
        Some(blob.content().to_vec())
    }
}

fn set_identity(repo: &Repository) -> Result<()> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "pdm-test")?;
    cfg.set_str("user.email", "pdm-test@example.com")?;
    Ok(())
}
