//! pdm - Check-out/check-in coordination for binary CAD artifacts
//!
//! This library serializes edits to binary artifacts across many users
//! by composing three services over one Git + LFS working copy:
//!
//! - **RepoMutex**: a cross-process marker-file lock that serializes every
//!   mutation of the working copy, with stale-holder recovery
//! - **CheckoutRegistry**: advisory exclusive locks, one persisted record
//!   per artifact path, independent of the Git backend's own state
//! - **VersionedStore**: working-copy lifecycle (clone/repair), atomic
//!   commit-and-push publication, MAJOR.MINOR revision bookkeeping, and
//!   on-demand retrieval of LFS payloads
//!
//! # Module Organization
//!
//! - `cli`: command-line interface using clap
//! - `config`: configuration loading from `pdm.toml`
//! - `error`: error types and result aliases
//! - `repo_lock`: cross-process repository mutex
//! - `checkout`: per-artifact checkout registry
//! - `store`: versioned store over the working copy
//! - `repair`: working-copy teardown for corrupted clones
//! - `lfs`: LFS pointer detection and single-path pulls
//! - `revision`: MAJOR.MINOR revision arithmetic
//! - `artifact`: artifact, metadata, and link data model
//! - `validate`: naming and content-signature policy
//! - `fsio`: atomic file operations and flock helpers

pub mod artifact;
pub mod checkout;
pub mod cli;
pub mod config;
pub mod error;
pub mod fsio;
pub mod lfs;
pub mod output;
pub mod repair;
pub mod repo_lock;
pub mod revision;
pub mod store;
pub mod validate;

pub use error::{Error, Result};
