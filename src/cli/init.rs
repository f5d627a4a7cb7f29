//! pdm init: write configuration and bring up the working copy.

use std::path::Path;

use serde::Serialize;

use crate::config::Config;
use crate::error::Result;
use crate::output::{emit_success, OutputOptions};
use crate::store::VersionedStore;

pub struct InitOptions {
    pub url: String,
    pub project: String,
    pub token: Option<String>,
    pub branch: String,
    pub work_dir: Option<std::path::PathBuf>,
    pub insecure: bool,
}

#[derive(Serialize)]
struct InitReport {
    config: String,
    work_dir: String,
    branch: String,
}

pub fn run(config_path: Option<&Path>, output: OutputOptions, options: InitOptions) -> Result<()> {
    let mut config = Config::default();
    config.remote.base_url = options.url;
    config.remote.project = options.project;
    config.remote.token = options.token;
    config.remote.branch = options.branch;
    config.remote.allow_insecure_ssl = options.insecure;
    config.store.work_dir = options.work_dir;

    let path = match config_path {
        Some(path) => path.to_path_buf(),
        None => super::default_config_path()?,
    };
    config.save(&path)?;

    // Clone now so the first real command does not pay for it.
    let store = VersionedStore::open(&config)?;

    let report = InitReport {
        config: path.display().to_string(),
        work_dir: store.work_dir().display().to_string(),
        branch: store.branch().to_string(),
    };

    emit_success(
        output,
        "init",
        &report,
        &[
            format!("Configuration written to {}", report.config),
            format!("Working copy ready at {}", report.work_dir),
        ],
    )
}
