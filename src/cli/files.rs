//! pdm files / history / download / link: read-side commands.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::output::emit_success;

use super::{resolve_path, CliContext};

#[derive(Serialize)]
struct FilesReport {
    files: Vec<crate::artifact::ArtifactEntry>,
    total: usize,
}

pub fn run_files(ctx: &CliContext, refresh: bool) -> Result<()> {
    if refresh {
        ctx.store.pull_latest()?;
    }

    let registry = ctx.store.registry();
    let files = ctx.store.list_files(&registry)?;
    let total = files.len();

    let mut lines = Vec::new();
    if files.is_empty() {
        lines.push("No tracked artifacts.".to_string());
    } else {
        for entry in &files {
            let lock = entry
                .locked_by
                .as_deref()
                .map(|user| format!(" [locked by {user}]"))
                .unwrap_or_default();
            let revision = entry.revision.as_deref().unwrap_or("-");
            let kind = if entry.is_link { "link -> " } else { "" };
            let master = entry.master.as_deref().unwrap_or_default();
            lines.push(format!(
                "{:<24} rev {:<7} {}{}{}",
                entry.filename, revision, kind, master, lock
            ));
        }
    }

    emit_success(ctx.output, "files", &FilesReport { files, total }, &lines)
}

#[derive(Serialize)]
struct HistoryReport {
    filename: String,
    history: Vec<crate::store::HistoryEntry>,
}

pub fn run_history(ctx: &CliContext, filename: &str, limit: usize) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let history = ctx.store.file_history(&path, limit)?;

    let mut lines = Vec::new();
    for entry in &history {
        lines.push(format!(
            "{}  {:<7}  {:<12}  {}",
            &entry.commit_id[..12.min(entry.commit_id.len())],
            entry.revision.as_deref().unwrap_or("-"),
            entry.author,
            entry.message
        ));
    }
    if lines.is_empty() {
        lines.push(format!("No history for {filename}."));
    }

    emit_success(
        ctx.output,
        "history",
        &HistoryReport {
            filename: filename.to_string(),
            history,
        },
        &lines,
    )
}

#[derive(Serialize)]
struct DownloadReport {
    filename: String,
    out: String,
    bytes: usize,
}

pub fn run_download(ctx: &CliContext, filename: &str, out: Option<&Path>) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let content = ctx.store.download_content(&path)?;

    let destination = out
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default().join(filename));

    let mut file = std::fs::File::create(&destination)?;
    file.write_all(&content)?;

    let report = DownloadReport {
        filename: filename.to_string(),
        out: destination.display().to_string(),
        bytes: content.len(),
    };
    emit_success(
        ctx.output,
        "download",
        &report,
        &[format!("{} bytes written to {}", report.bytes, report.out)],
    )
}

#[derive(Serialize)]
struct LinkReport {
    link: String,
    master: String,
}

pub fn run_link(ctx: &CliContext, name: &str, master: &str) -> Result<()> {
    let master_path = resolve_path(ctx, master)?;
    let link = ctx.store.create_link(name, &master_path, &ctx.user)?;

    let report = LinkReport {
        link,
        master: master_path,
    };
    emit_success(
        ctx.output,
        "link",
        &report,
        &[format!("{} -> {}", report.link, report.master)],
    )
}
