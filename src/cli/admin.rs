//! pdm admin: override operations that bypass the holder check.

use serde::Serialize;

use crate::error::Result;
use crate::output::emit_success;

use super::{resolve_path, CliContext};

#[derive(Serialize)]
struct AdminReport {
    filename: String,
    path: String,
    admin: String,
}

pub fn run_unlock(ctx: &CliContext, filename: &str) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let registry = ctx.store.registry();

    registry.release(&path)?;
    ctx.store.commit_and_push(
        &[registry.record_rel_path(&path)],
        &format!("ADMIN OVERRIDE: Unlock {filename} by {}", ctx.user),
        &ctx.user,
    )?;

    let report = AdminReport {
        filename: filename.to_string(),
        path,
        admin: ctx.user.clone(),
    };
    emit_success(
        ctx.output,
        "admin unlock",
        &report,
        &[format!("Lock on {filename} force-released")],
    )
}

pub fn run_delete(ctx: &CliContext, filename: &str) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let registry = ctx.store.registry();

    // Any dangling lock goes with the artifact; the record publish is a
    // no-op when no record was tracked.
    registry.release(&path)?;
    ctx.store.delete_artifact_and_metadata(&path, &ctx.user)?;
    ctx.store.commit_and_push(
        &[registry.record_rel_path(&path)],
        &format!("ADMIN DELETE: Unlock {filename} by {}", ctx.user),
        &ctx.user,
    )?;

    let report = AdminReport {
        filename: filename.to_string(),
        path,
        admin: ctx.user.clone(),
    };
    emit_success(
        ctx.output,
        "admin delete",
        &report,
        &[format!("{filename} deleted")],
    )
}

#[derive(Serialize)]
struct ActivityReport {
    activities: Vec<crate::store::CommitInfo>,
}

pub fn run_activity(ctx: &CliContext, limit: usize) -> Result<()> {
    let activities = ctx.store.recent_commits(limit)?;

    let mut lines = Vec::new();
    for commit in &activities {
        lines.push(format!(
            "{}  {:<12}  {}",
            &commit.commit_id[..12.min(commit.commit_id.len())],
            commit.author,
            commit.message
        ));
    }
    if lines.is_empty() {
        lines.push("No activity.".to_string());
    }

    emit_success(
        ctx.output,
        "admin activity",
        &ActivityReport { activities },
        &lines,
    )
}
