//! pdm checkout / cancel: take and release artifact locks.

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::emit_success;

use super::{resolve_path, CliContext};

#[derive(Serialize)]
struct CheckoutReport {
    filename: String,
    path: String,
    user: String,
}

pub fn run_checkout(ctx: &CliContext, filename: &str, message: Option<String>) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let registry = ctx.store.registry();

    registry.create(&path, &ctx.user, message, false)?;

    // Publish the record so every peer's clone sees the lock. If the
    // publish cannot land, the local record is withdrawn: a lock only the
    // local host knows about is worse than no lock.
    let record = registry.record_rel_path(&path);
    if let Err(err) = ctx.store.commit_and_push(
        &[record],
        &format!("LOCK: {filename} by {}", ctx.user),
        &ctx.user,
    ) {
        registry.release(&path)?;
        return Err(err);
    }

    // Materialize content for editing when only the pointer is local.
    if ctx.store.is_pointer(&path)? {
        ctx.store.download_content(&path)?;
    }

    let report = CheckoutReport {
        filename: filename.to_string(),
        path: path.clone(),
        user: ctx.user.clone(),
    };
    emit_success(
        ctx.output,
        "checkout",
        &report,
        &[format!("{filename} checked out by {}", ctx.user)],
    )
}

pub fn run_cancel(ctx: &CliContext, filename: &str) -> Result<()> {
    let path = resolve_path(ctx, filename)?;
    let registry = ctx.store.registry();

    match registry.get(&path)? {
        Some(checkout) if checkout.user == ctx.user => {}
        _ => {
            return Err(Error::NotCheckedOut {
                path,
                user: ctx.user.clone(),
            });
        }
    }

    // Throw away local edits before the lock disappears.
    ctx.store.revert_local_changes(&path)?;
    registry.release(&path)?;

    ctx.store.commit_and_push(
        &[registry.record_rel_path(&path)],
        &format!("USER CANCEL: Unlock {filename} by {}", ctx.user),
        &ctx.user,
    )?;

    let report = CheckoutReport {
        filename: filename.to_string(),
        path,
        user: ctx.user.clone(),
    };
    emit_success(
        ctx.output,
        "cancel",
        &report,
        &[format!("Checkout of {filename} cancelled")],
    )
}
