//! pdm checkin: publish modified content and release the lock.

use std::path::Path;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::output::emit_success;
use crate::revision::RevisionKind;
use crate::validate;

use super::{resolve_path, CliContext};

#[derive(Serialize)]
struct CheckinReport {
    filename: String,
    path: String,
    revision: String,
}

pub fn run(
    ctx: &CliContext,
    filename: &str,
    message: &str,
    content_file: Option<&Path>,
    rev: &str,
    explicit_major: Option<&str>,
) -> Result<()> {
    validate::validate_artifact_name(filename, &ctx.config.store.allowed_extensions)?;

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

    let content = match content_file {
        Some(file) => std::fs::read(file)?,
        None => ctx.store.get_content(&path)?,
    };

    let revision = ctx.store.checkin(
        &path,
        &content,
        message,
        RevisionKind::from_request(rev),
        &ctx.user,
        explicit_major,
    )?;

    // Content landed; the lock record follows in its own commit. A failed
    // unlock publish leaves the lock visible, which is recoverable by
    // retrying cancel or an admin unlock.
    registry.release(&path)?;
    ctx.store.commit_and_push(
        &[registry.record_rel_path(&path)],
        &format!("UNLOCK: {filename} after check-in by {}", ctx.user),
        &ctx.user,
    )?;

    let report = CheckinReport {
        filename: filename.to_string(),
        path,
        revision: revision.to_string(),
    };
    emit_success(
        ctx.output,
        "checkin",
        &report,
        &[format!("{filename} checked in at revision {revision}")],
    )
}
