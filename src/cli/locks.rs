//! pdm locks: the checkout dashboard.

use serde::Serialize;

use crate::checkout::CheckoutEntry;
use crate::error::Result;
use crate::output::emit_success;

use super::CliContext;

#[derive(Serialize)]
struct LocksReport {
    checkouts: Vec<CheckoutEntry>,
    total: usize,
}

pub fn run(ctx: &CliContext) -> Result<()> {
    let registry = ctx.store.registry();
    let checkouts = registry.list()?;
    let total = checkouts.len();

    let mut lines = Vec::new();
    if checkouts.is_empty() {
        lines.push("No active checkouts.".to_string());
    } else {
        lines.push(format!("Active checkouts ({total}):"));
        for entry in &checkouts {
            let minutes = (entry.duration_seconds / 60.0).floor() as u64;
            let message = entry
                .checkout
                .message
                .as_deref()
                .map(|m| format!(" - {m}"))
                .unwrap_or_default();
            lines.push(format!(
                "  {:<32} {:<12} {minutes}m{message}",
                entry.checkout.path, entry.checkout.user
            ));
        }
    }

    emit_success(
        ctx.output,
        "locks",
        &LocksReport { checkouts, total },
        &lines,
    )
}
