//! Dispatch summary persistence and operator-facing rendering.
//!
//! The summary of every run is written to the state directory as
//! `summary.json` (next to the event log), rendered as text for the
//! CLI, and exportable as the admin CSV.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use waybill_types::{DispatchSummary, Order};

/// Default summary file name.
pub const SUMMARY_FILE: &str = "summary.json";

/// Get the summary file path for a state directory.
pub fn summary_path(state_dir: &Path) -> PathBuf {
    state_dir.join(SUMMARY_FILE)
}

/// Short content hash identifying a dispatch run: first 12 hex chars of
/// SHA-256 over the start timestamp and the attempted order ids.
pub fn run_id(started_at: DateTime<Utc>, order_ids: &[&str]) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(started_at.to_rfc3339().as_bytes());
    for id in order_ids {
        hasher.update(b"\n");
        hasher.update(id.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..12].to_string()
}

/// Persist the summary of a finished run.
pub fn write_summary(state_dir: &Path, summary: &DispatchSummary) -> Result<()> {
    fs::create_dir_all(state_dir)
        .with_context(|| format!("failed to create state dir {}", state_dir.display()))?;
    let path = summary_path(state_dir);
    let json = serde_json::to_string_pretty(summary).context("failed to serialize summary")?;
    fs::write(&path, json)
        .with_context(|| format!("failed to write summary file {}", path.display()))?;
    Ok(())
}

/// Load the most recent persisted summary, if any.
pub fn load_summary(state_dir: &Path) -> Result<Option<DispatchSummary>> {
    let path = summary_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read summary file {}", path.display()))?;
    let summary = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse summary file {}", path.display()))?;
    Ok(Some(summary))
}

/// Render a summary as the text block printed after a dispatch run.
pub fn render_summary(summary: &DispatchSummary) -> String {
    let counts = summary.counts();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "run {}: {} order(s) attempted",
        summary.run_id,
        summary.total()
    );
    let _ = writeln!(out, "  booked:        {}", counts.succeeded);
    let _ = writeln!(out, "  failed:        {}", counts.failed);
    let _ = writeln!(out, "  indeterminate: {}", counts.indeterminate);

    let booked = summary.succeeded();
    if !booked.is_empty() {
        let _ = writeln!(out, "\nbooked:");
        for (order_id, tracking) in booked {
            let _ = writeln!(out, "  {order_id}: {tracking}");
        }
    }

    let failed = summary.failed();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nfailed:");
        for (order_id, reason) in failed {
            let _ = writeln!(out, "  {order_id}: {reason}");
        }
    }

    let indeterminate = summary.indeterminate();
    if !indeterminate.is_empty() {
        let _ = writeln!(out, "\nindeterminate (verify with the courier before re-dispatching):");
        for (order_id, detail) in indeterminate {
            let _ = writeln!(out, "  {order_id}: {detail}");
        }
    }

    out
}

/// Render orders as the admin export CSV.
///
/// Column set matches the dashboard download: amount is the unit price
/// times quantity.
pub fn orders_csv(orders: &[Order]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Order ID,Tracking Number,Customer,Product,Quantity,Amount,Payment Status,Shipping Status,Date"
    );
    for order in orders {
        let fields = [
            order.order_id.clone(),
            order.tracking_number.clone().unwrap_or_default(),
            order.customer_name.clone(),
            order.product_name.clone(),
            order.quantity.to_string(),
            format!("₱{}", order.amount()),
            order.payment_status.to_string(),
            order.shipping_status.to_string(),
            order.date.clone(),
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_escape(f)).collect();
        let _ = writeln!(out, "{}", line.join(","));
    }
    out
}

fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
