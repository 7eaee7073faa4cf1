//! Batch callback assembly for the order store.
//!
//! After a dispatch run the full outcome set is posted back to the
//! store's `jtCallback` action for audit/history, independent of the
//! per-order status updates. The payload is signed with HMAC-SHA256
//! keyed on the admin secret so the store can authenticate the
//! reporter.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use waybill_types::{
    BookedOrder, BookingReport, BookingResults, DispatchSummary, FailedOrder, UnconfirmedOrder,
};

type HmacSha256 = Hmac<Sha256>;

/// Build the callback report for a finished run, signing it when a
/// secret is configured.
pub fn build_report(summary: &DispatchSummary, secret: Option<&str>) -> BookingReport {
    let results = BookingResults {
        success: summary
            .succeeded()
            .into_iter()
            .map(|(order_id, tracking_number)| BookedOrder {
                order_id: order_id.to_string(),
                tracking_number: tracking_number.to_string(),
            })
            .collect(),
        failed: summary
            .failed()
            .into_iter()
            .map(|(order_id, error)| FailedOrder {
                order_id: order_id.to_string(),
                error: error.to_string(),
            })
            .collect(),
        indeterminate: summary
            .indeterminate()
            .into_iter()
            .map(|(order_id, detail)| UnconfirmedOrder {
                order_id: order_id.to_string(),
                detail: detail.to_string(),
            })
            .collect(),
        total: summary.total(),
    };

    let timestamp = summary.finished_at;
    let signature = secret.map(|secret| signature(secret, &results, timestamp));

    BookingReport {
        results,
        timestamp,
        signature,
    }
}

/// Hex HMAC-SHA256 over the canonical JSON of the results and the
/// timestamp.
pub fn signature(secret: &str, results: &BookingResults, timestamp: DateTime<Utc>) -> String {
    let canonical = json!({
        "results": results,
        "timestamp": timestamp,
    })
    .to_string();

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(canonical.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a report's signature. Reports without a signature never
/// verify.
pub fn verify(secret: &str, report: &BookingReport) -> bool {
    match &report.signature {
        Some(sig) => *sig == signature(secret, &report.results, report.timestamp),
        None => false,
    }
}
