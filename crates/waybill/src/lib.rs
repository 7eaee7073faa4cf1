//! # waybill
//!
//! Order lifecycle and courier booking dispatch for a small storefront
//! backed by a spreadsheet-style order store.
//!
//! An order moves through two independent status axes: payment
//! (`Pending` → `Paid`, flipped manually by the operator) and shipping
//! (`Pending` → `Ready to Ship` → `Shipped`). waybill owns the last
//! hop: it takes the set of ready-to-ship orders, books each one with
//! the courier portal, writes the tracking number back to the store,
//! and reports a batch summary, with every order isolated from its
//! neighbors' failures.
//!
//! ## Pipeline
//!
//! The core flow is **select → authenticate → fill → submit → report**:
//!
//! 1. [`engine::run_dispatch`] resolves the order selector against the
//!    store (a store failure here aborts the run before any booking).
//! 2. Each order is driven through the portal adapter sequentially,
//!    reusing one session, with a single re-auth pass when the portal
//!    reports a logged-out state.
//! 3. Confirmed bookings update the store (`Shipped` + tracking
//!    number); failures and unconfirmed submissions are recorded and
//!    never written back.
//! 4. The run's [`types::DispatchSummary`] is returned by value,
//!    persisted to the state directory, and posted to the store as a
//!    signed batch callback.
//!
//! ## Key types
//!
//! - `DispatchSummary` / `DispatchRecord` — the value of a run
//! - `OrderOutcome` — `Confirmed`, `Failed`, or `Indeterminate`
//! - `PortalAdapter` — the typed boundary over the courier portal
//! - `OrderStore` — the typed boundary over the order store
//! - `WaybillConfig` — `.waybill.toml` plus env-resolved secrets
//!
//! ## CLI usage
//!
//! For command-line usage, see the `waybill-cli` crate.

/// Batch callback assembly and HMAC signing.
pub mod callback;

/// Configuration file (`.waybill.toml`) loading and secret resolution.
pub mod config;

/// The booking dispatcher: selector resolution, per-order state
/// machine, summary assembly.
pub mod engine;

/// Append-only JSONL audit log for dispatch runs.
pub mod events;

/// Payment initiator: checkout redirect URLs and static QR references.
pub mod payment;

/// Summary persistence, text rendering, and CSV export.
pub mod report;

/// Storefront order placement: validation, creation, payment hand-off.
pub mod storefront;

/// Domain types.
/// Re-exported from the waybill-types microcrate.
pub use waybill_types as types;

/// Retry plans with backoff and jitter.
/// Re-exported from the waybill-retry microcrate.
pub use waybill_retry as retry;

/// Order store client contract.
/// Re-exported from the waybill-store microcrate.
pub use waybill_store as store;

/// Courier portal adapter contract.
/// Re-exported from the waybill-portal microcrate.
pub use waybill_portal as portal;

/// In-memory collaborator fakes shared by the test modules.
#[cfg(test)]
mod testutil;
