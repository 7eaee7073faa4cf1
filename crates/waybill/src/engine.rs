//! Core booking dispatch logic.
//!
//! A dispatch run converts an order selector into courier bookings,
//! strictly sequentially, one shared portal session, with per-order
//! failure isolation: nothing an individual order does can abort the
//! batch. The only fatal error is failing to fetch the orders in the
//! first place.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::Utc;

use waybill_portal::{
    PortalAdapter, PortalCredentials, SenderProfile, Session, ShipmentFields, SubmissionError,
    SubmitResult,
};
use waybill_retry::RetryPlan;
use waybill_store::{OrderStore, StoreError};
use waybill_types::{
    BookingPhase, DispatchRecord, DispatchSummary, Order, OrderFilter, OrderOutcome,
    OrderSelector, ShippingStatus, StatusUpdate,
};

use crate::callback;
use crate::events::{DispatchEvent, DispatchEventKind, EventLog, RUN_SCOPE, events_path};
use crate::report;

/// Operator-facing progress sink. The CLI backs this with stderr.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Knobs for one dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// Directory for the event log and the persisted summary.
    pub state_dir: PathBuf,
    /// Retry plan for store writes after a confirmed booking.
    pub store_update_retry: RetryPlan,
    /// Post the batch callback to the store after the run.
    pub send_callback: bool,
    /// Secret for signing the callback payload, when set.
    pub callback_secret: Option<String>,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".waybill"),
            store_update_retry: RetryPlan::default(),
            send_callback: true,
            callback_secret: None,
        }
    }
}

/// Holds the run's single portal session and guarantees it is released
/// on every exit path.
struct SessionGuard<'a> {
    portal: &'a dyn PortalAdapter,
    session: Option<Session>,
}

impl<'a> SessionGuard<'a> {
    fn new(portal: &'a dyn PortalAdapter) -> Self {
        Self {
            portal,
            session: None,
        }
    }

    /// The open session, authenticating first if there is none.
    fn ensure(&mut self, credentials: &PortalCredentials) -> Result<Session, String> {
        match &self.session {
            Some(session) => Ok(session.clone()),
            None => {
                let session = self
                    .portal
                    .authenticate(credentials)
                    .map_err(|err| format!("portal authentication failed: {err}"))?;
                self.session = Some(session.clone());
                Ok(session)
            }
        }
    }

    /// Drop the current session (after the portal reported it stale).
    fn invalidate(&mut self) {
        if let Some(session) = self.session.take() {
            self.portal.close(session);
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.invalidate();
    }
}

/// Run the booking dispatcher over the selected orders.
///
/// Returns the run's summary by value. Per-order failures are recorded
/// in the summary, never propagated; the returned `Err` is reserved
/// for setup failures (unreachable store, malformed order data) before
/// any booking is attempted.
pub fn run_dispatch(
    store: &dyn OrderStore,
    portal: &dyn PortalAdapter,
    credentials: &PortalCredentials,
    sender: &SenderProfile,
    selector: &OrderSelector,
    opts: &DispatchOptions,
    reporter: &mut dyn Reporter,
) -> Result<DispatchSummary> {
    reporter.info(&format!("fetching {selector} from the order store..."));
    let orders = resolve_selector(store, selector)
        .context("failed to fetch orders from the order store")?;

    let started_at = Utc::now();
    if orders.is_empty() {
        reporter.info("no orders to dispatch");
        return Ok(DispatchSummary {
            run_id: report::run_id(started_at, &[]),
            started_at,
            finished_at: Utc::now(),
            records: Vec::new(),
        });
    }

    let order_ids: Vec<&str> = orders.iter().map(|o| o.order_id.as_str()).collect();
    let run_id = report::run_id(started_at, &order_ids);
    reporter.info(&format!("run {run_id}: {} order(s) to dispatch", orders.len()));

    let events_file = events_path(&opts.state_dir);
    let mut log = EventLog::new();
    log.record(DispatchEvent::now(
        RUN_SCOPE,
        DispatchEventKind::RunStarted {
            run_id: run_id.clone(),
            selector: selector.to_string(),
            order_count: orders.len(),
        },
    ));
    flush_events(&mut log, &events_file, reporter);

    let mut guard = SessionGuard::new(portal);
    let mut records = Vec::with_capacity(orders.len());

    for order in &orders {
        reporter.info(&format!(
            "{}: booking for {} ({} x{})",
            order.order_id, order.customer_name, order.product_name, order.quantity
        ));

        let order_started = Utc::now();
        let clock = Instant::now();
        let (phase_reached, outcome) =
            book_order(order, sender, credentials, &mut guard, store, opts, reporter, &mut log);
        let duration_ms = clock.elapsed().as_millis() as u64;

        match &outcome {
            OrderOutcome::Confirmed { tracking_number } => {
                reporter.info(&format!("{}: booked, tracking {tracking_number}", order.order_id));
                log.record(DispatchEvent::now(
                    &order.order_id,
                    DispatchEventKind::OrderBooked {
                        tracking_number: tracking_number.clone(),
                        duration_ms,
                    },
                ));
            }
            OrderOutcome::Failed { reason } => {
                reporter.warn(&format!("{}: failed: {reason}", order.order_id));
                log.record(DispatchEvent::now(
                    &order.order_id,
                    DispatchEventKind::OrderFailed {
                        reason: reason.clone(),
                    },
                ));
            }
            OrderOutcome::Indeterminate { detail } => {
                reporter.warn(&format!(
                    "{}: indeterminate: {detail} (verify with the courier before re-dispatching)",
                    order.order_id
                ));
                log.record(DispatchEvent::now(
                    &order.order_id,
                    DispatchEventKind::OrderIndeterminate {
                        detail: detail.clone(),
                    },
                ));
            }
        }
        flush_events(&mut log, &events_file, reporter);

        records.push(DispatchRecord {
            order_id: order.order_id.clone(),
            customer_name: order.customer_name.clone(),
            phase_reached,
            outcome,
            started_at: order_started,
            finished_at: Utc::now(),
            duration_ms,
        });
    }

    // Release the portal session before reporting; the run is done
    // with the courier.
    drop(guard);

    let summary = DispatchSummary {
        run_id,
        started_at,
        finished_at: Utc::now(),
        records,
    };

    if let Err(err) = report::write_summary(&opts.state_dir, &summary) {
        reporter.warn(&format!("could not persist run summary: {err:#}"));
    }

    if opts.send_callback {
        let batch_report = callback::build_report(&summary, opts.callback_secret.as_deref());
        let accepted = match store.record_batch_result(&batch_report) {
            Ok(()) => true,
            Err(err) => {
                reporter.warn(&format!("batch callback was not recorded: {err}"));
                false
            }
        };
        log.record(DispatchEvent::now(
            RUN_SCOPE,
            DispatchEventKind::CallbackDelivered { accepted },
        ));
    }

    let counts = summary.counts();
    log.record(DispatchEvent::now(
        RUN_SCOPE,
        DispatchEventKind::RunFinished {
            succeeded: counts.succeeded,
            failed: counts.failed,
            indeterminate: counts.indeterminate,
        },
    ));
    flush_events(&mut log, &events_file, reporter);

    Ok(summary)
}

/// Resolve a selector into the concrete ordered sequence of orders to
/// attempt. Any store failure here is fatal to the run.
fn resolve_selector(
    store: &dyn OrderStore,
    selector: &OrderSelector,
) -> Result<Vec<Order>, StoreError> {
    match selector {
        OrderSelector::Single(order_id) => Ok(vec![store.get_order(order_id)?]),
        OrderSelector::Many(order_ids) => order_ids
            .iter()
            .map(|order_id| store.get_order(order_id))
            .collect(),
        OrderSelector::AllReadyToShip => store.list_orders(&OrderFilter::ready_to_ship()),
    }
}

/// Drive one order through the booking state machine. Every failure is
/// folded into the returned outcome; nothing escapes to the batch.
#[allow(clippy::too_many_arguments)]
fn book_order(
    order: &Order,
    sender: &SenderProfile,
    credentials: &PortalCredentials,
    guard: &mut SessionGuard<'_>,
    store: &dyn OrderStore,
    opts: &DispatchOptions,
    reporter: &mut dyn Reporter,
    log: &mut EventLog,
) -> (BookingPhase, OrderOutcome) {
    let mut phase = BookingPhase::Selected;

    // Eligibility guards: dispatch is only meaningful for ready-to-ship
    // orders, and a shipped order must never be re-submitted.
    match order.shipping_status {
        ShippingStatus::Shipped => {
            let tracking = order
                .tracking_number
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| format!(" (tracking {t})"))
                .unwrap_or_default();
            return (
                phase,
                OrderOutcome::Failed {
                    reason: format!("already shipped{tracking}: refusing to re-book"),
                },
            );
        }
        ShippingStatus::Pending => {
            return (
                phase,
                OrderOutcome::Failed {
                    reason: "not ready to ship (status Pending)".to_string(),
                },
            );
        }
        ShippingStatus::ReadyToShip => {}
    }

    phase = BookingPhase::Authenticating;
    log.record(DispatchEvent::now(
        &order.order_id,
        DispatchEventKind::PhaseEntered { phase },
    ));
    let session = match guard.ensure(credentials) {
        Ok(session) => session,
        Err(reason) => return (phase, OrderOutcome::Failed { reason }),
    };

    phase = BookingPhase::FormFilling;
    log.record(DispatchEvent::now(
        &order.order_id,
        DispatchEventKind::PhaseEntered { phase },
    ));
    let fields = ShipmentFields::from_order(order, sender);

    phase = BookingPhase::Submitting;
    log.record(DispatchEvent::now(
        &order.order_id,
        DispatchEventKind::PhaseEntered { phase },
    ));
    let submitted = submit_with_reauth(
        guard,
        session,
        credentials,
        &fields,
        &order.order_id,
        reporter,
        log,
    );

    let outcome = match submitted {
        Ok(SubmitResult::Booked { tracking_number }) => {
            let tracking_number = tracking_number.trim().to_string();
            if tracking_number.is_empty() {
                // A blank identifier is no identifier; success may not
                // be fabricated from it.
                OrderOutcome::Indeterminate {
                    detail: "portal returned an empty tracking identifier".to_string(),
                }
            } else {
                confirm_booking(order, &tracking_number, store, opts, reporter)
            }
        }
        Ok(SubmitResult::Unconfirmed { detail }) => OrderOutcome::Indeterminate { detail },
        Err(reason) => OrderOutcome::Failed { reason },
    };

    (phase, outcome)
}

/// Submit a shipment, allowing a single re-auth pass when the portal
/// reports the session stale.
fn submit_with_reauth(
    guard: &mut SessionGuard<'_>,
    session: Session,
    credentials: &PortalCredentials,
    fields: &ShipmentFields,
    order_id: &str,
    reporter: &mut dyn Reporter,
    log: &mut EventLog,
) -> Result<SubmitResult, String> {
    match guard.portal.submit_shipment(&session, fields) {
        Ok(result) => Ok(result),
        Err(SubmissionError::SessionExpired) => {
            reporter.warn(&format!("{order_id}: portal session expired; re-authenticating"));
            log.record(DispatchEvent::now(order_id, DispatchEventKind::SessionReauth));
            guard.invalidate();

            let session = guard
                .ensure(credentials)
                .map_err(|reason| format!("re-authentication after expired session: {reason}"))?;
            guard
                .portal
                .submit_shipment(&session, fields)
                .map_err(|err| format!("portal submission failed after re-auth: {err}"))
        }
        Err(err) => Err(format!("portal submission failed: {err}")),
    }
}

/// Write the confirmed booking back to the store, retrying transient
/// failures. The order only counts as succeeded once the store
/// reflects it.
fn confirm_booking(
    order: &Order,
    tracking_number: &str,
    store: &dyn OrderStore,
    opts: &DispatchOptions,
    reporter: &mut dyn Reporter,
) -> OrderOutcome {
    let update = StatusUpdate::shipped(tracking_number);
    let written = waybill_retry::run(
        &opts.store_update_retry,
        StoreError::is_transient,
        |attempt| {
            if attempt > 1 {
                reporter.warn(&format!(
                    "{}: retrying store update (attempt {attempt})",
                    order.order_id
                ));
            }
            store.update_order_status(&order.order_id, &update)
        },
    );

    match written {
        Ok(()) => OrderOutcome::Confirmed {
            tracking_number: tracking_number.to_string(),
        },
        Err(err) => OrderOutcome::Failed {
            reason: format!(
                "shipment booked (tracking {tracking_number}) but the store update failed: {err}"
            ),
        },
    }
}

fn flush_events(log: &mut EventLog, path: &std::path::Path, reporter: &mut dyn Reporter) {
    match log.write_to_file(path) {
        Ok(()) => log.clear(),
        Err(err) => reporter.warn(&format!("could not append audit events: {err:#}")),
    }
}

/// A reporter that swallows everything. Useful for library callers and
/// tests that only care about the summary.
#[derive(Debug, Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}
