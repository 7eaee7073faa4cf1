//! Core domain types for waybill.
//!
//! This crate provides the fundamental types used across the waybill
//! ecosystem: the product/order data model, the two independent status
//! axes, dispatch selectors, per-order booking outcomes, and the batch
//! report sent back to the order store.
//!
//! Wire formats follow the spreadsheet column headers exposed by the
//! order store (`OrderID`, `CustomerName`, ...), so every struct here
//! carries explicit serde renames rather than a blanket rename rule.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the customer chose to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Maya,
    Gcash,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Maya => write!(f, "maya"),
            PaymentMethod::Gcash => write!(f, "gcash"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maya" => Ok(PaymentMethod::Maya),
            "gcash" => Ok(PaymentMethod::Gcash),
            other => Err(format!("unknown payment method: {other}")),
        }
    }
}

/// Payment axis of an order. Independent of [`ShippingStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Paid => write!(f, "Paid"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// Shipping axis of an order. Independent of [`PaymentStatus`].
///
/// The wire value for `ReadyToShip` is the spreadsheet's literal
/// `"Ready to Ship"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShippingStatus {
    #[default]
    Pending,
    #[serde(rename = "Ready to Ship")]
    ReadyToShip,
    Shipped,
}

impl fmt::Display for ShippingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShippingStatus::Pending => write!(f, "Pending"),
            ShippingStatus::ReadyToShip => write!(f, "Ready to Ship"),
            ShippingStatus::Shipped => write!(f, "Shipped"),
        }
    }
}

impl FromStr for ShippingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', " ").as_str() {
            "pending" => Ok(ShippingStatus::Pending),
            "ready to ship" | "ready" => Ok(ShippingStatus::ReadyToShip),
            "shipped" => Ok(ShippingStatus::Shipped),
            other => Err(format!("unknown shipping status: {other}")),
        }
    }
}

/// A catalog product. Immutable except `stock`, which the order store
/// decrements on order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Price")]
    pub price: f64,
    #[serde(rename = "Stock")]
    pub stock: u32,
    #[serde(rename = "Size", default)]
    pub size: String,
    #[serde(rename = "Category", default)]
    pub category: String,
    #[serde(rename = "ImageURL", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A customer order as stored by the order store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(rename = "OrderID")]
    pub order_id: String,
    #[serde(rename = "ProductID")]
    pub product_id: String,
    #[serde(rename = "ProductName", default)]
    pub product_name: String,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
    #[serde(rename = "CustomerName")]
    pub customer_name: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "Contact", default)]
    pub contact: String,
    #[serde(rename = "Province", default)]
    pub province: String,
    #[serde(rename = "City", default)]
    pub city: String,
    #[serde(rename = "Barangay", default)]
    pub barangay: String,
    #[serde(rename = "AddressDetails", default)]
    pub address_details: String,
    #[serde(rename = "PackageSize", default)]
    pub package_size: String,
    #[serde(rename = "ItemCategory", default)]
    pub item_category: String,
    #[serde(rename = "PaymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(rename = "PaymentStatus", default)]
    pub payment_status: PaymentStatus,
    #[serde(rename = "ShippingStatus", default)]
    pub shipping_status: ShippingStatus,
    /// Absent until a booking is confirmed.
    #[serde(
        rename = "TrackingNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub tracking_number: Option<String>,
    /// Unit price captured at creation time.
    #[serde(rename = "Price", default)]
    pub price: f64,
    /// Creation date as formatted by the store.
    #[serde(rename = "Date", default)]
    pub date: String,
}

impl Order {
    /// Total amount for the order (unit price x quantity).
    pub fn amount(&self) -> f64 {
        self.price * f64::from(self.quantity)
    }
}

/// Fields submitted by the storefront to create an order.
///
/// Wire keys are the camelCase action parameters of the store's
/// `createOrder` action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub product_id: String,
    pub quantity: u32,
    pub customer_name: String,
    pub email: String,
    pub contact: String,
    pub province: String,
    pub city: String,
    pub barangay: String,
    pub address_details: String,
    pub package_size: String,
    pub item_category: String,
    pub payment_method: PaymentMethod,
}

/// Server-side filters for `getOrders`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub payment_status: Option<PaymentStatus>,
    pub shipping_status: Option<ShippingStatus>,
    pub search: Option<String>,
}

impl OrderFilter {
    /// Filter matching every order with ShippingStatus = Ready to Ship.
    pub fn ready_to_ship() -> Self {
        Self {
            shipping_status: Some(ShippingStatus::ReadyToShip),
            ..Self::default()
        }
    }
}

/// A partial status write for `updateOrderStatus`. Only the present
/// fields are touched by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdate {
    #[serde(rename = "PaymentStatus", skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(rename = "ShippingStatus", skip_serializing_if = "Option::is_none")]
    pub shipping_status: Option<ShippingStatus>,
    #[serde(rename = "TrackingNumber", skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
}

impl StatusUpdate {
    /// The write performed after a confirmed booking: mark shipped and
    /// attach the tracking number.
    pub fn shipped(tracking_number: impl Into<String>) -> Self {
        Self {
            shipping_status: Some(ShippingStatus::Shipped),
            tracking_number: Some(tracking_number.into()),
            ..Self::default()
        }
    }
}

/// Which orders a dispatch run should cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderSelector {
    /// A single order by id.
    Single(String),
    /// An explicit list of order ids, attempted in the given sequence.
    Many(Vec<String>),
    /// Every order with ShippingStatus = Ready to Ship.
    AllReadyToShip,
}

impl fmt::Display for OrderSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSelector::Single(id) => write!(f, "order {id}"),
            OrderSelector::Many(ids) => write!(f, "{} selected orders", ids.len()),
            OrderSelector::AllReadyToShip => write!(f, "all ready-to-ship orders"),
        }
    }
}

/// Per-order progress through a dispatch run. No backward transitions;
/// `Authenticating` may be re-entered at most once for a re-auth pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingPhase {
    Selected,
    Authenticating,
    FormFilling,
    Submitting,
}

impl fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingPhase::Selected => write!(f, "selected"),
            BookingPhase::Authenticating => write!(f, "authenticating"),
            BookingPhase::FormFilling => write!(f, "form-filling"),
            BookingPhase::Submitting => write!(f, "submitting"),
        }
    }
}

/// Terminal outcome of one order within a dispatch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OrderOutcome {
    /// Booking confirmed and the store updated; the tracking number is
    /// always non-empty.
    Confirmed { tracking_number: String },
    /// Booking did not happen (or could not be recorded); the order was
    /// left untouched in the store.
    Failed { reason: String },
    /// A submission went out but no tracking identifier could be
    /// confirmed. The booking may or may not exist on the courier side.
    Indeterminate { detail: String },
}

impl OrderOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, OrderOutcome::Confirmed { .. })
    }
}

/// One order's record in a dispatch summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub order_id: String,
    pub customer_name: String,
    /// Furthest phase reached before the terminal outcome.
    pub phase_reached: BookingPhase,
    #[serde(flatten)]
    pub outcome: OrderOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Counts per terminal outcome. `succeeded + failed + indeterminate`
/// always equals the number of attempted orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub indeterminate: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.indeterminate
    }
}

/// The value returned by a dispatch run. Threaded explicitly through
/// the call chain; there is no process-wide results state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchSummary {
    /// Short content hash identifying this run.
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Orders attempted, in dispatch sequence.
    pub records: Vec<DispatchRecord>,
}

impl DispatchSummary {
    pub fn total(&self) -> usize {
        self.records.len()
    }

    pub fn counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts {
            succeeded: 0,
            failed: 0,
            indeterminate: 0,
        };
        for r in &self.records {
            match r.outcome {
                OrderOutcome::Confirmed { .. } => counts.succeeded += 1,
                OrderOutcome::Failed { .. } => counts.failed += 1,
                OrderOutcome::Indeterminate { .. } => counts.indeterminate += 1,
            }
        }
        counts
    }

    /// `(order id, tracking number)` pairs for confirmed bookings.
    pub fn succeeded(&self) -> Vec<(&str, &str)> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                OrderOutcome::Confirmed { tracking_number } => {
                    Some((r.order_id.as_str(), tracking_number.as_str()))
                }
                _ => None,
            })
            .collect()
    }

    /// `(order id, reason)` pairs for failed orders.
    pub fn failed(&self) -> Vec<(&str, &str)> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                OrderOutcome::Failed { reason } => Some((r.order_id.as_str(), reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// `(order id, detail)` pairs for indeterminate orders.
    pub fn indeterminate(&self) -> Vec<(&str, &str)> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                OrderOutcome::Indeterminate { detail } => {
                    Some((r.order_id.as_str(), detail.as_str()))
                }
                _ => None,
            })
            .collect()
    }
}

/// A confirmed booking in the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedOrder {
    pub order_id: String,
    pub tracking_number: String,
}

/// A failed order in the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOrder {
    pub order_id: String,
    pub error: String,
}

/// An unconfirmed order in the batch report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnconfirmedOrder {
    pub order_id: String,
    pub detail: String,
}

/// Outcome lists as posted to the store's `jtCallback` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingResults {
    pub success: Vec<BookedOrder>,
    pub failed: Vec<FailedOrder>,
    #[serde(default)]
    pub indeterminate: Vec<UnconfirmedOrder>,
    pub total: usize,
}

/// The batch callback payload recorded by the store after a dispatch
/// run, independent of the per-order status updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReport {
    pub results: BookingResults,
    pub timestamp: DateTime<Utc>,
    /// Hex HMAC-SHA256 over the results, keyed with the admin secret.
    /// Absent when signing is disabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// An entry returned by the store's `getAddress` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressEntry {
    pub id: String,
    pub name: String,
}

/// Address hierarchy level for `getAddress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressLevel {
    Province,
    City,
    Barangay,
}

impl fmt::Display for AddressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressLevel::Province => write!(f, "province"),
            AddressLevel::City => write!(f, "city"),
            AddressLevel::Barangay => write!(f, "barangay"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_order() -> Order {
        Order {
            order_id: "ORD-1001".to_string(),
            product_id: "PROD-001".to_string(),
            product_name: "Canvas Tote".to_string(),
            quantity: 2,
            customer_name: "Juan Dela Cruz".to_string(),
            email: "juan@example.com".to_string(),
            contact: "09171234567".to_string(),
            province: "Laguna".to_string(),
            city: "Calamba".to_string(),
            barangay: "Real".to_string(),
            address_details: "123 Rizal St".to_string(),
            package_size: "Small".to_string(),
            item_category: "Apparel".to_string(),
            payment_method: PaymentMethod::Maya,
            payment_status: PaymentStatus::Pending,
            shipping_status: ShippingStatus::ReadyToShip,
            tracking_number: None,
            price: 299.0,
            date: "2026-07-21".to_string(),
        }
    }

    #[test]
    fn shipping_status_uses_sheet_wire_values() {
        let json = serde_json::to_string(&ShippingStatus::ReadyToShip).expect("serialize");
        assert_eq!(json, "\"Ready to Ship\"");

        let rt: ShippingStatus = serde_json::from_str("\"Shipped\"").expect("deserialize");
        assert_eq!(rt, ShippingStatus::Shipped);
    }

    #[test]
    fn order_roundtrips_with_sheet_column_headers() {
        let order = sample_order();
        let json = serde_json::to_string(&order).expect("serialize");
        assert!(json.contains("\"OrderID\":\"ORD-1001\""));
        assert!(json.contains("\"ShippingStatus\":\"Ready to Ship\""));
        // Absent tracking numbers are omitted entirely, not nulled.
        assert!(!json.contains("TrackingNumber"));

        let rt: Order = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(rt.order_id, order.order_id);
        assert_eq!(rt.shipping_status, ShippingStatus::ReadyToShip);
    }

    #[test]
    fn order_amount_multiplies_unit_price() {
        assert_eq!(sample_order().amount(), 598.0);
    }

    #[test]
    fn status_update_shipped_sets_both_fields() {
        let update = StatusUpdate::shipped("JT123456");
        let json = serde_json::to_string(&update).expect("serialize");
        assert_eq!(
            json,
            "{\"ShippingStatus\":\"Shipped\",\"TrackingNumber\":\"JT123456\"}"
        );
    }

    #[test]
    fn outcome_serializes_with_tagged_representation() {
        let outcome = OrderOutcome::Indeterminate {
            detail: "no tracking id on confirmation".to_string(),
        };
        let json = serde_json::to_string(&outcome).expect("serialize");
        assert!(json.contains("\"outcome\":\"indeterminate\""));

        let rt: OrderOutcome = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(rt, outcome);
    }

    #[test]
    fn summary_counts_partition_records() {
        let now = Utc::now();
        let record = |id: &str, outcome: OrderOutcome| DispatchRecord {
            order_id: id.to_string(),
            customer_name: "x".to_string(),
            phase_reached: BookingPhase::Submitting,
            outcome,
            started_at: now,
            finished_at: now,
            duration_ms: 0,
        };

        let summary = DispatchSummary {
            run_id: "abc123".to_string(),
            started_at: now,
            finished_at: now,
            records: vec![
                record(
                    "ORD-1",
                    OrderOutcome::Confirmed {
                        tracking_number: "JT1".to_string(),
                    },
                ),
                record(
                    "ORD-2",
                    OrderOutcome::Failed {
                        reason: "auth failed".to_string(),
                    },
                ),
                record(
                    "ORD-3",
                    OrderOutcome::Indeterminate {
                        detail: "unconfirmed".to_string(),
                    },
                ),
            ],
        };

        let counts = summary.counts();
        assert_eq!(counts.succeeded, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.indeterminate, 1);
        assert_eq!(counts.total(), summary.total());
        assert_eq!(summary.succeeded(), vec![("ORD-1", "JT1")]);
        assert_eq!(summary.failed(), vec![("ORD-2", "auth failed")]);
    }

    #[test]
    fn booking_report_uses_callback_wire_keys() {
        let report = BookingReport {
            results: BookingResults {
                success: vec![BookedOrder {
                    order_id: "ORD-1".to_string(),
                    tracking_number: "JT123456".to_string(),
                }],
                failed: vec![],
                indeterminate: vec![],
                total: 1,
            },
            timestamp: Utc::now(),
            signature: None,
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("\"orderId\":\"ORD-1\""));
        assert!(json.contains("\"trackingNumber\":\"JT123456\""));
        assert!(json.contains("\"total\":1"));
        assert!(!json.contains("signature"));
    }

    #[test]
    fn selector_display_is_operator_friendly() {
        assert_eq!(
            OrderSelector::Single("ORD-9".to_string()).to_string(),
            "order ORD-9"
        );
        assert_eq!(OrderSelector::AllReadyToShip.to_string(), "all ready-to-ship orders");
    }

    #[test]
    fn statuses_parse_from_cli_spellings() {
        assert_eq!(
            "ready-to-ship".parse::<ShippingStatus>().unwrap(),
            ShippingStatus::ReadyToShip
        );
        assert_eq!(
            "Ready to Ship".parse::<ShippingStatus>().unwrap(),
            ShippingStatus::ReadyToShip
        );
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        assert!("unknown".parse::<ShippingStatus>().is_err());
    }
}
