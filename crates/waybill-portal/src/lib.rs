//! Courier portal adapter for waybill.
//!
//! The courier's booking interface sits behind the [`PortalAdapter`]
//! trait: authenticate with credentials, submit a structured set of
//! shipment fields, get back a typed result. How an implementation
//! talks to the portal is its own business; what it may never do is
//! hand back an untyped guess. A submission either yields a tracking
//! identifier, a typed [`Unconfirmed`](SubmitResult::Unconfirmed)
//! receipt, or a typed error.
//!
//! Field names are not hardcoded against the portal. A versioned
//! [`FieldMapping`] table translates the canonical shipment fields into
//! the portal's own field identifiers, and can be overridden from
//! configuration when the portal changes its form.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use waybill_types::Order;

/// Default timeout for portal requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Response keys the portal has been observed to carry a tracking
/// identifier under, checked in order.
const TRACKING_KEYS: [&str; 3] = ["waybillNo", "trackingNumber", "mailNo"];

/// Portal login credentials.
#[derive(Clone)]
pub struct PortalCredentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for PortalCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The shop's sender identity, shared read-only across every booking
/// in a dispatch run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SenderProfile {
    pub name: String,
    pub contact: String,
    pub address: String,
    pub province: String,
    pub city: String,
    pub barangay: String,
}

/// The structured field set handed to the portal for one shipment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipmentFields {
    pub sender: SenderProfile,
    pub receiver_name: String,
    pub receiver_contact: String,
    pub receiver_address: String,
    pub receiver_province: String,
    pub receiver_city: String,
    pub receiver_barangay: String,
    pub package_size: String,
    pub item_category: String,
    pub weight_kg: f64,
    pub quantity: u32,
    pub payment_type: String,
}

impl ShipmentFields {
    /// Map an order plus the shop's sender profile into the canonical
    /// field set. Empty package metadata falls back to the portal's
    /// accepted defaults.
    pub fn from_order(order: &Order, sender: &SenderProfile) -> Self {
        Self {
            sender: sender.clone(),
            receiver_name: order.customer_name.clone(),
            receiver_contact: order.contact.clone(),
            receiver_address: order.address_details.clone(),
            receiver_province: order.province.clone(),
            receiver_city: order.city.clone(),
            receiver_barangay: order.barangay.clone(),
            package_size: non_empty_or(&order.package_size, "Small"),
            item_category: non_empty_or(&order.item_category, "General"),
            weight_kg: 1.0,
            quantity: order.quantity.max(1),
            payment_type: "Prepaid".to_string(),
        }
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value.to_string()
    }
}

/// Canonical field keys every mapping version must cover.
pub const CANONICAL_FIELDS: [&str; 13] = [
    "sender_name",
    "sender_contact",
    "sender_address",
    "receiver_name",
    "receiver_contact",
    "receiver_address",
    "receiver_province",
    "receiver_city",
    "receiver_barangay",
    "package_size",
    "item_category",
    "weight_kg",
    "quantity",
];

/// A mapping-table failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("field mapping {version:?} is missing canonical field {field:?}")]
    MissingField { version: String, field: String },
}

/// Versioned translation table from canonical shipment fields to the
/// portal's field identifiers.
///
/// The shipped default is [`FieldMapping::v1`]; deployments pin a
/// mapping in `.waybill.toml` and bump the version when the portal
/// changes its form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldMapping {
    pub version: String,
    pub fields: BTreeMap<String, String>,
}

impl FieldMapping {
    /// The mapping matching the portal's current booking form.
    pub fn v1() -> Self {
        let fields = [
            ("sender_name", "senderName"),
            ("sender_contact", "senderContact"),
            ("sender_address", "senderAddress"),
            ("sender_province", "senderProvince"),
            ("sender_city", "senderCity"),
            ("sender_barangay", "senderBarangay"),
            ("receiver_name", "receiverName"),
            ("receiver_contact", "receiverContact"),
            ("receiver_address", "receiverAddress"),
            ("receiver_province", "receiverProvince"),
            ("receiver_city", "receiverCity"),
            ("receiver_barangay", "receiverBarangay"),
            ("package_size", "packageSize"),
            ("item_category", "itemCategory"),
            ("weight_kg", "weight"),
            ("quantity", "quantity"),
            ("payment_type", "paymentType"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            version: "v1".to_string(),
            fields,
        }
    }

    /// Verify the mapping covers every canonical field.
    pub fn validate(&self) -> Result<(), MappingError> {
        for field in CANONICAL_FIELDS {
            if !self.fields.contains_key(field) {
                return Err(MappingError::MissingField {
                    version: self.version.clone(),
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Render the canonical fields into the portal's own identifiers.
    pub fn render(&self, fields: &ShipmentFields) -> Result<Map<String, Value>, MappingError> {
        self.validate()?;

        let canonical: [(&str, Value); 17] = [
            ("sender_name", json!(fields.sender.name)),
            ("sender_contact", json!(fields.sender.contact)),
            ("sender_address", json!(fields.sender.address)),
            ("sender_province", json!(fields.sender.province)),
            ("sender_city", json!(fields.sender.city)),
            ("sender_barangay", json!(fields.sender.barangay)),
            ("receiver_name", json!(fields.receiver_name)),
            ("receiver_contact", json!(fields.receiver_contact)),
            ("receiver_address", json!(fields.receiver_address)),
            ("receiver_province", json!(fields.receiver_province)),
            ("receiver_city", json!(fields.receiver_city)),
            ("receiver_barangay", json!(fields.receiver_barangay)),
            ("package_size", json!(fields.package_size)),
            ("item_category", json!(fields.item_category)),
            ("weight_kg", json!(fields.weight_kg)),
            ("quantity", json!(fields.quantity)),
            ("payment_type", json!(fields.payment_type)),
        ];

        let mut rendered = Map::new();
        for (key, value) in canonical {
            if let Some(portal_key) = self.fields.get(key) {
                rendered.insert(portal_key.clone(), value);
            }
        }
        Ok(rendered)
    }
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self::v1()
    }
}

/// An authenticated portal session. Opaque to callers; a dispatch run
/// holds at most one at a time.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    pub established_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            established_at: Utc::now(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Login failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("portal rejected the credentials")]
    InvalidCredentials,
    #[error("portal login timed out")]
    Timeout,
    #[error("portal login failed: {0}")]
    Transport(String),
}

/// Shipment submission failures.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The portal no longer recognizes the session; a single re-auth
    /// pass is worth attempting.
    #[error("portal session expired")]
    SessionExpired,
    #[error("portal rejected the shipment: {0}")]
    Rejected(String),
    #[error("portal submission timed out")]
    Timeout,
    #[error("portal submission failed: {0}")]
    Transport(String),
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Typed result of a shipment submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitResult {
    /// The portal confirmed the booking with a tracking identifier.
    Booked { tracking_number: String },
    /// The submission went through but no tracking identifier could be
    /// recognized; the booking may exist on the courier side. Never
    /// substituted with a placeholder.
    Unconfirmed { detail: String },
}

/// Boundary abstraction over the courier's booking interface.
pub trait PortalAdapter {
    /// Open a session. A session may be reused across bookings within
    /// one dispatch run.
    fn authenticate(&self, credentials: &PortalCredentials) -> Result<Session, AuthError>;

    /// Submit one shipment under an open session.
    fn submit_shipment(
        &self,
        session: &Session,
        fields: &ShipmentFields,
    ) -> Result<SubmitResult, SubmissionError>;

    /// Release the session. Best-effort; implementations must not fail.
    fn close(&self, session: Session);
}

/// Blocking HTTP implementation of the portal contract.
///
/// Speaks to the portal's JSON endpoints: `POST /api/auth/login` for
/// sessions, `POST /api/orders/waybill` for bookings, and a
/// best-effort `POST /api/auth/logout`.
#[derive(Debug, Clone)]
pub struct HttpPortal {
    base_url: String,
    mapping: FieldMapping,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
    error: Option<String>,
}

impl HttpPortal {
    pub fn new(base_url: &str) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("waybill/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mapping: FieldMapping::v1(),
            client,
        }
    }

    /// Replace the default field mapping (e.g. from configuration).
    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }
}

impl PortalAdapter for HttpPortal {
    fn authenticate(&self, credentials: &PortalCredentials) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    AuthError::Timeout
                } else {
                    AuthError::Transport(err.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => {
                let login: LoginResponse = response
                    .json()
                    .map_err(|err| AuthError::Transport(format!("unreadable login reply: {err}")))?;
                if let Some(error) = login.error {
                    return Err(AuthError::Transport(error));
                }
                match login.token {
                    Some(token) if !token.is_empty() => Ok(Session::new(token)),
                    _ => Err(AuthError::Transport(
                        "login reply carries no session token".to_string(),
                    )),
                }
            }
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(AuthError::InvalidCredentials)
            }
            status => Err(AuthError::Transport(format!(
                "unexpected status code: {status}"
            ))),
        }
    }

    fn submit_shipment(
        &self,
        session: &Session,
        fields: &ShipmentFields,
    ) -> Result<SubmitResult, SubmissionError> {
        let payload = self.mapping.render(fields)?;

        let response = self
            .client
            .post(format!("{}/api/orders/waybill", self.base_url))
            .bearer_auth(session.token())
            .json(&Value::Object(payload))
            .send()
            .map_err(|err| {
                if err.is_timeout() {
                    SubmissionError::Timeout
                } else {
                    SubmissionError::Transport(err.to_string())
                }
            })?;

        match response.status() {
            status if status.is_success() => {
                let body: Value = response.json().map_err(|err| {
                    SubmissionError::Transport(format!("unreadable booking reply: {err}"))
                })?;
                Ok(extract_tracking(&body))
            }
            reqwest::StatusCode::UNAUTHORIZED => Err(SubmissionError::SessionExpired),
            status if status.is_client_error() => {
                let detail = response.text().unwrap_or_default();
                Err(SubmissionError::Rejected(format!("{status}: {detail}")))
            }
            status => Err(SubmissionError::Transport(format!(
                "unexpected status code: {status}"
            ))),
        }
    }

    fn close(&self, session: Session) {
        // Best-effort: a failed logout only means the session times out
        // server-side.
        let _ = self
            .client
            .post(format!("{}/api/auth/logout", self.base_url))
            .bearer_auth(session.token())
            .send();
    }
}

/// Pull a tracking identifier out of the portal's booking reply, or a
/// typed `Unconfirmed` when none of the known keys carries one.
fn extract_tracking(body: &Value) -> SubmitResult {
    for key in TRACKING_KEYS {
        if let Some(tracking) = body.get(key).and_then(Value::as_str) {
            let tracking = tracking.trim();
            if !tracking.is_empty() {
                return SubmitResult::Booked {
                    tracking_number: tracking.to_string(),
                };
            }
        }
    }
    SubmitResult::Unconfirmed {
        detail: format!(
            "booking reply carries no tracking identifier (keys tried: {})",
            TRACKING_KEYS.join(", ")
        ),
    }
}
